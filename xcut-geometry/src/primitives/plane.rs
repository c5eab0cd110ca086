use nalgebra::{Point3, RealField, Scalar, Unit, Vector3};

/// Which side of a plane a point lies on, with points closer than a tolerance
/// counted as lying on the plane.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PlaneSide {
    Positive,
    On,
    Negative,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Plane<T: Scalar> {
    point: Point3<T>,
    normal: Unit<Vector3<T>>,
}

impl<T> Plane<T>
where
    T: RealField + Copy,
{
    pub fn normal(&self) -> &Unit<Vector3<T>> {
        &self.normal
    }

    pub fn point(&self) -> &Point3<T> {
        &self.point
    }

    pub fn from_point_and_normal(point: Point3<T>, normal: Unit<Vector3<T>>) -> Self {
        Self { point, normal }
    }

    /// The plane through three points, oriented by `(b - a) x (c - a)`.
    ///
    /// Returns `None` if the points are (numerically) collinear.
    pub fn from_points(a: &Point3<T>, b: &Point3<T>, c: &Point3<T>) -> Option<Self> {
        let n = (b - a).cross(&(c - a));
        Unit::try_new(n, T::default_epsilon()).map(|normal| Self::from_point_and_normal(*a, normal))
    }

    pub fn flipped(&self) -> Self {
        Self {
            point: self.point,
            normal: Unit::new_unchecked(-self.normal.into_inner()),
        }
    }

    pub fn signed_distance(&self, point: &Point3<T>) -> T {
        self.normal.dot(&(point - self.point))
    }

    pub fn side(&self, point: &Point3<T>, tolerance: T) -> PlaneSide {
        let d = self.signed_distance(point);
        if d > tolerance {
            PlaneSide::Positive
        } else if d < -tolerance {
            PlaneSide::Negative
        } else {
            PlaneSide::On
        }
    }

    pub fn project_point(&self, point: &Point3<T>) -> Point3<T> {
        point - self.normal.as_ref() * self.signed_distance(point)
    }

    /// Whether two planes describe the same geometric plane, irrespective of orientation.
    pub fn coincides_with(&self, other: &Plane<T>, tolerance: T) -> bool {
        let parallel = self.normal.cross(&other.normal).norm() <= tolerance;
        parallel && self.signed_distance(&other.point).abs() <= tolerance
    }

    /// Two unit vectors spanning the plane, forming a right-handed frame with the normal.
    pub fn tangent_basis(&self) -> [Vector3<T>; 2] {
        let n = self.normal.as_ref();
        // Pick the coordinate axis least aligned with the normal
        let axis = if n.x.abs() <= n.y.abs() && n.x.abs() <= n.z.abs() {
            Vector3::x()
        } else if n.y.abs() <= n.z.abs() {
            Vector3::y()
        } else {
            Vector3::z()
        };
        let u = n.cross(&axis).normalize();
        let v = n.cross(&u);
        [u, v]
    }
}
