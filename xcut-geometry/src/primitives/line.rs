use crate::Plane;
use nalgebra::{Point3, RealField, Scalar};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LineSegment3d<T: Scalar> {
    end_points: [Point3<T>; 2],
}

impl<T: Scalar> LineSegment3d<T> {
    pub fn from_end_points(end_points: [Point3<T>; 2]) -> Self {
        Self { end_points }
    }

    pub fn start(&self) -> &Point3<T> {
        &self.end_points[0]
    }

    pub fn end(&self) -> &Point3<T> {
        &self.end_points[1]
    }
}

impl<T: RealField + Copy> LineSegment3d<T> {
    pub fn point_from_parameter(&self, t: T) -> Point3<T> {
        let [a, b] = self.end_points;
        Point3::from(a.coords * (T::one() - t) + b.coords * t)
    }

    pub fn midpoint(&self) -> Point3<T> {
        self.point_from_parameter(T::from_f64(0.5).unwrap())
    }

    pub fn project_point_parametric(&self, point: &Point3<T>) -> T {
        let [a, b] = &self.end_points;
        let d = b - a;
        let d2 = d.magnitude_squared();
        if d2 == T::zero() {
            // A collapsed segment is a single point, for which any parameter is correct
            T::zero()
        } else {
            (point - a).dot(&d) / d2
        }
    }

    /// Parameter of the crossing with the plane, assuming the end points lie strictly on
    /// opposite sides of it. The result is clamped to `[0, 1]`.
    pub fn plane_crossing_parametric(&self, plane: &Plane<T>) -> T {
        let d_a = plane.signed_distance(self.start());
        let d_b = plane.signed_distance(self.end());
        let denom = d_a - d_b;
        if denom == T::zero() {
            T::zero()
        } else {
            nalgebra::clamp(d_a / denom, T::zero(), T::one())
        }
    }

    pub fn plane_crossing(&self, plane: &Plane<T>) -> Point3<T> {
        self.point_from_parameter(self.plane_crossing_parametric(plane))
    }
}
