use crate::Plane;
use nalgebra::{Point3, RealField, Scalar, Unit, Vector3};

/// The closed half space `{ x : n . (x - x0) <= 0 }`, i.e. the normal points *out* of the region.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HalfSpace<T: Scalar> {
    point: Point3<T>,
    normal: Unit<Vector3<T>>,
}

impl<T> HalfSpace<T>
where
    T: RealField + Copy,
{
    pub fn from_point_and_outward_normal(point: Point3<T>, normal: Unit<Vector3<T>>) -> Self {
        Self { point, normal }
    }

    pub fn contains_point(&self, point: &Point3<T>) -> bool {
        self.contains_point_with_tolerance(point, T::zero())
    }

    pub fn contains_point_with_tolerance(&self, point: &Point3<T>, tolerance: T) -> bool {
        self.plane().signed_distance(point) <= tolerance
    }

    /// The bounding plane, with the outward normal.
    pub fn plane(&self) -> Plane<T> {
        Plane::from_point_and_normal(self.point, self.normal)
    }
}
