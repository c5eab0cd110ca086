use crate::AxisAlignedBoundingBox3d;
use nalgebra::{Point2, Point3, Vector3};
use proptest::prelude::*;

pub fn point2() -> impl Strategy<Value = Point2<f64>> {
    // Keep coordinates moderate so that tolerance-based predicates stay meaningful
    let range = -10.0..10.0;
    [range.clone(), range.clone()].prop_map(|[x, y]| Point2::new(x, y))
}

pub fn point3() -> impl Strategy<Value = Point3<f64>> {
    let range = -10.0..10.0;
    [range.clone(), range.clone(), range.clone()].prop_map(|[x, y, z]| Point3::new(x, y, z))
}

/// Boxes with a corner in `[-10, 10]^3` and extents in `[0, 5]` along every axis.
///
/// Zero extents are deliberately allowed, since flat boxes arise from planar cutter elements.
pub fn aabb3() -> impl Strategy<Value = AxisAlignedBoundingBox3d<f64>> {
    let extent = prop_oneof![Just(0.0), 0.0..5.0];
    (point3(), [extent.clone(), extent.clone(), extent]).prop_map(|(corner, [dx, dy, dz])| {
        let min = corner.coords;
        AxisAlignedBoundingBox3d::new(min, min + Vector3::new(dx, dy, dz))
    })
}
