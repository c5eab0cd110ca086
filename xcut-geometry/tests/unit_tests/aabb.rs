use nalgebra::{point, vector, U3};
use proptest::prelude::*;
use xcut_geometry::proptest::aabb3;
use xcut_geometry::{points_equal, AxisAlignedBoundingBox, AxisAlignedBoundingBox3d, TOL7};

#[test]
fn aabb_intersects_3d() {
    type Aabb = AxisAlignedBoundingBox<f64, U3>;

    let aabb1 = Aabb::new(vector![0.0, 0.0, 0.0], vector![1.0, 1.0, 1.0]);

    macro_rules! assert_no_intersection {
        ($aabb2:expr) => {
            assert!(!aabb1.intersects(&$aabb2));
            // Check that we get the same result when reversing the order
            assert!(!$aabb2.intersects(&aabb1));
        };
    }

    macro_rules! assert_intersection {
        ($aabb2:expr) => {
            assert!(aabb1.intersects(&$aabb2));
            assert!($aabb2.intersects(&aabb1));
        };
    }

    assert_no_intersection!(Aabb::new(vector![2.0, 0.0, 0.0], vector![3.0, 1.0, 1.0]));
    assert_no_intersection!(Aabb::new(vector![0.0, 0.0, 1.5], vector![1.0, 1.0, 2.0]));
    assert_no_intersection!(Aabb::new(vector![-2.0, -2.0, -2.0], vector![-0.5, 0.5, 0.5]));

    assert_intersection!(Aabb::new(vector![0.5, 0.5, 0.5], vector![0.6, 0.6, 0.6]));
    assert_intersection!(Aabb::new(vector![-1.0, -1.0, -1.0], vector![2.0, 2.0, 2.0]));
    // Touching boxes overlap
    assert_intersection!(Aabb::new(vector![1.0, 0.0, 0.0], vector![2.0, 1.0, 1.0]));
    // Flat boxes, as produced by planar cutter elements
    assert_intersection!(Aabb::new(vector![-1.0, -1.0, 0.5], vector![2.0, 2.0, 0.5]));
}

#[test]
fn aabb_tolerance_widens_the_overlap_test() {
    let aabb1 = AxisAlignedBoundingBox3d::new(vector![0.0, 0.0, 0.0], vector![1.0, 1.0, 1.0]);
    let aabb2 = AxisAlignedBoundingBox3d::new(vector![1.0 + 1e-8, 0.0, 0.0], vector![2.0, 1.0, 1.0]);
    assert!(!aabb1.intersects(&aabb2));
    assert!(aabb1.intersects_with_tolerance(&aabb2, TOL7));
    assert!(!aabb1.intersects_with_tolerance(&aabb2, 1e-9));
}

#[test]
fn aabb_from_points_is_tight() {
    let points = [point![0.5, -1.0, 2.0], point![1.5, 3.0, 0.0], point![-0.5, 0.0, 1.0]];
    let aabb = AxisAlignedBoundingBox3d::from_points(&points).unwrap();
    assert_eq!(aabb.min(), &vector![-0.5, -1.0, 0.0]);
    assert_eq!(aabb.max(), &vector![1.5, 3.0, 2.0]);
    assert!(AxisAlignedBoundingBox3d::<f64>::from_points(&[]).is_none());
}

#[test]
fn points_equal_uses_absolute_tolerance() {
    let a = point![1.0, 2.0, 3.0];
    assert!(points_equal(&a, &point![1.0 + 0.5e-7, 2.0, 3.0 - 0.5e-7], TOL7));
    assert!(!points_equal(&a, &point![1.0, 2.0 + 2e-7, 3.0], TOL7));
}

proptest! {
    #[test]
    fn aabb_overlap_is_symmetric(a in aabb3(), b in aabb3()) {
        prop_assert_eq!(a.intersects(&b), b.intersects(&a));
        prop_assert_eq!(a.intersects_with_tolerance(&b, TOL7), b.intersects_with_tolerance(&a, TOL7));
    }

    #[test]
    fn aabb_enclosure_intersects_both(a in aabb3(), b in aabb3()) {
        let c = a.enclose(&b);
        prop_assert!(c.intersects(&a));
        prop_assert!(c.intersects(&b));
    }
}
