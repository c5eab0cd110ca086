//! Strategies for property-based tests of the intersection engine.
use crate::element::{ElementGeometry, ElementShape};
use ::proptest::prelude::*;
use nalgebra::{Point3, Vector3};

pub use xcut_geometry::proptest::{aabb3, point2, point3};

fn is_simplex(shape: ElementShape) -> bool {
    matches!(
        shape,
        ElementShape::Tri3 | ElementShape::Tri6 | ElementShape::Tet4 | ElementShape::Tet10
    )
}

/// Reference coordinates inside the reference element of `shape`, trailing components zero.
pub fn reference_point(shape: ElementShape) -> impl Strategy<Value = Vector3<f64>> {
    let dim = shape.reference_dim();
    [0.0..=1.0, 0.0..=1.0, 0.0..=1.0].prop_map(move |u| {
        let mut u = Vector3::from(u);
        for k in dim..3 {
            u[k] = 0.0;
        }
        if is_simplex(shape) {
            // Scale into the corner simplex of the unit cube
            let sum = u.sum();
            if sum > 1.0 {
                u /= sum;
            }
        }
        let mut xi = u.map(|u_i| 2.0 * u_i - 1.0);
        for k in dim..3 {
            xi[k] = 0.0;
        }
        xi
    })
}

/// A scaled, translated and mildly perturbed copy of the reference element of `shape`.
///
/// Every node is moved by at most 5% of the scaled element size, which keeps the Jacobian
/// determinant of all supported shapes positive.
pub fn perturbed_element(shape: ElementShape) -> impl Strategy<Value = ElementGeometry<f64>> {
    let num_nodes = shape.num_nodes();
    let perturbation = prop::collection::vec([-0.05..=0.05, -0.05..=0.05, -0.05..=0.05], num_nodes);
    (0.5..2.0, point3(), perturbation).prop_map(move |(scale, origin, perturbation)| {
        let vertices = shape
            .reference_nodes::<f64>()
            .into_iter()
            .zip(perturbation)
            .map(|(node, delta)| Point3::from((node.coords + Vector3::from(delta)) * scale + origin.coords))
            .collect();
        ElementGeometry::from_vertices(shape, vertices).expect("Node count matches shape")
    })
}

/// The quad4 corners of a planar cutter through `[-1, 1]^3` at height `z` with
/// `z` in `(-0.9, 0.9)`, extending beyond the box by `margin` in `x` and `y`.
pub fn horizontal_cutter_corners() -> impl Strategy<Value = [Point3<f64>; 4]> {
    (-0.9f64..0.9, 0.1f64..1.0).prop_map(|(z, margin)| {
        let e = 1.0 + margin;
        [
            Point3::new(-e, -e, z),
            Point3::new(e, -e, z),
            Point3::new(e, e, z),
            Point3::new(-e, e, z),
        ]
    })
}
