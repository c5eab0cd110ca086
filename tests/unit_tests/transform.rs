use matrixcompare::assert_matrix_eq;
use nalgebra::{Point3, Vector3};
use proptest::prelude::*;
use xcut::element::{ElementGeometry, ElementShape};
use xcut::proptest::{perturbed_element, reference_point};
use xcut::transform::{current_to_element_local, current_to_surface_coordinates, element_to_current, TransformError};

fn volumetric_shape() -> impl Strategy<Value = ElementShape> {
    prop::sample::select(vec![ElementShape::Tet4, ElementShape::Tet10, ElementShape::Hex8])
}

fn surface_or_line_shape() -> impl Strategy<Value = ElementShape> {
    prop::sample::select(vec![
        ElementShape::Line2,
        ElementShape::Line3,
        ElementShape::Tri3,
        ElementShape::Tri6,
        ElementShape::Quad4,
        ElementShape::Quad8,
        ElementShape::Quad9,
    ])
}

#[test]
fn degenerate_element_is_fatal() {
    let flat = ElementGeometry::from_vertices(
        ElementShape::Tet4,
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ],
    )
    .unwrap();
    let err = current_to_element_local(&flat, &Point3::new(0.2, 0.2, 0.0)).unwrap_err();
    assert!(matches!(err, TransformError::DegenerateJacobian { .. }));
    assert!(err.is_fatal());
}

#[test]
fn surface_elements_have_no_inverse_mapping() {
    let quad = ElementGeometry::<f64>::reference(ElementShape::Quad4);
    let err = current_to_element_local(&quad, &Point3::origin()).unwrap_err();
    assert_eq!(err, TransformError::NotVolumetric);
}

#[test]
fn point_outside_affine_element_maps_outside_reference_element() {
    let hex = ElementGeometry::from_vertices(
        ElementShape::Hex8,
        ElementShape::Hex8
            .reference_nodes::<f64>()
            .into_iter()
            .map(|p| Point3::from((p.coords + Vector3::repeat(1.0)) * 0.5))
            .collect(),
    )
    .unwrap();
    let xi = current_to_element_local(&hex, &Point3::new(1.5, 0.5, 0.5)).unwrap();
    assert_matrix_eq!(xi, Vector3::new(2.0, 0.0, 0.0), comp = abs, tol = 1e-12);
    assert!(!ElementShape::Hex8.contains_reference_point(&xi, 1e-7));
}

#[test]
fn surface_projection_finds_closest_point_on_plane() {
    let quad = ElementGeometry::quad([
        Point3::new(0.0, 0.0, 0.5),
        Point3::new(2.0, 0.0, 0.5),
        Point3::new(2.0, 2.0, 0.5),
        Point3::new(0.0, 2.0, 0.5),
    ]);
    let projection = current_to_surface_coordinates(&quad, &Point3::new(1.5, 0.5, 3.0), 20);
    assert!(projection.converged);
    assert_matrix_eq!(projection.xi, Vector3::new(0.5, -0.5, 0.0), comp = abs, tol = 1e-12);
    assert_matrix_eq!(projection.point.coords, Vector3::new(1.5, 0.5, 0.5), comp = abs, tol = 1e-12);
}

proptest! {
    #[test]
    fn volumetric_transform_round_trip(
        (element, xi) in volumetric_shape()
            .prop_flat_map(|shape| (perturbed_element(shape), reference_point(shape)))
    ) {
        let x = element_to_current(&element, &xi);
        let xi_roundtrip = current_to_element_local(&element, &x).unwrap();
        assert_matrix_eq!(xi_roundtrip, xi, comp = abs, tol = 1e-10);
    }

    #[test]
    fn surface_transform_round_trip(
        (element, xi) in surface_or_line_shape()
            .prop_flat_map(|shape| (perturbed_element(shape), reference_point(shape)))
    ) {
        let x = element_to_current(&element, &xi);
        let projection = current_to_surface_coordinates(&element, &x, 50);
        prop_assert!(projection.converged);
        assert_matrix_eq!(projection.xi, xi, comp = abs, tol = 1e-10);
    }
}
