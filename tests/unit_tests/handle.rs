use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{Point3, Vector3};
use std::collections::BTreeMap;
use xcut::candidates::SelfCommunicator;
use xcut::element::ElementShape;
use xcut::handle::InterfaceHandle;
use xcut::intersection::{Intersection, IntersectionSettings};
use xcut::mesh::procedural::{create_quad_cutter, create_unit_box_uniform_hex_discretization};
use xcut::mesh::MeshError;

/// A 3x3x3 box of hex elements cut by the plane `z = 0.5`, whose normal points upwards.
fn cut_box() -> InterfaceHandle<f64> {
    let xfem = create_unit_box_uniform_hex_discretization(3);
    let cutter = create_quad_cutter(
        [
            Point3::new(-0.5, -0.5, 0.5),
            Point3::new(1.5, -0.5, 0.5),
            Point3::new(1.5, 1.5, 0.5),
            Point3::new(-0.5, 1.5, 0.5),
        ],
        "interface",
    );
    let output = Intersection::new(IntersectionSettings::default())
        .compute(&xfem, &cutter, &BTreeMap::new(), &SelfCommunicator)
        .unwrap();
    InterfaceHandle::new(xfem, output)
}

#[test]
fn cut_and_uncut_elements() {
    let handle = cut_box();
    assert!(handle.is_consistent());
    assert_eq!(handle.diagnostics().cut_elements, 9);
    assert_eq!(handle.intersected_elements().collect::<Vec<_>>(), (9..18).collect::<Vec<_>>());
    assert!(handle.element_intersected(13));
    assert!(!handle.element_intersected(0));

    assert!(!handle.boundary_cells(13).is_empty());
    assert!(handle.boundary_cells(0).is_empty());
    assert!(handle.domain_cells(13).unwrap().len() > 1);
}

#[test]
fn uncut_element_is_a_single_cell() {
    let handle = cut_box();
    let cells = handle.domain_cells(0).unwrap();
    assert_eq!(cells.len(), 1);
    let cell = &cells[0];
    assert_eq!(cell.shape, ElementShape::Hex8);
    assert_eq!(cell.domain_coords, ElementShape::Hex8.reference_nodes::<f64>());
    let geometry = handle.xfem().element_geometry(0).unwrap();
    for (x, expected) in cell.physical_coords.iter().zip(geometry.vertices()) {
        assert_matrix_eq!(x.coords, expected.coords, comp = abs, tol = 1e-14);
    }
    assert_scalar_eq!(cell.reference_volume(), 8.0, comp = abs, tol = 1e-14);

    assert_eq!(handle.domain_cells(100).unwrap_err(), MeshError::MissingElement(100));
}

#[test]
fn nearest_point_on_cutter() {
    let handle = cut_box().with_projection_iterations(50);

    let above = handle
        .search_nearest_point_on_surface(0, &Point3::new(0.2, 0.3, 0.9))
        .unwrap();
    assert_eq!(above.cutter_element_id, 0);
    assert_matrix_eq!(above.point.coords, Vector3::new(0.2, 0.3, 0.5), comp = abs, tol = 1e-12);
    assert_matrix_eq!(above.xi, Vector3::new(-0.3, -0.2, 0.0), comp = abs, tol = 1e-12);
    assert_matrix_eq!(above.offset, Vector3::new(0.0, 0.0, 0.4), comp = abs, tol = 1e-12);
    assert_scalar_eq!(above.signed_distance, 0.4, comp = abs, tol = 1e-12);

    let below = handle
        .search_nearest_point_on_surface(0, &Point3::new(0.2, 0.3, 0.2))
        .unwrap();
    assert_scalar_eq!(below.signed_distance, -0.3, comp = abs, tol = 1e-12);

    // Beyond the element, the closest corner is used
    let outside = handle
        .search_nearest_point_on_surface(0, &Point3::new(3.0, 0.0, 0.7))
        .unwrap();
    assert_eq!(outside.point, Point3::new(1.5, -0.5, 0.5));
    assert_matrix_eq!(outside.xi, Vector3::new(1.0, -1.0, 0.0), comp = abs, tol = 1e-14);
    assert_scalar_eq!(
        outside.signed_distance,
        Vector3::new(1.5f64, 0.5, 0.2).norm(),
        comp = abs,
        tol = 1e-12
    );

    assert!(handle
        .search_nearest_point_on_surface(1, &Point3::origin())
        .is_err());
}

#[test]
fn position_relative_to_conditions() {
    let handle = cut_box();
    let below = handle.position_within_condition(&Point3::new(0.5, 0.5, 0.1)).unwrap();
    assert_eq!(below.len(), 1);
    assert!(below["interface"]);
    let above = handle.position_within_condition(&Point3::new(0.5, 0.5, 0.9)).unwrap();
    assert!(!above["interface"]);
}
