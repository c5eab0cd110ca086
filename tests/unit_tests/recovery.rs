use nalgebra::{Point3, Vector3};
use std::collections::BTreeSet;
use xcut::construction::construct_pair_interface;
use xcut::element::{ElementGeometry, ElementShape, FacetSet};
use xcut::interface::ElementAccumulator;
use xcut::mesh::MeshElement;
use xcut::optimize::newton::NewtonSettings;
use xcut::recovery::{InterfaceRecovery, RecoveryCase, RecoveryCutter, RecoveryStats};
use xcut::tessellation::{ArrangementTessellator, Plc, TessellationOptions, Tessellator, TetMesh};

/// A quad9 cutter spanning `[-2, 2]^2` that follows `z = x^2 / 8` exactly.
fn curved_cutter() -> RecoveryCutter<f64> {
    let vertices = ElementShape::Quad9
        .reference_nodes::<f64>()
        .into_iter()
        .map(|xi| Point3::new(2.0 * xi.x, 2.0 * xi.y, xi.x * xi.x / 2.0))
        .collect();
    RecoveryCutter {
        element: MeshElement::new(0, ElementShape::Quad9, (0..9).collect()).unwrap(),
        geometry: ElementGeometry::from_vertices(ElementShape::Quad9, vertices).unwrap(),
    }
}

fn flat_cutter() -> RecoveryCutter<f64> {
    RecoveryCutter {
        element: MeshElement::new(0, ElementShape::Quad4, vec![0, 1, 2, 3]).unwrap(),
        geometry: ElementGeometry::quad([
            Point3::new(-2.0, -2.0, 0.0),
            Point3::new(2.0, -2.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(-2.0, 2.0, 0.0),
        ]),
    }
}

fn newton() -> NewtonSettings<f64> {
    NewtonSettings::with_max_iterations(50)
}

/// Tessellates the reference hex conforming to the linearized interface of `cutter`.
fn tessellate_reference_hex(cutter: &RecoveryCutter<f64>, quadratic: bool) -> TetMesh<f64> {
    let xfem = ElementGeometry::reference(ElementShape::Hex8);
    let mut accumulator = ElementAccumulator::new(ElementShape::Hex8);
    construct_pair_interface(&mut accumulator, &xfem, &cutter.geometry, 0, 0, &newton(), 16).unwrap();
    let options = TessellationOptions {
        quadratic,
        ..TessellationOptions::default()
    };
    ArrangementTessellator::default()
        .tessellate(&Plc::from_accumulator(&accumulator), &options)
        .unwrap()
}

fn interface_vertices(mesh: &TetMesh<f64>) -> BTreeSet<usize> {
    mesh.interface_faces()
        .flat_map(|(_, face)| face.vertices.iter().copied())
        .collect()
}

#[test]
fn flat_linear_interface_needs_no_recovery() {
    let cutters = [flat_cutter()];
    let xfem = ElementGeometry::reference(ElementShape::Hex8);
    let mut mesh = tessellate_reference_hex(&cutters[0], false);
    let before = mesh.points.clone();
    let recovery = InterfaceRecovery {
        xfem: &xfem,
        cutters: &cutters,
        newton: newton(),
        projection_iterations: 20,
    };
    let stats = recovery.recover(&mut mesh).unwrap();
    assert_eq!(stats, RecoveryStats::default());
    assert_eq!(mesh.points, before);
}

#[test]
fn flat_quadratic_interface_is_left_in_place() {
    let cutters = [flat_cutter()];
    let xfem = ElementGeometry::reference(ElementShape::Hex8);
    let mut mesh = tessellate_reference_hex(&cutters[0], true);
    let before = mesh.points.clone();
    let recovery = InterfaceRecovery {
        xfem: &xfem,
        cutters: &cutters,
        newton: newton(),
        projection_iterations: 20,
    };
    let stats = recovery.recover(&mut mesh).unwrap();
    assert!(stats.recovered_points > 0);
    assert_eq!(stats.missed_points, 0);
    for (after, before) in mesh.points.iter().zip(&before) {
        assert!((after - before).norm() < 1e-10);
    }
}

#[test]
fn curved_interface_is_recovered_onto_cutter() {
    let cutters = [curved_cutter()];
    let xfem = ElementGeometry::reference(ElementShape::Hex8);
    let mut mesh = tessellate_reference_hex(&cutters[0], true);
    let recovery = InterfaceRecovery {
        xfem: &xfem,
        cutters: &cutters,
        newton: newton(),
        projection_iterations: 20,
    };
    let stats = recovery.recover(&mut mesh).unwrap();
    assert!(stats.recovered_points > 0);
    assert_eq!(stats.missed_points, 0);

    for v in interface_vertices(&mesh) {
        let x = mesh.points[v];
        assert!((x.z - x.x * x.x / 8.0).abs() < 1e-8, "Point {:?} is not on the cutter", x);
        assert!(ElementShape::Hex8.contains_reference_point(&x.coords, 1e-7));
    }
}

#[test]
fn repeated_recovery_leaves_mesh_unchanged() {
    let cutters = [curved_cutter()];
    let xfem = ElementGeometry::reference(ElementShape::Hex8);
    let mut mesh = tessellate_reference_hex(&cutters[0], true);
    let recovery = InterfaceRecovery {
        xfem: &xfem,
        cutters: &cutters,
        newton: newton(),
        projection_iterations: 20,
    };
    recovery.recover(&mut mesh).unwrap();
    let recovered = mesh.clone();
    let stats = recovery.recover(&mut mesh).unwrap();
    assert_eq!(stats, RecoveryStats::default());
    assert_eq!(mesh, recovered);
}

#[test]
fn recovery_case_depends_on_location() {
    let first = flat_cutter();
    let second = RecoveryCutter {
        element: MeshElement::new(1, ElementShape::Quad4, vec![1, 4, 5, 2]).unwrap(),
        geometry: first.geometry.clone(),
    };
    let unrelated = RecoveryCutter {
        element: MeshElement::new(2, ElementShape::Quad4, vec![6, 7, 8, 9]).unwrap(),
        geometry: first.geometry.clone(),
    };
    let cutters = [first, second, unrelated];
    let xfem = ElementGeometry::reference(ElementShape::Hex8);
    let recovery = InterfaceRecovery {
        xfem: &xfem,
        cutters: &cutters,
        newton: newton(),
        projection_iterations: 20,
    };

    let interior = Vector3::new(0.1, 0.2, 0.0);
    let markers = |m: &[usize]| m.iter().copied().collect::<BTreeSet<_>>();

    assert_eq!(recovery.decide_case(&interior, &markers(&[0]), None), RecoveryCase::Surface);
    assert_eq!(recovery.decide_case(&interior, &markers(&[0, 2]), None), RecoveryCase::Surface);
    // The quad4 line 1 connects the local nodes 1 and 2
    assert_eq!(
        recovery.decide_case(&interior, &markers(&[0, 1]), None),
        RecoveryCase::Edge { marker: 0, line: 1 }
    );

    let on_facet = Vector3::new(1.0, 0.2, 0.0);
    assert_eq!(
        recovery.decide_case(&on_facet, &markers(&[0, 1]), None),
        RecoveryCase::Boundary(FacetSet::from_slice(&[2]))
    );

    // Midside nodes use the facets shared by their edge, not those of their own position
    let edge_facets = FacetSet::from_slice(&[1, 2]);
    assert_eq!(
        recovery.decide_case(&interior, &markers(&[0]), Some(edge_facets)),
        RecoveryCase::Boundary(edge_facets)
    );
}
