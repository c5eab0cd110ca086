use matrixcompare::assert_scalar_eq;
use nalgebra::{Point3, Vector3};
use std::collections::{BTreeMap, BTreeSet};
use xcut::element::ElementShape;
use xcut::mesh::procedural::{
    create_parametric_surface_cutter, create_quad_cutter, create_rectangular_uniform_hex_discretization,
    create_unit_box_uniform_hex_discretization,
};
use xcut::mesh::{CouplingCondition, Discretization, MeshElement, MeshError};

#[test]
fn uniform_hex_box() {
    let mesh = create_unit_box_uniform_hex_discretization::<f64>(2);
    assert_eq!(mesh.nodes().len(), 27);
    assert_eq!(mesh.num_elements(), 8);
    assert!(mesh.conditions().is_empty());

    let mut volume = 0.0;
    for id in mesh.elements().keys() {
        let geometry = mesh.element_geometry(*id).unwrap();
        assert_eq!(geometry.shape(), ElementShape::Hex8);
        // The Jacobian of an axis-aligned cell of width 0.5 is 0.25 * I
        let j = geometry.reference_jacobian(&Vector3::zeros());
        assert_scalar_eq!(j.determinant(), 0.25f64.powi(3), comp = abs, tol = 1e-14);
        volume += j.determinant() * 8.0;
    }
    assert_scalar_eq!(volume, 1.0, comp = abs, tol = 1e-12);
}

#[test]
fn rectangular_hex_box_with_origin() {
    let mesh = create_rectangular_uniform_hex_discretization(0.5, 2, 1, 1, 2, &Vector3::new(1.0, 0.0, -1.0));
    assert_eq!(mesh.num_elements(), 4 * 2 * 2);
    let (min, max) = mesh.nodes().values().fold(
        (Point3::new(f64::MAX, f64::MAX, f64::MAX), Point3::new(f64::MIN, f64::MIN, f64::MIN)),
        |(min, max), x| (min.inf(x), max.sup(x)),
    );
    assert_eq!(min, Point3::new(1.0, 0.0, -1.0));
    assert_eq!(max, Point3::new(2.0, 0.5, -0.5));

    assert!(create_rectangular_uniform_hex_discretization::<f64>(1.0, 1, 1, 1, 0, &Vector3::zeros())
        .elements()
        .is_empty());
}

#[test]
fn parametric_surface_cutter() {
    let surface = |u: f64, v: f64| Point3::new(u, v, u * v);
    let tri = create_parametric_surface_cutter(ElementShape::Tri3, 3, 2, surface, "tri", 0, 0).unwrap();
    assert_eq!(tri.num_elements(), 12);
    assert_eq!(tri.nodes().len(), 12);
    assert_eq!(tri.conditions()[0].label(), "tri");
    assert_eq!(tri.conditions()[0].elements().len(), 12);

    let quad9 = create_parametric_surface_cutter(ElementShape::Quad9, 3, 2, surface, "quad", 100, 50).unwrap();
    assert_eq!(quad9.num_elements(), 6);
    assert_eq!(quad9.nodes().len(), 7 * 5);
    assert_eq!(quad9.elements().keys().copied().collect::<Vec<_>>(), (50..56).collect::<Vec<_>>());
    assert!(quad9.nodes().keys().all(|id| *id >= 100));
    // Quadratic nodes are sampled on the surface
    for x in quad9.nodes().values() {
        assert_scalar_eq!(x.z, x.x * x.y, comp = abs, tol = 1e-14);
    }

    let err = create_parametric_surface_cutter(ElementShape::Tri6, 1, 1, surface, "tri6", 0, 0).unwrap_err();
    assert!(matches!(err, MeshError::NodeCountMismatch { .. }));
}

#[test]
fn element_node_count_is_checked() {
    let err = MeshElement::new(0, ElementShape::Tet10, vec![0, 1, 2, 3]).unwrap_err();
    assert_eq!(
        err,
        MeshError::NodeCountMismatch {
            shape: ElementShape::Tet10,
            expected: 10,
            actual: 4
        }
    );
}

#[test]
fn duplicate_elements_and_missing_nodes() {
    let mut mesh = Discretization::<f64>::new();
    mesh.insert_node(0, Point3::origin());
    let element = MeshElement::new(3, ElementShape::Line2, vec![0, 1]).unwrap();
    mesh.insert_element(element.clone()).unwrap();
    assert_eq!(mesh.insert_element(element), Err(MeshError::DuplicateElement(3)));
    assert_eq!(
        mesh.element_geometry(3).unwrap_err(),
        MeshError::MissingNode { element: 3, node: 1 }
    );
    assert_eq!(mesh.element(4).unwrap_err(), MeshError::MissingElement(4));
}

#[test]
fn common_lines_of_neighboring_elements() {
    let a = MeshElement::new(0, ElementShape::Quad4, vec![0, 1, 2, 3]).unwrap();
    let b = MeshElement::new(1, ElementShape::Tri3, vec![2, 1, 4]).unwrap();
    let c = MeshElement::new(2, ElementShape::Tri3, vec![3, 5, 6]).unwrap();
    assert_eq!(a.common_line(&b), Some(1));
    assert_eq!(b.common_line(&a), Some(0));
    assert_eq!(a.common_line(&c), None);
}

#[test]
fn conflicting_conditions() {
    let mut cutter = create_quad_cutter(
        [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ],
        "first",
    );
    assert_eq!(cutter.condition_elements().unwrap(), [(0, 0)].into_iter().collect());
    cutter.add_condition(CouplingCondition::new("second", [0]));
    assert_eq!(
        cutter.condition_elements().unwrap_err(),
        MeshError::ConditionConflict {
            element: 0,
            first: "first".to_string(),
            second: "second".to_string()
        }
    );

    let mut dangling = Discretization::<f64>::new();
    dangling.add_condition(CouplingCondition::new("dangling", [7]));
    assert_eq!(dangling.condition_elements().unwrap_err(), MeshError::MissingElement(7));
}

#[test]
fn restriction_and_merge_round_trip() {
    let cutter = create_parametric_surface_cutter(
        ElementShape::Quad4,
        2,
        2,
        |u: f64, v: f64| Point3::new(u, v, 0.0),
        "interface",
        0,
        0,
    )
    .unwrap();
    let first: BTreeSet<usize> = [0, 1].into_iter().collect();
    let second: BTreeSet<usize> = [2, 3].into_iter().collect();
    let a = cutter.restricted_to(&first).unwrap();
    let b = cutter.restricted_to(&second).unwrap();
    assert_eq!(a.nodes().len(), 6);
    assert_eq!(a.conditions()[0].elements(), &first);

    let mut merged = a.clone();
    merged.merge(b).unwrap();
    assert_eq!(merged, cutter);

    // Merging the same data twice is harmless
    merged.merge(a).unwrap();
    assert_eq!(merged, cutter);

    let mut conflicting = Discretization::new();
    conflicting.insert_node(0, Point3::new(5.0, 0.0, 0.0));
    assert_eq!(merged.merge(conflicting), Err(MeshError::ConflictingNode(0)));
}

#[test]
fn renumbering_elements() {
    let cutter = create_parametric_surface_cutter(
        ElementShape::Tri3,
        1,
        1,
        |u: f64, v: f64| Point3::new(u, v, 0.0),
        "interface",
        0,
        5,
    )
    .unwrap();
    let (renumbered, id_map) = cutter.renumber_elements(100);
    assert_eq!(id_map, [(5, 100), (6, 101)].into_iter().collect());
    assert_eq!(renumbered.element(100).unwrap().id(), 100);
    assert_eq!(renumbered.element(101).unwrap().nodes(), cutter.element(6).unwrap().nodes());
    assert_eq!(
        renumbered.conditions()[0].elements(),
        &[100, 101].into_iter().collect::<BTreeSet<_>>()
    );
    assert_eq!(renumbered.nodes(), cutter.nodes());
}

#[test]
fn displacement_moves_only_displaced_nodes() {
    let mesh = create_unit_box_uniform_hex_discretization::<f64>(1);
    let displacements: BTreeMap<usize, Vector3<f64>> = [(0, Vector3::new(0.1, 0.0, 0.0))].into_iter().collect();
    let displaced = mesh.displaced(&displacements);
    assert_eq!(displaced.node(0), Some(&Point3::new(0.1, 0.0, 0.0)));
    for id in 1..8 {
        assert_eq!(displaced.node(id), mesh.node(id));
    }
    assert_eq!(displaced.elements(), mesh.elements());
}

#[test]
fn discretization_serialization() {
    let cutter = create_parametric_surface_cutter(
        ElementShape::Quad9,
        1,
        2,
        |u: f64, v: f64| Point3::new(u, v, (u + v).sin()),
        "interface",
        0,
        0,
    )
    .unwrap();
    let json = serde_json::to_string(&cutter).unwrap();
    let deserialized: Discretization<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, cutter);
}
