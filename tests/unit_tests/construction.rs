use matrixcompare::assert_matrix_eq;
use nalgebra::{Point2, Point3, Vector3};
use proptest::prelude::*;
use util::assert_panics;
use xcut::construction::{collect_pair_points, construct_pair_interface, convex_polygon_order};
use xcut::element::{ElementGeometry, ElementShape};
use xcut::interface::{ElementAccumulator, PointType};
use xcut::optimize::newton::NewtonSettings;
use xcut::proptest::horizontal_cutter_corners;

fn planar_cutter(z: f64) -> ElementGeometry<f64> {
    ElementGeometry::quad([
        Point3::new(-2.0, -2.0, z),
        Point3::new(2.0, -2.0, z),
        Point3::new(2.0, 2.0, z),
        Point3::new(-2.0, 2.0, z),
    ])
}

fn newton() -> NewtonSettings<f64> {
    NewtonSettings::with_max_iterations(30)
}

#[test]
fn plane_through_hex_crosses_vertical_edges() {
    let xfem = ElementGeometry::reference(ElementShape::Hex8);
    let cutter = planar_cutter(0.0);
    let (points, depth_cap_hits) = collect_pair_points(&xfem, &cutter, &newton(), 16).unwrap();
    assert_eq!(depth_cap_hits, 0);
    assert_eq!(points.len(), 4);

    for point in &points {
        assert_eq!(point.xfem.point_type, PointType::Intersection);
        assert_eq!(point.xfem.num_surfaces(), 2);
        let xi = point.xfem.coord;
        assert_matrix_eq!(
            xi,
            Vector3::new(xi.x.signum(), xi.y.signum(), 0.0),
            comp = abs,
            tol = 1e-10
        );
        // The cutter spans [-2, 2]^2, so its reference coordinates are halved
        assert_matrix_eq!(point.cutter, Vector3::new(xi.x / 2.0, xi.y / 2.0, 0.0), comp = abs, tol = 1e-10);
    }
}

#[test]
fn plane_through_hex_is_fanned_from_center() {
    let xfem = ElementGeometry::reference(ElementShape::Hex8);
    let cutter = planar_cutter(0.0);
    let mut accumulator = ElementAccumulator::new(ElementShape::Hex8);
    let outcome = construct_pair_interface(&mut accumulator, &xfem, &cutter, 0, 7, &newton(), 16).unwrap();

    assert_eq!(outcome.num_points, 4);
    assert_eq!(outcome.face_marker, Some(0));
    assert_eq!(accumulator.intersecting_cutter_elements(), &[7]);
    // 8 corners, 4 edge crossings and the center of the fan
    assert_eq!(accumulator.points().len(), 13);
    assert_eq!(accumulator.triangles().len(), 4);
    assert!(accumulator.face_markers().iter().all(|marker| *marker == 0));

    let center = accumulator.find_point(&Point3::origin()).expect("Fan center is stored");
    assert!(accumulator
        .triangles()
        .iter()
        .all(|triangle| triangle.contains(&center)));

    // One segment on each of the side facets, none on the top or bottom facets
    let segments = accumulator.segments();
    assert!(segments[0].is_empty());
    assert!(segments[5].is_empty());
    for facet in 1..5 {
        assert_eq!(segments[facet].len(), 1);
    }
    assert!(accumulator.surface_points().iter().all(Vec::is_empty));
}

#[test]
fn repeated_construction_reuses_points() {
    let xfem = ElementGeometry::reference(ElementShape::Hex8);
    let cutter = planar_cutter(0.0);
    let mut accumulator = ElementAccumulator::new(ElementShape::Hex8);
    construct_pair_interface(&mut accumulator, &xfem, &cutter, 0, 7, &newton(), 16).unwrap();
    let num_points = accumulator.points().len();
    let outcome = construct_pair_interface(&mut accumulator, &xfem, &cutter, 0, 7, &newton(), 16).unwrap();

    assert_eq!(outcome.face_marker, Some(0));
    assert_eq!(accumulator.points().len(), num_points);
    assert_eq!(accumulator.intersecting_cutter_elements().len(), 1);
    for facet in 1..5 {
        assert_eq!(accumulator.segments()[facet].len(), 1);
    }
}

#[test]
fn store_point_deduplicates_within_tolerance() {
    let mut accumulator = ElementAccumulator::<f64>::new(ElementShape::Tet4);
    assert_eq!(accumulator.points().len(), 4);
    assert!(!accumulator.has_interface());

    let a = accumulator.store_point(Point3::new(0.1, 0.2, 0.3));
    let b = accumulator.store_point(Point3::new(0.1 + 1e-9, 0.2, 0.3 - 1e-9));
    assert_eq!(a, 4);
    assert_eq!(a, b);
    assert_eq!(accumulator.store_point(Point3::new(-1.0, -1.0, -1.0)), 0);
    assert_eq!(accumulator.points().len(), 5);
    assert!(accumulator.has_interface());
}

#[test]
fn cutter_skimming_a_facet_into_the_element_is_left_to_the_neighbor() {
    let xfem = ElementGeometry::reference(ElementShape::Hex8);
    // Normal +z points into the element through its bottom facet
    let cutter = planar_cutter(-1.0);
    let mut accumulator = ElementAccumulator::new(ElementShape::Hex8);
    let outcome = construct_pair_interface(&mut accumulator, &xfem, &cutter, 0, 3, &newton(), 16).unwrap();

    assert_eq!(outcome.num_points, 4);
    assert!(accumulator.triangles().is_empty());
    assert!(accumulator.skimming_triangles().is_empty());
    assert!(!accumulator.is_cut());
    // The bottom corners coincide with the stored corner nodes
    assert_eq!(accumulator.points().len(), 8);
    assert_eq!(accumulator.segments()[0].len(), 4);
}

#[test]
fn cutter_skimming_a_facet_out_of_the_element_becomes_surface_triangles() {
    let xfem = ElementGeometry::reference(ElementShape::Hex8);
    let cutter = ElementGeometry::quad([
        Point3::new(-2.0, -2.0, -1.0),
        Point3::new(-2.0, 2.0, -1.0),
        Point3::new(2.0, 2.0, -1.0),
        Point3::new(2.0, -2.0, -1.0),
    ]);
    let mut accumulator = ElementAccumulator::new(ElementShape::Hex8);
    let outcome = construct_pair_interface(&mut accumulator, &xfem, &cutter, 0, 3, &newton(), 16).unwrap();

    assert_eq!(outcome.num_points, 4);
    assert_eq!(outcome.face_marker, Some(0));
    assert!(accumulator.triangles().is_empty());
    assert!(accumulator.is_cut());
    // Corner nodes plus the center of the bottom facet
    assert_eq!(accumulator.points().len(), 9);
    assert_matrix_eq!(accumulator.points()[8].coords, Vector3::new(0.0, 0.0, -1.0), comp = abs, tol = 1e-12);
    assert_eq!(accumulator.segments()[0].len(), 8);

    let triangles = accumulator.skimming_triangles();
    assert_eq!(triangles.len(), 4);
    let mut area = 0.0;
    for (triangle, marker) in triangles {
        assert_eq!(*marker, 0);
        let [a, b, c] = triangle.map(|i| accumulator.points()[i]);
        let n = (b - a).cross(&(c - a));
        assert!(n.z < 0.0);
        area += 0.5 * n.norm();
    }
    assert!((area - 4.0).abs() < 1e-12);
}

#[test]
fn concave_polygon_is_ordered_along_its_hull() {
    let points = [
        Point2::new(-1.0, -1.0),
        Point2::new(1.0, -1.0),
        Point2::new(1.0, 1.0),
        Point2::new(-1.0, 1.0),
        Point2::new(0.0, 0.0),
    ];
    assert_eq!(convex_polygon_order(&points, 1e-12), vec![0, 1, 2, 3]);

    let triangle = [Point2::new(1.0, 0.0), Point2::new(0.0, 1.0), Point2::new(0.0, 0.0)];
    let order = convex_polygon_order(&triangle, 1e-12);
    assert_eq!(order.len(), 3);
    let area: f64 = (0..3)
        .map(|i| {
            let (p, q) = (triangle[order[i]], triangle[order[(i + 1) % 3]]);
            p.x * q.y - p.y * q.x
        })
        .sum();
    assert!(area > 0.0);

    let segment = [Point2::new(1.0, 0.0), Point2::new(0.0, 0.0)];
    assert_eq!(convex_polygon_order(&segment, 1e-12), vec![0, 1]);
}

#[test]
fn cutter_outside_element_yields_nothing() {
    let xfem = ElementGeometry::reference(ElementShape::Tet4);
    let cutter = planar_cutter(3.0);
    let mut accumulator = ElementAccumulator::new(ElementShape::Tet4);
    let outcome = construct_pair_interface(&mut accumulator, &xfem, &cutter, 0, 0, &newton(), 16).unwrap();
    assert_eq!(outcome.num_points, 0);
    assert_eq!(outcome.face_marker, None);
    assert!(!accumulator.has_interface());
}

#[test]
fn accumulator_rejects_dangling_indices() {
    let mut accumulator = ElementAccumulator::<f64>::new(ElementShape::Tet4);
    accumulator.store_segment(0, 0, 1);
    accumulator.store_segment(0, 1, 0);
    accumulator.store_segment(0, 2, 2);
    assert_eq!(accumulator.segments()[0], vec![[0, 1]]);

    assert_panics!({
        let mut accumulator = accumulator.clone();
        accumulator.store_segment(0, 0, 4)
    });
    assert_panics!({
        let mut accumulator = accumulator.clone();
        accumulator.store_triangle([0, 1, 2], 0)
    });
}

proptest! {
    #[test]
    fn horizontal_cutter_fans_the_whole_cross_section(corners in horizontal_cutter_corners()) {
        let xfem = ElementGeometry::reference(ElementShape::Hex8);
        let cutter = ElementGeometry::quad(corners);
        let mut accumulator = ElementAccumulator::new(ElementShape::Hex8);
        let outcome = construct_pair_interface(&mut accumulator, &xfem, &cutter, 0, 0, &newton(), 16).unwrap();

        prop_assert_eq!(outcome.num_points, 4);
        prop_assert_eq!(accumulator.triangles().len(), 4);
        prop_assert!(accumulator.skimming_triangles().is_empty());
        let mut area = 0.0;
        for triangle in accumulator.triangles() {
            let [a, b, c] = triangle.map(|i| accumulator.points()[i]);
            let n = (b - a).cross(&(c - a));
            prop_assert!(n.z > 0.0);
            area += 0.5 * n.norm();
        }
        prop_assert!((area - 4.0).abs() < 1e-10);
    }
}
