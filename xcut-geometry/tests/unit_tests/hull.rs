use nalgebra::point;
use xcut_geometry::convex_hull_2d;

#[test]
fn hull_of_square_is_counter_clockwise() {
    let points = [point![1.0, 1.0], point![0.0, 0.0], point![0.0, 1.0], point![1.0, 0.0]];
    let hull = convex_hull_2d(&points, 1e-12);
    assert_eq!(hull, vec![1, 3, 0, 2]);
}

#[test]
fn hull_keeps_points_on_edges() {
    let points = [
        point![0.0, 0.0],
        point![2.0, 0.0],
        point![2.0, 2.0],
        point![0.0, 2.0],
        point![1.0, 0.0],
    ];
    let hull = convex_hull_2d(&points, 1e-12);
    assert_eq!(hull, vec![0, 4, 1, 2, 3]);
}

#[test]
fn hull_of_collinear_points_is_ordered_along_line() {
    let points = [point![1.0, 1.0], point![-1.0, -1.0], point![0.0, 0.0]];
    assert_eq!(convex_hull_2d(&points, 1e-12), vec![1, 2, 0]);
}

#[test]
fn hull_of_few_points() {
    assert!(convex_hull_2d::<f64>(&[], 1e-12).is_empty());
    assert_eq!(convex_hull_2d(&[point![0.0, 0.0]], 1e-12), vec![0]);
    assert_eq!(convex_hull_2d(&[point![1.0, 0.0], point![0.0, 0.0]], 1e-12), vec![1, 0]);
}

#[test]
fn hull_drops_interior_points() {
    let points = [
        point![-1.0, -1.0],
        point![1.0, -1.0],
        point![1.0, 1.0],
        point![-1.0, 1.0],
        point![0.0, 0.0],
    ];
    assert_eq!(convex_hull_2d(&points, 1e-12), vec![0, 1, 2, 3]);
}
