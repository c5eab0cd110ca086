use itertools::Itertools;
use nalgebra::{Point2, RealField};
use ordered_float::OrderedFloat;

fn orient2d<T: RealField + Copy>(a: &Point2<T>, b: &Point2<T>, c: &Point2<T>) -> T {
    let ab = b - a;
    let ac = c - a;
    ab.x * ac.y - ab.y * ac.x
}

/// Computes the 2D convex hull of the given points and returns the hull vertex indices in
/// counter-clockwise order.
///
/// Points lying on a hull edge (within `tolerance` of collinearity) are kept as hull vertices.
/// If all points are collinear, the indices are returned in order along the line.
pub fn convex_hull_2d<T>(points: &[Point2<T>], tolerance: T) -> Vec<usize>
where
    T: RealField + Copy,
{
    let to_f64 = |x: T| OrderedFloat(x.to_subset().unwrap_or(f64::NAN));
    let sorted: Vec<usize> = (0..points.len())
        .sorted_by_key(|&i| (to_f64(points[i].x), to_f64(points[i].y)))
        .collect();

    if sorted.len() <= 2 {
        return sorted;
    }

    let first = &points[sorted[0]];
    let last = &points[sorted[sorted.len() - 1]];
    let all_collinear = sorted
        .iter()
        .all(|&i| orient2d(first, last, &points[i]).abs() <= tolerance);
    if all_collinear {
        return sorted;
    }

    let build_chain = |indices: &mut dyn Iterator<Item = usize>| {
        let mut chain: Vec<usize> = Vec::new();
        for i in indices {
            while chain.len() >= 2 {
                let a = &points[chain[chain.len() - 2]];
                let b = &points[chain[chain.len() - 1]];
                // Only strictly clockwise turns are removed, so collinear boundary points survive
                if orient2d(a, b, &points[i]) < -tolerance {
                    chain.pop();
                } else {
                    break;
                }
            }
            chain.push(i);
        }
        chain
    };

    let mut lower = build_chain(&mut sorted.iter().copied());
    let mut upper = build_chain(&mut sorted.iter().rev().copied());
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}
