//! Construction of the linearized interface of one (xfem element, cutter element) pair.
//!
//! The interface inside the xfem element is approximated by the convex polygon spanned by
//! all points where the cutter element enters, leaves or lies within the xfem element. The
//! polygon is ordered in the cutter element's parameter plane, where the points are coplanar.
use crate::element::{ElementGeometry, ElementShape, FacetSet};
use crate::error::IntersectionError;
use crate::interface::{ElementAccumulator, InterfacePoint, PointType};
use crate::root_finding::enumerate_curve_surface_intersections;
use crate::transform::{current_to_element_local, TransformError};
use crate::Real;
use itertools::Itertools;
use log::{trace, warn};
use nalgebra::{Point2, Point3, Vector3};
use numeric_literals::replace_float_literals;
use xcut_geometry::{convex_hull_2d, TOL7};
use xcut_optimize::newton::NewtonSettings;

/// An interface point of one element pair, known in both element frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairPoint<T: Real> {
    /// Coordinates in the xfem element frame, classified against the xfem facets.
    pub xfem: InterfacePoint<T>,
    /// Coordinates in the cutter element frame.
    pub cutter: Vector3<T>,
}

/// Statistics of constructing the interface of one element pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstructionOutcome {
    /// Number of distinct interface points found for the pair.
    pub num_points: usize,
    /// Face marker of the cutter element, if it intersects the xfem element.
    pub face_marker: Option<usize>,
    pub depth_cap_hits: usize,
}

/// Projects reference coordinates exactly onto the facets they were classified to lie on.
pub(crate) fn snap_to_facets<T: Real>(shape: ElementShape, xi: &Vector3<T>, facets: &FacetSet) -> Vector3<T> {
    let planes = shape.reference_facet_planes::<T>();
    let mut snapped = *xi;
    // Facet planes of the supported shapes are not all orthogonal, so project repeatedly
    for _ in 0..3 {
        for &facet in facets.as_slice() {
            let (n, c) = &planes[facet];
            snapped -= n * (n.dot(&snapped) - *c);
        }
    }
    snapped
}

fn classify<T: Real>(shape: ElementShape, xi: &Vector3<T>, point_type: Option<PointType>) -> InterfacePoint<T> {
    let tol = T::from_f64(TOL7).unwrap();
    let facets = shape.facets_containing(xi, tol);
    let xi = snap_to_facets(shape, xi, &facets);
    match point_type {
        Some(point_type) => InterfacePoint::new(xi, point_type, facets),
        None => InterfacePoint::classified(xi, facets),
    }
}

fn push_unique<T: Real>(points: &mut Vec<PairPoint<T>>, point: PairPoint<T>) {
    let tol = T::from_f64(TOL7).unwrap();
    let exists = points
        .iter()
        .any(|p| (p.xfem.coord - point.xfem.coord).amax() <= tol);
    if !exists {
        points.push(point);
    }
}

/// Collects all interface points of an element pair.
///
/// These are the corner nodes of the cutter element inside the xfem element, the crossings of
/// the cutter lines with the xfem facets and the crossings of the xfem lines with the cutter
/// surface. Points are deduplicated in the xfem frame.
pub fn collect_pair_points<T: Real>(
    xfem: &ElementGeometry<T>,
    cutter: &ElementGeometry<T>,
    newton: &NewtonSettings<T>,
    max_subdivision_depth: usize,
) -> Result<(Vec<PairPoint<T>>, usize), TransformError> {
    let tol = T::from_f64(TOL7).unwrap();
    let xfem_shape = xfem.shape();
    let cutter_shape = cutter.shape();
    let cutter_reference_nodes = cutter_shape.reference_nodes::<T>();
    let mut points = Vec::new();
    let mut depth_cap_hits = 0;

    for (node, x) in cutter
        .vertices()
        .iter()
        .enumerate()
        .take(cutter_shape.num_corner_nodes())
    {
        let xi = match current_to_element_local(xfem, x) {
            Ok(xi) => xi,
            Err(err) if err.is_fatal() => return Err(err),
            Err(_) => continue,
        };
        if xfem_shape.contains_reference_point(&xi, tol) {
            push_unique(
                &mut points,
                PairPoint {
                    xfem: classify(xfem_shape, &xi, None),
                    cutter: cutter_reference_nodes[node].coords,
                },
            );
        }
    }

    let facet_shape = xfem_shape
        .facet_shape()
        .expect("Volumetric elements have facet elements");
    for (line_idx, line_nodes) in cutter_shape.lines().iter().enumerate() {
        let line = cutter.line(line_idx);
        for (facet_idx, facet_nodes) in xfem_shape.facets().iter().enumerate() {
            let facet = xfem.facet(facet_idx);
            let roots = enumerate_curve_surface_intersections(&facet, &line, newton, max_subdivision_depth);
            depth_cap_hits += roots.depth_cap_hits;
            for root in roots.roots {
                let xi = xfem_shape.embed_reference_coords(facet_nodes, facet_shape, &root.surface_coords());
                let eta = cutter_shape.embed_reference_coords(line_nodes, cutter_shape.line_shape(), &root.line_coords());
                push_unique(
                    &mut points,
                    PairPoint {
                        xfem: classify(xfem_shape, &xi, Some(PointType::Intersection)),
                        cutter: eta,
                    },
                );
            }
        }
    }

    for (line_idx, line_nodes) in xfem_shape.lines().iter().enumerate() {
        let line = xfem.line(line_idx);
        let roots = enumerate_curve_surface_intersections(cutter, &line, newton, max_subdivision_depth);
        depth_cap_hits += roots.depth_cap_hits;
        for root in roots.roots {
            let xi = xfem_shape.embed_reference_coords(line_nodes, xfem_shape.line_shape(), &root.line_coords());
            push_unique(
                &mut points,
                PairPoint {
                    xfem: classify(xfem_shape, &xi, Some(PointType::Intersection)),
                    cutter: root.surface_coords(),
                },
            );
        }
    }

    Ok((points, depth_cap_hits))
}

/// Orders points along their convex hull in the plane, counter-clockwise.
///
/// Up to two points are returned in their original order. Points strictly inside the hull can
/// only arise from curved elements; they are dropped with a warning.
pub fn convex_polygon_order<T: Real>(points: &[Point2<T>], tolerance: T) -> Vec<usize> {
    if points.len() <= 2 {
        return (0..points.len()).collect();
    }
    let hull = convex_hull_2d(points, tolerance);
    if hull.len() < points.len() {
        warn!(
            "Interface polygon is concave, dropping {} of {} points inside its convex hull",
            points.len() - hull.len(),
            points.len()
        );
    }
    hull
}

/// Twice the signed area of a polygon given by ordered vertices.
#[replace_float_literals(T::from_f64(literal).unwrap())]
fn polygon_area_2d<T: Real>(polygon: &[Point2<T>]) -> T {
    polygon
        .iter()
        .circular_tuple_windows()
        .map(|(a, b)| a.x * b.y - a.y * b.x)
        .fold(0.0, |acc, x| acc + x)
}

/// Builds the linearized interface of one element pair and stores it in the accumulator.
///
/// The points are ordered along the convex hull in the cutter parameter plane and the polygon is
/// fanned from its center, with the triangles tagged with the face marker of the cutter element.
/// Polygon edges on xfem facets become segments of those facets, and boundary points not covered
/// by any segment are stored as surface points. If all points lie on a common xfem facet, the
/// cutter skims the element and the fan is stored as skimming triangles on that facet, see
/// [`ElementAccumulator::skimming_triangles`].
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn construct_pair_interface<T: Real>(
    accumulator: &mut ElementAccumulator<T>,
    xfem: &ElementGeometry<T>,
    cutter: &ElementGeometry<T>,
    xfem_id: usize,
    cutter_id: usize,
    newton: &NewtonSettings<T>,
    max_subdivision_depth: usize,
) -> Result<ConstructionOutcome, IntersectionError> {
    let tol = T::from_f64(TOL7).unwrap();
    let (points, depth_cap_hits) = collect_pair_points(xfem, cutter, newton, max_subdivision_depth)?;
    let mut outcome = ConstructionOutcome {
        num_points: points.len(),
        face_marker: None,
        depth_cap_hits,
    };
    if points.is_empty() {
        return Ok(outcome);
    }
    trace!(
        "Cutter element {} has {} interface points in xfem element {}",
        cutter_id,
        points.len(),
        xfem_id
    );

    let parametric: Vec<Point2<T>> = points
        .iter()
        .map(|p| Point2::new(p.cutter.x, p.cutter.y))
        .collect();
    let order = convex_polygon_order(&parametric, tol);
    let polygon: Vec<PairPoint<T>> = order.iter().map(|i| points[*i]).collect();

    let marker = accumulator.register_cutter_element(cutter_id);
    outcome.face_marker = Some(marker);
    let indices: Vec<usize> = polygon
        .iter()
        .map(|p| accumulator.store_point(Point3::from(p.xfem.coord)))
        .collect();

    let common_facets = polygon
        .iter()
        .skip(1)
        .fold(*polygon[0].xfem.facet_set(), |common, p| common.intersection(p.xfem.facet_set()));

    let ordered_parametric: Vec<Point2<T>> = order.iter().map(|i| parametric[*i]).collect();
    let is_flat = polygon.len() < 3 || polygon_area_2d(&ordered_parametric).abs() <= tol * tol;

    if polygon.len() >= 2 {
        // Collinear points form an open chain rather than a closed polygon
        let edges: Vec<(usize, usize)> = if is_flat {
            (1..polygon.len()).map(|i| (i - 1, i)).collect()
        } else {
            (0..polygon.len()).map(|i| (i, (i + 1) % polygon.len())).collect()
        };
        for (i, j) in edges {
            let shared = polygon[i].xfem.facet_set().intersection(polygon[j].xfem.facet_set());
            for &facet in shared.as_slice() {
                accumulator.store_segment(facet, indices[i], indices[j]);
            }
        }
    }

    for (point, &idx) in polygon.iter().zip(&indices) {
        for &facet in point.xfem.surfaces() {
            let on_segment = accumulator.segments()[facet]
                .iter()
                .any(|segment| segment.contains(&idx));
            if !on_segment {
                accumulator.store_surface_point(facet, idx);
            }
        }
    }

    if is_flat {
        return Ok(outcome);
    }

    let n = T::from_usize(polygon.len()).unwrap();
    let center_cutter = polygon.iter().fold(Vector3::zeros(), |acc, p| acc + p.cutter) / n;
    let center_physical = cutter.map_reference_coords(&center_cutter);
    let center_xfem = match current_to_element_local(xfem, &center_physical) {
        Ok(xi) => xi,
        Err(err) if err.is_fatal() => return Err(err.into()),
        // Fall back to the average of the polygon in the xfem frame
        Err(_) => polygon.iter().fold(Vector3::zeros(), |acc, p| acc + p.xfem.coord) / n,
    };

    if let Some(&facet) = common_facets.as_slice().first() {
        let cutter_normal = cutter.surface_normal(&center_cutter);
        store_skimming_polygon(accumulator, xfem, cutter_normal, center_xfem, facet, &indices, marker);
        return Ok(outcome);
    }

    let center = accumulator.store_point(Point3::from(center_xfem));
    for (a, b) in indices.iter().circular_tuple_windows() {
        if center != *a && center != *b {
            accumulator.store_triangle([center, *a, *b], marker);
        }
    }

    Ok(outcome)
}

/// Stores the fan of a polygon lying in the xfem facet `facet`.
///
/// A facet is shared with the neighboring element, which finds the same polygon. Only the element
/// the cutter normal points out of keeps the fan, the other one only keeps the facet segments.
/// The fan triangles are oriented like the cutter surface.
#[replace_float_literals(T::from_f64(literal).unwrap())]
fn store_skimming_polygon<T: Real>(
    accumulator: &mut ElementAccumulator<T>,
    xfem: &ElementGeometry<T>,
    cutter_normal: Option<Vector3<T>>,
    center_xfem: Vector3<T>,
    facet: usize,
    indices: &[usize],
    marker: usize,
) {
    let shape = xfem.shape();
    let center_xfem = snap_to_facets(shape, &center_xfem, &FacetSet::from_slice(&[facet]));
    let (facet_normal, _) = shape.reference_facet_planes::<T>()[facet];
    let outward = xfem.reference_jacobian(&center_xfem) * facet_normal;
    let cutter_normal = match cutter_normal {
        Some(normal) if outward.dot(&normal) > 0.0 => normal,
        _ => {
            trace!("Interface on facet {} belongs to the neighboring element", facet);
            return;
        }
    };

    let center = accumulator.store_point(Point3::from(center_xfem));
    for (a, b) in indices.iter().circular_tuple_windows() {
        if center == *a || center == *b {
            continue;
        }
        let [x_center, x_a, x_b] = [center, *a, *b].map(|i| xfem.map_reference_coords(&accumulator.points()[i].coords));
        let triangle = if (x_a - x_center).cross(&(x_b - x_center)).dot(&cutter_normal) < 0.0 {
            [center, *b, *a]
        } else {
            [center, *a, *b]
        };
        accumulator.store_segment(facet, center, *a);
        accumulator.store_skimming_triangle(triangle, marker);
    }
}
