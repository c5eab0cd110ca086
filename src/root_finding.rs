//! Curve-surface root finding.
//!
//! All solvers here intersect a line element `X_l(t)` with a surface element `X_s(r, s)` by
//! solving `F(r, s, t) = X_s(r, s) - X_l(t) = 0` with Newton iterations. Solutions are packed as
//! `xsi = (r, s, t)`.
use crate::element::ElementGeometry;
use crate::Real;
use log::{trace, warn};
use nalgebra::{Matrix3, Point3, Vector3};
use numeric_literals::replace_float_literals;
use xcut_geometry::TOL7;
use xcut_optimize::newton::{newton_3d, DifferentiableVectorFunction3, NewtonResult, NewtonSettings};

/// Normalized determinants below this value indicate a line (numerically) tangent to the surface.
const TANGENCY_TOLERANCE: f64 = 1e-8;

struct CurveSurfaceSystem<'a, T: Real> {
    surface: &'a ElementGeometry<T>,
    line: &'a ElementGeometry<T>,
}

fn surface_coords<T: Real>(xsi: &Vector3<T>) -> Vector3<T> {
    Vector3::new(xsi.x, xsi.y, T::zero())
}

fn line_coords<T: Real>(xsi: &Vector3<T>) -> Vector3<T> {
    Vector3::new(xsi.z, T::zero(), T::zero())
}

impl<'a, T: Real> DifferentiableVectorFunction3<T> for CurveSurfaceSystem<'a, T> {
    fn eval(&mut self, xsi: &Vector3<T>) -> Vector3<T> {
        self.surface.map_reference_coords(&surface_coords(xsi)) - self.line.map_reference_coords(&line_coords(xsi))
    }

    fn jacobian(&mut self, xsi: &Vector3<T>) -> Matrix3<T> {
        let j_surface = self.surface.reference_jacobian(&surface_coords(xsi));
        let j_line = self.line.reference_jacobian(&line_coords(xsi));
        let mut j = Matrix3::zeros();
        j.set_column(0, &j_surface.column(0));
        j.set_column(1, &j_surface.column(1));
        j.set_column(2, &(-j_line.column(0)));
        j
    }
}

/// An accepted root of the curve-surface system.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CurveSurfaceRoot<T: Real> {
    /// Surface coordinates `(r, s)` followed by the line coordinate `t`.
    pub xsi: Vector3<T>,
    /// The physical intersection point, evaluated on the line.
    pub point: Point3<T>,
    pub iterations: usize,
}

impl<T: Real> CurveSurfaceRoot<T> {
    pub fn surface_coords(&self) -> Vector3<T> {
        surface_coords(&self.xsi)
    }

    pub fn line_coords(&self) -> Vector3<T> {
        line_coords(&self.xsi)
    }
}

fn solve<T: Real>(
    surface: &ElementGeometry<T>,
    line: &ElementGeometry<T>,
    start: &Vector3<T>,
    settings: &NewtonSettings<T>,
) -> Option<(NewtonResult<T>, CurveSurfaceRoot<T>)> {
    let mut system = CurveSurfaceSystem { surface, line };
    match newton_3d(&mut system, *start, settings) {
        // Least-squares steps may stall away from a root, which is not an intersection
        Ok(result) if result.residual_norm > T::from_f64(TOL7).unwrap() * (T::one() + line.diameter()) => {
            trace!(
                "Curve-surface Newton iteration stalled with residual {:?}",
                result.residual_norm
            );
            None
        }
        Ok(result) => {
            let root = CurveSurfaceRoot {
                xsi: result.solution,
                point: line.map_reference_coords(&line_coords(&result.solution)),
                iterations: result.iterations,
            };
            Some((result, root))
        }
        Err(err) => {
            trace!("Curve-surface Newton iteration failed: {}", err);
            None
        }
    }
}

/// Whether the line is tangent to the surface at the given root, in which case roots are
/// not isolated.
fn is_tangent<T: Real>(surface: &ElementGeometry<T>, line: &ElementGeometry<T>, xsi: &Vector3<T>) -> bool {
    let j = CurveSurfaceSystem { surface, line }.jacobian(xsi);
    let scale = j.column(0).norm() * j.column(1).norm() * j.column(2).norm();
    if scale <= T::zero() {
        return true;
    }
    j.determinant().abs() <= T::from_f64(TANGENCY_TOLERANCE).unwrap() * scale
}

/// Intersects a line element with a surface element, starting from `start`.
///
/// The root is accepted only if it lies in the box `[lower - TOL7, upper + TOL7]` and within
/// the reference domains of both elements (widened by `TOL7`). Non-convergence is not an
/// error; it simply yields no root.
pub fn intersect_curve_surface<T: Real>(
    surface: &ElementGeometry<T>,
    line: &ElementGeometry<T>,
    start: &Vector3<T>,
    lower: &Vector3<T>,
    upper: &Vector3<T>,
    settings: &NewtonSettings<T>,
) -> Option<CurveSurfaceRoot<T>> {
    let tol = T::from_f64(TOL7).unwrap();
    let (_, root) = solve(surface, line, start, settings)?;
    let xsi = &root.xsi;

    let in_box = (0..3).all(|i| xsi[i] >= lower[i] - tol && xsi[i] <= upper[i] + tol);
    let in_domains = surface
        .shape()
        .contains_reference_point(&root.surface_coords(), tol)
        && line.shape().contains_reference_point(&root.line_coords(), tol);

    if in_box && in_domains {
        trace!("Accepted curve-surface root {:?} after {} iterations", xsi, root.iterations);
        Some(root)
    } else {
        None
    }
}

/// All roots found by [`enumerate_curve_surface_intersections`].
#[derive(Debug, Clone, PartialEq)]
pub struct CurveSurfaceRoots<T: Real> {
    pub roots: Vec<CurveSurfaceRoot<T>>,
    /// Number of search boxes that were not subdivided further because of the depth cap.
    pub depth_cap_hits: usize,
}

#[derive(Debug, Clone)]
struct SearchBox<T: Real> {
    lower: Vector3<T>,
    upper: Vector3<T>,
    depth: usize,
}

/// Finds all isolated intersections of a line element with a surface element.
///
/// The parameter box `[-1, 1]^3` is searched with a Newton solve from its midpoint. Whenever a
/// new root is found, the box is split into the 8 sub-boxes (surface quadrants times line
/// halves) around the root, and each is searched in turn. A branch terminates when its solve
/// fails, reproduces a known root, or its box degenerates. Boxes deeper than `max_depth` are not
/// subdivided; every such occurrence is counted in `depth_cap_hits`.
///
/// Roots where the line is tangent to the surface are discarded, since they are not isolated.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn enumerate_curve_surface_intersections<T: Real>(
    surface: &ElementGeometry<T>,
    line: &ElementGeometry<T>,
    settings: &NewtonSettings<T>,
    max_depth: usize,
) -> CurveSurfaceRoots<T> {
    let tol = T::from_f64(TOL7).unwrap();
    let mut roots: Vec<CurveSurfaceRoot<T>> = Vec::new();
    let mut depth_cap_hits = 0;

    let mut stack = vec![SearchBox {
        lower: Vector3::repeat(-1.0),
        upper: Vector3::repeat(1.0),
        depth: 0,
    }];

    while let Some(search_box) = stack.pop() {
        let start = (search_box.lower + search_box.upper) * 0.5;
        let root = match intersect_curve_surface(surface, line, &start, &search_box.lower, &search_box.upper, settings)
        {
            Some(root) => root,
            None => continue,
        };

        if roots.iter().any(|r| (r.xsi - root.xsi).amax() <= tol) {
            continue;
        }
        if is_tangent(surface, line, &root.xsi) {
            trace!("Discarding tangent curve-surface root {:?}", root.xsi);
            continue;
        }
        roots.push(root);

        if search_box.depth >= max_depth {
            warn!(
                "Curve-surface root enumeration reached maximum subdivision depth {}",
                max_depth
            );
            depth_cap_hits += 1;
            continue;
        }

        let center = Vector3::from_fn(|i, _| root.xsi[i].max(search_box.lower[i]).min(search_box.upper[i]));
        for octant in 0..8 {
            let mut lower = search_box.lower;
            let mut upper = search_box.upper;
            for i in 0..3 {
                if octant & (1 << i) == 0 {
                    upper[i] = center[i];
                } else {
                    lower[i] = center[i];
                }
            }
            let degenerate = (0..3).any(|i| upper[i] - lower[i] < tol);
            if !degenerate {
                stack.push(SearchBox {
                    lower,
                    upper,
                    depth: search_box.depth + 1,
                });
            }
        }
    }

    CurveSurfaceRoots { roots, depth_cap_hits }
}

/// Intersects the line through `point` along `direction` with a surface element.
///
/// The line runs from `point - direction` to `point + direction`, and the root is accepted
/// whenever the surface coordinates lie in the surface's reference domain (widened by `TOL7`),
/// irrespective of the line coordinate.
pub fn solve_recovery_normal<T: Real>(
    surface: &ElementGeometry<T>,
    point: &Point3<T>,
    direction: &Vector3<T>,
    start: &Vector3<T>,
    settings: &NewtonSettings<T>,
) -> Option<CurveSurfaceRoot<T>> {
    let tol = T::from_f64(TOL7).unwrap();
    let line = ElementGeometry::line_segment(point - direction, point + direction);
    let (_, root) = solve(surface, &line, start, settings)?;
    surface
        .shape()
        .contains_reference_point(&root.surface_coords(), tol)
        .then_some(root)
}

/// Intersects a cutter line element with an auxiliary bilinear plane element.
///
/// The root is accepted whenever the line coordinate satisfies `|t| <= 1 + TOL7`, irrespective
/// of the plane coordinates.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn solve_recovery_plane<T: Real>(
    plane: &ElementGeometry<T>,
    line: &ElementGeometry<T>,
    start: &Vector3<T>,
    settings: &NewtonSettings<T>,
) -> Option<CurveSurfaceRoot<T>> {
    let tol = T::from_f64(TOL7).unwrap();
    let (_, root) = solve(plane, line, start, settings)?;
    (root.xsi.z.abs() <= 1.0 + tol).then_some(root)
}
