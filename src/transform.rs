//! Coordinate transforms between reference, element-local and physical ("current") coordinates.
use crate::element::ElementGeometry;
use crate::Real;
use log::trace;
use nalgebra::{Matrix3, Point3, Vector3};
use numeric_literals::replace_float_literals;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use xcut_optimize::newton::{newton_3d, DifferentiableVectorFunction3, NewtonError, NewtonSettings};

/// Determinants below this magnitude mark an element as degenerate.
pub const MIN_JACOBIAN_DETERMINANT: f64 = 1e-16;

#[derive(Debug, Clone, PartialEq)]
pub enum TransformError {
    /// The element Jacobian is singular at the element centroid. Always fatal.
    DegenerateJacobian { determinant: f64 },
    /// The inverse mapping did not converge, typically for points far outside the element.
    NotConverged(NewtonError),
    /// Inverse mapping is only available for volumetric elements.
    NotVolumetric,
}

impl TransformError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransformError::NotConverged(_))
    }
}

impl Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::DegenerateJacobian { determinant } => {
                write!(f, "Negative or zero Jacobian determinant ({:e}).", determinant)
            }
            TransformError::NotConverged(err) => {
                write!(f, "Inverse element mapping did not converge. Error: {}", err)
            }
            TransformError::NotVolumetric => write!(f, "Inverse element mapping requires a volumetric element."),
        }
    }
}

impl Error for TransformError {}

/// Maps reference coordinates to physical coordinates.
pub fn element_to_current<T: Real>(element: &ElementGeometry<T>, xi: &Vector3<T>) -> Point3<T> {
    element.map_reference_coords(xi)
}

struct InverseMapping<'a, T: Real> {
    element: &'a ElementGeometry<T>,
    target: Point3<T>,
}

impl<'a, T: Real> DifferentiableVectorFunction3<T> for InverseMapping<'a, T> {
    fn eval(&mut self, xi: &Vector3<T>) -> Vector3<T> {
        self.element.map_reference_coords(xi) - self.target
    }

    fn jacobian(&mut self, xi: &Vector3<T>) -> Matrix3<T> {
        self.element.reference_jacobian(xi)
    }
}

/// Maps a physical point to the reference coordinates of a volumetric element.
///
/// The mapping is inverted by Newton iterations over the element's own shape functions,
/// starting from the reference centroid. The result is not restricted to the reference
/// element; callers apply the parameter space test themselves.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn current_to_element_local<T: Real>(
    element: &ElementGeometry<T>,
    x: &Point3<T>,
) -> Result<Vector3<T>, TransformError> {
    if element.shape().reference_dim() != 3 {
        return Err(TransformError::NotVolumetric);
    }

    let xi0 = element.shape().reference_centroid();
    let determinant = element.reference_jacobian(&xi0).determinant();
    if determinant.abs() < T::from_f64(MIN_JACOBIAN_DETERMINANT).unwrap() {
        return Err(TransformError::DegenerateJacobian {
            determinant: determinant.to_subset().unwrap_or(f64::NAN),
        });
    }

    let settings = NewtonSettings {
        max_iterations: Some(50),
        tolerance: 1e-14,
        step_tolerance: 1e-14,
        singular_tolerance: 1e-14,
        max_singular_steps: 0,
    };
    let mut function = InverseMapping { element, target: *x };
    let result = newton_3d(&mut function, xi0, &settings).map_err(TransformError::NotConverged)?;
    trace!("Inverse mapping converged in {} iterations", result.iterations);
    Ok(result.solution)
}

/// Result of projecting a physical point onto a line or surface element.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SurfaceProjection<T: Real> {
    /// Reference coordinates of the projection, trailing components zero.
    pub xi: Vector3<T>,
    /// The physical point at `xi`.
    pub point: Point3<T>,
    pub converged: bool,
}

/// Maps a physical point to the reference coordinates of a line or surface element.
///
/// The squared distance between the point and the element is minimized by Gauss-Newton
/// iterations, so that points off the element are mapped to their closest point (in the
/// sense of a local minimum). The reference coordinates are not restricted to the element.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn current_to_surface_coordinates<T: Real>(
    element: &ElementGeometry<T>,
    x: &Point3<T>,
    max_iterations: usize,
) -> SurfaceProjection<T> {
    let dim = element.shape().reference_dim();
    let mut xi = element.shape().reference_centroid();
    let mut converged = false;

    for _ in 0..max_iterations {
        let residual = x - element.map_reference_coords(&xi);
        let j = element.reference_jacobian(&xi);
        let mut normal_matrix = j.transpose() * j;
        // Unused reference directions get a unit diagonal so the system stays regular
        for k in dim..3 {
            normal_matrix[(k, k)] = 1.0;
        }
        let rhs = j.transpose() * residual;
        let dxi = match normal_matrix.lu().solve(&rhs) {
            Some(dxi) => dxi,
            None => break,
        };
        xi += dxi;
        if dxi.norm() <= 1e-13 * (1.0 + xi.norm()) {
            converged = true;
            break;
        }
    }

    SurfaceProjection {
        xi,
        point: element.map_reference_coords(&xi),
        converged,
    }
}
