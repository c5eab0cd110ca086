use log::{debug, trace};
use nalgebra::{Matrix3, Vector3};
use numeric_literals::replace_float_literals;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use xcut_traits::Real;

/// A function `F: R^3 -> R^3` together with its Jacobian.
pub trait DifferentiableVectorFunction3<T: Real> {
    fn eval(&mut self, x: &Vector3<T>) -> Vector3<T>;

    fn jacobian(&mut self, x: &Vector3<T>) -> Matrix3<T>;
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NewtonSettings<T> {
    pub max_iterations: Option<usize>,
    /// Converged once `|F(x)|_2 <= tolerance`.
    pub tolerance: T,
    /// Also converged once the Newton increment satisfies `|dx|_2 <= step_tolerance * (1 + |x|_2)`.
    pub step_tolerance: T,
    /// A Jacobian is treated as singular when its smallest LU pivot is below
    /// `singular_tolerance` times its largest absolute entry.
    pub singular_tolerance: T,
    /// Maximum number of consecutive steps solved by SVD least squares before giving up.
    pub max_singular_steps: usize,
}

impl<T: Real> NewtonSettings<T> {
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Self {
            max_iterations: Some(max_iterations),
            tolerance: 1e-14,
            step_tolerance: 1e-14,
            singular_tolerance: 1e-12,
            max_singular_steps: 5,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NewtonResult<T> {
    pub solution: Vector3<T>,
    pub iterations: usize,
    pub residual_norm: T,
    pub singular_steps: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NewtonError {
    /// The procedure failed because the maximum number of iterations was reached.
    MaximumIterationsReached(usize),
    /// The Jacobian was singular in too many iterations.
    TooManySingularSteps(usize),
    /// The least-squares fallback for a singular Jacobian failed.
    JacobianError(String),
    /// An iterate or residual contained NaN or infinite entries.
    NonFiniteIterate(usize),
}

impl Display for NewtonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            NewtonError::MaximumIterationsReached(maxit) => {
                write!(f, "Failed to converge within maximum number of iterations ({}).", maxit)
            }
            NewtonError::TooManySingularSteps(steps) => {
                write!(f, "Jacobian was singular in {} iterations.", steps)
            }
            NewtonError::JacobianError(err) => {
                write!(f, "Failed to solve Jacobian system. Error: {}", err)
            }
            NewtonError::NonFiniteIterate(iter) => {
                write!(f, "Non-finite iterate encountered at iteration {}.", iter)
            }
        }
    }
}

impl Error for NewtonError {}

/// Solution of a 3x3 linear system, tagged with whether the matrix was deemed singular.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum LinearSolution<T> {
    Regular(Vector3<T>),
    /// Minimum-norm least-squares solution computed by the SVD.
    Singular(Vector3<T>),
}

impl<T: Copy> LinearSolution<T> {
    pub fn vector(&self) -> Vector3<T> {
        match self {
            LinearSolution::Regular(x) | LinearSolution::Singular(x) => *x,
        }
    }

    pub fn is_singular(&self) -> bool {
        matches!(self, LinearSolution::Singular(_))
    }
}

/// Solves `A x = b` by LU with partial pivoting, falling back to the SVD if `A` is singular.
pub fn solve_with_svd_fallback<T: Real>(
    a: &Matrix3<T>,
    b: &Vector3<T>,
    singular_tolerance: T,
) -> Result<LinearSolution<T>, NewtonError> {
    let scale = a.amax();
    let lu = a.lu();
    let min_pivot = lu.u().diagonal().amin();

    if scale > T::zero() && min_pivot > singular_tolerance * scale {
        if let Some(x) = lu.solve(b) {
            return Ok(LinearSolution::Regular(x));
        }
    }

    let svd = a.svd(true, true);
    let eps = singular_tolerance * scale;
    svd.solve(b, eps)
        .map(LinearSolution::Singular)
        .map_err(|err| NewtonError::JacobianError(err.to_string()))
}

/// Attempts to solve the non-linear equation `F(x) = 0` starting from `x0`.
///
/// Steps with a singular Jacobian are taken with the least-squares solution of the SVD. The
/// iteration fails once more than `settings.max_singular_steps` such steps were needed in a row.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn newton_3d<T, F>(
    function: &mut F,
    x0: Vector3<T>,
    settings: &NewtonSettings<T>,
) -> Result<NewtonResult<T>, NewtonError>
where
    T: Real,
    F: DifferentiableVectorFunction3<T>,
{
    let mut x = x0;
    let mut f = function.eval(&x);
    let mut iter = 0;
    let mut singular_steps = 0;
    let mut consecutive_singular_steps = 0;

    loop {
        let residual_norm = f.norm();
        if !residual_norm.is_finite() {
            return Err(NewtonError::NonFiniteIterate(iter));
        }
        if residual_norm <= settings.tolerance {
            break;
        }
        if settings
            .max_iterations
            .map(|max_iter| iter == max_iter)
            .unwrap_or(false)
        {
            debug!("Newton did not converge, residual {} after {} iterations", residual_norm, iter);
            return Err(NewtonError::MaximumIterationsReached(iter));
        }

        // Solve J (-dx) = F
        let j = function.jacobian(&x);
        let solution = solve_with_svd_fallback(&j, &f, settings.singular_tolerance)?;
        if solution.is_singular() {
            singular_steps += 1;
            consecutive_singular_steps += 1;
            trace!("Singular Jacobian at Newton iteration {}", iter);
            if consecutive_singular_steps > settings.max_singular_steps {
                return Err(NewtonError::TooManySingularSteps(consecutive_singular_steps));
            }
        } else {
            consecutive_singular_steps = 0;
        }

        let dx = -solution.vector();
        x += dx;
        f = function.eval(&x);
        iter += 1;

        if dx.norm() <= settings.step_tolerance * (1.0 + x.norm()) {
            if !f.norm().is_finite() {
                return Err(NewtonError::NonFiniteIterate(iter));
            }
            break;
        }
    }

    Ok(NewtonResult {
        solution: x,
        iterations: iter,
        residual_norm: f.norm(),
        singular_steps,
    })
}
