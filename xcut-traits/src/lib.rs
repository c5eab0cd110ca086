use nalgebra::RealField;

pub use nalgebra;

/// Scalar type used throughout the intersection engine.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// Converts an `f64` constant into the scalar type `T`.
///
/// Shorthand for `T::from_f64(value).unwrap()`, which never fails for the floating point types
/// the engine is instantiated with.
#[inline(always)]
pub fn constant<T: Real>(value: f64) -> T {
    T::from_f64(value).unwrap()
}
