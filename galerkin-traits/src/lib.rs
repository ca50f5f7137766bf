use nalgebra::RealField;

pub use nalgebra;

/// Scalar type used throughout `galerkin`.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// Converts an `f64` constant into `T`.
///
/// Panics if the value cannot be represented in `T`, which for the floating point types
/// `galerkin` is used with never happens.
pub fn real<T: Real>(value: f64) -> T {
    T::from_f64(value).expect("Literal must fit in T")
}

/// Converts a count into `T`.
pub fn real_from_usize<T: Real>(value: usize) -> T {
    T::from_usize(value).expect("usize must fit in T")
}
