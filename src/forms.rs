//! Ready-made weak forms.
//!
//! All forms are parameter agnostic: they implement the form traits for any parameter type `P`
//! and take their coefficients at construction.
use crate::function::LocalFunction;
use galerkin_traits::Real;
use nalgebra::{DVector, Point1};

mod diffusion;
mod neumann;
mod norms;
mod penalty;

pub use diffusion::*;
pub use neumann::*;
pub use norms::*;
pub use penalty::*;

/// A vector-valued function of the physical coordinate.
pub type SpatialFunction<T> = Box<dyn Fn(&Point1<T>) -> DVector<T> + Send + Sync>;

/// Value and gradient of an optional field at a reference point.
///
/// An absent field is treated as zero.
fn field_value_and_gradient<T: Real>(
    field: Option<&LocalFunction<T>>,
    xi: &Point1<T>,
    value_dim: usize,
) -> (DVector<T>, DVector<T>) {
    match field {
        Some(field) => (field.function_value(xi), field.function_gradient(xi)),
        None => (DVector::zeros(value_dim), DVector::zeros(value_dim)),
    }
}

fn constant<T: Real>(value: DVector<T>) -> SpatialFunction<T> {
    Box::new(move |_| value.clone())
}
