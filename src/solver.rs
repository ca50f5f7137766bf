//! Linear and Newton solvers built on the system assembler.
mod linear;
mod linear_solver;
mod newton;
mod settings;

pub use linear::*;
pub use linear_solver::*;
pub use newton::*;
pub use settings::*;

use crate::assembly::FormCollection;
use crate::error::FemError;
use crate::function::FeFunction;
use crate::space::{same_space, FunctionSpace};
use galerkin_traits::Real;
use std::sync::Arc;

/// The test and trial spaces shared by all linear and bilinear forms of a collection.
///
/// Fails unless the collection contains at least one bilinear form, all forms agree on their
/// spaces, test and trial space coincide and (if given) the state lives on the trial space.
fn system_spaces<'a, T: Real, P>(
    forms: &FormCollection<'a, T, P>,
    state: Option<&FeFunction<T>>,
) -> eyre::Result<(Arc<FunctionSpace<T>>, Arc<FunctionSpace<T>>)> {
    let test = forms.test_space()?;
    let trial = forms.trial_space()?;
    let (test, trial) = match (test, trial) {
        (Some(test), Some(trial)) => (test.clone(), trial.clone()),
        _ => {
            return Err(FemError::MismatchedSpaces(
                "solving requires at least one bilinear form in the collection".to_string(),
            )
            .into())
        }
    };
    if !same_space(&test, &trial) {
        return Err(FemError::MismatchedSpaces(
            "the solvers require the same test and trial space".to_string(),
        )
        .into());
    }
    if let Some(state) = state {
        if !same_space(state.space(), &trial) {
            return Err(FemError::MismatchedSpaces(
                "the state must live on the trial space of the forms".to_string(),
            )
            .into());
        }
    }
    Ok((test, trial))
}
