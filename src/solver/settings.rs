use galerkin_traits::{real, Real};
use serde::{Deserialize, Serialize};

/// Convergence and termination settings of the Newton solver.
///
/// The iteration has converged when the residual on the free dofs, the last increment and the
/// outstanding boundary condition increments are all within their tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(serialize = "T: Serialize", deserialize = "T: Real + Deserialize<'de>"))]
pub struct SolverSettings<T> {
    pub rhs_tol: T,
    pub dx_tol: T,
    pub bc_tol: T,
    pub max_iter: usize,
    /// Factor applied to every Newton increment before it is added to the state.
    pub damping: T,
    /// The iteration is considered diverged once the residual norm exceeds this limit.
    pub divergence_limit: Option<T>,
}

impl<T: Real> Default for SolverSettings<T> {
    fn default() -> Self {
        Self {
            rhs_tol: real(1e-8),
            dx_tol: real(1e-8),
            bc_tol: real(1e-8),
            max_iter: 10,
            damping: T::one(),
            divergence_limit: None,
        }
    }
}

impl<T: Real> SolverSettings<T> {
    pub fn with_rhs_tol(self, rhs_tol: T) -> Self {
        Self { rhs_tol, ..self }
    }

    pub fn with_dx_tol(self, dx_tol: T) -> Self {
        Self { dx_tol, ..self }
    }

    pub fn with_bc_tol(self, bc_tol: T) -> Self {
        Self { bc_tol, ..self }
    }

    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self { max_iter, ..self }
    }

    pub fn with_damping(self, damping: T) -> Self {
        Self { damping, ..self }
    }

    pub fn with_divergence_limit(self, divergence_limit: T) -> Self {
        Self {
            divergence_limit: Some(divergence_limit),
            ..self
        }
    }
}

/// Outcome of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverStatus {
    Converged,
    /// A monitored norm became non-finite or the residual exceeded the divergence limit.
    Diverged,
    /// The iteration limit was reached without convergence. The last state is kept.
    IterationLimitReached,
    /// The cancellation flag was raised.
    Cancelled,
}

impl SolverStatus {
    pub fn is_converged(&self) -> bool {
        *self == SolverStatus::Converged
    }
}

/// Norms monitored after an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord<T> {
    /// Number of increments applied so far.
    pub iteration: usize,
    /// Norm of the residual restricted to the free dofs.
    pub rhs_norm: T,
    /// Norm of the last increment.
    pub dx_norm: T,
    /// Norm of the outstanding boundary condition increments.
    pub bc_norm: T,
    pub converged: bool,
}

/// Summary of a Newton solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewtonInfo<T> {
    pub status: SolverStatus,
    /// Number of increments applied to the state.
    pub iterations: usize,
    /// One record for the initial state followed by one per iteration.
    pub history: Vec<IterationRecord<T>>,
}

impl<T> NewtonInfo<T> {
    pub fn last(&self) -> Option<&IterationRecord<T>> {
        self.history.last()
    }
}
