//! Error taxonomy for assembly and solution.
//!
//! Fallible operations in `galerkin` return [`eyre::Result`]. The errors raised by the library
//! itself are instances of [`FemError`], which callers can recover with
//! `report.downcast_ref::<FemError>()` to decide how to present or handle a failure.
use crate::assembly::EntityKind;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FemError {
    /// Two cells sharing a vertex disagree on how many degrees of freedom the vertex carries.
    #[error(
        "vertex {vertex} already carries {existing} dofs, but the element on entity {entity} \
         requests {requested}"
    )]
    InconsistentVertexDofs {
        vertex: usize,
        entity: usize,
        existing: usize,
        requested: usize,
    },

    /// The forms of a collection (or a form and a state) do not share their function spaces.
    #[error("mismatched function spaces: {0}")]
    MismatchedSpaces(String),

    /// A mesh entity was handed to a function space restricted to a different subdomain.
    #[error("mesh entity {entity} has domain indicator {found}, but the function space is restricted to subdomain {expected}")]
    SubdomainMismatch {
        entity: usize,
        expected: usize,
        found: usize,
    },

    /// A vector or matrix does not have the dimensions an operation requires.
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Essential boundary conditions can only be eliminated symmetrically from systems whose
    /// sparsity pattern is symmetric.
    #[error("essential boundary condition elimination requires a symmetric sparsity pattern: {0}")]
    NonSymmetricSystem(String),

    /// The mesh is malformed (e.g. references vertices out of bounds).
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// No quadrature rule with the requested properties is available.
    #[error("no Gauss quadrature available for polynomial degree {0}")]
    UnsupportedQuadrature(usize),

    /// Assembly attempted to write to a matrix entry that is not part of the sparsity pattern.
    #[error("entry ({row}, {col}) is not part of the sparsity pattern of the system matrix")]
    SparsityViolation { row: usize, col: usize },

    /// The linear solver could not solve the system.
    #[error("the linear system is singular or ill-posed: {0}")]
    SingularSystem(String),

    /// A form was asked for a contribution it does not implement.
    #[error("{form} does not implement contributions on {kind:?}")]
    UnsupportedContribution { form: String, kind: EntityKind },
}

impl FemError {
    pub(crate) fn unsupported(form: &str, kind: EntityKind) -> eyre::Report {
        FemError::UnsupportedContribution {
            form: form.to_string(),
            kind,
        }
        .into()
    }

    pub(crate) fn check_dimension(what: &'static str, expected: usize, actual: usize) -> eyre::Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(FemError::DimensionMismatch { what, expected, actual }.into())
        }
    }
}
