//! A one-dimensional finite element engine.
//!
//! Meshes of line cells are combined with an element type into a [`space::FunctionSpace`],
//! which numbers the degrees of freedom. Weak forms implementing the traits in [`assembly`] are
//! integrated cell by cell (and face by face) and scattered into global vectors and sparse
//! matrices by the [`assembly::SystemAssembler`]. The [`solver`] module eliminates essential
//! boundary conditions and solves linear or nonlinear systems.
pub mod assembly;
pub mod dofs;
pub mod element;
pub mod error;
pub mod forms;
pub mod function;
pub mod mapping;
pub mod mesh;
pub mod quadrature;
pub mod solver;
pub mod space;

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub use error::FemError;
pub use galerkin_traits::Real;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
