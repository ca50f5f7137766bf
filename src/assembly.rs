//! Assembly of global systems from local form contributions.
//!
//! The module is split into
//!
//! - [`local`]: per-entity evaluation contexts handed to form kernels,
//! - the form traits and [`FormCollection`],
//! - the [`SystemAssembler`], which scatters local contributions into global structures,
//! - essential boundary condition elimination.
use serde::{Deserialize, Serialize};

mod bc;
mod form;
mod global;
pub mod local;

pub use bc::*;
pub use form::*;
pub use global::*;

/// The kinds of mesh entities a form can contribute on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Cells,
    InteriorFaces,
    ExteriorFaces,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Cells, EntityKind::InteriorFaces, EntityKind::ExteriorFaces];
}
