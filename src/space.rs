//! Function spaces: a mesh, an element type and the resulting dof numbering.
use crate::dofs::{allocate_dofs, DofMap};
use crate::element::{ElementType, FiniteElement};
use crate::error::FemError;
use crate::mesh::{Mesh, MeshEntity};
use galerkin_traits::Real;
use nalgebra::{DVector, DVectorView, Point1};
use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;

/// A finite element space over the cells of a mesh, optionally restricted to a subdomain.
///
/// Spaces are shared through [`Arc`] and compared by identity: two forms live on the same space
/// only if they hold the same `Arc`. See [`same_space`].
pub struct FunctionSpace<T: Real> {
    mesh: Arc<Mesh<T>>,
    element: Arc<dyn ElementType<T>>,
    subdomain: Option<usize>,
    dof_map: DofMap,
}

impl<T: Real> Debug for FunctionSpace<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionSpace")
            .field("element", &self.element)
            .field("subdomain", &self.subdomain)
            .field("num_cells", &self.dof_map.num_entities())
            .field("num_dofs", &self.dof_map.num_dofs())
            .finish()
    }
}

/// Returns `true` if both handles refer to the same function space.
pub fn same_space<T: Real>(a: &Arc<FunctionSpace<T>>, b: &Arc<FunctionSpace<T>>) -> bool {
    Arc::ptr_eq(a, b)
}

impl<T: Real> FunctionSpace<T> {
    /// Creates a space over all cells of the mesh.
    pub fn new(mesh: Arc<Mesh<T>>, element: Arc<dyn ElementType<T>>) -> eyre::Result<Self> {
        Self::build(mesh, element, None)
    }

    /// Creates a space over the cells whose domain indicator equals `subdomain`.
    pub fn on_subdomain(mesh: Arc<Mesh<T>>, element: Arc<dyn ElementType<T>>, subdomain: usize) -> eyre::Result<Self> {
        Self::build(mesh, element, Some(subdomain))
    }

    fn build(mesh: Arc<Mesh<T>>, element: Arc<dyn ElementType<T>>, subdomain: Option<usize>) -> eyre::Result<Self> {
        let cells = mesh
            .cells()
            .iter()
            .filter(|cell| subdomain.map_or(true, |s| cell.domain_indicator() == s));
        let dof_map = allocate_dofs(&mesh, cells, |_| element.as_ref())?;
        Ok(Self {
            mesh,
            element,
            subdomain,
            dof_map,
        })
    }

    pub fn mesh(&self) -> &Arc<Mesh<T>> {
        &self.mesh
    }

    pub fn element_type(&self) -> &dyn ElementType<T> {
        self.element.as_ref()
    }

    pub fn subdomain(&self) -> Option<usize> {
        self.subdomain
    }

    pub fn dof_map(&self) -> &DofMap {
        &self.dof_map
    }

    pub fn num_dofs(&self) -> usize {
        self.dof_map.num_dofs()
    }

    pub fn value_dim(&self) -> usize {
        self.element.value_dim()
    }

    /// The cells of the space in mesh order.
    pub fn cells(&self) -> impl '_ + Iterator<Item = &MeshEntity> {
        self.dof_map
            .entity_indices()
            .iter()
            .filter_map(move |&index| self.mesh.cell(index))
    }

    fn contains_cell(&self, cell: usize) -> bool {
        self.dof_map.contains_entity(cell)
    }

    /// Binds the element to a cell of the space.
    ///
    /// Fails with [`FemError::SubdomainMismatch`] if the space is restricted to a subdomain the
    /// cell does not belong to.
    pub fn localize<'a>(&'a self, entity: &'a MeshEntity) -> eyre::Result<LocalFunctionSpace<'a, T>> {
        if let Some(expected) = self.subdomain {
            if entity.domain_indicator() != expected {
                return Err(FemError::SubdomainMismatch {
                    entity: entity.index(),
                    expected,
                    found: entity.domain_indicator(),
                }
                .into());
            }
        }
        let dofs = match (entity.topological_dim(), self.dof_map.entity_dofs(entity.index())) {
            (1, Some(dofs)) => dofs,
            _ => {
                return Err(FemError::InvalidMesh(format!(
                    "entity {} of dimension {} is not a cell of the function space",
                    entity.index(),
                    entity.topological_dim()
                ))
                .into())
            }
        };
        let element = self.element.bind(&self.mesh, entity)?;
        Ok(LocalFunctionSpace { element, dofs })
    }

    pub fn localize_cell(&self, cell: usize) -> eyre::Result<LocalFunctionSpace<'_, T>> {
        let entity = self
            .mesh
            .cell(cell)
            .ok_or_else(|| FemError::InvalidMesh(format!("cell {} does not exist", cell)))?;
        self.localize(entity)
    }

    /// Faces (vertices) adjacent to exactly one cell of the space.
    pub fn exterior_faces(&self) -> Vec<ExteriorFace> {
        (0..self.mesh.num_vertices())
            .filter_map(|v| match self.face_connections(v).as_slice() {
                [cell] => Some(ExteriorFace { face: v, cell: *cell }),
                _ => None,
            })
            .collect()
    }

    /// Faces (vertices) shared by two cells of the space, with the cells in ascending order.
    pub fn interior_faces(&self) -> Vec<InteriorFace> {
        (0..self.mesh.num_vertices())
            .filter_map(|v| match self.face_connections(v).as_slice() {
                [first, second] => Some(InteriorFace {
                    face: v,
                    cells: [*first, *second],
                }),
                _ => None,
            })
            .collect()
    }

    fn face_connections(&self, vertex: usize) -> Vec<FaceConnection> {
        self.mesh
            .cells_adjacent_to_vertex(vertex)
            .iter()
            .filter(|&&cell| self.contains_cell(cell))
            .filter_map(|&cell| {
                let local_face = self
                    .mesh
                    .cell(cell)?
                    .global_vertex_indices()
                    .iter()
                    .position(|&w| w == vertex)?;
                Some(FaceConnection { cell, local_face })
            })
            .collect()
    }

    /// Global dof values of the nodal interpolant of `f`.
    ///
    /// `f` must return `value_dim` components.
    pub fn interpolate(&self, f: &dyn Fn(&Point1<T>) -> DVector<T>) -> eyre::Result<DVector<T>> {
        let mut values = DVector::zeros(self.num_dofs());
        for cell in self.cells() {
            let local_space = self.localize(cell)?;
            let local_values = local_space.element().interpolate(f)?;
            for (&global, value) in local_space.dofs().iter().zip(local_values.iter()) {
                values[global] = *value;
            }
        }
        Ok(values)
    }
}

/// A function space restricted to a single cell.
pub struct LocalFunctionSpace<'a, T: Real> {
    element: Box<dyn FiniteElement<T> + 'a>,
    dofs: &'a [usize],
}

impl<'a, T: Real> LocalFunctionSpace<'a, T> {
    pub fn element(&self) -> &dyn FiniteElement<T> {
        self.element.as_ref()
    }

    /// Global indices of the local dofs.
    pub fn dofs(&self) -> &'a [usize] {
        self.dofs
    }

    pub fn num_dofs(&self) -> usize {
        self.dofs.len()
    }

    pub fn entity(&self) -> &MeshEntity {
        self.element.entity()
    }

    /// Gathers the values of the local dofs from a global vector.
    pub fn gather(&self, global: DVectorView<T>) -> DVector<T> {
        DVector::from_iterator(self.dofs.len(), self.dofs.iter().map(|&i| global[i]))
    }
}

/// A cell adjacent to a face together with the local index of the face in the cell.
///
/// Local face 0 sits at reference coordinate `-1`, local face 1 at `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceConnection {
    pub cell: usize,
    pub local_face: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExteriorFace {
    pub face: usize,
    pub cell: FaceConnection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteriorFace {
    pub face: usize,
    pub cells: [FaceConnection; 2],
}
