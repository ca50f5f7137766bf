//! Global numbering of degrees of freedom.
use crate::element::ElementType;
use crate::error::FemError;
use crate::mesh::{Mesh, MeshEntity};
use galerkin_traits::Real;
use log::debug;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// The owner of a global degree of freedom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DofOwner {
    /// The dof belongs to a vertex and is shared by all entities containing the vertex.
    Vertex(usize),
    /// The dof is internal to the entity with the given index.
    Entity(usize),
}

/// Element-to-global dof table together with the vertex dof table.
///
/// Rows are stored compactly as offsets into a single index array, one row per entity in the
/// order in which the entities were visited during allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DofMap {
    offsets: Vec<usize>,
    indices: Vec<usize>,
    row_entities: Vec<usize>,
    row_of_entity: Vec<Option<usize>>,
    vertex_dofs: Vec<Option<Range<usize>>>,
    owners: Vec<DofOwner>,
}

impl DofMap {
    /// Total number of global dofs.
    pub fn num_dofs(&self) -> usize {
        self.owners.len()
    }

    /// Number of entities with a row in the map.
    pub fn num_entities(&self) -> usize {
        self.row_entities.len()
    }

    /// Indices of the mapped entities, in allocation order.
    pub fn entity_indices(&self) -> &[usize] {
        &self.row_entities
    }

    pub fn contains_entity(&self, entity_index: usize) -> bool {
        self.row_index(entity_index).is_some()
    }

    /// Global dofs of an entity: vertex dofs in local vertex order, then internal dofs.
    pub fn entity_dofs(&self, entity_index: usize) -> Option<&[usize]> {
        let row = self.row_index(entity_index)?;
        Some(&self.indices[self.offsets[row]..self.offsets[row + 1]])
    }

    /// Global dofs owned by a vertex, or `None` if no mapped entity contains the vertex.
    pub fn vertex_dofs(&self, vertex: usize) -> Option<Range<usize>> {
        self.vertex_dofs.get(vertex).cloned().flatten()
    }

    pub fn owner(&self, dof: usize) -> Option<DofOwner> {
        self.owners.get(dof).copied()
    }

    /// Iterates over `(entity index, global dofs)` in allocation order.
    pub fn iter(&self) -> impl '_ + Iterator<Item = (usize, &[usize])> {
        self.row_entities
            .iter()
            .enumerate()
            .map(move |(row, &entity)| (entity, &self.indices[self.offsets[row]..self.offsets[row + 1]]))
    }

    fn row_index(&self, entity_index: usize) -> Option<usize> {
        self.row_of_entity.get(entity_index).copied().flatten()
    }
}

/// Allocates global dofs for the given entities.
///
/// Entities are visited once each, in iteration order. A vertex receives fresh dofs the first
/// time an entity containing it is visited and the same dofs on every later visit. Internal dofs
/// are fresh for every entity. Since the visiting order determines the numbering, allocation is
/// reproducible.
///
/// Fails with [`FemError::InconsistentVertexDofs`] if entities sharing a vertex disagree on the
/// number of dofs per vertex.
pub fn allocate_dofs<'m, 'e, T, I, F>(mesh: &Mesh<T>, entities: I, mut element_for: F) -> eyre::Result<DofMap>
where
    T: Real,
    I: IntoIterator<Item = &'m MeshEntity>,
    F: FnMut(&MeshEntity) -> &'e dyn ElementType<T>,
{
    let mut vertex_dofs: Vec<Option<Range<usize>>> = vec![None; mesh.num_vertices()];
    let mut owners = Vec::new();
    let mut offsets = vec![0];
    let mut indices = Vec::new();
    let mut row_entities = Vec::new();
    let mut row_of_entity: Vec<Option<usize>> = Vec::new();

    for entity in entities {
        let element = element_for(entity);
        let dofs_per_vertex = element.dofs_per_vertex();

        if entity.index() >= row_of_entity.len() {
            row_of_entity.resize(entity.index() + 1, None);
        }
        if row_of_entity[entity.index()].is_some() {
            return Err(FemError::InvalidMesh(format!("entity {} was visited twice", entity.index())).into());
        }

        for &v in entity.global_vertex_indices() {
            let slot = vertex_dofs.get_mut(v).ok_or_else(|| {
                FemError::InvalidMesh(format!("entity {} references unknown vertex {}", entity.index(), v))
            })?;
            let range = match slot.clone() {
                Some(existing) if existing.len() != dofs_per_vertex => {
                    return Err(FemError::InconsistentVertexDofs {
                        vertex: v,
                        entity: entity.index(),
                        existing: existing.len(),
                        requested: dofs_per_vertex,
                    }
                    .into());
                }
                Some(existing) => existing,
                None => {
                    let range = owners.len()..owners.len() + dofs_per_vertex;
                    owners.extend(std::iter::repeat(DofOwner::Vertex(v)).take(dofs_per_vertex));
                    *slot = Some(range.clone());
                    range
                }
            };
            indices.extend(range);
        }

        let num_internal = element.non_vertex_dofs(entity);
        indices.extend(owners.len()..owners.len() + num_internal);
        owners.extend(std::iter::repeat(DofOwner::Entity(entity.index())).take(num_internal));

        row_of_entity[entity.index()] = Some(row_entities.len());
        row_entities.push(entity.index());
        offsets.push(indices.len());
    }

    debug!(
        "Allocated {} dofs for {} entities ({} vertices carry dofs)",
        owners.len(),
        row_entities.len(),
        vertex_dofs.iter().filter(|range| range.is_some()).count()
    );

    Ok(DofMap {
        offsets,
        indices,
        row_entities,
        row_of_entity,
        vertex_dofs,
        owners,
    })
}
