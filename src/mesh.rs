use crate::error::FemError;
use eyre::eyre;
use nalgebra::{Point1, Scalar};
use serde::{Deserialize, Serialize};

pub mod procedural;

/// A topological entity of a mesh: a vertex (dimension 0) or a cell (dimension 1).
///
/// The order of the vertex indices defines the local numbering of the entity and therefore
/// its orientation. Entities are immutable once they are part of a [`Mesh`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshEntity {
    index: usize,
    topological_dim: usize,
    vertices: Vec<usize>,
    domain_indicator: usize,
    boundary_indicator: Option<usize>,
}

impl MeshEntity {
    pub fn new(index: usize, topological_dim: usize, vertices: Vec<usize>) -> Self {
        Self {
            index,
            topological_dim,
            vertices,
            domain_indicator: 0,
            boundary_indicator: None,
        }
    }

    /// Convenience constructor for a line cell between two vertices.
    pub fn line(index: usize, a: usize, b: usize) -> Self {
        Self::new(index, 1, vec![a, b])
    }

    pub fn with_domain_indicator(mut self, domain_indicator: usize) -> Self {
        self.domain_indicator = domain_indicator;
        self
    }

    pub fn with_boundary_indicator(mut self, boundary_indicator: Option<usize>) -> Self {
        self.boundary_indicator = boundary_indicator;
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn topological_dim(&self) -> usize {
        self.topological_dim
    }

    pub fn global_vertex_indices(&self) -> &[usize] {
        &self.vertices
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn domain_indicator(&self) -> usize {
        self.domain_indicator
    }

    pub fn boundary_indicator(&self) -> Option<usize> {
        self.boundary_indicator
    }
}

/// A one-dimensional mesh made of vertices and line cells.
///
/// Entities are stored per topological dimension. Vertex entities are created automatically,
/// one per vertex and with the same index as the vertex, so that faces of cells (which in 1D
/// are vertices) can be addressed like any other entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct Mesh<T: Scalar> {
    vertices: Vec<Point1<T>>,
    vertex_entities: Vec<MeshEntity>,
    cells: Vec<MeshEntity>,
    // Cells incident to each vertex, in ascending cell order
    vertex_cells: Vec<Vec<usize>>,
}

impl<T: Scalar> Mesh<T> {
    /// Construct a mesh from vertices and cells.
    ///
    /// Cells must be stored at the position given by their index, have topological dimension 1,
    /// exactly two distinct vertices at distinct coordinates and only reference vertices that
    /// exist.
    pub fn from_vertices_and_cells(vertices: Vec<Point1<T>>, cells: Vec<MeshEntity>) -> eyre::Result<Self> {
        let num_vertices = vertices.len();
        let mut vertex_cells = vec![Vec::new(); num_vertices];

        for (position, cell) in cells.iter().enumerate() {
            if cell.index() != position {
                return Err(invalid_mesh(format!(
                    "cell stored at position {} has index {}",
                    position,
                    cell.index()
                )));
            }
            if cell.topological_dim() != 1 {
                return Err(invalid_mesh(format!(
                    "cell {} has topological dimension {}, expected 1",
                    position,
                    cell.topological_dim()
                )));
            }
            if cell.num_vertices() != 2 {
                return Err(invalid_mesh(format!(
                    "cell {} has {} vertices, line cells must have exactly two",
                    position,
                    cell.num_vertices()
                )));
            }

            for (local_idx, &v) in cell.global_vertex_indices().iter().enumerate() {
                if v >= num_vertices {
                    return Err(invalid_mesh(format!(
                        "cell {} references vertex {}, but the mesh only has {} vertices",
                        position, v, num_vertices
                    )));
                }
                if cell.global_vertex_indices()[..local_idx].contains(&v) {
                    return Err(invalid_mesh(format!("cell {} references vertex {} twice", position, v)));
                }
                vertex_cells[v].push(position);
            }
            if let [a, b] = cell.global_vertex_indices() {
                if vertices[*a] == vertices[*b] {
                    return Err(invalid_mesh(format!(
                        "cell {} has zero length, both vertices lie at {:?}",
                        position, vertices[*a]
                    )));
                }
            }
        }

        let vertex_entities = (0..num_vertices)
            .map(|v| MeshEntity::new(v, 0, vec![v]))
            .collect();

        Ok(Self {
            vertices,
            vertex_entities,
            cells,
            vertex_cells,
        })
    }

    /// Tags the given vertex with a boundary indicator.
    pub fn with_vertex_boundary_indicator(mut self, vertex: usize, indicator: usize) -> eyre::Result<Self> {
        let entity = self
            .vertex_entities
            .get_mut(vertex)
            .ok_or_else(|| eyre!("vertex {} is out of bounds", vertex))?;
        entity.boundary_indicator = Some(indicator);
        Ok(self)
    }

    pub fn vertices(&self) -> &[Point1<T>] {
        &self.vertices
    }

    pub fn vertex(&self, index: usize) -> Option<&Point1<T>> {
        self.vertices.get(index)
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// The topological dimension of the mesh, i.e. the dimension of its cells.
    pub fn topological_dim(&self) -> usize {
        if self.cells.is_empty() {
            0
        } else {
            1
        }
    }

    /// Returns all entities of the given topological dimension.
    pub fn entities(&self, topological_dim: usize) -> &[MeshEntity] {
        match topological_dim {
            0 => &self.vertex_entities,
            1 => &self.cells,
            _ => &[],
        }
    }

    pub fn cells(&self) -> &[MeshEntity] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> Option<&MeshEntity> {
        self.cells.get(index)
    }

    pub fn vertex_entity(&self, index: usize) -> Option<&MeshEntity> {
        self.vertex_entities.get(index)
    }

    /// Indices of the cells that contain the given vertex, in ascending order.
    pub fn cells_adjacent_to_vertex(&self, vertex: usize) -> &[usize] {
        self.vertex_cells
            .get(vertex)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Coordinates of the vertices of an entity, in local order.
    pub fn entity_vertex_coords(&self, entity: &MeshEntity) -> Vec<Point1<T>> {
        entity
            .global_vertex_indices()
            .iter()
            .map(|&v| self.vertices[v].clone())
            .collect()
    }

    /// Returns a sorted list of vertices that belong to exactly one cell.
    pub fn find_boundary_vertices(&self) -> Vec<usize> {
        (0..self.num_vertices())
            .filter(|&v| self.vertex_cells[v].len() == 1)
            .collect()
    }
}

fn invalid_mesh(message: String) -> eyre::Report {
    FemError::InvalidMesh(message).into()
}
