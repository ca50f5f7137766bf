//! Basic procedural mesh generation routines.
use crate::mesh::{Mesh, MeshEntity};
use galerkin_traits::{real_from_usize, Real};
use nalgebra::Point1;

/// Boundary indicator assigned to the left end point by the interval generators.
pub const LEFT_BOUNDARY: usize = 0;
/// Boundary indicator assigned to the right end point by the interval generators.
pub const RIGHT_BOUNDARY: usize = 1;

pub fn create_unit_interval_mesh<T: Real>(num_cells: usize) -> Mesh<T> {
    create_interval_mesh(T::zero(), T::one(), num_cells).expect("Unit interval mesh is always valid")
}

/// Generates a uniform mesh of `[a, b]` with the given number of line cells.
///
/// Cell `i` connects vertices `i` and `i + 1`. The left end point is tagged with
/// [`LEFT_BOUNDARY`] and the right end point with [`RIGHT_BOUNDARY`]. With zero cells
/// the mesh is empty. Fails if `a == b`.
pub fn create_interval_mesh<T: Real>(a: T, b: T, num_cells: usize) -> eyre::Result<Mesh<T>> {
    if num_cells == 0 {
        return create_interval_mesh_from_points(Vec::new());
    }
    let h = (b - a) / real_from_usize(num_cells);
    let points = (0..=num_cells)
        .map(|i| a + real_from_usize::<T>(i) * h)
        .collect();
    create_interval_mesh_from_points(points)
}

/// Generates a mesh whose vertices are the given (consecutive) points.
///
/// Fewer than two points yield an empty mesh. Fails if two consecutive points coincide.
pub fn create_interval_mesh_from_points<T: Real>(points: Vec<T>) -> eyre::Result<Mesh<T>> {
    if points.len() < 2 {
        return Mesh::from_vertices_and_cells(Vec::new(), Vec::new());
    }

    let num_cells = points.len() - 1;
    let vertices = points.into_iter().map(Point1::new).collect();
    let cells = (0..num_cells)
        .map(|i| MeshEntity::line(i, i, i + 1))
        .collect();

    Mesh::from_vertices_and_cells(vertices, cells)
        .and_then(|mesh| mesh.with_vertex_boundary_indicator(0, LEFT_BOUNDARY))
        .and_then(|mesh| mesh.with_vertex_boundary_indicator(num_cells, RIGHT_BOUNDARY))
}
