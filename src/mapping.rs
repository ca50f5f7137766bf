//! Geometric mappings from the reference line `[-1, 1]` to physical entities.
use crate::error::FemError;
use crate::mesh::{Mesh, MeshEntity};
use galerkin_traits::Real;
use nalgebra::{Matrix1, Point1};
use numeric_literals::replace_float_literals;

/// A map from reference coordinates to physical coordinates.
pub trait Mapping<T: Real> {
    fn map_point(&self, xi: &Point1<T>) -> Point1<T>;

    /// The Jacobian `dx/dxi` at the given reference point.
    fn jacobian(&self, xi: &Point1<T>) -> Matrix1<T>;

    /// The measure of the Jacobian used as integration weight.
    ///
    /// For the 1x1 Jacobian of a line this is its absolute value, so that integrals are
    /// independent of the orientation of the entity.
    fn jacobian_det(&self, xi: &Point1<T>) -> T {
        self.jacobian(xi)[0].abs()
    }

    /// The inverse Jacobian `dxi/dx`, or `None` if the mapping is degenerate at `xi`.
    fn inverse_jacobian(&self, xi: &Point1<T>) -> Option<Matrix1<T>> {
        self.jacobian(xi).try_inverse()
    }
}

/// Affine map of the reference line onto the segment between two vertices.
///
/// The first vertex is the image of `xi = -1` and the second the image of `xi = 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMapping<T: Real> {
    vertices: [Point1<T>; 2],
}

impl<T: Real> LineMapping<T> {
    pub fn from_vertices(vertices: [Point1<T>; 2]) -> Self {
        Self { vertices }
    }

    /// Binds the mapping to a line cell of the mesh.
    pub fn from_entity(mesh: &Mesh<T>, entity: &MeshEntity) -> eyre::Result<Self> {
        let coords = mesh.entity_vertex_coords(entity);
        match coords.as_slice() {
            [a, b] => Ok(Self::from_vertices([*a, *b])),
            _ => Err(FemError::InvalidMesh(format!(
                "entity {} with {} vertices cannot be mapped as a line",
                entity.index(),
                coords.len()
            ))
            .into()),
        }
    }

    pub fn vertices(&self) -> &[Point1<T>; 2] {
        &self.vertices
    }

    /// Length of the physical segment.
    pub fn length(&self) -> T {
        (self.vertices[1].x - self.vertices[0].x).abs()
    }

    /// Maps a physical point back to reference coordinates.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn map_physical_point(&self, x: &Point1<T>) -> Point1<T> {
        let [a, b] = &self.vertices;
        Point1::new((2.0 * x.x - a.x - b.x) / (b.x - a.x))
    }
}

impl<T: Real> Mapping<T> for LineMapping<T> {
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn map_point(&self, xi: &Point1<T>) -> Point1<T> {
        let [a, b] = &self.vertices;
        Point1::new(0.5 * (1.0 - xi.x) * a.x + 0.5 * (1.0 + xi.x) * b.x)
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn jacobian(&self, _xi: &Point1<T>) -> Matrix1<T> {
        let [a, b] = &self.vertices;
        Matrix1::new(0.5 * (b.x - a.x))
    }
}
