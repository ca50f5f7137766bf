use crate::element::{ElementType, FiniteElement};
use crate::error::FemError;
use crate::mapping::{LineMapping, Mapping};
use crate::mesh::{Mesh, MeshEntity};
use galerkin_traits::{real, real_from_usize, Real};
use nalgebra::Point1;

/// The Lagrange reference element of a given degree on the line `[-1, 1]`.
///
/// Nodes are ordered with the two vertices first (`-1`, then `1`) followed by the equally
/// spaced interior nodes in ascending order. Degree zero has a single node at the midpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct LagrangeLine<T: Real> {
    degree: usize,
    nodes: Vec<Point1<T>>,
}

impl<T: Real> LagrangeLine<T> {
    pub fn new(degree: usize) -> Self {
        let nodes = if degree == 0 {
            vec![Point1::new(T::zero())]
        } else {
            let h = real::<T>(2.0) / real_from_usize(degree);
            let interior = (1..degree).map(|i| Point1::new(-T::one() + real_from_usize::<T>(i) * h));
            [Point1::new(-T::one()), Point1::new(T::one())]
                .into_iter()
                .chain(interior)
                .collect()
        };
        Self { degree, nodes }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes located at the vertices of the line.
    pub fn num_vertex_nodes(&self) -> usize {
        if self.degree == 0 {
            0
        } else {
            2
        }
    }

    pub fn nodes(&self) -> &[Point1<T>] {
        &self.nodes
    }

    /// Evaluates all basis functions at `xi`.
    pub fn populate_basis(&self, values: &mut [T], xi: &Point1<T>) {
        assert_eq!(values.len(), self.num_nodes(), "Output must have one entry per node");
        for (i, value) in values.iter_mut().enumerate() {
            *value = self.basis_product(i, None, xi.x);
        }
    }

    /// Evaluates the derivatives of all basis functions with respect to `xi`.
    pub fn populate_reference_gradients(&self, gradients: &mut [T], xi: &Point1<T>) {
        assert_eq!(gradients.len(), self.num_nodes(), "Output must have one entry per node");
        for (i, gradient) in gradients.iter_mut().enumerate() {
            let xi_i = self.nodes[i].x;
            *gradient = (0..self.num_nodes())
                .filter(|&m| m != i)
                .map(|m| self.basis_product(i, Some(m), xi.x) / (xi_i - self.nodes[m].x))
                .fold(T::zero(), |acc, term| acc + term);
        }
    }

    // Product over j of (xi - xi_j) / (xi_i - xi_j), skipping j = i and j = skip
    fn basis_product(&self, i: usize, skip: Option<usize>, xi: T) -> T {
        let xi_i = self.nodes[i].x;
        self.nodes
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i && Some(j) != skip)
            .fold(T::one(), |acc, (_, node)| acc * (xi - node.x) / (xi_i - node.x))
    }
}

/// Continuous (or, for degree zero, piecewise constant) Lagrange elements on line cells.
///
/// Every component of a vector-valued field uses the same scalar basis.
#[derive(Debug, Clone, PartialEq)]
pub struct LagrangeElement<T: Real> {
    reference: LagrangeLine<T>,
    value_dim: usize,
}

impl<T: Real> LagrangeElement<T> {
    pub fn new(degree: usize) -> Self {
        Self::vector_valued(degree, 1)
    }

    pub fn vector_valued(degree: usize, value_dim: usize) -> Self {
        assert!(value_dim > 0, "Value dimension must be positive");
        Self {
            reference: LagrangeLine::new(degree),
            value_dim,
        }
    }

    pub fn degree(&self) -> usize {
        self.reference.degree()
    }

    pub fn reference(&self) -> &LagrangeLine<T> {
        &self.reference
    }
}

impl<T: Real> ElementType<T> for LagrangeElement<T> {
    fn dofs_per_vertex(&self) -> usize {
        if self.reference.num_vertex_nodes() > 0 {
            self.value_dim
        } else {
            0
        }
    }

    fn non_vertex_dofs(&self, _entity: &MeshEntity) -> usize {
        (self.reference.num_nodes() - self.reference.num_vertex_nodes()) * self.value_dim
    }

    fn value_dim(&self) -> usize {
        self.value_dim
    }

    fn bind<'a>(&'a self, mesh: &Mesh<T>, entity: &'a MeshEntity) -> eyre::Result<Box<dyn FiniteElement<T> + 'a>> {
        let mapping = LineMapping::from_entity(mesh, entity)?;
        let inverse_jacobian = mapping
            .inverse_jacobian(&Point1::origin())
            .map(|j_inv| j_inv[0])
            .ok_or_else(|| FemError::InvalidMesh(format!("cell {} has zero length", entity.index())))?;
        Ok(Box::new(BoundLagrangeElement {
            element: self,
            entity,
            mapping,
            inverse_jacobian,
        }))
    }
}

#[derive(Debug)]
struct BoundLagrangeElement<'a, T: Real> {
    element: &'a LagrangeElement<T>,
    entity: &'a MeshEntity,
    mapping: LineMapping<T>,
    // dxi/dx, constant on an affine line
    inverse_jacobian: T,
}

impl<'a, T: Real> FiniteElement<T> for BoundLagrangeElement<'a, T> {
    fn entity(&self) -> &MeshEntity {
        self.entity
    }

    fn mapping(&self) -> &dyn Mapping<T> {
        &self.mapping
    }

    fn value_dim(&self) -> usize {
        self.element.value_dim
    }

    fn num_nodes(&self) -> usize {
        self.element.reference.num_nodes()
    }

    fn reference_support_points(&self) -> &[Point1<T>] {
        self.element.reference.nodes()
    }

    fn populate_basis(&self, basis_values: &mut [T], xi: &Point1<T>) {
        self.element.reference.populate_basis(basis_values, xi);
    }

    fn populate_basis_gradients(&self, basis_gradients: &mut [T], xi: &Point1<T>) {
        self.element
            .reference
            .populate_reference_gradients(basis_gradients, xi);
        for gradient in basis_gradients {
            *gradient *= self.inverse_jacobian;
        }
    }
}
