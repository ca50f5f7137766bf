//! Reference elements and their per-entity bindings.
//!
//! An [`ElementType`] describes how many degrees of freedom an element places on vertices and in
//! the interior of an entity. Binding it to a mesh entity yields a [`FiniteElement`], a fresh
//! view that evaluates shape functions in physical coordinates for that entity only.
use crate::error::FemError;
use crate::mapping::Mapping;
use crate::mesh::{Mesh, MeshEntity};
use galerkin_traits::Real;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, Point1};
use std::fmt::Debug;

mod lagrange;

pub use lagrange::*;

/// A family of finite elements that can be bound to mesh entities.
pub trait ElementType<T: Real>: Debug + Send + Sync {
    /// Number of degrees of freedom attached to each vertex of an entity.
    fn dofs_per_vertex(&self) -> usize;

    /// Number of degrees of freedom internal to the given entity.
    fn non_vertex_dofs(&self, entity: &MeshEntity) -> usize;

    /// Number of components of the field the element discretizes.
    fn value_dim(&self) -> usize;

    fn num_dofs(&self, entity: &MeshEntity) -> usize {
        self.dofs_per_vertex() * entity.num_vertices() + self.non_vertex_dofs(entity)
    }

    /// Binds the element to an entity of the mesh.
    fn bind<'a>(&'a self, mesh: &Mesh<T>, entity: &'a MeshEntity) -> eyre::Result<Box<dyn FiniteElement<T> + 'a>>;
}

/// A finite element bound to a single mesh entity.
///
/// Local degree of freedom `node * value_dim + component` belongs to the given component of the
/// basis function of the given node. Vertex nodes come first, in the local vertex order of the
/// entity.
///
/// Shape function values and gradients are laid out as `value_dim x num_dofs` matrices whose
/// column `i` holds the value (respectively the derivative with respect to the physical
/// coordinate) of shape function `i`.
pub trait FiniteElement<T: Real> {
    fn entity(&self) -> &MeshEntity;

    fn mapping(&self) -> &dyn Mapping<T>;

    fn value_dim(&self) -> usize;

    fn num_nodes(&self) -> usize;

    fn num_dofs(&self) -> usize {
        self.num_nodes() * self.value_dim()
    }

    /// Reference coordinates of the nodes of the element.
    fn reference_support_points(&self) -> &[Point1<T>];

    /// Evaluates the scalar nodal basis functions at the reference point.
    fn populate_basis(&self, basis_values: &mut [T], xi: &Point1<T>);

    /// Evaluates the derivatives of the scalar nodal basis functions with respect to the
    /// physical coordinate.
    fn populate_basis_gradients(&self, basis_gradients: &mut [T], xi: &Point1<T>);

    fn populate_shape_function_values(&self, mut output: DMatrixViewMut<T>, xi: &Point1<T>) {
        let mut basis = vec![T::zero(); self.num_nodes()];
        self.populate_basis(&mut basis, xi);
        scatter_nodal_values(&mut output, &basis, self.value_dim());
    }

    fn populate_shape_function_gradients(&self, mut output: DMatrixViewMut<T>, xi: &Point1<T>) {
        let mut gradients = vec![T::zero(); self.num_nodes()];
        self.populate_basis_gradients(&mut gradients, xi);
        scatter_nodal_values(&mut output, &gradients, self.value_dim());
    }

    fn shape_function_values(&self, xi: &Point1<T>) -> DMatrix<T> {
        let mut output = DMatrix::zeros(self.value_dim(), self.num_dofs());
        self.populate_shape_function_values(output.as_view_mut(), xi);
        output
    }

    fn shape_function_gradients(&self, xi: &Point1<T>) -> DMatrix<T> {
        let mut output = DMatrix::zeros(self.value_dim(), self.num_dofs());
        self.populate_shape_function_gradients(output.as_view_mut(), xi);
        output
    }

    /// Value of the discrete field with the given local dof values at the reference point.
    fn function_value(&self, xi: &Point1<T>, local_dofs: DVectorView<T>) -> DVector<T> {
        self.shape_function_values(xi) * local_dofs
    }

    /// Physical derivative of the discrete field with the given local dof values.
    fn function_gradient(&self, xi: &Point1<T>, local_dofs: DVectorView<T>) -> DVector<T> {
        self.shape_function_gradients(xi) * local_dofs
    }

    fn physical_coords(&self, xi: &Point1<T>) -> Point1<T> {
        self.mapping().map_point(xi)
    }

    fn jacobian_det(&self, xi: &Point1<T>) -> T {
        self.mapping().jacobian_det(xi)
    }

    /// Local dof values of the nodal interpolant of `f`.
    ///
    /// `f` is evaluated at the physical support points and must return `value_dim` components.
    fn interpolate(&self, f: &dyn Fn(&Point1<T>) -> DVector<T>) -> eyre::Result<DVector<T>> {
        let d = self.value_dim();
        let mut values = DVector::zeros(self.num_dofs());
        for (node, xi) in self.reference_support_points().iter().enumerate() {
            let f_x = f(&self.physical_coords(xi));
            FemError::check_dimension("interpolated function value", d, f_x.len())?;
            values.rows_mut(node * d, d).copy_from(&f_x);
        }
        Ok(values)
    }

    fn index(&self) -> usize {
        self.entity().index()
    }

    fn domain_indicator(&self) -> usize {
        self.entity().domain_indicator()
    }

    fn boundary_indicator(&self) -> Option<usize> {
        self.entity().boundary_indicator()
    }

    fn global_vertex_indices(&self) -> &[usize] {
        self.entity().global_vertex_indices()
    }
}

fn scatter_nodal_values<T: Real>(output: &mut DMatrixViewMut<T>, nodal: &[T], value_dim: usize) {
    assert_eq!(output.nrows(), value_dim, "Output must have value_dim rows");
    assert_eq!(output.ncols(), nodal.len() * value_dim, "Output must have one column per dof");
    output.fill(T::zero());
    for (node, &value) in nodal.iter().enumerate() {
        for c in 0..value_dim {
            output[(c, node * value_dim + c)] = value;
        }
    }
}
