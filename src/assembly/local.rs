//! Local evaluation contexts.
//!
//! A context is built for one entity at a time and borrows the localized spaces and field for
//! that entity only. Building a context performs no integration.
use crate::error::FemError;
use crate::function::{FeFunction, LocalFunction};
use crate::mesh::MeshEntity;
use crate::quadrature::QuadratureRule;
use crate::space::{FaceConnection, FunctionSpace, LocalFunctionSpace};
use galerkin_traits::Real;
use nalgebra::{DMatrix, DVector, Point1};

/// Restricts the state to the given cell of its own space.
fn localize_field<'a, T: Real>(state: Option<&'a FeFunction<T>>, cell: usize) -> eyre::Result<Option<LocalFunction<'a, T>>> {
    state
        .map(|state| state.localize_cell(cell))
        .transpose()
}

/// Context for the cell contribution of a functional.
pub struct CellFunctionalContext<'a, T: Real, P> {
    pub cell: &'a MeshEntity,
    pub space: LocalFunctionSpace<'a, T>,
    pub field: Option<LocalFunction<'a, T>>,
    pub quadrature: &'a QuadratureRule<T>,
    pub params: &'a P,
}

impl<'a, T: Real, P> CellFunctionalContext<'a, T, P> {
    pub fn build(
        space: &'a FunctionSpace<T>,
        cell: &'a MeshEntity,
        state: Option<&'a FeFunction<T>>,
        quadrature: &'a QuadratureRule<T>,
        params: &'a P,
    ) -> eyre::Result<Self> {
        Ok(Self {
            cell,
            space: space.localize(cell)?,
            field: localize_field(state, cell.index())?,
            quadrature,
            params,
        })
    }
}

/// Context for the cell contribution of a linear form.
pub struct CellLinearFormContext<'a, T: Real, P> {
    pub cell: &'a MeshEntity,
    pub test: LocalFunctionSpace<'a, T>,
    pub field: Option<LocalFunction<'a, T>>,
    pub quadrature: &'a QuadratureRule<T>,
    pub params: &'a P,
}

impl<'a, T: Real, P> CellLinearFormContext<'a, T, P> {
    pub fn build(
        test_space: &'a FunctionSpace<T>,
        cell: &'a MeshEntity,
        state: Option<&'a FeFunction<T>>,
        quadrature: &'a QuadratureRule<T>,
        params: &'a P,
    ) -> eyre::Result<Self> {
        Ok(Self {
            cell,
            test: test_space.localize(cell)?,
            field: localize_field(state, cell.index())?,
            quadrature,
            params,
        })
    }
}

/// Context for the cell contribution of a bilinear form.
pub struct CellBilinearFormContext<'a, T: Real, P> {
    pub cell: &'a MeshEntity,
    pub test: LocalFunctionSpace<'a, T>,
    pub trial: LocalFunctionSpace<'a, T>,
    pub field: Option<LocalFunction<'a, T>>,
    pub quadrature: &'a QuadratureRule<T>,
    pub params: &'a P,
}

impl<'a, T: Real, P> CellBilinearFormContext<'a, T, P> {
    pub fn build(
        test_space: &'a FunctionSpace<T>,
        trial_space: &'a FunctionSpace<T>,
        cell: &'a MeshEntity,
        state: Option<&'a FeFunction<T>>,
        quadrature: &'a QuadratureRule<T>,
        params: &'a P,
    ) -> eyre::Result<Self> {
        Ok(Self {
            cell,
            test: test_space.localize(cell)?,
            trial: trial_space.localize(cell)?,
            field: localize_field(state, cell.index())?,
            quadrature,
            params,
        })
    }
}

/// One cell adjacent to a face, seen from the face.
pub struct FaceSide<'a, T: Real> {
    pub cell: &'a MeshEntity,
    /// Reference coordinate of the face in the cell, `-1` or `1`.
    pub reference_coords: Point1<T>,
    /// Outward unit normal of the cell at the face, `-1` or `1`.
    pub normal: T,
    /// The test space, or for functionals the space of the functional.
    pub test: LocalFunctionSpace<'a, T>,
    /// Present only for bilinear forms.
    pub trial: Option<LocalFunctionSpace<'a, T>>,
    pub field: Option<LocalFunction<'a, T>>,
}

impl<'a, T: Real> FaceSide<'a, T> {
    fn build(
        test_space: &'a FunctionSpace<T>,
        trial_space: Option<&'a FunctionSpace<T>>,
        connection: FaceConnection,
        state: Option<&'a FeFunction<T>>,
    ) -> eyre::Result<Self> {
        let test = test_space.localize_cell(connection.cell)?;
        let trial = trial_space
            .map(|space| space.localize_cell(connection.cell))
            .transpose()?;
        let cell = test_space
            .mesh()
            .cell(connection.cell)
            .ok_or_else(|| FemError::InvalidMesh(format!("cell {} does not exist", connection.cell)))?;

        let reference_normal = if connection.local_face == 0 { -T::one() } else { T::one() };
        let reference_coords = Point1::new(reference_normal);
        let orientation = test.element().mapping().jacobian(&reference_coords)[0].signum();

        Ok(Self {
            cell,
            reference_coords,
            normal: reference_normal * orientation,
            test,
            trial,
            field: localize_field(state, connection.cell)?,
        })
    }

    /// Physical coordinates of the face.
    pub fn physical_coords(&self) -> Point1<T> {
        self.test.element().physical_coords(&self.reference_coords)
    }

    /// Test shape function values at the face, `value_dim x num_dofs`.
    pub fn test_values(&self) -> DMatrix<T> {
        self.test
            .element()
            .shape_function_values(&self.reference_coords)
    }

    /// Value of the field at the face, if a field is present.
    pub fn field_value(&self) -> Option<DVector<T>> {
        self.field
            .as_ref()
            .map(|field| field.function_value(&self.reference_coords))
    }
}

/// Context for the contribution of a form on an exterior face.
pub struct ExteriorFaceContext<'a, T: Real, P> {
    pub face: &'a MeshEntity,
    pub side: FaceSide<'a, T>,
    pub params: &'a P,
}

impl<'a, T: Real, P> ExteriorFaceContext<'a, T, P> {
    pub fn build(
        test_space: &'a FunctionSpace<T>,
        trial_space: Option<&'a FunctionSpace<T>>,
        face: &'a MeshEntity,
        connection: FaceConnection,
        state: Option<&'a FeFunction<T>>,
        params: &'a P,
    ) -> eyre::Result<Self> {
        Ok(Self {
            face,
            side: FaceSide::build(test_space, trial_space, connection, state)?,
            params,
        })
    }
}

/// Context for the contribution of a form on an interior face.
///
/// The two sides are ordered by cell index. Local vectors and matrices for interior faces are
/// laid out with the dofs of the first side followed by the dofs of the second side.
pub struct InteriorFaceContext<'a, T: Real, P> {
    pub face: &'a MeshEntity,
    pub sides: [FaceSide<'a, T>; 2],
    pub params: &'a P,
}

impl<'a, T: Real, P> InteriorFaceContext<'a, T, P> {
    pub fn build(
        test_space: &'a FunctionSpace<T>,
        trial_space: Option<&'a FunctionSpace<T>>,
        face: &'a MeshEntity,
        connections: [FaceConnection; 2],
        state: Option<&'a FeFunction<T>>,
        params: &'a P,
    ) -> eyre::Result<Self> {
        let [first, second] = connections;
        Ok(Self {
            face,
            sides: [
                FaceSide::build(test_space, trial_space, first, state)?,
                FaceSide::build(test_space, trial_space, second, state)?,
            ],
            params,
        })
    }

    /// Global test dofs of both sides, first side first.
    pub fn test_dofs(&self) -> Vec<usize> {
        self.sides
            .iter()
            .flat_map(|side| side.test.dofs().iter().copied())
            .collect()
    }

    /// Global trial dofs of both sides, first side first. Empty unless trial spaces are present.
    pub fn trial_dofs(&self) -> Vec<usize> {
        self.sides
            .iter()
            .filter_map(|side| side.trial.as_ref())
            .flat_map(|trial| trial.dofs().iter().copied())
            .collect()
    }
}
