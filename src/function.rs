use crate::error::FemError;
use crate::space::{FunctionSpace, LocalFunctionSpace};
use galerkin_traits::Real;
use nalgebra::{DVector, DVectorView, Point1};
use std::sync::Arc;

/// A discrete function: a function space together with a global dof vector.
///
/// The dof vector is only modified through the explicit setters below.
#[derive(Debug, Clone)]
pub struct FeFunction<T: Real> {
    space: Arc<FunctionSpace<T>>,
    dof_values: DVector<T>,
}

impl<T: Real> FeFunction<T> {
    /// Creates the zero function of the space.
    pub fn new(space: Arc<FunctionSpace<T>>) -> Self {
        let dof_values = DVector::zeros(space.num_dofs());
        Self { space, dof_values }
    }

    pub fn from_dof_values(space: Arc<FunctionSpace<T>>, dof_values: DVector<T>) -> eyre::Result<Self> {
        FemError::check_dimension("function dof values", space.num_dofs(), dof_values.len())?;
        Ok(Self { space, dof_values })
    }

    /// Creates the nodal interpolant of `f`.
    pub fn interpolate(space: Arc<FunctionSpace<T>>, f: &dyn Fn(&Point1<T>) -> DVector<T>) -> eyre::Result<Self> {
        let dof_values = space.interpolate(f)?;
        Ok(Self { space, dof_values })
    }

    pub fn space(&self) -> &Arc<FunctionSpace<T>> {
        &self.space
    }

    pub fn dof_values(&self) -> &DVector<T> {
        &self.dof_values
    }

    pub fn set_dof_values(&mut self, values: DVectorView<T>) -> eyre::Result<()> {
        FemError::check_dimension("function dof values", self.dof_values.len(), values.len())?;
        self.dof_values.copy_from(&values);
        Ok(())
    }

    /// Adds `scale * increment` to the dof values.
    pub fn add_increment(&mut self, increment: DVectorView<T>, scale: T) -> eyre::Result<()> {
        FemError::check_dimension("function increment", self.dof_values.len(), increment.len())?;
        self.dof_values.axpy(scale, &increment, T::one());
        Ok(())
    }

    /// Restricts the function to a cell of its space.
    pub fn localize_cell(&self, cell: usize) -> eyre::Result<LocalFunction<'_, T>> {
        let space = self.space.localize_cell(cell)?;
        Ok(LocalFunction::new(space, self.dof_values.as_view()))
    }
}

/// A discrete function restricted to a single cell.
pub struct LocalFunction<'a, T: Real> {
    space: LocalFunctionSpace<'a, T>,
    dof_values: DVector<T>,
}

impl<'a, T: Real> LocalFunction<'a, T> {
    /// Gathers the local dof values of `global_dofs` for the cell of `space`.
    pub fn new(space: LocalFunctionSpace<'a, T>, global_dofs: DVectorView<T>) -> Self {
        let dof_values = space.gather(global_dofs);
        Self { space, dof_values }
    }

    pub fn space(&self) -> &LocalFunctionSpace<'a, T> {
        &self.space
    }

    /// Local dof values, in the order of the cell's dofs.
    pub fn dof_values(&self) -> &DVector<T> {
        &self.dof_values
    }

    pub fn function_value(&self, xi: &Point1<T>) -> DVector<T> {
        self.space
            .element()
            .function_value(xi, self.dof_values.as_view())
    }

    pub fn function_gradient(&self, xi: &Point1<T>) -> DVector<T> {
        self.space
            .element()
            .function_gradient(xi, self.dof_values.as_view())
    }
}
