use crate::assembly::local::{
    CellBilinearFormContext, CellFunctionalContext, CellLinearFormContext, ExteriorFaceContext, InteriorFaceContext,
};
use crate::assembly::EntityKind;
use crate::error::FemError;
use crate::quadrature::QuadratureRule;
use crate::space::{same_space, FunctionSpace};
use galerkin_traits::Real;
use nalgebra::{DMatrixViewMut, DVectorViewMut};
use std::sync::Arc;

/// Capabilities shared by all forms.
pub trait Form<T: Real> {
    /// Whether the form has a local contribution on the given kind of entity.
    ///
    /// The assembler only visits entity kinds for which this returns `true`.
    fn implements_quadrature_on(&self, kind: EntityKind) -> bool;

    /// Cell quadrature rule of the form.
    fn quadrature(&self) -> &QuadratureRule<T>;

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A form mapping a (possibly absent) field to a scalar.
pub trait Functional<T: Real, P = ()>: Form<T> {
    fn space(&self) -> &Arc<FunctionSpace<T>>;

    fn local_cell_functional(&self, _context: &CellFunctionalContext<T, P>) -> eyre::Result<T> {
        Err(FemError::unsupported(self.name(), EntityKind::Cells))
    }

    fn local_exterior_face_functional(&self, _context: &ExteriorFaceContext<T, P>) -> eyre::Result<T> {
        Err(FemError::unsupported(self.name(), EntityKind::ExteriorFaces))
    }

    fn local_interior_face_functional(&self, _context: &InteriorFaceContext<T, P>) -> eyre::Result<T> {
        Err(FemError::unsupported(self.name(), EntityKind::InteriorFaces))
    }
}

/// A form linear in its test function, producing a vector over the test space.
///
/// Kernels receive a zeroed output of length equal to the number of local test dofs and
/// accumulate into it.
pub trait LinearForm<T: Real, P = ()>: Form<T> {
    fn test_space(&self) -> &Arc<FunctionSpace<T>>;

    fn local_cell_linear_form(
        &self,
        _output: DVectorViewMut<T>,
        _context: &CellLinearFormContext<T, P>,
    ) -> eyre::Result<()> {
        Err(FemError::unsupported(self.name(), EntityKind::Cells))
    }

    fn local_exterior_face_linear_form(
        &self,
        _output: DVectorViewMut<T>,
        _context: &ExteriorFaceContext<T, P>,
    ) -> eyre::Result<()> {
        Err(FemError::unsupported(self.name(), EntityKind::ExteriorFaces))
    }

    fn local_interior_face_linear_form(
        &self,
        _output: DVectorViewMut<T>,
        _context: &InteriorFaceContext<T, P>,
    ) -> eyre::Result<()> {
        Err(FemError::unsupported(self.name(), EntityKind::InteriorFaces))
    }
}

/// A form linear in its test and trial functions, producing a matrix of size
/// test dofs x trial dofs.
pub trait BilinearForm<T: Real, P = ()>: Form<T> {
    fn test_space(&self) -> &Arc<FunctionSpace<T>>;

    fn trial_space(&self) -> &Arc<FunctionSpace<T>>;

    fn local_cell_bilinear_form(
        &self,
        _output: DMatrixViewMut<T>,
        _context: &CellBilinearFormContext<T, P>,
    ) -> eyre::Result<()> {
        Err(FemError::unsupported(self.name(), EntityKind::Cells))
    }

    fn local_exterior_face_bilinear_form(
        &self,
        _output: DMatrixViewMut<T>,
        _context: &ExteriorFaceContext<T, P>,
    ) -> eyre::Result<()> {
        Err(FemError::unsupported(self.name(), EntityKind::ExteriorFaces))
    }

    fn local_interior_face_bilinear_form(
        &self,
        _output: DMatrixViewMut<T>,
        _context: &InteriorFaceContext<T, P>,
    ) -> eyre::Result<()> {
        Err(FemError::unsupported(self.name(), EntityKind::InteriorFaces))
    }
}

/// A collection of forms to be assembled together.
pub struct FormCollection<'a, T: Real, P = ()> {
    functionals: Vec<&'a dyn Functional<T, P>>,
    linear_forms: Vec<&'a dyn LinearForm<T, P>>,
    bilinear_forms: Vec<&'a dyn BilinearForm<T, P>>,
}

impl<'a, T: Real, P> Default for FormCollection<'a, T, P> {
    fn default() -> Self {
        Self {
            functionals: Vec::new(),
            linear_forms: Vec::new(),
            bilinear_forms: Vec::new(),
        }
    }
}

impl<'a, T: Real, P> FormCollection<'a, T, P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_functional(&mut self, form: &'a dyn Functional<T, P>) -> &mut Self {
        self.functionals.push(form);
        self
    }

    pub fn add_linear_form(&mut self, form: &'a dyn LinearForm<T, P>) -> &mut Self {
        self.linear_forms.push(form);
        self
    }

    pub fn add_bilinear_form(&mut self, form: &'a dyn BilinearForm<T, P>) -> &mut Self {
        self.bilinear_forms.push(form);
        self
    }

    pub fn with_functional(mut self, form: &'a dyn Functional<T, P>) -> Self {
        self.add_functional(form);
        self
    }

    pub fn with_linear_form(mut self, form: &'a dyn LinearForm<T, P>) -> Self {
        self.add_linear_form(form);
        self
    }

    pub fn with_bilinear_form(mut self, form: &'a dyn BilinearForm<T, P>) -> Self {
        self.add_bilinear_form(form);
        self
    }

    pub fn functionals(&self) -> &[&'a dyn Functional<T, P>] {
        &self.functionals
    }

    pub fn linear_forms(&self) -> &[&'a dyn LinearForm<T, P>] {
        &self.linear_forms
    }

    pub fn bilinear_forms(&self) -> &[&'a dyn BilinearForm<T, P>] {
        &self.bilinear_forms
    }

    pub fn is_empty(&self) -> bool {
        self.functionals.is_empty() && self.linear_forms.is_empty() && self.bilinear_forms.is_empty()
    }

    /// The test space shared by all linear and bilinear forms.
    ///
    /// Returns `None` if the collection has neither, and fails with
    /// [`FemError::MismatchedSpaces`] if the forms disagree.
    pub fn test_space(&self) -> eyre::Result<Option<&'a Arc<FunctionSpace<T>>>> {
        let linear = self.linear_forms.iter().map(|&form| (form.name(), form.test_space()));
        let bilinear = self
            .bilinear_forms
            .iter()
            .map(|&form| (form.name(), form.test_space()));
        common_space("test", linear.chain(bilinear))
    }

    /// The trial space shared by all bilinear forms.
    pub fn trial_space(&self) -> eyre::Result<Option<&'a Arc<FunctionSpace<T>>>> {
        let bilinear = self
            .bilinear_forms
            .iter()
            .map(|&form| (form.name(), form.trial_space()));
        common_space("trial", bilinear)
    }
}

fn common_space<'a, T: Real>(
    role: &str,
    mut spaces: impl Iterator<Item = (&'a str, &'a Arc<FunctionSpace<T>>)>,
) -> eyre::Result<Option<&'a Arc<FunctionSpace<T>>>> {
    let (first_name, first) = match spaces.next() {
        Some(entry) => entry,
        None => return Ok(None),
    };
    for (name, space) in spaces {
        if !same_space(first, space) {
            return Err(FemError::MismatchedSpaces(format!(
                "{} and {} do not share their {} space",
                first_name, name, role
            ))
            .into());
        }
    }
    Ok(Some(first))
}
