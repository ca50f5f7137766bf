use crate::assembly::local::{CellBilinearFormContext, CellLinearFormContext};
use crate::assembly::{BilinearForm, EntityKind, Form, LinearForm};
use crate::error::FemError;
use crate::forms::{constant, field_value_and_gradient, SpatialFunction};
use crate::quadrature::{Quadrature, QuadratureRule};
use crate::space::FunctionSpace;
use galerkin_traits::Real;
use nalgebra::{DMatrixViewMut, DVector, DVectorViewMut, Point1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;

/// Coefficients of the diffusion–reaction operator `-(κ(u) u')' + c u`.
///
/// The diffusivity depends linearly on the solution, `κ(u) = kappa0 + kappa1 * u`, which makes
/// the problem nonlinear whenever `kappa1` is non-zero. Vector-valued fields are treated
/// component by component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiffusionCoefficients<T> {
    pub kappa0: T,
    pub kappa1: T,
    pub reaction: T,
}

impl<T: Real> Default for DiffusionCoefficients<T> {
    fn default() -> Self {
        Self {
            kappa0: T::one(),
            kappa1: T::zero(),
            reaction: T::zero(),
        }
    }
}

impl<T: Real> DiffusionCoefficients<T> {
    /// The Laplace operator.
    pub fn laplace() -> Self {
        Self::default()
    }

    pub fn with_kappa0(self, kappa0: T) -> Self {
        Self { kappa0, ..self }
    }

    pub fn with_kappa1(self, kappa1: T) -> Self {
        Self { kappa1, ..self }
    }

    pub fn with_reaction(self, reaction: T) -> Self {
        Self { reaction, ..self }
    }

    pub fn diffusivity(&self, u: T) -> T {
        self.kappa0 + self.kappa1 * u
    }
}

/// Jacobian of the diffusion–reaction residual,
/// `∫ κ(u) φ_j' v_i' + κ'(u) u' φ_j v_i' + c φ_j v_i`.
///
/// Without a field (or with `kappa1 = 0`) this is the usual stiffness plus mass matrix.
#[derive(Debug, Clone)]
pub struct DiffusionBilinearForm<T: Real> {
    space: Arc<FunctionSpace<T>>,
    quadrature: QuadratureRule<T>,
    coefficients: DiffusionCoefficients<T>,
}

impl<T: Real> DiffusionBilinearForm<T> {
    pub fn new(space: Arc<FunctionSpace<T>>, quadrature: QuadratureRule<T>) -> Self {
        Self {
            space,
            quadrature,
            coefficients: DiffusionCoefficients::default(),
        }
    }

    pub fn with_coefficients(self, coefficients: DiffusionCoefficients<T>) -> Self {
        Self { coefficients, ..self }
    }

    pub fn coefficients(&self) -> &DiffusionCoefficients<T> {
        &self.coefficients
    }
}

impl<T: Real> Form<T> for DiffusionBilinearForm<T> {
    fn implements_quadrature_on(&self, kind: EntityKind) -> bool {
        kind == EntityKind::Cells
    }

    fn quadrature(&self) -> &QuadratureRule<T> {
        &self.quadrature
    }

    fn name(&self) -> &str {
        "DiffusionBilinearForm"
    }
}

impl<T: Real, P> BilinearForm<T, P> for DiffusionBilinearForm<T> {
    fn test_space(&self) -> &Arc<FunctionSpace<T>> {
        &self.space
    }

    fn trial_space(&self) -> &Arc<FunctionSpace<T>> {
        &self.space
    }

    fn local_cell_bilinear_form(
        &self,
        mut output: DMatrixViewMut<T>,
        context: &CellBilinearFormContext<T, P>,
    ) -> eyre::Result<()> {
        let test = context.test.element();
        let trial = context.trial.element();
        let d = test.value_dim();
        FemError::check_dimension("trial value dimension", d, trial.value_dim())?;
        let DiffusionCoefficients {
            kappa1, reaction, ..
        } = self.coefficients;

        for (&w, xi) in context.quadrature.iter() {
            let phi_test = test.shape_function_values(xi);
            let phi_trial = trial.shape_function_values(xi);
            let dphi_test = test.shape_function_gradients(xi);
            let dphi_trial = trial.shape_function_gradients(xi);
            let (u, du) = field_value_and_gradient(context.field.as_ref(), xi, d);
            let dx = test.jacobian_det(xi) * w;

            for c in 0..d {
                let v = phi_test.row(c).transpose();
                let dv = dphi_test.row(c).transpose();
                let phi = phi_trial.row(c).transpose();
                let dphi = dphi_trial.row(c).transpose();

                output.ger(dx * self.coefficients.diffusivity(u[c]), &dv, &dphi, T::one());
                output.ger(dx * kappa1 * du[c], &dv, &phi, T::one());
                output.ger(dx * reaction, &v, &phi, T::one());
            }
        }
        Ok(())
    }
}

/// The negative residual of the diffusion–reaction equation `-(κ(u) u')' + c u = f`,
/// `∫ f v - κ(u) u' v' - c u v`.
///
/// With a zero (or absent) field this is the load vector of the linear problem, and the
/// Newton update `K du = r` uses it directly as right-hand side.
pub struct DiffusionResidual<T: Real> {
    space: Arc<FunctionSpace<T>>,
    quadrature: QuadratureRule<T>,
    coefficients: DiffusionCoefficients<T>,
    source: SpatialFunction<T>,
}

impl<T: Real> Debug for DiffusionResidual<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffusionResidual")
            .field("space", &self.space)
            .field("quadrature", &self.quadrature)
            .field("coefficients", &self.coefficients)
            .finish_non_exhaustive()
    }
}

impl<T: Real> DiffusionResidual<T> {
    /// Creates the residual with zero source.
    pub fn new(space: Arc<FunctionSpace<T>>, quadrature: QuadratureRule<T>) -> Self {
        let value_dim = space.value_dim();
        Self {
            space,
            quadrature,
            coefficients: DiffusionCoefficients::default(),
            source: constant(DVector::zeros(value_dim)),
        }
    }

    pub fn with_coefficients(self, coefficients: DiffusionCoefficients<T>) -> Self {
        Self { coefficients, ..self }
    }

    pub fn with_source(self, source: impl Fn(&Point1<T>) -> DVector<T> + Send + Sync + 'static) -> Self {
        Self {
            source: Box::new(source),
            ..self
        }
    }

    /// Sets a source that is the same constant in every component.
    pub fn with_constant_source(self, value: T) -> Self {
        let value_dim = self.space.value_dim();
        Self {
            source: constant(DVector::from_element(value_dim, value)),
            ..self
        }
    }
}

impl<T: Real> Form<T> for DiffusionResidual<T> {
    fn implements_quadrature_on(&self, kind: EntityKind) -> bool {
        kind == EntityKind::Cells
    }

    fn quadrature(&self) -> &QuadratureRule<T> {
        &self.quadrature
    }

    fn name(&self) -> &str {
        "DiffusionResidual"
    }
}

impl<T: Real, P> LinearForm<T, P> for DiffusionResidual<T> {
    fn test_space(&self) -> &Arc<FunctionSpace<T>> {
        &self.space
    }

    fn local_cell_linear_form(&self, mut output: DVectorViewMut<T>, context: &CellLinearFormContext<T, P>) -> eyre::Result<()> {
        let test = context.test.element();
        let d = test.value_dim();
        let reaction = self.coefficients.reaction;

        for (&w, xi) in context.quadrature.iter() {
            let phi = test.shape_function_values(xi);
            let dphi = test.shape_function_gradients(xi);
            let (u, du) = field_value_and_gradient(context.field.as_ref(), xi, d);
            let f = (self.source)(&test.physical_coords(xi));
            FemError::check_dimension("source value dimension", d, f.len())?;
            let dx = test.jacobian_det(xi) * w;

            for c in 0..d {
                let flux = self.coefficients.diffusivity(u[c]) * du[c];
                output.axpy(dx * (f[c] - reaction * u[c]), &phi.row(c).transpose(), T::one());
                output.axpy(-dx * flux, &dphi.row(c).transpose(), T::one());
            }
        }
        Ok(())
    }
}
