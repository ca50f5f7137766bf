use crate::assembly::local::ExteriorFaceContext;
use crate::assembly::{EntityKind, Form, LinearForm};
use crate::error::FemError;
use crate::forms::{constant, SpatialFunction};
use crate::quadrature::QuadratureRule;
use crate::space::FunctionSpace;
use galerkin_traits::Real;
use nalgebra::{DVector, DVectorViewMut, Point1};
use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;

/// A boundary flux `g(x) v` on the exterior faces of the space.
///
/// In one dimension faces are points, so the contribution is a point evaluation. Optionally
/// restricted to faces carrying a given boundary indicator.
pub struct NeumannFlux<T: Real> {
    space: Arc<FunctionSpace<T>>,
    flux: SpatialFunction<T>,
    boundary_indicator: Option<usize>,
    quadrature: QuadratureRule<T>,
}

impl<T: Real> Debug for NeumannFlux<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeumannFlux")
            .field("space", &self.space)
            .field("boundary_indicator", &self.boundary_indicator)
            .finish_non_exhaustive()
    }
}

impl<T: Real> NeumannFlux<T> {
    pub fn new(space: Arc<FunctionSpace<T>>, flux: impl Fn(&Point1<T>) -> DVector<T> + Send + Sync + 'static) -> Self {
        Self {
            space,
            flux: Box::new(flux),
            boundary_indicator: None,
            quadrature: QuadratureRule::midpoint(),
        }
    }

    /// A flux with the same constant value in every component.
    pub fn constant(space: Arc<FunctionSpace<T>>, value: T) -> Self {
        let flux = constant(DVector::from_element(space.value_dim(), value));
        Self {
            space,
            flux,
            boundary_indicator: None,
            quadrature: QuadratureRule::midpoint(),
        }
    }

    /// Only apply the flux on faces tagged with the given boundary indicator.
    pub fn on_boundary(self, boundary_indicator: usize) -> Self {
        Self {
            boundary_indicator: Some(boundary_indicator),
            ..self
        }
    }
}

impl<T: Real> Form<T> for NeumannFlux<T> {
    fn implements_quadrature_on(&self, kind: EntityKind) -> bool {
        kind == EntityKind::ExteriorFaces
    }

    fn quadrature(&self) -> &QuadratureRule<T> {
        &self.quadrature
    }

    fn name(&self) -> &str {
        "NeumannFlux"
    }
}

impl<T: Real, P> LinearForm<T, P> for NeumannFlux<T> {
    fn test_space(&self) -> &Arc<FunctionSpace<T>> {
        &self.space
    }

    fn local_exterior_face_linear_form(
        &self,
        mut output: DVectorViewMut<T>,
        context: &ExteriorFaceContext<T, P>,
    ) -> eyre::Result<()> {
        if let Some(indicator) = self.boundary_indicator {
            if context.face.boundary_indicator() != Some(indicator) {
                return Ok(());
            }
        }

        let phi = context.side.test_values();
        let g = (self.flux)(&context.side.physical_coords());
        FemError::check_dimension("flux value dimension", phi.nrows(), g.len())?;
        output.gemv_tr(T::one(), &phi, &g, T::one());
        Ok(())
    }
}
