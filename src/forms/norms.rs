use crate::assembly::local::CellFunctionalContext;
use crate::assembly::{EntityKind, Form, Functional};
use crate::forms::SpatialFunction;
use crate::function::LocalFunction;
use crate::quadrature::{Quadrature, QuadratureRule};
use crate::space::FunctionSpace;
use eyre::eyre;
use galerkin_traits::Real;
use nalgebra::{DVector, Point1};
use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;

fn require_field<'c, 'a, T: Real>(name: &str, field: &'c Option<LocalFunction<'a, T>>) -> eyre::Result<&'c LocalFunction<'a, T>> {
    field
        .as_ref()
        .ok_or_else(|| eyre!("{} can only be evaluated for a given state", name))
}

/// The squared L2 norm of the state, `∫ u · u`.
#[derive(Debug, Clone)]
pub struct L2NormSquared<T: Real> {
    space: Arc<FunctionSpace<T>>,
    quadrature: QuadratureRule<T>,
}

impl<T: Real> L2NormSquared<T> {
    pub fn new(space: Arc<FunctionSpace<T>>, quadrature: QuadratureRule<T>) -> Self {
        Self { space, quadrature }
    }
}

impl<T: Real> Form<T> for L2NormSquared<T> {
    fn implements_quadrature_on(&self, kind: EntityKind) -> bool {
        kind == EntityKind::Cells
    }

    fn quadrature(&self) -> &QuadratureRule<T> {
        &self.quadrature
    }

    fn name(&self) -> &str {
        "L2NormSquared"
    }
}

impl<T: Real, P> Functional<T, P> for L2NormSquared<T> {
    fn space(&self) -> &Arc<FunctionSpace<T>> {
        &self.space
    }

    fn local_cell_functional(&self, context: &CellFunctionalContext<T, P>) -> eyre::Result<T> {
        let field = require_field(Form::<T>::name(self), &context.field)?;
        let element = context.space.element();
        Ok(context.quadrature.integrate(|xi| {
            let u = field.function_value(xi);
            u.dot(&u) * element.jacobian_det(xi)
        }))
    }
}

/// The squared L2 distance between the state and a known function, `∫ |u - u_exact|²`.
pub struct L2ErrorSquared<T: Real> {
    space: Arc<FunctionSpace<T>>,
    quadrature: QuadratureRule<T>,
    exact: SpatialFunction<T>,
}

impl<T: Real> Debug for L2ErrorSquared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("L2ErrorSquared")
            .field("space", &self.space)
            .field("quadrature", &self.quadrature)
            .finish_non_exhaustive()
    }
}

impl<T: Real> L2ErrorSquared<T> {
    pub fn new(
        space: Arc<FunctionSpace<T>>,
        quadrature: QuadratureRule<T>,
        exact: impl Fn(&Point1<T>) -> DVector<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            space,
            quadrature,
            exact: Box::new(exact),
        }
    }
}

impl<T: Real> Form<T> for L2ErrorSquared<T> {
    fn implements_quadrature_on(&self, kind: EntityKind) -> bool {
        kind == EntityKind::Cells
    }

    fn quadrature(&self) -> &QuadratureRule<T> {
        &self.quadrature
    }

    fn name(&self) -> &str {
        "L2ErrorSquared"
    }
}

impl<T: Real, P> Functional<T, P> for L2ErrorSquared<T> {
    fn space(&self) -> &Arc<FunctionSpace<T>> {
        &self.space
    }

    fn local_cell_functional(&self, context: &CellFunctionalContext<T, P>) -> eyre::Result<T> {
        let field = require_field(Form::<T>::name(self), &context.field)?;
        let element = context.space.element();
        Ok(context.quadrature.integrate(|xi| {
            let error = field.function_value(xi) - (self.exact)(&element.physical_coords(xi));
            error.norm_squared() * element.jacobian_det(xi)
        }))
    }
}
