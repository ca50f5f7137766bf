use crate::assembly::local::{FaceSide, InteriorFaceContext};
use crate::assembly::{BilinearForm, EntityKind, Form, Functional, LinearForm};
use crate::quadrature::QuadratureRule;
use crate::space::{FunctionSpace, LocalFunctionSpace};
use galerkin_traits::Real;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorViewMut};
use std::sync::Arc;

/// Penalizes jumps of the field across interior faces, `γ [u] · [v]`.
///
/// The jump is the value on the first side minus the value on the second side. The form
/// provides the penalty energy `γ/2 [u]²` as a functional, its negative derivative as a
/// linear form and its Hessian as a bilinear form, so it can be added to a Newton system
/// alongside a cell residual. With piecewise constant elements it couples neighbouring cells.
#[derive(Debug, Clone)]
pub struct InteriorPenalty<T: Real> {
    space: Arc<FunctionSpace<T>>,
    penalty: T,
    quadrature: QuadratureRule<T>,
}

impl<T: Real> InteriorPenalty<T> {
    pub fn new(space: Arc<FunctionSpace<T>>, penalty: T) -> Self {
        Self {
            space,
            penalty,
            quadrature: QuadratureRule::midpoint(),
        }
    }

    pub fn penalty(&self) -> T {
        self.penalty
    }
}

/// The map from the local dofs of both sides to the jump at the face, `value_dim x dofs`.
fn jump_operator<'s, 'a, T: Real>(
    sides: &'s [FaceSide<'a, T>; 2],
    space_of: impl Fn(&'s FaceSide<'a, T>) -> Option<&'s LocalFunctionSpace<'a, T>>,
) -> Option<DMatrix<T>> {
    let [first, second] = sides;
    let values_1 = space_of(first)?
        .element()
        .shape_function_values(&first.reference_coords);
    let values_2 = space_of(second)?
        .element()
        .shape_function_values(&second.reference_coords);
    let (n_1, n_2) = (values_1.ncols(), values_2.ncols());

    let mut jump = DMatrix::zeros(values_1.nrows(), n_1 + n_2);
    jump.columns_mut(0, n_1).copy_from(&values_1);
    jump.columns_mut(n_1, n_2).copy_from(&(-values_2));
    Some(jump)
}

fn field_jump<T: Real>(context_sides: &[FaceSide<T>; 2], value_dim: usize) -> DVector<T> {
    let [first, second] = context_sides;
    match (first.field_value(), second.field_value()) {
        (Some(u_1), Some(u_2)) => u_1 - u_2,
        _ => DVector::zeros(value_dim),
    }
}

impl<T: Real> Form<T> for InteriorPenalty<T> {
    fn implements_quadrature_on(&self, kind: EntityKind) -> bool {
        kind == EntityKind::InteriorFaces
    }

    fn quadrature(&self) -> &QuadratureRule<T> {
        &self.quadrature
    }

    fn name(&self) -> &str {
        "InteriorPenalty"
    }
}

impl<T: Real, P> Functional<T, P> for InteriorPenalty<T> {
    fn space(&self) -> &Arc<FunctionSpace<T>> {
        &self.space
    }

    fn local_interior_face_functional(&self, context: &InteriorFaceContext<T, P>) -> eyre::Result<T> {
        let jump = field_jump(&context.sides, self.space.value_dim());
        let half = T::one() / (T::one() + T::one());
        Ok(half * self.penalty * jump.norm_squared())
    }
}

impl<T: Real, P> LinearForm<T, P> for InteriorPenalty<T> {
    fn test_space(&self) -> &Arc<FunctionSpace<T>> {
        &self.space
    }

    fn local_interior_face_linear_form(
        &self,
        mut output: DVectorViewMut<T>,
        context: &InteriorFaceContext<T, P>,
    ) -> eyre::Result<()> {
        let jump_test = jump_operator(&context.sides, |side| Some(&side.test))
            .ok_or_else(|| eyre::eyre!("interior face context without test space"))?;
        let jump = field_jump(&context.sides, jump_test.nrows());
        output.gemv_tr(-self.penalty, &jump_test, &jump, T::one());
        Ok(())
    }
}

impl<T: Real, P> BilinearForm<T, P> for InteriorPenalty<T> {
    fn test_space(&self) -> &Arc<FunctionSpace<T>> {
        &self.space
    }

    fn trial_space(&self) -> &Arc<FunctionSpace<T>> {
        &self.space
    }

    fn local_interior_face_bilinear_form(
        &self,
        mut output: DMatrixViewMut<T>,
        context: &InteriorFaceContext<T, P>,
    ) -> eyre::Result<()> {
        let jump_test = jump_operator(&context.sides, |side| Some(&side.test))
            .ok_or_else(|| eyre::eyre!("interior face context without test space"))?;
        let jump_trial = jump_operator(&context.sides, |side| side.trial.as_ref())
            .ok_or_else(|| eyre::eyre!("interior face context without trial space"))?;
        output.gemm_tr(self.penalty, &jump_test, &jump_trial, T::one());
        Ok(())
    }
}
