use crate::assembly::{EssentialBc, FormCollection, SystemAssembler};
use crate::function::FeFunction;
use crate::solver::{system_spaces, DirectSolver, LinearSolver};
use crate::space::FunctionSpace;
use galerkin_traits::Real;
use log::debug;
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use std::sync::Arc;

/// Assembles and solves a linear system `K u = f` in a single step.
///
/// The bilinear forms give `K` and the linear forms give `f`. Essential boundary conditions are
/// eliminated before the solve. When a current state is passed to [`solve`](Self::solve), the
/// forms are evaluated at that state, the boundary values are taken relative to it and the
/// solution is added to it as an increment.
pub struct LinearProblemSolver<'a, T: Real, P = ()> {
    forms: FormCollection<'a, T, P>,
    bcs: Vec<EssentialBc<T>>,
    assembler: SystemAssembler<T>,
    linear_solver: Box<dyn LinearSolver<T> + 'a>,
    trial_space: Arc<FunctionSpace<T>>,
    matrix: CsrMatrix<T>,
    rhs: DVector<T>,
    solution: DVector<T>,
}

impl<'a, T: Real, P> LinearProblemSolver<'a, T, P> {
    pub fn new(forms: FormCollection<'a, T, P>, bcs: Vec<EssentialBc<T>>) -> eyre::Result<Self> {
        let (_, trial_space) = system_spaces(&forms, None)?;
        let assembler = SystemAssembler::new();
        let matrix = assembler.allocate_matrix(&forms)?;
        let rhs = DVector::zeros(matrix.nrows());
        let solution = DVector::zeros(matrix.ncols());
        Ok(Self {
            forms,
            bcs,
            assembler,
            linear_solver: Box::new(DirectSolver),
            trial_space,
            matrix,
            rhs,
            solution,
        })
    }

    pub fn with_linear_solver(self, linear_solver: impl LinearSolver<T> + 'a) -> Self {
        Self {
            linear_solver: Box::new(linear_solver),
            ..self
        }
    }

    /// The system matrix of the last solve, after elimination of the boundary conditions.
    pub fn matrix(&self) -> &CsrMatrix<T> {
        &self.matrix
    }

    /// The right-hand side of the last solve, after elimination of the boundary conditions.
    pub fn rhs(&self) -> &DVector<T> {
        &self.rhs
    }

    /// Assembles and solves the system, returning the solution vector.
    ///
    /// If `state` is given, the returned vector is the increment that was added to it.
    pub fn solve(&mut self, state: Option<&mut FeFunction<T>>, params: &P) -> eyre::Result<DVector<T>> {
        let current = state.as_deref();
        system_spaces(&self.forms, current)?;

        self.matrix.values_mut().fill(T::zero());
        self.rhs.fill(T::zero());
        self.assembler
            .assemble_bilinear_forms(&mut self.matrix, &self.forms, current, params)?;
        self.assembler
            .assemble_linear_forms(&mut self.rhs, &self.forms, current, params)?;
        let bc = self.assembler.integrate_essential_bc(
            &mut self.matrix,
            &mut self.rhs,
            &self.trial_space,
            &self.bcs,
            current,
        )?;

        debug!(
            "Solving linear system with {} dofs ({} constrained)",
            self.matrix.nrows(),
            bc.len()
        );
        self.linear_solver
            .solve(&self.matrix, self.rhs.as_view(), self.solution.as_view_mut())?;

        if let Some(state) = state {
            state.add_increment(self.solution.as_view(), T::one())?;
        }
        Ok(self.solution.clone())
    }
}
