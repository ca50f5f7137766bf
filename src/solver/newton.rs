use crate::assembly::{apply_essential_bc_csr, essential_bc_data, EssentialBc, EssentialBcData, FormCollection, SystemAssembler};
use crate::function::FeFunction;
use crate::solver::{system_spaces, DirectSolver, IterationRecord, LinearSolver, NewtonInfo, SolverSettings, SolverStatus};
use crate::space::FunctionSpace;
use galerkin_traits::Real;
use log::{debug, info, warn};
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Newton solver for systems given by a residual (linear forms) and its Jacobian (bilinear
/// forms).
///
/// The linear forms must assemble the *negative* residual `r(u)` of the current state, so that
/// every iteration solves `K(u) du = r(u)` and updates `u += damping * du`. Essential boundary
/// conditions are imposed incrementally: in each iteration the constrained entries of `du` are
/// the differences between the prescribed values and the current state.
///
/// The matrix, right-hand side and increment buffers are allocated once, when the solver is
/// created, from the sparsity pattern of the bilinear forms.
pub struct NewtonSolver<'a, T: Real, P = ()> {
    forms: FormCollection<'a, T, P>,
    bcs: Vec<EssentialBc<T>>,
    assembler: SystemAssembler<T>,
    linear_solver: Box<dyn LinearSolver<T> + 'a>,
    settings: SolverSettings<T>,
    cancellation: Option<Arc<AtomicBool>>,
    trial_space: Arc<FunctionSpace<T>>,
    matrix: CsrMatrix<T>,
    rhs: DVector<T>,
    dx: DVector<T>,
}

impl<'a, T: Real, P> NewtonSolver<'a, T, P> {
    pub fn new(forms: FormCollection<'a, T, P>, bcs: Vec<EssentialBc<T>>) -> eyre::Result<Self> {
        let (_, trial_space) = system_spaces(&forms, None)?;
        let assembler = SystemAssembler::new();
        let matrix = assembler.allocate_matrix(&forms)?;
        let rhs = DVector::zeros(matrix.nrows());
        let dx = DVector::zeros(matrix.ncols());
        Ok(Self {
            forms,
            bcs,
            assembler,
            linear_solver: Box::new(DirectSolver),
            settings: SolverSettings::default(),
            cancellation: None,
            trial_space,
            matrix,
            rhs,
            dx,
        })
    }

    pub fn with_linear_solver(self, linear_solver: impl LinearSolver<T> + 'a) -> Self {
        Self {
            linear_solver: Box::new(linear_solver),
            ..self
        }
    }

    pub fn with_settings(self, settings: SolverSettings<T>) -> Self {
        Self { settings, ..self }
    }

    /// Registers a flag which, once raised, stops the iteration at the start of the next
    /// iteration.
    pub fn with_cancellation(self, flag: Arc<AtomicBool>) -> Self {
        Self {
            cancellation: Some(flag),
            ..self
        }
    }

    pub fn settings(&self) -> &SolverSettings<T> {
        &self.settings
    }

    /// The residual of the last assembly, including constrained entries.
    pub fn residual(&self) -> &DVector<T> {
        &self.rhs
    }

    /// Iterates until convergence, divergence, cancellation or the iteration limit.
    ///
    /// Errors from assembly or the linear solver abort the solve. Non-convergence is not an
    /// error; it is reported through [`NewtonInfo::status`], and the state holds the last iterate.
    pub fn solve(&mut self, state: &mut FeFunction<T>, params: &P) -> eyre::Result<NewtonInfo<T>> {
        system_spaces(&self.forms, Some(&*state))?;

        let mut bc = essential_bc_data(&self.trial_space, &self.bcs, Some(&*state))?;
        self.assemble_residual(state, params)?;
        self.dx.fill(T::zero());

        info!("{:>4} -- {:^9} -- {:^9} -- {:^9} -- {:^3}", "#It", "||RHS||", "||dx||", "||dx_bc||", "CON");
        let mut history = Vec::new();
        let record = self.record(0, &bc);
        log_record(&record);
        history.push(record);

        let mut status = self.check_termination(&record);
        let mut iterations = 0;

        while status.is_none() {
            if iterations == self.settings.max_iter {
                status = Some(SolverStatus::IterationLimitReached);
                break;
            }
            if self.is_cancelled() {
                warn!("Newton iteration cancelled after {} iterations", iterations);
                status = Some(SolverStatus::Cancelled);
                break;
            }

            self.matrix.values_mut().fill(T::zero());
            self.assembler
                .assemble_bilinear_forms(&mut self.matrix, &self.forms, Some(&*state), params)?;
            apply_essential_bc_csr(&mut self.matrix, &mut self.rhs, &bc)?;
            debug!("Solving linearized system with {} dofs", self.matrix.nrows());
            self.linear_solver
                .solve(&self.matrix, self.rhs.as_view(), self.dx.as_view_mut())?;

            state.add_increment(self.dx.as_view(), self.settings.damping)?;
            iterations += 1;

            bc = essential_bc_data(&self.trial_space, &self.bcs, Some(&*state))?;
            self.assemble_residual(state, params)?;

            let record = self.record(iterations, &bc);
            log_record(&record);
            history.push(record);
            status = self.check_termination(&record);
        }

        let status = status.unwrap_or(SolverStatus::IterationLimitReached);
        if status != SolverStatus::Converged {
            warn!("Newton solver stopped after {} iterations: {:?}", iterations, status);
        }
        Ok(NewtonInfo {
            status,
            iterations,
            history,
        })
    }

    fn assemble_residual(&mut self, state: &FeFunction<T>, params: &P) -> eyre::Result<()> {
        self.rhs.fill(T::zero());
        self.assembler
            .assemble_linear_forms(&mut self.rhs, &self.forms, Some(state), params)
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    fn record(&self, iteration: usize, bc: &EssentialBcData<T>) -> IterationRecord<T> {
        let mut constrained = vec![false; self.rhs.len()];
        for &dof in &bc.dofs {
            constrained[dof] = true;
        }
        let rhs_norm = self
            .rhs
            .iter()
            .zip(&constrained)
            .filter(|(_, &is_constrained)| !is_constrained)
            .fold(T::zero(), |acc, (&r, _)| acc + r * r)
            .sqrt();
        let dx_norm = self.settings.damping.abs() * self.dx.norm();
        let bc_norm = bc.norm();
        let converged =
            rhs_norm <= self.settings.rhs_tol && dx_norm <= self.settings.dx_tol && bc_norm <= self.settings.bc_tol;

        IterationRecord {
            iteration,
            rhs_norm,
            dx_norm,
            bc_norm,
            converged,
        }
    }

    fn check_termination(&self, record: &IterationRecord<T>) -> Option<SolverStatus> {
        let norms = [record.rhs_norm, record.dx_norm, record.bc_norm];
        let exceeds_limit = self
            .settings
            .divergence_limit
            .map_or(false, |limit| record.rhs_norm > limit);
        if norms.iter().any(|norm| !norm.is_finite()) || exceeds_limit {
            Some(SolverStatus::Diverged)
        } else if record.converged {
            Some(SolverStatus::Converged)
        } else {
            None
        }
    }
}

fn as_f64<T: Real>(value: T) -> f64 {
    value.to_subset().unwrap_or(f64::NAN)
}

fn log_record<T: Real>(record: &IterationRecord<T>) {
    info!(
        "{:>4} -- {:9.3e} -- {:9.3e} -- {:9.3e} -- {:^3}",
        record.iteration,
        as_f64(record.rhs_norm),
        as_f64(record.dx_norm),
        as_f64(record.bc_norm),
        record.converged
    );
}
