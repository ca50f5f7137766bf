use crate::assembly::bc::{apply_essential_bc_csr, essential_bc_data, EssentialBc, EssentialBcData};
use crate::assembly::local::{
    CellBilinearFormContext, CellFunctionalContext, CellLinearFormContext, ExteriorFaceContext, InteriorFaceContext,
};
use crate::assembly::{BilinearForm, EntityKind, FormCollection};
use crate::error::FemError;
use crate::function::FeFunction;
use crate::space::FunctionSpace;
use galerkin_traits::Real;
use eyre::eyre;
use log::debug;
use nalgebra::{DMatrix, DVector, DVectorViewMut, Scalar};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use std::cell::RefCell;
use std::collections::BTreeSet;

/// Assembles global scalars, vectors and matrices from the forms of a [`FormCollection`].
///
/// Every local contribution is added to the target; the assembler never overwrites entries,
/// so targets must be zeroed by the caller when a fresh system is wanted.
#[derive(Debug)]
pub struct SystemAssembler<T: Scalar> {
    workspace: RefCell<AssemblerWorkspace<T>>,
}

impl<T: Scalar> Default for SystemAssembler<T> {
    fn default() -> Self {
        Self {
            workspace: RefCell::new(AssemblerWorkspace::default()),
        }
    }
}

#[derive(Debug)]
struct AssemblerWorkspace<T: Scalar> {
    // Buffers reused across entities to avoid repeated allocation
    local_vector: DVector<T>,
    local_matrix: DMatrix<T>,
}

impl<T: Scalar> Default for AssemblerWorkspace<T> {
    fn default() -> Self {
        Self {
            local_vector: DVector::from_vec(Vec::new()),
            local_matrix: DMatrix::from_vec(0, 0, Vec::new()),
        }
    }
}

impl<T: Real> SystemAssembler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects the `(row, col)` pairs that bilinear assembly of the forms may write to.
    ///
    /// For every bilinear form this is the union, over the entities the form contributes on, of
    /// the outer product of the entity's test and trial dofs. The result is deterministic.
    pub fn get_sparsity<P>(&self, forms: &FormCollection<T, P>) -> BTreeSet<(usize, usize)> {
        let mut entries = BTreeSet::new();
        let mut insert_block = |rows: &[usize], cols: &[usize]| {
            for &i in rows {
                for &j in cols {
                    entries.insert((i, j));
                }
            }
        };

        for form in forms.bilinear_forms() {
            let test_dofs = form.test_space().dof_map();
            let trial_dofs = form.trial_space().dof_map();
            let cell_dofs = |cell: usize| test_dofs.entity_dofs(cell).zip(trial_dofs.entity_dofs(cell));

            if form.implements_quadrature_on(EntityKind::Cells) {
                for (cell, rows) in test_dofs.iter() {
                    if let Some(cols) = trial_dofs.entity_dofs(cell) {
                        insert_block(rows, cols);
                    }
                }
            }

            if form.implements_quadrature_on(EntityKind::ExteriorFaces) {
                for face in form.test_space().exterior_faces() {
                    if let Some((rows, cols)) = cell_dofs(face.cell.cell) {
                        insert_block(rows, cols);
                    }
                }
            }

            if form.implements_quadrature_on(EntityKind::InteriorFaces) {
                for face in form.test_space().interior_faces() {
                    let [first, second] = face.cells;
                    if let (Some((rows_1, cols_1)), Some((rows_2, cols_2))) =
                        (cell_dofs(first.cell), cell_dofs(second.cell))
                    {
                        let rows: Vec<_> = rows_1.iter().chain(rows_2).copied().collect();
                        let cols: Vec<_> = cols_1.iter().chain(cols_2).copied().collect();
                        insert_block(&rows, &cols);
                    }
                }
            }
        }

        entries
    }

    /// Builds the CSR sparsity pattern of the bilinear forms of the collection.
    ///
    /// The pattern has as many rows as the shared test space has dofs and as many columns as the
    /// shared trial space has dofs.
    pub fn assemble_pattern<P>(&self, forms: &FormCollection<T, P>) -> eyre::Result<SparsityPattern> {
        let (test_space, trial_space) = match (forms.test_space()?, forms.trial_space()?) {
            (Some(test), Some(trial)) => (test, trial),
            _ => {
                return Err(FemError::MismatchedSpaces(
                    "a sparsity pattern requires at least one bilinear form".to_string(),
                )
                .into())
            }
        };
        let num_rows = test_space.num_dofs();
        let num_cols = trial_space.num_dofs();

        let matrix_entries = self.get_sparsity(forms);
        let mut offsets = Vec::with_capacity(num_rows + 1);
        let mut column_indices = Vec::with_capacity(matrix_entries.len());

        offsets.push(0);
        for (i, j) in matrix_entries {
            // Loop to correctly handle consecutive empty rows
            while i + 1 > offsets.len() {
                offsets.push(column_indices.len());
            }
            column_indices.push(j);
        }
        while offsets.len() < num_rows + 1 {
            offsets.push(column_indices.len());
        }

        debug!(
            "Assembled sparsity pattern with {} rows, {} columns and {} entries",
            num_rows,
            num_cols,
            column_indices.len()
        );

        let pattern = SparsityPattern::try_from_offsets_and_indices(num_rows, num_cols, offsets, column_indices)?;
        Ok(pattern)
    }

    /// Allocates a zeroed CSR matrix with the sparsity pattern of the bilinear forms.
    pub fn allocate_matrix<P>(&self, forms: &FormCollection<T, P>) -> eyre::Result<CsrMatrix<T>> {
        let pattern = self.assemble_pattern(forms)?;
        let values = vec![T::zero(); pattern.nnz()];
        let matrix = CsrMatrix::try_from_pattern_and_values(pattern, values)
            .map_err(|err| eyre!("failed to allocate CSR matrix: {}", err))?;
        Ok(matrix)
    }

    /// Returns `seed` plus the sum of all local contributions of the functionals.
    pub fn assemble_functionals<P>(
        &self,
        seed: T,
        forms: &FormCollection<T, P>,
        state: Option<&FeFunction<T>>,
        params: &P,
    ) -> eyre::Result<T> {
        let mut total = seed;
        for form in forms.functionals() {
            let space = form.space().as_ref();

            if form.implements_quadrature_on(EntityKind::Cells) {
                for cell in space.cells() {
                    let context = CellFunctionalContext::build(space, cell, state, form.quadrature(), params)?;
                    total += form.local_cell_functional(&context)?;
                }
            }

            if form.implements_quadrature_on(EntityKind::ExteriorFaces) {
                for face in space.exterior_faces() {
                    let face_entity = face_entity(space, face.face)?;
                    let context = ExteriorFaceContext::build(space, None, face_entity, face.cell, state, params)?;
                    total += form.local_exterior_face_functional(&context)?;
                }
            }

            if form.implements_quadrature_on(EntityKind::InteriorFaces) {
                for face in space.interior_faces() {
                    let face_entity = face_entity(space, face.face)?;
                    let context = InteriorFaceContext::build(space, None, face_entity, face.cells, state, params)?;
                    total += form.local_interior_face_functional(&context)?;
                }
            }
        }
        Ok(total)
    }

    /// Adds the contributions of all linear forms to `target`.
    pub fn assemble_linear_forms<'b, P>(
        &self,
        target: impl Into<DVectorViewMut<'b, T>>,
        forms: &FormCollection<T, P>,
        state: Option<&FeFunction<T>>,
        params: &P,
    ) -> eyre::Result<()> {
        let mut target = target.into();
        let ws = &mut *self.workspace.borrow_mut();
        let local = &mut ws.local_vector;

        for form in forms.linear_forms() {
            let space = form.test_space().as_ref();
            FemError::check_dimension("linear form target", space.num_dofs(), target.len())?;

            if form.implements_quadrature_on(EntityKind::Cells) {
                for cell in space.cells() {
                    let context = CellLinearFormContext::build(space, cell, state, form.quadrature(), params)?;
                    reset_vector(local, context.test.num_dofs());
                    form.local_cell_linear_form(local.as_view_mut(), &context)?;
                    scatter_vector(&mut target, context.test.dofs(), local);
                }
            }

            if form.implements_quadrature_on(EntityKind::ExteriorFaces) {
                for face in space.exterior_faces() {
                    let face_entity = face_entity(space, face.face)?;
                    let context = ExteriorFaceContext::build(space, None, face_entity, face.cell, state, params)?;
                    reset_vector(local, context.side.test.num_dofs());
                    form.local_exterior_face_linear_form(local.as_view_mut(), &context)?;
                    scatter_vector(&mut target, context.side.test.dofs(), local);
                }
            }

            if form.implements_quadrature_on(EntityKind::InteriorFaces) {
                for face in space.interior_faces() {
                    let face_entity = face_entity(space, face.face)?;
                    let context = InteriorFaceContext::build(space, None, face_entity, face.cells, state, params)?;
                    let dofs = context.test_dofs();
                    reset_vector(local, dofs.len());
                    form.local_interior_face_linear_form(local.as_view_mut(), &context)?;
                    scatter_vector(&mut target, &dofs, local);
                }
            }
        }
        Ok(())
    }

    /// Adds the contributions of all bilinear forms to `target`.
    ///
    /// Fails with [`FemError::SparsityViolation`] if a contribution falls outside the sparsity
    /// pattern of `target`.
    pub fn assemble_bilinear_forms<P>(
        &self,
        target: &mut CsrMatrix<T>,
        forms: &FormCollection<T, P>,
        state: Option<&FeFunction<T>>,
        params: &P,
    ) -> eyre::Result<()> {
        let (nrows, ncols) = (target.nrows(), target.ncols());
        self.assemble_bilinear_forms_with(forms, state, params, nrows, ncols, |rows, cols, local| {
            for (r, &i) in rows.iter().enumerate() {
                let mut row = target
                    .get_row_mut(i)
                    .ok_or(FemError::SparsityViolation { row: i, col: cols.first().copied().unwrap_or(0) })?;
                let (row_cols, row_values) = row.cols_and_values_mut();
                for (c, &j) in cols.iter().enumerate() {
                    let k = row_cols
                        .binary_search(&j)
                        .map_err(|_| FemError::SparsityViolation { row: i, col: j })?;
                    row_values[k] += local[(r, c)];
                }
            }
            Ok(())
        })
    }

    /// Adds the contributions of all bilinear forms to a dense matrix.
    pub fn assemble_bilinear_forms_dense<P>(
        &self,
        target: &mut DMatrix<T>,
        forms: &FormCollection<T, P>,
        state: Option<&FeFunction<T>>,
        params: &P,
    ) -> eyre::Result<()> {
        let (nrows, ncols) = target.shape();
        self.assemble_bilinear_forms_with(forms, state, params, nrows, ncols, |rows, cols, local| {
            for (r, &i) in rows.iter().enumerate() {
                for (c, &j) in cols.iter().enumerate() {
                    target[(i, j)] += local[(r, c)];
                }
            }
            Ok(())
        })
    }

    fn assemble_bilinear_forms_with<P, F>(
        &self,
        forms: &FormCollection<T, P>,
        state: Option<&FeFunction<T>>,
        params: &P,
        nrows: usize,
        ncols: usize,
        mut scatter: F,
    ) -> eyre::Result<()>
    where
        F: FnMut(&[usize], &[usize], &DMatrix<T>) -> eyre::Result<()>,
    {
        let ws = &mut *self.workspace.borrow_mut();
        let local = &mut ws.local_matrix;

        for &form in forms.bilinear_forms() {
            let test_space = form.test_space().as_ref();
            let trial_space = form.trial_space().as_ref();
            FemError::check_dimension("bilinear form target rows", test_space.num_dofs(), nrows)?;
            FemError::check_dimension("bilinear form target columns", trial_space.num_dofs(), ncols)?;

            if form.implements_quadrature_on(EntityKind::Cells) {
                for cell in test_space.cells() {
                    let context =
                        CellBilinearFormContext::build(test_space, trial_space, cell, state, form.quadrature(), params)?;
                    reset_matrix(local, context.test.num_dofs(), context.trial.num_dofs());
                    form.local_cell_bilinear_form(local.as_view_mut(), &context)?;
                    scatter(context.test.dofs(), context.trial.dofs(), local)?;
                }
            }

            assemble_bilinear_faces(form, test_space, trial_space, state, params, local, &mut scatter)?;
        }
        Ok(())
    }

    /// Eliminates essential boundary conditions from an assembled system.
    ///
    /// See [`essential_bc_data`] and [`apply_essential_bc_csr`]. Returns the constrained dofs
    /// and the values that were prescribed for them.
    pub fn integrate_essential_bc<'b>(
        &self,
        matrix: &mut CsrMatrix<T>,
        rhs: impl Into<DVectorViewMut<'b, T>>,
        space: &FunctionSpace<T>,
        bcs: &[EssentialBc<T>],
        current_state: Option<&FeFunction<T>>,
    ) -> eyre::Result<EssentialBcData<T>> {
        let data = essential_bc_data(space, bcs, current_state)?;
        apply_essential_bc_csr(matrix, rhs, &data)?;
        Ok(data)
    }
}

fn assemble_bilinear_faces<T, P, F>(
    form: &dyn BilinearForm<T, P>,
    test_space: &FunctionSpace<T>,
    trial_space: &FunctionSpace<T>,
    state: Option<&FeFunction<T>>,
    params: &P,
    local: &mut DMatrix<T>,
    scatter: &mut F,
) -> eyre::Result<()>
where
    T: Real,
    F: FnMut(&[usize], &[usize], &DMatrix<T>) -> eyre::Result<()>,
{
    if form.implements_quadrature_on(EntityKind::ExteriorFaces) {
        for face in test_space.exterior_faces() {
            let face_entity = face_entity(test_space, face.face)?;
            let context =
                ExteriorFaceContext::build(test_space, Some(trial_space), face_entity, face.cell, state, params)?;
            let trial = trial_of(&context.side.trial)?;
            reset_matrix(local, context.side.test.num_dofs(), trial.num_dofs());
            form.local_exterior_face_bilinear_form(local.as_view_mut(), &context)?;
            scatter(context.side.test.dofs(), trial.dofs(), local)?;
        }
    }

    if form.implements_quadrature_on(EntityKind::InteriorFaces) {
        for face in test_space.interior_faces() {
            let face_entity = face_entity(test_space, face.face)?;
            let context =
                InteriorFaceContext::build(test_space, Some(trial_space), face_entity, face.cells, state, params)?;
            let rows = context.test_dofs();
            let cols = context.trial_dofs();
            reset_matrix(local, rows.len(), cols.len());
            form.local_interior_face_bilinear_form(local.as_view_mut(), &context)?;
            scatter(&rows, &cols, local)?;
        }
    }
    Ok(())
}

fn trial_of<'s, 'a, T: Real>(
    trial: &'s Option<crate::space::LocalFunctionSpace<'a, T>>,
) -> eyre::Result<&'s crate::space::LocalFunctionSpace<'a, T>> {
    trial
        .as_ref()
        .ok_or_else(|| FemError::MismatchedSpaces("face context for a bilinear form lacks a trial space".to_string()).into())
}

fn face_entity<T: Real>(space: &FunctionSpace<T>, vertex: usize) -> eyre::Result<&crate::mesh::MeshEntity> {
    space
        .mesh()
        .vertex_entity(vertex)
        .ok_or_else(|| FemError::InvalidMesh(format!("face {} does not exist", vertex)).into())
}

fn reset_vector<T: Real>(vector: &mut DVector<T>, len: usize) {
    vector.resize_vertically_mut(len, T::zero());
    vector.fill(T::zero());
}

fn reset_matrix<T: Real>(matrix: &mut DMatrix<T>, nrows: usize, ncols: usize) {
    matrix.resize_mut(nrows, ncols, T::zero());
    matrix.fill(T::zero());
}

fn scatter_vector<T: Real>(target: &mut DVectorViewMut<T>, dofs: &[usize], local: &DVector<T>) {
    for (&i, &value) in dofs.iter().zip(local.iter()) {
        target[i] += value;
    }
}
