use crate::error::FemError;
use galerkin_traits::{real, Real};
use nalgebra::{DMatrix, DVectorView, DVectorViewMut};
use nalgebra_sparse::factorization::{CholeskyError, CscCholesky};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::{CscMatrix, CsrMatrix};

/// Solves linear systems `A x = b` with a sparse system matrix.
pub trait LinearSolver<T: Real> {
    fn solve(&mut self, matrix: &CsrMatrix<T>, rhs: DVectorView<T>, solution: DVectorViewMut<T>) -> eyre::Result<()>;
}

fn check_system<T: Real>(matrix: &CsrMatrix<T>, rhs: &DVectorView<T>, solution: &DVectorViewMut<T>) -> eyre::Result<()> {
    FemError::check_dimension("system matrix columns", matrix.nrows(), matrix.ncols())?;
    FemError::check_dimension("right-hand side", matrix.nrows(), rhs.len())?;
    FemError::check_dimension("solution", matrix.ncols(), solution.len())
}

/// Dense LU factorization with partial pivoting.
///
/// Converts the matrix to dense storage, so it is only suitable for small systems.
#[derive(Debug, Clone, Default)]
pub struct DirectSolver;

impl<T: Real> LinearSolver<T> for DirectSolver {
    fn solve(&mut self, matrix: &CsrMatrix<T>, rhs: DVectorView<T>, mut solution: DVectorViewMut<T>) -> eyre::Result<()> {
        check_system(matrix, &rhs, &solution)?;
        let dense = DMatrix::from(matrix);
        let x = dense
            .lu()
            .solve(&rhs)
            .ok_or_else(|| FemError::SingularSystem("LU factorization encountered a zero pivot".to_string()))?;
        if x.iter().any(|x_i| !x_i.is_finite()) {
            return Err(FemError::SingularSystem("LU solve produced non-finite values".to_string()).into());
        }
        solution.copy_from(&x);
        Ok(())
    }
}

/// Sparse Cholesky factorization for symmetric positive definite systems.
///
/// Matrices that are not numerically symmetric are rejected with
/// [`FemError::NonSymmetricSystem`], since the factorization only reads one triangle.
///
/// The symbolic factorization is kept between solves and reused as long as the sparsity
/// pattern of the matrix does not change, which is the case across Newton iterations.
#[derive(Debug, Clone, Default)]
pub struct CholeskySolver<T: Real> {
    factorization: Option<(SparsityPattern, CscCholesky<T>)>,
}

impl<T: Real> CholeskySolver<T> {
    pub fn new() -> Self {
        Self { factorization: None }
    }

    fn factor(&mut self, csc: &CscMatrix<T>) -> eyre::Result<&CscCholesky<T>> {
        let singular = |err: CholeskyError| FemError::SingularSystem(format!("Cholesky factorization failed: {:?}", err));

        let reusable = matches!(&self.factorization, Some((pattern, _)) if pattern == csc.pattern());
        if reusable {
            if let Some((_, cholesky)) = self.factorization.as_mut() {
                cholesky.refactor(csc.values()).map_err(singular)?;
            }
        } else {
            let cholesky = CscCholesky::factor(csc).map_err(singular)?;
            self.factorization = Some((csc.pattern().clone(), cholesky));
        }

        self.factorization
            .as_ref()
            .map(|(_, cholesky)| cholesky)
            .ok_or_else(|| FemError::SingularSystem("missing factorization".to_string()).into())
    }
}

impl<T: Real> LinearSolver<T> for CholeskySolver<T> {
    fn solve(&mut self, matrix: &CsrMatrix<T>, rhs: DVectorView<T>, mut solution: DVectorViewMut<T>) -> eyre::Result<()> {
        check_system(matrix, &rhs, &solution)?;
        check_numeric_symmetry(matrix)?;
        let csc = CscMatrix::from(matrix);
        let cholesky = self.factor(&csc)?;
        let b = DMatrix::from_iterator(rhs.len(), 1, rhs.iter().copied());
        let x = cholesky.solve(&b);
        if x.iter().any(|x_i| !x_i.is_finite()) {
            return Err(FemError::SingularSystem("Cholesky solve produced non-finite values".to_string()).into());
        }
        solution.copy_from(&x.column(0));
        Ok(())
    }
}

/// Checks `A[i, j] == A[j, i]` up to a tolerance relative to the largest entry.
fn check_numeric_symmetry<T: Real>(matrix: &CsrMatrix<T>) -> eyre::Result<()> {
    let scale = matrix
        .values()
        .iter()
        .fold(T::zero(), |acc, &v| acc.max(v.abs()));
    let tol = scale * real::<T>(1e-12);
    for (i, j, &a_ij) in matrix.triplet_iter() {
        let a_ji = matrix
            .get_entry(j, i)
            .map_or(T::zero(), |entry| entry.into_value());
        if (a_ij - a_ji).abs() > tol {
            return Err(FemError::NonSymmetricSystem(format!(
                "Cholesky factorization requires a symmetric matrix, but entries ({}, {}) and ({}, {}) differ",
                i, j, j, i
            ))
            .into());
        }
    }
    Ok(())
}
