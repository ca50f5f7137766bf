use crate::error::FemError;
use crate::function::FeFunction;
use crate::space::FunctionSpace;
use galerkin_traits::Real;
use itertools::izip;
use log::debug;
use nalgebra::{DMatrix, DVector, DVectorViewMut, Point1};
use nalgebra_sparse::CsrMatrix;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Debug;

type Indicator<T> = Box<dyn Fn(&Point1<T>) -> DVector<bool> + Send + Sync>;
type ValueFunction<T> = Box<dyn Fn(&Point1<T>) -> DVector<T> + Send + Sync>;

/// An essential (Dirichlet) boundary condition.
///
/// The indicator flags, per component, where the condition applies; the value function gives
/// the prescribed value. Both are evaluated at the support points of the space.
pub struct EssentialBc<T: Real> {
    indicator: Indicator<T>,
    value: ValueFunction<T>,
}

impl<T: Real> Debug for EssentialBc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EssentialBc").finish_non_exhaustive()
    }
}

impl<T: Real> EssentialBc<T> {
    pub fn new(
        indicator: impl Fn(&Point1<T>) -> DVector<bool> + Send + Sync + 'static,
        value: impl Fn(&Point1<T>) -> DVector<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            indicator: Box::new(indicator),
            value: Box::new(value),
        }
    }

    /// A condition on a scalar field.
    pub fn scalar(
        indicator: impl Fn(&Point1<T>) -> bool + Send + Sync + 'static,
        value: impl Fn(&Point1<T>) -> T + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            move |x| DVector::from_element(1, indicator(x)),
            move |x| DVector::from_element(1, value(x)),
        )
    }

    /// A scalar condition prescribing zero.
    pub fn homogeneous(indicator: impl Fn(&Point1<T>) -> bool + Send + Sync + 'static) -> Self {
        Self::scalar(indicator, |_| T::zero())
    }

    pub fn indicator(&self, x: &Point1<T>) -> DVector<bool> {
        (self.indicator)(x)
    }

    pub fn value(&self, x: &Point1<T>) -> DVector<T> {
        (self.value)(x)
    }
}

/// Constrained dofs, in ascending order, together with their prescribed values.
#[derive(Debug, Clone, PartialEq)]
pub struct EssentialBcData<T: Real> {
    pub dofs: Vec<usize>,
    pub values: Vec<T>,
}

impl<T: Real> EssentialBcData<T> {
    pub fn is_empty(&self) -> bool {
        self.dofs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dofs.len()
    }

    pub fn iter(&self) -> impl '_ + Iterator<Item = (usize, T)> {
        self.dofs.iter().copied().zip(self.values.iter().copied())
    }

    /// Euclidean norm of the prescribed values.
    pub fn norm(&self) -> T {
        self.values
            .iter()
            .fold(T::zero(), |acc, &v| acc + v * v)
            .sqrt()
    }
}

/// Determines the constrained dofs of `space` and the values prescribed for them.
///
/// Indicator and value are interpolated onto the space. When a `current_state` is given, its
/// dof values are subtracted from the prescribed values, which yields the increments needed to
/// satisfy the conditions. When several conditions constrain the same dof, the last one wins.
pub fn essential_bc_data<T: Real>(
    space: &FunctionSpace<T>,
    bcs: &[EssentialBc<T>],
    current_state: Option<&FeFunction<T>>,
) -> eyre::Result<EssentialBcData<T>> {
    if let Some(state) = current_state {
        if !std::ptr::eq(state.space().as_ref(), space) {
            return Err(FemError::MismatchedSpaces(
                "the current state does not live on the space of the boundary conditions".to_string(),
            )
            .into());
        }
    }

    let value_dim = space.value_dim();
    let mut constrained = BTreeMap::new();
    for bc in bcs {
        let flags = space.interpolate(&|x| {
            bc.indicator(x)
                .map(|flag| if flag { T::one() } else { T::zero() })
        })?;
        let values = space.interpolate(&|x| bc.value(x))?;
        debug_assert_eq!(flags.len(), values.len());
        for (dof, &flag, &value) in izip!(0.., flags.iter(), values.iter()) {
            if flag == T::one() {
                constrained.insert(dof, value);
            }
        }
    }

    let (dofs, mut values): (Vec<_>, Vec<_>) = constrained.into_iter().unzip();
    if let Some(state) = current_state {
        for (&dof, value) in dofs.iter().zip(values.iter_mut()) {
            *value -= state.dof_values()[dof];
        }
    }

    debug!(
        "Essential boundary conditions constrain {} of {} dofs (value dim {})",
        dofs.len(),
        space.num_dofs(),
        value_dim
    );
    Ok(EssentialBcData { dofs, values })
}

/// Eliminates constrained dofs from a CSR system in place.
///
/// Dofs are processed one at a time. For a dof `i` with prescribed value `v`, every other row
/// `j` with an entry in column `i` is lifted, `rhs[j] -= v * A[j, i]`, and the entry is zeroed.
/// Then row `i` is zeroed, `A[i, i] = 1` and `rhs[i] = v`. The free part of the solution of the
/// modified system equals the solution of the original system with the constraints imposed.
///
/// The symmetry of the sparsity pattern is used to find the entries of column `i` from row `i`,
/// so the pattern must be structurally symmetric. Otherwise
/// [`FemError::NonSymmetricSystem`] is returned and the system is left untouched.
pub fn apply_essential_bc_csr<'a, T: Real>(
    matrix: &mut CsrMatrix<T>,
    rhs: impl Into<DVectorViewMut<'a, T>>,
    data: &EssentialBcData<T>,
) -> eyre::Result<()> {
    let mut rhs = rhs.into();
    check_square_system(matrix.nrows(), matrix.ncols(), rhs.len())?;
    check_structural_symmetry(matrix)?;

    for (i, v) in data.iter() {
        check_dof_in_bounds(i, matrix.nrows())?;

        let columns = matrix.row(i).col_indices().to_vec();
        if columns.binary_search(&i).is_err() {
            return Err(FemError::SparsityViolation { row: i, col: i }.into());
        }

        for &j in columns.iter().filter(|&&j| j != i) {
            let mut row_j = matrix.row_mut(j);
            let (cols_j, values_j) = row_j.cols_and_values_mut();
            let k = cols_j
                .binary_search(&i)
                .map_err(|_| FemError::NonSymmetricSystem(format!("entry ({}, {}) has no transpose", i, j)))?;
            rhs[j] -= v * values_j[k];
            values_j[k] = T::zero();
        }

        let mut row_i = matrix.row_mut(i);
        let (cols_i, values_i) = row_i.cols_and_values_mut();
        for (&j, value) in cols_i.iter().zip(values_i.iter_mut()) {
            *value = if j == i { T::one() } else { T::zero() };
        }
        rhs[i] = v;
    }
    Ok(())
}

/// Dense counterpart of [`apply_essential_bc_csr`].
pub fn apply_essential_bc_dense<'a, T: Real>(
    matrix: &mut DMatrix<T>,
    rhs: impl Into<DVectorViewMut<'a, T>>,
    data: &EssentialBcData<T>,
) -> eyre::Result<()> {
    let mut rhs = rhs.into();
    check_square_system(matrix.nrows(), matrix.ncols(), rhs.len())?;

    for (i, v) in data.iter() {
        check_dof_in_bounds(i, matrix.nrows())?;
        for j in (0..matrix.nrows()).filter(|&j| j != i) {
            rhs[j] -= v * matrix[(j, i)];
            matrix[(j, i)] = T::zero();
        }
        matrix.row_mut(i).fill(T::zero());
        matrix[(i, i)] = T::one();
        rhs[i] = v;
    }
    Ok(())
}

fn check_square_system(nrows: usize, ncols: usize, rhs_len: usize) -> eyre::Result<()> {
    if nrows != ncols {
        return Err(FemError::NonSymmetricSystem(format!(
            "essential boundary conditions require a square system, got {} x {}",
            nrows, ncols
        ))
        .into());
    }
    FemError::check_dimension("right-hand side", nrows, rhs_len)
}

fn check_dof_in_bounds(dof: usize, num_dofs: usize) -> eyre::Result<()> {
    if dof < num_dofs {
        Ok(())
    } else {
        Err(FemError::DimensionMismatch {
            what: "constrained dof index bound",
            expected: num_dofs,
            actual: dof + 1,
        }
        .into())
    }
}

fn check_structural_symmetry<T: Real>(matrix: &CsrMatrix<T>) -> eyre::Result<()> {
    let pattern = matrix.pattern();
    for i in 0..pattern.major_dim() {
        for &j in pattern.lane(i) {
            if pattern.lane(j).binary_search(&i).is_err() {
                return Err(FemError::NonSymmetricSystem(format!(
                    "entry ({}, {}) is in the sparsity pattern but ({}, {}) is not",
                    i, j, j, i
                ))
                .into());
            }
        }
    }
    Ok(())
}
