//! Quadrature rules on the reference line `[-1, 1]`.
use crate::error::FemError;
use galerkin_traits::{real, real_from_usize, Real};
use nalgebra::{DMatrix, Point1, Scalar, SymmetricEigen};
use num::Zero;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::{AddAssign, Mul};

/// Largest number of points for which Gauss–Legendre rules are tabulated in closed form.
/// Larger rules are computed with the Golub–Welsch algorithm.
pub const TABULATED_GAUSS_POINTS: usize = 5;

/// A quadrature rule consisting of ordered weights and points.
pub trait Quadrature<T: Scalar> {
    fn weights(&self) -> &[T];
    fn points(&self) -> &[Point1<T>];

    fn num_points(&self) -> usize {
        self.points().len()
    }

    /// Approximates the integral of the given function using this quadrature rule.
    ///
    /// Terms are accumulated in rule order.
    fn integrate<U, Function>(&self, f: Function) -> U
    where
        Function: Fn(&Point1<T>) -> U,
        U: Zero + Mul<T, Output = U> + AddAssign<U>,
    {
        let mut integral = U::zero();
        for (w, p) in self.weights().iter().zip(self.points()) {
            integral += f(p) * w.clone();
        }
        integral
    }

    fn iter(&self) -> QuadratureIter<'_, T> {
        QuadratureIter {
            weights: self.weights().iter(),
            points: self.points().iter(),
        }
    }
}

impl<T, Q> Quadrature<T> for &Q
where
    T: Scalar,
    Q: Quadrature<T> + ?Sized,
{
    fn weights(&self) -> &[T] {
        Q::weights(self)
    }

    fn points(&self) -> &[Point1<T>] {
        Q::points(self)
    }
}

/// Iterator over `(weight, point)` pairs of a quadrature rule.
#[derive(Debug, Clone)]
pub struct QuadratureIter<'a, T: Scalar> {
    weights: std::slice::Iter<'a, T>,
    points: std::slice::Iter<'a, Point1<T>>,
}

impl<'a, T: Scalar> Iterator for QuadratureIter<'a, T> {
    type Item = (&'a T, &'a Point1<T>);

    fn next(&mut self) -> Option<Self::Item> {
        Some((self.weights.next()?, self.points.next()?))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.weights.size_hint()
    }
}

impl<'a, T: Scalar> ExactSizeIterator for QuadratureIter<'a, T> {}

/// An owned quadrature rule on the reference line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct QuadratureRule<T: Scalar> {
    weights: Vec<T>,
    points: Vec<Point1<T>>,
    degree: usize,
}

impl<T: Scalar> QuadratureRule<T> {
    /// Creates a rule from weights and points.
    ///
    /// `degree` is the highest polynomial degree the rule integrates exactly.
    pub fn from_weights_and_points(weights: Vec<T>, points: Vec<Point1<T>>, degree: usize) -> eyre::Result<Self> {
        FemError::check_dimension("quadrature points", weights.len(), points.len())?;
        Ok(Self {
            weights,
            points,
            degree,
        })
    }

    /// The highest polynomial degree this rule integrates exactly.
    pub fn degree(&self) -> usize {
        self.degree
    }
}

impl<T: Scalar> Quadrature<T> for QuadratureRule<T> {
    fn weights(&self) -> &[T] {
        &self.weights
    }

    fn points(&self) -> &[Point1<T>] {
        &self.points
    }
}

impl<T: Real> QuadratureRule<T> {
    /// The one-point midpoint rule, exact for linear polynomials.
    pub fn midpoint() -> Self {
        Self {
            weights: vec![T::one() + T::one()],
            points: vec![Point1::new(T::zero())],
            degree: 1,
        }
    }

    /// The Gauss–Legendre rule with the fewest points that integrates polynomials of the
    /// given degree exactly.
    pub fn gauss(degree: usize) -> eyre::Result<Self> {
        Self::gauss_points(degree / 2 + 1)
    }

    /// The Gauss–Legendre rule with the given number of points.
    pub fn gauss_points(num_points: usize) -> eyre::Result<Self> {
        let (weights, points) = gauss_legendre(num_points)?;
        let points = points.into_iter().map(Point1::new).collect();
        Ok(Self {
            weights,
            points,
            degree: 2 * num_points - 1,
        })
    }
}

/// Gauss–Legendre weights and points on `[-1, 1]`, points in ascending order.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
fn gauss_legendre<T: Real>(num_points: usize) -> eyre::Result<(Vec<T>, Vec<T>)> {
    let rule = match num_points {
        1 => (vec![2.0], vec![0.0]),
        2 => {
            let x = T::one() / T::sqrt(3.0);
            (vec![1.0, 1.0], vec![-x, x])
        }
        3 => {
            let x = T::sqrt(3.0 / 5.0);
            (vec![5.0 / 9.0, 8.0 / 9.0, 5.0 / 9.0], vec![-x, 0.0, x])
        }
        4 => (
            vec![
                0.347854845137453857,
                0.652145154862546143,
                0.652145154862546143,
                0.347854845137453857,
            ],
            vec![
                -0.861136311594052575,
                -0.339981043584856265,
                0.339981043584856265,
                0.861136311594052575,
            ],
        ),
        5 => (
            vec![
                0.236926885056189088,
                0.478628670499366468,
                0.568888888888888889,
                0.478628670499366468,
                0.236926885056189088,
            ],
            vec![
                -0.906179845938663993,
                -0.538469310105683091,
                0.0,
                0.538469310105683091,
                0.906179845938663993,
            ],
        ),
        0 => return Err(FemError::UnsupportedQuadrature(0).into()),
        _ => golub_welsch(num_points),
    };
    Ok(rule)
}

/// Gauss–Legendre weights and points from the eigen-decomposition of the symmetric tridiagonal
/// Jacobi matrix of the Legendre recurrence.
///
/// The points are the eigenvalues and each weight is `2 v_0²`, where `v_0` is the first
/// component of the normalized eigenvector.
fn golub_welsch<T: Real>(num_points: usize) -> (Vec<T>, Vec<T>) {
    let mut jacobi = DMatrix::zeros(num_points, num_points);
    for i in 1..num_points {
        let k = real_from_usize::<T>(i);
        let beta = k / (real::<T>(4.0) * k * k - T::one()).sqrt();
        jacobi[(i - 1, i)] = beta;
        jacobi[(i, i - 1)] = beta;
    }

    let eigen = SymmetricEigen::new(jacobi);
    let mut rule: Vec<(T, T)> = eigen
        .eigenvalues
        .iter()
        .zip(eigen.eigenvectors.row(0).iter())
        .map(|(&x, &v_0)| (x, real::<T>(2.0) * v_0 * v_0))
        .collect();
    rule.sort_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let (points, weights) = rule.into_iter().unzip();
    (weights, points)
}
