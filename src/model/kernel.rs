//! Squared-exponential kernel over parameter vectors

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::space::ParameterVector;

/// Isotropic RBF kernel: `k(x, y) = σ² exp(-|x - y|² / 2ℓ²)`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RbfKernel {
    /// Lengthscale ℓ
    pub lengthscale: f64,
    /// Signal variance σ²
    pub variance: f64,
}

impl RbfKernel {
    /// Create a kernel
    pub fn new(lengthscale: f64, variance: f64) -> Self {
        Self {
            lengthscale,
            variance,
        }
    }

    /// Covariance between two points
    pub fn eval(&self, a: &ParameterVector, b: &ParameterVector) -> f64 {
        let sq: f64 = a
            .values()
            .iter()
            .zip(b.values().iter())
            .map(|(x, y)| (x - y).powi(2))
            .sum();
        self.variance * (-0.5 * sq / (self.lengthscale * self.lengthscale)).exp()
    }

    /// Gram matrix with `jitter` added to the diagonal
    pub fn gram(&self, points: &[ParameterVector], jitter: f64) -> DMatrix<f64> {
        let n = points.len();
        let mut k = DMatrix::from_fn(n, n, |i, j| self.eval(&points[i], &points[j]));
        for i in 0..n {
            k[(i, i)] += jitter;
        }
        k
    }

    /// Cross-covariance matrix, rows indexed by `a`, columns by `b`
    pub fn cross(&self, a: &[ParameterVector], b: &[ParameterVector]) -> DMatrix<f64> {
        DMatrix::from_fn(a.len(), b.len(), |i, j| self.eval(&a[i], &b[j]))
    }

    /// Covariances of one point against a set
    pub fn column(&self, x: &ParameterVector, points: &[ParameterVector]) -> DVector<f64> {
        DVector::from_iterator(points.len(), points.iter().map(|p| self.eval(x, p)))
    }
}
