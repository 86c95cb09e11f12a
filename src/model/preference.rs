//! Pairwise preference model
//!
//! A Gaussian-process prior over a latent utility `f`, with a
//! Bradley-Terry (logistic) likelihood for every comparison:
//!
//! ```text
//! P(winner beats loser) = σ(f(x_winner) - f(x_loser))
//! ```
//!
//! The posterior is approximated around its mode (Laplace). The mode is
//! found with Newton-Raphson in function space:
//!
//! ```text
//! f_new = (K⁻¹ + W)⁻¹ (W f + ∇ log p(y | f))
//! ```
//!
//! where `W` is the negative Hessian of the log-likelihood. The kernel
//! lengthscale is picked from a small grid by the Laplace approximation of
//! the marginal likelihood.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use serde::{Deserialize, Serialize};

use super::kernel::RbfKernel;
use crate::config::ModelConfig;
use crate::error::FitError;
use crate::space::ParameterVector;

/// One observed preference between two registered candidates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Comparison {
    /// Global index of the preferred candidate
    pub winner: usize,
    /// Global index of the rejected candidate
    pub loser: usize,
}

impl Comparison {
    /// Create a comparison record
    pub fn new(winner: usize, loser: usize) -> Self {
        Self { winner, loser }
    }
}

/// Result of attempting to fit the preference model
///
/// Insufficient data and numerical failure are ordinary outcomes the
/// proposal step branches on, not errors.
#[derive(Debug)]
pub enum FitOutcome {
    /// The model was fit
    Fitted(PreferenceModel),
    /// Fewer than two points or no usable comparison
    InsufficientData,
    /// Every lengthscale failed numerically
    FitFailed(FitError),
}

impl FitOutcome {
    /// The fitted model, if any
    pub fn model(&self) -> Option<&PreferenceModel> {
        match self {
            FitOutcome::Fitted(m) => Some(m),
            _ => None,
        }
    }

    /// Short label for logs and round metadata
    pub fn label(&self) -> &'static str {
        match self {
            FitOutcome::Fitted(_) => "fitted",
            FitOutcome::InsufficientData => "insufficient_data",
            FitOutcome::FitFailed(_) => "fit_failed",
        }
    }
}

/// Laplace-approximated posterior over latent utilities
#[derive(Clone, Debug)]
pub struct PreferenceModel {
    kernel: RbfKernel,
    points: Vec<ParameterVector>,
    /// Posterior mode of the latent utility at the training points
    latent: DVector<f64>,
    /// `K⁻¹ f̂`
    alpha: DVector<f64>,
    /// `K⁻¹`
    k_inv: DMatrix<f64>,
    /// `(K⁻¹ + W)⁻¹`, posterior covariance of the latent values
    latent_cov: DMatrix<f64>,
    log_evidence: f64,
    iterations: usize,
}

impl PreferenceModel {
    /// Fit the model, trying every configured lengthscale
    ///
    /// Returns the fit with the highest Laplace evidence. When every
    /// lengthscale fails, the first error is reported.
    pub fn fit(
        points: &[ParameterVector],
        comparisons: &[Comparison],
        config: &ModelConfig,
    ) -> FitOutcome {
        let usable: Vec<Comparison> = comparisons
            .iter()
            .copied()
            .filter(|c| c.winner != c.loser)
            .collect();
        if points.len() < 2 || usable.is_empty() {
            return FitOutcome::InsufficientData;
        }
        if let Some(bad) = usable
            .iter()
            .map(|c| c.winner.max(c.loser))
            .find(|&i| i >= points.len())
        {
            return FitOutcome::FitFailed(FitError::DimensionMismatch {
                expected: points.len(),
                actual: bad + 1,
            });
        }
        if points.iter().any(|p| !p.is_finite()) {
            return FitOutcome::FitFailed(FitError::NonFinite("input points".to_string()));
        }

        let mut best: Option<PreferenceModel> = None;
        let mut first_error: Option<FitError> = None;

        for &lengthscale in &config.lengthscales {
            let kernel = RbfKernel::new(lengthscale, config.signal_variance);
            match Self::fit_kernel(kernel, points, &usable, config) {
                Ok(model) => {
                    tracing::debug!(
                        lengthscale,
                        log_evidence = model.log_evidence,
                        iterations = model.iterations,
                        "preference fit candidate"
                    );
                    let better = best
                        .as_ref()
                        .map_or(true, |b| model.log_evidence > b.log_evidence);
                    if better {
                        best = Some(model);
                    }
                }
                Err(e) => {
                    tracing::debug!(lengthscale, error = %e, "preference fit failed for lengthscale");
                    first_error.get_or_insert(e);
                }
            }
        }

        match (best, first_error) {
            (Some(model), _) => FitOutcome::Fitted(model),
            (None, Some(e)) => FitOutcome::FitFailed(e),
            (None, None) => FitOutcome::FitFailed(FitError::Singular(
                "no lengthscale configured".to_string(),
            )),
        }
    }

    /// Newton-Raphson for the latent mode under one kernel
    fn fit_kernel(
        kernel: RbfKernel,
        points: &[ParameterVector],
        comparisons: &[Comparison],
        config: &ModelConfig,
    ) -> Result<Self, FitError> {
        let n = points.len();
        let k = kernel.gram(points, config.jitter);
        let k_chol = cholesky(k, "kernel matrix")?;
        let k_inv = k_chol.inverse();

        let mut f = DVector::zeros(n);
        let mut objective = log_posterior(&f, &k_inv, comparisons);
        let mut converged = false;
        let mut iterations = 0;

        for iter in 0..config.max_iterations {
            iterations = iter + 1;

            let (gradient, w) = likelihood_derivatives(&f, comparisons, n);
            let b_chol = cholesky(&k_inv + &w, "posterior precision")?;
            let target = b_chol.solve(&(&w * &f + &gradient));
            let direction = &target - &f;

            // Backtracking keeps the ascent monotone when the step overshoots
            let mut step_size = 1.0;
            let mut accepted = false;
            for _ in 0..10 {
                let candidate = &f + step_size * &direction;
                let candidate_objective = log_posterior(&candidate, &k_inv, comparisons);
                if candidate_objective >= objective {
                    f = candidate;
                    objective = candidate_objective;
                    accepted = true;
                    break;
                }
                step_size *= 0.5;
            }

            if !objective.is_finite() || f.iter().any(|v| !v.is_finite()) {
                return Err(FitError::NonFinite("latent utilities".to_string()));
            }

            let change = step_size * direction.amax();
            if !accepted || change < config.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            return Err(FitError::NotConverged { iterations });
        }

        let (_, w) = likelihood_derivatives(&f, comparisons, n);
        let b_chol = cholesky(&k_inv + &w, "posterior precision")?;
        let log_det_k = log_det(&k_chol);
        let log_det_b = log_det(&b_chol);

        // log|I + KW| = log|K| + log|K⁻¹ + W|
        let log_evidence = objective - 0.5 * (log_det_k + log_det_b);
        if !log_evidence.is_finite() {
            return Err(FitError::NonFinite("log evidence".to_string()));
        }

        let alpha = &k_inv * &f;
        Ok(Self {
            kernel,
            points: points.to_vec(),
            latent: f,
            alpha,
            k_inv,
            latent_cov: b_chol.inverse(),
            log_evidence,
            iterations,
        })
    }

    /// Kernel selected by evidence
    pub fn kernel(&self) -> RbfKernel {
        self.kernel
    }

    /// Laplace approximation of the log marginal likelihood
    pub fn log_evidence(&self) -> f64 {
        self.log_evidence
    }

    /// Number of training points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Never true for a fitted model
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Posterior mean utility at the training points
    pub fn observed_means(&self) -> &DVector<f64> {
        &self.latent
    }

    /// Index of the training point with the highest posterior mean
    ///
    /// Ties resolve to the lowest index.
    pub fn best_observed(&self) -> usize {
        let mut best = 0;
        for (i, &v) in self.latent.iter().enumerate() {
            if v > self.latent[best] {
                best = i;
            }
        }
        best
    }

    /// Posterior mean utility at an arbitrary point
    pub fn posterior_mean(&self, x: &ParameterVector) -> f64 {
        self.kernel.column(x, &self.points).dot(&self.alpha)
    }

    /// Joint posterior mean and covariance at a batch of points
    ///
    /// ```text
    /// μ = K*ᵀ K⁻¹ f̂
    /// Σ = K** - K*ᵀ K⁻¹ K* + K*ᵀ K⁻¹ (K⁻¹ + W)⁻¹ K⁻¹ K*
    /// ```
    pub fn posterior(&self, xs: &[ParameterVector]) -> (DVector<f64>, DMatrix<f64>) {
        let cross = self.kernel.cross(xs, &self.points);
        let a = &cross * &self.k_inv;
        let mean = &cross * &self.alpha;

        let prior = self.kernel.gram(xs, 0.0);
        let reduction = &a * cross.transpose();
        let restored = &a * &self.latent_cov * a.transpose();
        let mut cov = prior - reduction + restored;

        let q = xs.len();
        for i in 0..q {
            cov[(i, i)] = cov[(i, i)].max(0.0);
            for j in (i + 1)..q {
                let s = 0.5 * (cov[(i, j)] + cov[(j, i)]);
                cov[(i, j)] = s;
                cov[(j, i)] = s;
            }
        }
        (mean, cov)
    }
}

fn cholesky(m: DMatrix<f64>, what: &str) -> Result<Cholesky<f64, Dyn>, FitError> {
    if m.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite(what.to_string()));
    }
    m.cholesky()
        .ok_or_else(|| FitError::Singular(format!("{} is not positive definite", what)))
}

fn log_det(chol: &Cholesky<f64, Dyn>) -> f64 {
    2.0 * chol.l_dirty().diagonal().iter().map(|d| d.ln()).sum::<f64>()
}

/// Gradient of the log-likelihood and its negative Hessian `W`
fn likelihood_derivatives(
    f: &DVector<f64>,
    comparisons: &[Comparison],
    n: usize,
) -> (DVector<f64>, DMatrix<f64>) {
    let mut gradient = DVector::zeros(n);
    let mut w = DMatrix::zeros(n, n);

    for c in comparisons {
        let (i, j) = (c.winner, c.loser);
        let p = sigmoid(f[i] - f[j]);
        let q = 1.0 - p;

        gradient[i] += q;
        gradient[j] -= q;

        let h = p * q;
        w[(i, i)] += h;
        w[(j, j)] += h;
        w[(i, j)] -= h;
        w[(j, i)] -= h;
    }

    (gradient, w)
}

/// `log p(y | f) - ½ fᵀ K⁻¹ f`
fn log_posterior(f: &DVector<f64>, k_inv: &DMatrix<f64>, comparisons: &[Comparison]) -> f64 {
    let ll: f64 = comparisons
        .iter()
        .map(|c| log_sigmoid(f[c.winner] - f[c.loser]))
        .sum();
    ll - 0.5 * f.dot(&(k_inv * f))
}

/// Sigmoid function: σ(x) = 1 / (1 + exp(-x))
pub(crate) fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let ex = x.exp();
        ex / (1.0 + ex)
    }
}

/// Log sigmoid: log(σ(x)) = -log(1 + exp(-x))
fn log_sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        -(-x).exp().ln_1p()
    } else {
        x - x.exp().ln_1p()
    }
}
