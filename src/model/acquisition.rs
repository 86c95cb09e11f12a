//! Expected utility of the best option (EUBO)
//!
//! For a batch of `q` points offered as a forced choice, EUBO is the
//! expected posterior utility of whichever point the user would prefer:
//!
//! ```text
//! EUBO(x₁..x_q) = E[max_i f(x_i)]
//! ```
//!
//! For `q = 2` this has a closed form. Larger batches use Monte Carlo with
//! a fixed set of standard normal draws so that the criterion is a
//! deterministic, smooth function of the batch.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

use super::preference::PreferenceModel;
use crate::space::ParameterVector;

/// Batch acquisition criterion
pub trait Acquisition: Send + Sync {
    /// Score a batch; higher is better
    fn score(&self, model: &PreferenceModel, batch: &[ParameterVector]) -> f64;
}

/// EUBO with analytic pairs and fixed-draw Monte Carlo for larger batches
#[derive(Clone, Debug)]
pub struct Eubo {
    /// Row-major `samples × q` standard normal draws
    draws: Vec<f64>,
    samples: usize,
    q: usize,
}

impl Eubo {
    /// Create the criterion for batches of `q` points
    ///
    /// `samples` draws are generated from `seed` once and reused by every
    /// evaluation. They are unused when `q <= 2`.
    pub fn new(q: usize, samples: usize, seed: u64) -> Self {
        let draws: Vec<f64> = if q > 2 {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..samples * q)
                .map(|_| StandardNormal.sample(&mut rng))
                .collect()
        } else {
            Vec::new()
        };
        Self { draws, samples, q }
    }

    /// Batch size this criterion was built for
    pub fn batch_size(&self) -> usize {
        self.q
    }

    fn monte_carlo(&self, mean: &DVector<f64>, cov: &DMatrix<f64>) -> f64 {
        let q = mean.len();
        let l = match factor(cov) {
            Some(l) => l,
            None => return f64::NEG_INFINITY,
        };
        let mut total = 0.0;
        for s in 0..self.samples {
            let z = DVector::from_row_slice(&self.draws[s * self.q..s * self.q + q]);
            let f = mean + &l * z;
            total += f.max();
        }
        total / self.samples as f64
    }
}

impl Acquisition for Eubo {
    fn score(&self, model: &PreferenceModel, batch: &[ParameterVector]) -> f64 {
        match batch.len() {
            0 => f64::NEG_INFINITY,
            1 => model.posterior_mean(&batch[0]),
            2 => {
                let (mean, cov) = model.posterior(batch);
                eubo_pair(
                    mean[0],
                    mean[1],
                    cov[(0, 0)] + cov[(1, 1)] - 2.0 * cov[(0, 1)],
                )
            }
            n if n <= self.q && self.samples > 0 => {
                let (mean, cov) = model.posterior(batch);
                self.monte_carlo(&mean, &cov)
            }
            _ => f64::NEG_INFINITY,
        }
    }
}

/// Closed form of `E[max(f₁, f₂)]` for a bivariate normal
///
/// With `θ² = Var(f₁ - f₂)` and `α = (μ₁ - μ₂) / θ`:
///
/// ```text
/// E[max] = μ₁ Φ(α) + μ₂ Φ(-α) + θ φ(α)
/// ```
pub fn eubo_pair(mu1: f64, mu2: f64, diff_variance: f64) -> f64 {
    let theta = diff_variance.max(0.0).sqrt();
    if theta < 1e-12 {
        return mu1.max(mu2);
    }
    let alpha = (mu1 - mu2) / theta;
    mu1 * normal_cdf(alpha) + mu2 * normal_cdf(-alpha) + theta * normal_pdf(alpha)
}

/// Lower-triangular factor of a covariance matrix, adding jitter as needed
fn factor(cov: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let n = cov.nrows();
    let mut jitter = 0.0;
    for _ in 0..6 {
        let mut m = cov.clone();
        for i in 0..n {
            m[(i, i)] += jitter;
        }
        if let Some(chol) = m.cholesky() {
            return Some(chol.unpack());
        }
        jitter = if jitter == 0.0 { 1e-9 } else { jitter * 10.0 };
    }
    None
}

/// Standard normal density
fn normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// Standard normal CDF approximation
fn normal_cdf(x: f64) -> f64 {
    // Abramowitz and Stegun approximation
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs() / std::f64::consts::SQRT_2;

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    0.5 * (1.0 + sign * y)
}
