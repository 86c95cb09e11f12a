//! Multi-restart batch optimizer
//!
//! The acquisition surface is non-convex, so the optimizer first scores a
//! set of random batches inside the box, then refines the best of them
//! with projected finite-difference ascent. The best refined batch wins;
//! ties go to the lowest restart index so the result does not depend on
//! whether restarts ran in parallel.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;

use super::acquisition::Acquisition;
use super::preference::PreferenceModel;
use crate::config::ProposalConfig;
use crate::space::{Axis, ParameterVector, SearchBox, AXIS_COUNT};

/// Finite-difference step
const FD_STEP: f64 = 1e-5;

/// Local search stops once its step falls below this
const MIN_STEP: f64 = 1e-6;

/// Best batch found by [`BatchOptimizer::optimize`]
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizedBatch {
    /// Proposed points, all inside the search box
    pub points: Vec<ParameterVector>,
    /// Acquisition value of the batch
    pub score: f64,
    /// Local searches that ran
    pub restarts: usize,
    /// Index of the restart that produced the batch
    pub winning_restart: usize,
}

/// Maximizes an acquisition function over q-point batches in a box
pub struct BatchOptimizer<'a, A: Acquisition> {
    model: &'a PreferenceModel,
    acquisition: &'a A,
    search_box: SearchBox,
    config: &'a ProposalConfig,
}

impl<'a, A: Acquisition> BatchOptimizer<'a, A> {
    /// Create an optimizer
    pub fn new(
        model: &'a PreferenceModel,
        acquisition: &'a A,
        search_box: SearchBox,
        config: &'a ProposalConfig,
    ) -> Self {
        Self {
            model,
            acquisition,
            search_box,
            config,
        }
    }

    /// Find a high-scoring batch of `q` points
    ///
    /// The search is bounded by iteration counts only. Returns `None` if
    /// the deadline passes before every restart finishes, or if no finite
    /// score is found; a partial search is never returned.
    pub fn optimize(&self, q: usize, seed: u64, deadline: Instant) -> Option<OptimizedBatch> {
        if q == 0 {
            return None;
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut raw: Vec<(usize, Vec<ParameterVector>, f64)> =
            Vec::with_capacity(self.config.raw_samples);
        for i in 0..self.config.raw_samples {
            if Instant::now() >= deadline {
                tracing::debug!(sampled = i, "acquisition deadline hit during raw sampling");
                return None;
            }
            let batch: Vec<ParameterVector> =
                (0..q).map(|_| self.search_box.sample(&mut rng)).collect();
            let score = self.score(&batch);
            if score.is_finite() {
                raw.push((i, batch, score));
            }
        }
        if raw.is_empty() {
            return None;
        }

        raw.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)));
        raw.truncate(self.config.num_restarts);
        let starts: Vec<(usize, Vec<ParameterVector>, f64)> = raw
            .into_iter()
            .enumerate()
            .map(|(restart, (_, batch, score))| (restart, batch, score))
            .collect();
        let restarts = starts.len();

        #[cfg(feature = "parallel")]
        let results: Option<Vec<(usize, Vec<ParameterVector>, f64)>> = starts
            .into_par_iter()
            .map(|(restart, batch, score)| {
                let (batch, score) = self.local_search(batch, score, deadline)?;
                Some((restart, batch, score))
            })
            .collect();

        #[cfg(not(feature = "parallel"))]
        let results: Option<Vec<(usize, Vec<ParameterVector>, f64)>> = starts
            .into_iter()
            .map(|(restart, batch, score)| {
                let (batch, score) = self.local_search(batch, score, deadline)?;
                Some((restart, batch, score))
            })
            .collect();

        let Some(results) = results else {
            tracing::debug!(restarts, "acquisition deadline hit during local search");
            return None;
        };

        let mut best: Option<(usize, Vec<ParameterVector>, f64)> = None;
        for result in results {
            let better = best.as_ref().map_or(true, |b| result.2 > b.2);
            if better {
                best = Some(result);
            }
        }

        best.map(|(winning_restart, points, score)| OptimizedBatch {
            points,
            score,
            restarts,
            winning_restart,
        })
    }

    fn score(&self, batch: &[ParameterVector]) -> f64 {
        let s = self.acquisition.score(self.model, batch);
        if s.is_nan() {
            f64::NEG_INFINITY
        } else {
            s
        }
    }

    /// Projected ascent along the normalized finite-difference gradient
    ///
    /// `None` if the deadline passes before the iterations run out.
    fn local_search(
        &self,
        start: Vec<ParameterVector>,
        start_score: f64,
        deadline: Instant,
    ) -> Option<(Vec<ParameterVector>, f64)> {
        let mut x = start;
        let mut fx = start_score;
        let mut step = 0.25 * self.search_box.max_range();

        for _ in 0..self.config.local_iterations {
            if step < MIN_STEP {
                break;
            }
            if Instant::now() >= deadline {
                return None;
            }

            let gradient = self.gradient(&x, fx);
            let norm = gradient.iter().map(|g| g * g).sum::<f64>().sqrt();
            if !(norm > 1e-12) {
                break;
            }

            let trial: Vec<ParameterVector> = x
                .iter()
                .enumerate()
                .map(|(p, point)| {
                    let mut moved = *point;
                    for axis in Axis::ALL {
                        moved[axis] += step * gradient[p * AXIS_COUNT + axis.index()] / norm;
                    }
                    self.search_box.clamp(&moved)
                })
                .collect();

            let f_trial = self.score(&trial);
            if f_trial > fx {
                x = trial;
                fx = f_trial;
                step *= 1.5;
            } else {
                step *= 0.5;
            }
        }

        Some((x, fx))
    }

    /// One-sided differences that stay inside the box
    fn gradient(&self, x: &[ParameterVector], fx: f64) -> Vec<f64> {
        let mut gradient = vec![0.0; x.len() * AXIS_COUNT];
        let mut probe = x.to_vec();

        for p in 0..x.len() {
            for axis in Axis::ALL {
                let bounds = self.search_box.get(axis);
                if bounds.range() <= 0.0 {
                    continue;
                }
                let value = x[p][axis];
                let h = if value + FD_STEP <= bounds.max {
                    FD_STEP
                } else {
                    -FD_STEP
                };
                probe[p][axis] = value + h;
                let f = self.score(&probe);
                probe[p][axis] = value;
                if f.is_finite() {
                    gradient[p * AXIS_COUNT + axis.index()] = (f - fx) / h;
                }
            }
        }

        gradient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::model::acquisition::Eubo;
    use crate::model::preference::{Comparison, FitOutcome};
    use crate::space::{Bounds, NOMINAL_RANGE};
    use std::time::Duration;

    fn fitted() -> PreferenceModel {
        let pts: Vec<_> = [-0.8, -0.2, 0.4, 0.9]
            .iter()
            .map(|&v| ParameterVector::neutral().with(Axis::Exposure, v))
            .collect();
        let cmp = vec![
            Comparison::new(2, 0),
            Comparison::new(2, 1),
            Comparison::new(2, 3),
        ];
        match PreferenceModel::fit(&pts, &cmp, &ModelConfig::default()) {
            FitOutcome::Fitted(m) => m,
            other => panic!("unexpected outcome {:?}", other.label()),
        }
    }

    fn small_config() -> ProposalConfig {
        ProposalConfig {
            num_restarts: 3,
            raw_samples: 24,
            local_iterations: 20,
            mc_samples: 32,
            ..ProposalConfig::default()
        }
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[test]
    fn test_batch_stays_in_box() {
        let model = fitted();
        let config = small_config();
        let acq = Eubo::new(2, config.mc_samples, 1);
        let center = ParameterVector::neutral().with(Axis::Exposure, 0.4);
        let sbox = SearchBox::around(&center, &[0.35, 0.05, 0.05, 0.05, 0.05, 0.05], NOMINAL_RANGE);

        let batch = BatchOptimizer::new(&model, &acq, sbox, &config)
            .optimize(2, 42, far_deadline())
            .expect("batch");
        assert_eq!(batch.points.len(), 2);
        assert_eq!(batch.restarts, 3);
        for p in &batch.points {
            assert!(sbox.contains(p));
        }
        assert!(batch.score.is_finite());
    }

    #[test]
    fn test_optimize_is_deterministic() {
        let model = fitted();
        let config = small_config();
        let acq = Eubo::new(4, config.mc_samples, 3);
        let sbox = SearchBox::uniform(Bounds::symmetric(0.5));

        let a = BatchOptimizer::new(&model, &acq, sbox, &config).optimize(4, 9, far_deadline());
        let b = BatchOptimizer::new(&model, &acq, sbox, &config).optimize(4, 9, far_deadline());
        assert_eq!(a, b);
        assert_eq!(a.map(|b| b.points.len()), Some(4));
    }

    #[test]
    fn test_refinement_does_not_lose_score() {
        let model = fitted();
        let config = small_config();
        let acq = Eubo::new(2, 0, 0);
        let sbox = SearchBox::uniform(NOMINAL_RANGE);

        let no_refine = ProposalConfig {
            local_iterations: 0,
            ..config.clone()
        };
        let raw = BatchOptimizer::new(&model, &acq, sbox, &no_refine)
            .optimize(2, 5, far_deadline())
            .expect("raw");
        let refined = BatchOptimizer::new(&model, &acq, sbox, &config)
            .optimize(2, 5, far_deadline())
            .expect("refined");
        assert!(refined.score >= raw.score);
    }

    /// Eubo that takes a fixed time per evaluation
    struct SlowEubo {
        inner: Eubo,
        delay: Duration,
    }

    impl Acquisition for SlowEubo {
        fn score(&self, model: &PreferenceModel, batch: &[ParameterVector]) -> f64 {
            std::thread::sleep(self.delay);
            self.inner.score(model, batch)
        }
    }

    #[test]
    fn test_deadline_during_local_search_returns_none() {
        let model = fitted();
        let config = ProposalConfig {
            num_restarts: 2,
            raw_samples: 8,
            local_iterations: 20,
            ..ProposalConfig::default()
        };
        let acq = SlowEubo {
            inner: Eubo::new(2, 0, 0),
            delay: Duration::from_millis(1),
        };
        let sbox = SearchBox::uniform(NOMINAL_RANGE);

        // Raw sampling needs ~8 ms, one gradient alone needs ~12 ms
        let short = Instant::now() + Duration::from_millis(15);
        let cut = BatchOptimizer::new(&model, &acq, sbox, &config).optimize(2, 5, short);
        assert!(cut.is_none());

        let full = BatchOptimizer::new(&model, &acq, sbox, &config).optimize(2, 5, far_deadline());
        let fast = Eubo::new(2, 0, 0);
        let reference = BatchOptimizer::new(&model, &fast, sbox, &config).optimize(2, 5, far_deadline());
        assert!(full.is_some());
        assert_eq!(full, reference);
    }

    #[test]
    fn test_expired_deadline_returns_none() {
        let model = fitted();
        let config = small_config();
        let acq = Eubo::new(2, 0, 0);
        let past = Instant::now();
        std::thread::sleep(Duration::from_millis(2));
        let out = BatchOptimizer::new(&model, &acq, SearchBox::default(), &config).optimize(2, 1, past);
        assert!(out.is_none());
    }
}
