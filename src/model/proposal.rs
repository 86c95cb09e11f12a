//! Next-batch proposal
//!
//! Fits the preference model, picks the center of the next search box,
//! and maximizes EUBO inside it. Every failure on the way degrades to
//! [`fallback_batch`] around the caller-supplied anchor, so a proposal is
//! always produced.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::acquisition::Eubo;
use super::fallback::fallback_batch;
use super::optimizer::BatchOptimizer;
use super::preference::{Comparison, FitOutcome, PreferenceModel};
use crate::config::{ModelConfig, ProposalConfig};
use crate::schedule::AxisSchedule;
use crate::space::{ParameterVector, SearchBox, NOMINAL_RANGE};

/// Where the center of a search box came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CenterSource {
    /// Observed candidate with the highest posterior mean
    BestObserved { global_index: usize },
    /// Winner of the most recent `Chosen` judgment
    LastChosen { global_index: usize },
    /// First candidate of the most recent round
    LatestRound { global_index: usize },
}

impl CenterSource {
    /// Global index of the candidate used as center
    pub fn global_index(&self) -> usize {
        match *self {
            CenterSource::BestObserved { global_index }
            | CenterSource::LastChosen { global_index }
            | CenterSource::LatestRound { global_index } => global_index,
        }
    }
}

/// Center vector and its provenance
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Center {
    /// Parameter vector at the center
    pub vector: ParameterVector,
    /// How it was selected
    pub source: CenterSource,
}

/// Why the deterministic fallback was used
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Too few candidates or comparisons to fit
    InsufficientData,
    /// The preference model could not be fit
    FitFailed { error: String },
    /// The acquisition step timed out or produced no finite score
    AcquisitionFailed,
}

/// How a batch was produced
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalMethod {
    /// EUBO maximization over the search box
    Acquisition {
        score: f64,
        lengthscale: f64,
        restarts: usize,
    },
    /// Axis perturbation around the center
    Fallback { reason: FallbackReason },
}

/// Inputs to [`propose`]
#[derive(Clone, Debug)]
pub struct ProposalRequest<'a> {
    /// Every registered candidate vector, by global index
    pub points: &'a [ParameterVector],
    /// All comparisons so far
    pub comparisons: &'a [Comparison],
    /// Center used when the model cannot pick one
    pub anchor: Center,
    /// Schedule of the round being created
    pub schedule: &'a AxisSchedule,
    /// Reprint widening factor (1.0 for none)
    pub delta_scale: f64,
    /// Number of points to propose
    pub q: usize,
    /// Seed for raw sampling and Monte Carlo draws
    pub seed: u64,
}

/// A proposed batch
#[derive(Clone, Debug, PartialEq)]
pub struct Proposal {
    /// New candidate vectors
    pub vectors: Vec<ParameterVector>,
    /// Center of the search box
    pub center: Center,
    /// How the vectors were produced
    pub method: ProposalMethod,
}

impl Proposal {
    /// Whether the deterministic fallback was used
    pub fn is_fallback(&self) -> bool {
        matches!(self.method, ProposalMethod::Fallback { .. })
    }
}

/// Propose the next batch
///
/// Never fails. Numerical problems are logged and routed to the fallback.
pub fn propose(
    request: &ProposalRequest<'_>,
    model_config: &ModelConfig,
    proposal_config: &ProposalConfig,
) -> Proposal {
    let deadline = Instant::now() + Duration::from_millis(proposal_config.max_duration_ms);

    let model = match PreferenceModel::fit(request.points, request.comparisons, model_config) {
        FitOutcome::Fitted(model) => model,
        FitOutcome::InsufficientData => {
            tracing::debug!(
                points = request.points.len(),
                comparisons = request.comparisons.len(),
                "insufficient data for preference model"
            );
            return fallback(request, request.anchor, FallbackReason::InsufficientData);
        }
        FitOutcome::FitFailed(e) => {
            tracing::warn!(error = %e, "preference model fit failed; using fallback proposal");
            return fallback(
                request,
                request.anchor,
                FallbackReason::FitFailed {
                    error: e.to_string(),
                },
            );
        }
    };

    let best = model.best_observed();
    let center = Center {
        vector: request.points[best],
        source: CenterSource::BestObserved { global_index: best },
    };
    let search_box = SearchBox::around(
        &center.vector,
        &request.schedule.half_widths(request.delta_scale),
        NOMINAL_RANGE,
    );

    let acquisition = Eubo::new(request.q, proposal_config.mc_samples, request.seed);
    let optimizer = BatchOptimizer::new(&model, &acquisition, search_box, proposal_config);

    match optimizer.optimize(request.q, request.seed, deadline) {
        Some(batch) => {
            tracing::debug!(
                center = best,
                score = batch.score,
                restarts = batch.restarts,
                winning_restart = batch.winning_restart,
                lengthscale = model.kernel().lengthscale,
                seed = request.seed,
                "acquisition proposal"
            );
            Proposal {
                vectors: batch.points,
                center,
                method: ProposalMethod::Acquisition {
                    score: batch.score,
                    lengthscale: model.kernel().lengthscale,
                    restarts: batch.restarts,
                },
            }
        }
        None => {
            tracing::warn!(
                max_duration_ms = proposal_config.max_duration_ms,
                "acquisition optimization produced no batch; using fallback proposal"
            );
            fallback(request, center, FallbackReason::AcquisitionFailed)
        }
    }
}

fn fallback(request: &ProposalRequest<'_>, center: Center, reason: FallbackReason) -> Proposal {
    tracing::debug!(
        center = center.source.global_index(),
        axis = %request.schedule.primary_axis(),
        q = request.q,
        "fallback proposal"
    );
    Proposal {
        vectors: fallback_batch(&center.vector, request.schedule, request.delta_scale, request.q),
        center,
        method: ProposalMethod::Fallback { reason },
    }
}
