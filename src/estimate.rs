//! Best-parameter estimation
//!
//! The reported best is always a candidate the user has actually seen
//! printed. With enough comparisons it is the observed candidate with the
//! highest posterior mean utility; otherwise the session's fallback center.

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::model::{CenterSource, FitOutcome, PreferenceModel};
use crate::session::Session;
use crate::space::ParameterVector;

/// Best observed parameters of a session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BestEstimate {
    /// Parameter vector of the selected candidate
    pub vector: ParameterVector,
    /// How the candidate was selected
    pub source: CenterSource,
    /// Set when the model fit failed and the fallback was used
    #[serde(default)]
    pub warning: Option<String>,
}

/// Estimate the best parameters seen so far
///
/// Returns `None` only for a session with no rounds.
pub fn estimate_best(session: &Session, config: &ModelConfig) -> Option<BestEstimate> {
    let fallback = session.fallback_center()?;
    let points = session.registry().vectors();

    match PreferenceModel::fit(&points, session.comparisons(), config) {
        FitOutcome::Fitted(model) => {
            let best = model.best_observed();
            tracing::debug!(
                session = %session.id(),
                global_index = best,
                utility = model.observed_means()[best],
                "best estimate from preference model"
            );
            Some(BestEstimate {
                vector: points[best],
                source: CenterSource::BestObserved { global_index: best },
                warning: None,
            })
        }
        FitOutcome::InsufficientData => Some(BestEstimate {
            vector: fallback.vector,
            source: fallback.source,
            warning: None,
        }),
        FitOutcome::FitFailed(e) => {
            tracing::warn!(
                session = %session.id(),
                error = %e,
                "preference model fit failed; best estimate uses fallback center"
            );
            Some(BestEstimate {
                vector: fallback.vector,
                source: fallback.source,
                warning: Some(format!("preference model fit failed: {}", e)),
            })
        }
    }
}
