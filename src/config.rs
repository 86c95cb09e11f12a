//! Engine configuration
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::schedule::PhaseTable;

/// Top-level configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuneConfig {
    /// Rounds after which no new round is created
    pub max_rounds: usize,
    /// Rejudge requests honored per session before downgrading to reprint
    pub max_rejudge: usize,
    /// Block shift of an orthogonal reprint, multiplied by `delta_scale`
    pub oa_reprint_step: f64,
    /// Phase table for axis scheduling
    pub schedule: PhaseTable,
    /// Preference model settings
    pub model: ModelConfig,
    /// Acquisition optimizer settings
    pub proposal: ProposalConfig,
}

impl Default for TuneConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            max_rejudge: 2,
            oa_reprint_step: 0.35,
            schedule: PhaseTable::default(),
            model: ModelConfig::default(),
            proposal: ProposalConfig::default(),
        }
    }
}

impl TuneConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
    }

    /// Set the round cap
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Set the rejudge budget
    pub fn with_max_rejudge(mut self, max_rejudge: usize) -> Self {
        self.max_rejudge = max_rejudge;
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rounds == 0 {
            return Err(ConfigError::Invalid("max_rounds must be >= 1".to_string()));
        }
        if !(self.oa_reprint_step.is_finite() && self.oa_reprint_step > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "oa_reprint_step must be positive, got {}",
                self.oa_reprint_step
            )));
        }
        self.model.validate()?;
        self.proposal.validate()
    }
}

/// Pairwise preference model settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Candidate RBF lengthscales; the one with the best Laplace evidence wins
    pub lengthscales: Vec<f64>,
    /// Prior variance of the latent utility
    pub signal_variance: f64,
    /// Diagonal jitter added to the kernel matrix
    pub jitter: f64,
    /// Newton iterations for the latent MAP
    pub max_iterations: usize,
    /// Convergence tolerance on the latent update
    pub tolerance: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            lengthscales: vec![0.25, 0.5, 1.0, 2.0],
            signal_variance: 1.0,
            jitter: 1e-6,
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

impl ModelConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.lengthscales.is_empty()
            || self.lengthscales.iter().any(|l| !(l.is_finite() && *l > 0.0))
        {
            return Err(ConfigError::Invalid(
                "model.lengthscales must be a non-empty list of positive values".to_string(),
            ));
        }
        if !(self.signal_variance.is_finite() && self.signal_variance > 0.0) {
            return Err(ConfigError::Invalid(
                "model.signal_variance must be positive".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "model.max_iterations must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Acquisition optimizer settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposalConfig {
    /// Local searches started from the best raw samples
    pub num_restarts: usize,
    /// Random q-batches scored before picking restart points
    pub raw_samples: usize,
    /// Iteration cap of each local search
    pub local_iterations: usize,
    /// Monte Carlo draws for acquisition with more than two points
    pub mc_samples: usize,
    /// Base seed; the per-round seed also mixes in session state
    pub seed: u64,
    /// Wall-clock budget for the whole acquisition step
    pub max_duration_ms: u64,
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            num_restarts: 10,
            raw_samples: 128,
            local_iterations: 60,
            mc_samples: 256,
            seed: 0x5eed,
            max_duration_ms: 2000,
        }
    }
}

impl ProposalConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.num_restarts == 0 {
            return Err(ConfigError::Invalid(
                "proposal.num_restarts must be >= 1".to_string(),
            ));
        }
        if self.raw_samples < self.num_restarts {
            return Err(ConfigError::Invalid(
                "proposal.raw_samples must be >= num_restarts".to_string(),
            ));
        }
        if self.mc_samples == 0 {
            return Err(ConfigError::Invalid(
                "proposal.mc_samples must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
