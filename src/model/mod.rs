//! Preference model and proposal
//!
//! This module turns accumulated pairwise comparisons into a next batch of
//! candidates:
//!
//! - [`preference`]: Laplace-approximated GP over a latent utility with a
//!   Bradley-Terry likelihood
//! - [`acquisition`]: expected utility of the best option (EUBO)
//! - [`optimizer`]: multi-restart bounded batch search
//! - [`fallback`]: deterministic axis perturbation
//! - [`proposal`]: the orchestration that always yields a batch

pub mod acquisition;
pub mod fallback;
pub mod kernel;
pub mod optimizer;
pub mod preference;
pub mod proposal;

pub use acquisition::{eubo_pair, Acquisition, Eubo};
pub use fallback::fallback_batch;
pub use kernel::RbfKernel;
pub use optimizer::{BatchOptimizer, OptimizedBatch};
pub use preference::{Comparison, FitOutcome, PreferenceModel};
pub use proposal::{
    propose, Center, CenterSource, FallbackReason, Proposal, ProposalMethod, ProposalRequest,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::acquisition::*;
    pub use super::fallback::*;
    pub use super::kernel::*;
    pub use super::optimizer::*;
    pub use super::preference::*;
    pub use super::proposal::*;
}
