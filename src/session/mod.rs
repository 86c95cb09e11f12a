//! Tuning sessions
//!
//! A session is an append-only log of rounds. Each round shows two or four
//! printed candidates; the user's judgment on the latest round decides the
//! comparisons that feed the preference model and the shape of the next
//! round.
//!
//! - [`state`]: the [`Session`] value and its queries
//! - [`record`]: rounds, candidates and judgments
//! - [`registry`]: global candidate indexing
//! - [`machine`]: the transition applied for each judgment

pub mod ids;
pub mod machine;
pub mod record;
pub mod registry;
pub mod state;

pub use ids::{CandidateId, RoundId, SessionId};
pub use machine::Transition;
pub use record::{
    BlockShift, Candidate, Judgment, NextAction, Provenance, ReprintTrigger, Round,
    RoundMetadata, RoundMode, RoundPurpose, SLOT_LABELS,
};
pub use registry::{CandidateRegistry, RegistryEntry};
pub use state::{Session, SESSION_VERSION};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::ids::*;
    pub use super::machine::Transition;
    pub use super::record::*;
    pub use super::registry::*;
    pub use super::state::*;
}
