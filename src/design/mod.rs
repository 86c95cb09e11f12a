//! Initial experimental design
//!
//! Round 1 of every session is a fixed two-level orthogonal array, so the
//! first judgment probes three near-independent visual directions without
//! needing a fitted model.

pub mod orthogonal;

pub use orthogonal::{initial_design, OaFactors, OaRun, L4};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::orthogonal::*;
}
