//! # printtune
//!
//! Preference-guided search for print tone and color correction.
//!
//! A user prints small sets of corrected previews, compares them against
//! the reference image on screen, and says which one is closest. Each
//! judgment becomes a set of pairwise comparisons; a Gaussian-process
//! preference model fit to those comparisons proposes the next pair of
//! candidates to print.
//!
//! ## Core Concepts
//!
//! - **Parameter space**: six fixed correction axes in a dense [`space::ParameterVector`]
//! - **Orthogonal first round**: round 1 is an L4 design that needs no model
//! - **Phase schedule**: which axes are explored broadly, advanced only by resolved choices
//! - **Graceful degradation**: model failures fall back to deterministic axis perturbation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use printtune::prelude::*;
//!
//! let tuner = Tuner::builder().max_rounds(10).build()?;
//! let session = tuner.new_session("portrait.tif");
//!
//! let outcome = tuner.submit_judgment(&session, 1, &JudgmentRequest::chosen("B"))?;
//! let round = outcome.session.current_round();
//!
//! let store = FileStore::new("sessions");
//! store.save(&outcome.session)?;
//! tuner.finalize(&outcome.session, &store)?;
//! ```

pub mod config;
pub mod design;
pub mod error;
pub mod estimate;
pub mod model;
pub mod preview;
pub mod schedule;
pub mod session;
pub mod space;
pub mod store;
pub mod usecase;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::design::prelude::*;
    pub use crate::error::*;
    pub use crate::estimate::*;
    pub use crate::model::prelude::*;
    pub use crate::preview::*;
    pub use crate::schedule::prelude::*;
    pub use crate::session::prelude::*;
    pub use crate::space::prelude::*;
    pub use crate::store::prelude::*;
    pub use crate::usecase::*;
}
