//! Axis scheduling
//!
//! The search does not explore all six axes with equal width all the time.
//! A phase table decides which axes are explored broadly at each phase;
//! the rest keep a narrow band so that interactions stay visible.
//!
//! Phases advance only when the user resolves a choice. Reprints stay in
//! the current phase with a wider box.

pub mod policy;
pub mod rubric;

pub use policy::{AxisSchedule, PhaseEntry, PhaseTable, SchedulePolicy, DEFAULT_MICRO_RATIO};
pub use rubric::Rubric;

/// Prelude for convenient imports
pub mod prelude {
    pub use super::policy::*;
    pub use super::rubric::*;
}
