//! Parameter space
//!
//! Defines the fixed, ordered list of tunable axes and the dense vector
//! type every other component consumes and produces.

pub mod axis;
pub mod bounds;
pub mod vector;

pub use axis::{Axis, AXIS_COUNT};
pub use bounds::{Bounds, SearchBox, NOMINAL_RANGE, OVERSHOOT_RANGE};
pub use vector::ParameterVector;

/// Prelude for convenient imports
pub mod prelude {
    pub use super::axis::*;
    pub use super::bounds::*;
    pub use super::vector::*;
}
