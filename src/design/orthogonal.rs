//! L4(2^3) orthogonal array
//!
//! Three two-level factors over four runs. Every pair of columns is
//! balanced, so the sign of preference along each factor can be read off
//! a single forced choice.
//!
//! Factor mapping:
//!
//! ```text
//! f1 -> exposure_stops  = 0.80 * f1
//! f2 -> contrast        = 0.20 * f2,  gamma = -0.15 * f2
//! f3 -> temp            = 0.50 * f3
//! saturation, tint      = 0
//! ```
//!
//! The contrast/gamma pair moves in opposite directions so that the second
//! factor changes tonal separation without a large shift in mid-tones.

use serde::{Deserialize, Serialize};

use crate::space::{Axis, ParameterVector};

/// Exposure magnitude per unit of factor 1
pub const EXPOSURE_GAIN: f64 = 0.8;
/// Contrast per unit of factor 2
pub const CONTRAST_GAIN: f64 = 0.2;
/// Gamma counter-adjustment per unit of factor 2
pub const GAMMA_COUNTER_GAIN: f64 = -0.15;
/// Color temperature per unit of factor 3
pub const TEMPERATURE_GAIN: f64 = 0.5;

/// Signed levels of the three design factors
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OaFactors {
    /// Exposure factor level
    pub f1: f64,
    /// Contrast/gamma factor level
    pub f2: f64,
    /// Color temperature factor level
    pub f3: f64,
}

impl OaFactors {
    /// Create factor levels
    pub const fn new(f1: f64, f2: f64, f3: f64) -> Self {
        Self { f1, f2, f3 }
    }

    /// Map factor levels onto the parameter space
    pub fn to_vector(&self) -> ParameterVector {
        ParameterVector::neutral()
            .with(Axis::Exposure, EXPOSURE_GAIN * self.f1)
            .with(Axis::Contrast, CONTRAST_GAIN * self.f2)
            .with(Axis::Gamma, GAMMA_COUNTER_GAIN * self.f2)
            .with(Axis::Temperature, TEMPERATURE_GAIN * self.f3)
    }
}

/// One run (row) of the design
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OaRun {
    /// Display label
    pub slot: &'static str,
    /// Factor levels
    pub factors: OaFactors,
}

/// The L4 sign table
pub const L4: [OaRun; 4] = [
    OaRun {
        slot: "A",
        factors: OaFactors::new(-1.0, -1.0, -1.0),
    },
    OaRun {
        slot: "B",
        factors: OaFactors::new(-1.0, 1.0, 1.0),
    },
    OaRun {
        slot: "C",
        factors: OaFactors::new(1.0, -1.0, 1.0),
    },
    OaRun {
        slot: "D",
        factors: OaFactors::new(1.0, 1.0, -1.0),
    },
];

/// Slot labels and vectors of the initial round
pub fn initial_design() -> [(&'static str, ParameterVector); 4] {
    L4.map(|run| (run.slot, run.factors.to_vector()))
}
