//! Per-axis bounds and the exploration box
//!
//! Proposals are confined to a [`SearchBox`]: a per-axis interval centred
//! on a reference vector, clipped to the legal range.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::axis::{Axis, AXIS_COUNT};
use super::vector::ParameterVector;

/// Nominal legal range of every axis
pub const NOMINAL_RANGE: Bounds = Bounds { min: -1.0, max: 1.0 };

/// Range tolerated while absorbing reprint overshoot
pub const OVERSHOOT_RANGE: Bounds = Bounds { min: -2.0, max: 2.0 };

/// Bounds for a single axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Lower bound (inclusive)
    pub min: f64,
    /// Upper bound (inclusive)
    pub max: f64,
}

impl Bounds {
    /// Create new bounds
    ///
    /// # Panics
    /// Panics if min > max
    pub fn new(min: f64, max: f64) -> Self {
        assert!(
            min <= max,
            "Invalid bounds: min ({}) must be <= max ({})",
            min,
            max
        );
        Self { min, max }
    }

    /// Create symmetric bounds centered at 0
    pub fn symmetric(half_width: f64) -> Self {
        Self::new(-half_width, half_width)
    }

    /// `[center - half_width, center + half_width]` clipped to `legal`
    pub fn around(center: f64, half_width: f64, legal: Bounds) -> Self {
        let lo = legal.clamp(center - half_width);
        let hi = legal.clamp(center + half_width);
        Self { min: lo, max: hi }
    }

    /// Get the range (max - min)
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Check if a value is within bounds
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamp a value to be within bounds
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

impl Default for Bounds {
    fn default() -> Self {
        NOMINAL_RANGE
    }
}

/// Axis-aligned exploration box over the whole parameter space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchBox {
    /// Bounds for each axis in canonical order
    pub bounds: [Bounds; AXIS_COUNT],
}

impl SearchBox {
    /// Uniform bounds on every axis
    pub fn uniform(bound: Bounds) -> Self {
        Self {
            bounds: [bound; AXIS_COUNT],
        }
    }

    /// Box of per-axis half-widths around `center`, clipped to `legal`
    pub fn around(center: &ParameterVector, half_widths: &[f64; AXIS_COUNT], legal: Bounds) -> Self {
        let mut bounds = [legal; AXIS_COUNT];
        for axis in Axis::ALL {
            let i = axis.index();
            bounds[i] = Bounds::around(center[axis], half_widths[i], legal);
        }
        Self { bounds }
    }

    /// Bounds for one axis
    pub fn get(&self, axis: Axis) -> Bounds {
        self.bounds[axis.index()]
    }

    /// Clamp a vector into the box
    pub fn clamp(&self, v: &ParameterVector) -> ParameterVector {
        let mut out = *v;
        for axis in Axis::ALL {
            out[axis] = self.get(axis).clamp(v[axis]);
        }
        out
    }

    /// Check that a vector lies inside the box
    pub fn contains(&self, v: &ParameterVector) -> bool {
        Axis::ALL.iter().all(|&axis| self.get(axis).contains(v[axis]))
    }

    /// Uniform sample inside the box
    pub fn sample<R: Rng>(&self, rng: &mut R) -> ParameterVector {
        let mut out = ParameterVector::neutral();
        for axis in Axis::ALL {
            let b = self.get(axis);
            out[axis] = if b.range() > 0.0 {
                rng.gen_range(b.min..=b.max)
            } else {
                b.min
            };
        }
        out
    }

    /// Widest axis range, used to scale finite-difference steps
    pub fn max_range(&self) -> f64 {
        self.bounds.iter().map(Bounds::range).fold(0.0, f64::max)
    }
}

impl Default for SearchBox {
    fn default() -> Self {
        Self::uniform(NOMINAL_RANGE)
    }
}
