//! Dense parameter vectors
//!
//! [`ParameterVector`] is the single representation of a correction
//! setting. It serializes as a named map so stored sessions stay
//! readable, but is a fixed-size array everywhere else.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};

use super::axis::{Axis, AXIS_COUNT};
use super::bounds::Bounds;
use crate::error::SpaceError;

/// Correction parameters, one value per [`Axis`] in canonical order
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "NamedValues", into = "NamedValues")]
pub struct ParameterVector {
    values: [f64; AXIS_COUNT],
}

/// Serialized form: one named field per axis
#[derive(Serialize, Deserialize)]
struct NamedValues {
    exposure_stops: f64,
    contrast: f64,
    saturation: f64,
    temp: f64,
    tint: f64,
    gamma: f64,
}

impl From<NamedValues> for ParameterVector {
    fn from(n: NamedValues) -> Self {
        Self::new([n.exposure_stops, n.contrast, n.saturation, n.temp, n.tint, n.gamma])
    }
}

impl From<ParameterVector> for NamedValues {
    fn from(v: ParameterVector) -> Self {
        let [exposure_stops, contrast, saturation, temp, tint, gamma] = v.values;
        Self {
            exposure_stops,
            contrast,
            saturation,
            temp,
            tint,
            gamma,
        }
    }
}

impl ParameterVector {
    /// Create from values in canonical axis order
    pub fn new(values: [f64; AXIS_COUNT]) -> Self {
        Self { values }
    }

    /// The neutral setting (all axes zero)
    pub fn neutral() -> Self {
        Self::default()
    }

    /// Create from a slice in canonical order; `None` on length mismatch
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        let values: [f64; AXIS_COUNT] = values.try_into().ok()?;
        Some(Self::new(values))
    }

    /// Create from a name→value mapping
    ///
    /// Every axis must be present and no other names are accepted.
    pub fn from_named(named: &BTreeMap<String, f64>) -> Result<Self, SpaceError> {
        for key in named.keys() {
            key.parse::<Axis>()?;
        }
        let mut values = [0.0; AXIS_COUNT];
        for axis in Axis::ALL {
            values[axis.index()] = *named
                .get(axis.name())
                .ok_or_else(|| SpaceError::MissingAxis(axis.name().to_string()))?;
        }
        Ok(Self::new(values))
    }

    /// Convert to a name→value mapping
    pub fn to_named(&self) -> BTreeMap<String, f64> {
        Axis::ALL
            .iter()
            .map(|&axis| (axis.name().to_string(), self[axis]))
            .collect()
    }

    /// Values in canonical order
    pub fn values(&self) -> &[f64; AXIS_COUNT] {
        &self.values
    }

    /// Value along one axis
    pub fn get(&self, axis: Axis) -> f64 {
        self.values[axis.index()]
    }

    /// Copy with one axis replaced
    pub fn with(mut self, axis: Axis, value: f64) -> Self {
        self.values[axis.index()] = value;
        self
    }

    /// Copy with one axis offset by `step`
    pub fn shifted(mut self, axis: Axis, step: f64) -> Self {
        self.values[axis.index()] += step;
        self
    }

    /// Clamp every axis to the same bounds
    pub fn clamped(mut self, bounds: Bounds) -> Self {
        for v in &mut self.values {
            *v = bounds.clamp(*v);
        }
        self
    }

    /// Check that every axis lies within bounds
    pub fn within(&self, bounds: Bounds) -> bool {
        self.values.iter().all(|&v| bounds.contains(v))
    }

    /// Check that every value is finite
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

impl Index<Axis> for ParameterVector {
    type Output = f64;

    fn index(&self, axis: Axis) -> &f64 {
        &self.values[axis.index()]
    }
}

impl IndexMut<Axis> for ParameterVector {
    fn index_mut(&mut self, axis: Axis) -> &mut f64 {
        &mut self.values[axis.index()]
    }
}

impl From<[f64; AXIS_COUNT]> for ParameterVector {
    fn from(values: [f64; AXIS_COUNT]) -> Self {
        Self::new(values)
    }
}

impl fmt::Display for ParameterVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, axis) in Axis::ALL.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={:+.3}", axis, self[*axis])?;
        }
        write!(f, ")")
    }
}
