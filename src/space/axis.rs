//! The tunable axes
//!
//! Axis order is fixed and shared by every component: the model's feature
//! columns, the stored vectors and the schedule tables all use
//! [`Axis::ALL`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SpaceError;

/// Number of tunable axes
pub const AXIS_COUNT: usize = 6;

/// A global tone/color correction axis
///
/// Values along every axis are normalized so that `0.0` is neutral and
/// `[-1, +1]` is the nominal range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Exposure in (normalized) stops
    #[serde(rename = "exposure_stops")]
    Exposure,
    /// Contrast around mid-grey
    #[serde(rename = "contrast")]
    Contrast,
    /// Chroma gain
    #[serde(rename = "saturation")]
    Saturation,
    /// Warm/cool white balance
    #[serde(rename = "temp")]
    Temperature,
    /// Green/magenta white balance
    #[serde(rename = "tint")]
    Tint,
    /// Tone curve exponent (shadow lift or crush)
    #[serde(rename = "gamma")]
    Gamma,
}

impl Axis {
    /// All axes in canonical order
    pub const ALL: [Axis; AXIS_COUNT] = [
        Axis::Exposure,
        Axis::Contrast,
        Axis::Saturation,
        Axis::Temperature,
        Axis::Tint,
        Axis::Gamma,
    ];

    /// Position of this axis in every dense vector
    pub fn index(self) -> usize {
        match self {
            Axis::Exposure => 0,
            Axis::Contrast => 1,
            Axis::Saturation => 2,
            Axis::Temperature => 3,
            Axis::Tint => 4,
            Axis::Gamma => 5,
        }
    }

    /// Axis at a dense-vector position
    pub fn from_index(index: usize) -> Option<Axis> {
        Self::ALL.get(index).copied()
    }

    /// Canonical name, as used in stored parameter maps
    pub fn name(self) -> &'static str {
        match self {
            Axis::Exposure => "exposure_stops",
            Axis::Contrast => "contrast",
            Axis::Saturation => "saturation",
            Axis::Temperature => "temp",
            Axis::Tint => "tint",
            Axis::Gamma => "gamma",
        }
    }

    /// Canonical names in canonical order
    pub fn names() -> [&'static str; AXIS_COUNT] {
        Self::ALL.map(Axis::name)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Axis {
    type Err = SpaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|axis| axis.name() == s)
            .ok_or_else(|| SpaceError::UnknownAxis(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_canonical_order() {
        for (i, axis) in Axis::ALL.iter().enumerate() {
            assert_eq!(axis.index(), i);
            assert_eq!(Axis::from_index(i), Some(*axis));
        }
        assert_eq!(Axis::from_index(AXIS_COUNT), None);
    }

    #[test]
    fn test_names_round_trip() {
        for axis in Axis::ALL {
            assert_eq!(axis.name().parse::<Axis>().unwrap(), axis);
        }
        assert_eq!(
            Axis::names(),
            ["exposure_stops", "contrast", "saturation", "temp", "tint", "gamma"]
        );
    }

    #[test]
    fn test_unknown_name() {
        let err = "brightness".parse::<Axis>().unwrap_err();
        assert_eq!(err, SpaceError::UnknownAxis("brightness".to_string()));
    }

    #[test]
    fn test_serde_uses_canonical_name() {
        let json = serde_json::to_string(&Axis::Temperature).unwrap();
        assert_eq!(json, "\"temp\"");
    }
}
