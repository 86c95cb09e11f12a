//! Judging rubrics
//!
//! A rubric is the quality aspect the user had in mind when a comparison
//! was undecidable or when every candidate looked wrong.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::space::Axis;

/// Quality aspect flagged by the user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rubric {
    /// No specific aspect
    Overall,
    /// Skin tones
    Skin,
    /// Neutral greys
    NeutralGray,
    /// Color intensity
    Saturation,
    /// Shadow detail
    Shadows,
    /// Highlight detail
    Highlights,
}

impl Rubric {
    /// All rubrics
    pub const ALL: [Rubric; 6] = [
        Rubric::Overall,
        Rubric::Skin,
        Rubric::NeutralGray,
        Rubric::Saturation,
        Rubric::Shadows,
        Rubric::Highlights,
    ];

    /// Axes explored first when this rubric is flagged
    pub fn priority_axes(self) -> &'static [Axis] {
        match self {
            Rubric::Overall => &[],
            Rubric::Skin => &[Axis::Temperature, Axis::Tint, Axis::Saturation],
            Rubric::NeutralGray => &[Axis::Temperature, Axis::Tint],
            Rubric::Saturation => &[Axis::Saturation, Axis::Temperature],
            Rubric::Shadows => &[Axis::Exposure, Axis::Gamma, Axis::Contrast],
            Rubric::Highlights => &[Axis::Exposure, Axis::Contrast],
        }
    }

    /// Stable name
    pub fn name(self) -> &'static str {
        match self {
            Rubric::Overall => "overall",
            Rubric::Skin => "skin",
            Rubric::NeutralGray => "neutral_gray",
            Rubric::Saturation => "saturation",
            Rubric::Shadows => "shadows",
            Rubric::Highlights => "highlights",
        }
    }
}

impl fmt::Display for Rubric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Rubric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.name() == s)
            .ok_or_else(|| format!("unknown rubric: {}", s))
    }
}
