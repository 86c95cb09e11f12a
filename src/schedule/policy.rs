//! Phase table and schedule policy
//!
//! `schedule(phase, rubric)` is a pure function of its inputs. Phases past
//! the end of the table reuse the last entry, which acts as an open-ended
//! fine-tuning phase.

use serde::{Deserialize, Serialize};

use super::rubric::Rubric;
use crate::error::ConfigError;
use crate::space::{Axis, AXIS_COUNT};

/// Half-width multiplier for inactive axes when a table entry omits it
pub const DEFAULT_MICRO_RATIO: f64 = 0.15;

/// Resolved schedule for one phase
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisSchedule {
    /// Phase index this schedule was resolved for (1-based)
    pub phase: usize,
    /// Axes explored at full width, highest priority first
    pub active_axes: Vec<Axis>,
    /// Exploration half-width for active axes
    pub delta: f64,
    /// Half-width multiplier for inactive axes
    pub micro_ratio: f64,
}

impl AxisSchedule {
    /// Whether an axis is explored at full width
    pub fn is_active(&self, axis: Axis) -> bool {
        self.active_axes.contains(&axis)
    }

    /// `delta` widened by a reprint factor
    pub fn scaled_delta(&self, delta_scale: f64) -> f64 {
        self.delta * delta_scale
    }

    /// Per-axis half-widths in canonical order
    ///
    /// Inactive axes keep `delta * micro_ratio` rather than being frozen.
    pub fn half_widths(&self, delta_scale: f64) -> [f64; AXIS_COUNT] {
        let delta = self.scaled_delta(delta_scale);
        let mut out = [delta * self.micro_ratio; AXIS_COUNT];
        for axis in &self.active_axes {
            out[axis.index()] = delta;
        }
        out
    }

    /// Axis used for one-dimensional perturbations
    ///
    /// Exposure when it is active, otherwise the highest-priority active
    /// axis. Falls back to exposure for an empty active set.
    pub fn primary_axis(&self) -> Axis {
        if self.is_active(Axis::Exposure) {
            Axis::Exposure
        } else {
            self.active_axes.first().copied().unwrap_or(Axis::Exposure)
        }
    }

    /// Move the rubric's priority axes to the front
    ///
    /// Only axes already active are moved; the active/inactive split is
    /// unchanged and no axis appears twice.
    pub fn prioritized(mut self, rubric: Rubric) -> Self {
        let mut ordered: Vec<Axis> = Vec::with_capacity(self.active_axes.len());
        for &axis in rubric.priority_axes() {
            if self.active_axes.contains(&axis) && !ordered.contains(&axis) {
                ordered.push(axis);
            }
        }
        for &axis in &self.active_axes {
            if !ordered.contains(&axis) {
                ordered.push(axis);
            }
        }
        self.active_axes = ordered;
        self
    }
}

/// Maps a phase index (and optional rubric) to an [`AxisSchedule`]
pub trait SchedulePolicy: Send + Sync {
    /// Resolve the schedule for a phase
    fn schedule(&self, phase: usize, rubric: Option<Rubric>) -> AxisSchedule;
}

/// One row of a [`PhaseTable`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseEntry {
    /// Axes explored at full width
    pub active_axes: Vec<Axis>,
    /// Exploration half-width
    pub delta: f64,
    /// Half-width multiplier for inactive axes
    #[serde(default = "default_micro_ratio")]
    pub micro_ratio: f64,
}

fn default_micro_ratio() -> f64 {
    DEFAULT_MICRO_RATIO
}

impl PhaseEntry {
    /// Create a table row
    pub fn new(active_axes: Vec<Axis>, delta: f64, micro_ratio: f64) -> Self {
        Self {
            active_axes,
            delta,
            micro_ratio,
        }
    }
}

/// Ordered phase table; phase `n` uses row `n - 1`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PhaseEntry>", into = "Vec<PhaseEntry>")]
pub struct PhaseTable {
    entries: Vec<PhaseEntry>,
}

impl PhaseTable {
    /// Create a validated table
    pub fn new(entries: Vec<PhaseEntry>) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::Invalid("phase table is empty".to_string()));
        }
        for (i, e) in entries.iter().enumerate() {
            if !(e.delta.is_finite() && e.delta > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "phase {}: delta must be positive, got {}",
                    i + 1,
                    e.delta
                )));
            }
            if !(0.0..=1.0).contains(&e.micro_ratio) {
                return Err(ConfigError::Invalid(format!(
                    "phase {}: micro_ratio must be in [0, 1], got {}",
                    i + 1,
                    e.micro_ratio
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Number of explicit phases
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a validated table
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Row for a phase, reusing the last row past the end
    pub fn entry(&self, phase: usize) -> &PhaseEntry {
        let idx = phase.saturating_sub(1).min(self.entries.len() - 1);
        &self.entries[idx]
    }
}

impl Default for PhaseTable {
    /// Broad first pass, then luminance, white balance, color volume, and
    /// finally all axes at a small width
    fn default() -> Self {
        use Axis::*;
        Self {
            entries: vec![
                PhaseEntry::new(vec![Exposure, Contrast, Gamma, Temperature, Tint], 0.60, 0.20),
                PhaseEntry::new(vec![Exposure, Contrast, Gamma], 0.35, 0.15),
                PhaseEntry::new(vec![Temperature, Tint], 0.30, 0.15),
                PhaseEntry::new(vec![Saturation, Gamma], 0.25, 0.15),
                PhaseEntry::new(
                    vec![Exposure, Contrast, Gamma, Temperature, Tint, Saturation],
                    0.15,
                    0.10,
                ),
            ],
        }
    }
}

impl TryFrom<Vec<PhaseEntry>> for PhaseTable {
    type Error = ConfigError;

    fn try_from(entries: Vec<PhaseEntry>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<PhaseTable> for Vec<PhaseEntry> {
    fn from(table: PhaseTable) -> Self {
        table.entries
    }
}

impl SchedulePolicy for PhaseTable {
    fn schedule(&self, phase: usize, rubric: Option<Rubric>) -> AxisSchedule {
        let entry = self.entry(phase);
        let base = AxisSchedule {
            phase: phase.max(1),
            active_axes: entry.active_axes.clone(),
            delta: entry.delta,
            micro_ratio: entry.micro_ratio,
        };
        match rubric {
            Some(r) => base.prioritized(r),
            None => base,
        }
    }
}
