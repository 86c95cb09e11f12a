//! Deterministic proposals without a fitted model
//!
//! Used when there is not enough data to fit, when fitting fails, or when
//! the acquisition step runs out of time. The output depends only on its
//! arguments.

use crate::schedule::AxisSchedule;
use crate::space::{Axis, ParameterVector, OVERSHOOT_RANGE};

/// Perturb `center` along the schedule's leading active axes
///
/// Points come in `+/-` pairs. The first pair moves along
/// [`AxisSchedule::primary_axis`] by `delta * delta_scale`, the second
/// along the next active axis, and so on. When the active axes run out
/// the primary axis is reused with a halved step for each extra pair.
/// Results are clamped to the overshoot range.
pub fn fallback_batch(
    center: &ParameterVector,
    schedule: &AxisSchedule,
    delta_scale: f64,
    q: usize,
) -> Vec<ParameterVector> {
    let delta = schedule.scaled_delta(delta_scale);
    let primary = schedule.primary_axis();
    let axes: Vec<Axis> = std::iter::once(primary)
        .chain(schedule.active_axes.iter().copied().filter(|&a| a != primary))
        .collect();

    (0..q)
        .map(|k| {
            let pair = k / 2;
            let (axis, step) = if pair < axes.len() {
                (axes[pair], delta)
            } else {
                let extra = (pair - axes.len() + 1) as i32;
                (primary, delta * 0.5f64.powi(extra))
            };
            let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
            center.shifted(axis, sign * step).clamped(OVERSHOOT_RANGE)
        })
        .collect()
}
