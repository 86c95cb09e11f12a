//! Round state machine
//!
//! ```text
//! AwaitingJudgment(n) --judgment--> AwaitingJudgment(n + 1)
//!                                 \-> RoundCapped
//! ```
//!
//! | judgment                 | comparisons | next phase | next round            |
//! |--------------------------|-------------|------------|-----------------------|
//! | chosen                   | winner vs rest | +1      | pairwise explore, q=2 |
//! | undecidable + rejudge    | winner vs rest | +1      | pairwise explore, q=2 |
//! | undecidable + reprint    | none        | same       | reprint, same mode    |
//! | both_bad                 | none        | same       | reprint, same mode    |
//!
//! A rejudge past the budget is recorded as a reprint. Once the session
//! holds `max_rounds` rounds, a judgment is attached to the final round and
//! nothing else changes.

use chrono::Utc;

use super::ids::RoundId;
use super::record::{
    BlockShift, Candidate, Judgment, NextAction, Provenance, ReprintTrigger, Round,
    RoundMetadata, RoundMode, RoundPurpose, SLOT_LABELS,
};
use super::state::Session;
use crate::config::TuneConfig;
use crate::design::initial_design;
use crate::model::{propose, Center, CenterSource, Comparison, ProposalRequest};
use crate::schedule::{AxisSchedule, SchedulePolicy};
use crate::space::{ParameterVector, OVERSHOOT_RANGE};

/// Candidates in a model-driven round
const PAIRWISE_BATCH: usize = 2;

/// Result of applying one judgment
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// The judgment as recorded, after any budget downgrade
    pub recorded: Judgment,
    /// Comparisons appended by this judgment
    pub new_comparisons: usize,
    /// Index of the appended round; `None` at the round cap
    pub next_round: Option<usize>,
}

impl Transition {
    /// Whether a rejudge request was recorded as a reprint
    pub fn rejudge_downgraded(&self) -> bool {
        self.recorded.is_rejudge_exhausted()
    }
}

impl Session {
    /// Create round 1 from the orthogonal design
    ///
    /// Does nothing if the session already has rounds. Returns round 1.
    pub fn create_initial_round(&mut self, policy: &dyn SchedulePolicy) -> &Round {
        if self.round_count() > 0 {
            return &self.rounds()[0];
        }

        let schedule = policy.schedule(1, None);
        let candidates = initial_design()
            .iter()
            .map(|(slot, vector)| Candidate::new(*slot, *vector))
            .collect();
        let round = Round {
            round_id: RoundId::generate(),
            round_index: 1,
            created_at: Utc::now(),
            candidates,
            mode: RoundMode::Orthogonal,
            purpose: RoundPurpose::InitialDesign,
            rubric: None,
            delta_scale: 1.0,
            judgment: None,
            metadata: RoundMetadata::new(1, schedule, Provenance::InitialDesign),
        };
        tracing::info!(
            session = %self.id(),
            round_index = 1,
            mode = ?round.mode,
            purpose = ?round.purpose,
            phase = 1,
            "round appended"
        );
        self.push_round(round)
    }
}

/// Record a validated judgment and append the next round unless capped
///
/// The caller has already checked the round index, the slot names and
/// the field combination.
pub(crate) fn apply_judgment(
    session: &mut Session,
    round_index: usize,
    judgment: Judgment,
    config: &TuneConfig,
    policy: &dyn SchedulePolicy,
) -> Transition {
    let judgment = enforce_rejudge_budget(session, judgment, config.max_rejudge);
    let capped = session.is_capped(config.max_rounds);

    // At the cap only the judgment field changes
    let pairs = if capped {
        Vec::new()
    } else {
        comparisons_for(session, round_index, &judgment)
    };
    let new_comparisons = pairs.len();
    for pair in pairs {
        session.push_comparison(pair);
    }
    session.attach_judgment(round_index, judgment.clone());
    tracing::debug!(
        session = %session.id(),
        round_index,
        kind = judgment.kind(),
        new_comparisons,
        "judgment recorded"
    );

    if capped {
        tracing::info!(
            session = %session.id(),
            rounds = session.round_count(),
            max_rounds = config.max_rounds,
            "round cap reached; no round appended"
        );
        return Transition {
            recorded: judgment,
            new_comparisons,
            next_round: None,
        };
    }

    let round = match session.round(round_index) {
        Some(source) => next_round(session, source, &judgment, config, policy),
        None => {
            return Transition {
                recorded: judgment,
                new_comparisons,
                next_round: None,
            }
        }
    };
    tracing::info!(
        session = %session.id(),
        round_index = round.round_index,
        mode = ?round.mode,
        purpose = ?round.purpose,
        phase = round.metadata.phase,
        "round appended"
    );
    let next_index = session.push_round(round).round_index;

    Transition {
        recorded: judgment,
        new_comparisons,
        next_round: Some(next_index),
    }
}

/// Downgrade a rejudge to a reprint once `max_rejudge` rejudges were honored
fn enforce_rejudge_budget(session: &Session, judgment: Judgment, max_rejudge: usize) -> Judgment {
    if !judgment.is_rejudge() || session.rejudge_count() < max_rejudge {
        return judgment;
    }
    match judgment {
        Judgment::Undecidable {
            rubric, timestamp, ..
        } => {
            tracing::info!(
                session = %session.id(),
                used = session.rejudge_count(),
                max_rejudge,
                "rejudge budget exhausted; recording as reprint"
            );
            Judgment::Undecidable {
                rubric,
                next_action: NextAction::Reprint,
                chosen_slot: None,
                delta_scale: 1.0,
                rejudge_exhausted: true,
                timestamp,
            }
        }
        other => other,
    }
}

/// `(winner, other)` for every other candidate of the judged round
fn comparisons_for(session: &Session, round_index: usize, judgment: &Judgment) -> Vec<Comparison> {
    let (Some(slot), Some(round)) = (judgment.winning_slot(), session.round(round_index)) else {
        return Vec::new();
    };
    let registry = session.registry();
    let Some(winner) = registry.global_index_of(round_index, slot) else {
        return Vec::new();
    };
    round
        .candidates
        .iter()
        .filter(|c| c.slot != slot)
        .filter_map(|c| registry.global_index_of(round_index, &c.slot))
        .map(|loser| Comparison::new(winner, loser))
        .collect()
}

fn next_round(
    session: &Session,
    source: &Round,
    judgment: &Judgment,
    config: &TuneConfig,
    policy: &dyn SchedulePolicy,
) -> Round {
    let round_index = session.round_count() + 1;
    let rubric = judgment.rubric();

    if judgment.is_reprint() {
        let phase = source.phase();
        let schedule = policy.schedule(phase, rubric);
        let delta_scale = judgment.delta_scale();
        let trigger = match judgment {
            Judgment::BothBad { .. } => ReprintTrigger::BothBad,
            j if j.is_rejudge_exhausted() => ReprintTrigger::RejudgeExhausted,
            _ => ReprintTrigger::Undecidable,
        };
        let provenance = Provenance::Reprint {
            source_round: source.round_index,
            trigger,
        };
        let mut metadata = RoundMetadata::new(phase, schedule, provenance);

        let candidates = match source.mode {
            RoundMode::Orthogonal => {
                let shift = orthogonal_shift(session, &metadata.schedule, delta_scale, config);
                metadata.shift = Some(shift);
                source
                    .candidates
                    .iter()
                    .map(|c| {
                        Candidate::new(
                            c.slot.clone(),
                            c.vector
                                .shifted(shift.axis, shift.step)
                                .clamped(OVERSHOOT_RANGE),
                        )
                    })
                    .collect()
            }
            RoundMode::Pairwise => {
                proposed_candidates(session, &mut metadata, delta_scale, config)
            }
        };

        Round {
            round_id: RoundId::generate(),
            round_index,
            created_at: Utc::now(),
            candidates,
            mode: source.mode,
            purpose: RoundPurpose::Reprint,
            rubric,
            delta_scale,
            judgment: None,
            metadata,
        }
    } else {
        let phase = source.phase() + 1;
        let schedule = policy.schedule(phase, rubric);
        let provenance = Provenance::Explore {
            source_round: source.round_index,
            from_rejudge: judgment.is_rejudge(),
        };
        let mut metadata = RoundMetadata::new(phase, schedule, provenance);
        let candidates = proposed_candidates(session, &mut metadata, 1.0, config);

        Round {
            round_id: RoundId::generate(),
            round_index,
            created_at: Utc::now(),
            candidates,
            mode: RoundMode::Pairwise,
            purpose: RoundPurpose::PairwiseExplore,
            rubric,
            delta_scale: 1.0,
            judgment: None,
            metadata,
        }
    }
}

/// Signed block shift for the next orthogonal reprint
///
/// Positive after an even number of earlier orthogonal reprints,
/// negative after an odd number.
fn orthogonal_shift(
    session: &Session,
    schedule: &AxisSchedule,
    delta_scale: f64,
    config: &TuneConfig,
) -> BlockShift {
    let sign = if session.orthogonal_reprint_count() % 2 == 0 {
        1.0
    } else {
        -1.0
    };
    BlockShift {
        axis: schedule.primary_axis(),
        step: sign * config.oa_reprint_step * delta_scale,
    }
}

fn proposed_candidates(
    session: &Session,
    metadata: &mut RoundMetadata,
    delta_scale: f64,
    config: &TuneConfig,
) -> Vec<Candidate> {
    let points = session.registry().vectors();
    let anchor = session.fallback_center().unwrap_or(Center {
        vector: ParameterVector::neutral(),
        source: CenterSource::LatestRound { global_index: 0 },
    });
    let seed = derive_seed(
        config.proposal.seed,
        &[
            session.round_count() as u64,
            session.comparisons().len() as u64,
            metadata.phase as u64,
        ],
    );

    let request = ProposalRequest {
        points: &points,
        comparisons: session.comparisons(),
        anchor,
        schedule: &metadata.schedule,
        delta_scale,
        q: PAIRWISE_BATCH,
        seed,
    };
    let proposal = propose(&request, &config.model, &config.proposal);

    metadata.center = Some(proposal.center);
    metadata.method = Some(proposal.method);
    metadata.seed = Some(seed);

    proposal
        .vectors
        .into_iter()
        .zip(SLOT_LABELS)
        .map(|(vector, slot)| Candidate::new(slot, vector))
        .collect()
}

/// Mix session counters into the base seed (splitmix64)
fn derive_seed(base: u64, parts: &[u64]) -> u64 {
    let mut state = base;
    for &part in parts {
        state = state.wrapping_add(part).wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        state = z ^ (z >> 31);
    }
    state
}
