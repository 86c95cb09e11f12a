//! Round and judgment records
//!
//! Everything here is append-only: a round is never edited after creation
//! except to attach its single judgment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CandidateId, RoundId};
use crate::model::{Center, ProposalMethod};
use crate::schedule::{AxisSchedule, Rubric};
use crate::space::{Axis, ParameterVector};

/// Slot labels in display order
pub const SLOT_LABELS: [&str; 4] = ["A", "B", "C", "D"];

/// A candidate shown to the user
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Globally unique id
    pub candidate_id: CandidateId,
    /// Display label, unique within its round
    pub slot: String,
    /// Correction parameters
    pub vector: ParameterVector,
}

impl Candidate {
    /// Create a candidate with a fresh id
    pub fn new(slot: impl Into<String>, vector: ParameterVector) -> Self {
        Self {
            candidate_id: CandidateId::generate(),
            slot: slot.into(),
            vector,
        }
    }
}

/// How to continue after an undecidable comparison
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    /// Force a choice under the stated rubric
    Rejudge,
    /// Probe the same region again with a wider box
    Reprint,
}

/// The user's verdict on a round
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgment {
    /// One candidate was preferred
    Chosen {
        winning_slot: String,
        timestamp: DateTime<Utc>,
    },
    /// No clear preference
    ///
    /// `chosen_slot` is present only when `next_action` is `Rejudge`.
    /// `rejudge_exhausted` marks a rejudge request that was recorded as a
    /// reprint because the budget was spent.
    Undecidable {
        rubric: Rubric,
        next_action: NextAction,
        #[serde(default)]
        chosen_slot: Option<String>,
        delta_scale: f64,
        #[serde(default)]
        rejudge_exhausted: bool,
        timestamp: DateTime<Utc>,
    },
    /// Every candidate was unacceptable; always followed by a reprint
    BothBad {
        rubric: Rubric,
        delta_scale: f64,
        timestamp: DateTime<Utc>,
    },
}

impl Judgment {
    /// Kind name as stored
    pub fn kind(&self) -> &'static str {
        match self {
            Judgment::Chosen { .. } => "chosen",
            Judgment::Undecidable { .. } => "undecidable",
            Judgment::BothBad { .. } => "both_bad",
        }
    }

    /// When the judgment was made
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Judgment::Chosen { timestamp, .. }
            | Judgment::Undecidable { timestamp, .. }
            | Judgment::BothBad { timestamp, .. } => *timestamp,
        }
    }

    /// Flagged rubric, if any
    pub fn rubric(&self) -> Option<Rubric> {
        match self {
            Judgment::Chosen { .. } => None,
            Judgment::Undecidable { rubric, .. } | Judgment::BothBad { rubric, .. } => {
                Some(*rubric)
            }
        }
    }

    /// Slot that beat the rest of its round, if the judgment names one
    pub fn winning_slot(&self) -> Option<&str> {
        match self {
            Judgment::Chosen { winning_slot, .. } => Some(winning_slot),
            Judgment::Undecidable {
                next_action: NextAction::Rejudge,
                chosen_slot: Some(slot),
                ..
            } => Some(slot),
            _ => None,
        }
    }

    /// A rejudge that was honored and recorded comparisons
    pub fn is_rejudge(&self) -> bool {
        matches!(
            self,
            Judgment::Undecidable {
                next_action: NextAction::Rejudge,
                ..
            }
        )
    }

    /// A rejudge request downgraded to reprint
    pub fn is_rejudge_exhausted(&self) -> bool {
        matches!(
            self,
            Judgment::Undecidable {
                rejudge_exhausted: true,
                ..
            }
        )
    }

    /// Whether the next round re-probes the same region
    pub fn is_reprint(&self) -> bool {
        self.winning_slot().is_none()
    }

    /// Box widening factor requested for the next round
    pub fn delta_scale(&self) -> f64 {
        match self {
            Judgment::Chosen { .. } => 1.0,
            Judgment::Undecidable { delta_scale, .. } | Judgment::BothBad { delta_scale, .. } => {
                *delta_scale
            }
        }
    }
}

/// Layout of a round
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundMode {
    /// Four candidates from the orthogonal design
    Orthogonal,
    /// Two candidates from the preference model
    Pairwise,
}

/// Why a round was created
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPurpose {
    /// Round 1
    InitialDesign,
    /// Follow-up to a resolved choice
    PairwiseExplore,
    /// Re-probe of the previous region
    Reprint,
}

/// What caused a reprint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReprintTrigger {
    /// Undecidable judgment with `next_action = reprint`
    Undecidable,
    /// Both-bad judgment
    BothBad,
    /// Rejudge requested after the budget was spent
    RejudgeExhausted,
}

/// Lineage of a round
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Fixed first round
    InitialDesign,
    /// Created after a choice in `source_round`
    Explore {
        source_round: usize,
        from_rejudge: bool,
    },
    /// Created after `source_round` was not resolved
    Reprint {
        source_round: usize,
        trigger: ReprintTrigger,
    },
}

/// Block shift applied by an orthogonal reprint
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockShift {
    /// Axis moved
    pub axis: Axis,
    /// Signed offset
    pub step: f64,
}

/// How and why a round was generated
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundMetadata {
    /// Schedule phase of the round
    pub phase: usize,
    /// Resolved schedule, after rubric reordering
    pub schedule: AxisSchedule,
    /// Lineage
    pub provenance: Provenance,
    /// Search-box center for model-driven rounds
    #[serde(default)]
    pub center: Option<Center>,
    /// Proposal method for model-driven rounds
    #[serde(default)]
    pub method: Option<ProposalMethod>,
    /// Proposal seed for model-driven rounds
    #[serde(default)]
    pub seed: Option<u64>,
    /// Shift of an orthogonal reprint
    #[serde(default)]
    pub shift: Option<BlockShift>,
}

impl RoundMetadata {
    /// Metadata with no proposal details
    pub fn new(phase: usize, schedule: AxisSchedule, provenance: Provenance) -> Self {
        Self {
            phase,
            schedule,
            provenance,
            center: None,
            method: None,
            seed: None,
            shift: None,
        }
    }
}

/// One presentation of candidates and its (eventual) judgment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Round {
    /// Globally unique id
    pub round_id: RoundId,
    /// 1-based, dense position in the session
    pub round_index: usize,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Two or four candidates
    pub candidates: Vec<Candidate>,
    /// Layout
    pub mode: RoundMode,
    /// Reason for creation
    pub purpose: RoundPurpose,
    /// Rubric flagged by the judgment that led here
    #[serde(default)]
    pub rubric: Option<Rubric>,
    /// Box widening factor, at least 1.0
    pub delta_scale: f64,
    /// Verdict; absent only on the round awaiting judgment
    #[serde(default)]
    pub judgment: Option<Judgment>,
    /// Generation details
    pub metadata: RoundMetadata,
}

impl Round {
    /// Position and candidate for a slot label
    pub fn candidate(&self, slot: &str) -> Option<(usize, &Candidate)> {
        self.candidates
            .iter()
            .enumerate()
            .find(|(_, c)| c.slot == slot)
    }

    /// Slot labels in order
    pub fn slots(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.slot.as_str()).collect()
    }

    /// Whether a judgment is attached
    pub fn is_judged(&self) -> bool {
        self.judgment.is_some()
    }

    /// Schedule phase of the round
    pub fn phase(&self) -> usize {
        self.metadata.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_winning_slot() {
        let chosen = Judgment::Chosen {
            winning_slot: "B".to_string(),
            timestamp: now(),
        };
        assert_eq!(chosen.winning_slot(), Some("B"));
        assert!(!chosen.is_reprint());

        let rejudge = Judgment::Undecidable {
            rubric: Rubric::Skin,
            next_action: NextAction::Rejudge,
            chosen_slot: Some("A".to_string()),
            delta_scale: 1.0,
            rejudge_exhausted: false,
            timestamp: now(),
        };
        assert_eq!(rejudge.winning_slot(), Some("A"));
        assert!(rejudge.is_rejudge());

        let both_bad = Judgment::BothBad {
            rubric: Rubric::Shadows,
            delta_scale: 2.0,
            timestamp: now(),
        };
        assert_eq!(both_bad.winning_slot(), None);
        assert!(both_bad.is_reprint());
        assert_eq!(both_bad.delta_scale(), 2.0);
    }

    #[test]
    fn test_exhausted_rejudge_is_reprint() {
        let j = Judgment::Undecidable {
            rubric: Rubric::Overall,
            next_action: NextAction::Reprint,
            chosen_slot: None,
            delta_scale: 1.0,
            rejudge_exhausted: true,
            timestamp: now(),
        };
        assert!(j.is_reprint());
        assert!(!j.is_rejudge());
        assert!(j.is_rejudge_exhausted());
    }

    #[test]
    fn test_judgment_serde() {
        let j = Judgment::BothBad {
            rubric: Rubric::NeutralGray,
            delta_scale: 1.5,
            timestamp: now(),
        };
        let value = serde_json::to_value(&j).unwrap();
        assert_eq!(value["both_bad"]["rubric"], "neutral_gray");
        let back: Judgment = serde_json::from_value(value).unwrap();
        assert_eq!(back, j);
    }

    #[test]
    fn test_provenance_serde() {
        let p = Provenance::Reprint {
            source_round: 3,
            trigger: ReprintTrigger::RejudgeExhausted,
        };
        let value = serde_json::to_value(p).unwrap();
        assert_eq!(value["reprint"]["trigger"], "rejudge_exhausted");
        assert_eq!(value["reprint"]["source_round"], 3);
    }
}
