//! Session state
//!
//! A [`Session`] is an explicit value. Nothing in this crate keeps
//! process-wide session state; every operation takes a session and
//! returns or updates it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::SessionId;
use super::registry::{CandidateRegistry, RegistryEntry};
use super::record::{Judgment, Round, RoundMode, RoundPurpose};
use crate::model::{Center, CenterSource, Comparison};

/// Current session format version
pub const SESSION_VERSION: u32 = 1;

/// Complete state of one tuning session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Schema version for forward compatibility
    version: u32,
    session_id: SessionId,
    created_at: DateTime<Utc>,
    /// Opaque reference to the on-screen target image
    reference_image: String,
    rounds: Vec<Round>,
    comparisons: Vec<Comparison>,
    registry: CandidateRegistry,
}

impl Session {
    /// Create an empty session with a fresh id
    pub fn new(reference_image: impl Into<String>) -> Self {
        Self::with_id(SessionId::generate(), reference_image)
    }

    /// Create an empty session with a given id
    pub fn with_id(session_id: SessionId, reference_image: impl Into<String>) -> Self {
        Self {
            version: SESSION_VERSION,
            session_id,
            created_at: Utc::now(),
            reference_image: reference_image.into(),
            rounds: Vec::new(),
            comparisons: Vec::new(),
            registry: CandidateRegistry::new(),
        }
    }

    /// Schema version
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Session id
    pub fn id(&self) -> &SessionId {
        &self.session_id
    }

    /// Creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Reference image the prints are matched against
    pub fn reference_image(&self) -> &str {
        &self.reference_image
    }

    /// All rounds in order
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// Round by 1-based index
    pub fn round(&self, round_index: usize) -> Option<&Round> {
        round_index
            .checked_sub(1)
            .and_then(|i| self.rounds.get(i))
    }

    /// Number of rounds
    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    /// Most recent round
    pub fn current_round(&self) -> Option<&Round> {
        self.rounds.last()
    }

    /// The round awaiting a judgment, if any
    pub fn pending_round(&self) -> Option<&Round> {
        self.rounds.last().filter(|r| !r.is_judged())
    }

    /// All comparisons, in the order they were recorded
    pub fn comparisons(&self) -> &[Comparison] {
        &self.comparisons
    }

    /// Flattened candidate registry
    pub fn registry(&self) -> &CandidateRegistry {
        &self.registry
    }

    /// Number of candidates across all rounds
    pub fn total_candidates(&self) -> usize {
        self.registry.len()
    }

    /// Honored rejudges so far
    pub fn rejudge_count(&self) -> usize {
        self.judgments().filter(|j| j.is_rejudge()).count()
    }

    /// Phase of the most recent round, 0 before the first round
    pub fn current_phase(&self) -> usize {
        self.rounds.last().map_or(0, Round::phase)
    }

    /// Whether the session has reached `max_rounds`
    pub fn is_capped(&self, max_rounds: usize) -> bool {
        self.rounds.len() >= max_rounds
    }

    /// Winner of the most recent `Chosen` judgment
    pub fn last_chosen(&self) -> Option<&RegistryEntry> {
        self.rounds.iter().rev().find_map(|r| match &r.judgment {
            Some(Judgment::Chosen { winning_slot, .. }) => self
                .registry
                .global_index_of(r.round_index, winning_slot)
                .and_then(|i| self.registry.get(i)),
            _ => None,
        })
    }

    /// Whether a `Chosen` judgment has ever been recorded
    pub fn has_finalized_best(&self) -> bool {
        self.judgments()
            .any(|j| matches!(j, Judgment::Chosen { .. }))
    }

    /// Orthogonal reprint rounds so far
    pub fn orthogonal_reprint_count(&self) -> usize {
        self.rounds
            .iter()
            .filter(|r| r.mode == RoundMode::Orthogonal && r.purpose == RoundPurpose::Reprint)
            .count()
    }

    /// Center used when the preference model cannot choose one
    ///
    /// The last `Chosen` winner, else the first candidate of the most
    /// recent round. `None` only for a session without rounds.
    pub fn fallback_center(&self) -> Option<Center> {
        if let Some(entry) = self.last_chosen() {
            return Some(Center {
                vector: entry.vector,
                source: CenterSource::LastChosen {
                    global_index: entry.global_index,
                },
            });
        }
        let round = self.rounds.last()?;
        let global_index = self.registry.offset_of(round.round_index)?;
        let entry = self.registry.get(global_index)?;
        Some(Center {
            vector: entry.vector,
            source: CenterSource::LatestRound { global_index },
        })
    }

    fn judgments(&self) -> impl Iterator<Item = &Judgment> {
        self.rounds.iter().filter_map(|r| r.judgment.as_ref())
    }

    /// Check the structural invariants of the session
    ///
    /// Round indices are dense from 1, only the last round may lack a
    /// judgment, comparisons reference distinct registered candidates, and
    /// the registry matches the rounds.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (i, round) in self.rounds.iter().enumerate() {
            if round.round_index != i + 1 {
                return Err(format!(
                    "round at position {} has index {}",
                    i, round.round_index
                ));
            }
            if round.judgment.is_none() && i + 1 != self.rounds.len() {
                return Err(format!("round {} is not the last but has no judgment", i + 1));
            }
            if !(round.delta_scale.is_finite() && round.delta_scale >= 1.0) {
                return Err(format!(
                    "round {} has delta_scale {}",
                    i + 1,
                    round.delta_scale
                ));
            }
        }

        let n = self.registry.len();
        for c in &self.comparisons {
            if c.winner >= n || c.loser >= n || c.winner == c.loser {
                return Err(format!(
                    "comparison ({}, {}) is invalid for {} candidates",
                    c.winner, c.loser, n
                ));
            }
        }

        if self.registry != CandidateRegistry::from_rounds(&self.rounds) {
            return Err("candidate registry does not match rounds".to_string());
        }
        Ok(())
    }

    pub(crate) fn push_round(&mut self, round: Round) -> &Round {
        self.registry.register(&round);
        self.rounds.push(round);
        &self.rounds[self.rounds.len() - 1]
    }

    pub(crate) fn attach_judgment(&mut self, round_index: usize, judgment: Judgment) {
        if let Some(round) = round_index
            .checked_sub(1)
            .and_then(|i| self.rounds.get_mut(i))
        {
            round.judgment = Some(judgment);
        }
    }

    pub(crate) fn push_comparison(&mut self, comparison: Comparison) {
        self.comparisons.push(comparison);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_empty() {
        let session = Session::new("ref.png");
        assert_eq!(session.version(), SESSION_VERSION);
        assert_eq!(session.reference_image(), "ref.png");
        assert_eq!(session.round_count(), 0);
        assert_eq!(session.current_phase(), 0);
        assert!(session.fallback_center().is_none());
        assert!(!session.has_finalized_best());
        assert!(session.check_invariants().is_ok());
    }

    #[test]
    fn test_round_lookup_is_one_based() {
        let session = Session::new("ref.png");
        assert!(session.round(0).is_none());
        assert!(session.round(1).is_none());
    }
}
