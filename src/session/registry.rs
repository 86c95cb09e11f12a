//! Flattened candidate registry
//!
//! Every candidate gets a global index when its round is appended. The
//! index is the candidate's position in the flattening of all rounds in
//! round order, then slot order, and never changes afterwards.

use serde::{Deserialize, Serialize};

use super::ids::CandidateId;
use super::record::Round;
use crate::space::ParameterVector;

/// One registered candidate
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Position in the flattened candidate list
    pub global_index: usize,
    /// Candidate id
    pub candidate_id: CandidateId,
    /// Round the candidate belongs to
    pub round_index: usize,
    /// Slot within that round
    pub slot: String,
    /// Parameter vector
    pub vector: ParameterVector,
}

/// Append-only list of every candidate in a session
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRegistry {
    entries: Vec<RegistryEntry>,
}

impl CandidateRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from rounds
    pub fn from_rounds(rounds: &[Round]) -> Self {
        let mut registry = Self::new();
        for round in rounds {
            registry.register(round);
        }
        registry
    }

    /// Register every candidate of a newly appended round
    ///
    /// Returns the global index of the round's first candidate.
    pub fn register(&mut self, round: &Round) -> usize {
        let offset = self.entries.len();
        for (i, c) in round.candidates.iter().enumerate() {
            self.entries.push(RegistryEntry {
                global_index: offset + i,
                candidate_id: c.candidate_id,
                round_index: round.round_index,
                slot: c.slot.clone(),
                vector: c.vector,
            });
        }
        offset
    }

    /// Number of registered candidates
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry by global index
    pub fn get(&self, global_index: usize) -> Option<&RegistryEntry> {
        self.entries.get(global_index)
    }

    /// All entries in global order
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Vectors in global order, ready for the preference model
    pub fn vectors(&self) -> Vec<ParameterVector> {
        self.entries.iter().map(|e| e.vector).collect()
    }

    /// Global index of the first candidate in a round
    pub fn offset_of(&self, round_index: usize) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.round_index == round_index)
            .map(|e| e.global_index)
    }

    /// Global index of a slot in a round
    pub fn global_index_of(&self, round_index: usize, slot: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.round_index == round_index && e.slot == slot)
            .map(|e| e.global_index)
    }
}
