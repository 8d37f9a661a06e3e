//! Resumption record carried from one execution to the next
use super::phase::Phase;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Completed phases plus the combination keys processed in each phase.
/// Only grows within a run; cleared once the run completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub completed_phases: BTreeSet<Phase>,
    #[serde(default)]
    pub processed: BTreeMap<Phase, BTreeSet<String>>,
}

impl Checkpoint {
    pub fn is_phase_complete(&self, phase: Phase) -> bool {
        self.completed_phases.contains(&phase)
    }

    pub fn mark_phase_complete(&mut self, phase: Phase) {
        self.completed_phases.insert(phase);
    }

    pub fn is_processed(&self, phase: Phase, key: &str) -> bool {
        self.processed
            .get(&phase)
            .map_or(false, |keys| keys.contains(key))
    }

    /// Returns false when the key was already marked
    pub fn mark_processed(&mut self, phase: Phase, key: &str) -> bool {
        self.processed
            .entry(phase)
            .or_default()
            .insert(key.to_string())
    }

    pub fn processed_count(&self, phase: Phase) -> usize {
        self.processed.get(&phase).map_or(0, BTreeSet::len)
    }

    pub fn total_processed(&self) -> usize {
        self.processed.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.completed_phases.is_empty() && self.total_processed() == 0
    }

    pub fn clear(&mut self) {
        self.completed_phases.clear();
        self.processed.clear();
    }
}
