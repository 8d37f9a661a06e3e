//! Per-entity change counters reported by every store operation
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub new: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub deleted: u64,
    pub skipped: u64,
}

impl EntityCounts {
    pub fn skipped(count: u64) -> Self {
        Self {
            skipped: count,
            ..Self::default()
        }
    }

    /// Records written or confirmed by the store
    pub fn stored(&self) -> u64 {
        self.new + self.updated + self.unchanged
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl AddAssign for EntityCounts {
    fn add_assign(&mut self, other: Self) {
        self.new += other.new;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
    }
}

impl std::fmt::Display for EntityCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "new={} updated={} unchanged={} deleted={} skipped={}",
            self.new, self.updated, self.unchanged, self.deleted, self.skipped
        )
    }
}
