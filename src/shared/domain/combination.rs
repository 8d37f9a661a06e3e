//! The unit every phase iterates over: one class/spec pair in one dungeon
use serde::{Deserialize, Serialize};

/// A dungeon, identified by the provider's encounter id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dungeon {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Combination {
    pub class_name: String,
    pub spec_name: String,
    pub dungeon_id: i32,
}

impl Combination {
    pub fn new(class_name: impl Into<String>, spec_name: impl Into<String>, dungeon_id: i32) -> Self {
        Self {
            class_name: class_name.into(),
            spec_name: spec_name.into(),
            dungeon_id,
        }
    }

    /// Checkpoint key, `{class}_{spec}_{dungeonId}`
    pub fn key(&self) -> String {
        format!("{}_{}_{}", self.class_name, self.spec_name, self.dungeon_id)
    }
}

impl std::fmt::Display for Combination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let combo = Combination::new("Priest", "Shadow", 12660);
        assert_eq!(combo.key(), "Priest_Shadow_12660");
        assert_eq!(combo.to_string(), "Priest_Shadow_12660");
    }
}
