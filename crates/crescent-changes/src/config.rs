//! Tunables for change processing.
//!
//! Defaults match the engine's documented limits: a history of 100 entries
//! with oldest-first eviction, and at most ten held abilities.

use crescent_types::{MAX_ACTIVE_ABILITIES, ValidationSeverity};
use serde::Deserialize;

/// Configuration for a [`ChangeProcessor`](crate::ChangeProcessor).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangeConfig {
    /// Maximum history entries kept for undo (default: 100).
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Maximum changes buffered in one batch (default: 64).
    #[serde(default = "default_batch_capacity")]
    pub batch_capacity: usize,

    /// Findings at or above this severity block a change (default: Error).
    #[serde(default)]
    pub min_blocking_severity: ValidationSeverity,

    /// Maximum abilities a creature may hold (default: 10).
    #[serde(default = "default_max_active_abilities")]
    pub max_active_abilities: usize,
}

const fn default_history_capacity() -> usize {
    100
}

const fn default_batch_capacity() -> usize {
    64
}

const fn default_max_active_abilities() -> usize {
    MAX_ACTIVE_ABILITIES
}

impl Default for ChangeConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            batch_capacity: default_batch_capacity(),
            min_blocking_severity: ValidationSeverity::default(),
            max_active_abilities: default_max_active_abilities(),
        }
    }
}

impl ChangeConfig {
    /// Problems with the configuration, empty when usable.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.history_capacity == 0 {
            problems.push("change history capacity must be positive".to_owned());
        }
        if self.batch_capacity == 0 {
            problems.push("batch capacity must be positive".to_owned());
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        assert!(ChangeConfig::default().problems().is_empty());
    }

    #[test]
    fn zero_capacities_are_reported() {
        let config = ChangeConfig {
            history_capacity: 0,
            batch_capacity: 0,
            ..ChangeConfig::default()
        };
        assert_eq!(config.problems().len(), 2);
    }
}
