//! Synthesis state machine tunables.
//!
//! Boundaries apply to a synthesis' stability factor. Durations and the
//! grace period are in simulation time units.

use serde::Deserialize;

/// Configuration for the [`SynthesisEngine`](crate::SynthesisEngine).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SynthesisConfig {
    /// Stability needed to complete and to count as stable (default: 0.6).
    #[serde(default = "default_stable_boundary")]
    pub stable_boundary: f32,

    /// Below this a synthesis degrades (default: 0.35).
    #[serde(default = "default_fluctuating_boundary")]
    pub fluctuating_boundary: f32,

    /// At or above this a synthesis counts as reinforced (default: 0.9).
    #[serde(default = "default_reinforced_boundary")]
    pub reinforced_boundary: f32,

    /// Minimum per-tick catalyst exposure that counts as present (default: 0.05).
    #[serde(default = "default_exposure_floor")]
    pub exposure_floor: f32,

    /// Completion gained per time unit at full catalyst strength (default: 0.5).
    #[serde(default = "default_formation_rate")]
    pub formation_rate: f32,

    /// Catalyst strength and influence lost per time unit unexposed (default: 0.5).
    #[serde(default = "default_catalyst_decay")]
    pub catalyst_decay: f32,

    /// Time stability must stay stable before completing (default: 2).
    #[serde(default = "default_stabilize_duration")]
    pub stabilize_duration: f32,

    /// Time spent degrading before turning critical (default: 2).
    #[serde(default = "default_degrade_duration")]
    pub degrade_duration: f32,

    /// Stability and completion lost per time unit while degrading (default: 0.1).
    #[serde(default = "default_degrade_rate")]
    pub degrade_rate: f32,

    /// Time a critical synthesis has to recover before reverting (default: 3).
    #[serde(default = "default_critical_grace")]
    pub critical_grace: f32,

    /// Stability a completed synthesis loses per unexposed time unit (default: 0.01).
    #[serde(default = "default_complete_decay_rate")]
    pub complete_decay_rate: f32,

    /// Events kept per synthesis (default: 100).
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

const fn default_stable_boundary() -> f32 {
    0.6
}

const fn default_fluctuating_boundary() -> f32 {
    0.35
}

const fn default_reinforced_boundary() -> f32 {
    0.9
}

const fn default_exposure_floor() -> f32 {
    0.05
}

const fn default_formation_rate() -> f32 {
    0.5
}

const fn default_catalyst_decay() -> f32 {
    0.5
}

const fn default_stabilize_duration() -> f32 {
    2.0
}

const fn default_degrade_duration() -> f32 {
    2.0
}

const fn default_degrade_rate() -> f32 {
    0.1
}

const fn default_critical_grace() -> f32 {
    3.0
}

const fn default_complete_decay_rate() -> f32 {
    0.01
}

const fn default_history_capacity() -> usize {
    100
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            stable_boundary: default_stable_boundary(),
            fluctuating_boundary: default_fluctuating_boundary(),
            reinforced_boundary: default_reinforced_boundary(),
            exposure_floor: default_exposure_floor(),
            formation_rate: default_formation_rate(),
            catalyst_decay: default_catalyst_decay(),
            stabilize_duration: default_stabilize_duration(),
            degrade_duration: default_degrade_duration(),
            degrade_rate: default_degrade_rate(),
            critical_grace: default_critical_grace(),
            complete_decay_rate: default_complete_decay_rate(),
            history_capacity: default_history_capacity(),
        }
    }
}

impl SynthesisConfig {
    /// Problems with the configuration, empty when usable.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let ordered = 0.0 < self.fluctuating_boundary
            && self.fluctuating_boundary < self.stable_boundary
            && self.stable_boundary <= self.reinforced_boundary
            && self.reinforced_boundary <= 1.0;
        if !ordered {
            problems.push(
                "stability boundaries must satisfy 0 < fluctuating < stable <= reinforced <= 1"
                    .to_owned(),
            );
        }
        let rates = [
            ("exposure_floor", self.exposure_floor),
            ("formation_rate", self.formation_rate),
            ("catalyst_decay", self.catalyst_decay),
            ("stabilize_duration", self.stabilize_duration),
            ("degrade_duration", self.degrade_duration),
            ("degrade_rate", self.degrade_rate),
            ("critical_grace", self.critical_grace),
            ("complete_decay_rate", self.complete_decay_rate),
        ];
        for (name, value) in rates {
            if !(value.is_finite() && value >= 0.0) {
                problems.push(format!("{name} must be a non-negative number"));
            }
        }
        if self.history_capacity == 0 {
            problems.push("synthesis history capacity must be positive".to_owned());
        }
        problems
    }
}
