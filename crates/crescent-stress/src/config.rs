//! Stress thresholds and engine tunables.
//!
//! Thresholds are fixed boundaries on a stressor's level. Each carries a
//! duration: how long the level must stay at or above the boundary before
//! a sustained effect applies (adaptation for
//! [`ThresholdKind::MajorAdaptation`], extinction for
//! [`ThresholdKind::Critical`]).

use crescent_types::ThresholdKind;
use serde::Deserialize;

/// A level boundary and the time it must be sustained.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Threshold {
    /// Boundary in `[0, 1]`.
    pub value: f32,
    /// Time units the level must stay at or above `value`.
    pub duration: f32,
}

impl Threshold {
    /// A threshold at `value` sustained for `duration`.
    pub const fn new(value: f32, duration: f32) -> Self {
        Self { value, duration }
    }
}

/// The five stress boundaries, ascending.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StressThresholds {
    /// Minor adaptation boundary (default: 0.2).
    #[serde(default = "default_minor")]
    pub minor_adaptation: Threshold,

    /// Major adaptation boundary (default: 0.4, sustained 3).
    #[serde(default = "default_major")]
    pub major_adaptation: Threshold,

    /// Synthesis becomes possible (default: 0.6).
    #[serde(default = "default_synthesis")]
    pub synthesis_enabled: Threshold,

    /// Resistance growth pauses (default: 0.8).
    #[serde(default = "default_extinction_risk")]
    pub extinction_risk: Threshold,

    /// Extinction is signalled once sustained (default: 0.9, sustained 5).
    #[serde(default = "default_critical")]
    pub critical: Threshold,
}

const fn default_minor() -> Threshold {
    Threshold::new(0.2, 1.0)
}

const fn default_major() -> Threshold {
    Threshold::new(0.4, 3.0)
}

const fn default_synthesis() -> Threshold {
    Threshold::new(0.6, 2.0)
}

const fn default_extinction_risk() -> Threshold {
    Threshold::new(0.8, 4.0)
}

const fn default_critical() -> Threshold {
    Threshold::new(0.9, 5.0)
}

impl Default for StressThresholds {
    fn default() -> Self {
        Self {
            minor_adaptation: default_minor(),
            major_adaptation: default_major(),
            synthesis_enabled: default_synthesis(),
            extinction_risk: default_extinction_risk(),
            critical: default_critical(),
        }
    }
}

impl StressThresholds {
    /// The threshold for `kind`.
    pub const fn get(&self, kind: ThresholdKind) -> Threshold {
        match kind {
            ThresholdKind::MinorAdaptation => self.minor_adaptation,
            ThresholdKind::MajorAdaptation => self.major_adaptation,
            ThresholdKind::SynthesisEnabled => self.synthesis_enabled,
            ThresholdKind::ExtinctionRisk => self.extinction_risk,
            ThresholdKind::Critical => self.critical,
        }
    }

    /// Every threshold in ascending order.
    pub const fn ordered(&self) -> [(ThresholdKind, Threshold); 5] {
        [
            (ThresholdKind::MinorAdaptation, self.minor_adaptation),
            (ThresholdKind::MajorAdaptation, self.major_adaptation),
            (ThresholdKind::SynthesisEnabled, self.synthesis_enabled),
            (ThresholdKind::ExtinctionRisk, self.extinction_risk),
            (ThresholdKind::Critical, self.critical),
        ]
    }

    /// Thresholds passed when a level rises from `from` to `to`, ascending.
    pub fn crossed(&self, from: f32, to: f32) -> Vec<ThresholdKind> {
        self.ordered()
            .into_iter()
            .filter(|(_, t)| from < t.value && t.value <= to)
            .map(|(kind, _)| kind)
            .collect()
    }

    /// The lowest threshold strictly above `level`.
    pub fn next_threshold(&self, level: f32) -> Option<(ThresholdKind, Threshold)> {
        self.ordered().into_iter().find(|(_, t)| t.value > level)
    }

    /// The highest threshold at or below `level`.
    pub fn highest_reached(&self, level: f32) -> Option<ThresholdKind> {
        self.ordered()
            .into_iter()
            .rev()
            .find(|(_, t)| level >= t.value)
            .map(|(kind, _)| kind)
    }

    /// Problems with the table: values must ascend strictly within
    /// `(0, 1]` and durations must be non-negative.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut previous = 0.0_f32;
        for (kind, threshold) in self.ordered() {
            if !(threshold.value > previous && threshold.value <= 1.0) {
                problems.push(format!(
                    "{kind:?} threshold {} must lie above {previous} and at most 1",
                    threshold.value
                ));
            }
            if !(threshold.duration >= 0.0 && threshold.duration.is_finite()) {
                problems.push(format!("{kind:?} duration must be non-negative"));
            }
            previous = threshold.value;
        }
        problems
    }
}

/// Configuration for the [`StressEngine`](crate::StressEngine).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StressConfig {
    /// Level boundaries.
    #[serde(default)]
    pub thresholds: StressThresholds,

    /// Resistance per held trait listed as resistant (default: 0.1).
    #[serde(default = "default_trait_bonus")]
    pub trait_resistance_bonus: f32,

    /// Resistance lost per held trait listed as vulnerable (default: 0.1).
    #[serde(default = "default_trait_penalty")]
    pub trait_vulnerability_penalty: f32,

    /// Weight of adaptive resistance in the blend (default: 1.0).
    #[serde(default = "default_adaptive_weight")]
    pub adaptive_weight: f32,

    /// Adaptation attempt progress per time unit (default: 0.25).
    #[serde(default = "default_progress_rate")]
    pub adaptation_progress_rate: f32,

    /// Smoothing factor of the accumulated level (default: 0.1).
    #[serde(default = "default_smoothing")]
    pub accumulated_smoothing: f32,

    /// Stress records kept per creature (default: 100).
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

const fn default_trait_bonus() -> f32 {
    0.1
}

const fn default_trait_penalty() -> f32 {
    0.1
}

const fn default_adaptive_weight() -> f32 {
    1.0
}

const fn default_progress_rate() -> f32 {
    0.25
}

const fn default_smoothing() -> f32 {
    0.1
}

const fn default_history_capacity() -> usize {
    100
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            thresholds: StressThresholds::default(),
            trait_resistance_bonus: default_trait_bonus(),
            trait_vulnerability_penalty: default_trait_penalty(),
            adaptive_weight: default_adaptive_weight(),
            adaptation_progress_rate: default_progress_rate(),
            accumulated_smoothing: default_smoothing(),
            history_capacity: default_history_capacity(),
        }
    }
}

impl StressConfig {
    /// Problems with the configuration, empty when usable.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = self.thresholds.problems();
        if self.history_capacity == 0 {
            problems.push("stress history capacity must be positive".to_owned());
        }
        if !(self.accumulated_smoothing > 0.0 && self.accumulated_smoothing <= 1.0) {
            problems.push("accumulated smoothing must lie in (0, 1]".to_owned());
        }
        problems
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_ascending() {
        let config = StressConfig::default();
        assert!(config.problems().is_empty());
    }

    #[test]
    fn crossed_lists_passed_thresholds_in_order() {
        let thresholds = StressThresholds::default();
        assert_eq!(
            thresholds.crossed(0.1, 0.65),
            vec![
                ThresholdKind::MinorAdaptation,
                ThresholdKind::MajorAdaptation,
                ThresholdKind::SynthesisEnabled,
            ]
        );
        assert!(thresholds.crossed(0.5, 0.3).is_empty());
    }

    #[test]
    fn next_and_highest() {
        let thresholds = StressThresholds::default();
        assert_eq!(
            thresholds.next_threshold(0.3).map(|(kind, _)| kind),
            Some(ThresholdKind::MajorAdaptation)
        );
        assert_eq!(thresholds.next_threshold(0.95), None);
        assert_eq!(thresholds.highest_reached(0.1), None);
        assert_eq!(
            thresholds.highest_reached(0.85),
            Some(ThresholdKind::ExtinctionRisk)
        );
    }

    #[test]
    fn out_of_order_thresholds_are_reported() {
        let mut thresholds = StressThresholds::default();
        thresholds.major_adaptation.value = 0.1;
        assert!(!thresholds.problems().is_empty());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: StressConfig =
            serde_json::from_str(r#"{ "adaptive_weight": 0.5 }"#).unwrap();
        assert!((config.adaptive_weight - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.history_capacity, 100);
    }
}
