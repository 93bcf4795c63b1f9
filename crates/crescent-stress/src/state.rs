//! Per-creature stress state.
//!
//! A [`StressState`] is created lazily the first time a creature is exposed
//! to an environment and can be dropped once it goes dormant. Everything in
//! it is owned by the creature's single writer.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crescent_types::{CreatureId, StressorCategory, StressorDefinition, ThresholdKind, clamp_unit};
use serde::{Deserialize, Serialize};

/// One stressor currently weighing on a creature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveStressor {
    /// Stressor definition id.
    pub stressor_id: String,
    /// Stressor category.
    pub category: StressorCategory,
    /// Intensity supplied by the environment this tick.
    pub raw_intensity: f32,
    /// Intensity left after resistance.
    pub effective_stress: f32,
    /// Accumulated level in `[0, 1]`.
    pub level: f32,
    /// Time spent with positive effective stress.
    pub active_time: f32,
    /// Consecutive time spent at or above the major adaptation boundary.
    pub time_above_major: f32,
    /// Whether the stressor applies constantly.
    pub continuous: bool,
    /// Whether the environment supplied it this tick.
    pub present: bool,
    /// Level lost per time unit once absent or fully resisted.
    pub dissipation_rate: f32,
    /// Adaptive resistance gained per time unit of exposure.
    pub adaptation_rate: f32,
    /// Thresholds this stressor has already crossed.
    pub crossed: BTreeSet<ThresholdKind>,
}

impl ActiveStressor {
    /// A fresh, zero-level instance of `definition`.
    pub fn new(definition: &StressorDefinition) -> Self {
        Self {
            stressor_id: definition.id.clone(),
            category: definition.category,
            raw_intensity: 0.0,
            effective_stress: 0.0,
            level: 0.0,
            active_time: 0.0,
            time_above_major: 0.0,
            continuous: definition.continuous,
            present: false,
            dissipation_rate: definition.dissipation_rate,
            adaptation_rate: definition.resistance.adaptation_rate,
            crossed: BTreeSet::new(),
        }
    }

    /// Raise the level by `amount`, clamped.
    pub fn accumulate(&mut self, amount: f32) {
        self.level = clamp_unit(self.level + amount);
    }

    /// Lower the level by the dissipation rate over `delta_time`, clamped.
    pub fn dissipate(&mut self, delta_time: f32) {
        self.level = clamp_unit(self.level - self.dissipation_rate * delta_time);
    }
}

/// Aggregate stress levels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StressProfile {
    /// Clamped sum of stressor levels.
    pub current_level: f32,
    /// Exponential moving average of `current_level`.
    pub accumulated_level: f32,
    /// Time spent under any stress.
    pub exposure_time: f32,
    /// Whether `current_level` rose on the last update.
    pub increasing: bool,
    /// Stressors by id.
    pub active: BTreeMap<String, ActiveStressor>,
}

/// Resistance built up against a stressor category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveResistance {
    /// Resistance in `[0, 1]`.
    pub current_level: f32,
    /// Growth per time unit under stress.
    pub acquisition_rate: f32,
    /// Time spent building this resistance.
    pub time_under_stress: f32,
    /// Held traits that contribute to it.
    pub source_traits: BTreeSet<String>,
}

/// Innate and acquired resistance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResistanceProfile {
    /// Innate resistance per category.
    pub type_resistances: BTreeMap<StressorCategory, f32>,
    /// Resistance acquired through exposure.
    pub adaptive: BTreeMap<StressorCategory, AdaptiveResistance>,
}

/// An adaptation being worked towards under stress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationAttempt {
    /// Trait id the creature is adapting towards.
    pub adaptation: String,
    /// Stressor driving the attempt.
    pub stressor_id: String,
    /// Progress in `[0, 1]`.
    pub progress: f32,
    /// Whether the attempt can still complete.
    pub viable: bool,
    /// Prerequisite traits not yet held.
    pub requirements: BTreeSet<String>,
}

impl AdaptationAttempt {
    /// Whether the attempt is finished and can be turned into a change.
    pub const fn is_ready(&self) -> bool {
        self.viable && self.progress >= 1.0
    }
}

/// Observable consequences of stress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectProfile {
    /// Adaptations already gained.
    pub active_adaptations: BTreeSet<String>,
    /// Held traits under pressure from a stressor above the minor boundary.
    pub pressured_traits: BTreeSet<String>,
    /// Attempts in progress.
    pub ongoing: Vec<AdaptationAttempt>,
}

/// One point of stress history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressRecord {
    /// Time since the state was created.
    pub elapsed: f32,
    /// Overall level after the update.
    pub level: f32,
    /// Smoothed level after the update.
    pub accumulated: f32,
    /// Stressors tracked after the update.
    pub active_stressors: usize,
}

/// All stress bookkeeping for one creature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressState {
    /// The creature this state belongs to.
    pub creature_id: CreatureId,
    /// Levels and active stressors.
    pub profile: StressProfile,
    /// Innate and acquired resistance.
    pub resistance: ResistanceProfile,
    /// Adaptations and pressured traits.
    pub effects: EffectProfile,
    /// Consecutive time at or above the critical boundary.
    pub critical_time: f32,
    /// Whether extinction has been signalled.
    pub extinction_signalled: bool,
    /// Time since creation.
    pub elapsed: f32,
    history: VecDeque<StressRecord>,
    history_capacity: usize,
}

impl StressState {
    /// An unstressed state keeping up to `history_capacity` records.
    pub fn new(creature_id: CreatureId, history_capacity: usize) -> Self {
        Self {
            creature_id,
            profile: StressProfile::default(),
            resistance: ResistanceProfile::default(),
            effects: EffectProfile::default(),
            critical_time: 0.0,
            extinction_signalled: false,
            elapsed: 0.0,
            history: VecDeque::with_capacity(history_capacity),
            history_capacity,
        }
    }

    /// Set innate resistance to a category, clamped to `[0, 1]`.
    pub fn set_type_resistance(&mut self, category: StressorCategory, value: f32) {
        self.resistance
            .type_resistances
            .insert(category, clamp_unit(value));
    }

    /// Level of one stressor, zero if it is not tracked.
    pub fn stressor_level(&self, stressor_id: &str) -> f32 {
        self.profile
            .active
            .get(stressor_id)
            .map_or(0.0, |stressor| stressor.level)
    }

    /// Acquired resistance to a category.
    pub fn adaptive_resistance(&self, category: StressorCategory) -> f32 {
        self.resistance
            .adaptive
            .get(&category)
            .map_or(0.0, |adaptive| adaptive.current_level)
    }

    /// Whether an attempt driven by `stressor_id` is in progress.
    pub fn is_adapting_to(&self, stressor_id: &str) -> bool {
        self.effects
            .ongoing
            .iter()
            .any(|attempt| attempt.stressor_id == stressor_id)
    }

    /// Remove and return every finished adaptation attempt.
    pub fn take_ready_adaptations(&mut self) -> Vec<AdaptationAttempt> {
        let (ready, ongoing): (Vec<_>, Vec<_>) = std::mem::take(&mut self.effects.ongoing)
            .into_iter()
            .partition(AdaptationAttempt::is_ready);
        self.effects.ongoing = ongoing;
        ready
    }

    /// Record that `adaptation` was gained.
    pub fn confirm_adaptation(&mut self, adaptation: &str) {
        self.effects.active_adaptations.insert(adaptation.to_owned());
    }

    /// Whether the state carries nothing worth keeping.
    pub fn is_dormant(&self) -> bool {
        self.profile.active.is_empty()
            && self.effects.ongoing.is_empty()
            && self.profile.current_level <= 0.0
    }

    /// Append a record, evicting the oldest when full.
    pub fn record(&mut self, record: StressRecord) {
        if self.history_capacity == 0 {
            return;
        }
        if self.history.len() >= self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }

    /// Up to `count` most recent records, newest first.
    pub fn history(&self, count: usize) -> Vec<&StressRecord> {
        self.history.iter().rev().take(count).collect()
    }

    /// Number of stored records.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(level: f32) -> StressRecord {
        StressRecord {
            elapsed: 0.0,
            level,
            accumulated: level,
            active_stressors: 1,
        }
    }

    #[test]
    fn history_is_bounded_newest_first() {
        let mut state = StressState::new(CreatureId::new(), 3);
        for step in 0..5_u8 {
            state.record(record(f32::from(step) / 10.0));
        }
        assert_eq!(state.history_len(), 3);
        let recent = state.history(1);
        assert!((recent[0].level - 0.4).abs() < 1e-6);
    }

    #[test]
    fn stressor_levels_stay_in_unit_range() {
        let definition =
            StressorDefinition::new("heat", "Heat", StressorCategory::Thermal, 0.5).with_dissipation(0.3);
        let mut stressor = ActiveStressor::new(&definition);
        stressor.accumulate(1.7);
        assert!((stressor.level - 1.0).abs() < f32::EPSILON);
        stressor.dissipate(10.0);
        assert!(stressor.level.abs() < f32::EPSILON);
    }

    #[test]
    fn type_resistance_is_clamped() {
        let mut state = StressState::new(CreatureId::new(), 10);
        state.set_type_resistance(StressorCategory::Chemical, 1.4);
        let value = state.resistance.type_resistances[&StressorCategory::Chemical];
        assert!((value - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = StressState::new(CreatureId::new(), 10);
        state.record(record(0.3));
        let json = serde_json::to_string(&state).unwrap();
        let restored: StressState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
    }
}
