//! The stress engine: accumulation, dissipation, resistance growth and
//! adaptation triggers.
//!
//! The engine is an explicit context object. It borrows the read-only
//! [`DefinitionRegistry`] through an `Arc` and holds no per-creature data;
//! every call receives the creature's [`StressState`] by `&mut`, so many
//! creatures can be processed in parallel against one engine.
//!
//! # Tick contract
//!
//! For each stressor an environment applies:
//!
//! ```text
//! effective = max(0, intensity * accumulation_rate - resistance)
//! level    += effective * dt            (clamped to [0, 1])
//! ```
//!
//! Stressors that are absent, or fully resisted, lose
//! `dissipation_rate * dt` instead and are forgotten once they reach zero.
//! The overall level is the clamped sum of stressor levels.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crescent_types::{
    CreatureId, CreatureState, DefinitionRegistry, StressorCategory, StressorDefinition,
    ThresholdKind, clamp_unit,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::StressConfig;
use crate::error::StressError;
use crate::state::{ActiveStressor, AdaptationAttempt, StressRecord, StressState};

/// Callback invoked when a stressor first crosses a threshold.
pub type ThresholdCallback = Arc<dyn Fn(&ThresholdCrossing) + Send + Sync>;

/// Callback invoked once when a creature's critical stress is sustained.
pub type ExtinctionCallback = Arc<dyn Fn(CreatureId) + Send + Sync>;

/// A stressor reaching a threshold for the first time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCrossing {
    /// The stressed creature.
    pub creature_id: CreatureId,
    /// The stressor that crossed.
    pub stressor_id: String,
    /// Its category.
    pub category: StressorCategory,
    /// The threshold crossed.
    pub kind: ThresholdKind,
    /// The stressor's level after the update.
    pub level: f32,
}

/// What one stress update produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StressReport {
    /// First-time crossings, ascending per stressor.
    pub crossings: Vec<ThresholdCrossing>,
    /// Whether extinction was signalled by this update.
    pub extinction: bool,
    /// Adaptations whose attempts are complete.
    pub ready_adaptations: Vec<String>,
    /// Overall level after the update.
    pub level: f32,
    /// Whether the overall level rose.
    pub increasing: bool,
}

/// Stateless stress processor shared by every creature.
pub struct StressEngine {
    registry: Arc<DefinitionRegistry>,
    config: StressConfig,
    threshold_callbacks: Vec<ThresholdCallback>,
    extinction_callbacks: Vec<ExtinctionCallback>,
}

impl fmt::Debug for StressEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StressEngine")
            .field("config", &self.config)
            .field("threshold_callbacks", &self.threshold_callbacks.len())
            .field("extinction_callbacks", &self.extinction_callbacks.len())
            .finish_non_exhaustive()
    }
}

impl StressEngine {
    /// An engine over a fully populated registry.
    pub fn new(registry: Arc<DefinitionRegistry>, config: StressConfig) -> Self {
        Self {
            registry,
            config,
            threshold_callbacks: Vec::new(),
            extinction_callbacks: Vec::new(),
        }
    }

    /// Configuration in effect.
    pub const fn config(&self) -> &StressConfig {
        &self.config
    }

    /// A fresh state for `creature_id` sized by the configuration.
    pub fn new_state(&self, creature_id: CreatureId) -> StressState {
        StressState::new(creature_id, self.config.history_capacity)
    }

    /// Register a threshold callback. Callbacks run synchronously inside
    /// [`process_environmental_stress`](Self::process_environmental_stress).
    pub fn on_threshold(&mut self, callback: impl Fn(&ThresholdCrossing) + Send + Sync + 'static) {
        self.threshold_callbacks.push(Arc::new(callback));
    }

    /// Register an extinction callback.
    pub fn on_extinction(&mut self, callback: impl Fn(CreatureId) + Send + Sync + 'static) {
        self.extinction_callbacks.push(Arc::new(callback));
    }

    // -----------------------------------------------------------------------
    // Stress accumulation
    // -----------------------------------------------------------------------

    /// Advance a creature's stress by `delta_time` in `environment_id`.
    pub fn process_environmental_stress(
        &self,
        state: &mut StressState,
        creature: &CreatureState,
        environment_id: &str,
        delta_time: f32,
    ) -> Result<StressReport, StressError> {
        check_delta(delta_time)?;
        if self.registry.get_environment(environment_id).is_none() {
            return Err(StressError::UnknownEnvironment(environment_id.to_owned()));
        }
        let resolved = self.registry.stressors_for_environment(environment_id)?;

        let previous = state.profile.current_level;
        for stressor in state.profile.active.values_mut() {
            stressor.present = false;
        }

        for entry in resolved {
            let definition = entry.definition;
            let resistance = self.current_resistance(state, creature, definition);
            let effective =
                (entry.intensity.max(0.0) * definition.accumulation_rate - resistance).max(0.0);

            let stressor = state
                .profile
                .active
                .entry(definition.id.clone())
                .or_insert_with(|| ActiveStressor::new(definition));
            stressor.present = true;
            stressor.raw_intensity = entry.intensity;
            stressor.effective_stress = effective;
            if effective > 0.0 {
                stressor.accumulate(effective * delta_time);
                stressor.active_time += delta_time;
            } else {
                stressor.dissipate(delta_time);
            }
        }

        state.profile.active.retain(|id, stressor| {
            if !stressor.present {
                stressor.raw_intensity = 0.0;
                stressor.effective_stress = 0.0;
                stressor.dissipate(delta_time);
                if stressor.level <= 0.0 {
                    debug!(stressor = %id, "Stressor fully dissipated");
                }
            }
            stressor.present || stressor.level > 0.0
        });

        let crossings = self.detect_crossings(state, delta_time);
        self.update_profile(state, previous, delta_time);
        let extinction = self.check_extinction(state, delta_time);
        self.update_pressured_traits(state, creature);
        let ready_adaptations = self.advance_adaptations(state, creature, delta_time);

        state.elapsed += delta_time;
        state.record(StressRecord {
            elapsed: state.elapsed,
            level: state.profile.current_level,
            accumulated: state.profile.accumulated_level,
            active_stressors: state.profile.active.len(),
        });

        debug!(
            creature = %state.creature_id,
            environment = environment_id,
            level = state.profile.current_level,
            stressors = state.profile.active.len(),
            "Stress updated"
        );

        for crossing in &crossings {
            info!(
                creature = %crossing.creature_id,
                stressor = %crossing.stressor_id,
                threshold = ?crossing.kind,
                level = crossing.level,
                "Stress threshold crossed"
            );
            for callback in &self.threshold_callbacks {
                callback(crossing);
            }
        }
        if extinction {
            for callback in &self.extinction_callbacks {
                callback(state.creature_id);
            }
        }

        Ok(StressReport {
            crossings,
            extinction,
            ready_adaptations,
            level: state.profile.current_level,
            increasing: state.profile.increasing,
        })
    }

    fn detect_crossings(&self, state: &mut StressState, delta_time: f32) -> Vec<ThresholdCrossing> {
        let thresholds = &self.config.thresholds;
        let major = thresholds.major_adaptation.value;
        let creature_id = state.creature_id;
        let mut crossings = Vec::new();

        for stressor in state.profile.active.values_mut() {
            if stressor.level >= major {
                stressor.time_above_major += delta_time;
            } else {
                stressor.time_above_major = 0.0;
            }
            for (kind, threshold) in thresholds.ordered() {
                if stressor.level >= threshold.value && stressor.crossed.insert(kind) {
                    crossings.push(ThresholdCrossing {
                        creature_id,
                        stressor_id: stressor.stressor_id.clone(),
                        category: stressor.category,
                        kind,
                        level: stressor.level,
                    });
                }
            }
        }
        crossings
    }

    fn update_profile(&self, state: &mut StressState, previous: f32, delta_time: f32) {
        let total: f32 = state.profile.active.values().map(|s| s.level).sum();
        let profile = &mut state.profile;
        profile.current_level = clamp_unit(total);
        profile.increasing = profile.current_level > previous;
        if profile.current_level > 0.0 {
            profile.exposure_time += delta_time;
        }
        let smoothing = self.config.accumulated_smoothing;
        profile.accumulated_level = clamp_unit(
            profile.accumulated_level + smoothing * (profile.current_level - profile.accumulated_level),
        );
    }

    fn check_extinction(&self, state: &mut StressState, delta_time: f32) -> bool {
        let critical = self.config.thresholds.critical;
        if state.profile.current_level >= critical.value {
            state.critical_time += delta_time;
        } else {
            state.critical_time = 0.0;
        }
        if state.extinction_signalled || state.critical_time < critical.duration {
            return false;
        }
        if state.profile.current_level < critical.value {
            return false;
        }
        state.extinction_signalled = true;
        warn!(
            creature = %state.creature_id,
            level = state.profile.current_level,
            sustained = state.critical_time,
            "Critical stress sustained, extinction signalled"
        );
        true
    }

    fn update_pressured_traits(&self, state: &mut StressState, creature: &CreatureState) {
        let minor = self.config.thresholds.minor_adaptation.value;
        let pressured = &mut state.effects.pressured_traits;
        pressured.clear();
        for stressor in state
            .profile
            .active
            .values()
            .filter(|s| s.present && s.level >= minor)
        {
            if let Some(definition) = self.registry.get_stressor(&stressor.stressor_id) {
                pressured.extend(
                    definition
                        .effects
                        .trait_pressures
                        .keys()
                        .filter(|id| creature.has_trait(id))
                        .cloned(),
                );
            }
        }
    }

    fn advance_adaptations(
        &self,
        state: &mut StressState,
        creature: &CreatureState,
        delta_time: f32,
    ) -> Vec<String> {
        let minor = self.config.thresholds.minor_adaptation.value;
        let rate = self.config.adaptation_progress_rate;
        let active = &state.profile.active;

        state.effects.ongoing.retain_mut(|attempt| {
            let Some(driving) = active.get(&attempt.stressor_id) else {
                debug!(adaptation = %attempt.adaptation, "Adaptation abandoned, stressor gone");
                return false;
            };
            if creature.has_trait(&attempt.adaptation) {
                return false;
            }
            attempt.requirements = self.missing_prerequisites(creature, &attempt.adaptation);
            attempt.viable = attempt.requirements.is_empty();
            if attempt.viable && driving.present && driving.level >= minor {
                attempt.progress = clamp_unit(attempt.progress + rate * delta_time);
            }
            true
        });

        state
            .effects
            .ongoing
            .iter()
            .filter(|attempt| attempt.is_ready())
            .map(|attempt| attempt.adaptation.clone())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Resistance
    // -----------------------------------------------------------------------

    /// Grow adaptive resistance for every category under stress.
    ///
    /// Growth is linear in `delta_time` at each stressor's acquisition rate
    /// and capped at 1. It pauses entirely while the overall level is at or
    /// above the extinction risk boundary.
    pub fn update_resistances(
        &self,
        state: &mut StressState,
        creature: &CreatureState,
        delta_time: f32,
    ) -> Result<(), StressError> {
        check_delta(delta_time)?;
        if state.profile.current_level >= self.config.thresholds.extinction_risk.value {
            debug!(
                creature = %state.creature_id,
                level = state.profile.current_level,
                "Resistance growth paused at extinction risk"
            );
            return Ok(());
        }

        for stressor in state
            .profile
            .active
            .values()
            .filter(|s| s.present && s.level > 0.0)
        {
            let adaptive = state.resistance.adaptive.entry(stressor.category).or_default();
            adaptive.acquisition_rate = stressor.adaptation_rate;
            adaptive.current_level =
                clamp_unit(adaptive.current_level + stressor.adaptation_rate * delta_time);
            adaptive.time_under_stress += delta_time;
            if let Some(definition) = self.registry.get_stressor(&stressor.stressor_id) {
                adaptive.source_traits.extend(
                    definition
                        .resistance
                        .resistant_traits
                        .iter()
                        .filter(|id| creature.has_trait(id))
                        .cloned(),
                );
            }
        }
        Ok(())
    }

    /// Resistance a creature currently has against `definition`.
    ///
    /// Blends the stressor's base resistance, innate type resistance,
    /// weighted adaptive resistance and held resistant or vulnerable
    /// traits, clamped to `[0, 1]`. Suppressed traits do not count.
    pub fn current_resistance(
        &self,
        state: &StressState,
        creature: &CreatureState,
        definition: &StressorDefinition,
    ) -> f32 {
        let category = definition.category;
        let innate = state
            .resistance
            .type_resistances
            .get(&category)
            .copied()
            .unwrap_or(0.0);
        let adaptive = state.adaptive_resistance(category) * self.config.adaptive_weight;
        let held = |ids: &BTreeSet<String>| {
            count_as_f32(
                ids.iter()
                    .filter(|id| creature.has_trait(id) && !creature.is_suppressed(id))
                    .count(),
            )
        };
        let bonus = held(&definition.resistance.resistant_traits) * self.config.trait_resistance_bonus;
        let penalty =
            held(&definition.resistance.vulnerable_traits) * self.config.trait_vulnerability_penalty;

        clamp_unit(definition.resistance.base_resistance + innate + adaptive + bonus - penalty)
    }

    /// Whether current resistance meets what `intensity` (or the
    /// stressor's base intensity) requires.
    pub fn can_resist(
        &self,
        state: &StressState,
        creature: &CreatureState,
        stressor_id: &str,
        intensity: Option<f32>,
    ) -> Result<bool, StressError> {
        let definition = self
            .registry
            .get_stressor(stressor_id)
            .ok_or_else(|| StressError::UnknownStressor(stressor_id.to_owned()))?;
        let required = intensity.unwrap_or(definition.base_intensity) * definition.accumulation_rate;
        Ok(self.current_resistance(state, creature, definition) >= required)
    }

    // -----------------------------------------------------------------------
    // Adaptation
    // -----------------------------------------------------------------------

    /// Whether sustained pressure from `stressor_id` should start an
    /// adaptation.
    ///
    /// True once the stressor has stayed at or above the major adaptation
    /// boundary for its configured duration, no attempt for it is running,
    /// and the creature is not mid-synthesis.
    pub fn should_trigger_adaptation(
        &self,
        state: &StressState,
        stressor_id: &str,
        mid_synthesis: bool,
    ) -> bool {
        if mid_synthesis || state.is_adapting_to(stressor_id) {
            return false;
        }
        let required = self.config.thresholds.major_adaptation.duration;
        state
            .profile
            .active
            .get(stressor_id)
            .is_some_and(|stressor| stressor.present && stressor.time_above_major >= required)
    }

    /// Registered adaptations of `stressor_id` the creature has not gained.
    pub fn adaptation_candidates(
        &self,
        state: &StressState,
        creature: &CreatureState,
        stressor_id: &str,
    ) -> Vec<String> {
        self.registry
            .get_stressor(stressor_id)
            .map(|definition| {
                definition
                    .effects
                    .possible_adaptations
                    .iter()
                    .filter(|id| self.registry.get_trait(id).is_some())
                    .filter(|id| !creature.has_trait(id))
                    .filter(|id| !state.effects.active_adaptations.contains(*id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Start working towards `adaptation` under `stressor_id`.
    ///
    /// Returns `Ok(false)` when the stressor is not tracked, an attempt for
    /// it is already running, or the trait is already held.
    pub fn begin_adaptation(
        &self,
        state: &mut StressState,
        creature: &CreatureState,
        stressor_id: &str,
        adaptation: &str,
    ) -> Result<bool, StressError> {
        self.registry.require_trait(adaptation)?;
        if !state.profile.active.contains_key(stressor_id)
            || state.is_adapting_to(stressor_id)
            || creature.has_trait(adaptation)
        {
            return Ok(false);
        }
        let requirements = self.missing_prerequisites(creature, adaptation);
        info!(
            creature = %state.creature_id,
            stressor = stressor_id,
            adaptation,
            "Adaptation started"
        );
        state.effects.ongoing.push(AdaptationAttempt {
            adaptation: adaptation.to_owned(),
            stressor_id: stressor_id.to_owned(),
            progress: 0.0,
            viable: requirements.is_empty(),
            requirements,
        });
        Ok(true)
    }

    fn missing_prerequisites(&self, creature: &CreatureState, adaptation: &str) -> BTreeSet<String> {
        self.registry
            .get_trait(adaptation)
            .map(|definition| {
                definition
                    .prerequisites
                    .iter()
                    .filter(|id| !creature.has_trait(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Whether the overall level is at or above the extinction risk boundary.
    pub const fn is_in_danger(&self, state: &StressState) -> bool {
        state.profile.current_level >= self.config.thresholds.extinction_risk.value
    }
}

const fn check_delta(delta_time: f32) -> Result<(), StressError> {
    if delta_time.is_finite() && delta_time >= 0.0 {
        Ok(())
    } else {
        Err(StressError::InvalidDelta { delta_time })
    }
}

fn count_as_f32(count: usize) -> f32 {
    u16::try_from(count).map_or(f32::from(u16::MAX), f32::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use crescent_types::{EnvironmentDefinition, TraitDefinition};

    use super::*;

    fn registry() -> DefinitionRegistry {
        let mut registry = DefinitionRegistry::new();
        registry
            .register_trait(TraitDefinition::new("fireproof", "Fireproof"))
            .unwrap();
        registry
            .register_trait(TraitDefinition::new("thick_hide", "Thick Hide"))
            .unwrap();
        registry
            .register_trait(TraitDefinition::new("ash_lungs", "Ash Lungs").requires("thick_hide"))
            .unwrap();

        let mut heat = StressorDefinition::new("heat", "Heat", StressorCategory::Thermal, 0.05)
            .with_dissipation(0.1)
            .with_adaptation_rate(0.02)
            .with_adaptation("fireproof")
            .with_adaptation("ash_lungs");
        heat.resistance.resistant_traits.insert("fireproof".to_owned());
        heat.effects.trait_pressures.insert("thick_hide".to_owned(), 0.5);
        registry.register_stressor(heat).unwrap();

        registry
            .register_environment(
                EnvironmentDefinition::new("ash_plains", "Ash Plains").with_stressor("heat", None),
            )
            .unwrap();
        registry
            .register_environment(
                EnvironmentDefinition::new("furnace", "Furnace").with_stressor("heat", Some(0.5)),
            )
            .unwrap();
        registry
            .register_environment(
                EnvironmentDefinition::new("still_heat", "Still Heat").with_stressor("heat", Some(0.0)),
            )
            .unwrap();
        registry
            .register_environment(EnvironmentDefinition::new("meadow", "Meadow"))
            .unwrap();
        registry
    }

    fn engine() -> StressEngine {
        StressEngine::new(Arc::new(registry()), StressConfig::default())
    }

    #[test]
    fn level_clamps_and_thresholds_fire_in_order() {
        let mut engine = engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        engine.on_threshold(move |crossing| sink.lock().unwrap().push(crossing.kind));

        let creature = CreatureState::new("Ember");
        let mut state = engine.new_state(creature.id);
        for _ in 0..20 {
            engine
                .process_environmental_stress(&mut state, &creature, "ash_plains", 1.0)
                .unwrap();
        }
        assert!((state.profile.current_level - 1.0).abs() < 1e-5);
        assert_eq!(*seen.lock().unwrap(), ThresholdKind::ALL.to_vec());
    }

    #[test]
    fn zero_intensity_never_raises_level() {
        let engine = engine();
        let creature = CreatureState::new("Ember");
        let mut state = engine.new_state(creature.id);
        for _ in 0..3 {
            engine
                .process_environmental_stress(&mut state, &creature, "furnace", 0.5)
                .unwrap();
        }
        let mut previous = state.profile.current_level;
        for _ in 0..10 {
            let report = engine
                .process_environmental_stress(&mut state, &creature, "still_heat", 1.0)
                .unwrap();
            assert!(report.level <= previous);
            assert!(!report.increasing);
            previous = report.level;
        }
    }

    #[test]
    fn absent_stressors_dissipate_then_vanish() {
        let engine = engine();
        let creature = CreatureState::new("Ember");
        let mut state = engine.new_state(creature.id);
        engine
            .process_environmental_stress(&mut state, &creature, "furnace", 1.0)
            .unwrap();
        let peak = state.stressor_level("heat");

        engine
            .process_environmental_stress(&mut state, &creature, "meadow", 1.0)
            .unwrap();
        let after = state.stressor_level("heat");
        assert!(after < peak);
        assert!(after > 0.0);

        for _ in 0..20 {
            engine
                .process_environmental_stress(&mut state, &creature, "meadow", 1.0)
                .unwrap();
        }
        assert!(state.profile.active.is_empty());
        assert!(state.is_dormant());
    }

    #[test]
    fn resistance_grows_monotonically_below_extinction_risk() {
        let engine = engine();
        let creature = CreatureState::new("Ember");
        let mut state = engine.new_state(creature.id);
        let mut previous = 0.0;
        for _ in 0..8 {
            engine
                .process_environmental_stress(&mut state, &creature, "ash_plains", 1.0)
                .unwrap();
            engine.update_resistances(&mut state, &creature, 1.0).unwrap();
            let current = state.adaptive_resistance(StressorCategory::Thermal);
            assert!(current >= previous);
            previous = current;
        }
        assert!(previous > 0.0);
    }

    #[test]
    fn resistance_growth_pauses_at_extinction_risk() {
        let engine = engine();
        let creature = CreatureState::new("Ember");
        let mut state = engine.new_state(creature.id);
        engine
            .process_environmental_stress(&mut state, &creature, "furnace", 2.0)
            .unwrap();
        assert!(engine.is_in_danger(&state));
        let before = state.adaptive_resistance(StressorCategory::Thermal);
        engine.update_resistances(&mut state, &creature, 5.0).unwrap();
        let after = state.adaptive_resistance(StressorCategory::Thermal);
        assert!((after - before).abs() < f32::EPSILON);
    }

    #[test]
    fn resistant_trait_lowers_effective_stress() {
        let engine = engine();
        let plain = CreatureState::new("Plain");
        let hardy = CreatureState::new("Hardy").with_trait(TraitDefinition::new("fireproof", "Fireproof"));
        let state = engine.new_state(plain.id);
        assert!(!engine.can_resist(&state, &plain, "heat", None).unwrap());
        assert!(engine.can_resist(&state, &hardy, "heat", None).unwrap());
        assert!(!engine.can_resist(&state, &hardy, "heat", Some(0.5)).unwrap());
        assert!(matches!(
            engine.can_resist(&state, &hardy, "frost", None),
            Err(StressError::UnknownStressor(_))
        ));
    }

    #[test]
    fn extinction_fires_once_after_sustained_critical() {
        let mut engine = engine();
        let fired = Arc::new(Mutex::new(0_u32));
        let counter = Arc::clone(&fired);
        engine.on_extinction(move |_| *counter.lock().unwrap() += 1);

        let creature = CreatureState::new("Ember");
        let mut state = engine.new_state(creature.id);
        let mut signalled = 0;
        for _ in 0..12 {
            let report = engine
                .process_environmental_stress(&mut state, &creature, "furnace", 1.0)
                .unwrap();
            if report.extinction {
                signalled += 1;
            }
        }
        assert_eq!(signalled, 1);
        assert_eq!(*fired.lock().unwrap(), 1);
        assert!(state.extinction_signalled);
    }

    #[test]
    fn sustained_major_stress_triggers_adaptation() {
        let engine = engine();
        let creature = CreatureState::new("Ember");
        let mut state = engine.new_state(creature.id);
        engine
            .process_environmental_stress(&mut state, &creature, "furnace", 1.0)
            .unwrap();
        assert!(!engine.should_trigger_adaptation(&state, "heat", false));
        for _ in 0..3 {
            engine
                .process_environmental_stress(&mut state, &creature, "furnace", 1.0)
                .unwrap();
        }
        assert!(engine.should_trigger_adaptation(&state, "heat", false));
        assert!(!engine.should_trigger_adaptation(&state, "heat", true));

        let candidates = engine.adaptation_candidates(&state, &creature, "heat");
        assert_eq!(candidates, vec!["fireproof".to_owned(), "ash_lungs".to_owned()]);
        assert!(engine
            .begin_adaptation(&mut state, &creature, "heat", "fireproof")
            .unwrap());
        assert!(!engine.should_trigger_adaptation(&state, "heat", false));

        for _ in 0..3 {
            engine
                .process_environmental_stress(&mut state, &creature, "furnace", 1.0)
                .unwrap();
        }
        let report = engine
            .process_environmental_stress(&mut state, &creature, "furnace", 1.0)
            .unwrap();
        assert_eq!(report.ready_adaptations, vec!["fireproof".to_owned()]);
        let taken = state.take_ready_adaptations();
        assert_eq!(taken.len(), 1);
        state.confirm_adaptation("fireproof");
        assert_eq!(
            engine.adaptation_candidates(&state, &creature, "heat"),
            vec!["ash_lungs".to_owned()]
        );
    }

    #[test]
    fn adaptation_with_missing_prerequisite_is_not_viable() {
        let engine = engine();
        let creature = CreatureState::new("Ember");
        let mut state = engine.new_state(creature.id);
        engine
            .process_environmental_stress(&mut state, &creature, "furnace", 1.0)
            .unwrap();
        engine
            .begin_adaptation(&mut state, &creature, "heat", "ash_lungs")
            .unwrap();
        for _ in 0..6 {
            engine
                .process_environmental_stress(&mut state, &creature, "furnace", 1.0)
                .unwrap();
        }
        let attempt = &state.effects.ongoing[0];
        assert!(!attempt.viable);
        assert!(attempt.requirements.contains("thick_hide"));
        assert!(state.take_ready_adaptations().is_empty());
    }

    #[test]
    fn pressured_traits_follow_held_traits() {
        let engine = engine();
        let creature =
            CreatureState::new("Ember").with_trait(TraitDefinition::new("thick_hide", "Thick Hide"));
        let mut state = engine.new_state(creature.id);
        engine
            .process_environmental_stress(&mut state, &creature, "furnace", 1.0)
            .unwrap();
        assert!(state.effects.pressured_traits.contains("thick_hide"));
    }

    #[test]
    fn bad_input_is_rejected() {
        let engine = engine();
        let creature = CreatureState::new("Ember");
        let mut state = engine.new_state(creature.id);
        assert!(matches!(
            engine.process_environmental_stress(&mut state, &creature, "nowhere", 1.0),
            Err(StressError::UnknownEnvironment(_))
        ));
        assert!(matches!(
            engine.process_environmental_stress(&mut state, &creature, "meadow", f32::NAN),
            Err(StressError::InvalidDelta { .. })
        ));
        assert_eq!(state.history_len(), 0);
    }
}
