//! The per-creature tick.
//!
//! Each tick runs the same phases in order:
//!
//! 1. **Stress** -- accumulate and dissipate the environment's stressors,
//!    grow adaptive resistance.
//! 2. **Catalysis** -- a fresh crossing of the synthesis boundary starts a
//!    stress-driven synthesis when a path exists and none is under way.
//!    Queued catalysts and every stressor at or above the synthesis
//!    boundary are then recorded as exposures.
//! 3. **Synthesis** -- progress every trait's stage machine and route
//!    completions and reversions through the change processor. Each is
//!    settled in the synthesis book only once its change applied; a
//!    refused change rolls the trait back.
//! 4. **Adaptation** -- sustained major stress starts an adaptation attempt
//!    on a randomly chosen candidate; finished attempts become trait gains.
//! 5. **Extinction** -- a signalled extinction marks the creature.
//!
//! Rejected changes are reported in the summary, never raised. A creature
//! whose processor has an open batch cannot be ticked.

use crescent_changes::{ChangeResult, FormChange, TraitChange};
use crescent_stress::{StressState, ThresholdCrossing};
use crescent_synthesis::{Catalyst, TraitTransition};
use crescent_types::{
    CatalystType, ChangeSource, CreatureId, CreatureState, ThresholdKind,
};
use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::SimulationContext;
use crate::creature::Creature;
use crate::error::TickError;

/// Tag carried by changes that gain a stress adaptation.
pub const ADAPTATION_TAG: &str = "adaptation";

/// What one tick did to one creature.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatureTickSummary {
    /// The creature.
    pub creature_id: CreatureId,
    /// Overall stress level after the tick.
    pub stress_level: f32,
    /// First-time threshold crossings.
    pub crossings: Vec<ThresholdCrossing>,
    /// Traits whose stress-driven synthesis began.
    pub syntheses_started: Vec<String>,
    /// Synthesis stage changes.
    pub transitions: Vec<TraitTransition>,
    /// Outcome of every change the tick submitted.
    pub changes: Vec<ChangeResult>,
    /// Adaptations gained.
    pub adaptations: Vec<String>,
    /// Whether extinction was signalled this tick.
    pub extinction: bool,
}

/// Counters of one tick, cheap to log or serialize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickCounts {
    /// Changes applied.
    pub applied: usize,
    /// Changes that did not apply.
    pub rejected: usize,
    /// Threshold crossings.
    pub crossings: usize,
    /// Synthesis stage changes.
    pub transitions: usize,
}

impl CreatureTickSummary {
    /// Counters of this summary.
    pub fn counts(&self) -> TickCounts {
        let applied = self.changes.iter().filter(|r| r.is_applied()).count();
        TickCounts {
            applied,
            rejected: self.changes.len().saturating_sub(applied),
            crossings: self.crossings.len(),
            transitions: self.transitions.len(),
        }
    }
}

/// Advance one creature by `delta_time` in `environment`.
pub fn step_creature(
    context: &SimulationContext,
    creature: &mut Creature,
    environment: &str,
    delta_time: f32,
) -> Result<CreatureTickSummary, TickError> {
    let creature_id = creature.state.id;
    if creature.processor.in_batch() {
        return Err(TickError::BatchOpen {
            creature: creature_id,
        });
    }
    let stress_engine = context.stress();
    let synthesis_engine = context.synthesis();

    // --- Stress ---
    let stress = creature
        .stress
        .get_or_insert_with(|| stress_engine.new_state(creature_id));
    let report = stress_engine
        .process_environmental_stress(stress, &creature.state, environment, delta_time)
        .map_err(|source| TickError::Stress {
            creature: creature_id,
            source,
        })?;
    stress_engine
        .update_resistances(stress, &creature.state, delta_time)
        .map_err(|source| TickError::Stress {
            creature: creature_id,
            source,
        })?;

    // --- Catalysis ---
    let mut syntheses_started = Vec::new();
    for crossing in report
        .crossings
        .iter()
        .filter(|crossing| crossing.kind == ThresholdKind::SynthesisEnabled)
    {
        if creature.synthesis.is_mid_synthesis() {
            break;
        }
        let catalyst = Catalyst::new(CatalystType::Stress, crossing.stressor_id.clone(), crossing.level);
        if let Some(trait_id) = begin_stress_synthesis(context, creature, environment, &catalyst) {
            syntheses_started.push(trait_id);
        }
    }

    let boundary = stress_engine.config().thresholds.synthesis_enabled.value;
    let mut catalysts = std::mem::take(&mut creature.catalysts);
    if let Some(stress) = creature.stress.as_ref() {
        catalysts.extend(stress_catalysts(stress, boundary));
    }
    for catalyst in &catalysts {
        synthesis_engine.record_catalyst_exposure(&mut creature.synthesis, catalyst);
    }

    // --- Synthesis ---
    let progress = synthesis_engine
        .progress(&mut creature.synthesis, &creature.state, delta_time)
        .map_err(|source| TickError::Synthesis {
            creature: creature_id,
            source,
        })?;
    let mut transitions = progress.transitions;
    let mut changes = Vec::with_capacity(progress.changes.len());
    for synthesis in progress.changes {
        let (pending, change) = synthesis.into_parts();
        let result = creature.processor.process_change(&mut creature.state, change);
        if result.is_applied() {
            creature.synthesis.confirm(pending);
        } else {
            warn!(creature = %creature_id, result = ?result, "Synthesis change did not apply");
            transitions.extend(creature.synthesis.reject(pending));
        }
        changes.push(result);
    }

    // --- Adaptation ---
    let mut adaptations = Vec::new();
    if let Some(stress) = creature.stress.as_mut() {
        let mid_synthesis = creature.synthesis.is_mid_synthesis();
        start_adaptations(context, stress, &creature.state, &mut creature.rng, mid_synthesis)?;

        for attempt in stress.take_ready_adaptations() {
            let definition = context.registry().require_trait(&attempt.adaptation)?.clone();
            let change = FormChange::new(ChangeSource::Stress)
                .with_tag(ADAPTATION_TAG)
                .with_description(format!(
                    "adapted to {} by gaining {}",
                    attempt.stressor_id, attempt.adaptation
                ))
                .with_traits(TraitChange::default().gain(definition))
                .probabilistic();
            let result = creature.processor.process_change(&mut creature.state, change);
            if result.is_applied() {
                stress.confirm_adaptation(&attempt.adaptation);
                info!(
                    creature = %creature_id,
                    adaptation = %attempt.adaptation,
                    stressor = %attempt.stressor_id,
                    "Adaptation gained"
                );
                adaptations.push(attempt.adaptation);
            } else {
                warn!(
                    creature = %creature_id,
                    adaptation = %attempt.adaptation,
                    result = ?result,
                    "Adaptation change did not apply"
                );
            }
            changes.push(result);
        }
    }

    // --- Extinction ---
    if report.extinction {
        creature.extinct = true;
    }
    if creature.stress.as_ref().is_some_and(is_spent) {
        debug!(creature = %creature_id, "Stress state no longer applicable");
        creature.stress = None;
    }

    Ok(CreatureTickSummary {
        creature_id,
        stress_level: report.level,
        crossings: report.crossings,
        syntheses_started,
        transitions,
        changes,
        adaptations,
        extinction: report.extinction,
    })
}

/// Stress catalysts from every present stressor at or above `boundary`.
fn stress_catalysts(stress: &StressState, boundary: f32) -> Vec<Catalyst> {
    stress
        .profile
        .active
        .values()
        .filter(|stressor| stressor.present && stressor.level >= boundary)
        .map(|stressor| {
            Catalyst::new(CatalystType::Stress, stressor.stressor_id.clone(), stressor.level)
        })
        .collect()
}

/// Start the most stable stress-driven path any unsuppressed trait offers.
fn begin_stress_synthesis(
    context: &SimulationContext,
    creature: &mut Creature,
    environment: &str,
    catalyst: &Catalyst,
) -> Option<String> {
    let engine = context.synthesis();
    let candidates: Vec<(String, String)> = creature
        .state
        .traits
        .iter()
        .filter(|active| !active.suppressed && active.definition.synthesizable)
        .flat_map(|active| {
            engine
                .potential_paths(&creature.synthesis, &creature.state, active.id())
                .into_iter()
                .filter(|path| {
                    path.key.catalyst == CatalystType::Stress
                        && path.minimum_intensity <= catalyst.intensity
                })
                .map(|path| (active.id().to_owned(), path.key.target_form))
        })
        .collect();

    for (trait_id, target_form) in candidates {
        let result = engine.begin_synthesis(
            &mut creature.synthesis,
            &creature.state,
            &trait_id,
            &target_form,
            catalyst,
            Some(environment),
        );
        if result.success {
            return Some(trait_id);
        }
        debug!(
            creature = %creature.state.id,
            trait_id = %trait_id,
            target_form = %target_form,
            failure = ?result.failure_type(),
            "Stress synthesis candidate refused"
        );
    }
    None
}

/// Start an adaptation attempt for every stressor whose pressure has been
/// sustained long enough, choosing among candidates at random.
fn start_adaptations(
    context: &SimulationContext,
    stress: &mut StressState,
    creature: &CreatureState,
    rng: &mut StdRng,
    mid_synthesis: bool,
) -> Result<(), TickError> {
    let engine = context.stress();
    let stressor_ids: Vec<String> = stress.profile.active.keys().cloned().collect();
    for stressor_id in stressor_ids {
        if !engine.should_trigger_adaptation(stress, &stressor_id, mid_synthesis) {
            continue;
        }
        let candidates = engine.adaptation_candidates(stress, creature, &stressor_id);
        if candidates.is_empty() {
            continue;
        }
        let pick = rng.random_range(0..candidates.len());
        if let Some(adaptation) = candidates.get(pick) {
            engine
                .begin_adaptation(stress, creature, &stressor_id, adaptation)
                .map_err(|source| TickError::Stress {
                    creature: creature.id,
                    source,
                })?;
        }
    }
    Ok(())
}

/// A stress state with nothing active and no resistance gained.
fn is_spent(stress: &StressState) -> bool {
    stress.is_dormant()
        && stress
            .resistance
            .adaptive
            .values()
            .all(|adaptive| adaptive.current_level <= 0.0)
}
