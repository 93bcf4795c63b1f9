//! The synthesis engine: drives every trait's state machine for a creature
//! and turns completions and reversions into [`FormChange`]s.
//!
//! A completion or reversion is only settled in the [`SynthesisBook`] once
//! the caller reports what the creature's processor did with its change:
//! [`SynthesisBook::confirm`] records it, [`SynthesisBook::reject`] rolls
//! the trait back so the book and the creature never disagree.
//!
//! The engine itself holds only shared read-only data. Per-creature state
//! lives in a [`SynthesisBook`] owned by the creature, so one engine serves
//! any number of creatures in parallel.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crescent_changes::{AbilityChange, FormChange, TraitChange};
use crescent_types::{
    ChangePriority, ChangeSource, CreatureState, DefinitionRegistry, SynthesisFailureType,
    SynthesisStage,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SynthesisConfig;
use crate::error::{SynthesisError, SynthesisFailure};
use crate::rules::{PotentialPath, SynthesisOutcome, SynthesisRules};
use crate::state::{
    AppliedOutcome, Catalyst, StageTransition, SynthesisContext, SynthesisResult,
    SynthesisState, TransitionEffect,
};

/// Tag carried by changes that apply a synthesis outcome.
pub const SYNTHESIS_TAG: &str = "synthesis";

/// Tag carried by changes that undo synthesis outcomes.
pub const REVERSION_TAG: &str = "reversion";

/// Running counts of synthesis activity for one creature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisMetrics {
    /// Syntheses that began.
    pub started: u64,
    /// Syntheses whose outcome the creature received.
    pub completed: u64,
    /// Requests that were refused.
    pub failed: u64,
    /// Traits that reverted to their base form.
    pub reverted: u64,
    /// Completions and reversions rolled back because the creature's
    /// processor refused their change.
    pub rolled_back: u64,
}

/// Every synthesis state of one creature, keyed by trait id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisBook {
    states: BTreeMap<String, SynthesisState>,
    metrics: SynthesisMetrics,
}

impl SynthesisBook {
    /// An empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// The state of one trait, if it was ever synthesized.
    pub fn get(&self, trait_id: &str) -> Option<&SynthesisState> {
        self.states.get(trait_id)
    }

    /// Every tracked state.
    pub fn states(&self) -> impl Iterator<Item = &SynthesisState> {
        self.states.values()
    }

    /// Whether any trait is mid-synthesis.
    pub fn is_mid_synthesis(&self) -> bool {
        self.states.values().any(SynthesisState::is_synthesizing)
    }

    /// Activity counters.
    pub const fn metrics(&self) -> SynthesisMetrics {
        self.metrics
    }

    /// Settle a completion or reversion whose change was applied.
    pub fn confirm(&mut self, pending: PendingSynthesis) {
        let Some(state) = self.states.get_mut(&pending.trait_id) else {
            return;
        };
        match pending.kind {
            SynthesisChangeKind::Completion {
                granted_abilities,
                suppressed_traits,
            } => {
                state.confirm_completion(granted_abilities, suppressed_traits);
                self.metrics.completed = self.metrics.completed.saturating_add(1);
                info!(
                    trait_id = %pending.trait_id,
                    form = ?state.current_form(),
                    "Synthesis complete"
                );
            }
            SynthesisChangeKind::Reversion => {
                state.confirm_reversion();
                self.metrics.reverted = self.metrics.reverted.saturating_add(1);
                info!(trait_id = %pending.trait_id, "Synthesis reverted");
            }
        }
    }

    /// Roll back a completion or reversion whose change was refused.
    ///
    /// Returns the stage change the rollback made, if the trait is still
    /// tracked.
    pub fn reject(&mut self, pending: PendingSynthesis) -> Option<TraitTransition> {
        let state = self.states.get_mut(&pending.trait_id)?;
        let transition = state.roll_back()?;
        self.metrics.rolled_back = self.metrics.rolled_back.saturating_add(1);
        warn!(
            trait_id = %pending.trait_id,
            kind = ?pending.kind,
            to = ?transition.to,
            "Synthesis change refused, rolled back"
        );
        Some(TraitTransition {
            trait_id: pending.trait_id,
            transition,
        })
    }
}

/// What a synthesis change carries out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SynthesisChangeKind {
    /// A completed outcome, with exactly what its change grants and
    /// suppresses.
    Completion {
        /// Abilities the change grants.
        granted_abilities: BTreeSet<String>,
        /// Traits the change suppresses.
        suppressed_traits: BTreeSet<String>,
    },
    /// Compensation of every applied outcome.
    Reversion,
}

/// The book-side half of a synthesis change, handed back to
/// [`SynthesisBook::confirm`] or [`SynthesisBook::reject`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSynthesis {
    /// The trait whose stage machine produced the change.
    pub trait_id: String,
    /// What the change does.
    pub kind: SynthesisChangeKind,
}

/// A change the creature's processor should apply, paired with the
/// bookkeeping to settle once it did or did not.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisChange {
    /// Settlement data.
    pub pending: PendingSynthesis,
    /// The change itself.
    pub change: FormChange,
}

impl SynthesisChange {
    /// Split into the settlement data and the change.
    pub fn into_parts(self) -> (PendingSynthesis, FormChange) {
        let Self { pending, change } = self;
        (pending, change)
    }
}

/// A stage change of one trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitTransition {
    /// The trait that moved.
    pub trait_id: String,
    /// The move.
    pub transition: StageTransition,
}

/// Everything one progression step produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesisTick {
    /// Stage changes, in trait id order.
    pub transitions: Vec<TraitTransition>,
    /// Changes the creature's processor should apply, each to be settled
    /// in the book afterwards.
    pub changes: Vec<SynthesisChange>,
}

/// Drives synthesis for creatures against a shared rule table.
#[derive(Debug, Clone)]
pub struct SynthesisEngine {
    rules: Arc<SynthesisRules>,
    registry: Arc<DefinitionRegistry>,
    config: SynthesisConfig,
}

impl SynthesisEngine {
    /// An engine over `rules`, resolving granted abilities in `registry`.
    pub const fn new(
        rules: Arc<SynthesisRules>,
        registry: Arc<DefinitionRegistry>,
        config: SynthesisConfig,
    ) -> Self {
        Self {
            rules,
            registry,
            config,
        }
    }

    /// The rule table.
    pub fn rules(&self) -> &SynthesisRules {
        &self.rules
    }

    /// Active configuration.
    pub const fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Try to start synthesizing `trait_id` towards `target_form`.
    ///
    /// The trait must be held and not suppressed. A refused request on a
    /// trait that had no state leaves the book unchanged apart from the
    /// failure counter.
    pub fn begin_synthesis(
        &self,
        book: &mut SynthesisBook,
        creature: &CreatureState,
        trait_id: &str,
        target_form: &str,
        catalyst: &Catalyst,
        environment: Option<&str>,
    ) -> SynthesisResult {
        let Some(active) = creature.active_trait(trait_id) else {
            book.metrics.failed = book.metrics.failed.saturating_add(1);
            return SynthesisResult::failed(
                SynthesisFailure::new(
                    SynthesisFailureType::Incompatible,
                    format!("creature does not hold trait {trait_id}"),
                ),
                SynthesisStage::None,
                1.0,
            );
        };
        if active.suppressed {
            book.metrics.failed = book.metrics.failed.saturating_add(1);
            return SynthesisResult::failed(
                SynthesisFailure::new(
                    SynthesisFailureType::Incompatible,
                    format!("trait {trait_id} is suppressed"),
                ),
                SynthesisStage::None,
                1.0,
            );
        }

        let fresh = !book.states.contains_key(trait_id);
        let held = creature.trait_ids();
        let context = SynthesisContext {
            definition: &active.definition,
            held_traits: &held,
            environment,
        };
        let state = book.states.entry(trait_id.to_owned()).or_insert_with(|| {
            SynthesisState::new(trait_id, active.form.clone(), self.config.history_capacity)
        });
        let result = state.begin_synthesis(&self.rules, &context, target_form, catalyst);

        if result.success {
            book.metrics.started = book.metrics.started.saturating_add(1);
            info!(
                creature = %creature.id,
                trait_id,
                target_form,
                catalyst = ?catalyst.catalyst_type,
                "Synthesis started"
            );
        } else {
            book.metrics.failed = book.metrics.failed.saturating_add(1);
            if fresh {
                book.states.remove(trait_id);
            }
        }
        result
    }

    /// Feed a catalyst to every tracked trait of a creature.
    pub fn record_catalyst_exposure(&self, book: &mut SynthesisBook, catalyst: &Catalyst) {
        for state in book.states.values_mut() {
            state.record_catalyst_exposure(catalyst);
        }
    }

    /// Advance every tracked trait by `delta_time`.
    ///
    /// States of traits the creature no longer holds are dropped first.
    /// Completions and reversions yield changes for the caller to route
    /// through the creature's change processor and then settle with
    /// [`SynthesisBook::confirm`] or [`SynthesisBook::reject`].
    pub fn progress(
        &self,
        book: &mut SynthesisBook,
        creature: &CreatureState,
        delta_time: f32,
    ) -> Result<SynthesisTick, SynthesisError> {
        if !delta_time.is_finite() || delta_time < 0.0 {
            return Err(SynthesisError::InvalidDelta { delta_time });
        }

        book.states.retain(|trait_id, _| {
            let held = creature.has_trait(trait_id);
            if !held {
                debug!(creature = %creature.id, trait_id, "Dropping synthesis of lost trait");
            }
            held
        });

        let mut tick = SynthesisTick::default();
        for (trait_id, state) in &mut book.states {
            let Some(transition) = state.progress_synthesis(&self.rules, &self.config, delta_time)
            else {
                continue;
            };
            debug!(
                creature = %creature.id,
                trait_id = %trait_id,
                from = ?transition.from,
                to = ?transition.to,
                "Synthesis stage changed"
            );
            match &transition.effect {
                Some(TransitionEffect::Completed { form, outcome }) => {
                    debug!(
                        creature = %creature.id,
                        trait_id = %trait_id,
                        form = %form,
                        "Synthesis reached its target form"
                    );
                    tick.changes
                        .push(self.outcome_change(creature, trait_id, form, outcome));
                }
                Some(TransitionEffect::Reverted { outcomes }) => {
                    debug!(creature = %creature.id, trait_id = %trait_id, "Synthesis lapsed");
                    tick.changes.push(reversion_change(
                        creature,
                        trait_id,
                        state.current_form(),
                        outcomes,
                    ));
                }
                None => {}
            }
            tick.transitions.push(TraitTransition {
                trait_id: trait_id.clone(),
                transition,
            });
        }
        Ok(tick)
    }

    /// Paths the trait could take next, most stable first.
    pub fn potential_paths(
        &self,
        book: &SynthesisBook,
        creature: &CreatureState,
        trait_id: &str,
    ) -> Vec<PotentialPath> {
        match book.get(trait_id) {
            Some(state) => self
                .rules
                .potential_paths(state.source_form(), state.synthesis_level()),
            None => {
                let source = creature
                    .active_trait(trait_id)
                    .and_then(|active| active.form.as_deref())
                    .unwrap_or(trait_id);
                self.rules.potential_paths(source, 0)
            }
        }
    }

    fn outcome_change(
        &self,
        creature: &CreatureState,
        trait_id: &str,
        form: &str,
        outcome: &SynthesisOutcome,
    ) -> SynthesisChange {
        let mut traits = TraitChange::default().set_form(trait_id, Some(form.to_owned()));
        let mut suppressed_traits = BTreeSet::new();
        for suppressed in &outcome.suppressed_traits {
            if suppressed != trait_id
                && creature.has_trait(suppressed)
                && !creature.is_suppressed(suppressed)
            {
                traits = traits.suppress(suppressed.clone());
                suppressed_traits.insert(suppressed.clone());
            }
        }

        let mut abilities = AbilityChange::default();
        let mut granted_abilities = BTreeSet::new();
        for ability_id in &outcome.granted_abilities {
            if creature.has_ability(ability_id) {
                continue;
            }
            match self.registry.get_ability(ability_id) {
                Some(definition) => {
                    abilities = abilities.grant(definition.clone());
                    granted_abilities.insert(ability_id.clone());
                }
                None => warn!(ability_id = %ability_id, "Synthesis grants an unknown ability"),
            }
        }

        let mut change = FormChange::new(ChangeSource::Synthesis)
            .with_priority(ChangePriority::High)
            .with_tag(SYNTHESIS_TAG)
            .with_description(format!("{trait_id} synthesized into {form}"))
            .with_traits(traits);
        if !abilities.is_empty() {
            change = change.with_abilities(abilities);
        }
        SynthesisChange {
            pending: PendingSynthesis {
                trait_id: trait_id.to_owned(),
                kind: SynthesisChangeKind::Completion {
                    granted_abilities,
                    suppressed_traits,
                },
            },
            change,
        }
    }
}

/// Undo exactly the effects the applied outcomes recorded.
fn reversion_change(
    creature: &CreatureState,
    trait_id: &str,
    base_form: Option<&str>,
    outcomes: &[AppliedOutcome],
) -> SynthesisChange {
    let mut traits = TraitChange::default().set_form(trait_id, base_form.map(str::to_owned));
    let mut abilities = AbilityChange::default();
    let restored: BTreeSet<&String> = outcomes
        .iter()
        .flat_map(|applied| &applied.suppressed_traits)
        .filter(|id| creature.is_suppressed(id))
        .collect();
    for id in restored {
        traits = traits.restore(id.clone());
    }
    let revoked: BTreeSet<&String> = outcomes
        .iter()
        .flat_map(|applied| &applied.granted_abilities)
        .filter(|id| creature.has_ability(id))
        .collect();
    for id in revoked {
        abilities = abilities.revoke(id.clone());
    }

    let mut change = FormChange::new(ChangeSource::Synthesis)
        .with_priority(ChangePriority::Critical)
        .with_tag(REVERSION_TAG)
        .with_description(format!("{trait_id} reverted to its base form"))
        .with_traits(traits);
    if !abilities.is_empty() {
        change = change.with_abilities(abilities);
    }
    SynthesisChange {
        pending: PendingSynthesis {
            trait_id: trait_id.to_owned(),
            kind: SynthesisChangeKind::Reversion,
        },
        change,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rules::{SynthesisPathKey, SynthesisRequirement};
    use crescent_changes::{ChangeConfig, ChangeProcessor};
    use crescent_types::{AbilityDefinition, CatalystType, TraitDefinition};

    fn engine() -> SynthesisEngine {
        engine_with(SynthesisConfig::default())
    }

    fn engine_with(config: SynthesisConfig) -> SynthesisEngine {
        let mut registry = DefinitionRegistry::new();
        registry
            .register_ability(AbilityDefinition::new("lava_wade", "Lava Wade", 0.4))
            .unwrap();
        let mut rules = SynthesisRules::new();
        rules
            .register_path(
                SynthesisPathKey::new("fireproof", CatalystType::Environmental, "magma_skin"),
                SynthesisRequirement::new(0.5),
                SynthesisOutcome::new("magma_skin")
                    .grants("lava_wade")
                    .suppresses("thick_fur"),
            )
            .unwrap();
        SynthesisEngine::new(Arc::new(rules), Arc::new(registry), config)
    }

    fn creature() -> CreatureState {
        CreatureState::new("Ember")
            .with_trait(TraitDefinition::new("fireproof", "Fireproof"))
            .with_trait(TraitDefinition::new("thick_fur", "Thick Fur"))
    }

    fn heat() -> Catalyst {
        Catalyst::new(CatalystType::Environmental, "lava_vent", 0.8)
    }

    /// Run until a change appears, applying it through a processor and
    /// settling it in the book.
    fn run_until_change(
        engine: &SynthesisEngine,
        book: &mut SynthesisBook,
        creature: &mut CreatureState,
        processor: &mut ChangeProcessor,
        catalyst: Option<&Catalyst>,
    ) -> bool {
        for _ in 0..20 {
            if let Some(catalyst) = catalyst {
                engine.record_catalyst_exposure(book, catalyst);
            }
            let tick = engine.progress(book, creature, 1.0).unwrap();
            if !tick.changes.is_empty() {
                for synthesis in tick.changes {
                    let (pending, change) = synthesis.into_parts();
                    assert!(processor.process_change(creature, change).is_applied());
                    book.confirm(pending);
                }
                return true;
            }
        }
        false
    }

    #[test]
    fn weak_catalyst_leaves_no_state_behind() {
        let engine = engine();
        let creature = creature();
        let mut book = SynthesisBook::new();
        let weak = Catalyst::new(CatalystType::Environmental, "ember", 0.1);
        let result = engine.begin_synthesis(&mut book, &creature, "fireproof", "magma_skin", &weak, None);
        assert_eq!(result.failure_type(), Some(SynthesisFailureType::CatalystWeak));
        assert_eq!(result.stage, SynthesisStage::None);
        assert!(book.get("fireproof").is_none());
        assert_eq!(book.metrics().failed, 1);
    }

    #[test]
    fn unheld_trait_is_incompatible() {
        let engine = engine();
        let mut book = SynthesisBook::new();
        let result = engine.begin_synthesis(
            &mut book,
            &CreatureState::new("Bare"),
            "fireproof",
            "magma_skin",
            &heat(),
            None,
        );
        assert_eq!(result.failure_type(), Some(SynthesisFailureType::Incompatible));
    }

    #[test]
    fn completion_applies_outcome_and_reversion_undoes_it() {
        let engine = engine_with(SynthesisConfig {
            complete_decay_rate: 0.5,
            ..SynthesisConfig::default()
        });
        let mut creature = creature();
        let mut book = SynthesisBook::new();
        let mut processor = ChangeProcessor::new(ChangeConfig::default());

        let result =
            engine.begin_synthesis(&mut book, &creature, "fireproof", "magma_skin", &heat(), None);
        assert!(result.success);
        assert!(book.is_mid_synthesis());

        assert!(run_until_change(&engine, &mut book, &mut creature, &mut processor, Some(&heat())));
        let fireproof = creature.active_trait("fireproof").unwrap();
        assert_eq!(fireproof.form.as_deref(), Some("magma_skin"));
        assert!(creature.is_suppressed("thick_fur"));
        assert!(creature.has_ability("lava_wade"));
        assert_eq!(book.metrics().completed, 1);
        assert!(!book.is_mid_synthesis());

        assert!(run_until_change(&engine, &mut book, &mut creature, &mut processor, None));
        let fireproof = creature.active_trait("fireproof").unwrap();
        assert_eq!(fireproof.form, None);
        assert!(!creature.is_suppressed("thick_fur"));
        assert!(!creature.has_ability("lava_wade"));
        assert_eq!(book.metrics().reverted, 1);
        assert_eq!(book.get("fireproof").unwrap().stage(), SynthesisStage::None);
    }

    #[test]
    fn reversion_leaves_effects_held_before_the_synthesis() {
        let engine = engine_with(SynthesisConfig {
            complete_decay_rate: 0.5,
            ..SynthesisConfig::default()
        });
        let mut creature = creature()
            .with_ability(AbilityDefinition::new("lava_wade", "Lava Wade", 0.4));
        creature
            .traits
            .iter_mut()
            .find(|t| t.id() == "thick_fur")
            .unwrap()
            .suppressed = true;
        let mut book = SynthesisBook::new();
        let mut processor = ChangeProcessor::new(ChangeConfig::default());

        engine.begin_synthesis(&mut book, &creature, "fireproof", "magma_skin", &heat(), None);
        assert!(run_until_change(&engine, &mut book, &mut creature, &mut processor, Some(&heat())));
        let applied = &book.get("fireproof").unwrap().applied_outcomes()[0];
        assert!(applied.granted_abilities.is_empty());
        assert!(applied.suppressed_traits.is_empty());

        assert!(run_until_change(&engine, &mut book, &mut creature, &mut processor, None));
        assert_eq!(creature.active_trait("fireproof").unwrap().form, None);
        assert!(creature.has_ability("lava_wade"));
        assert!(creature.is_suppressed("thick_fur"));
    }

    #[test]
    fn refused_completion_leaves_book_and_creature_agreeing() {
        let engine = engine();
        let creature = creature();
        let mut book = SynthesisBook::new();
        engine.begin_synthesis(&mut book, &creature, "fireproof", "magma_skin", &heat(), None);

        let mut rolled_back = None;
        for _ in 0..20 {
            engine.record_catalyst_exposure(&mut book, &heat());
            let tick = engine.progress(&mut book, &creature, 1.0).unwrap();
            if let Some(synthesis) = tick.changes.into_iter().next() {
                rolled_back = book.reject(synthesis.pending);
                break;
            }
        }

        let transition = rolled_back.unwrap();
        assert_eq!(transition.trait_id, "fireproof");
        assert_eq!(transition.transition.to, SynthesisStage::None);
        let state = book.get("fireproof").unwrap();
        assert_eq!(state.current_form(), None);
        assert!(state.applied_outcomes().is_empty());
        assert_eq!(book.metrics().completed, 0);
        assert_eq!(book.metrics().rolled_back, 1);

        assert!(engine.progress(&mut book, &creature, 1.0).unwrap().changes.is_empty());
        assert!(!creature.has_ability("lava_wade"));
    }

    #[test]
    fn lost_trait_drops_its_state() {
        let engine = engine();
        let creature = creature();
        let mut book = SynthesisBook::new();
        engine.begin_synthesis(&mut book, &creature, "fireproof", "magma_skin", &heat(), None);

        let stripped = CreatureState::new("Ember");
        let tick = engine.progress(&mut book, &stripped, 1.0).unwrap();
        assert!(tick.transitions.is_empty());
        assert!(book.get("fireproof").is_none());
    }

    #[test]
    fn invalid_delta_is_rejected() {
        let engine = engine();
        let mut book = SynthesisBook::new();
        let err = engine.progress(&mut book, &creature(), f32::NAN).unwrap_err();
        assert!(matches!(err, SynthesisError::InvalidDelta { .. }));
    }

    #[test]
    fn potential_paths_follow_current_form() {
        let engine = engine();
        let book = SynthesisBook::new();
        let paths = engine.potential_paths(&book, &creature(), "fireproof");
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].key.target_form, "magma_skin");
        assert!(engine.potential_paths(&book, &creature(), "thick_fur").is_empty());
    }
}
