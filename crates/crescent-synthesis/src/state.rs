//! Per-trait synthesis state machine.
//!
//! ```text
//! None -> Initiating -> Forming -> Stabilizing -> Complete
//!             \            \            \            \
//!              +------------+------------+------------+--> Degrading -> Critical
//!                                                               |           |
//!                          recovery: back to the interrupted stage          |
//!                          grace expired: revert to None <------------------+
//! ```
//!
//! [`progress_synthesis`](SynthesisState::progress_synthesis) performs at
//! most one transition per call. Catalyst exposure recorded between calls
//! is summed, so several sources within one tick accumulate.
//!
//! Completion and reversion keep a checkpoint until the creature-side change
//! is settled, so a refused change can be rolled back.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use crescent_types::{
    CatalystType, StabilityClass, SynthesisFailureType, SynthesisStage, TraitDefinition, clamp_unit,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SynthesisConfig;
use crate::error::SynthesisFailure;
use crate::rules::{RequirementCheck, SynthesisOutcome, SynthesisPathKey, SynthesisRules};

/// A catalyst offered to a synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalyst {
    /// Catalyst category.
    pub catalyst_type: CatalystType,
    /// Specific source, such as a stressor or item id.
    pub catalyst_id: String,
    /// Intensity in `[0, 1]`.
    pub intensity: f32,
}

impl Catalyst {
    /// A catalyst of `catalyst_type` from `catalyst_id`.
    pub fn new(catalyst_type: CatalystType, catalyst_id: impl Into<String>, intensity: f32) -> Self {
        Self {
            catalyst_type,
            catalyst_id: catalyst_id.into(),
            intensity,
        }
    }
}

/// Numeric progress of a synthesis, every field in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynthesisProgress {
    /// How far forming has come.
    pub completion_level: f32,
    /// Current stability.
    pub stability_factor: f32,
    /// Strength of the driving catalyst.
    pub catalyst_strength: f32,
}

impl Default for SynthesisProgress {
    fn default() -> Self {
        Self {
            completion_level: 0.0,
            stability_factor: 1.0,
            catalyst_strength: 0.0,
        }
    }
}

/// The path a synthesis is following.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivePath {
    /// Rule table key.
    pub key: SynthesisPathKey,
    /// Catalyst source that began it.
    pub catalyst_id: String,
    /// Completion at which forming ends.
    pub formation_threshold: f32,
    /// Outcome stability modifier.
    pub stability_modifier: f32,
}

/// What happened in a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SynthesisEventKind {
    /// A synthesis began.
    Began,
    /// The stage changed.
    StageChanged {
        /// Stage left.
        from: SynthesisStage,
        /// Stage entered.
        to: SynthesisStage,
    },
    /// The target form was reached.
    Completed,
    /// The trait reverted to its base form.
    Reverted,
}

/// One entry of a synthesis' history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisEvent {
    /// What happened.
    pub kind: SynthesisEventKind,
    /// Form before the synthesis.
    pub source_form: String,
    /// Form being synthesized.
    pub target_form: String,
    /// Catalyst type driving it.
    pub catalyst: CatalystType,
    /// Catalyst source.
    pub catalyst_id: String,
    /// Catalyst strength at the time.
    pub intensity: f32,
    /// Simulation time of the event.
    pub elapsed: f32,
    /// Wall-clock time of the event.
    pub recorded_at: DateTime<Utc>,
}

/// Accumulated influence of one catalyst type on a trait.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalystInfluence {
    /// Current influence in `[0, 1]`, decaying while unexposed.
    pub current: f32,
    /// Highest influence seen.
    pub peak: f32,
    /// Number of exposures.
    pub exposure_count: u32,
    /// Forms the trait was in when exposed.
    pub affected_forms: BTreeSet<String>,
    /// Total intensity per catalyst source.
    pub totals: BTreeMap<String, f32>,
}

/// An outcome the creature received, with the effects its change carried.
///
/// Effects are filled in once the creature's processor applied the
/// completion change. Only these are compensated on reversion, so
/// abilities and suppressions the creature had before are left alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedOutcome {
    /// The path outcome.
    pub outcome: SynthesisOutcome,
    /// Abilities the completion change granted.
    pub granted_abilities: BTreeSet<String>,
    /// Traits the completion change suppressed.
    pub suppressed_traits: BTreeSet<String>,
}

impl AppliedOutcome {
    /// An outcome with no recorded effects yet.
    pub const fn new(outcome: SynthesisOutcome) -> Self {
        Self {
            outcome,
            granted_abilities: BTreeSet::new(),
            suppressed_traits: BTreeSet::new(),
        }
    }
}

/// Fields restored when the change of a transition is refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Checkpoint {
    current_form: Option<String>,
    stage: SynthesisStage,
    stability: StabilityClass,
    progress: SynthesisProgress,
    active: Option<ActivePath>,
    resume_stage: SynthesisStage,
    synthesis_level: u32,
    permanent: bool,
    applied: Vec<AppliedOutcome>,
}

/// Side effect of a transition the creature must see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransitionEffect {
    /// The outcome should be applied.
    Completed {
        /// Trait's new form.
        form: String,
        /// Outcome to apply.
        outcome: SynthesisOutcome,
    },
    /// Applied outcomes should be undone.
    Reverted {
        /// Outcomes applied since the trait left its base form, oldest first.
        outcomes: Vec<AppliedOutcome>,
    },
}

/// A stage change produced by one progression step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTransition {
    /// Stage left.
    pub from: SynthesisStage,
    /// Stage entered.
    pub to: SynthesisStage,
    /// Effect to carry out, if any.
    pub effect: Option<TransitionEffect>,
}

/// The creature-side facts needed to begin a synthesis.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisContext<'a> {
    /// Definition of the trait being synthesized.
    pub definition: &'a TraitDefinition,
    /// Every trait id the creature holds.
    pub held_traits: &'a BTreeSet<String>,
    /// Environment the creature is in.
    pub environment: Option<&'a str>,
}

/// Answer to a request to begin a synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    /// Whether the synthesis began.
    pub success: bool,
    /// Why not, when it did not.
    pub failure: Option<SynthesisFailure>,
    /// Stage after the request.
    pub stage: SynthesisStage,
    /// Stability after the request.
    pub stability: f32,
}

impl SynthesisResult {
    /// The failure category, if the request failed.
    pub fn failure_type(&self) -> Option<SynthesisFailureType> {
        self.failure.as_ref().map(|failure| failure.failure_type)
    }

    pub(crate) const fn failed(failure: SynthesisFailure, stage: SynthesisStage, stability: f32) -> Self {
        Self {
            success: false,
            failure: Some(failure),
            stage,
            stability,
        }
    }
}

/// Synthesis bookkeeping for one trait of one creature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisState {
    trait_id: String,
    base_form: Option<String>,
    current_form: Option<String>,
    stage: SynthesisStage,
    stability: StabilityClass,
    progress: SynthesisProgress,
    active: Option<ActivePath>,
    resume_stage: SynthesisStage,
    stage_time: f32,
    stable_time: f32,
    pending_exposure: f32,
    synthesis_level: u32,
    permanent: bool,
    applied: Vec<AppliedOutcome>,
    checkpoint: Option<Checkpoint>,
    history: VecDeque<SynthesisEvent>,
    history_capacity: usize,
    influences: BTreeMap<CatalystType, CatalystInfluence>,
    elapsed: f32,
}

impl SynthesisState {
    /// An idle state for `trait_id`, currently in `form`.
    pub fn new(trait_id: impl Into<String>, form: Option<String>, history_capacity: usize) -> Self {
        Self {
            trait_id: trait_id.into(),
            base_form: form.clone(),
            current_form: form,
            stage: SynthesisStage::None,
            stability: StabilityClass::Stable,
            progress: SynthesisProgress::default(),
            active: None,
            resume_stage: SynthesisStage::None,
            stage_time: 0.0,
            stable_time: 0.0,
            pending_exposure: 0.0,
            synthesis_level: 0,
            permanent: false,
            applied: Vec::new(),
            checkpoint: None,
            history: VecDeque::with_capacity(history_capacity),
            history_capacity,
            influences: BTreeMap::new(),
            elapsed: 0.0,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The trait this state tracks.
    pub fn trait_id(&self) -> &str {
        &self.trait_id
    }

    /// The trait's current form, if any.
    pub fn current_form(&self) -> Option<&str> {
        self.current_form.as_deref()
    }

    /// Form used as the source of the next path.
    pub fn source_form(&self) -> &str {
        self.current_form.as_deref().unwrap_or(&self.trait_id)
    }

    /// Current stage.
    pub const fn stage(&self) -> SynthesisStage {
        self.stage
    }

    /// Current stability class.
    pub const fn stability(&self) -> StabilityClass {
        self.stability
    }

    /// Numeric progress.
    pub const fn progress(&self) -> SynthesisProgress {
        self.progress
    }

    /// The path being followed, if any.
    pub const fn active_path(&self) -> Option<&ActivePath> {
        self.active.as_ref()
    }

    /// Syntheses completed since the trait left its base form.
    pub const fn synthesis_level(&self) -> u32 {
        self.synthesis_level
    }

    /// Outcomes applied since the trait left its base form, oldest first.
    pub fn applied_outcomes(&self) -> &[AppliedOutcome] {
        &self.applied
    }

    /// Whether a synthesis is under way.
    pub const fn is_synthesizing(&self) -> bool {
        self.stage.is_in_progress()
    }

    /// Whether the trait has anything to revert.
    pub fn can_revert(&self) -> bool {
        !self.permanent && !self.applied.is_empty()
    }

    /// Whether the trait reached its maximum synthesis level.
    pub const fn has_reached_max_level(&self, definition: &TraitDefinition) -> bool {
        self.synthesis_level >= definition.max_synthesis_level
    }

    /// Up to `count` events, newest first, optionally of one catalyst type.
    pub fn history(&self, count: usize, catalyst: Option<CatalystType>) -> Vec<&SynthesisEvent> {
        self.history
            .iter()
            .rev()
            .filter(|event| catalyst.is_none_or(|kind| event.catalyst == kind))
            .take(count)
            .collect()
    }

    /// The last completion, if any is still recorded.
    pub fn last_synthesis(&self) -> Option<&SynthesisEvent> {
        self.history
            .iter()
            .rev()
            .find(|event| event.kind == SynthesisEventKind::Completed)
    }

    /// Current influence of a catalyst type, zero if never seen.
    pub fn catalyst_influence(&self, catalyst: CatalystType) -> f32 {
        self.influences
            .get(&catalyst)
            .map_or(0.0, |influence| influence.current)
    }

    /// Full influence record of a catalyst type.
    pub fn influence(&self, catalyst: CatalystType) -> Option<&CatalystInfluence> {
        self.influences.get(&catalyst)
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Try to start synthesizing towards `target_form`.
    ///
    /// Allowed from `None` and from a non-permanent `Complete`, where the
    /// new path starts from the completed form. Checks run in a fixed
    /// order: systemic input, stage and trait eligibility, then the path
    /// requirement. The triggering catalyst starts the synthesis but does
    /// not count as exposure for the first progression step.
    pub fn begin_synthesis(
        &mut self,
        rules: &SynthesisRules,
        context: &SynthesisContext<'_>,
        target_form: &str,
        catalyst: &Catalyst,
    ) -> SynthesisResult {
        match self.try_begin(rules, context, target_form, catalyst) {
            Ok(()) => SynthesisResult {
                success: true,
                failure: None,
                stage: self.stage,
                stability: self.progress.stability_factor,
            },
            Err(failure) => {
                debug!(
                    trait_id = %self.trait_id,
                    target_form,
                    failure = ?failure.failure_type,
                    "Synthesis refused"
                );
                SynthesisResult::failed(failure, self.stage, self.progress.stability_factor)
            }
        }
    }

    fn try_begin(
        &mut self,
        rules: &SynthesisRules,
        context: &SynthesisContext<'_>,
        target_form: &str,
        catalyst: &Catalyst,
    ) -> Result<(), SynthesisFailure> {
        if !catalyst.intensity.is_finite() || catalyst.intensity < 0.0 {
            return Err(SynthesisFailure::new(
                SynthesisFailureType::SystemicFailure,
                format!("catalyst intensity {} is not a valid level", catalyst.intensity),
            ));
        }
        if self.stage.is_in_progress() {
            return Err(SynthesisFailure::new(
                SynthesisFailureType::Incompatible,
                format!("synthesis already in progress at {:?}", self.stage),
            ));
        }
        if self.permanent {
            return Err(SynthesisFailure::new(
                SynthesisFailureType::Incompatible,
                format!("form {} is permanent", self.source_form()),
            ));
        }
        if !context.definition.synthesizable {
            return Err(SynthesisFailure::new(
                SynthesisFailureType::Incompatible,
                format!("trait {} cannot be synthesized", self.trait_id),
            ));
        }
        if self.has_reached_max_level(context.definition) {
            return Err(SynthesisFailure::new(
                SynthesisFailureType::Requirements,
                format!(
                    "trait {} is at its maximum synthesis level {}",
                    self.trait_id, self.synthesis_level
                ),
            ));
        }

        let intensity = clamp_unit(catalyst.intensity);
        let key = SynthesisPathKey::new(self.source_form(), catalyst.catalyst_type, target_form);
        let check = RequirementCheck {
            intensity,
            stability: self.progress.stability_factor,
            level: self.synthesis_level,
            held_traits: context.held_traits,
            environment: context.environment,
        };
        let path = rules.evaluate(&key, &check)?;
        let modifier = path.outcome.stability_modifier;

        self.checkpoint = Some(self.snapshot());
        self.active = Some(ActivePath {
            key,
            catalyst_id: catalyst.catalyst_id.clone(),
            formation_threshold: path.requirement.formation_threshold,
            stability_modifier: modifier,
        });
        self.progress = SynthesisProgress {
            completion_level: 0.0,
            stability_factor: rules.calculate_stability(modifier, self.synthesis_level, intensity),
            catalyst_strength: intensity,
        };
        self.record_catalyst_exposure(catalyst);
        self.pending_exposure = 0.0;
        self.record_event(SynthesisEventKind::Began);
        self.enter(SynthesisStage::Initiating);
        debug!(
            trait_id = %self.trait_id,
            target_form,
            catalyst = ?catalyst.catalyst_type,
            intensity,
            "Synthesis began"
        );
        Ok(())
    }

    /// Record exposure to a catalyst.
    ///
    /// Every exposure feeds the catalyst influence record. Exposure of the
    /// active path's catalyst type also accumulates towards the next
    /// progression step.
    pub fn record_catalyst_exposure(&mut self, catalyst: &Catalyst) {
        if !catalyst.intensity.is_finite() {
            return;
        }
        let intensity = clamp_unit(catalyst.intensity);
        let form = self.source_form().to_owned();

        let influence = self.influences.entry(catalyst.catalyst_type).or_default();
        influence.current = clamp_unit(influence.current + intensity);
        influence.peak = influence.peak.max(influence.current);
        influence.exposure_count = influence.exposure_count.saturating_add(1);
        influence.affected_forms.insert(form);
        *influence
            .totals
            .entry(catalyst.catalyst_id.clone())
            .or_insert(0.0) += intensity;

        if self
            .active
            .as_ref()
            .is_some_and(|active| active.key.catalyst == catalyst.catalyst_type)
        {
            self.pending_exposure += intensity;
        }
    }

    /// Advance time-dependent fields by `delta_time`, performing at most one
    /// stage transition.
    pub fn progress_synthesis(
        &mut self,
        rules: &SynthesisRules,
        config: &SynthesisConfig,
        delta_time: f32,
    ) -> Option<StageTransition> {
        self.elapsed += delta_time;
        self.stage_time += delta_time;
        for influence in self.influences.values_mut() {
            influence.current = clamp_unit(influence.current - config.catalyst_decay * delta_time);
        }

        let exposure = std::mem::take(&mut self.pending_exposure);
        let exposed = exposure >= config.exposure_floor;
        self.progress.catalyst_strength = if exposed {
            clamp_unit(exposure)
        } else {
            clamp_unit(self.progress.catalyst_strength - config.catalyst_decay * delta_time)
        };

        let transition = match self.stage {
            SynthesisStage::None => None,
            SynthesisStage::Initiating => {
                if exposed {
                    Some(self.enter(SynthesisStage::Forming))
                } else {
                    Some(self.degrade())
                }
            }
            SynthesisStage::Forming => self.step_forming(rules, config, delta_time, exposed),
            SynthesisStage::Stabilizing => self.step_stabilizing(rules, config, delta_time, exposed),
            SynthesisStage::Complete => self.step_complete(rules, config, delta_time, exposed),
            SynthesisStage::Degrading => self.step_degrading(rules, config, delta_time, exposed),
            SynthesisStage::Critical => self.step_critical(rules, config, exposed),
        };
        self.stability = self.classify(config);
        transition
    }

    /// Record the effects the applied completion change carried.
    ///
    /// Settles the latest completion; does nothing if none is pending.
    pub fn confirm_completion(
        &mut self,
        granted_abilities: BTreeSet<String>,
        suppressed_traits: BTreeSet<String>,
    ) {
        if self.checkpoint.take().is_none() || self.stage != SynthesisStage::Complete {
            return;
        }
        if let Some(applied) = self.applied.last_mut() {
            applied.granted_abilities = granted_abilities;
            applied.suppressed_traits = suppressed_traits;
        }
    }

    /// Settle the latest reversion once its change was applied.
    pub fn confirm_reversion(&mut self) {
        self.checkpoint = None;
    }

    /// Undo the latest completion or reversion after its change was refused.
    ///
    /// A refused completion returns the trait to where it was before the
    /// synthesis began. A refused reversion puts the trait back in
    /// `Critical` with its outcomes, so the reversion is retried once the
    /// grace period expires again.
    pub fn roll_back(&mut self) -> Option<StageTransition> {
        let checkpoint = self.checkpoint.take()?;
        self.current_form = checkpoint.current_form;
        self.stability = checkpoint.stability;
        self.progress = checkpoint.progress;
        self.active = checkpoint.active;
        self.resume_stage = checkpoint.resume_stage;
        self.synthesis_level = checkpoint.synthesis_level;
        self.permanent = checkpoint.permanent;
        self.applied = checkpoint.applied;
        self.pending_exposure = 0.0;
        let transition = self.enter(checkpoint.stage);
        debug!(
            trait_id = %self.trait_id,
            from = ?transition.from,
            to = ?transition.to,
            "Synthesis rolled back"
        );
        Some(transition)
    }

    fn step_forming(
        &mut self,
        rules: &SynthesisRules,
        config: &SynthesisConfig,
        delta_time: f32,
        exposed: bool,
    ) -> Option<StageTransition> {
        if !exposed {
            return Some(self.degrade());
        }
        self.progress.completion_level = clamp_unit(
            self.progress.completion_level
                + config.formation_rate * self.progress.catalyst_strength * delta_time,
        );
        self.recompute_stability(rules);
        if self.progress.stability_factor < config.fluctuating_boundary {
            return Some(self.degrade());
        }
        let threshold = self
            .active
            .as_ref()
            .map_or(1.0, |active| active.formation_threshold);
        (self.progress.completion_level >= threshold).then(|| self.enter(SynthesisStage::Stabilizing))
    }

    fn step_stabilizing(
        &mut self,
        rules: &SynthesisRules,
        config: &SynthesisConfig,
        delta_time: f32,
        exposed: bool,
    ) -> Option<StageTransition> {
        if !exposed {
            return Some(self.degrade());
        }
        self.recompute_stability(rules);
        if self.progress.stability_factor < config.fluctuating_boundary {
            return Some(self.degrade());
        }
        if self.progress.stability_factor >= config.stable_boundary {
            self.stable_time += delta_time;
            if self.stable_time >= config.stabilize_duration {
                return Some(self.complete(rules));
            }
        } else {
            self.stable_time = 0.0;
        }
        None
    }

    fn step_complete(
        &mut self,
        rules: &SynthesisRules,
        config: &SynthesisConfig,
        delta_time: f32,
        exposed: bool,
    ) -> Option<StageTransition> {
        if self.permanent {
            return None;
        }
        if exposed {
            let renewed = self.computed_stability(rules);
            self.progress.stability_factor = self.progress.stability_factor.max(renewed);
        } else {
            self.progress.stability_factor = clamp_unit(
                self.progress.stability_factor - config.complete_decay_rate * delta_time,
            );
        }
        (self.progress.stability_factor < config.fluctuating_boundary).then(|| self.degrade())
    }

    fn step_degrading(
        &mut self,
        rules: &SynthesisRules,
        config: &SynthesisConfig,
        delta_time: f32,
        exposed: bool,
    ) -> Option<StageTransition> {
        if exposed && self.computed_stability(rules) >= config.fluctuating_boundary {
            self.recompute_stability(rules);
            return Some(self.enter(self.resume_stage));
        }
        let loss = config.degrade_rate * delta_time;
        self.progress.stability_factor = clamp_unit(self.progress.stability_factor - loss);
        if self.resume_stage != SynthesisStage::Complete {
            self.progress.completion_level = clamp_unit(self.progress.completion_level - loss);
        }
        (self.stage_time >= config.degrade_duration).then(|| self.enter(SynthesisStage::Critical))
    }

    fn step_critical(
        &mut self,
        rules: &SynthesisRules,
        config: &SynthesisConfig,
        exposed: bool,
    ) -> Option<StageTransition> {
        if exposed && self.computed_stability(rules) >= config.fluctuating_boundary {
            self.recompute_stability(rules);
            return Some(self.enter(self.resume_stage));
        }
        (self.stage_time >= config.critical_grace).then(|| self.revert())
    }

    fn computed_stability(&self, rules: &SynthesisRules) -> f32 {
        let modifier = self
            .active
            .as_ref()
            .map_or(1.0, |active| active.stability_modifier);
        rules.calculate_stability(modifier, self.synthesis_level, self.progress.catalyst_strength)
    }

    fn recompute_stability(&mut self, rules: &SynthesisRules) {
        self.progress.stability_factor = self.computed_stability(rules);
    }

    fn classify(&self, config: &SynthesisConfig) -> StabilityClass {
        let stability = self.progress.stability_factor;
        if self.permanent {
            StabilityClass::Permanent
        } else if self.stage == SynthesisStage::None {
            StabilityClass::Stable
        } else if stability >= config.reinforced_boundary {
            StabilityClass::Reinforced
        } else if stability >= config.stable_boundary {
            StabilityClass::Stable
        } else if stability >= config.fluctuating_boundary {
            StabilityClass::Fluctuating
        } else {
            StabilityClass::Unstable
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn enter(&mut self, stage: SynthesisStage) -> StageTransition {
        let from = self.stage;
        self.stage = stage;
        self.stage_time = 0.0;
        self.stable_time = 0.0;
        self.record_event(SynthesisEventKind::StageChanged { from, to: stage });
        StageTransition {
            from,
            to: stage,
            effect: None,
        }
    }

    fn degrade(&mut self) -> StageTransition {
        self.resume_stage = self.stage;
        self.enter(SynthesisStage::Degrading)
    }

    fn complete(&mut self, rules: &SynthesisRules) -> StageTransition {
        let outcome = self
            .active
            .as_ref()
            .and_then(|active| rules.path(&active.key))
            .map_or_else(
                || SynthesisOutcome::new(self.target_form()),
                |path| path.outcome.clone(),
            );

        self.synthesis_level = self.synthesis_level.saturating_add(1);
        self.current_form = Some(outcome.result_form.clone());
        self.progress.completion_level = 1.0;
        self.permanent = self.permanent || outcome.permanent;
        self.applied.push(AppliedOutcome::new(outcome.clone()));
        self.record_event(SynthesisEventKind::Completed);

        let mut transition = self.enter(SynthesisStage::Complete);
        transition.effect = Some(TransitionEffect::Completed {
            form: outcome.result_form.clone(),
            outcome,
        });
        transition
    }

    fn revert(&mut self) -> StageTransition {
        let from = self.stage;
        self.record_event(SynthesisEventKind::Reverted);
        self.checkpoint = Some(self.snapshot());
        let outcomes = std::mem::take(&mut self.applied);

        self.current_form.clone_from(&self.base_form);
        self.stage = SynthesisStage::None;
        self.resume_stage = SynthesisStage::None;
        self.progress = SynthesisProgress::default();
        self.active = None;
        self.synthesis_level = 0;
        self.permanent = false;
        self.stage_time = 0.0;
        self.stable_time = 0.0;
        self.pending_exposure = 0.0;

        StageTransition {
            from,
            to: SynthesisStage::None,
            effect: Some(TransitionEffect::Reverted { outcomes }),
        }
    }

    fn snapshot(&self) -> Checkpoint {
        Checkpoint {
            current_form: self.current_form.clone(),
            stage: self.stage,
            stability: self.stability,
            progress: self.progress,
            active: self.active.clone(),
            resume_stage: self.resume_stage,
            synthesis_level: self.synthesis_level,
            permanent: self.permanent,
            applied: self.applied.clone(),
        }
    }

    fn target_form(&self) -> String {
        self.active
            .as_ref()
            .map_or_else(|| self.trait_id.clone(), |active| active.key.target_form.clone())
    }

    fn record_event(&mut self, kind: SynthesisEventKind) {
        if self.history_capacity == 0 {
            return;
        }
        let Some(active) = &self.active else {
            return;
        };
        let event = SynthesisEvent {
            kind,
            source_form: active.key.source_form.clone(),
            target_form: active.key.target_form.clone(),
            catalyst: active.key.catalyst,
            catalyst_id: active.catalyst_id.clone(),
            intensity: self.progress.catalyst_strength,
            elapsed: self.elapsed,
            recorded_at: Utc::now(),
        };
        if self.history.len() >= self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(event);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rules::SynthesisRequirement;

    fn rules() -> SynthesisRules {
        let mut rules = SynthesisRules::new();
        rules
            .register_path(
                SynthesisPathKey::new("fireproof", CatalystType::Environmental, "magma_skin"),
                SynthesisRequirement::new(0.5),
                SynthesisOutcome::new("magma_skin").grants("lava_wade"),
            )
            .unwrap();
        rules
            .register_path(
                SynthesisPathKey::new("fireproof", CatalystType::Forced, "obsidian_skin"),
                SynthesisRequirement::new(0.5),
                SynthesisOutcome::new("obsidian_skin").permanent(),
            )
            .unwrap();
        rules
            .register_path(
                SynthesisPathKey::new("magma_skin", CatalystType::Environmental, "star_skin"),
                SynthesisRequirement::new(0.5).at_level(1),
                SynthesisOutcome::new("star_skin"),
            )
            .unwrap();
        rules
            .register_path(
                SynthesisPathKey::new("obsidian_skin", CatalystType::Forced, "basalt_skin"),
                SynthesisRequirement::new(0.5).at_level(1),
                SynthesisOutcome::new("basalt_skin"),
            )
            .unwrap();
        rules
    }

    fn definition() -> TraitDefinition {
        TraitDefinition::new("fireproof", "Fireproof")
    }

    fn heat(intensity: f32) -> Catalyst {
        Catalyst::new(CatalystType::Environmental, "lava_vent", intensity)
    }

    fn begin(state: &mut SynthesisState, rules: &SynthesisRules, target: &str, catalyst: &Catalyst) -> SynthesisResult {
        let definition = definition();
        let held: BTreeSet<String> = ["fireproof".to_owned()].into();
        let context = SynthesisContext {
            definition: &definition,
            held_traits: &held,
            environment: None,
        };
        state.begin_synthesis(rules, &context, target, catalyst)
    }

    /// Expose and progress until `stage` is reached or `limit` steps pass.
    fn drive(
        state: &mut SynthesisState,
        rules: &SynthesisRules,
        config: &SynthesisConfig,
        catalyst: Option<&Catalyst>,
        limit: usize,
    ) -> Vec<StageTransition> {
        let mut transitions = Vec::new();
        for _ in 0..limit {
            if let Some(catalyst) = catalyst {
                state.record_catalyst_exposure(catalyst);
            }
            if let Some(transition) = state.progress_synthesis(rules, config, 1.0) {
                transitions.push(transition);
            }
        }
        transitions
    }

    #[test]
    fn weak_catalyst_is_refused_and_stage_stays_none() {
        let rules = rules();
        let mut state = SynthesisState::new("fireproof", None, 10);
        let result = begin(&mut state, &rules, "magma_skin", &heat(0.2));
        assert!(!result.success);
        assert_eq!(result.failure_type(), Some(SynthesisFailureType::CatalystWeak));
        assert_eq!(state.stage(), SynthesisStage::None);
        assert!(state.progress().completion_level.abs() < f32::EPSILON);
    }

    #[test]
    fn invalid_intensity_is_a_systemic_failure() {
        let rules = rules();
        let mut state = SynthesisState::new("fireproof", None, 10);
        let result = begin(&mut state, &rules, "magma_skin", &heat(f32::NAN));
        assert_eq!(result.failure_type(), Some(SynthesisFailureType::SystemicFailure));
    }

    #[test]
    fn successful_synthesis_walks_every_stage_in_order() {
        let rules = rules();
        let config = SynthesisConfig::default();
        let mut state = SynthesisState::new("fireproof", None, 100);
        let catalyst = heat(0.8);
        assert!(begin(&mut state, &rules, "magma_skin", &catalyst).success);

        let mut stages = vec![SynthesisStage::None, state.stage()];
        let mut completed = None;
        for transition in drive(&mut state, &rules, &config, Some(&catalyst), 10) {
            stages.push(transition.to);
            if let Some(TransitionEffect::Completed { form, .. }) = transition.effect {
                completed = Some(form);
                break;
            }
        }
        assert_eq!(
            stages,
            vec![
                SynthesisStage::None,
                SynthesisStage::Initiating,
                SynthesisStage::Forming,
                SynthesisStage::Stabilizing,
                SynthesisStage::Complete,
            ]
        );
        assert_eq!(completed.as_deref(), Some("magma_skin"));
        assert_eq!(state.current_form(), Some("magma_skin"));
        assert_eq!(state.synthesis_level(), 1);
    }

    #[test]
    fn lost_catalyst_degrades_then_reverts_with_compensation() {
        let rules = rules();
        let config = SynthesisConfig::default();
        let mut state = SynthesisState::new("fireproof", None, 100);
        let catalyst = heat(0.8);
        begin(&mut state, &rules, "magma_skin", &catalyst);
        drive(&mut state, &rules, &config, Some(&catalyst), 8);
        assert_eq!(state.stage(), SynthesisStage::Complete);

        state.progress.stability_factor = 0.355;
        let transitions = drive(&mut state, &rules, &config, None, 20);
        let stages: Vec<SynthesisStage> = transitions.iter().map(|t| t.to).collect();
        assert_eq!(
            stages,
            vec![
                SynthesisStage::Degrading,
                SynthesisStage::Critical,
                SynthesisStage::None,
            ]
        );
        assert!(matches!(
            &transitions[2].effect,
            Some(TransitionEffect::Reverted { outcomes }) if outcomes.len() == 1
        ));
        assert_eq!(state.current_form(), None);
        assert!(state.progress().completion_level.abs() < f32::EPSILON);
    }

    #[test]
    fn renewed_exposure_recovers_from_degrading() {
        let rules = rules();
        let config = SynthesisConfig::default();
        let mut state = SynthesisState::new("fireproof", None, 100);
        let catalyst = heat(0.8);
        begin(&mut state, &rules, "magma_skin", &catalyst);
        drive(&mut state, &rules, &config, Some(&catalyst), 1);
        assert_eq!(state.stage(), SynthesisStage::Forming);

        let dropped = drive(&mut state, &rules, &config, None, 1);
        assert_eq!(dropped[0].to, SynthesisStage::Degrading);
        let resumed = drive(&mut state, &rules, &config, Some(&catalyst), 1);
        assert_eq!(resumed[0].to, SynthesisStage::Forming);
    }

    #[test]
    fn permanent_outcome_never_decays() {
        let rules = rules();
        let config = SynthesisConfig::default();
        let mut state = SynthesisState::new("fireproof", None, 100);
        let catalyst = Catalyst::new(CatalystType::Forced, "ritual", 0.9);
        begin(&mut state, &rules, "obsidian_skin", &catalyst);
        drive(&mut state, &rules, &config, Some(&catalyst), 8);
        assert_eq!(state.stage(), SynthesisStage::Complete);
        assert_eq!(state.stability(), StabilityClass::Permanent);

        assert!(drive(&mut state, &rules, &config, None, 200).is_empty());
        assert_eq!(state.stage(), SynthesisStage::Complete);
        assert!(!state.can_revert());
    }

    #[test]
    fn chained_synthesis_starts_from_completed_form() {
        let rules = rules();
        let config = SynthesisConfig::default();
        let mut state = SynthesisState::new("fireproof", None, 100);
        let catalyst = heat(0.8);
        assert_eq!(
            begin(&mut state, &rules, "star_skin", &catalyst).failure_type(),
            Some(SynthesisFailureType::Incompatible)
        );
        begin(&mut state, &rules, "magma_skin", &catalyst);
        drive(&mut state, &rules, &config, Some(&catalyst), 8);
        assert_eq!(state.source_form(), "magma_skin");
        assert!(begin(&mut state, &rules, "star_skin", &catalyst).success);
        assert_eq!(
            begin(&mut state, &rules, "star_skin", &catalyst).failure_type(),
            Some(SynthesisFailureType::Incompatible)
        );
    }

    #[test]
    fn permanent_form_refuses_chained_synthesis() {
        let rules = rules();
        let config = SynthesisConfig::default();
        let mut state = SynthesisState::new("fireproof", None, 100);
        let ritual = Catalyst::new(CatalystType::Forced, "ritual", 0.9);
        begin(&mut state, &rules, "obsidian_skin", &ritual);
        drive(&mut state, &rules, &config, Some(&ritual), 8);
        assert_eq!(state.current_form(), Some("obsidian_skin"));

        let result = begin(&mut state, &rules, "basalt_skin", &ritual);
        assert_eq!(result.failure_type(), Some(SynthesisFailureType::Incompatible));
        assert_eq!(result.stage, SynthesisStage::Complete);
        assert_eq!(state.stability(), StabilityClass::Permanent);

        assert!(drive(&mut state, &rules, &config, None, 50).is_empty());
        assert_eq!(state.current_form(), Some("obsidian_skin"));
        assert_eq!(state.applied_outcomes().len(), 1);
    }

    #[test]
    fn triggering_catalyst_is_not_counted_as_exposure() {
        let rules = rules();
        let config = SynthesisConfig::default();
        let mut state = SynthesisState::new("fireproof", None, 100);
        assert!(begin(&mut state, &rules, "magma_skin", &heat(0.8)).success);
        assert!((state.catalyst_influence(CatalystType::Environmental) - 0.8).abs() < 1e-6);

        let transitions = drive(&mut state, &rules, &config, None, 1);
        assert_eq!(transitions[0].to, SynthesisStage::Degrading);
    }

    #[test]
    fn refused_completion_restores_the_prior_form() {
        let rules = rules();
        let config = SynthesisConfig::default();
        let mut state = SynthesisState::new("fireproof", None, 100);
        let catalyst = heat(0.8);
        begin(&mut state, &rules, "magma_skin", &catalyst);
        drive(&mut state, &rules, &config, Some(&catalyst), 8);
        state.confirm_completion(["lava_wade".to_owned()].into(), BTreeSet::new());

        assert!(begin(&mut state, &rules, "star_skin", &catalyst).success);
        let transitions = drive(&mut state, &rules, &config, Some(&catalyst), 8);
        assert_eq!(transitions.last().map(|t| t.to), Some(SynthesisStage::Complete));
        assert_eq!(state.current_form(), Some("star_skin"));

        let rolled = state.roll_back().unwrap();
        assert_eq!(rolled.to, SynthesisStage::Complete);
        assert_eq!(state.current_form(), Some("magma_skin"));
        assert_eq!(state.synthesis_level(), 1);
        let applied = state.applied_outcomes();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].outcome.result_form, "magma_skin");
        assert!(applied[0].granted_abilities.contains("lava_wade"));
        assert!(state.roll_back().is_none());
    }

    #[test]
    fn refused_reversion_returns_to_critical() {
        let rules = rules();
        let config = SynthesisConfig::default();
        let mut state = SynthesisState::new("fireproof", None, 100);
        let catalyst = heat(0.8);
        begin(&mut state, &rules, "magma_skin", &catalyst);
        drive(&mut state, &rules, &config, Some(&catalyst), 8);
        state.confirm_completion(BTreeSet::new(), BTreeSet::new());

        state.progress.stability_factor = 0.355;
        let transitions = drive(&mut state, &rules, &config, None, 20);
        assert_eq!(transitions.last().map(|t| t.to), Some(SynthesisStage::None));

        let rolled = state.roll_back().unwrap();
        assert_eq!(rolled.from, SynthesisStage::None);
        assert_eq!(rolled.to, SynthesisStage::Critical);
        assert_eq!(state.current_form(), Some("magma_skin"));
        assert!(state.can_revert());

        let retried = drive(&mut state, &rules, &config, None, 5);
        assert!(matches!(
            retried.last().and_then(|t| t.effect.as_ref()),
            Some(TransitionEffect::Reverted { outcomes }) if outcomes.len() == 1
        ));
    }

    #[test]
    fn exposures_within_a_tick_accumulate() {
        let rules = rules();
        let config = SynthesisConfig::default();
        let mut state = SynthesisState::new("fireproof", None, 100);
        begin(&mut state, &rules, "magma_skin", &heat(0.5));
        state.record_catalyst_exposure(&heat(0.5));
        state.progress_synthesis(&rules, &config, 1.0);

        state.record_catalyst_exposure(&heat(0.3));
        state.record_catalyst_exposure(&heat(0.3));
        state.progress_synthesis(&rules, &config, 1.0);
        assert!((state.progress().catalyst_strength - 0.6).abs() < 1e-6);
    }

    #[test]
    fn history_filters_by_catalyst_and_count() {
        let rules = rules();
        let config = SynthesisConfig::default();
        let mut state = SynthesisState::new("fireproof", None, 100);
        let catalyst = heat(0.8);
        begin(&mut state, &rules, "magma_skin", &catalyst);
        drive(&mut state, &rules, &config, Some(&catalyst), 8);

        let all = state.history(100, None);
        assert!(all.len() >= 5);
        assert_eq!(all[0].kind, SynthesisEventKind::StageChanged {
            from: SynthesisStage::Stabilizing,
            to: SynthesisStage::Complete
        });
        assert_eq!(state.history(2, Some(CatalystType::Environmental)).len(), 2);
        assert!(state.history(10, Some(CatalystType::Stress)).is_empty());
        assert!(state.last_synthesis().is_some());
    }

    #[test]
    fn influence_tracks_peak_and_decays() {
        let rules = rules();
        let config = SynthesisConfig::default();
        let mut state = SynthesisState::new("fireproof", None, 10);
        state.record_catalyst_exposure(&heat(0.4));
        state.record_catalyst_exposure(&Catalyst::new(CatalystType::Environmental, "geyser", 0.4));
        let influence = state.influence(CatalystType::Environmental).unwrap();
        assert_eq!(influence.exposure_count, 2);
        assert_eq!(influence.totals.len(), 2);
        assert!((influence.peak - 0.8).abs() < 1e-6);

        state.progress_synthesis(&rules, &config, 1.0);
        assert!(state.catalyst_influence(CatalystType::Environmental) < 0.8);
        assert!(state.catalyst_influence(CatalystType::Stress).abs() < f32::EPSILON);
    }
}
