//! The change processor: the single path through which a creature's state
//! is mutated.
//!
//! Every change is structurally checked and run through the
//! [`ChangeValidator`] before it touches state. Applied changes are
//! recorded, resolved against the state they were applied to, in a bounded
//! history so they can be undone. In batch mode changes are buffered and
//! later replayed atomically.
//!
//! The processor owns its history and batch buffer and takes `&mut self`;
//! it does not lock the creature state. Callers keep one writer per
//! creature.

use std::cmp::Reverse;

use chrono::Utc;
use crescent_types::{ChangeId, ChangePriority, CreatureState};
use tracing::{debug, info, warn};

use crate::apply::apply_change;
use crate::change::FormChange;
use crate::config::ChangeConfig;
use crate::delta::ChangeSection;
use crate::error::ChangeError;
use crate::history::{ChangeHistory, HistoryEntry};
use crate::validation::{ChangeValidator, ValidationFinding, ValidationReport};

/// Outcome of submitting a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeResult {
    /// The change was applied in full.
    Applied {
        /// The applied change.
        change_id: ChangeId,
    },
    /// The change was refused and nothing was mutated.
    Rejected {
        /// The refused change.
        change_id: ChangeId,
        /// Why it was refused.
        error: ChangeError,
    },
    /// A critical change applied without its one invalid section.
    PartialSuccess {
        /// The partially applied change.
        change_id: ChangeId,
        /// The section that was left out.
        skipped: ChangeSection,
        /// The findings that disqualified the skipped section.
        findings: Vec<ValidationFinding>,
    },
    /// The change lost a conflict against another change.
    ConflictDetected {
        /// The losing change.
        change_id: ChangeId,
        /// The change it lost to.
        conflicting: ChangeId,
    },
    /// Applying the change would have broken a state invariant.
    InvalidState {
        /// The refused change.
        change_id: ChangeId,
        /// The invariant failure.
        error: ChangeError,
    },
    /// The change was buffered in an open batch.
    Pending {
        /// The buffered change.
        change_id: ChangeId,
    },
}

impl ChangeResult {
    /// The change this result is about.
    pub const fn change_id(&self) -> ChangeId {
        match self {
            Self::Applied { change_id }
            | Self::Rejected { change_id, .. }
            | Self::PartialSuccess { change_id, .. }
            | Self::ConflictDetected { change_id, .. }
            | Self::InvalidState { change_id, .. }
            | Self::Pending { change_id } => *change_id,
        }
    }

    /// Whether state was mutated (fully or partially).
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. } | Self::PartialSuccess { .. })
    }
}

/// Validates, applies, batches and undoes changes for one creature.
#[derive(Debug, Clone)]
pub struct ChangeProcessor {
    config: ChangeConfig,
    validator: ChangeValidator,
    history: ChangeHistory,
    batch: Option<Vec<FormChange>>,
}

impl ChangeProcessor {
    /// A processor with the built-in validation rules.
    pub fn new(config: ChangeConfig) -> Self {
        let validator = ChangeValidator::new(&config);
        Self::with_validator(config, validator)
    }

    /// A processor using a caller-configured validator.
    pub fn with_validator(config: ChangeConfig, validator: ChangeValidator) -> Self {
        Self {
            history: ChangeHistory::new(config.history_capacity),
            config,
            validator,
            batch: None,
        }
    }

    /// Configuration in effect.
    pub const fn config(&self) -> &ChangeConfig {
        &self.config
    }

    /// The validator run before every application.
    pub const fn validator(&self) -> &ChangeValidator {
        &self.validator
    }

    /// The validator, for adding or removing rules.
    pub const fn validator_mut(&mut self) -> &mut ChangeValidator {
        &mut self.validator
    }

    /// Applied change history.
    pub const fn history(&self) -> &ChangeHistory {
        &self.history
    }

    /// Up to `count` most recently applied changes, newest first.
    pub fn recent_changes(&self, count: usize) -> Vec<&FormChange> {
        self.history.recent(count)
    }

    /// Forget all history; nothing can be undone afterwards.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    // -----------------------------------------------------------------------
    // Single changes
    // -----------------------------------------------------------------------

    /// Validate and apply one change, or buffer it if a batch is open.
    pub fn process_change(&mut self, state: &mut CreatureState, change: FormChange) -> ChangeResult {
        let change_id = change.id();

        if let Some(batch) = &mut self.batch {
            if let Some(other) = batch.iter().find(|queued| queued.conflicts_with(&change)) {
                debug!(%change_id, conflicting = %other.id(), "Batched change conflicts");
                return ChangeResult::ConflictDetected {
                    change_id,
                    conflicting: other.id(),
                };
            }
            if batch.len() >= self.config.batch_capacity {
                return ChangeResult::Rejected {
                    change_id,
                    error: ChangeError::LimitExceeded {
                        what: "batch",
                        capacity: self.config.batch_capacity,
                    },
                };
            }
            batch.push(change);
            debug!(%change_id, queued = batch.len(), "Change buffered in batch");
            return ChangeResult::Pending { change_id };
        }

        if let Err(error) = change.ensure_valid() {
            debug!(%change_id, %error, "Change rejected as malformed");
            return ChangeResult::Rejected { change_id, error };
        }

        let report = self.validator.validate_change(&change, state);
        if report.is_valid {
            return match self.commit_one(state, &change) {
                Ok(()) => {
                    debug!(
                        creature = %state.id,
                        %change_id,
                        source = ?change.source(),
                        "Change applied"
                    );
                    ChangeResult::Applied { change_id }
                }
                Err(error) => {
                    warn!(creature = %state.id, %change_id, %error, "Change would break invariants");
                    ChangeResult::InvalidState { change_id, error }
                }
            };
        }

        if let Some(result) = self.try_partial(state, &change, &report) {
            return result;
        }

        debug!(
            creature = %state.id,
            %change_id,
            errors = report.errors.len(),
            "Change rejected by validation"
        );
        ChangeResult::Rejected {
            change_id,
            error: ChangeError::ValidationFailure {
                change_id,
                messages: report.error_messages(),
            },
        }
    }

    /// Resolve, apply and record a change that already passed validation.
    fn commit_one(&mut self, state: &mut CreatureState, change: &FormChange) -> Result<(), ChangeError> {
        let resolved = change.resolve(state);
        let prior_mutated = state.mutated;
        apply_change(state, &resolved)?;
        if let Some(evicted) = self.history.push(HistoryEntry {
            change: resolved,
            prior_mutated,
            recorded_at: Utc::now(),
        }) {
            debug!(evicted = %evicted.change.id(), "History full, dropped oldest entry");
        }
        Ok(())
    }

    /// Apply a critical change without its single failing section, provided
    /// the rest of the change stands on its own.
    fn try_partial(
        &mut self,
        state: &mut CreatureState,
        change: &FormChange,
        report: &ValidationReport,
    ) -> Option<ChangeResult> {
        if change.priority() != ChangePriority::Critical {
            return None;
        }
        let blamed = report.blamed_sections();
        let mut blamed_iter = blamed.into_iter();
        let (Some(Some(skipped)), None) = (blamed_iter.next(), blamed_iter.next()) else {
            return None;
        };
        let sections = change.sections();
        if sections.len() < 2 || !sections.contains(&skipped) {
            return None;
        }

        let reduced = change.without_section(skipped);
        if !self.validator.validate_change(&reduced, state).is_valid {
            return None;
        }

        let change_id = change.id();
        Some(match self.commit_one(state, &reduced) {
            Ok(()) => {
                warn!(
                    creature = %state.id,
                    %change_id,
                    skipped = ?skipped,
                    "Critical change partially applied"
                );
                ChangeResult::PartialSuccess {
                    change_id,
                    skipped,
                    findings: report.errors.clone(),
                }
            }
            Err(error) => ChangeResult::InvalidState { change_id, error },
        })
    }

    // -----------------------------------------------------------------------
    // Sequences
    // -----------------------------------------------------------------------

    /// Process several changes submitted together.
    ///
    /// Changes are taken by priority, then submission order. A change that
    /// conflicts with one already accepted from this submission reports
    /// [`ChangeResult::ConflictDetected`]. Results are returned in
    /// submission order.
    pub fn process_changes(
        &mut self,
        state: &mut CreatureState,
        changes: Vec<FormChange>,
    ) -> Vec<ChangeResult> {
        let mut ordered: Vec<(usize, FormChange)> = changes.into_iter().enumerate().collect();
        ordered.sort_by_key(|(_, change)| Reverse(change.priority()));

        let mut results: Vec<Option<ChangeResult>> = vec![None; ordered.len()];
        let mut accepted: Vec<FormChange> = Vec::new();

        for (index, change) in ordered {
            let result = if let Some(winner) = accepted.iter().find(|w| w.conflicts_with(&change)) {
                debug!(
                    change_id = %change.id(),
                    winner = %winner.id(),
                    "Change lost conflict"
                );
                ChangeResult::ConflictDetected {
                    change_id: change.id(),
                    conflicting: winner.id(),
                }
            } else {
                let keep = change.clone();
                let result = self.process_change(state, change);
                if result.is_applied() || matches!(result, ChangeResult::Pending { .. }) {
                    accepted.push(keep);
                }
                result
            };
            if let Some(slot) = results.get_mut(index) {
                *slot = Some(result);
            }
        }

        results.into_iter().flatten().collect()
    }

    /// Whether `change` conflicts with anything buffered in the open batch.
    pub fn has_conflicting_changes(&self, change: &FormChange) -> bool {
        self.batch
            .as_ref()
            .is_some_and(|batch| batch.iter().any(|queued| queued.conflicts_with(change)))
    }

    // -----------------------------------------------------------------------
    // Batches
    // -----------------------------------------------------------------------

    /// Open a batch. Subsequent changes are buffered until commit.
    pub fn start_batch(&mut self) -> Result<(), ChangeError> {
        if self.batch.is_some() {
            return Err(ChangeError::BatchAlreadyOpen);
        }
        self.batch = Some(Vec::new());
        debug!("Batch started");
        Ok(())
    }

    /// Whether a batch is open.
    pub const fn in_batch(&self) -> bool {
        self.batch.is_some()
    }

    /// Changes buffered in the open batch.
    pub fn pending_changes(&self) -> &[FormChange] {
        self.batch.as_deref().unwrap_or_default()
    }

    /// Replay the buffered changes atomically.
    ///
    /// Either every change applies and `state` reflects them all, or the
    /// first failure discards the whole batch and `state` is untouched. The
    /// batch is closed in both cases. Returns the number of changes applied.
    pub fn commit_batch(&mut self, state: &mut CreatureState) -> Result<usize, ChangeError> {
        let buffer = self.batch.take().ok_or(ChangeError::NoOpenBatch)?;
        let count = buffer.len();

        match self.replay(state, buffer) {
            Ok((working, entries)) => {
                *state = working;
                for entry in entries {
                    self.history.push(entry);
                }
                info!(creature = %state.id, count, "Batch committed");
                Ok(count)
            }
            Err(error) => {
                warn!(creature = %state.id, %error, "Batch commit failed, rolled back");
                Err(error)
            }
        }
    }

    fn replay(
        &self,
        state: &CreatureState,
        buffer: Vec<FormChange>,
    ) -> Result<(CreatureState, Vec<HistoryEntry>), ChangeError> {
        let mut working = state.clone();
        let mut entries = Vec::with_capacity(buffer.len());
        for change in buffer {
            change.ensure_valid()?;
            let report = self.validator.validate_change(&change, &working);
            if !report.is_valid {
                return Err(ChangeError::ValidationFailure {
                    change_id: change.id(),
                    messages: report.error_messages(),
                });
            }
            let resolved = change.resolve(&working);
            let prior_mutated = working.mutated;
            apply_change(&mut working, &resolved)?;
            entries.push(HistoryEntry {
                change: resolved,
                prior_mutated,
                recorded_at: Utc::now(),
            });
        }
        Ok((working, entries))
    }

    /// Discard the open batch, returning how many changes were dropped.
    pub fn rollback_batch(&mut self) -> Result<usize, ChangeError> {
        let buffer = self.batch.take().ok_or(ChangeError::NoOpenBatch)?;
        debug!(discarded = buffer.len(), "Batch rolled back");
        Ok(buffer.len())
    }

    // -----------------------------------------------------------------------
    // Undo
    // -----------------------------------------------------------------------

    /// Whether the newest history entry can be undone.
    pub fn can_undo(&self) -> bool {
        self.history
            .newest()
            .is_some_and(|entry| entry.change.generate_undo().is_ok())
    }

    /// Undo the newest change. Returns `false`, mutating nothing, if the
    /// history is empty or the change cannot be reversed.
    pub fn undo(&mut self, state: &mut CreatureState) -> bool {
        match self.try_undo(state) {
            Ok(change_id) => {
                info!(creature = %state.id, %change_id, "Change undone");
                true
            }
            Err(error) => {
                debug!(creature = %state.id, %error, "Undo refused");
                false
            }
        }
    }

    /// Undo the newest change, reporting why it could not be undone.
    pub fn try_undo(&mut self, state: &mut CreatureState) -> Result<ChangeId, ChangeError> {
        let entry = self.history.newest().ok_or(ChangeError::NothingToUndo)?;
        let inverse = entry.change.generate_undo()?;
        let change_id = entry.change.id();
        let prior_mutated = entry.prior_mutated;

        inverse.ensure_valid()?;
        let mut working = state.clone();
        apply_change(&mut working, &inverse)?;
        working.mutated = prior_mutated;

        *state = working;
        self.history.pop_newest();
        Ok(change_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crescent_types::{AbilityDefinition, ChangeSource, Size, TraitDefinition};

    use super::*;
    use crate::delta::{AbilityChange, BehaviorChange, PhysicalChange, TraitChange};

    fn processor() -> ChangeProcessor {
        ChangeProcessor::new(ChangeConfig::default())
    }

    fn fireproof() -> TraitDefinition {
        TraitDefinition::new("fireproof", "Fireproof")
    }

    fn size(size: Size, priority: ChangePriority) -> FormChange {
        FormChange::new(ChangeSource::Environment)
            .with_priority(priority)
            .with_physical(PhysicalChange::default().with_size(size))
    }

    #[test]
    fn apply_then_undo_fireproof() {
        let mut processor = processor();
        let mut state = CreatureState::new("Ember");
        let before = state.clone();

        let change = FormChange::new(ChangeSource::Manual)
            .with_traits(TraitChange::default().gain(fireproof()));
        let result = processor.process_change(&mut state, change);
        assert!(matches!(result, ChangeResult::Applied { .. }));
        assert!(state.has_trait("fireproof"));

        assert!(processor.can_undo());
        assert!(processor.undo(&mut state));
        assert_eq!(state, before);
        assert!(processor.history().is_empty());
    }

    #[test]
    fn undo_restores_mutation_flag_and_trait_order() {
        let mut processor = processor();
        let mut state = CreatureState::new("Ember")
            .with_trait(TraitDefinition::new("a", "A"))
            .with_trait(TraitDefinition::new("b", "B"))
            .with_trait(TraitDefinition::new("c", "C"));
        let before = state.clone();

        let change = FormChange::new(ChangeSource::Stress)
            .with_traits(TraitChange::default().lose("a").lose("c").set_strength("b", 0.5))
            .with_behavior(BehaviorChange::default().add_behavior("burrowing"));
        assert!(processor.process_change(&mut state, change).is_applied());
        assert!(state.mutated);

        assert!(processor.undo(&mut state));
        assert_eq!(state, before);
    }

    #[test]
    fn undo_on_empty_history_fails() {
        let mut processor = processor();
        let mut state = CreatureState::new("Ember");
        assert!(!processor.undo(&mut state));
        assert!(matches!(
            processor.try_undo(&mut state),
            Err(ChangeError::NothingToUndo)
        ));
    }

    #[test]
    fn probabilistic_change_cannot_be_undone() {
        let mut processor = processor();
        let mut state = CreatureState::new("Ember");
        let change = size(Size::Huge, ChangePriority::Normal).probabilistic();
        assert!(processor.process_change(&mut state, change).is_applied());
        let after = state.clone();
        assert!(!processor.can_undo());
        assert!(!processor.undo(&mut state));
        assert_eq!(state, after);
        assert_eq!(processor.history().len(), 1);
    }

    #[test]
    fn higher_priority_wins_conflict() {
        let mut processor = processor();
        let mut state = CreatureState::new("Ember");
        let a = size(Size::Large, ChangePriority::High);
        let b = size(Size::Small, ChangePriority::Normal);
        let (a_id, b_id) = (a.id(), b.id());

        let results = processor.process_changes(&mut state, vec![b, a]);
        assert_eq!(results[0], ChangeResult::ConflictDetected {
            change_id: b_id,
            conflicting: a_id
        });
        assert_eq!(results[1], ChangeResult::Applied { change_id: a_id });
        assert_eq!(state.physical.size, Size::Large);
    }

    #[test]
    fn equal_priority_falls_back_to_submission_order() {
        let mut processor = processor();
        let mut state = CreatureState::new("Ember");
        let first = size(Size::Tiny, ChangePriority::Normal);
        let second = size(Size::Huge, ChangePriority::Normal);
        let results = processor.process_changes(&mut state, vec![first, second]);
        assert!(results[0].is_applied());
        assert!(matches!(results[1], ChangeResult::ConflictDetected { .. }));
        assert_eq!(state.physical.size, Size::Tiny);
    }

    #[test]
    fn invalid_batch_commit_leaves_state_untouched() {
        let mut processor = processor();
        let mut state = CreatureState::new("Ember");
        let before = state.clone();

        processor.start_batch().unwrap();
        let good = size(Size::Large, ChangePriority::Normal);
        let bad = FormChange::new(ChangeSource::Manual)
            .with_traits(TraitChange::default().lose("wings"));
        assert!(matches!(
            processor.process_change(&mut state, good),
            ChangeResult::Pending { .. }
        ));
        assert!(matches!(
            processor.process_change(&mut state, bad),
            ChangeResult::Pending { .. }
        ));
        assert_eq!(state, before);

        assert!(processor.commit_batch(&mut state).is_err());
        assert_eq!(state, before);
        assert!(!processor.in_batch());
        assert!(processor.history().is_empty());
    }

    #[test]
    fn batch_commit_applies_all_and_records_each() {
        let mut processor = processor();
        let mut state = CreatureState::new("Ember");
        processor.start_batch().unwrap();
        assert!(matches!(
            processor.start_batch(),
            Err(ChangeError::BatchAlreadyOpen)
        ));
        processor.process_change(
            &mut state,
            FormChange::new(ChangeSource::Manual).with_traits(TraitChange::default().gain(fireproof())),
        );
        processor.process_change(
            &mut state,
            FormChange::new(ChangeSource::Manual).with_abilities(
                AbilityChange::default()
                    .grant(AbilityDefinition::new("ember_skin", "Ember Skin", 0.4).requires("fireproof")),
            ),
        );
        assert_eq!(processor.pending_changes().len(), 2);
        assert_eq!(processor.commit_batch(&mut state).unwrap(), 2);
        assert!(state.has_ability("ember_skin"));
        assert_eq!(processor.history().len(), 2);
    }

    #[test]
    fn batch_rejects_conflicts_and_overflow() {
        let config = ChangeConfig {
            batch_capacity: 1,
            ..ChangeConfig::default()
        };
        let mut processor = ChangeProcessor::new(config);
        let mut state = CreatureState::new("Ember");
        processor.start_batch().unwrap();
        processor.process_change(&mut state, size(Size::Large, ChangePriority::Normal));

        let rival = size(Size::Small, ChangePriority::Normal);
        assert!(processor.has_conflicting_changes(&rival));
        assert!(matches!(
            processor.process_change(&mut state, rival),
            ChangeResult::ConflictDetected { .. }
        ));

        let extra = FormChange::new(ChangeSource::Manual)
            .with_behavior(BehaviorChange::default().add_behavior("nocturnal"));
        assert!(matches!(
            processor.process_change(&mut state, extra),
            ChangeResult::Rejected {
                error: ChangeError::LimitExceeded { .. },
                ..
            }
        ));
        assert_eq!(processor.rollback_batch().unwrap(), 1);
        assert!(matches!(
            processor.rollback_batch(),
            Err(ChangeError::NoOpenBatch)
        ));
    }

    #[test]
    fn critical_change_partially_applies_around_isolated_failure() {
        let mut processor = processor();
        let mut state = CreatureState::new("Ember");
        let change = FormChange::new(ChangeSource::Environment)
            .with_priority(ChangePriority::Critical)
            .with_physical(PhysicalChange::default().with_size(Size::Huge))
            .with_traits(TraitChange::default().lose("wings"));

        let result = processor.process_change(&mut state, change);
        assert!(matches!(
            result,
            ChangeResult::PartialSuccess {
                skipped: ChangeSection::Traits,
                ..
            }
        ));
        assert_eq!(state.physical.size, Size::Huge);
    }

    #[test]
    fn normal_change_with_same_failure_is_rejected() {
        let mut processor = processor();
        let mut state = CreatureState::new("Ember");
        let before = state.clone();
        let change = FormChange::new(ChangeSource::Environment)
            .with_physical(PhysicalChange::default().with_size(Size::Huge))
            .with_traits(TraitChange::default().lose("wings"));
        let result = processor.process_change(&mut state, change);
        assert!(matches!(result, ChangeResult::Rejected { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn critical_change_with_dependent_sections_is_rejected() {
        let mut processor = processor();
        let mut state = CreatureState::new("Ember")
            .with_trait(TraitDefinition::new("frostborn", "Frostborn"));
        let change = FormChange::new(ChangeSource::Environment)
            .with_priority(ChangePriority::Critical)
            .with_traits(
                TraitChange::default().gain(fireproof().incompatible_with("frostborn")),
            )
            .with_abilities(
                AbilityChange::default()
                    .grant(AbilityDefinition::new("ember_skin", "Ember Skin", 0.4).requires("fireproof")),
            );
        let result = processor.process_change(&mut state, change);
        assert!(matches!(result, ChangeResult::Rejected { .. }));
        assert!(!state.has_ability("ember_skin"));
    }

    #[test]
    fn history_is_bounded() {
        let config = ChangeConfig {
            history_capacity: 5,
            ..ChangeConfig::default()
        };
        let mut processor = ChangeProcessor::new(config);
        let mut state = CreatureState::new("Ember");
        for step in 0..12_u8 {
            let change = FormChange::new(ChangeSource::Manual)
                .with_physical(PhysicalChange::default().set_modifier("mass", f32::from(step) * 0.05));
            assert!(processor.process_change(&mut state, change).is_applied());
            assert!(processor.history().len() <= 5);
        }
        assert_eq!(processor.recent_changes(10).len(), 5);
    }
}
