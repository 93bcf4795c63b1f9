//! The [`FormChange`] value type.
//!
//! A form change is an atomic, immutable delta against one creature. It
//! carries up to four section deltas plus metadata. Before the processor
//! applies a change it *resolves* it against the current state, capturing
//! the prior value of everything the change touches; only a resolved,
//! non-probabilistic change can produce an inverse.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use crescent_types::{
    AbilityDefinition, ActiveTrait, BehaviorRecord, ChangeId, ChangePriority, ChangeSource,
    CreatureState, PhysicalForm,
};
use serde::{Deserialize, Serialize};

use crate::delta::{
    AbilityChange, BehaviorChange, ChangeSection, PhysicalChange, TraitAddition, TraitChange,
};
use crate::error::ChangeError;

/// Tag attached to every inverse change.
pub const UNDO_TAG: &str = "undo";

/// Prior values captured when a change is resolved against a state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangePriors {
    /// Physical form before the change, if the change touches it.
    pub physical: Option<PhysicalForm>,
    /// Prior definition of every ability the change touches (`None` if absent).
    pub abilities: BTreeMap<String, Option<AbilityDefinition>>,
    /// Trait list before the change, if the change touches traits.
    pub traits: Option<Vec<ActiveTrait>>,
    /// Behavior record before the change, if the change touches it.
    pub behavior: Option<BehaviorRecord>,
}

/// An atomic, validated delta applied to a creature's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormChange {
    id: ChangeId,
    source: ChangeSource,
    priority: ChangePriority,
    tags: BTreeSet<String>,
    description: Option<String>,
    timestamp: DateTime<Utc>,
    probabilistic: bool,
    physical: Option<PhysicalChange>,
    abilities: Option<AbilityChange>,
    traits: Option<TraitChange>,
    behavior: Option<BehaviorChange>,
    priors: Option<ChangePriors>,
}

impl FormChange {
    /// An empty change from `source` at normal priority.
    ///
    /// At least one section must be attached before the change is valid.
    pub fn new(source: ChangeSource) -> Self {
        Self {
            id: ChangeId::new(),
            source,
            priority: ChangePriority::Normal,
            tags: BTreeSet::new(),
            description: None,
            timestamp: Utc::now(),
            probabilistic: false,
            physical: None,
            abilities: None,
            traits: None,
            behavior: None,
            priors: None,
        }
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: ChangePriority) -> Self {
        self.priority = priority;
        self
    }

    /// Add a free-form tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Attach a human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a physical delta.
    #[must_use]
    pub fn with_physical(mut self, delta: PhysicalChange) -> Self {
        self.physical = Some(delta);
        self
    }

    /// Attach an ability delta.
    #[must_use]
    pub fn with_abilities(mut self, delta: AbilityChange) -> Self {
        self.abilities = Some(delta);
        self
    }

    /// Attach a trait delta.
    #[must_use]
    pub fn with_traits(mut self, delta: TraitChange) -> Self {
        self.traits = Some(delta);
        self
    }

    /// Attach a behavior delta.
    #[must_use]
    pub fn with_behavior(mut self, delta: BehaviorChange) -> Self {
        self.behavior = Some(delta);
        self
    }

    /// Mark the change as the outcome of a random draw. Such changes have
    /// no inverse.
    #[must_use]
    pub const fn probabilistic(mut self) -> Self {
        self.probabilistic = true;
        self
    }

    /// Unique id.
    pub const fn id(&self) -> ChangeId {
        self.id
    }

    /// Producing subsystem.
    pub const fn source(&self) -> ChangeSource {
        self.source
    }

    /// Priority.
    pub const fn priority(&self) -> ChangePriority {
        self.priority
    }

    /// Free-form tags.
    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Creation time.
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Whether the change came from a random draw.
    pub const fn is_probabilistic(&self) -> bool {
        self.probabilistic
    }

    /// Physical delta, if any.
    pub const fn physical(&self) -> Option<&PhysicalChange> {
        self.physical.as_ref()
    }

    /// Ability delta, if any.
    pub const fn abilities(&self) -> Option<&AbilityChange> {
        self.abilities.as_ref()
    }

    /// Trait delta, if any.
    pub const fn traits(&self) -> Option<&TraitChange> {
        self.traits.as_ref()
    }

    /// Behavior delta, if any.
    pub const fn behavior(&self) -> Option<&BehaviorChange> {
        self.behavior.as_ref()
    }

    /// Captured prior values, present once resolved.
    pub const fn priors(&self) -> Option<&ChangePriors> {
        self.priors.as_ref()
    }

    /// Whether the change has been resolved against a state.
    pub const fn is_resolved(&self) -> bool {
        self.priors.is_some()
    }

    /// Sections carrying a non-empty delta, in application order.
    pub fn sections(&self) -> Vec<ChangeSection> {
        ChangeSection::ORDER
            .into_iter()
            .filter(|section| self.has_section(*section))
            .collect()
    }

    /// Whether the given section carries a non-empty delta.
    pub fn has_section(&self, section: ChangeSection) -> bool {
        match section {
            ChangeSection::Physical => self.physical.as_ref().is_some_and(|d| !d.is_empty()),
            ChangeSection::Abilities => self.abilities.as_ref().is_some_and(|d| !d.is_empty()),
            ChangeSection::Traits => self.traits.as_ref().is_some_and(|d| !d.is_empty()),
            ChangeSection::Behavior => self.behavior.as_ref().is_some_and(|d| !d.is_empty()),
        }
    }

    /// The same change with one section dropped. Id and metadata are kept;
    /// captured priors are discarded.
    #[must_use]
    pub fn without_section(&self, section: ChangeSection) -> Self {
        let mut reduced = self.clone();
        match section {
            ChangeSection::Physical => reduced.physical = None,
            ChangeSection::Abilities => reduced.abilities = None,
            ChangeSection::Traits => reduced.traits = None,
            ChangeSection::Behavior => reduced.behavior = None,
        }
        reduced.priors = None;
        reduced
    }

    // -----------------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------------

    /// Structural problems: an empty change, or one that contradicts itself.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.sections().is_empty() {
            problems.push("change carries no sub-delta".to_owned());
        }
        if let Some(delta) = &self.physical {
            delta.collect_problems(&mut problems);
        }
        if let Some(delta) = &self.abilities {
            delta.collect_problems(&mut problems);
        }
        if let Some(delta) = &self.traits {
            delta.collect_problems(&mut problems);
        }
        if let Some(delta) = &self.behavior {
            delta.collect_problems(&mut problems);
        }
        problems
    }

    /// Whether the change is non-empty and free of contradictions.
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Fail with [`ChangeError::Structural`] if the change is malformed.
    pub fn ensure_valid(&self) -> Result<(), ChangeError> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ChangeError::Structural {
                change_id: self.id,
                problems,
            })
        }
    }

    // -----------------------------------------------------------------------
    // Conflicts and combination
    // -----------------------------------------------------------------------

    /// Whether the change removes a trait that `other` relies on.
    fn removes_dependency_of(&self, other: &Self) -> bool {
        let Some(removed) = self.traits.as_ref().map(|t| &t.remove) else {
            return false;
        };
        removed.iter().any(|id| other.depends_on_trait(id))
    }

    /// Whether the change needs `trait_id` to be held.
    pub fn depends_on_trait(&self, trait_id: &str) -> bool {
        let trait_dependency = self.traits.as_ref().is_some_and(|delta| {
            delta
                .add
                .iter()
                .any(|a| a.definition.prerequisites.contains(trait_id))
                || delta.modified_ids().contains(trait_id)
        });
        let ability_dependency = self.abilities.as_ref().is_some_and(|delta| {
            delta
                .add
                .values()
                .any(|a| a.required_traits.contains(trait_id))
        });
        trait_dependency || ability_dependency
    }

    /// Whether the two changes target the same attribute with different
    /// outcomes, or one removes a trait the other depends on.
    pub fn conflicts_with(&self, other: &Self) -> bool {
        let section_conflict = match (&self.physical, &other.physical) {
            (Some(a), Some(b)) => a.conflicts_with(b),
            _ => false,
        } || match (&self.abilities, &other.abilities) {
            (Some(a), Some(b)) => a.conflicts_with(b),
            _ => false,
        } || match (&self.traits, &other.traits) {
            (Some(a), Some(b)) => a.conflicts_with(b),
            _ => false,
        } || match (&self.behavior, &other.behavior) {
            (Some(a), Some(b)) => a.conflicts_with(b),
            _ => false,
        };
        section_conflict || self.removes_dependency_of(other) || other.removes_dependency_of(self)
    }

    /// Whether the two changes can be merged into one.
    pub fn can_combine_with(&self, other: &Self) -> bool {
        self.id != other.id && !self.conflicts_with(other)
    }

    /// Merge two non-conflicting changes.
    ///
    /// The result is the same whichever change receives the call: it takes
    /// the smaller id, the later timestamp, the higher priority, the union of
    /// tags, the shared source (or `System` when sources differ), and the
    /// union of both deltas with the older change's trait additions first.
    pub fn combine_with(&self, other: &Self) -> Result<Self, ChangeError> {
        if !self.can_combine_with(other) {
            return Err(ChangeError::NotCombinable {
                change_id: self.id,
                other: other.id,
            });
        }
        let (first, second) = if self.id <= other.id {
            (self, other)
        } else {
            (other, self)
        };

        Ok(Self {
            id: first.id,
            source: if first.source == second.source {
                first.source
            } else {
                ChangeSource::System
            },
            priority: first.priority.max(second.priority),
            tags: first.tags.union(&second.tags).cloned().collect(),
            description: first
                .description
                .clone()
                .or_else(|| second.description.clone()),
            timestamp: first.timestamp.max(second.timestamp),
            probabilistic: first.probabilistic || second.probabilistic,
            physical: merge_section(
                first.physical.as_ref(),
                second.physical.as_ref(),
                PhysicalChange::merge,
            ),
            abilities: merge_section(
                first.abilities.as_ref(),
                second.abilities.as_ref(),
                AbilityChange::merge,
            ),
            traits: merge_section(
                first.traits.as_ref(),
                second.traits.as_ref(),
                TraitChange::merge_ordered,
            ),
            behavior: merge_section(
                first.behavior.as_ref(),
                second.behavior.as_ref(),
                BehaviorChange::merge,
            ),
            priors: None,
        })
    }

    // -----------------------------------------------------------------------
    // Resolution and inversion
    // -----------------------------------------------------------------------

    /// Capture the prior values this change would overwrite in `state`.
    #[must_use]
    pub fn resolve(&self, state: &CreatureState) -> Self {
        let abilities = self
            .abilities
            .as_ref()
            .map(|delta| {
                delta
                    .add
                    .keys()
                    .chain(delta.remove.iter())
                    .chain(delta.power.keys())
                    .map(|id| (id.clone(), state.abilities.get(id).cloned()))
                    .collect()
            })
            .unwrap_or_default();

        let mut resolved = self.clone();
        resolved.priors = Some(ChangePriors {
            physical: self.physical.as_ref().map(|_| state.physical.clone()),
            abilities,
            traits: self.traits.as_ref().map(|_| state.traits.clone()),
            behavior: self.behavior.as_ref().map(|_| state.behavior.clone()),
        });
        resolved
    }

    /// Produce the change that exactly reverses this one.
    ///
    /// # Errors
    ///
    /// Returns [`ChangeError::NoInverse`] if the change is probabilistic,
    /// has not been resolved, or had no effect to reverse.
    pub fn generate_undo(&self) -> Result<Self, ChangeError> {
        let no_inverse = |reason: &str| ChangeError::NoInverse {
            change_id: self.id,
            reason: reason.to_owned(),
        };
        if self.probabilistic {
            return Err(no_inverse("probabilistic outcome"));
        }
        let priors = self
            .priors
            .as_ref()
            .ok_or_else(|| no_inverse("change was never resolved against a state"))?;

        let mut inverse = Self::new(ChangeSource::System)
            .with_priority(self.priority)
            .with_tag(UNDO_TAG)
            .with_description(format!("undo {}", self.id));

        if let (Some(delta), Some(prior)) = (&self.physical, &priors.physical) {
            inverse.physical = non_empty(invert_physical(delta, prior), PhysicalChange::is_empty);
        }
        if let Some(delta) = &self.abilities {
            inverse.abilities =
                non_empty(invert_abilities(delta, &priors.abilities), AbilityChange::is_empty);
        }
        if let (Some(delta), Some(prior)) = (&self.traits, &priors.traits) {
            inverse.traits = non_empty(invert_traits(delta, prior), TraitChange::is_empty);
        }
        if let (Some(delta), Some(prior)) = (&self.behavior, &priors.behavior) {
            inverse.behavior = non_empty(invert_behavior(delta, prior), BehaviorChange::is_empty);
        }

        if inverse.sections().is_empty() {
            return Err(no_inverse("change had no effect"));
        }
        Ok(inverse)
    }
}

fn merge_section<T: Clone>(
    first: Option<&T>,
    second: Option<&T>,
    merge: fn(&T, &T) -> T,
) -> Option<T> {
    match (first, second) {
        (Some(a), Some(b)) => Some(merge(a, b)),
        (Some(a), None) => Some(a.clone()),
        (None, Some(b)) => Some(b.clone()),
        (None, None) => None,
    }
}

fn non_empty<T>(delta: T, is_empty: fn(&T) -> bool) -> Option<T> {
    if is_empty(&delta) { None } else { Some(delta) }
}

fn invert_physical(delta: &PhysicalChange, prior: &PhysicalForm) -> PhysicalChange {
    PhysicalChange {
        size: delta.size.map(|_| prior.size),
        shape: delta.shape.map(|_| prior.shape),
        locomotion: delta.locomotion.map(|_| prior.locomotion),
        add_locomotion: delta
            .remove_locomotion
            .intersection(&prior.secondary_locomotion)
            .copied()
            .collect(),
        remove_locomotion: delta
            .add_locomotion
            .difference(&prior.secondary_locomotion)
            .copied()
            .collect(),
        add_features: delta
            .remove_features
            .intersection(&prior.features)
            .cloned()
            .collect(),
        remove_features: delta
            .add_features
            .difference(&prior.features)
            .cloned()
            .collect(),
        modifiers: delta
            .modifiers
            .keys()
            .map(|key| (key.clone(), prior.modifiers.get(key).copied()))
            .collect(),
    }
}

fn invert_abilities(
    delta: &AbilityChange,
    prior: &BTreeMap<String, Option<AbilityDefinition>>,
) -> AbilityChange {
    let mut inverse = AbilityChange::default();
    for id in delta.add.keys() {
        match prior.get(id).and_then(Option::as_ref) {
            Some(previous) => {
                inverse.add.insert(id.clone(), previous.clone());
            }
            None => {
                inverse.remove.insert(id.clone());
            }
        }
    }
    for id in &delta.remove {
        if let Some(previous) = prior.get(id).and_then(Option::as_ref) {
            inverse.add.insert(id.clone(), previous.clone());
        }
    }
    for id in delta.power.keys() {
        if let Some(previous) = prior.get(id).and_then(Option::as_ref) {
            inverse.power.insert(id.clone(), previous.power);
        }
    }
    inverse
}

fn invert_traits(delta: &TraitChange, prior: &[ActiveTrait]) -> TraitChange {
    let held = |id: &str| prior.iter().position(|t| t.id() == id);
    let mut inverse = TraitChange::default();

    for addition in &delta.add {
        if held(addition.definition.id.as_str()).is_none() {
            inverse.remove.insert(addition.definition.id.clone());
        }
    }

    let mut restored: Vec<TraitAddition> = delta
        .remove
        .iter()
        .filter_map(|id| {
            let index = held(id.as_str())?;
            let previous = prior.get(index)?;
            Some(TraitAddition {
                definition: previous.definition.clone(),
                strength: previous.strength,
                form: previous.form.clone(),
                suppressed: previous.suppressed,
                position: Some(index),
            })
        })
        .collect();
    restored.sort_by_key(|a| a.position);
    inverse.add = restored;

    for (id, previous) in prior.iter().map(|t| (t.id(), t)) {
        if delta.strength.contains_key(id) {
            inverse.strength.insert(id.to_owned(), previous.strength);
        }
        if delta.forms.contains_key(id) {
            inverse.forms.insert(id.to_owned(), previous.form.clone());
        }
        if delta.suppress.contains(id) && !previous.suppressed {
            inverse.restore.insert(id.to_owned());
        }
        if delta.restore.contains(id) && previous.suppressed {
            inverse.suppress.insert(id.to_owned());
        }
    }
    inverse
}

fn invert_behavior(delta: &BehaviorChange, prior: &BehaviorRecord) -> BehaviorChange {
    BehaviorChange {
        intelligence: delta.intelligence.map(|_| prior.intelligence),
        aggression: delta.aggression.map(|_| prior.aggression),
        social: delta.social.map(|_| prior.social),
        add_behaviors: delta
            .remove_behaviors
            .intersection(&prior.behaviors)
            .cloned()
            .collect(),
        remove_behaviors: delta
            .add_behaviors
            .difference(&prior.behaviors)
            .cloned()
            .collect(),
        modifiers: delta
            .modifiers
            .keys()
            .map(|key| (key.clone(), prior.modifiers.get(key).copied()))
            .collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crescent_types::{Size, TraitDefinition};

    use super::*;

    fn size_change(size: Size) -> FormChange {
        FormChange::new(ChangeSource::Manual)
            .with_physical(PhysicalChange::default().with_size(size))
    }

    #[test]
    fn empty_change_is_invalid() {
        let change = FormChange::new(ChangeSource::Manual);
        assert!(!change.is_valid());
        let change = change.with_physical(PhysicalChange::default());
        assert!(!change.is_valid());
        assert!(matches!(
            change.ensure_valid(),
            Err(ChangeError::Structural { .. })
        ));
    }

    #[test]
    fn removing_a_prerequisite_conflicts() {
        let lose = FormChange::new(ChangeSource::Manual)
            .with_traits(TraitChange::default().lose("scaled"));
        let gain = FormChange::new(ChangeSource::Evolution).with_traits(
            TraitChange::default()
                .gain(TraitDefinition::new("fireproof", "Fireproof").requires("scaled")),
        );
        assert!(lose.conflicts_with(&gain));
        assert!(gain.conflicts_with(&lose));
    }

    #[test]
    fn combine_is_commutative() {
        let a = size_change(Size::Large).with_tag("a");
        let b = FormChange::new(ChangeSource::Environment)
            .with_priority(ChangePriority::High)
            .with_traits(TraitChange::default().gain(TraitDefinition::new("gills", "Gills")))
            .with_tag("b");
        let ab = a.combine_with(&b).unwrap();
        let ba = b.combine_with(&a).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.id(), a.id().min(b.id()));
        assert_eq!(ab.source(), ChangeSource::System);
        assert_eq!(ab.priority(), ChangePriority::High);
        assert_eq!(ab.tags().len(), 2);
    }

    #[test]
    fn conflicting_changes_do_not_combine() {
        let a = size_change(Size::Large);
        let b = size_change(Size::Small);
        assert!(!a.can_combine_with(&b));
        assert!(matches!(
            a.combine_with(&b),
            Err(ChangeError::NotCombinable { .. })
        ));
    }

    #[test]
    fn unresolved_and_probabilistic_changes_have_no_inverse() {
        let change = size_change(Size::Huge);
        assert!(matches!(
            change.generate_undo(),
            Err(ChangeError::NoInverse { .. })
        ));

        let state = CreatureState::new("Ember");
        let random = size_change(Size::Huge).probabilistic().resolve(&state);
        assert!(matches!(
            random.generate_undo(),
            Err(ChangeError::NoInverse { .. })
        ));
    }

    #[test]
    fn inverse_restores_prior_scalars() {
        let state = CreatureState::new("Ember");
        let change = size_change(Size::Huge).resolve(&state);
        let inverse = change.generate_undo().unwrap();
        assert_eq!(inverse.physical().unwrap().size, Some(Size::Medium));
        assert!(inverse.tags().contains(UNDO_TAG));
    }

    #[test]
    fn inverse_of_removal_remembers_position() {
        let state = CreatureState::new("Ember")
            .with_trait(TraitDefinition::new("scaled", "Scaled"))
            .with_trait(TraitDefinition::new("horned", "Horned"));
        let change = FormChange::new(ChangeSource::Manual)
            .with_traits(TraitChange::default().lose("scaled"))
            .resolve(&state);
        let inverse = change.generate_undo().unwrap();
        let addition = &inverse.traits().unwrap().add[0];
        assert_eq!(addition.definition.id, "scaled");
        assert_eq!(addition.position, Some(0));
    }
}
