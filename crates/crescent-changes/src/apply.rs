//! Application of a change to a creature's state.
//!
//! Sections are applied in fixed order (physical, abilities, traits,
//! behavior) on a working copy. The copy replaces the live state only if
//! every state invariant still holds afterwards, so a failed application
//! never leaves a half-changed creature behind.

use crescent_types::{CreatureState, TraitDefinition, is_unit};

use crate::change::FormChange;
use crate::delta::{AbilityChange, BehaviorChange, ChangeSection, PhysicalChange, TraitChange};
use crate::error::ChangeError;

/// Apply `change` to `state` atomically.
///
/// # Errors
///
/// Returns [`ChangeError::StateInvariant`] if the result would break a state
/// invariant; `state` is left untouched in that case.
pub fn apply_change(state: &mut CreatureState, change: &FormChange) -> Result<(), ChangeError> {
    let mut working = state.clone();
    let mut violations = Vec::new();

    for section in ChangeSection::ORDER {
        match section {
            ChangeSection::Physical => {
                if let Some(delta) = change.physical() {
                    apply_physical(&mut working, delta);
                }
            }
            ChangeSection::Abilities => {
                if let Some(delta) = change.abilities() {
                    apply_abilities(&mut working, delta);
                }
            }
            ChangeSection::Traits => {
                if let Some(delta) = change.traits() {
                    apply_traits(&mut working, delta, &mut violations);
                }
            }
            ChangeSection::Behavior => {
                if let Some(delta) = change.behavior() {
                    apply_behavior(&mut working, delta);
                }
            }
        }
    }

    working.recalculate_power();
    if change.source().is_mutation() {
        working.mutated = true;
    }

    violations.extend(invariant_violations(&working));
    if !violations.is_empty() {
        return Err(ChangeError::StateInvariant {
            change_id: change.id(),
            violations,
        });
    }

    *state = working;
    Ok(())
}

/// Invariants every creature state must satisfy.
pub fn invariant_violations(state: &CreatureState) -> Vec<String> {
    let mut violations = Vec::new();
    let mut seen = std::collections::BTreeSet::new();
    for active in &state.traits {
        if !seen.insert(active.id()) {
            violations.push(format!("trait {} is held twice", active.id()));
        }
        if !is_unit(active.strength) {
            violations.push(format!(
                "trait {} strength {} is outside [0, 1]",
                active.id(),
                active.strength
            ));
        }
    }
    for ability in state.abilities.values() {
        if !is_unit(ability.power) {
            violations.push(format!(
                "ability {} power {} is outside [0, 1]",
                ability.id, ability.power
            ));
        }
    }
    if !is_unit(state.power_level) {
        violations.push(format!("power level {} is outside [0, 1]", state.power_level));
    }
    violations
}

fn apply_physical(state: &mut CreatureState, delta: &PhysicalChange) {
    let form = &mut state.physical;
    if let Some(size) = delta.size {
        form.size = size;
    }
    if let Some(shape) = delta.shape {
        form.shape = shape;
    }
    if let Some(locomotion) = delta.locomotion {
        form.locomotion = locomotion;
    }
    for mode in &delta.remove_locomotion {
        form.secondary_locomotion.remove(mode);
    }
    form.secondary_locomotion
        .extend(delta.add_locomotion.iter().copied());
    for feature in &delta.remove_features {
        form.features.remove(feature);
    }
    form.features.extend(delta.add_features.iter().cloned());
    for (key, value) in &delta.modifiers {
        match value {
            Some(v) => {
                form.modifiers.insert(key.clone(), *v);
            }
            None => {
                form.modifiers.remove(key);
            }
        }
    }
}

fn apply_abilities(state: &mut CreatureState, delta: &AbilityChange) {
    for id in &delta.remove {
        state.abilities.remove(id);
    }
    for (id, ability) in &delta.add {
        state.abilities.insert(id.clone(), ability.clone());
    }
    for (id, power) in &delta.power {
        if let Some(ability) = state.abilities.get_mut(id) {
            ability.power = *power;
        }
    }
}

fn apply_traits(state: &mut CreatureState, delta: &TraitChange, violations: &mut Vec<String>) {
    state.traits.retain(|t| !delta.remove.contains(t.id()));

    let mut additions: Vec<_> = delta.add.iter().collect();
    additions.sort_by_key(|a| a.position.unwrap_or(usize::MAX));
    for addition in additions {
        if state.has_trait(&addition.definition.id) {
            violations.push(format!("trait {} is already held", addition.definition.id));
            continue;
        }
        let active = crescent_types::ActiveTrait {
            definition: addition.definition.clone(),
            strength: addition.strength,
            form: addition.form.clone(),
            suppressed: addition.suppressed,
        };
        let index = addition
            .position
            .map_or(state.traits.len(), |p| p.min(state.traits.len()));
        state.traits.insert(index, active);
    }

    for active in &mut state.traits {
        let id = active.definition.id.as_str();
        if let Some(strength) = delta.strength.get(id) {
            active.strength = *strength;
        }
        if let Some(form) = delta.forms.get(id) {
            active.form.clone_from(form);
        }
        if delta.suppress.contains(id) {
            active.suppressed = true;
        }
        if delta.restore.contains(id) {
            active.suppressed = false;
        }
    }
}

fn apply_behavior(state: &mut CreatureState, delta: &BehaviorChange) {
    let record = &mut state.behavior;
    if let Some(intelligence) = delta.intelligence {
        record.intelligence = intelligence;
    }
    if let Some(aggression) = delta.aggression {
        record.aggression = aggression;
    }
    if let Some(social) = delta.social {
        record.social = social;
    }
    for behavior in &delta.remove_behaviors {
        record.behaviors.remove(behavior);
    }
    record.behaviors.extend(delta.add_behaviors.iter().cloned());
    for (key, value) in &delta.modifiers {
        match value {
            Some(v) => {
                record.modifiers.insert(key.clone(), *v);
            }
            None => {
                record.modifiers.remove(key);
            }
        }
    }
}

/// Definitions of the traits a change adds, for rule evaluation.
pub(crate) fn added_definitions(change: &FormChange) -> Vec<&TraitDefinition> {
    change
        .traits()
        .map(|delta| delta.add.iter().map(|a| &a.definition).collect())
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crescent_types::{AbilityDefinition, ChangeSource, Size, TraitDefinition};

    use super::*;

    #[test]
    fn applies_sections_and_sets_mutation_flag() {
        let mut state = CreatureState::new("Ember");
        let change = FormChange::new(ChangeSource::Stress)
            .with_physical(PhysicalChange::default().with_size(Size::Large))
            .with_abilities(
                AbilityChange::default().grant(AbilityDefinition::new("bite", "Bite", 0.5)),
            );
        apply_change(&mut state, &change).unwrap();
        assert_eq!(state.physical.size, Size::Large);
        assert!(state.has_ability("bite"));
        assert!(state.mutated);
        assert!(state.power_level > 0.0);
    }

    #[test]
    fn manual_change_does_not_mark_mutation() {
        let mut state = CreatureState::new("Ember");
        let change = FormChange::new(ChangeSource::Manual)
            .with_physical(PhysicalChange::default().add_feature("horns"));
        apply_change(&mut state, &change).unwrap();
        assert!(!state.mutated);
    }

    #[test]
    fn duplicate_trait_breaks_invariant_and_leaves_state() {
        let mut state =
            CreatureState::new("Ember").with_trait(TraitDefinition::new("fireproof", "Fireproof"));
        let before = state.clone();
        let change = FormChange::new(ChangeSource::Manual)
            .with_traits(TraitChange::default().gain(TraitDefinition::new("fireproof", "Again")));
        let err = apply_change(&mut state, &change).unwrap_err();
        assert!(matches!(err, ChangeError::StateInvariant { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn out_of_range_strength_is_caught() {
        let mut state =
            CreatureState::new("Ember").with_trait(TraitDefinition::new("scaled", "Scaled"));
        let change = FormChange::new(ChangeSource::Manual)
            .with_traits(TraitChange::default().set_strength("scaled", 1.5));
        assert!(apply_change(&mut state, &change).is_err());
    }

    #[test]
    fn positioned_addition_inserts_in_place() {
        let mut state = CreatureState::new("Ember")
            .with_trait(TraitDefinition::new("a", "A"))
            .with_trait(TraitDefinition::new("c", "C"));
        let mut delta = TraitChange::default().gain(TraitDefinition::new("b", "B"));
        delta.add[0].position = Some(1);
        let change = FormChange::new(ChangeSource::Manual).with_traits(delta);
        apply_change(&mut state, &change).unwrap();
        let order: Vec<_> = state.traits.iter().map(|t| t.id().to_owned()).collect();
        assert_eq!(order, ["a", "b", "c"]);
    }
}
