//! Per-section deltas carried by a [`FormChange`](crate::FormChange).
//!
//! Each delta uses set semantics: scalar targets are `Option`s, collections
//! are expressed as add/remove sets, and numeric modifiers map a key to
//! `Some(value)` (set) or `None` (clear). Two deltas *conflict* when they
//! drive the same attribute to different outcomes; non-conflicting deltas
//! merge by union, which makes merging order-independent.

use std::collections::{BTreeMap, BTreeSet};

use crescent_types::{
    AbilityDefinition, Aggression, BodyShape, Intelligence, Locomotion, Size, SocialStructure,
    TraitDefinition,
};
use serde::{Deserialize, Serialize};

/// One of the four independently applicable sections of a change.
///
/// Sections are always applied in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChangeSection {
    /// Physical form.
    Physical,
    /// Held abilities.
    Abilities,
    /// Active traits.
    Traits,
    /// Behavior record.
    Behavior,
}

impl ChangeSection {
    /// All sections in application order.
    pub const ORDER: [Self; 4] = [Self::Physical, Self::Abilities, Self::Traits, Self::Behavior];
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Both sides set a scalar, to different values.
fn scalar_conflict<T: PartialEq>(a: Option<&T>, b: Option<&T>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x != y)
}

/// One side adds what the other removes.
fn set_conflict<T: Ord>(
    add_a: &BTreeSet<T>,
    remove_a: &BTreeSet<T>,
    add_b: &BTreeSet<T>,
    remove_b: &BTreeSet<T>,
) -> bool {
    !add_a.is_disjoint(remove_b) || !remove_a.is_disjoint(add_b)
}

/// Both sides target the same key with different values.
fn map_conflict<V: PartialEq>(a: &BTreeMap<String, V>, b: &BTreeMap<String, V>) -> bool {
    a.iter()
        .any(|(key, value)| b.get(key).is_some_and(|other| other != value))
}

fn union<T: Ord + Clone>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> BTreeSet<T> {
    a.union(b).cloned().collect()
}

fn merge_maps<V: Clone>(a: &BTreeMap<String, V>, b: &BTreeMap<String, V>) -> BTreeMap<String, V> {
    let mut merged = a.clone();
    for (key, value) in b {
        merged.entry(key.clone()).or_insert_with(|| value.clone());
    }
    merged
}

fn overlap_problem<T: Ord + core::fmt::Debug>(
    problems: &mut Vec<String>,
    what: &str,
    add: &BTreeSet<T>,
    remove: &BTreeSet<T>,
) {
    for item in add.intersection(remove) {
        problems.push(format!("{what} {item:?} is both added and removed"));
    }
}

fn finite_problem(problems: &mut Vec<String>, what: &str, key: &str, value: f32) {
    if !value.is_finite() {
        problems.push(format!("{what} for {key} is not a finite number"));
    }
}

// ---------------------------------------------------------------------------
// Physical
// ---------------------------------------------------------------------------

/// Delta against a creature's physical form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicalChange {
    /// New body size.
    pub size: Option<Size>,
    /// New body plan.
    pub shape: Option<BodyShape>,
    /// New primary locomotion.
    pub locomotion: Option<Locomotion>,
    /// Secondary locomotion modes gained.
    pub add_locomotion: BTreeSet<Locomotion>,
    /// Secondary locomotion modes lost.
    pub remove_locomotion: BTreeSet<Locomotion>,
    /// Features gained.
    pub add_features: BTreeSet<String>,
    /// Features lost.
    pub remove_features: BTreeSet<String>,
    /// Modifier targets; `None` clears the modifier.
    pub modifiers: BTreeMap<String, Option<f32>>,
}

impl PhysicalChange {
    /// Set the body size.
    #[must_use]
    pub const fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the body plan.
    #[must_use]
    pub const fn with_shape(mut self, shape: BodyShape) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Set the primary locomotion.
    #[must_use]
    pub const fn with_locomotion(mut self, locomotion: Locomotion) -> Self {
        self.locomotion = Some(locomotion);
        self
    }

    /// Gain a secondary locomotion mode.
    #[must_use]
    pub fn add_secondary(mut self, locomotion: Locomotion) -> Self {
        self.add_locomotion.insert(locomotion);
        self
    }

    /// Lose a secondary locomotion mode.
    #[must_use]
    pub fn remove_secondary(mut self, locomotion: Locomotion) -> Self {
        self.remove_locomotion.insert(locomotion);
        self
    }

    /// Gain a feature.
    #[must_use]
    pub fn add_feature(mut self, feature: impl Into<String>) -> Self {
        self.add_features.insert(feature.into());
        self
    }

    /// Lose a feature.
    #[must_use]
    pub fn remove_feature(mut self, feature: impl Into<String>) -> Self {
        self.remove_features.insert(feature.into());
        self
    }

    /// Set a modifier.
    #[must_use]
    pub fn set_modifier(mut self, key: impl Into<String>, value: f32) -> Self {
        self.modifiers.insert(key.into(), Some(value));
        self
    }

    /// Whether the delta changes nothing.
    pub fn is_empty(&self) -> bool {
        self.size.is_none()
            && self.shape.is_none()
            && self.locomotion.is_none()
            && self.add_locomotion.is_empty()
            && self.remove_locomotion.is_empty()
            && self.add_features.is_empty()
            && self.remove_features.is_empty()
            && self.modifiers.is_empty()
    }

    pub(crate) fn collect_problems(&self, problems: &mut Vec<String>) {
        overlap_problem(problems, "locomotion", &self.add_locomotion, &self.remove_locomotion);
        overlap_problem(problems, "feature", &self.add_features, &self.remove_features);
        for (key, value) in &self.modifiers {
            if let Some(v) = value {
                finite_problem(problems, "physical modifier", key, *v);
            }
        }
    }

    /// Whether the two deltas drive an attribute to different outcomes.
    pub fn conflicts_with(&self, other: &Self) -> bool {
        scalar_conflict(self.size.as_ref(), other.size.as_ref())
            || scalar_conflict(self.shape.as_ref(), other.shape.as_ref())
            || scalar_conflict(self.locomotion.as_ref(), other.locomotion.as_ref())
            || set_conflict(
                &self.add_locomotion,
                &self.remove_locomotion,
                &other.add_locomotion,
                &other.remove_locomotion,
            )
            || set_conflict(
                &self.add_features,
                &self.remove_features,
                &other.add_features,
                &other.remove_features,
            )
            || map_conflict(&self.modifiers, &other.modifiers)
    }

    pub(crate) fn merge(&self, other: &Self) -> Self {
        Self {
            size: self.size.or(other.size),
            shape: self.shape.or(other.shape),
            locomotion: self.locomotion.or(other.locomotion),
            add_locomotion: union(&self.add_locomotion, &other.add_locomotion),
            remove_locomotion: union(&self.remove_locomotion, &other.remove_locomotion),
            add_features: union(&self.add_features, &other.add_features),
            remove_features: union(&self.remove_features, &other.remove_features),
            modifiers: merge_maps(&self.modifiers, &other.modifiers),
        }
    }
}

// ---------------------------------------------------------------------------
// Abilities
// ---------------------------------------------------------------------------

/// Delta against a creature's held abilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilityChange {
    /// Abilities gained, keyed by ability id.
    pub add: BTreeMap<String, AbilityDefinition>,
    /// Abilities lost.
    pub remove: BTreeSet<String>,
    /// New power for already held abilities.
    pub power: BTreeMap<String, f32>,
}

impl AbilityChange {
    /// Gain an ability.
    #[must_use]
    pub fn grant(mut self, ability: AbilityDefinition) -> Self {
        self.add.insert(ability.id.clone(), ability);
        self
    }

    /// Lose an ability.
    #[must_use]
    pub fn revoke(mut self, ability_id: impl Into<String>) -> Self {
        self.remove.insert(ability_id.into());
        self
    }

    /// Set the power of a held ability.
    #[must_use]
    pub fn set_power(mut self, ability_id: impl Into<String>, power: f32) -> Self {
        self.power.insert(ability_id.into(), power);
        self
    }

    /// Whether the delta changes nothing.
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty() && self.power.is_empty()
    }

    pub(crate) fn collect_problems(&self, problems: &mut Vec<String>) {
        for (key, ability) in &self.add {
            if *key != ability.id {
                problems.push(format!("ability keyed as {key} has id {}", ability.id));
            }
            if self.remove.contains(key) {
                problems.push(format!("ability {key} is both added and removed"));
            }
            if self.power.contains_key(key) {
                problems.push(format!("ability {key} is added and re-powered at once"));
            }
            finite_problem(problems, "ability power", key, ability.power);
        }
        for (key, value) in &self.power {
            if self.remove.contains(key) {
                problems.push(format!("ability {key} is removed and re-powered at once"));
            }
            finite_problem(problems, "ability power", key, *value);
        }
    }

    /// Whether the two deltas drive an ability to different outcomes.
    pub fn conflicts_with(&self, other: &Self) -> bool {
        let touches = |delta: &Self, id: &String| {
            delta.add.contains_key(id) || delta.power.contains_key(id)
        };
        map_conflict(&self.add, &other.add)
            || map_conflict(&self.power, &other.power)
            || self.remove.iter().any(|id| touches(other, id))
            || other.remove.iter().any(|id| touches(self, id))
    }

    pub(crate) fn merge(&self, other: &Self) -> Self {
        Self {
            add: merge_maps(&self.add, &other.add),
            remove: union(&self.remove, &other.remove),
            power: merge_maps(&self.power, &other.power),
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A trait gained by a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitAddition {
    /// The trait's definition.
    pub definition: TraitDefinition,
    /// Initial strength.
    pub strength: f32,
    /// Initial synthesized form.
    pub form: Option<String>,
    /// Whether the trait arrives suppressed.
    pub suppressed: bool,
    /// Insertion index; `None` appends.
    pub position: Option<usize>,
}

impl TraitAddition {
    /// A fully expressed trait appended to the end of the trait list.
    pub const fn new(definition: TraitDefinition) -> Self {
        Self {
            definition,
            strength: 1.0,
            form: None,
            suppressed: false,
            position: None,
        }
    }
}

/// Delta against a creature's active traits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitChange {
    /// Traits gained.
    pub add: Vec<TraitAddition>,
    /// Traits lost.
    pub remove: BTreeSet<String>,
    /// New strength for held traits.
    pub strength: BTreeMap<String, f32>,
    /// New synthesized form for held traits; `None` clears the form.
    pub forms: BTreeMap<String, Option<String>>,
    /// Held traits to suppress.
    pub suppress: BTreeSet<String>,
    /// Held traits to restore from suppression.
    pub restore: BTreeSet<String>,
}

impl TraitChange {
    /// Gain a trait at full strength.
    #[must_use]
    pub fn gain(mut self, definition: TraitDefinition) -> Self {
        self.add.push(TraitAddition::new(definition));
        self
    }

    /// Lose a trait.
    #[must_use]
    pub fn lose(mut self, trait_id: impl Into<String>) -> Self {
        self.remove.insert(trait_id.into());
        self
    }

    /// Set the strength of a held trait.
    #[must_use]
    pub fn set_strength(mut self, trait_id: impl Into<String>, strength: f32) -> Self {
        self.strength.insert(trait_id.into(), strength);
        self
    }

    /// Set or clear the synthesized form of a held trait.
    #[must_use]
    pub fn set_form(mut self, trait_id: impl Into<String>, form: Option<String>) -> Self {
        self.forms.insert(trait_id.into(), form);
        self
    }

    /// Suppress a held trait.
    #[must_use]
    pub fn suppress(mut self, trait_id: impl Into<String>) -> Self {
        self.suppress.insert(trait_id.into());
        self
    }

    /// Restore a suppressed trait.
    #[must_use]
    pub fn restore(mut self, trait_id: impl Into<String>) -> Self {
        self.restore.insert(trait_id.into());
        self
    }

    /// Ids of the traits gained.
    pub fn added_ids(&self) -> BTreeSet<String> {
        self.add.iter().map(|a| a.definition.id.clone()).collect()
    }

    /// Ids of held traits this delta modifies without adding or removing.
    pub fn modified_ids(&self) -> BTreeSet<String> {
        self.strength
            .keys()
            .chain(self.forms.keys())
            .chain(self.suppress.iter())
            .chain(self.restore.iter())
            .cloned()
            .collect()
    }

    /// Whether the delta changes nothing.
    pub fn is_empty(&self) -> bool {
        self.add.is_empty()
            && self.remove.is_empty()
            && self.strength.is_empty()
            && self.forms.is_empty()
            && self.suppress.is_empty()
            && self.restore.is_empty()
    }

    pub(crate) fn collect_problems(&self, problems: &mut Vec<String>) {
        let mut seen = BTreeSet::new();
        for addition in &self.add {
            let id = &addition.definition.id;
            if !seen.insert(id.clone()) {
                problems.push(format!("trait {id} is added twice"));
            }
            if self.remove.contains(id) {
                problems.push(format!("trait {id} is both added and removed"));
            }
            finite_problem(problems, "trait strength", id, addition.strength);
        }
        overlap_problem(problems, "trait", &self.suppress, &self.restore);
        for id in self.modified_ids() {
            if self.remove.contains(&id) {
                problems.push(format!("trait {id} is removed and modified at once"));
            }
        }
        for (id, value) in &self.strength {
            finite_problem(problems, "trait strength", id, *value);
        }
    }

    /// Whether the two deltas drive a trait to different outcomes.
    pub fn conflicts_with(&self, other: &Self) -> bool {
        let additions = |delta: &Self| -> BTreeMap<String, TraitAddition> {
            delta
                .add
                .iter()
                .map(|a| (a.definition.id.clone(), a.clone()))
                .collect()
        };
        let touches = |delta: &Self, id: &String| {
            delta.added_ids().contains(id) || delta.modified_ids().contains(id)
        };
        map_conflict(&additions(self), &additions(other))
            || map_conflict(&self.strength, &other.strength)
            || map_conflict(&self.forms, &other.forms)
            || !self.suppress.is_disjoint(&other.restore)
            || !self.restore.is_disjoint(&other.suppress)
            || self.remove.iter().any(|id| touches(other, id))
            || other.remove.iter().any(|id| touches(self, id))
    }

    /// Merge with `first` providing additions ahead of `second`.
    pub(crate) fn merge_ordered(first: &Self, second: &Self) -> Self {
        let mut add = first.add.clone();
        for addition in &second.add {
            if !add.iter().any(|a| a.definition.id == addition.definition.id) {
                add.push(addition.clone());
            }
        }
        Self {
            add,
            remove: union(&first.remove, &second.remove),
            strength: merge_maps(&first.strength, &second.strength),
            forms: merge_maps(&first.forms, &second.forms),
            suppress: union(&first.suppress, &second.suppress),
            restore: union(&first.restore, &second.restore),
        }
    }
}

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// Delta against a creature's behavior record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorChange {
    /// New cognitive capacity.
    pub intelligence: Option<Intelligence>,
    /// New disposition.
    pub aggression: Option<Aggression>,
    /// New social organisation.
    pub social: Option<SocialStructure>,
    /// Behaviors gained.
    pub add_behaviors: BTreeSet<String>,
    /// Behaviors lost.
    pub remove_behaviors: BTreeSet<String>,
    /// Modifier targets; `None` clears the modifier.
    pub modifiers: BTreeMap<String, Option<f32>>,
}

impl BehaviorChange {
    /// Set the disposition.
    #[must_use]
    pub const fn with_aggression(mut self, aggression: Aggression) -> Self {
        self.aggression = Some(aggression);
        self
    }

    /// Set the cognitive capacity.
    #[must_use]
    pub const fn with_intelligence(mut self, intelligence: Intelligence) -> Self {
        self.intelligence = Some(intelligence);
        self
    }

    /// Set the social organisation.
    #[must_use]
    pub const fn with_social(mut self, social: SocialStructure) -> Self {
        self.social = Some(social);
        self
    }

    /// Gain a behavior.
    #[must_use]
    pub fn add_behavior(mut self, behavior: impl Into<String>) -> Self {
        self.add_behaviors.insert(behavior.into());
        self
    }

    /// Lose a behavior.
    #[must_use]
    pub fn remove_behavior(mut self, behavior: impl Into<String>) -> Self {
        self.remove_behaviors.insert(behavior.into());
        self
    }

    /// Whether the delta changes nothing.
    pub fn is_empty(&self) -> bool {
        self.intelligence.is_none()
            && self.aggression.is_none()
            && self.social.is_none()
            && self.add_behaviors.is_empty()
            && self.remove_behaviors.is_empty()
            && self.modifiers.is_empty()
    }

    pub(crate) fn collect_problems(&self, problems: &mut Vec<String>) {
        overlap_problem(problems, "behavior", &self.add_behaviors, &self.remove_behaviors);
        for (key, value) in &self.modifiers {
            if let Some(v) = value {
                finite_problem(problems, "behavior modifier", key, *v);
            }
        }
    }

    /// Whether the two deltas drive an attribute to different outcomes.
    pub fn conflicts_with(&self, other: &Self) -> bool {
        scalar_conflict(self.intelligence.as_ref(), other.intelligence.as_ref())
            || scalar_conflict(self.aggression.as_ref(), other.aggression.as_ref())
            || scalar_conflict(self.social.as_ref(), other.social.as_ref())
            || set_conflict(
                &self.add_behaviors,
                &self.remove_behaviors,
                &other.add_behaviors,
                &other.remove_behaviors,
            )
            || map_conflict(&self.modifiers, &other.modifiers)
    }

    pub(crate) fn merge(&self, other: &Self) -> Self {
        Self {
            intelligence: self.intelligence.or(other.intelligence),
            aggression: self.aggression.or(other.aggression),
            social: self.social.or(other.social),
            add_behaviors: union(&self.add_behaviors, &other.add_behaviors),
            remove_behaviors: union(&self.remove_behaviors, &other.remove_behaviors),
            modifiers: merge_maps(&self.modifiers, &other.modifiers),
        }
    }
}
