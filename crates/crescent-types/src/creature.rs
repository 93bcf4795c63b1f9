//! Per-creature mutable state.
//!
//! [`CreatureState`] is owned by exactly one creature and is only ever
//! mutated by applying a validated form change. Traits keep their order so
//! that undoing a removal puts a trait back exactly where it was.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::definitions::{AbilityDefinition, TraitDefinition};
use crate::enums::{Aggression, BodyShape, Intelligence, Locomotion, Size, SocialStructure};
use crate::ids::CreatureId;
use crate::unit::clamp_unit;

/// Weakest strength an active trait may have.
pub const MIN_TRAIT_STRENGTH: f32 = 0.1;

/// Default ceiling on the number of abilities a creature may hold.
pub const MAX_ACTIVE_ABILITIES: usize = 10;

/// Physical form of a creature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalForm {
    /// Body size.
    pub size: Size,
    /// Body plan.
    pub shape: BodyShape,
    /// Primary means of movement.
    pub locomotion: Locomotion,
    /// Additional means of movement.
    pub secondary_locomotion: BTreeSet<Locomotion>,
    /// Named physical features (horns, scales, gills).
    pub features: BTreeSet<String>,
    /// Named numeric modifiers on the physical form.
    pub modifiers: BTreeMap<String, f32>,
}

impl Default for PhysicalForm {
    fn default() -> Self {
        Self {
            size: Size::Medium,
            shape: BodyShape::Bestial,
            locomotion: Locomotion::Walker,
            secondary_locomotion: BTreeSet::new(),
            features: BTreeSet::new(),
            modifiers: BTreeMap::new(),
        }
    }
}

/// Behavioral profile of a creature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorRecord {
    /// Cognitive capacity.
    pub intelligence: Intelligence,
    /// Disposition towards others.
    pub aggression: Aggression,
    /// Social organisation.
    pub social: SocialStructure,
    /// Named behaviors (nocturnal, ambush hunter).
    pub behaviors: BTreeSet<String>,
    /// Named numeric behavior modifiers.
    pub modifiers: BTreeMap<String, f32>,
}

impl Default for BehaviorRecord {
    fn default() -> Self {
        Self {
            intelligence: Intelligence::Animal,
            aggression: Aggression::Defensive,
            social: SocialStructure::Solitary,
            behaviors: BTreeSet::new(),
            modifiers: BTreeMap::new(),
        }
    }
}

/// A trait as currently held by a creature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTrait {
    /// The trait's definition.
    pub definition: TraitDefinition,
    /// Expression strength in `[0, 1]`.
    pub strength: f32,
    /// Synthesized form, if the trait has been transformed.
    pub form: Option<String>,
    /// Whether the trait is suppressed by another trait's synthesis.
    pub suppressed: bool,
}

impl ActiveTrait {
    /// A freshly gained, fully expressed trait.
    pub const fn new(definition: TraitDefinition) -> Self {
        Self {
            definition,
            strength: 1.0,
            form: None,
            suppressed: false,
        }
    }

    /// The trait's registry key.
    pub fn id(&self) -> &str {
        &self.definition.id
    }
}

/// Complete mutable state of one creature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureState {
    /// Creature identity.
    pub id: CreatureId,
    /// Display name, supplied by the host.
    pub name: String,
    /// Physical form.
    pub physical: PhysicalForm,
    /// Active traits in acquisition order.
    pub traits: Vec<ActiveTrait>,
    /// Held abilities keyed by ability id.
    pub abilities: BTreeMap<String, AbilityDefinition>,
    /// Behavioral profile.
    pub behavior: BehaviorRecord,
    /// Aggregate power in `[0, 1]`, derived from held abilities.
    pub power_level: f32,
    /// Whether the creature has been changed by a non-manual source.
    pub mutated: bool,
}

impl CreatureState {
    /// A creature with default form and behavior and no traits or abilities.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CreatureId::new(),
            name: name.into(),
            physical: PhysicalForm::default(),
            traits: Vec::new(),
            abilities: BTreeMap::new(),
            behavior: BehaviorRecord::default(),
            power_level: 0.0,
            mutated: false,
        }
    }

    /// Add a trait at generation time, bypassing the change pipeline.
    #[must_use]
    pub fn with_trait(mut self, definition: TraitDefinition) -> Self {
        self.traits.push(ActiveTrait::new(definition));
        self
    }

    /// Add an ability at generation time, bypassing the change pipeline.
    #[must_use]
    pub fn with_ability(mut self, ability: AbilityDefinition) -> Self {
        self.abilities.insert(ability.id.clone(), ability);
        self.recalculate_power();
        self
    }

    /// Whether the creature holds the trait (suppressed or not).
    pub fn has_trait(&self, trait_id: &str) -> bool {
        self.traits.iter().any(|t| t.id() == trait_id)
    }

    /// The held trait with the given id.
    pub fn active_trait(&self, trait_id: &str) -> Option<&ActiveTrait> {
        self.traits.iter().find(|t| t.id() == trait_id)
    }

    /// Position of the held trait with the given id.
    pub fn trait_position(&self, trait_id: &str) -> Option<usize> {
        self.traits.iter().position(|t| t.id() == trait_id)
    }

    /// Ids of all held traits.
    pub fn trait_ids(&self) -> BTreeSet<String> {
        self.traits.iter().map(|t| t.id().to_owned()).collect()
    }

    /// Whether the trait is held but suppressed.
    pub fn is_suppressed(&self, trait_id: &str) -> bool {
        self.active_trait(trait_id).is_some_and(|t| t.suppressed)
    }

    /// Whether the creature holds the ability.
    pub fn has_ability(&self, ability_id: &str) -> bool {
        self.abilities.contains_key(ability_id)
    }

    /// Recompute `power_level` from held abilities.
    ///
    /// A creature holding a full complement of maximum-power abilities has
    /// a power level of `1.0`.
    pub fn recalculate_power(&mut self) {
        let total: f32 = self.abilities.values().map(|a| a.power).sum();
        let cap = u16::try_from(MAX_ACTIVE_ABILITIES).map_or(f32::from(u16::MAX), f32::from);
        self.power_level = clamp_unit(total / cap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fireproof() -> TraitDefinition {
        TraitDefinition::new("fireproof", "Fireproof")
    }

    #[test]
    fn new_state_is_blank() {
        let state = CreatureState::new("Ember");
        assert!(state.traits.is_empty());
        assert!(state.abilities.is_empty());
        assert!(!state.mutated);
    }

    #[test]
    fn trait_queries() {
        let state = CreatureState::new("Ember")
            .with_trait(TraitDefinition::new("scaled", "Scaled"))
            .with_trait(fireproof());
        assert!(state.has_trait("fireproof"));
        assert_eq!(state.trait_position("fireproof"), Some(1));
        assert!(!state.is_suppressed("fireproof"));
        assert_eq!(state.trait_ids().len(), 2);
    }

    #[test]
    fn power_tracks_abilities() {
        let state = CreatureState::new("Ember")
            .with_ability(AbilityDefinition::new("bite", "Bite", 0.5))
            .with_ability(AbilityDefinition::new("claw", "Claw", 0.5));
        assert!((state.power_level - 0.1).abs() < 1e-6);
    }
}
