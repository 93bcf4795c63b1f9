//! Immutable definitions supplied by the host through the
//! [`DefinitionRegistry`](crate::DefinitionRegistry).
//!
//! Definitions describe what a trait, ability, stressor or environment *is*.
//! They never change once registered; per-creature state refers to them by
//! id or holds a clone.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::enums::{AbilityKind, Manifestation, StressorCategory, TraitOrigin};

/// Default ceiling on how many times a trait may be synthesized.
pub const DEFAULT_MAX_SYNTHESIS_LEVEL: u32 = 3;

/// Definition of a trait a creature can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitDefinition {
    /// Registry key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// How the trait shows itself.
    pub manifestation: Manifestation,
    /// Where the trait came from.
    pub origin: TraitOrigin,
    /// Traits that may not be held alongside this one.
    pub incompatible_with: BTreeSet<String>,
    /// Traits that must already be held before this one can be gained.
    pub prerequisites: BTreeSet<String>,
    /// Whether the trait can be transformed by synthesis.
    pub synthesizable: bool,
    /// Maximum synthesis level the trait supports.
    pub max_synthesis_level: u32,
}

impl TraitDefinition {
    /// A synthesizable innate adaptive trait with no constraints.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            manifestation: Manifestation::Adaptive,
            origin: TraitOrigin::Innate,
            incompatible_with: BTreeSet::new(),
            prerequisites: BTreeSet::new(),
            synthesizable: true,
            max_synthesis_level: DEFAULT_MAX_SYNTHESIS_LEVEL,
        }
    }

    /// Set the manifestation.
    #[must_use]
    pub const fn with_manifestation(mut self, manifestation: Manifestation) -> Self {
        self.manifestation = manifestation;
        self
    }

    /// Set the origin.
    #[must_use]
    pub const fn with_origin(mut self, origin: TraitOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Mark another trait as incompatible with this one.
    #[must_use]
    pub fn incompatible_with(mut self, trait_id: impl Into<String>) -> Self {
        self.incompatible_with.insert(trait_id.into());
        self
    }

    /// Require another trait before this one can be gained.
    #[must_use]
    pub fn requires(mut self, trait_id: impl Into<String>) -> Self {
        self.prerequisites.insert(trait_id.into());
        self
    }

    /// Forbid synthesis of this trait.
    #[must_use]
    pub const fn not_synthesizable(mut self) -> Self {
        self.synthesizable = false;
        self
    }

    /// Whether this trait and `other` exclude each other, in either direction.
    pub fn conflicts_with(&self, other: &Self) -> bool {
        self.incompatible_with.contains(&other.id) || other.incompatible_with.contains(&self.id)
    }
}

/// Definition of an ability a creature can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityDefinition {
    /// Registry key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Classification.
    pub kind: AbilityKind,
    /// Relative strength in `[0, 1]`.
    pub power: f32,
    /// Traits that must be held for the ability to be held.
    pub required_traits: BTreeSet<String>,
}

impl AbilityDefinition {
    /// An innate ability with the given power and no trait requirements.
    pub fn new(id: impl Into<String>, name: impl Into<String>, power: f32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: AbilityKind::Innate,
            power,
            required_traits: BTreeSet::new(),
        }
    }

    /// Set the classification.
    #[must_use]
    pub const fn with_kind(mut self, kind: AbilityKind) -> Self {
        self.kind = kind;
        self
    }

    /// Require a trait for this ability.
    #[must_use]
    pub fn requires(mut self, trait_id: impl Into<String>) -> Self {
        self.required_traits.insert(trait_id.into());
        self
    }
}

/// How creatures resist a stressor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StressorResistance {
    /// Resistance every creature has, in `[0, 1]`.
    pub base_resistance: f32,
    /// Traits that add resistance.
    pub resistant_traits: BTreeSet<String>,
    /// Traits that subtract resistance.
    pub vulnerable_traits: BTreeSet<String>,
    /// Adaptive resistance gained per unit of exposure time.
    pub adaptation_rate: f32,
}

/// What sustained exposure to a stressor can lead to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StressorEffects {
    /// Trait ids a creature may gain as an adaptation.
    pub possible_adaptations: Vec<String>,
    /// Pressure per unit of stress applied to held traits.
    pub trait_pressures: BTreeMap<String, f32>,
}

/// Definition of a named source of environmental pressure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressorDefinition {
    /// Registry key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Category, used for type resistance and callbacks.
    pub category: StressorCategory,
    /// Intensity when the environment does not override it.
    pub base_intensity: f32,
    /// Multiplier applied to intensity before resistance.
    pub accumulation_rate: f32,
    /// Level lost per unit time once the stressor is gone or fully resisted.
    pub dissipation_rate: f32,
    /// Whether the stressor acts every tick while present.
    pub continuous: bool,
    /// Resistance profile.
    pub resistance: StressorResistance,
    /// Possible effects.
    pub effects: StressorEffects,
}

impl StressorDefinition {
    /// A continuous stressor with unit accumulation and no resistance profile.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: StressorCategory,
        base_intensity: f32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            base_intensity,
            accumulation_rate: 1.0,
            dissipation_rate: 0.05,
            continuous: true,
            resistance: StressorResistance::default(),
            effects: StressorEffects::default(),
        }
    }

    /// Set the dissipation rate.
    #[must_use]
    pub const fn with_dissipation(mut self, rate: f32) -> Self {
        self.dissipation_rate = rate;
        self
    }

    /// Set the adaptive resistance acquisition rate.
    #[must_use]
    pub const fn with_adaptation_rate(mut self, rate: f32) -> Self {
        self.resistance.adaptation_rate = rate;
        self
    }

    /// Add a trait that can be gained as an adaptation to this stressor.
    #[must_use]
    pub fn with_adaptation(mut self, trait_id: impl Into<String>) -> Self {
        self.effects.possible_adaptations.push(trait_id.into());
        self
    }
}

/// A stressor as it appears in a particular environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentStressor {
    /// Registry key of the stressor.
    pub stressor_id: String,
    /// Intensity in this environment, overriding the stressor's base.
    pub intensity: Option<f32>,
}

/// Definition of an environment and the stressors it applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentDefinition {
    /// Registry key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Stressors present in the environment.
    pub stressors: Vec<EnvironmentStressor>,
}

impl EnvironmentDefinition {
    /// An environment with no stressors.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stressors: Vec::new(),
        }
    }

    /// Add a stressor, optionally overriding its intensity.
    #[must_use]
    pub fn with_stressor(mut self, stressor_id: impl Into<String>, intensity: Option<f32>) -> Self {
        self.stressors.push(EnvironmentStressor {
            stressor_id: stressor_id.into(),
            intensity,
        });
        self
    }
}
