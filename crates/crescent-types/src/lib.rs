//! Shared type definitions for the Crescent creature adaptation engine.
//!
//! Every other crate depends on this one. It holds no engine logic: only
//! identifiers, enumerations, immutable definitions, the per-creature
//! [`CreatureState`] aggregate and the read-only [`DefinitionRegistry`].
//!
//! # Modules
//!
//! - [`creature`] -- Mutable per-creature state ([`CreatureState`])
//! - [`definitions`] -- Trait, ability, stressor and environment definitions
//! - [`enums`] -- Shared enumerations
//! - [`error`] -- Registry errors ([`RegistryError`])
//! - [`ids`] -- UUID v7 identifier newtypes
//! - [`registry`] -- Read-only definition lookup ([`DefinitionRegistry`])
//! - [`unit`] -- Unit-interval clamping helpers

pub mod creature;
pub mod definitions;
pub mod enums;
pub mod error;
pub mod ids;
pub mod registry;
pub mod unit;

pub use creature::{
    ActiveTrait, BehaviorRecord, CreatureState, MAX_ACTIVE_ABILITIES, MIN_TRAIT_STRENGTH,
    PhysicalForm,
};
pub use definitions::{
    AbilityDefinition, EnvironmentDefinition, EnvironmentStressor, StressorDefinition,
    StressorEffects, StressorResistance, TraitDefinition,
};
pub use enums::*;
pub use error::RegistryError;
pub use ids::{ChangeId, CreatureId};
pub use registry::{DefinitionRegistry, ResolvedStressor};
pub use unit::{clamp_unit, is_unit};
