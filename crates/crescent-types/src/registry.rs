//! Read-only lookup of definitions by string id.
//!
//! The host fills a [`DefinitionRegistry`] once, wraps it in an `Arc`, and
//! hands it to the engines. After construction it is never mutated, so any
//! number of workers may read it concurrently without locking.

use std::collections::BTreeMap;

use crate::definitions::{
    AbilityDefinition, EnvironmentDefinition, StressorDefinition, TraitDefinition,
};
use crate::error::RegistryError;

/// A stressor resolved against an environment, with its effective intensity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedStressor<'a> {
    /// The stressor's definition.
    pub definition: &'a StressorDefinition,
    /// Intensity in the environment (override or base).
    pub intensity: f32,
}

/// Immutable tables of trait, ability, stressor and environment definitions.
#[derive(Debug, Clone, Default)]
pub struct DefinitionRegistry {
    traits: BTreeMap<String, TraitDefinition>,
    abilities: BTreeMap<String, AbilityDefinition>,
    stressors: BTreeMap<String, StressorDefinition>,
    environments: BTreeMap<String, EnvironmentDefinition>,
}

/// Insert into a table, refusing to overwrite an existing id.
fn insert_unique<T>(
    table: &mut BTreeMap<String, T>,
    kind: &'static str,
    id: &str,
    value: T,
) -> Result<(), RegistryError> {
    if table.contains_key(id) {
        return Err(RegistryError::DuplicateDefinition {
            kind,
            id: id.to_owned(),
        });
    }
    table.insert(id.to_owned(), value);
    Ok(())
}

impl DefinitionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a trait definition.
    pub fn register_trait(&mut self, definition: TraitDefinition) -> Result<(), RegistryError> {
        let id = definition.id.clone();
        insert_unique(&mut self.traits, "trait", &id, definition)
    }

    /// Register an ability definition.
    pub fn register_ability(
        &mut self,
        definition: AbilityDefinition,
    ) -> Result<(), RegistryError> {
        let id = definition.id.clone();
        insert_unique(&mut self.abilities, "ability", &id, definition)
    }

    /// Register a stressor definition.
    pub fn register_stressor(
        &mut self,
        definition: StressorDefinition,
    ) -> Result<(), RegistryError> {
        let id = definition.id.clone();
        insert_unique(&mut self.stressors, "stressor", &id, definition)
    }

    /// Register an environment definition.
    ///
    /// Every stressor the environment references must already be registered.
    pub fn register_environment(
        &mut self,
        definition: EnvironmentDefinition,
    ) -> Result<(), RegistryError> {
        if let Some(missing) = definition
            .stressors
            .iter()
            .find(|s| !self.stressors.contains_key(&s.stressor_id))
        {
            return Err(RegistryError::UnknownDefinition {
                kind: "stressor",
                id: missing.stressor_id.clone(),
            });
        }
        let id = definition.id.clone();
        insert_unique(&mut self.environments, "environment", &id, definition)
    }

    /// Look up a trait.
    pub fn get_trait(&self, id: &str) -> Option<&TraitDefinition> {
        self.traits.get(id)
    }

    /// Look up an ability.
    pub fn get_ability(&self, id: &str) -> Option<&AbilityDefinition> {
        self.abilities.get(id)
    }

    /// Look up a stressor.
    pub fn get_stressor(&self, id: &str) -> Option<&StressorDefinition> {
        self.stressors.get(id)
    }

    /// Look up an environment.
    pub fn get_environment(&self, id: &str) -> Option<&EnvironmentDefinition> {
        self.environments.get(id)
    }

    /// Look up a trait, failing with [`RegistryError::UnknownDefinition`].
    pub fn require_trait(&self, id: &str) -> Result<&TraitDefinition, RegistryError> {
        self.get_trait(id).ok_or_else(|| RegistryError::UnknownDefinition {
            kind: "trait",
            id: id.to_owned(),
        })
    }

    /// Look up an ability, failing with [`RegistryError::UnknownDefinition`].
    pub fn require_ability(&self, id: &str) -> Result<&AbilityDefinition, RegistryError> {
        self.get_ability(id)
            .ok_or_else(|| RegistryError::UnknownDefinition {
                kind: "ability",
                id: id.to_owned(),
            })
    }

    /// Resolve the stressors an environment applies, in declaration order.
    pub fn stressors_for_environment(
        &self,
        environment_id: &str,
    ) -> Result<Vec<ResolvedStressor<'_>>, RegistryError> {
        let environment =
            self.get_environment(environment_id)
                .ok_or_else(|| RegistryError::UnknownDefinition {
                    kind: "environment",
                    id: environment_id.to_owned(),
                })?;
        environment
            .stressors
            .iter()
            .map(|entry| {
                let definition = self.get_stressor(&entry.stressor_id).ok_or_else(|| {
                    RegistryError::UnknownDefinition {
                        kind: "stressor",
                        id: entry.stressor_id.clone(),
                    }
                })?;
                Ok(ResolvedStressor {
                    definition,
                    intensity: entry.intensity.unwrap_or(definition.base_intensity),
                })
            })
            .collect()
    }

    /// Number of registered traits.
    pub fn trait_count(&self) -> usize {
        self.traits.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::enums::StressorCategory;

    fn registry() -> DefinitionRegistry {
        let mut registry = DefinitionRegistry::new();
        registry
            .register_trait(TraitDefinition::new("fireproof", "Fireproof"))
            .unwrap();
        registry
            .register_stressor(StressorDefinition::new(
                "heat",
                "Heat",
                StressorCategory::Thermal,
                0.2,
            ))
            .unwrap();
        registry
            .register_environment(
                EnvironmentDefinition::new("volcano", "Volcano").with_stressor("heat", Some(0.05)),
            )
            .unwrap();
        registry
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut registry = registry();
        let err = registry
            .register_trait(TraitDefinition::new("fireproof", "Again"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateDefinition { kind: "trait", .. }));
    }

    #[test]
    fn environment_requires_known_stressors() {
        let mut registry = registry();
        let err = registry
            .register_environment(
                EnvironmentDefinition::new("tundra", "Tundra").with_stressor("cold", None),
            )
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnknownDefinition {
                kind: "stressor",
                id: "cold".to_owned()
            }
        );
    }

    #[test]
    fn environment_intensity_override_applies() {
        let registry = registry();
        let resolved = registry.stressors_for_environment("volcano").unwrap();
        assert_eq!(resolved.len(), 1);
        assert!((resolved[0].intensity - 0.05).abs() < f32::EPSILON);
        assert!(registry.stressors_for_environment("nowhere").is_err());
    }
}
