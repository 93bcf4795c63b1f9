//! Shared fixtures for the integration tests.

#![allow(clippy::unwrap_used, dead_code)]

use crescent_core::{SimulationConfig, SimulationContext};
use crescent_synthesis::{SynthesisOutcome, SynthesisPathKey, SynthesisRequirement, SynthesisRules};
use crescent_types::{
    AbilityDefinition, CatalystType, DefinitionRegistry, EnvironmentDefinition, StressorCategory,
    StressorDefinition, TraitDefinition,
};

/// Environment with a single mild heat stressor.
pub const VOLCANO: &str = "volcano";

/// Environment with a stressor at 0.05 per tick.
pub const SLOW_BURN: &str = "slow_burn";

/// Environment with no stressors.
pub const MEADOW: &str = "meadow";

/// Traits, an ability, two stressors and three environments.
pub fn registry() -> DefinitionRegistry {
    let mut registry = DefinitionRegistry::new();
    registry
        .register_trait(TraitDefinition::new("thick_hide", "Thick Hide"))
        .unwrap();
    registry
        .register_trait(TraitDefinition::new("heat_sink", "Heat Sink").not_synthesizable())
        .unwrap();
    registry
        .register_trait(TraitDefinition::new("fireproof", "Fireproof"))
        .unwrap();
    registry
        .register_ability(AbilityDefinition::new("lava_wade", "Lava Wade", 0.4))
        .unwrap();
    registry
        .register_stressor(
            StressorDefinition::new("heat", "Heat", StressorCategory::Thermal, 0.2)
                .with_adaptation("heat_sink"),
        )
        .unwrap();
    registry
        .register_stressor(StressorDefinition::new(
            "embers",
            "Embers",
            StressorCategory::Thermal,
            0.05,
        ))
        .unwrap();
    registry
        .register_environment(EnvironmentDefinition::new(VOLCANO, "Volcano").with_stressor("heat", None))
        .unwrap();
    registry
        .register_environment(
            EnvironmentDefinition::new(SLOW_BURN, "Slow Burn").with_stressor("embers", None),
        )
        .unwrap();
    registry
        .register_environment(EnvironmentDefinition::new(MEADOW, "Meadow"))
        .unwrap();
    registry
}

/// A stress path from `thick_hide` and an environmental path from `fireproof`.
pub fn rules() -> SynthesisRules {
    let mut rules = SynthesisRules::new();
    rules
        .register_path(
            SynthesisPathKey::new("thick_hide", CatalystType::Stress, "magma_hide"),
            SynthesisRequirement::new(0.5),
            SynthesisOutcome::new("magma_hide").grants("lava_wade"),
        )
        .unwrap();
    rules
        .register_path(
            SynthesisPathKey::new("fireproof", CatalystType::Environmental, "ember_skin"),
            SynthesisRequirement::new(0.5),
            SynthesisOutcome::new("ember_skin"),
        )
        .unwrap();
    rules
}

/// Default configuration with a long critical duration, so sustained
/// stress does not end the run early.
pub fn config() -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.stress.thresholds.critical.duration = 1000.0;
    config
}

/// A validated context over the shared fixtures.
pub fn context(config: SimulationConfig) -> SimulationContext {
    SimulationContext::new(config, registry(), rules()).unwrap()
}
