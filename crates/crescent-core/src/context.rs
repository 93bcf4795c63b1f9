//! The explicitly constructed context every tick runs against.
//!
//! A [`SimulationContext`] bundles the shared read-only tables with the
//! engines built over them. Build it once, register stress callbacks, then
//! share it by reference with every worker.

use std::sync::Arc;

use crescent_stress::{StressEngine, ThresholdCrossing};
use crescent_synthesis::{SynthesisEngine, SynthesisRules};
use crescent_types::{CreatureId, DefinitionRegistry};

use crate::config::{ConfigError, SimulationConfig};

/// Shared tables, engines and configuration of one simulation.
#[derive(Debug)]
pub struct SimulationContext {
    config: SimulationConfig,
    registry: Arc<DefinitionRegistry>,
    stress: StressEngine,
    synthesis: SynthesisEngine,
}

impl SimulationContext {
    /// Validate `config` and build the engines over the given tables.
    pub fn new(
        config: SimulationConfig,
        registry: DefinitionRegistry,
        rules: SynthesisRules,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = Arc::new(registry);
        let stress = StressEngine::new(Arc::clone(&registry), config.stress.clone());
        let synthesis = SynthesisEngine::new(
            Arc::new(rules),
            Arc::clone(&registry),
            config.synthesis.clone(),
        );
        Ok(Self {
            config,
            registry,
            stress,
            synthesis,
        })
    }

    /// Run configuration.
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// The definition registry.
    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    /// The stress engine.
    pub const fn stress(&self) -> &StressEngine {
        &self.stress
    }

    /// The synthesis engine.
    pub const fn synthesis(&self) -> &SynthesisEngine {
        &self.synthesis
    }

    /// Register a callback for first-time threshold crossings.
    pub fn on_threshold(&mut self, callback: impl Fn(&ThresholdCrossing) + Send + Sync + 'static) {
        self.stress.on_threshold(callback);
    }

    /// Register a callback for extinction signals.
    pub fn on_extinction(&mut self, callback: impl Fn(CreatureId) + Send + Sync + 'static) {
        self.stress.on_extinction(callback);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::SimulationSection;

    #[test]
    fn invalid_config_is_refused() {
        let config = SimulationConfig {
            simulation: SimulationSection {
                tick_delta: -1.0,
                ..SimulationSection::default()
            },
            ..SimulationConfig::default()
        };
        let err = SimulationContext::new(config, DefinitionRegistry::new(), SynthesisRules::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn engines_share_the_registry() {
        let context = SimulationContext::new(
            SimulationConfig::default(),
            DefinitionRegistry::new(),
            SynthesisRules::new(),
        )
        .unwrap();
        assert_eq!(context.registry().trait_count(), 0);
        assert!(context.synthesis().rules().is_empty());
    }
}
