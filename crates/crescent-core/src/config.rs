//! Configuration loading and typed config structures for a Crescent run.
//!
//! A single YAML document carries the run parameters, logging settings and
//! the tunables of every engine. Every field has a default, so an empty
//! document is a valid configuration.
//!
//! ```yaml
//! simulation:
//!   seed: 7
//!   tick_delta: 1.0
//!   tick_interval_ms: 50
//!   max_ticks: 500
//! logging:
//!   level: debug
//! stress:
//!   thresholds:
//!     critical: { value: 0.95, duration: 3.0 }
//! synthesis:
//!   critical_grace: 5.0
//! ```

use std::path::Path;

use crescent_changes::ChangeConfig;
use crescent_stress::StressConfig;
use crescent_synthesis::SynthesisConfig;
use serde::Deserialize;

/// Environment variable that overrides `logging.level`.
pub const LOG_LEVEL_ENV: &str = "CRESCENT_LOG";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but is unusable.
    #[error("invalid configuration: {}", problems.join("; "))]
    Invalid {
        /// Every problem found.
        problems: Vec<String>,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration of a simulation run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Run parameters.
    #[serde(default)]
    pub simulation: SimulationSection,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Change processor tunables.
    #[serde(default)]
    pub changes: ChangeConfig,

    /// Stress engine tunables.
    #[serde(default)]
    pub stress: StressConfig,

    /// Synthesis engine tunables.
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

impl SimulationConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// `CRESCENT_LOG`, when set, overrides `logging.level`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// `CRESCENT_LOG`, when set, overrides `logging.level`.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_log_override(std::env::var(LOG_LEVEL_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Replace the logging level with `level` when one is given.
    pub fn apply_log_override(&mut self, level: Option<String>) {
        if let Some(level) = level.filter(|level| !level.trim().is_empty()) {
            self.logging.level = level;
        }
    }

    /// Every problem with the configuration, empty when usable.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = self.simulation.problems();
        problems.extend(self.changes.problems());
        problems.extend(self.stress.problems());
        problems.extend(self.synthesis.problems());
        problems
    }

    /// Fail with [`ConfigError::Invalid`] listing every problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid { problems })
        }
    }
}

/// Run parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationSection {
    /// Seed of every creature's random source.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Simulated time advanced per tick.
    #[serde(default = "default_tick_delta")]
    pub tick_delta: f32,

    /// Real milliseconds between ticks in the async runner.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Ticks after which the runner stops; unbounded when absent.
    #[serde(default)]
    pub max_ticks: Option<u64>,
}

const fn default_seed() -> u64 {
    42
}

const fn default_tick_delta() -> f32 {
    1.0
}

const fn default_tick_interval_ms() -> u64 {
    100
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            tick_delta: default_tick_delta(),
            tick_interval_ms: default_tick_interval_ms(),
            max_ticks: None,
        }
    }
}

impl SimulationSection {
    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !(self.tick_delta.is_finite() && self.tick_delta > 0.0) {
            problems.push(format!("tick delta {} must be positive", self.tick_delta));
        }
        problems
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive such as `info` or `crescent_stress=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: SimulationConfig = serde_yml::from_str("{}").unwrap();
        assert_eq!(config, SimulationConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.simulation.seed, 42);
        assert_eq!(config.changes.history_capacity, 100);
    }

    #[test]
    fn nested_sections_override_defaults() {
        let yaml = r"
simulation:
  seed: 7
  max_ticks: 500
logging:
  level: debug
  json: true
changes:
  batch_capacity: 8
synthesis:
  critical_grace: 5.0
";
        let config: SimulationConfig = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.simulation.seed, 7);
        assert_eq!(config.simulation.max_ticks, Some(500));
        assert!(config.logging.json);
        assert_eq!(config.changes.batch_capacity, 8);
        assert!((config.synthesis.critical_grace - 5.0).abs() < f32::EPSILON);
        assert!((config.simulation.tick_delta - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn invalid_values_are_all_reported() {
        let yaml = r"
simulation:
  tick_delta: 0.0
changes:
  history_capacity: 0
";
        let config: SimulationConfig = serde_yml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref problems } if problems.len() == 2));
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let err = SimulationConfig::parse("simulation: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn log_override_replaces_level_unless_blank() {
        let mut config = SimulationConfig::default();
        config.apply_log_override(Some("  ".to_owned()));
        assert_eq!(config.logging.level, "info");
        config.apply_log_override(Some("trace".to_owned()));
        assert_eq!(config.logging.level, "trace");
        config.apply_log_override(None);
        assert_eq!(config.logging.level, "trace");
    }
}
