//! Error types for the `crescent-stress` crate.

use crescent_types::RegistryError;

/// Errors that can occur while processing environmental stress.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StressError {
    /// The environment id is not registered.
    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    /// The stressor id is not registered.
    #[error("unknown stressor: {0}")]
    UnknownStressor(String),

    /// The time step is negative or not finite.
    #[error("invalid time step: {delta_time}")]
    InvalidDelta {
        /// The rejected step.
        delta_time: f32,
    },

    /// A definition lookup failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
