//! Error types for the `crescent-core` crate.
//!
//! Rejected changes and refused syntheses are ordinary results and never
//! appear here. A [`TickError`] means a tick could not run at all, such as
//! an unknown environment or an invalid time step.

use crescent_stress::StressError;
use crescent_synthesis::SynthesisError;
use crescent_types::{CreatureId, RegistryError};

/// Errors that stop a creature's tick.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// Stress processing failed.
    #[error("stress error for {creature}: {source}")]
    Stress {
        /// The creature being ticked.
        creature: CreatureId,
        /// The underlying stress error.
        source: StressError,
    },

    /// Synthesis progression failed.
    #[error("synthesis error for {creature}: {source}")]
    Synthesis {
        /// The creature being ticked.
        creature: CreatureId,
        /// The underlying synthesis error.
        source: SynthesisError,
    },

    /// The creature's change processor has an open batch, so synthesis
    /// changes could not be settled.
    #[error("creature {creature} has an open change batch")]
    BatchOpen {
        /// The creature being ticked.
        creature: CreatureId,
    },

    /// A definition lookup failed.
    #[error("registry error: {source}")]
    Registry {
        /// The underlying registry error.
        #[from]
        source: RegistryError,
    },
}

/// Errors from installing the tracing subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The configured level is not a valid filter directive.
    #[error("invalid log filter {filter:?}: {reason}")]
    Filter {
        /// The rejected directive.
        filter: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("failed to install subscriber: {reason}")]
    Install {
        /// The underlying failure.
        reason: String,
    },
}
