//! Error types for the `crescent-synthesis` crate.
//!
//! A refused synthesis is an expected outcome and is reported as a
//! [`SynthesisFailure`] inside a [`SynthesisResult`](crate::SynthesisResult).
//! [`SynthesisError`] covers misuse of the API itself.

use crescent_types::SynthesisFailureType;

use crate::rules::SynthesisPathKey;

/// Why a synthesis could not begin.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{failure_type:?}: {message}")]
pub struct SynthesisFailure {
    /// Rejection category.
    pub failure_type: SynthesisFailureType,
    /// Human-readable detail.
    pub message: String,
}

impl SynthesisFailure {
    /// A failure of `failure_type` described by `message`.
    pub fn new(failure_type: SynthesisFailureType, message: impl Into<String>) -> Self {
        Self {
            failure_type,
            message: message.into(),
        }
    }
}

/// Errors from building rule tables or driving the engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SynthesisError {
    /// A path with this key is already registered.
    #[error("synthesis path already registered: {0}")]
    DuplicatePath(SynthesisPathKey),

    /// A path's requirement or outcome is out of range.
    #[error("invalid synthesis path {key}: {reason}")]
    InvalidPath {
        /// The offending path.
        key: SynthesisPathKey,
        /// What is wrong with it.
        reason: String,
    },

    /// The time step is negative or not finite.
    #[error("invalid time step: {delta_time}")]
    InvalidDelta {
        /// The rejected step.
        delta_time: f32,
    },
}
