//! Error types for the crescent-changes crate.
//!
//! Every failure here is recoverable: the processor reports it through a
//! [`ChangeResult`](crate::ChangeResult) or a `Result` and the simulation
//! keeps ticking other creatures.

use crescent_types::ChangeId;

/// Errors that can occur while building, validating or applying changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChangeError {
    /// The change is empty or internally contradictory.
    #[error("malformed change {change_id}: {}", .problems.join("; "))]
    Structural {
        /// The offending change.
        change_id: ChangeId,
        /// What is wrong with it.
        problems: Vec<String>,
    },

    /// The change violates one or more blocking validation rules.
    #[error("change {change_id} failed validation: {}", .messages.join("; "))]
    ValidationFailure {
        /// The offending change.
        change_id: ChangeId,
        /// Messages of the blocking findings.
        messages: Vec<String>,
    },

    /// Two changes target the same attribute with different outcomes.
    #[error("change {change_id} conflicts with {conflicting}")]
    Conflict {
        /// The change that lost.
        change_id: ChangeId,
        /// The change it conflicts with.
        conflicting: ChangeId,
    },

    /// Applying the change would break a state invariant.
    #[error("change {change_id} would break state invariants: {}", .violations.join("; "))]
    StateInvariant {
        /// The offending change.
        change_id: ChangeId,
        /// The invariants that would break.
        violations: Vec<String>,
    },

    /// A bounded buffer is full.
    #[error("{what} limit exceeded (capacity {capacity})")]
    LimitExceeded {
        /// Which buffer is full.
        what: &'static str,
        /// Its capacity.
        capacity: usize,
    },

    /// The change has no inverse.
    #[error("change {change_id} has no inverse: {reason}")]
    NoInverse {
        /// The change that cannot be undone.
        change_id: ChangeId,
        /// Why not.
        reason: String,
    },

    /// Two changes cannot be merged.
    #[error("change {change_id} cannot be combined with {other}")]
    NotCombinable {
        /// The receiving change.
        change_id: ChangeId,
        /// The change it was merged with.
        other: ChangeId,
    },

    /// Undo was requested with an empty history.
    #[error("nothing to undo")]
    NothingToUndo,

    /// A batch operation was requested with no batch open.
    #[error("no batch is open")]
    NoOpenBatch,

    /// A batch was started while another is open.
    #[error("a batch is already open")]
    BatchAlreadyOpen,
}
