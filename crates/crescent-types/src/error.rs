//! Error types for the crescent-types crate.

/// Errors raised while populating or querying the definition registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A definition with the same id is already registered.
    #[error("duplicate {kind} definition: {id}")]
    DuplicateDefinition {
        /// Which table the clash happened in.
        kind: &'static str,
        /// The clashing id.
        id: String,
    },

    /// No definition with the given id exists.
    #[error("unknown {kind} definition: {id}")]
    UnknownDefinition {
        /// Which table was searched.
        kind: &'static str,
        /// The missing id.
        id: String,
    },
}
