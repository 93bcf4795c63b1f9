//! Form changes and the change processor for the Crescent engine.
//!
//! A [`FormChange`] is the only way a creature's form, traits, abilities or
//! behavior are altered. Changes are validated by a [`ChangeValidator`],
//! applied by the [`ChangeProcessor`], and recorded so they can be undone.
//!
//! # Modules
//!
//! - [`apply`] -- Applying a change to a [`CreatureState`](crescent_types::CreatureState)
//! - [`change`] -- The [`FormChange`] record, combination and inversion
//! - [`config`] -- Processor and validator limits ([`ChangeConfig`])
//! - [`delta`] -- Per-section deltas
//! - [`error`] -- Change errors ([`ChangeError`])
//! - [`history`] -- Bounded applied-change history
//! - [`processor`] -- Validation, conflicts, batches and undo ([`ChangeProcessor`])
//! - [`validation`] -- Rule-registry validators

pub mod apply;
pub mod change;
pub mod config;
pub mod delta;
pub mod error;
pub mod history;
pub mod processor;
pub mod validation;

pub use apply::{apply_change, invariant_violations};
pub use change::{ChangePriors, FormChange, UNDO_TAG};
pub use config::ChangeConfig;
pub use delta::{
    AbilityChange, BehaviorChange, ChangeSection, PhysicalChange, TraitAddition, TraitChange,
};
pub use error::ChangeError;
pub use history::{ChangeHistory, HistoryEntry};
pub use processor::{ChangeProcessor, ChangeResult};
pub use validation::{
    ChangeRule, ChangeValidator, StateRule, StateValidator, ValidationFinding, ValidationReport,
    Validator, ValidatorRegistry,
};
