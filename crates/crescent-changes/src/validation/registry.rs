//! Name-keyed registry of validators.
//!
//! Hosts register any number of change and state validators under names
//! and dispatch through the [`Validator`] variants instead of a trait
//! object hierarchy.

use std::collections::BTreeMap;

use crescent_types::CreatureState;

use crate::change::FormChange;
use crate::validation::change::ChangeValidator;
use crate::validation::report::ValidationReport;
use crate::validation::state::StateValidator;

/// A validator of either kind.
#[derive(Debug, Clone)]
pub enum Validator {
    /// Validates candidate changes.
    Change(ChangeValidator),
    /// Audits whole states.
    State(StateValidator),
}

impl Validator {
    /// Validate a change. State validators audit the state the change would
    /// produce instead.
    pub fn check_change(&self, change: &FormChange, state: &CreatureState) -> ValidationReport {
        match self {
            Self::Change(validator) => validator.validate_change(change, state),
            Self::State(validator) => {
                let mut projected = state.clone();
                match crate::apply::apply_change(&mut projected, change) {
                    Ok(()) => validator.validate_state(&projected),
                    Err(_) => validator.validate_state(state),
                }
            }
        }
    }

    /// Audit a state. Change validators have nothing to say about a bare
    /// state and always pass it.
    pub fn check_state(&self, state: &CreatureState) -> ValidationReport {
        match self {
            Self::Change(_) => ValidationReport::valid(),
            Self::State(validator) => validator.validate_state(state),
        }
    }
}

/// Validators keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ValidatorRegistry {
    validators: BTreeMap<String, Validator>,
}

impl ValidatorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validator, returning any validator it replaces.
    pub fn register(&mut self, name: impl Into<String>, validator: Validator) -> Option<Validator> {
        self.validators.insert(name.into(), validator)
    }

    /// Unregister a validator.
    pub fn remove(&mut self, name: &str) -> Option<Validator> {
        self.validators.remove(name)
    }

    /// Look up a validator.
    pub fn get(&self, name: &str) -> Option<&Validator> {
        self.validators.get(name)
    }

    /// Look up a validator for reconfiguration.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Validator> {
        self.validators.get_mut(name)
    }

    /// Registered names in order.
    pub fn names(&self) -> Vec<&str> {
        self.validators.keys().map(String::as_str).collect()
    }

    /// Run every state validator against `state`, keyed by validator name.
    pub fn audit(&self, state: &CreatureState) -> BTreeMap<String, ValidationReport> {
        self.validators
            .iter()
            .filter(|(_, v)| matches!(v, Validator::State(_)))
            .map(|(name, v)| (name.clone(), v.check_state(state)))
            .collect()
    }
}
