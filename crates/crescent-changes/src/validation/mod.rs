//! Rule-registry validators for changes and states.
//!
//! # Modules
//!
//! - [`change`] -- Pre-application change validation ([`ChangeValidator`])
//! - [`registry`] -- Name-keyed validator dispatch ([`ValidatorRegistry`])
//! - [`report`] -- Findings and reports ([`ValidationReport`])
//! - [`rules`] -- Built-in and host rules, and the [`RuleSet`] registry
//! - [`state`] -- External state audits ([`StateValidator`])

pub mod change;
pub mod registry;
pub mod report;
pub mod rules;
pub mod state;

pub use change::ChangeValidator;
pub use registry::{Validator, ValidatorRegistry};
pub use report::{ValidationFinding, ValidationReport};
pub use rules::{
    BuiltinChangeRule, BuiltinStateRule, ChangePredicate, ChangeRule, RuleLimits, RuleSet,
    StatePredicate, StateRule,
};
pub use state::StateValidator;
