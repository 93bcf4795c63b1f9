//! Validation of candidate changes against a creature's current state.

use crescent_types::{CreatureState, ValidationSeverity};

use crate::apply::apply_change;
use crate::change::FormChange;
use crate::config::ChangeConfig;
use crate::validation::report::{ValidationFinding, ValidationReport};
use crate::validation::rules::{BuiltinChangeRule, ChangeRule, RuleLimits, RuleSet};

/// Name under which structural problems are reported.
pub const STRUCTURE_RULE: &str = "structure";

/// Gatekeeper run by the processor before any change is applied.
#[derive(Debug, Clone)]
pub struct ChangeValidator {
    rules: RuleSet<ChangeRule>,
    min_blocking_severity: ValidationSeverity,
    limits: RuleLimits,
}

impl ChangeValidator {
    /// A validator with every built-in rule registered.
    pub fn new(config: &ChangeConfig) -> Self {
        let mut validator = Self::empty(config);
        for rule in BuiltinChangeRule::ALL {
            validator.add_rule(ChangeRule::builtin(rule));
        }
        validator
    }

    /// A validator with no rules; only structural checks apply.
    pub fn empty(config: &ChangeConfig) -> Self {
        Self {
            rules: RuleSet::default(),
            min_blocking_severity: config.min_blocking_severity,
            limits: RuleLimits {
                max_active_abilities: config.max_active_abilities,
            },
        }
    }

    /// Register a rule, replacing any rule with the same name.
    pub fn add_rule(&mut self, rule: ChangeRule) -> Option<ChangeRule> {
        self.rules.insert(rule)
    }

    /// Unregister a rule by name.
    pub fn remove_rule(&mut self, name: &str) -> Option<ChangeRule> {
        self.rules.remove(name)
    }

    /// Whether a rule with this name is registered.
    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.contains(name)
    }

    /// Names of registered rules in evaluation order.
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.names()
    }

    /// Set the severity at which findings block a change.
    pub const fn set_min_blocking_severity(&mut self, severity: ValidationSeverity) {
        self.min_blocking_severity = severity;
    }

    /// Severity at which findings block a change.
    pub const fn min_blocking_severity(&self) -> ValidationSeverity {
        self.min_blocking_severity
    }

    fn findings(&self, change: &FormChange, state: &CreatureState) -> Vec<ValidationFinding> {
        let problems = change.validate();
        if !problems.is_empty() {
            return problems
                .into_iter()
                .map(|message| ValidationFinding {
                    rule: STRUCTURE_RULE.to_owned(),
                    severity: ValidationSeverity::Critical,
                    section: None,
                    subject: Some(change.id().to_string()),
                    message,
                })
                .collect();
        }
        self.rules
            .iter()
            .flat_map(|rule| rule.evaluate(change, state, self.limits))
            .map(|finding| ValidationFinding {
                subject: Some(change.id().to_string()),
                ..finding
            })
            .collect()
    }

    /// Validate one change against `state`.
    pub fn validate_change(&self, change: &FormChange, state: &CreatureState) -> ValidationReport {
        ValidationReport::from_findings(self.findings(change, state), self.min_blocking_severity)
    }

    /// Validate a sequence of changes as if applied one after another.
    ///
    /// Each change is checked against the state produced by the valid
    /// changes before it; invalid changes are reported and skipped.
    pub fn validate_changes(
        &self,
        changes: &[FormChange],
        state: &CreatureState,
    ) -> ValidationReport {
        let mut projected = state.clone();
        let mut report = ValidationReport::valid();
        for change in changes {
            let single = self.validate_change(change, &projected);
            if single.is_valid && apply_change(&mut projected, change).is_err() {
                report.merge(ValidationReport::from_findings(
                    vec![ValidationFinding {
                        rule: STRUCTURE_RULE.to_owned(),
                        severity: ValidationSeverity::Critical,
                        section: None,
                        subject: Some(change.id().to_string()),
                        message: "change would break state invariants".to_owned(),
                    }],
                    self.min_blocking_severity,
                ));
            }
            report.merge(single);
        }
        report
    }
}
