//! Consistency audits over whole creature states.
//!
//! The processor never runs these implicitly; hosts call them periodically.

use crescent_types::{CreatureState, ValidationSeverity};

use crate::config::ChangeConfig;
use crate::validation::report::ValidationReport;
use crate::validation::rules::{BuiltinStateRule, RuleLimits, RuleSet, StateRule};

/// Audits creature states against a registry of named rules.
#[derive(Debug, Clone)]
pub struct StateValidator {
    rules: RuleSet<StateRule>,
    min_blocking_severity: ValidationSeverity,
    limits: RuleLimits,
}

impl StateValidator {
    /// A validator with every built-in rule registered.
    pub fn new(config: &ChangeConfig) -> Self {
        let mut rules = RuleSet::default();
        for rule in BuiltinStateRule::ALL {
            rules.insert(StateRule::builtin(rule));
        }
        Self {
            rules,
            min_blocking_severity: config.min_blocking_severity,
            limits: RuleLimits {
                max_active_abilities: config.max_active_abilities,
            },
        }
    }

    /// Register a rule, replacing any rule with the same name.
    pub fn add_rule(&mut self, rule: StateRule) -> Option<StateRule> {
        self.rules.insert(rule)
    }

    /// Unregister a rule by name.
    pub fn remove_rule(&mut self, name: &str) -> Option<StateRule> {
        self.rules.remove(name)
    }

    /// Whether a rule with this name is registered.
    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.contains(name)
    }

    /// Set the severity at which findings mark a state invalid.
    pub const fn set_min_blocking_severity(&mut self, severity: ValidationSeverity) {
        self.min_blocking_severity = severity;
    }

    /// Audit one state.
    pub fn validate_state(&self, state: &CreatureState) -> ValidationReport {
        let findings = self
            .rules
            .iter()
            .flat_map(|rule| rule.evaluate(state, self.limits))
            .collect();
        ValidationReport::from_findings(findings, self.min_blocking_severity)
    }

    /// Audit many states; findings name the creature they concern.
    pub fn validate_states<'a>(
        &self,
        states: impl IntoIterator<Item = &'a CreatureState>,
    ) -> ValidationReport {
        let mut report = ValidationReport::valid();
        for state in states {
            report.merge(self.validate_state(state));
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use crescent_types::{AbilityDefinition, Locomotion, TraitDefinition};

    use super::*;

    fn validator() -> StateValidator {
        StateValidator::new(&ChangeConfig::default())
    }

    #[test]
    fn healthy_state_passes() {
        let state = CreatureState::new("Ember").with_trait(TraitDefinition::new("scaled", "Scaled"));
        let report = validator().validate_state(&state);
        assert!(report.is_valid);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn missing_requirement_is_error() {
        let state = CreatureState::new("Ember")
            .with_ability(AbilityDefinition::new("armor", "Armor", 0.2).requires("scaled"));
        let report = validator().validate_state(&state);
        assert!(!report.is_valid);
        assert_eq!(report.errors[0].rule, "ability_requirements");
    }

    #[test]
    fn redundant_locomotion_is_warning() {
        let mut state = CreatureState::new("Ember");
        state.physical.secondary_locomotion.insert(Locomotion::Walker);
        let report = validator().validate_state(&state);
        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn validates_many_states() {
        let good = CreatureState::new("Good");
        let mut bad = CreatureState::new("Bad");
        bad.power_level = 2.0;
        let report = validator().validate_states([&good, &bad]);
        assert!(!report.is_valid);
        assert_eq!(report.errors[0].subject, Some(bad.id.to_string()));
    }

    #[test]
    fn custom_state_rule() {
        let mut validator = validator();
        validator.add_rule(StateRule::custom("named", ValidationSeverity::Error, |state| {
            if state.name.is_empty() {
                vec!["creature has no name".to_owned()]
            } else {
                Vec::new()
            }
        }));
        assert!(validator.has_rule("named"));
        assert!(!validator.validate_state(&CreatureState::new("")).is_valid);
    }
}
