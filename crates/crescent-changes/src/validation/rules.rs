//! Named validation rules and the registry that holds them.
//!
//! Rules come in two shapes. Built-in rules are tagged variants evaluated
//! by a `match`; host rules wrap a shared predicate. Both sit in a
//! [`RuleSet`] keyed by name, so a host can replace or remove any rule,
//! built-in or not.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crescent_types::{
    AbilityDefinition, CreatureState, MIN_TRAIT_STRENGTH, TraitDefinition, ValidationSeverity,
    is_unit,
};

use crate::apply::added_definitions;
use crate::change::FormChange;
use crate::delta::ChangeSection;
use crate::validation::report::ValidationFinding;

/// Host-supplied predicate over a candidate change and the current state.
/// Returns one message per violation.
pub type ChangePredicate = Arc<dyn Fn(&FormChange, &CreatureState) -> Vec<String> + Send + Sync>;

/// Host-supplied predicate over a creature state. Returns one message per
/// violation.
pub type StatePredicate = Arc<dyn Fn(&CreatureState) -> Vec<String> + Send + Sync>;

/// Limits that built-in rules check against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleLimits {
    /// Maximum abilities a creature may hold.
    pub max_active_abilities: usize,
}

/// Anything stored in a [`RuleSet`].
pub trait NamedRule {
    /// Registry key.
    fn name(&self) -> &str;
}

/// Ordered registry of uniquely named rules.
#[derive(Debug, Clone)]
pub struct RuleSet<R> {
    rules: Vec<R>,
}

impl<R> Default for RuleSet<R> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<R: NamedRule> RuleSet<R> {
    /// Add a rule, replacing (and returning) any rule with the same name.
    pub fn insert(&mut self, rule: R) -> Option<R> {
        match self.rules.iter_mut().find(|r| r.name() == rule.name()) {
            Some(slot) => Some(std::mem::replace(slot, rule)),
            None => {
                self.rules.push(rule);
                None
            }
        }
    }

    /// Remove and return the named rule.
    pub fn remove(&mut self, name: &str) -> Option<R> {
        let index = self.rules.iter().position(|r| r.name() == name)?;
        Some(self.rules.remove(index))
    }

    /// Whether a rule with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.rules.iter().any(|r| r.name() == name)
    }

    /// Rule names in evaluation order.
    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(NamedRule::name).collect()
    }

    /// Iterate in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.rules.iter()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Projection of a change onto a state
// ---------------------------------------------------------------------------

/// Traits and abilities a creature would hold after a change.
struct Projection<'a> {
    traits: BTreeMap<&'a str, &'a TraitDefinition>,
    abilities: BTreeMap<&'a str, (&'a AbilityDefinition, bool)>,
}

impl<'a> Projection<'a> {
    fn new(change: &'a FormChange, state: &'a CreatureState) -> Self {
        let removed_traits = change.traits().map(|t| &t.remove);
        let mut traits: BTreeMap<&str, &TraitDefinition> = state
            .traits
            .iter()
            .filter(|t| removed_traits.is_none_or(|r| !r.contains(t.id())))
            .map(|t| (t.id(), &t.definition))
            .collect();
        for definition in added_definitions(change) {
            traits.insert(definition.id.as_str(), definition);
        }

        let removed_abilities = change.abilities().map(|a| &a.remove);
        let mut abilities: BTreeMap<&str, (&AbilityDefinition, bool)> = state
            .abilities
            .iter()
            .filter(|(id, _)| removed_abilities.is_none_or(|r| !r.contains(*id)))
            .map(|(id, ability)| (id.as_str(), (ability, false)))
            .collect();
        if let Some(delta) = change.abilities() {
            for (id, ability) in &delta.add {
                abilities.insert(id.as_str(), (ability, true));
            }
        }
        Self { traits, abilities }
    }
}

// ---------------------------------------------------------------------------
// Change rules
// ---------------------------------------------------------------------------

/// Rules every [`ChangeValidator`](crate::ChangeValidator) starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuiltinChangeRule {
    /// Removed traits and abilities must be held.
    RemovalTargetsExist,
    /// Modified traits and abilities must be held or gained by the change.
    ModificationTargetsExist,
    /// Gained traits and abilities must not already be held.
    DuplicateAcquisition,
    /// Gained traits must not clash with the resulting trait set.
    TraitCompatibility,
    /// Gained traits must have their prerequisites in the resulting trait set.
    TraitPrerequisites,
    /// Every resulting ability must have its required traits.
    AbilityRequirements,
    /// The resulting ability count must stay within the limit.
    AbilityCapacity,
    /// Strengths and powers must lie in `[0, 1]`.
    UnitRange,
    /// Warn about trait strengths below the minimum expression level.
    WeakTraitStrength,
    /// Warn about removing features, behaviors or locomotion not present.
    AbsentRemovals,
    /// Warn when the primary locomotion also appears as secondary.
    RedundantLocomotion,
    /// The primary locomotion may only go away by naming a new primary.
    PrimaryLocomotionKept,
}

impl BuiltinChangeRule {
    /// Every built-in change rule, in default evaluation order.
    pub const ALL: [Self; 12] = [
        Self::RemovalTargetsExist,
        Self::ModificationTargetsExist,
        Self::DuplicateAcquisition,
        Self::TraitCompatibility,
        Self::TraitPrerequisites,
        Self::AbilityRequirements,
        Self::AbilityCapacity,
        Self::UnitRange,
        Self::WeakTraitStrength,
        Self::AbsentRemovals,
        Self::RedundantLocomotion,
        Self::PrimaryLocomotionKept,
    ];

    /// Registry key.
    pub const fn name(self) -> &'static str {
        match self {
            Self::RemovalTargetsExist => "removal_targets_exist",
            Self::ModificationTargetsExist => "modification_targets_exist",
            Self::DuplicateAcquisition => "duplicate_acquisition",
            Self::TraitCompatibility => "trait_compatibility",
            Self::TraitPrerequisites => "trait_prerequisites",
            Self::AbilityRequirements => "ability_requirements",
            Self::AbilityCapacity => "ability_capacity",
            Self::UnitRange => "unit_range",
            Self::WeakTraitStrength => "weak_trait_strength",
            Self::AbsentRemovals => "absent_removals",
            Self::RedundantLocomotion => "redundant_locomotion",
            Self::PrimaryLocomotionKept => "primary_locomotion_kept",
        }
    }

    /// Severity the rule is registered with.
    pub const fn default_severity(self) -> ValidationSeverity {
        match self {
            Self::UnitRange => ValidationSeverity::Critical,
            Self::WeakTraitStrength | Self::AbsentRemovals | Self::RedundantLocomotion => {
                ValidationSeverity::Warning
            }
            _ => ValidationSeverity::Error,
        }
    }

    #[allow(clippy::too_many_lines)]
    fn check(
        self,
        change: &FormChange,
        state: &CreatureState,
        limits: RuleLimits,
    ) -> Vec<(Option<ChangeSection>, String)> {
        let traits = Some(ChangeSection::Traits);
        let abilities = Some(ChangeSection::Abilities);
        let mut out = Vec::new();

        match self {
            Self::RemovalTargetsExist => {
                if let Some(delta) = change.traits() {
                    for id in delta.remove.iter().filter(|id| !state.has_trait(id)) {
                        out.push((traits, format!("cannot remove trait {id}: not held")));
                    }
                }
                if let Some(delta) = change.abilities() {
                    for id in delta.remove.iter().filter(|id| !state.has_ability(id)) {
                        out.push((abilities, format!("cannot remove ability {id}: not held")));
                    }
                }
            }
            Self::ModificationTargetsExist => {
                if let Some(delta) = change.traits() {
                    let added = delta.added_ids();
                    for id in delta.modified_ids() {
                        if !state.has_trait(&id) && !added.contains(&id) {
                            out.push((traits, format!("cannot modify trait {id}: not held")));
                        }
                    }
                }
                if let Some(delta) = change.abilities() {
                    for id in delta.power.keys().filter(|id| !state.has_ability(id)) {
                        out.push((abilities, format!("cannot modify ability {id}: not held")));
                    }
                }
            }
            Self::DuplicateAcquisition => {
                if let Some(delta) = change.traits() {
                    for id in delta.added_ids() {
                        if state.has_trait(&id) && !delta.remove.contains(&id) {
                            out.push((traits, format!("trait {id} is already held")));
                        }
                    }
                }
                if let Some(delta) = change.abilities() {
                    for id in delta.add.keys() {
                        if state.has_ability(id) && !delta.remove.contains(id) {
                            out.push((abilities, format!("ability {id} is already held")));
                        }
                    }
                }
            }
            Self::TraitCompatibility => {
                let projection = Projection::new(change, state);
                let mut clashes = BTreeSet::new();
                for added in added_definitions(change) {
                    for other in projection.traits.values() {
                        if other.id != added.id && added.conflicts_with(other) {
                            let (a, b) = if added.id <= other.id {
                                (&added.id, &other.id)
                            } else {
                                (&other.id, &added.id)
                            };
                            clashes.insert(format!("traits {a} and {b} are incompatible"));
                        }
                    }
                }
                out.extend(clashes.into_iter().map(|message| (traits, message)));
            }
            Self::TraitPrerequisites => {
                let projection = Projection::new(change, state);
                for added in added_definitions(change) {
                    for prerequisite in &added.prerequisites {
                        if !projection.traits.contains_key(prerequisite.as_str()) {
                            out.push((
                                traits,
                                format!("trait {} requires trait {prerequisite}", added.id),
                            ));
                        }
                    }
                }
            }
            Self::AbilityRequirements => {
                let projection = Projection::new(change, state);
                for (id, (ability, added)) in &projection.abilities {
                    for required in &ability.required_traits {
                        if !projection.traits.contains_key(required.as_str()) {
                            let section = if *added { abilities } else { traits };
                            out.push((
                                section,
                                format!("ability {id} requires trait {required}"),
                            ));
                        }
                    }
                }
            }
            Self::AbilityCapacity => {
                let projection = Projection::new(change, state);
                if projection.abilities.len() > limits.max_active_abilities {
                    out.push((
                        abilities,
                        format!(
                            "{} abilities exceed the limit of {}",
                            projection.abilities.len(),
                            limits.max_active_abilities
                        ),
                    ));
                }
            }
            Self::UnitRange => {
                if let Some(delta) = change.traits() {
                    let strengths = delta
                        .add
                        .iter()
                        .map(|a| (&a.definition.id, a.strength))
                        .chain(delta.strength.iter().map(|(id, s)| (id, *s)));
                    for (id, strength) in strengths.filter(|(_, s)| !is_unit(*s)) {
                        out.push((
                            traits,
                            format!("trait {id} strength {strength} is outside [0, 1]"),
                        ));
                    }
                }
                if let Some(delta) = change.abilities() {
                    let powers = delta
                        .add
                        .iter()
                        .map(|(id, a)| (id, a.power))
                        .chain(delta.power.iter().map(|(id, p)| (id, *p)));
                    for (id, power) in powers.filter(|(_, p)| !is_unit(*p)) {
                        out.push((
                            abilities,
                            format!("ability {id} power {power} is outside [0, 1]"),
                        ));
                    }
                }
            }
            Self::WeakTraitStrength => {
                if let Some(delta) = change.traits() {
                    let strengths = delta
                        .add
                        .iter()
                        .map(|a| (&a.definition.id, a.strength))
                        .chain(delta.strength.iter().map(|(id, s)| (id, *s)));
                    for (id, strength) in strengths.filter(|(_, s)| *s < MIN_TRAIT_STRENGTH) {
                        out.push((
                            traits,
                            format!("trait {id} strength {strength} is barely expressed"),
                        ));
                    }
                }
            }
            Self::AbsentRemovals => {
                if let Some(delta) = change.physical() {
                    let form = &state.physical;
                    for feature in delta.remove_features.difference(&form.features) {
                        out.push((
                            Some(ChangeSection::Physical),
                            format!("feature {feature} is not present"),
                        ));
                    }
                    for mode in delta
                        .remove_locomotion
                        .difference(&form.secondary_locomotion)
                    {
                        out.push((
                            Some(ChangeSection::Physical),
                            format!("secondary locomotion {mode:?} is not present"),
                        ));
                    }
                }
                if let Some(delta) = change.behavior() {
                    for behavior in delta
                        .remove_behaviors
                        .difference(&state.behavior.behaviors)
                    {
                        out.push((
                            Some(ChangeSection::Behavior),
                            format!("behavior {behavior} is not present"),
                        ));
                    }
                }
            }
            Self::RedundantLocomotion => {
                if let Some(delta) = change.physical() {
                    let primary = delta.locomotion.unwrap_or(state.physical.locomotion);
                    let keeps = state.physical.secondary_locomotion.contains(&primary)
                        && !delta.remove_locomotion.contains(&primary);
                    if keeps || delta.add_locomotion.contains(&primary) {
                        out.push((
                            Some(ChangeSection::Physical),
                            format!("primary locomotion {primary:?} is also listed as secondary"),
                        ));
                    }
                }
            }
            Self::PrimaryLocomotionKept => {
                if let Some(delta) = change.physical() {
                    let current = state.physical.locomotion;
                    let replaced = delta.locomotion.is_some_and(|next| next != current);
                    if delta.remove_locomotion.contains(&current) && !replaced {
                        out.push((
                            Some(ChangeSection::Physical),
                            format!("primary locomotion {current:?} may not be removed"),
                        ));
                    }
                }
            }
        }
        out
    }
}

#[derive(Clone)]
enum ChangeCheck {
    Builtin(BuiltinChangeRule),
    Custom {
        section: Option<ChangeSection>,
        predicate: ChangePredicate,
    },
}

/// A named rule over a candidate change.
#[derive(Clone)]
pub struct ChangeRule {
    name: String,
    severity: ValidationSeverity,
    check: ChangeCheck,
}

impl core::fmt::Debug for ChangeRule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let kind = match &self.check {
            ChangeCheck::Builtin(rule) => format!("{rule:?}"),
            ChangeCheck::Custom { .. } => "custom".to_owned(),
        };
        f.debug_struct("ChangeRule")
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("kind", &kind)
            .finish()
    }
}

impl NamedRule for ChangeRule {
    fn name(&self) -> &str {
        &self.name
    }
}

impl ChangeRule {
    /// A built-in rule at its default severity.
    pub fn builtin(rule: BuiltinChangeRule) -> Self {
        Self {
            name: rule.name().to_owned(),
            severity: rule.default_severity(),
            check: ChangeCheck::Builtin(rule),
        }
    }

    /// A host rule. Findings are attributed to `section`.
    pub fn custom(
        name: impl Into<String>,
        severity: ValidationSeverity,
        section: Option<ChangeSection>,
        predicate: impl Fn(&FormChange, &CreatureState) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            severity,
            check: ChangeCheck::Custom {
                section,
                predicate: Arc::new(predicate),
            },
        }
    }

    /// The same rule at a different severity.
    #[must_use]
    pub fn with_severity(mut self, severity: ValidationSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Severity of the rule's findings.
    pub const fn severity(&self) -> ValidationSeverity {
        self.severity
    }

    /// Evaluate the rule.
    pub fn evaluate(
        &self,
        change: &FormChange,
        state: &CreatureState,
        limits: RuleLimits,
    ) -> Vec<ValidationFinding> {
        let raw = match &self.check {
            ChangeCheck::Builtin(rule) => rule.check(change, state, limits),
            ChangeCheck::Custom { section, predicate } => predicate(change, state)
                .into_iter()
                .map(|message| (*section, message))
                .collect(),
        };
        raw.into_iter()
            .map(|(section, message)| ValidationFinding {
                rule: self.name.clone(),
                severity: self.severity,
                section,
                subject: None,
                message,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// State rules
// ---------------------------------------------------------------------------

/// Rules every [`StateValidator`](crate::StateValidator) starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuiltinStateRule {
    /// Strengths, powers and the power level lie in `[0, 1]`.
    UnitRange,
    /// No trait is held twice.
    DuplicateTraits,
    /// No two held traits exclude each other.
    IncompatibleTraits,
    /// Every held ability has its required traits.
    AbilityRequirements,
    /// The ability count is within the limit.
    AbilityCapacity,
    /// Warn when the primary locomotion also appears as secondary.
    RedundantLocomotion,
}

impl BuiltinStateRule {
    /// Every built-in state rule, in default evaluation order.
    pub const ALL: [Self; 6] = [
        Self::UnitRange,
        Self::DuplicateTraits,
        Self::IncompatibleTraits,
        Self::AbilityRequirements,
        Self::AbilityCapacity,
        Self::RedundantLocomotion,
    ];

    /// Registry key.
    pub const fn name(self) -> &'static str {
        match self {
            Self::UnitRange => "unit_range",
            Self::DuplicateTraits => "duplicate_traits",
            Self::IncompatibleTraits => "incompatible_traits",
            Self::AbilityRequirements => "ability_requirements",
            Self::AbilityCapacity => "ability_capacity",
            Self::RedundantLocomotion => "redundant_locomotion",
        }
    }

    /// Severity the rule is registered with.
    pub const fn default_severity(self) -> ValidationSeverity {
        match self {
            Self::UnitRange | Self::DuplicateTraits => ValidationSeverity::Critical,
            Self::RedundantLocomotion => ValidationSeverity::Warning,
            _ => ValidationSeverity::Error,
        }
    }

    fn check(self, state: &CreatureState, limits: RuleLimits) -> Vec<String> {
        let mut out = Vec::new();
        match self {
            Self::UnitRange => {
                for active in state.traits.iter().filter(|t| !is_unit(t.strength)) {
                    out.push(format!(
                        "trait {} strength {} is outside [0, 1]",
                        active.id(),
                        active.strength
                    ));
                }
                for ability in state.abilities.values().filter(|a| !is_unit(a.power)) {
                    out.push(format!(
                        "ability {} power {} is outside [0, 1]",
                        ability.id, ability.power
                    ));
                }
                if !is_unit(state.power_level) {
                    out.push(format!("power level {} is outside [0, 1]", state.power_level));
                }
            }
            Self::DuplicateTraits => {
                let mut seen = BTreeSet::new();
                for active in &state.traits {
                    if !seen.insert(active.id()) {
                        out.push(format!("trait {} is held twice", active.id()));
                    }
                }
            }
            Self::IncompatibleTraits => {
                for (index, a) in state.traits.iter().enumerate() {
                    for b in state.traits.iter().skip(index.saturating_add(1)) {
                        if a.definition.conflicts_with(&b.definition) {
                            out.push(format!(
                                "traits {} and {} are incompatible",
                                a.id(),
                                b.id()
                            ));
                        }
                    }
                }
            }
            Self::AbilityRequirements => {
                for ability in state.abilities.values() {
                    for required in &ability.required_traits {
                        if !state.has_trait(required) {
                            out.push(format!("ability {} requires trait {required}", ability.id));
                        }
                    }
                }
            }
            Self::AbilityCapacity => {
                if state.abilities.len() > limits.max_active_abilities {
                    out.push(format!(
                        "{} abilities exceed the limit of {}",
                        state.abilities.len(),
                        limits.max_active_abilities
                    ));
                }
            }
            Self::RedundantLocomotion => {
                let form = &state.physical;
                if form.secondary_locomotion.contains(&form.locomotion) {
                    out.push(format!(
                        "primary locomotion {:?} is also listed as secondary",
                        form.locomotion
                    ));
                }
            }
        }
        out
    }
}

#[derive(Clone)]
enum StateCheck {
    Builtin(BuiltinStateRule),
    Custom(StatePredicate),
}

/// A named rule over a creature state.
#[derive(Clone)]
pub struct StateRule {
    name: String,
    severity: ValidationSeverity,
    check: StateCheck,
}

impl core::fmt::Debug for StateRule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let kind = match &self.check {
            StateCheck::Builtin(rule) => format!("{rule:?}"),
            StateCheck::Custom(_) => "custom".to_owned(),
        };
        f.debug_struct("StateRule")
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("kind", &kind)
            .finish()
    }
}

impl NamedRule for StateRule {
    fn name(&self) -> &str {
        &self.name
    }
}

impl StateRule {
    /// A built-in rule at its default severity.
    pub fn builtin(rule: BuiltinStateRule) -> Self {
        Self {
            name: rule.name().to_owned(),
            severity: rule.default_severity(),
            check: StateCheck::Builtin(rule),
        }
    }

    /// A host rule.
    pub fn custom(
        name: impl Into<String>,
        severity: ValidationSeverity,
        predicate: impl Fn(&CreatureState) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            severity,
            check: StateCheck::Custom(Arc::new(predicate)),
        }
    }

    /// The same rule at a different severity.
    #[must_use]
    pub fn with_severity(mut self, severity: ValidationSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Evaluate the rule.
    pub fn evaluate(&self, state: &CreatureState, limits: RuleLimits) -> Vec<ValidationFinding> {
        let messages = match &self.check {
            StateCheck::Builtin(rule) => rule.check(state, limits),
            StateCheck::Custom(predicate) => predicate(state),
        };
        messages
            .into_iter()
            .map(|message| ValidationFinding {
                rule: self.name.clone(),
                severity: self.severity,
                section: None,
                subject: Some(state.id.to_string()),
                message,
            })
            .collect()
    }
}
