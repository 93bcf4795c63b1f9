//! The synthesis rule table.
//!
//! A path is keyed by `(source form, catalyst type, target form)` and maps
//! to the requirement a catalyst must meet and the outcome a completed
//! synthesis produces. The table is populated once, then shared read-only
//! behind an `Arc`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crescent_types::{CatalystType, SynthesisFailureType, clamp_unit};
use serde::{Deserialize, Serialize};

use crate::error::{SynthesisError, SynthesisFailure};

/// Composite key of a synthesis path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SynthesisPathKey {
    /// Form the trait is in before synthesis.
    pub source_form: String,
    /// Catalyst type driving the synthesis.
    pub catalyst: CatalystType,
    /// Form the trait takes afterwards.
    pub target_form: String,
}

impl SynthesisPathKey {
    /// Key for `source_form --catalyst--> target_form`.
    pub fn new(
        source_form: impl Into<String>,
        catalyst: CatalystType,
        target_form: impl Into<String>,
    ) -> Self {
        Self {
            source_form: source_form.into(),
            catalyst,
            target_form: target_form.into(),
        }
    }
}

impl fmt::Display for SynthesisPathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -[{:?}]-> {}",
            self.source_form, self.catalyst, self.target_form
        )
    }
}

/// What a catalyst and creature must satisfy to start a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequirement {
    /// Minimum catalyst intensity.
    pub minimum_intensity: f32,
    /// Minimum current stability of the trait's synthesis.
    pub minimum_stability: f32,
    /// Minimum number of syntheses the trait has completed.
    pub required_level: u32,
    /// Co-traits the creature must hold.
    pub required_traits: BTreeSet<String>,
    /// Environment the creature must be in, if any.
    pub required_environment: Option<String>,
    /// Completion at which forming gives way to stabilizing.
    pub formation_threshold: f32,
}

impl Default for SynthesisRequirement {
    fn default() -> Self {
        Self {
            minimum_intensity: 0.0,
            minimum_stability: 0.0,
            required_level: 0,
            required_traits: BTreeSet::new(),
            required_environment: None,
            formation_threshold: 1.0,
        }
    }
}

impl SynthesisRequirement {
    /// A requirement needing at least `minimum_intensity`.
    pub fn new(minimum_intensity: f32) -> Self {
        Self {
            minimum_intensity,
            ..Self::default()
        }
    }

    /// Require at least this much stability.
    #[must_use]
    pub const fn with_minimum_stability(mut self, stability: f32) -> Self {
        self.minimum_stability = stability;
        self
    }

    /// Require this many completed syntheses.
    #[must_use]
    pub const fn at_level(mut self, level: u32) -> Self {
        self.required_level = level;
        self
    }

    /// Require a co-trait.
    #[must_use]
    pub fn requires_trait(mut self, trait_id: impl Into<String>) -> Self {
        self.required_traits.insert(trait_id.into());
        self
    }

    /// Require an environment.
    #[must_use]
    pub fn in_environment(mut self, environment_id: impl Into<String>) -> Self {
        self.required_environment = Some(environment_id.into());
        self
    }

    /// Set the completion at which forming ends.
    #[must_use]
    pub const fn with_formation_threshold(mut self, threshold: f32) -> Self {
        self.formation_threshold = threshold;
        self
    }
}

/// What a completed synthesis does to the creature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisOutcome {
    /// Form the trait takes.
    pub result_form: String,
    /// Ability ids granted.
    pub granted_abilities: Vec<String>,
    /// Trait ids suppressed while the form holds.
    pub suppressed_traits: Vec<String>,
    /// Multiplier on computed stability.
    pub stability_modifier: f32,
    /// Whether the form is immune to decay and degradation.
    pub permanent: bool,
}

impl SynthesisOutcome {
    /// An outcome producing `result_form` with no side effects.
    pub fn new(result_form: impl Into<String>) -> Self {
        Self {
            result_form: result_form.into(),
            granted_abilities: Vec::new(),
            suppressed_traits: Vec::new(),
            stability_modifier: 1.0,
            permanent: false,
        }
    }

    /// Grant an ability.
    #[must_use]
    pub fn grants(mut self, ability_id: impl Into<String>) -> Self {
        self.granted_abilities.push(ability_id.into());
        self
    }

    /// Suppress a trait.
    #[must_use]
    pub fn suppresses(mut self, trait_id: impl Into<String>) -> Self {
        self.suppressed_traits.push(trait_id.into());
        self
    }

    /// Scale computed stability.
    #[must_use]
    pub const fn with_stability_modifier(mut self, modifier: f32) -> Self {
        self.stability_modifier = modifier;
        self
    }

    /// Make the result permanent.
    #[must_use]
    pub const fn permanent(mut self) -> Self {
        self.permanent = true;
        self
    }
}

/// Constants of the stability formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilityFactors {
    /// Stability at full catalyst strength and level zero.
    pub base_stability: f32,
    /// Weight of catalyst strength.
    pub catalyst_multiplier: f32,
    /// Stability lost per completed synthesis.
    pub level_penalty: f32,
    /// Floor of computed stability.
    pub min_stability: f32,
}

impl Default for StabilityFactors {
    fn default() -> Self {
        Self {
            base_stability: 1.0,
            catalyst_multiplier: 1.0,
            level_penalty: 0.1,
            min_stability: 0.2,
        }
    }
}

/// A registered path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisPath {
    /// Entry requirement.
    pub requirement: SynthesisRequirement,
    /// Result on completion.
    pub outcome: SynthesisOutcome,
}

/// The creature-side facts a requirement is checked against.
#[derive(Debug, Clone, Copy)]
pub struct RequirementCheck<'a> {
    /// Catalyst intensity offered.
    pub intensity: f32,
    /// Current stability of the trait's synthesis.
    pub stability: f32,
    /// Syntheses the trait has completed.
    pub level: u32,
    /// Trait ids the creature holds.
    pub held_traits: &'a BTreeSet<String>,
    /// Environment the creature is in.
    pub environment: Option<&'a str>,
}

/// A path reachable from a form, with its expected stability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotentialPath {
    /// The path key.
    pub key: SynthesisPathKey,
    /// Minimum catalyst intensity the path needs.
    pub minimum_intensity: f32,
    /// Stability at full catalyst strength.
    pub estimated_stability: f32,
}

/// Read-only table of synthesis paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRules {
    paths: BTreeMap<SynthesisPathKey, SynthesisPath>,
    factors: StabilityFactors,
}

impl SynthesisRules {
    /// An empty table with default stability factors.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty table with custom stability factors.
    pub fn with_factors(factors: StabilityFactors) -> Self {
        Self {
            paths: BTreeMap::new(),
            factors,
        }
    }

    /// Stability factors in use.
    pub const fn factors(&self) -> StabilityFactors {
        self.factors
    }

    /// Register a path.
    pub fn register_path(
        &mut self,
        key: SynthesisPathKey,
        requirement: SynthesisRequirement,
        outcome: SynthesisOutcome,
    ) -> Result<(), SynthesisError> {
        if self.paths.contains_key(&key) {
            return Err(SynthesisError::DuplicatePath(key));
        }
        let threshold = requirement.formation_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(SynthesisError::InvalidPath {
                key,
                reason: format!("formation threshold {threshold} must lie in (0, 1]"),
            });
        }
        if !(outcome.stability_modifier.is_finite() && outcome.stability_modifier > 0.0) {
            return Err(SynthesisError::InvalidPath {
                key,
                reason: "stability modifier must be positive".to_owned(),
            });
        }
        self.paths.insert(key, SynthesisPath { requirement, outcome });
        Ok(())
    }

    /// Look up a path.
    pub fn path(&self, key: &SynthesisPathKey) -> Option<&SynthesisPath> {
        self.paths.get(key)
    }

    /// Every path leaving `source_form`.
    pub fn paths_from<'a>(
        &'a self,
        source_form: &'a str,
    ) -> impl Iterator<Item = (&'a SynthesisPathKey, &'a SynthesisPath)> + 'a {
        self.paths
            .iter()
            .filter(move |(key, _)| key.source_form == source_form)
    }

    /// Paths leaving `source_form` with their stability at full catalyst
    /// strength for a trait at `level`, most stable first.
    pub fn potential_paths(&self, source_form: &str, level: u32) -> Vec<PotentialPath> {
        let mut potential: Vec<PotentialPath> = self
            .paths_from(source_form)
            .map(|(key, path)| PotentialPath {
                key: key.clone(),
                minimum_intensity: path.requirement.minimum_intensity,
                estimated_stability: self.calculate_stability(
                    path.outcome.stability_modifier,
                    level,
                    1.0,
                ),
            })
            .collect();
        potential.sort_by(|a, b| b.estimated_stability.total_cmp(&a.estimated_stability));
        potential
    }

    /// Stability of a synthesis.
    ///
    /// `base * catalyst_multiplier * strength * modifier - level * level_penalty`,
    /// floored at the minimum stability and clamped to `[0, 1]`.
    pub fn calculate_stability(&self, modifier: f32, level: u32, catalyst_strength: f32) -> f32 {
        let factors = self.factors;
        let raw = factors.base_stability * factors.catalyst_multiplier * catalyst_strength * modifier
            - level_as_f32(level) * factors.level_penalty;
        clamp_unit(raw.max(factors.min_stability))
    }

    /// Check a path's requirement, returning the path when it is met.
    ///
    /// Checks run in a fixed order: path existence, catalyst intensity,
    /// stability, level and co-traits, environment.
    pub fn evaluate(
        &self,
        key: &SynthesisPathKey,
        check: &RequirementCheck<'_>,
    ) -> Result<&SynthesisPath, SynthesisFailure> {
        let path = self.path(key).ok_or_else(|| {
            SynthesisFailure::new(
                SynthesisFailureType::Incompatible,
                format!("no synthesis path {key}"),
            )
        })?;
        let requirement = &path.requirement;

        if check.intensity < requirement.minimum_intensity {
            return Err(SynthesisFailure::new(
                SynthesisFailureType::CatalystWeak,
                format!(
                    "catalyst intensity {} below required {}",
                    check.intensity, requirement.minimum_intensity
                ),
            ));
        }
        if check.stability < requirement.minimum_stability {
            return Err(SynthesisFailure::new(
                SynthesisFailureType::Stability,
                format!(
                    "stability {} below required {}",
                    check.stability, requirement.minimum_stability
                ),
            ));
        }
        if check.level < requirement.required_level {
            return Err(SynthesisFailure::new(
                SynthesisFailureType::Requirements,
                format!(
                    "synthesis level {} below required {}",
                    check.level, requirement.required_level
                ),
            ));
        }
        let missing: Vec<&str> = requirement
            .required_traits
            .difference(check.held_traits)
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(SynthesisFailure::new(
                SynthesisFailureType::Requirements,
                format!("missing required traits: {}", missing.join(", ")),
            ));
        }
        if let Some(required) = &requirement.required_environment {
            if check.environment != Some(required.as_str()) {
                return Err(SynthesisFailure::new(
                    SynthesisFailureType::Environmental,
                    format!("requires environment {required}"),
                ));
            }
        }
        Ok(path)
    }

    /// Number of registered paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether no paths are registered.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

pub(crate) fn level_as_f32(level: u32) -> f32 {
    u16::try_from(level).map_or(f32::from(u16::MAX), f32::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn key(target: &str) -> SynthesisPathKey {
        SynthesisPathKey::new("fireproof", CatalystType::Environmental, target)
    }

    fn rules() -> SynthesisRules {
        let mut rules = SynthesisRules::new();
        rules
            .register_path(
                key("magma_skin"),
                SynthesisRequirement::new(0.5)
                    .with_minimum_stability(0.4)
                    .requires_trait("thick_hide")
                    .in_environment("volcano"),
                SynthesisOutcome::new("magma_skin").grants("lava_wade"),
            )
            .unwrap();
        rules
            .register_path(
                key("ember_coat"),
                SynthesisRequirement::new(0.2).at_level(1),
                SynthesisOutcome::new("ember_coat").with_stability_modifier(0.8),
            )
            .unwrap();
        rules
    }

    fn held(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|id| (*id).to_owned()).collect()
    }

    #[test]
    fn keys_compare_structurally() {
        assert_eq!(key("magma_skin"), key("magma_skin"));
        assert_ne!(
            key("magma_skin"),
            SynthesisPathKey::new("fireproof", CatalystType::Stress, "magma_skin")
        );
    }

    #[test]
    fn duplicate_and_invalid_paths_rejected() {
        let mut rules = rules();
        assert!(matches!(
            rules.register_path(
                key("magma_skin"),
                SynthesisRequirement::default(),
                SynthesisOutcome::new("x")
            ),
            Err(SynthesisError::DuplicatePath(_))
        ));
        assert!(matches!(
            rules.register_path(
                key("glass"),
                SynthesisRequirement::default().with_formation_threshold(0.0),
                SynthesisOutcome::new("glass")
            ),
            Err(SynthesisError::InvalidPath { .. })
        ));
    }

    #[test]
    fn evaluation_order_tags_failures() {
        let rules = rules();
        let traits = held(&["fireproof", "thick_hide"]);
        let mut check = RequirementCheck {
            intensity: 0.3,
            stability: 1.0,
            level: 0,
            held_traits: &traits,
            environment: Some("volcano"),
        };
        let failure = |check: &RequirementCheck<'_>, target: &str| {
            rules.evaluate(&key(target), check).unwrap_err().failure_type
        };

        assert_eq!(failure(&check, "glass"), SynthesisFailureType::Incompatible);
        assert_eq!(failure(&check, "magma_skin"), SynthesisFailureType::CatalystWeak);
        check.intensity = 0.9;
        check.stability = 0.1;
        assert_eq!(failure(&check, "magma_skin"), SynthesisFailureType::Stability);
        check.stability = 1.0;
        check.environment = Some("tundra");
        assert_eq!(failure(&check, "magma_skin"), SynthesisFailureType::Environmental);
        check.environment = Some("volcano");
        assert!(rules.evaluate(&key("magma_skin"), &check).is_ok());
        assert_eq!(failure(&check, "ember_coat"), SynthesisFailureType::Requirements);
    }

    #[test]
    fn missing_co_trait_is_a_requirement_failure() {
        let rules = rules();
        let traits = held(&["fireproof"]);
        let check = RequirementCheck {
            intensity: 0.9,
            stability: 1.0,
            level: 0,
            held_traits: &traits,
            environment: Some("volcano"),
        };
        let failure = rules.evaluate(&key("magma_skin"), &check).unwrap_err();
        assert_eq!(failure.failure_type, SynthesisFailureType::Requirements);
        assert!(failure.message.contains("thick_hide"));
    }

    #[test]
    fn stability_formula_floors_and_penalizes_level() {
        let rules = SynthesisRules::new();
        assert!((rules.calculate_stability(1.0, 0, 0.8) - 0.8).abs() < 1e-6);
        assert!((rules.calculate_stability(1.0, 2, 0.8) - 0.6).abs() < 1e-6);
        assert!((rules.calculate_stability(1.0, 0, 0.05) - 0.2).abs() < 1e-6);
        assert!((rules.calculate_stability(2.0, 0, 0.9) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn potential_paths_sorted_by_stability() {
        let rules = rules();
        let potential = rules.potential_paths("fireproof", 0);
        assert_eq!(potential.len(), 2);
        assert_eq!(potential[0].key.target_form, "magma_skin");
        assert!(potential[0].estimated_stability >= potential[1].estimated_stability);
        assert!(rules.potential_paths("frostborn", 0).is_empty());
    }
}
