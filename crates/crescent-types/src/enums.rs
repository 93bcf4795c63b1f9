//! Enumeration types shared by every Crescent crate.
//!
//! Creature anatomy, trait and ability classification, change metadata,
//! synthesis stages and stress thresholds all live here so that the engine
//! crates agree on one vocabulary.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Anatomy
// ---------------------------------------------------------------------------

/// Overall body size of a creature, smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Size {
    /// Insect to rodent scale.
    Tiny,
    /// Cat to dog scale.
    Small,
    /// Human scale.
    Medium,
    /// Horse to bear scale.
    Large,
    /// Elephant scale.
    Huge,
    /// Anything bigger than a house.
    Colossal,
}

/// Dominant body plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BodyShape {
    /// Winged, bird-like frame.
    Avian,
    /// Reptilian frame with wings and tail.
    Draconic,
    /// Long limbless body.
    Serpentine,
    /// Many-legged spider-like frame.
    Arachnid,
    /// Armored insectoid frame.
    Chitinous,
    /// No fixed shape.
    Amorphous,
    /// Upright biped.
    Humanoid,
    /// Four-legged beast.
    Bestial,
    /// Defies classification.
    Aberrant,
}

/// Means of movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Locomotion {
    /// Moves on legs.
    Walker,
    /// Flies under its own power.
    Flyer,
    /// Moves through water.
    Swimmer,
    /// Digs through earth.
    Burrower,
    /// Passes through solid matter.
    Phaser,
    /// Relocates instantly.
    Teleporter,
    /// Drags itself along the ground.
    Crawler,
    /// Drifts through the air.
    Floater,
    /// Moves by undulating its body.
    Slitherer,
}

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// Cognitive capacity, least capable first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Intelligence {
    /// Pure instinct.
    Mindless,
    /// Animal cunning.
    Animal,
    /// Tactical reasoning.
    Cunning,
    /// Self-aware.
    Sapient,
}

/// Disposition towards other creatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Aggression {
    /// Avoids conflict.
    Passive,
    /// Fights only when threatened.
    Defensive,
    /// Guards a home range.
    Territorial,
    /// Seeks out conflict.
    Aggressive,
}

/// How a creature lives with others of its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SocialStructure {
    /// Lives alone.
    Solitary,
    /// Lives in mated pairs.
    Pair,
    /// Small cooperative group.
    Pack,
    /// Large coordinated colony.
    Hive,
    /// Loose mass of individuals.
    Swarm,
}

// ---------------------------------------------------------------------------
// Traits and abilities
// ---------------------------------------------------------------------------

/// How a trait shows itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Manifestation {
    /// Visible physical change.
    Physical,
    /// Behavior modification.
    Behavioral,
    /// Internal process.
    Metabolic,
    /// Sensing capability.
    Sensory,
    /// Protection mechanism.
    Defensive,
    /// Attack capability.
    Offensive,
    /// Environmental adaptation.
    Adaptive,
    /// Non-physical manifestation.
    Ethereal,
}

/// Where a trait came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TraitOrigin {
    /// Present since generation.
    Innate,
    /// Gained through adaptation.
    Evolved,
    /// Produced by synthesis.
    Synthesized,
}

/// Classification of an ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AbilityKind {
    /// Present since generation.
    Innate,
    /// Granted by the surroundings.
    Environmental,
    /// Gained through adaptation.
    Evolved,
    /// Granted by synthesis.
    Synthetic,
    /// Protective.
    Defensive,
    /// Aggressive.
    Offensive,
    /// Arises from trait interaction.
    Emergent,
    /// Expires on its own.
    Temporary,
}

// ---------------------------------------------------------------------------
// Changes and validation
// ---------------------------------------------------------------------------

/// Which subsystem produced a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChangeSource {
    /// Environmental pressure.
    Environment,
    /// Long-term evolution.
    Evolution,
    /// Trait synthesis.
    Synthesis,
    /// Stress-triggered adaptation.
    Stress,
    /// Host-issued edit.
    Manual,
    /// Engine bookkeeping, such as merged or inverse changes.
    System,
}

impl ChangeSource {
    /// Whether a change from this source counts as a mutation of the creature.
    pub const fn is_mutation(self) -> bool {
        matches!(
            self,
            Self::Environment | Self::Evolution | Self::Synthesis | Self::Stress
        )
    }
}

/// Priority of a change. Higher priorities win conflicts.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ChangePriority {
    /// Background adjustment.
    Low,
    /// Default priority.
    #[default]
    Normal,
    /// Preferred over normal changes.
    High,
    /// Must apply; may partially apply when one section is invalid.
    Critical,
}

impl ChangePriority {
    /// Numeric weight of the priority (0, 50, 75, 100).
    pub const fn weight(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Normal => 50,
            Self::High => 75,
            Self::Critical => 100,
        }
    }
}

/// Severity of a validation finding, least severe first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ValidationSeverity {
    /// Worth reporting, never blocks by default.
    Warning,
    /// Blocks the change under the default configuration.
    #[default]
    Error,
    /// Would corrupt state.
    Critical,
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

/// Kind of trigger that starts or feeds a synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CatalystType {
    /// Driven by the surroundings.
    Environmental,
    /// Driven by sustained stress.
    Stress,
    /// Driven by interaction between traits.
    Resonance,
    /// Forced by the host.
    Forced,
    /// Any other outside source.
    External,
}

/// Stage of a trait synthesis.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum SynthesisStage {
    /// No synthesis in progress.
    #[default]
    None,
    /// Accepted, waiting for the first sustained exposure.
    Initiating,
    /// Completion is building up.
    Forming,
    /// Waiting for stability to hold.
    Stabilizing,
    /// The new form is manifest.
    Complete,
    /// Losing ground; recovers if exposure resumes.
    Degrading,
    /// About to revert unless exposure resumes.
    Critical,
}

impl SynthesisStage {
    /// Whether a synthesis is underway (neither idle nor complete).
    pub const fn is_in_progress(self) -> bool {
        !matches!(self, Self::None | Self::Complete)
    }
}

/// How firmly a synthesized form holds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum StabilityClass {
    /// May fail at any time.
    Unstable,
    /// Wavers in strength.
    Fluctuating,
    /// Holds its state.
    #[default]
    Stable,
    /// Extra stable.
    Reinforced,
    /// Can no longer change.
    Permanent,
}

/// Reason a synthesis could not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SynthesisFailureType {
    /// Level or co-trait requirements are unmet.
    Requirements,
    /// The trait is not stable enough.
    Stability,
    /// No path exists, the trait cannot synthesize, or one is already underway.
    Incompatible,
    /// The current environment does not allow the path.
    Environmental,
    /// The catalyst is below the path's minimum intensity.
    CatalystWeak,
    /// The request itself is malformed.
    SystemicFailure,
}

// ---------------------------------------------------------------------------
// Stress
// ---------------------------------------------------------------------------

/// Category of environmental pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StressorCategory {
    /// Heat or cold.
    Thermal,
    /// Toxins, acids, radiation.
    Chemical,
    /// Pressure, impact, abrasion.
    Physical,
    /// Scarcity of food or water.
    Resource,
    /// Rivals for the same niche.
    Competition,
    /// General hostility of the surroundings.
    Environmental,
}

/// Named stress boundaries, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ThresholdKind {
    /// Small adaptations become possible.
    MinorAdaptation,
    /// Sustained pressure here can trigger adaptation.
    MajorAdaptation,
    /// Stress can act as a synthesis catalyst.
    SynthesisEnabled,
    /// Survival is at risk; resistance growth stops.
    ExtinctionRisk,
    /// Sustained pressure here signals extinction.
    Critical,
}

impl ThresholdKind {
    /// All thresholds in ascending order.
    pub const ALL: [Self; 5] = [
        Self::MinorAdaptation,
        Self::MajorAdaptation,
        Self::SynthesisEnabled,
        Self::ExtinctionRisk,
        Self::Critical,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_low_to_critical() {
        assert!(ChangePriority::Critical > ChangePriority::High);
        assert!(ChangePriority::High > ChangePriority::Normal);
        assert!(ChangePriority::Normal > ChangePriority::Low);
        assert_eq!(ChangePriority::High.weight(), 75);
    }

    #[test]
    fn mutation_sources() {
        assert!(ChangeSource::Stress.is_mutation());
        assert!(ChangeSource::Synthesis.is_mutation());
        assert!(!ChangeSource::Manual.is_mutation());
        assert!(!ChangeSource::System.is_mutation());
    }

    #[test]
    fn stage_progress_flags() {
        assert!(!SynthesisStage::None.is_in_progress());
        assert!(!SynthesisStage::Complete.is_in_progress());
        assert!(SynthesisStage::Forming.is_in_progress());
        assert!(SynthesisStage::Critical.is_in_progress());
    }

    #[test]
    fn thresholds_listed_ascending() {
        let mut sorted = ThresholdKind::ALL;
        sorted.sort();
        assert_eq!(sorted, ThresholdKind::ALL);
    }
}
