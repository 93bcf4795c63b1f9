//! Environmental stress simulation for the Crescent engine.
//!
//! Stressors from an environment accumulate on a creature, dissipate once
//! they are gone, and are countered by innate, trait-based and adaptive
//! resistance. Crossing a threshold notifies registered callbacks;
//! sustained major stress starts adaptation attempts, and sustained
//! critical stress signals extinction.
//!
//! # Modules
//!
//! - [`config`] -- Thresholds and tunables ([`StressConfig`])
//! - [`engine`] -- The shared [`StressEngine`]
//! - [`error`] -- Stress errors ([`StressError`])
//! - [`state`] -- Per-creature [`StressState`]

pub mod config;
pub mod engine;
pub mod error;
pub mod state;

pub use config::{StressConfig, StressThresholds, Threshold};
pub use engine::{ExtinctionCallback, StressEngine, StressReport, ThresholdCallback, ThresholdCrossing};
pub use error::StressError;
pub use state::{
    ActiveStressor, AdaptationAttempt, AdaptiveResistance, EffectProfile, ResistanceProfile,
    StressProfile, StressRecord, StressState,
};
