//! Catalyst-driven trait synthesis for the Crescent engine.
//!
//! A synthesis transforms a held trait into a new form when a catalyst of
//! sufficient intensity follows a registered path. Each trait moves through
//! a stage machine; sustained exposure carries it to completion, while a
//! lost catalyst degrades it and eventually reverts it to its base form.
//!
//! # Modules
//!
//! - [`config`] -- Stage timing and stability boundaries ([`SynthesisConfig`])
//! - [`engine`] -- The shared [`SynthesisEngine`] and per-creature [`SynthesisBook`]
//! - [`error`] -- Failures and errors ([`SynthesisFailure`], [`SynthesisError`])
//! - [`rules`] -- The path table ([`SynthesisRules`])
//! - [`state`] -- The per-trait stage machine ([`SynthesisState`])

pub mod config;
pub mod engine;
pub mod error;
pub mod rules;
pub mod state;

pub use config::SynthesisConfig;
pub use engine::{
    PendingSynthesis, REVERSION_TAG, SYNTHESIS_TAG, SynthesisBook, SynthesisChange,
    SynthesisChangeKind, SynthesisEngine, SynthesisMetrics, SynthesisTick, TraitTransition,
};
pub use error::{SynthesisError, SynthesisFailure};
pub use rules::{
    PotentialPath, RequirementCheck, StabilityFactors, SynthesisOutcome, SynthesisPath,
    SynthesisPathKey, SynthesisRequirement, SynthesisRules,
};
pub use state::{
    ActivePath, AppliedOutcome, Catalyst, CatalystInfluence, StageTransition, SynthesisContext, SynthesisEvent,
    SynthesisEventKind, SynthesisProgress, SynthesisResult, SynthesisState, TransitionEffect,
};
