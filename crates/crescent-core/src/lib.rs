//! Simulation orchestration for the Crescent creature adaptation engine.
//!
//! Ties the engines together: each tick stresses a creature in its
//! environment, turns sustained stress into synthesis catalysts and
//! adaptation attempts, and routes every resulting change through the
//! creature's change processor.
//!
//! # Modules
//!
//! - [`clock`] -- Accumulated-time fixed stepping ([`FixedStepClock`])
//! - [`config`] -- YAML configuration ([`SimulationConfig`])
//! - [`context`] -- Shared tables and engines ([`SimulationContext`])
//! - [`creature`] -- The per-creature aggregate ([`Creature`])
//! - [`error`] -- Tick and logging errors
//! - [`logging`] -- `tracing` subscriber setup
//! - [`runner`] -- Async fixed-interval runner
//! - [`simulation`] -- Parallel multi-creature stepping ([`Simulation`])
//! - [`tick`] -- The per-creature tick flow

pub mod clock;
pub mod config;
pub mod context;
pub mod creature;
pub mod error;
pub mod logging;
pub mod runner;
pub mod simulation;
pub mod tick;

pub use clock::{ClockError, FixedStepClock};
pub use config::{ConfigError, LoggingConfig, SimulationConfig, SimulationSection};
pub use context::SimulationContext;
pub use creature::{Creature, CreatureSnapshot};
pub use error::{LoggingError, TickError};
pub use logging::init_logging;
pub use runner::{NoOpCallback, RunEndReason, RunResult, RunnerError, TickCallback, run_simulation};
pub use simulation::{Simulation, SimulationSnapshot, TickSummary};
pub use tick::{ADAPTATION_TAG, CreatureTickSummary, TickCounts, step_creature};
