//! Fixed-interval async runner.
//!
//! [`run_simulation`] drives [`Simulation::step`] once per configured
//! interval on a `tokio` timer until the tick limit is reached or every
//! creature is extinct. A tick itself never awaits; only the wait between
//! ticks does.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::config::SimulationSection;
use crate::error::TickError;
use crate::simulation::{Simulation, TickSummary};

/// Errors that can occur during a run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEndReason {
    /// The configured tick limit was reached.
    MaxTicksReached,
    /// No living creature remains.
    AllExtinct,
}

/// Result of a run.
#[derive(Debug)]
pub struct RunResult {
    /// Why the run ended.
    pub end_reason: RunEndReason,
    /// Ticks executed by this run.
    pub total_ticks: u64,
    /// Summary of the last tick, if any ran.
    pub final_summary: Option<TickSummary>,
}

/// Callback invoked after each tick.
pub trait TickCallback: Send {
    /// Called after a tick completes.
    fn on_tick(&mut self, summary: &TickSummary, simulation: &Simulation);
}

/// A callback that does nothing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _simulation: &Simulation) {}
}

/// Step `simulation` in `environment` at the configured interval.
///
/// Without a tick limit the run only ends when every creature is extinct.
pub async fn run_simulation(
    simulation: &mut Simulation,
    environment: &str,
    settings: &SimulationSection,
    callback: &mut dyn TickCallback,
) -> Result<RunResult, RunnerError> {
    let mut interval = tokio::time::interval(Duration::from_millis(settings.tick_interval_ms.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut total_ticks: u64 = 0;
    let mut last_summary: Option<TickSummary> = None;

    info!(
        environment,
        creatures = simulation.creatures().len(),
        max_ticks = settings.max_ticks,
        tick_interval_ms = settings.tick_interval_ms,
        "Simulation starting"
    );

    loop {
        if simulation.alive() == 0 {
            return Ok(finish(RunEndReason::AllExtinct, total_ticks, last_summary));
        }
        if settings.max_ticks.is_some_and(|max| total_ticks >= max) {
            return Ok(finish(RunEndReason::MaxTicksReached, total_ticks, last_summary));
        }

        interval.tick().await;
        let summary = simulation.step(environment, settings.tick_delta)?;
        total_ticks = total_ticks.saturating_add(1);
        callback.on_tick(&summary, simulation);
        last_summary = Some(summary);
    }
}

fn finish(end_reason: RunEndReason, total_ticks: u64, final_summary: Option<TickSummary>) -> RunResult {
    if final_summary.is_none() {
        warn!("Simulation ended with no ticks executed");
    }
    info!(reason = ?end_reason, total_ticks, "Simulation ended");
    RunResult {
        end_reason,
        total_ticks,
        final_summary,
    }
}
