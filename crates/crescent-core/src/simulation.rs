//! Multi-creature stepping.
//!
//! Creatures are independent: each is borrowed exclusively by one rayon
//! worker per tick, while the context is shared read-only. Every creature
//! gets its own random source derived from the run seed and its insertion
//! index, so results do not depend on worker scheduling.

use chrono::{DateTime, Utc};
use crescent_types::{CreatureId, CreatureState};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{ClockError, FixedStepClock};
use crate::context::SimulationContext;
use crate::creature::{Creature, CreatureSnapshot};
use crate::error::TickError;
use crate::tick::{self, CreatureTickSummary, TickCounts};

/// Result of one simulation tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickSummary {
    /// Tick number that just ran, starting at 1.
    pub tick: u64,
    /// Per-creature summaries, in creature order. Extinct creatures are
    /// skipped.
    pub creatures: Vec<CreatureTickSummary>,
    /// Creatures not extinct after the tick.
    pub alive: usize,
    /// Creatures whose extinction was signalled this tick.
    pub extinctions: usize,
    /// Summed counters.
    pub counts: TickCounts,
}

/// Serializable copy of a whole simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    /// Ticks run so far.
    pub tick: u64,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
    /// Every creature, in insertion order.
    pub creatures: Vec<CreatureSnapshot>,
}

/// A population of creatures stepped against one context.
#[derive(Debug)]
pub struct Simulation {
    context: SimulationContext,
    creatures: Vec<Creature>,
    tick: u64,
    clock: FixedStepClock,
}

impl Simulation {
    /// An empty population over `context`.
    pub fn new(context: SimulationContext) -> Result<Self, ClockError> {
        let clock = FixedStepClock::new(context.config().simulation.tick_delta)?;
        Ok(Self {
            context,
            creatures: Vec::new(),
            tick: 0,
            clock,
        })
    }

    /// The shared context.
    pub const fn context(&self) -> &SimulationContext {
        &self.context
    }

    /// Add a creature, returning its id.
    pub fn add_creature(&mut self, state: CreatureState) -> CreatureId {
        let index = u64::try_from(self.creatures.len()).unwrap_or(u64::MAX);
        let seed = self.context.config().simulation.seed.wrapping_add(index);
        let creature = Creature::new(state, self.context.config().changes.clone(), seed);
        let id = creature.id();
        debug!(creature = %id, seed, "Creature added");
        self.creatures.push(creature);
        id
    }

    /// Every creature, in insertion order.
    pub fn creatures(&self) -> &[Creature] {
        &self.creatures
    }

    /// One creature by id.
    pub fn creature(&self, id: CreatureId) -> Option<&Creature> {
        self.creatures.iter().find(|creature| creature.id() == id)
    }

    /// One creature by id, for host-driven changes or catalysts.
    pub fn creature_mut(&mut self, id: CreatureId) -> Option<&mut Creature> {
        self.creatures.iter_mut().find(|creature| creature.id() == id)
    }

    /// Ticks run so far.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Creatures not extinct.
    pub fn alive(&self) -> usize {
        self.creatures.iter().filter(|c| !c.is_extinct()).count()
    }

    /// Run one tick of `delta_time` for every living creature in
    /// `environment`, in parallel.
    pub fn step(&mut self, environment: &str, delta_time: f32) -> Result<TickSummary, TickError> {
        let context = &self.context;
        let creatures: Vec<CreatureTickSummary> = self
            .creatures
            .par_iter_mut()
            .filter(|creature| !creature.is_extinct())
            .map(|creature| tick::step_creature(context, creature, environment, delta_time))
            .collect::<Result<_, _>>()?;

        self.tick = self.tick.saturating_add(1);
        let extinctions = creatures.iter().filter(|c| c.extinction).count();
        let counts = creatures
            .iter()
            .map(CreatureTickSummary::counts)
            .fold(TickCounts::default(), |total, c| TickCounts {
                applied: total.applied.saturating_add(c.applied),
                rejected: total.rejected.saturating_add(c.rejected),
                crossings: total.crossings.saturating_add(c.crossings),
                transitions: total.transitions.saturating_add(c.transitions),
            });
        let summary = TickSummary {
            tick: self.tick,
            creatures,
            alive: self.alive(),
            extinctions,
            counts,
        };
        debug!(
            tick = summary.tick,
            alive = summary.alive,
            applied = counts.applied,
            rejected = counts.rejected,
            "Tick complete"
        );
        if extinctions > 0 {
            info!(tick = summary.tick, extinctions, "Extinction signalled");
        }
        Ok(summary)
    }

    /// Feed real elapsed time and run every fixed step now due, each of the
    /// configured tick delta.
    pub fn advance(&mut self, environment: &str, elapsed: f32) -> Result<Vec<TickSummary>, TickError> {
        let due = self.clock.advance(elapsed);
        let delta_time = self.clock.step();
        (0..due).map(|_| self.step(environment, delta_time)).collect()
    }

    /// A serializable copy of every creature.
    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            tick: self.tick,
            taken_at: Utc::now(),
            creatures: self.creatures.iter().map(Creature::snapshot).collect(),
        }
    }
}
