//! Accumulated-time stepping.
//!
//! A host that measures real elapsed time feeds it to a [`FixedStepClock`],
//! which answers how many fixed simulation steps are due. Leftover time
//! carries over to the next call, so the simulation advances at a steady
//! rate regardless of how unevenly the host calls it.

/// Default ceiling on steps released by one call.
pub const DEFAULT_MAX_STEPS_PER_ADVANCE: u32 = 8;

/// Errors that can occur when building a clock.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClockError {
    /// The step is zero, negative or not finite.
    #[error("invalid step {step}: must be positive and finite")]
    InvalidStep {
        /// The rejected step.
        step: f32,
    },
}

/// Fixed-timestep accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedStepClock {
    step: f32,
    accumulator: f32,
    max_steps_per_advance: u32,
    total_steps: u64,
}

impl FixedStepClock {
    /// A clock releasing one step per `step` of elapsed time.
    pub fn new(step: f32) -> Result<Self, ClockError> {
        if !(step.is_finite() && step > 0.0) {
            return Err(ClockError::InvalidStep { step });
        }
        Ok(Self {
            step,
            accumulator: 0.0,
            max_steps_per_advance: DEFAULT_MAX_STEPS_PER_ADVANCE,
            total_steps: 0,
        })
    }

    /// Cap the steps one call may release. Time beyond the cap is dropped
    /// so a stalled host does not trigger a burst of catch-up steps.
    #[must_use]
    pub const fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps_per_advance = max_steps;
        self
    }

    /// Add `elapsed` time and return the number of steps now due.
    ///
    /// Negative or non-finite input counts as no time.
    pub fn advance(&mut self, elapsed: f32) -> u32 {
        if elapsed.is_finite() && elapsed > 0.0 {
            self.accumulator += elapsed;
        }
        let mut due = 0_u32;
        while self.accumulator >= self.step && due < self.max_steps_per_advance {
            self.accumulator -= self.step;
            due = due.saturating_add(1);
        }
        if due == self.max_steps_per_advance && self.accumulator >= self.step {
            self.accumulator %= self.step;
        }
        self.total_steps = self.total_steps.saturating_add(u64::from(due));
        due
    }

    /// Simulation time per step.
    pub const fn step(&self) -> f32 {
        self.step
    }

    /// Fraction of the next step already accumulated, in `[0, 1)`.
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.step
    }

    /// Steps released since creation.
    pub const fn total_steps(&self) -> u64 {
        self.total_steps
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn leftover_time_carries_over() {
        let mut clock = FixedStepClock::new(1.0).unwrap();
        assert_eq!(clock.advance(0.6), 0);
        assert_eq!(clock.advance(0.6), 1);
        assert!((clock.alpha() - 0.2).abs() < 1e-5);
        assert_eq!(clock.advance(2.0), 2);
        assert_eq!(clock.total_steps(), 3);
    }

    #[test]
    fn burst_is_capped_and_excess_dropped() {
        let mut clock = FixedStepClock::new(1.0).unwrap().with_max_steps(3);
        assert_eq!(clock.advance(10.5), 3);
        assert!(clock.alpha() < 1.0);
        assert_eq!(clock.advance(0.0), 0);
    }

    #[test]
    fn bad_input_is_ignored_or_refused() {
        assert!(FixedStepClock::new(0.0).is_err());
        assert!(FixedStepClock::new(f32::NAN).is_err());
        let mut clock = FixedStepClock::new(0.5).unwrap();
        assert_eq!(clock.advance(-3.0), 0);
        assert_eq!(clock.advance(f32::INFINITY), 0);
    }
}
