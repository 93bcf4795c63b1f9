//! Helpers for quantities that live in the closed unit interval.
//!
//! Levels, intensities, strengths and progress values are all clamped to
//! `[0, 1]`. Values within [`UNIT_EPSILON`] of a bound snap to the bound so
//! that repeated small increments (twenty steps of `0.05`) land on exactly
//! `1.0` instead of drifting just short of it.

/// Distance from a bound within which a value snaps onto the bound.
pub const UNIT_EPSILON: f32 = 1e-5;

/// Clamp a value into `[0, 1]`, snapping near-bound values and mapping
/// non-finite input to `0`.
pub fn clamp_unit(value: f32) -> f32 {
    if !value.is_finite() {
        return 0.0;
    }
    if value >= 1.0 - UNIT_EPSILON {
        1.0
    } else if value <= UNIT_EPSILON {
        0.0
    } else {
        value
    }
}

/// Whether a value is finite and inside `[0, 1]`.
pub fn is_unit(value: f32) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range() {
        assert!((clamp_unit(1.7) - 1.0).abs() < f32::EPSILON);
        assert!(clamp_unit(-0.3).abs() < f32::EPSILON);
        assert!(clamp_unit(f32::NAN).abs() < f32::EPSILON);
    }

    #[test]
    fn repeated_increments_reach_one() {
        let mut level = 0.0_f32;
        for _ in 0..20 {
            level = clamp_unit(level + 0.05);
        }
        assert!((level - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn unit_check() {
        assert!(is_unit(0.0));
        assert!(is_unit(1.0));
        assert!(!is_unit(1.01));
        assert!(!is_unit(f32::INFINITY));
    }
}
