//! Happiness Decay — Piecewise-Exponential Model
//!
//! The pet loses one happiness point at a time. The time it takes to lose
//! the next point depends on which 5-point segment the pet is currently in:
//!
//!   segment(h)          = floor((100 - h) / 5)          ∈ [0, 20]
//!   rate_multiplier(s)  = 1.1^s
//!   time_to_decrement(h) = 900s / rate_multiplier(segment(h))
//!
//! At full happiness a point lasts 15 minutes; at happiness 1 it lasts about
//! 147 seconds. The segment is always evaluated on the value *before* the
//! decrement, so 100→99 costs 900s and 96→95 still costs 900s, while 95→94 is
//! the first step at rate 1.1.
//!
//! Decay is stepwise. [`advance`] only ever removes whole points; time that
//! does not cover a full point is not turned into happiness. It is, however,
//! kept on the clock: the returned state's `last_update` only moves forward
//! by the time the whole points actually consumed, so a caller that measures
//! elapsed time from `last_update` never loses partial progress between
//! calls.
//!
//! Out-of-domain inputs are rejected with [`PixelfitError`], never clamped.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PixelfitError, Result};

/// Seconds needed to lose one point at segment 0.
pub const BASE_SECONDS_PER_POINT: f64 = 900.0;
/// Upper bound of the happiness domain.
pub const MAX_HAPPINESS: i32 = 100;
/// Lower bound of the happiness domain; terminal.
pub const MIN_HAPPINESS: i32 = 0;
/// Width of one rate segment, in happiness points.
pub const SEGMENT_WIDTH: i32 = 5;
/// Geometric speed-up applied per segment.
pub const RATE_GROWTH: f64 = 1.1;

/// The only piece of state the engine operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HappinessState {
    /// Current happiness in `[0, 100]`.
    pub happiness: i32,
    /// Instant at which `happiness` was last authoritative.
    pub last_update: DateTime<Utc>,
}

impl HappinessState {
    /// Build a state, validating the happiness domain.
    ///
    /// # Errors
    /// Returns [`PixelfitError::InvalidHappinessRange`] for values outside `[0, 100]`.
    pub fn new(happiness: i32, last_update: DateTime<Utc>) -> Result<Self> {
        check_range(happiness, MIN_HAPPINESS)?;
        Ok(Self {
            happiness,
            last_update,
        })
    }
}

/// Outcome of consuming elapsed time against a happiness value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Advance {
    /// Happiness after all whole decrements.
    pub happiness: i32,
    /// Seconds spent by those whole decrements. Never more than the input.
    pub consumed_seconds: f64,
    /// Seconds of the input that did not cover a further point.
    pub leftover_seconds: f64,
}

impl Advance {
    /// Whether decay hit the terminal floor.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.happiness == MIN_HAPPINESS
    }
}

fn check_range(happiness: i32, min: i32) -> Result<()> {
    if (min..=MAX_HAPPINESS).contains(&happiness) {
        Ok(())
    } else {
        Err(PixelfitError::InvalidHappinessRange {
            value: i64::from(happiness),
            min: i64::from(min),
            max: i64::from(MAX_HAPPINESS),
        })
    }
}

fn check_elapsed(elapsed_seconds: f64) -> Result<()> {
    // NaN fails the comparison as well.
    if elapsed_seconds >= 0.0 {
        Ok(())
    } else {
        Err(PixelfitError::InvalidDuration(elapsed_seconds))
    }
}

/// Rate segment for a happiness value: `floor((100 - h) / 5)`.
///
/// # Errors
/// Returns [`PixelfitError::InvalidHappinessRange`] outside `[0, 100]`.
pub fn segment(happiness: i32) -> Result<u32> {
    check_range(happiness, MIN_HAPPINESS)?;
    // Both operands are non-negative, so integer division is floor.
    Ok((MAX_HAPPINESS - happiness).unsigned_abs() / SEGMENT_WIDTH.unsigned_abs())
}

/// Speed-up factor `1.1^segment`.
#[must_use]
pub fn rate_multiplier(segment: u32) -> f64 {
    RATE_GROWTH.powf(f64::from(segment))
}

/// Seconds needed to go from `happiness` to `happiness - 1`.
///
/// Non-increasing as happiness falls: `time_to_decrement(h - 1) <= time_to_decrement(h)`.
///
/// # Errors
/// Returns [`PixelfitError::InvalidHappinessRange`] outside `[1, 100]`;
/// there is nothing to decrement at 0.
pub fn time_to_decrement(happiness: i32) -> Result<f64> {
    check_range(happiness, MIN_HAPPINESS + 1)?;
    Ok(BASE_SECONDS_PER_POINT / rate_multiplier(segment(happiness)?))
}

/// Consume `elapsed_seconds` one whole point at a time.
///
/// This is the plain per-point loop; at most 100 iterations, so no
/// per-segment shortcut is taken and results match the definition exactly.
/// The running total is built in the same order as [`time_between`], so
/// `advance_points(from, time_between(from, to)?)` lands exactly on `to`.
///
/// # Errors
/// [`PixelfitError::InvalidHappinessRange`] for happiness outside `[0, 100]`,
/// [`PixelfitError::InvalidDuration`] for negative or NaN elapsed time.
pub fn advance_points(happiness: i32, elapsed_seconds: f64) -> Result<Advance> {
    check_range(happiness, MIN_HAPPINESS)?;
    check_elapsed(elapsed_seconds)?;

    let mut current = happiness;
    let mut consumed = 0.0;

    while current > MIN_HAPPINESS {
        let reached = consumed + time_to_decrement(current)?;
        if reached > elapsed_seconds {
            break;
        }
        consumed = reached;
        current -= 1;
    }

    Ok(Advance {
        happiness: current,
        consumed_seconds: consumed,
        leftover_seconds: elapsed_seconds - consumed,
    })
}

/// Advance a state by `elapsed_seconds` of real time.
///
/// Happiness drops by whole points only. `last_update` moves forward by the
/// time those points consumed, so leftover time stays measurable from the
/// new anchor. Once the floor is reached the anchor moves by the full
/// elapsed time instead, since nothing further can decay.
///
/// `advance(s, 0.0) == s` for every valid `s`.
///
/// # Errors
/// Same as [`advance_points`].
pub fn advance(state: HappinessState, elapsed_seconds: f64) -> Result<HappinessState> {
    let outcome = advance_points(state.happiness, elapsed_seconds)?;
    let carried = if outcome.is_exhausted() {
        elapsed_seconds
    } else {
        outcome.consumed_seconds
    };

    Ok(HappinessState {
        happiness: outcome.happiness,
        last_update: shift_anchor(state.last_update, carried),
    })
}

/// Seconds needed to decay from `from` down to `to`.
///
/// # Errors
/// Returns [`PixelfitError::InvalidHappinessRange`] if either bound is
/// outside `[0, 100]` or `to > from`.
pub fn time_between(from: i32, to: i32) -> Result<f64> {
    check_range(from, MIN_HAPPINESS)?;
    if !(MIN_HAPPINESS..=from).contains(&to) {
        return Err(PixelfitError::InvalidHappinessRange {
            value: i64::from(to),
            min: i64::from(MIN_HAPPINESS),
            max: i64::from(from),
        });
    }

    let mut total = 0.0;
    for h in (to + 1..=from).rev() {
        total += time_to_decrement(h)?;
    }
    Ok(total)
}

/// Total seconds for `start` to decay all the way to 0.
///
/// # Errors
/// Returns [`PixelfitError::InvalidHappinessRange`] outside `[0, 100]`.
pub fn total_time_to_zero(start: i32) -> Result<f64> {
    time_between(start, MIN_HAPPINESS)
}

/// Move an instant forward by fractional seconds, rounded to the nearest
/// millisecond, saturating at the end of representable time.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn shift_anchor(anchor: DateTime<Utc>, seconds: f64) -> DateTime<Utc> {
    // `as` saturates for out-of-range floats.
    let millis = (seconds * 1000.0).round() as i64;
    TimeDelta::try_milliseconds(millis)
        .and_then(|delta| anchor.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn segment_boundaries() {
        assert_eq!(segment(100).expect("100"), 0);
        assert_eq!(segment(96).expect("96"), 0);
        assert_eq!(segment(95).expect("95"), 1);
        assert_eq!(segment(2).expect("2"), 19);
        assert_eq!(segment(1).expect("1"), 19);
        assert_eq!(segment(0).expect("0"), 20);
    }

    #[test]
    fn full_happiness_takes_base_interval() {
        assert!((time_to_decrement(100).expect("100") - 900.0).abs() < f64::EPSILON);
    }

    #[test]
    fn lowest_point_decays_fastest() {
        let t = time_to_decrement(1).expect("1");
        assert!((t - 900.0 / 1.1_f64.powi(19)).abs() < 1e-9);
        assert!(t > 147.0 && t < 148.0, "got {t}");
    }

    #[test]
    fn zero_has_nothing_to_decrement() {
        assert!(matches!(
            time_to_decrement(0),
            Err(PixelfitError::InvalidHappinessRange { value: 0, min: 1, .. })
        ));
    }

    #[test]
    fn out_of_range_is_rejected_everywhere() {
        assert!(segment(101).is_err());
        assert!(segment(-1).is_err());
        assert!(time_to_decrement(101).is_err());
        assert!(advance_points(101, 10.0).is_err());
        assert!(advance_points(-3, 10.0).is_err());
        assert!(total_time_to_zero(150).is_err());
        assert!(HappinessState::new(-1, t0()).is_err());
    }

    #[test]
    fn negative_and_nan_durations_are_rejected() {
        assert!(matches!(
            advance_points(50, -1.0),
            Err(PixelfitError::InvalidDuration(_))
        ));
        assert!(matches!(
            advance_points(50, f64::NAN),
            Err(PixelfitError::InvalidDuration(_))
        ));
    }

    #[test]
    fn zero_elapsed_is_identity() {
        let state = HappinessState::new(100, t0()).expect("state");
        assert_eq!(advance(state, 0.0).expect("advance"), state);
    }

    #[test]
    fn exactly_one_interval_loses_one_point() {
        let state = HappinessState::new(100, t0()).expect("state");
        let next = advance(state, 900.0).expect("advance");
        assert_eq!(next.happiness, 99);
        assert_eq!(next.last_update, t0() + TimeDelta::seconds(900));
    }

    #[test]
    fn just_short_of_an_interval_loses_nothing() {
        let state = HappinessState::new(100, t0()).expect("state");
        let next = advance(state, 899.999).expect("advance");
        assert_eq!(next, state);
    }

    #[test]
    fn huge_elapsed_saturates_at_zero() {
        let state = HappinessState::new(5, t0()).expect("state");
        assert_eq!(advance(state, 1.0e12).expect("advance").happiness, 0);
        assert_eq!(advance(state, f64::INFINITY).expect("advance").happiness, 0);
    }

    #[test]
    fn floor_is_terminal() {
        let outcome = advance_points(0, 10_000.0).expect("advance");
        assert_eq!(outcome.happiness, 0);
        assert!(outcome.consumed_seconds.abs() < f64::EPSILON);
        assert!(outcome.is_exhausted());
    }

    #[test]
    fn exhausted_state_moves_anchor_by_full_elapsed() {
        let state = HappinessState::new(1, t0()).expect("state");
        let next = advance(state, 1000.0).expect("advance");
        assert_eq!(next.happiness, 0);
        assert_eq!(next.last_update, t0() + TimeDelta::seconds(1000));
    }

    #[test]
    fn leftover_is_kept_on_the_clock() {
        let state = HappinessState::new(100, t0()).expect("state");
        let next = advance(state, 1000.0).expect("advance");
        assert_eq!(next.happiness, 99);
        // Only the consumed 900s move the anchor; 100s stay measurable.
        assert_eq!(next.last_update, t0() + TimeDelta::seconds(900));
    }

    #[test]
    fn rate_is_taken_before_decrementing() {
        // 96→95 is still in segment 0, 95→94 is the first step at 1.1.
        let from_96 = time_between(96, 94).expect("time");
        assert!((from_96 - (900.0 + 900.0 / 1.1)).abs() < 1e-9);
    }

    #[test]
    fn two_to_zero_uses_segment_nineteen_twice() {
        let total = total_time_to_zero(2).expect("total");
        let expected = time_to_decrement(2).expect("2") + time_to_decrement(1).expect("1");
        assert!((total - expected).abs() < f64::EPSILON);
        assert!((total - 2.0 * 900.0 / 1.1_f64.powi(19)).abs() < 1e-9);
    }

    #[test]
    fn full_decay_matches_segment_sum() {
        let expected: f64 = (0..20).map(|s| 5.0 * 900.0 / 1.1_f64.powi(s)).sum();
        let total = total_time_to_zero(100).expect("total");
        assert!((total - expected).abs() < 1e-6, "{total} vs {expected}");
        assert!(total_time_to_zero(0).expect("zero").abs() < f64::EPSILON);
    }

    #[test]
    fn exact_totals_land_on_their_target() {
        for from in 1..=MAX_HAPPINESS {
            for to in MIN_HAPPINESS..from {
                let elapsed = time_between(from, to).expect("time");
                let outcome = advance_points(from, elapsed).expect("advance");
                assert_eq!(outcome.happiness, to, "{from} -> {to}");
                assert!(outcome.leftover_seconds.abs() < f64::EPSILON);
            }
        }
        assert_eq!(
            advance_points(7, total_time_to_zero(7).expect("total"))
                .expect("advance")
                .happiness,
            0
        );
    }

    #[test]
    fn time_between_rejects_upward_ranges() {
        assert!(time_between(10, 20).is_err());
        assert!(time_between(10, 10).expect("same").abs() < f64::EPSILON);
    }
}
