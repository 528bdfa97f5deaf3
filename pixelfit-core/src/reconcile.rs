//! Reconciliation — bring the stored pet up to date with the wall clock.
//!
//! The client polls; each poll reads the pet, advances its happiness to
//! `now`, and writes it back. Every poll measures from the pet's
//! [`DecayOrigin`], the start of the current run of decay, rather than from
//! the previous poll. Happiness at any instant is therefore one
//! [`decay::advance_points`] call from the origin: polling every second
//! decays exactly as fast as polling once a day.
//!
//! A run starts on the first reconciliation and again whenever happiness is
//! set directly (a care boost, or a client write the stored origin no longer
//! explains).

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::decay;
use crate::error::{PixelfitError, Result};
use crate::persistence::Store;
use crate::types::{DecayOrigin, PetMood, PetState};

/// Anchors are stored to the millisecond; this covers their rounding when
/// checking an anchor against its origin.
const ANCHOR_SLACK_SECONDS: f64 = 0.001;

/// Result of one reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciled {
    /// The pet as stored after reconciling.
    pub pet: PetState,
    /// Happiness points lost in this call.
    pub points_lost: i32,
    /// Mood after decay.
    pub mood: PetMood,
    /// Seconds until the next point is lost; `None` at the floor.
    pub seconds_to_next_point: Option<f64>,
}

impl Reconciled {
    fn new(pet: PetState, points_lost: i32, now: DateTime<Utc>) -> Result<Self> {
        let seconds_to_next_point = match pet.last_update {
            Some(anchor) if pet.happiness > decay::MIN_HAPPINESS => {
                let step = decay::time_to_decrement(pet.happiness)?;
                Some((step - elapsed_seconds(anchor, now)).max(0.0))
            }
            _ => None,
        };
        Ok(Self {
            mood: PetMood::from_happiness(pet.happiness),
            pet,
            points_lost,
            seconds_to_next_point,
        })
    }
}

/// Seconds from `from` to `to`, at millisecond precision. Negative if `to`
/// is earlier.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

/// The run of decay a pet is in.
///
/// A stored origin is trusted while it still explains the stored happiness
/// at the stored anchor. Otherwise a new run starts at the anchor, or at
/// `now` for a pet that was never reconciled.
fn decay_origin(pet: &PetState, now: DateTime<Utc>) -> DecayOrigin {
    let anchor = pet.last_update.unwrap_or(now);
    pet.decay_origin
        .filter(|origin| {
            let elapsed = elapsed_seconds(origin.at, anchor);
            elapsed >= 0.0
                && decay::advance_points(origin.happiness, elapsed + ANCHOR_SLACK_SECONDS)
                    .is_ok_and(|run| run.happiness == pet.happiness)
        })
        .unwrap_or(DecayOrigin {
            happiness: pet.happiness,
            at: anchor,
        })
}

/// Advance a pet to `now` without touching storage.
///
/// A pet that has never been reconciled is anchored at `now` and loses
/// nothing. Returns the updated pet and the number of points lost.
///
/// # Errors
/// [`PixelfitError::InvalidHappinessRange`] if the stored happiness is
/// outside `[0, 100]`; [`PixelfitError::InvalidDuration`] if `now` is
/// before the pet's anchor.
pub fn reconcile_pet(mut pet: PetState, now: DateTime<Utc>) -> Result<(PetState, i32)> {
    if let Some(anchor) = pet.last_update {
        let since_anchor = elapsed_seconds(anchor, now);
        if since_anchor < 0.0 {
            return Err(PixelfitError::InvalidDuration(since_anchor));
        }
    }

    let origin = decay_origin(&pet, now);
    let elapsed = elapsed_seconds(origin.at, now);
    let run = decay::advance_points(origin.happiness, elapsed)?;
    let lost = pet.happiness - run.happiness;

    // Within the millisecond of the anchor the run can read one point
    // higher than what is stored; happiness never goes back up here.
    if lost > 0 || pet.last_update.is_none() || run.is_exhausted() {
        let carried = if run.is_exhausted() {
            elapsed
        } else {
            run.consumed_seconds
        };
        pet.happiness = run.happiness;
        pet.last_update = Some(decay::shift_anchor(origin.at, carried));
    }
    pet.decay_origin = Some(origin);
    Ok((pet, lost.max(0)))
}

/// Read, advance and write back the stored pet, atomically.
///
/// # Errors
/// See [`reconcile_pet`]; storage failures surface as
/// [`PixelfitError::Database`] or [`PixelfitError::Serialization`].
pub fn reconcile(store: &Store, now: DateTime<Utc>) -> Result<Reconciled> {
    store.apply(|s| reconcile_in(s, now))
}

/// [`reconcile`] for callers that already hold a transaction.
pub(crate) fn reconcile_in(store: &Store, now: DateTime<Utc>) -> Result<Reconciled> {
    let (pet, points_lost) = reconcile_pet(store.pet()?, now)?;
    store.put_pet(&pet)?;

    debug!(
        happiness = pet.happiness,
        points_lost,
        anchor = ?pet.last_update,
        "Reconciled pet"
    );

    Reconciled::new(pet, points_lost, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersistenceConfig;
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn pet(happiness: i32, anchor: Option<DateTime<Utc>>) -> PetState {
        PetState {
            happiness,
            last_update: anchor,
            ..PetState::default()
        }
    }

    #[test]
    fn first_reconcile_only_anchors() {
        let (next, lost) = reconcile_pet(pet(50, None), t0()).expect("reconcile");
        assert_eq!(lost, 0);
        assert_eq!(next.happiness, 50);
        assert_eq!(next.last_update, Some(t0()));
    }

    #[test]
    fn frequent_polls_decay_as_fast_as_one_long_gap() {
        // Poll every 60s for 2 hours.
        let mut polled = pet(100, Some(t0()));
        for minute in 1..=120 {
            let now = t0() + TimeDelta::minutes(minute);
            polled = reconcile_pet(polled, now).expect("poll").0;
        }

        let (once, _) =
            reconcile_pet(pet(100, Some(t0())), t0() + TimeDelta::hours(2)).expect("once");

        assert_eq!(polled.happiness, once.happiness);
        assert_eq!(once.happiness, 92);
    }

    #[test]
    fn per_second_polls_match_one_call_at_every_instant() {
        let start = pet(100, Some(t0()));
        let mut polled = start.clone();
        for second in 1..=43_000 {
            let now = t0() + TimeDelta::seconds(second);
            polled = reconcile_pet(polled, now).expect("poll").0;
            let (once, _) = reconcile_pet(start.clone(), now).expect("once");
            assert_eq!(polled.happiness, once.happiness, "diverged at +{second}s");
        }
        assert_eq!(polled.happiness, 0);
    }

    #[test]
    fn origin_survives_polls_and_explains_the_anchor() {
        let (first, _) = reconcile_pet(pet(100, None), t0()).expect("anchor");
        let origin = first.decay_origin.expect("origin");
        assert_eq!(origin.happiness, 100);
        assert_eq!(origin.at, t0());

        let (later, lost) =
            reconcile_pet(first, t0() + TimeDelta::seconds(2000)).expect("later");
        assert_eq!(lost, 2);
        assert_eq!(later.decay_origin, Some(origin));
        assert_eq!(later.last_update, Some(t0() + TimeDelta::seconds(1800)));
    }

    #[test]
    fn direct_write_starts_a_new_run() {
        // The client overwrote happiness; the old origin no longer explains it.
        let (mut stored, _) =
            reconcile_pet(pet(100, Some(t0())), t0() + TimeDelta::seconds(1000)).expect("poll");
        stored.happiness = 40;

        let (next, lost) = reconcile_pet(stored, t0() + TimeDelta::seconds(1000)).expect("poll");
        assert_eq!(lost, 0);
        assert_eq!(next.happiness, 40);
        let origin = next.decay_origin.expect("origin");
        assert_eq!(origin.happiness, 40);
        assert_eq!(origin.at, t0() + TimeDelta::seconds(900));
    }

    #[test]
    fn clock_going_backwards_is_rejected() {
        let err = reconcile_pet(pet(80, Some(t0())), t0() - TimeDelta::seconds(5))
            .expect_err("negative elapsed");
        assert!(matches!(err, PixelfitError::InvalidDuration(_)));
    }

    #[test]
    fn corrupt_happiness_is_rejected_not_clamped() {
        let err = reconcile_pet(pet(140, Some(t0())), t0()).expect_err("out of range");
        assert!(matches!(err, PixelfitError::InvalidHappinessRange { value: 140, .. }));
    }

    #[test]
    fn stored_reconcile_persists_and_reports() {
        let store = Store::open_in_memory(&PersistenceConfig::default()).expect("open");
        store.put_pet(&pet(100, Some(t0()))).expect("put");

        let now = t0() + TimeDelta::seconds(1000);
        let outcome = reconcile(&store, now).expect("reconcile");
        assert_eq!(outcome.points_lost, 1);
        assert_eq!(outcome.mood, PetMood::Joyful);
        // 100s of the next 900s interval have already passed.
        let next = outcome.seconds_to_next_point.expect("not at floor");
        assert!((next - 800.0).abs() < 1e-6, "got {next}");

        let stored = store.pet().expect("pet");
        assert_eq!(stored.happiness, 99);
        assert_eq!(stored.last_update, Some(t0() + TimeDelta::seconds(900)));
    }

    #[test]
    fn floor_reports_no_next_point() {
        let store = Store::open_in_memory(&PersistenceConfig::default()).expect("open");
        store.put_pet(&pet(1, Some(t0()))).expect("put");

        let outcome = reconcile(&store, t0() + TimeDelta::hours(1)).expect("reconcile");
        assert_eq!(outcome.pet.happiness, 0);
        assert_eq!(outcome.mood, PetMood::Sad);
        assert!(outcome.seconds_to_next_point.is_none());
        assert_eq!(outcome.pet.last_update, Some(t0() + TimeDelta::hours(1)));
    }
}
