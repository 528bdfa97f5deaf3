//! Pet economy — credits in, happiness out.
//!
//! Credits are earned by weighing in and by logging workouts, and spent on
//! the pet:
//!
//! | Action  | Cost | Happiness |
//! |---------|------|-----------|
//! | Feed    | 50   | +20       |
//! | Play    | 20   | +10       |
//!
//! Workouts also give xp (`amount / 10`); 100 xp is a level. All amounts come
//! from [`PetConfig`].
//!
//! Every operation that touches happiness reconciles the pet to `now` first,
//! so a boost is never applied to a stale value. A boost then starts a new
//! run of decay at `now`.
//!
//! A workout pays only for a positive amount logged against a challenge. A
//! back-filled weigh-in pays only for a day [`missing_weigh_ins`] lists.

use std::collections::BTreeSet;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::PetConfig;
use crate::decay::MAX_HAPPINESS;
use crate::error::{PixelfitError, Result};
use crate::persistence::Store;
use crate::reconcile::{self, Reconciled};
use crate::types::{LastActivity, NewActivityLog, NewWeightLog, PetState, WeightLog};

/// Something the user can spend credits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareAction {
    /// Feed the pet.
    Feed,
    /// Play with the pet.
    Play,
}

impl CareAction {
    /// Credits this action costs.
    #[must_use]
    pub fn cost(self, config: &PetConfig) -> i64 {
        match self {
            Self::Feed => config.feed_cost,
            Self::Play => config.play_cost,
        }
    }

    /// Happiness this action adds (before capping at 100).
    #[must_use]
    pub fn happiness_gain(self, config: &PetConfig) -> i32 {
        match self {
            Self::Feed => config.feed_happiness,
            Self::Play => config.play_happiness,
        }
    }

    /// Text for the "recent activity" banner.
    #[must_use]
    pub fn activity_title(self) -> &'static str {
        match self {
            Self::Feed => "Fed Pixel",
            Self::Play => "Played with Pixel",
        }
    }
}

/// Whether a weigh-in is for today or back-fills a missed day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeighIn {
    /// Today's weigh-in.
    Today,
    /// A missed day filled in later; pays less.
    Backfill,
}

impl WeighIn {
    /// Credits paid for this weigh-in.
    #[must_use]
    pub fn reward(self, config: &PetConfig) -> i64 {
        match self {
            Self::Today => config.weigh_in_reward,
            Self::Backfill => config.missed_weigh_in_reward,
        }
    }
}

/// Spend credits on the pet. Returns the new credit balance.
///
/// Leaves `pet` untouched when the balance is too low.
///
/// # Errors
/// [`PixelfitError::InsufficientCredits`] if `credits` is below the cost.
pub fn care(
    pet: &mut PetState,
    credits: i64,
    action: CareAction,
    config: &PetConfig,
) -> Result<i64> {
    let cost = action.cost(config);
    if credits < cost {
        return Err(PixelfitError::InsufficientCredits {
            required: cost,
            available: credits,
        });
    }
    pet.happiness = pet
        .happiness
        .saturating_add(action.happiness_gain(config))
        .min(MAX_HAPPINESS);
    Ok(credits - cost)
}

/// Check that a workout entry can earn credits and xp. Returns the amount.
///
/// # Errors
/// [`PixelfitError::InvalidEntry`] without a challenge id or for an amount
/// that is missing, zero, negative or not finite.
pub fn workout_amount(log: &NewActivityLog) -> Result<f64> {
    if log.task_id.is_none() {
        return Err(PixelfitError::InvalidEntry(
            "workout is not logged against a challenge".to_string(),
        ));
    }
    match log.val {
        Some(amount) if amount.is_finite() && amount > 0.0 => Ok(amount),
        other => Err(PixelfitError::InvalidEntry(format!(
            "workout amount must be positive, got {other:?}"
        ))),
    }
}

/// Add workout xp. Returns `true` if the pet levelled up.
pub fn gain_xp(pet: &mut PetState, amount: f64, config: &PetConfig) -> bool {
    pet.xp += amount / config.xp_divisor;
    if pet.xp >= config.xp_per_level {
        pet.level += 1;
        pet.xp = 0.0;
        true
    } else {
        false
    }
}

/// What the pet says on the home screen.
#[must_use]
pub fn message(pet: &PetState, weighed_in_today: bool) -> &'static str {
    if !weighed_in_today {
        "Did you weigh in today?"
    } else if pet.happiness < 40 {
        "I'm sad... play with me?"
    } else {
        "I'm feeling great!"
    }
}

/// Whether any weigh-in's date starts with `day` (`YYYY-MM-DD`).
#[must_use]
pub fn weighed_in_on(logs: &[WeightLog], day: NaiveDate) -> bool {
    let key = day.format("%Y-%m-%d").to_string();
    logs.iter()
        .filter_map(|log| log.date.as_deref())
        .any(|date| date.starts_with(&key))
}

/// Day a weigh-in was logged for, from the `YYYY-MM-DD` prefix of its date.
fn log_day(date: Option<&str>) -> Option<NaiveDate> {
    let prefix = date?.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// Days without a weigh-in, from the day after the first weigh-in up to
/// (not including) `today`, oldest first.
///
/// Empty when nothing has been logged yet.
#[must_use]
pub fn missing_weigh_ins(logs: &[WeightLog], today: NaiveDate) -> Vec<NaiveDate> {
    let logged: BTreeSet<NaiveDate> = logs
        .iter()
        .filter_map(|log| log_day(log.date.as_deref()))
        .collect();
    let Some(first) = logged.first().copied() else {
        return Vec::new();
    };
    first
        .iter_days()
        .skip(1)
        .take_while(|day| *day < today)
        .filter(|day| !logged.contains(day))
        .collect()
}

fn banner(title: &str, now: DateTime<Utc>) -> LastActivity {
    LastActivity {
        title: title.to_string(),
        time: now.with_timezone(&Local).format("%H:%M").to_string(),
    }
}

// ---------------------------------------------------------------------------
// Stored operations
// ---------------------------------------------------------------------------

/// Outcome of a stored care action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CareOutcome {
    /// The pet after decay and the boost.
    pub pet: PetState,
    /// Credits left.
    pub credits: i64,
    /// Points lost to decay just before the boost.
    pub points_lost: i32,
}

/// Reconcile, then feed or play with the stored pet, atomically.
///
/// # Errors
/// [`PixelfitError::InsufficientCredits`] rolls the whole transaction back,
/// including the reconciliation. Other errors as in [`reconcile::reconcile`].
pub fn perform_care(
    store: &Store,
    action: CareAction,
    now: DateTime<Utc>,
    config: &PetConfig,
) -> Result<CareOutcome> {
    store.apply(|s| {
        let Reconciled {
            mut pet,
            points_lost,
            ..
        } = reconcile::reconcile_in(s, now)?;
        let credits = care(&mut pet, s.credits()?, action, config)?;
        pet.restart_decay(now);

        s.put_pet(&pet)?;
        s.put_credits(credits)?;
        s.put_last_activity(&banner(action.activity_title(), now))?;

        info!(?action, happiness = pet.happiness, credits, "Pet cared for");
        Ok(CareOutcome {
            pet,
            credits,
            points_lost,
        })
    })
}

/// Outcome of a stored workout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutOutcome {
    /// Id of the new activity row.
    pub activity_id: i64,
    /// Credits after the reward.
    pub credits: i64,
    /// The pet after xp.
    pub pet: PetState,
    /// Whether the pet gained a level.
    pub levelled_up: bool,
}

/// Log workout progress: store the activity, pay `val` credits, grant xp.
///
/// # Errors
/// [`PixelfitError::InvalidEntry`] as in [`workout_amount`], before anything
/// is stored; otherwise storage failures.
#[allow(clippy::cast_possible_truncation)]
pub fn record_workout(
    store: &Store,
    log: &NewActivityLog,
    config: &PetConfig,
) -> Result<WorkoutOutcome> {
    let amount = workout_amount(log)?;
    store.apply(|s| {
        let activity_id = s.add_activity(log)?;
        let credits = s.credits()?.saturating_add(amount as i64);
        s.put_credits(credits)?;

        let mut pet = s.pet()?;
        let levelled_up = gain_xp(&mut pet, amount, config);
        s.put_pet(&pet)?;

        if levelled_up {
            info!(level = pet.level, "Level up");
        }
        Ok(WorkoutOutcome {
            activity_id,
            credits,
            pet,
            levelled_up,
        })
    })
}

/// Store a weigh-in and pay its reward. Returns `(row id, credits)`.
///
/// # Errors
/// [`PixelfitError::InvalidEntry`] for a back-fill whose date is not one of
/// the [`missing_weigh_ins`] as of `today`; otherwise storage failures.
pub fn record_weigh_in(
    store: &Store,
    log: &NewWeightLog,
    kind: WeighIn,
    today: NaiveDate,
    config: &PetConfig,
) -> Result<(i64, i64)> {
    store.apply(|s| {
        if kind == WeighIn::Backfill {
            let day = log_day(log.date.as_deref());
            let missing = missing_weigh_ins(&s.weight_logs()?, today);
            if !day.is_some_and(|day| missing.contains(&day)) {
                return Err(PixelfitError::InvalidEntry(format!(
                    "no missed weigh-in to fill on {}",
                    log.date.as_deref().unwrap_or("an unknown day")
                )));
            }
        }
        let id = s.add_weight(log)?;
        let credits = s.credits()?.saturating_add(kind.reward(config));
        s.put_credits(credits)?;
        Ok((id, credits))
    })
}
