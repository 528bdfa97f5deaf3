//! Integration Tests — End-to-End Pet Flows
//!
//! Complete scenarios across the engine, the economy and an on-disk store:
//! first run, earning and spending credits, days of decay, restart.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use pixelfit_core::config::{PersistenceConfig, PetConfig};
use pixelfit_core::decay::{self, HappinessState};
use pixelfit_core::persistence::Store;
use pixelfit_core::pet::{self, CareAction, WeighIn};
use pixelfit_core::reconcile;
use pixelfit_core::types::{NewActivityLog, NewChallenge, NewWeightLog, PetMood};
use pixelfit_core::PixelfitError;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 10, 7, 0, 0)
        .single()
        .expect("valid timestamp")
}

// ---------------------------------------------------------------------------
// Engine scenarios
// ---------------------------------------------------------------------------

#[test]
fn one_interval_from_full_happiness() {
    let state = HappinessState::new(100, t0()).expect("state");
    let elapsed = decay::time_to_decrement(100).expect("ttd");
    assert_eq!(decay::advance(state, elapsed).expect("advance").happiness, 99);
}

#[test]
fn boundary_split_composes_exactly() {
    // 1800s lands exactly on the 98 boundary, so nothing is discarded
    // between the two calls.
    let first = decay::advance_points(100, 1800.0).expect("first");
    assert_eq!(first.happiness, 98);
    assert!(first.leftover_seconds.abs() < f64::EPSILON);

    let second = decay::advance_points(first.happiness, 1000.0).expect("second");
    let once = decay::advance_points(100, 2800.0).expect("once");
    assert_eq!(second.happiness, once.happiness);
}

#[test]
fn mid_interval_split_discards_the_fraction() {
    // 600s + 600s: neither call covers 900s on its own.
    let first = decay::advance_points(100, 600.0).expect("first");
    let second = decay::advance_points(first.happiness, 600.0).expect("second");
    let once = decay::advance_points(100, 1200.0).expect("once");

    assert_eq!(second.happiness, 100);
    assert_eq!(once.happiness, 99);
}

#[test]
fn anchored_advance_keeps_the_fraction() {
    // The same 600s + 600s, but measured from the returned anchor.
    let start = HappinessState::new(100, t0()).expect("state");
    let after_first = decay::advance(start, 600.0).expect("first");
    let now = t0() + TimeDelta::seconds(1200);
    let elapsed = reconcile::elapsed_seconds(after_first.last_update, now);
    let after_second = decay::advance(after_first, elapsed).expect("second");

    assert_eq!(after_second.happiness, 99);
}

// ---------------------------------------------------------------------------
// Full lifecycle on disk
// ---------------------------------------------------------------------------

#[test]
fn pet_lifecycle_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("pixel_fit.db");
    let persist = PersistenceConfig::default();
    let economy = PetConfig::default();

    {
        let store = Store::open(&db_path, &persist).expect("open");
        assert!(store.seed_defaults().expect("seed"));

        // First poll anchors the default pet at 50.
        let first = reconcile::reconcile(&store, t0()).expect("anchor");
        assert_eq!(first.points_lost, 0);
        assert_eq!(first.pet.happiness, 50);

        // Earn: weigh in and train.
        pet::record_weigh_in(
            &store,
            &NewWeightLog {
                date: Some("2024-02-10T07:00:00Z".to_string()),
                weight: Some(82.4),
                timestamp: Some(t0().timestamp_millis()),
            },
            WeighIn::Today,
            t0().date_naive(),
            &economy,
        )
        .expect("weigh in");
        store
            .add_challenge(&NewChallenge {
                id: Some(1),
                name: Some("Pushups".to_string()),
                goal: Some(50),
            })
            .expect("challenge");
        let workout = pet::record_workout(
            &store,
            &NewActivityLog {
                date: Some("2024-02-10".to_string()),
                kind: Some("workout".to_string()),
                val: Some(40.0),
                task_id: Some(1),
                timestamp: Some(t0().timestamp_millis()),
            },
            &economy,
        )
        .expect("workout");
        assert_eq!(workout.credits, 140);

        // Spend: feed an hour later.
        let fed = pet::perform_care(
            &store,
            CareAction::Feed,
            t0() + TimeDelta::hours(1),
            &economy,
        )
        .expect("feed");
        assert_eq!(fed.credits, 90);
        assert!(fed.pet.happiness > 50);
    }

    // Restart and leave the pet alone for a day.
    let store = Store::open(&db_path, &persist).expect("reopen");
    assert!(!store.seed_defaults().expect("seed again"));
    assert_eq!(store.credits().expect("credits"), 90);

    let later = reconcile::reconcile(&store, t0() + TimeDelta::days(1)).expect("reconcile");
    assert_eq!(later.pet.happiness, 0);
    assert_eq!(later.mood, PetMood::Sad);
    assert!(later.seconds_to_next_point.is_none());

    let snapshot = store.snapshot().expect("snapshot");
    assert_eq!(snapshot.weight_logs.len(), 1);
    assert_eq!(snapshot.challenges.len(), 1);
    assert_eq!(snapshot.activity_logs.len(), 1);
    assert_eq!(snapshot.settings["last_activity"]["title"], "Fed Pixel");
}

#[test]
fn play_after_floor_restarts_decay_from_now() {
    let store = Store::open_in_memory(&PersistenceConfig::default()).expect("open");
    store.put_credits(20).expect("credits");
    store
        .put_pet(&pixelfit_core::PetState {
            happiness: 0,
            last_update: Some(t0()),
            ..Default::default()
        })
        .expect("pet");

    let now = t0() + TimeDelta::days(3);
    let played =
        pet::perform_care(&store, CareAction::Play, now, &PetConfig::default()).expect("play");
    assert_eq!(played.pet.happiness, 10);
    assert_eq!(played.pet.last_update, Some(now));

    // No credits left for a second round.
    let err = pet::perform_care(&store, CareAction::Play, now, &PetConfig::default())
        .expect_err("broke");
    assert!(matches!(err, PixelfitError::InsufficientCredits { .. }));
}
