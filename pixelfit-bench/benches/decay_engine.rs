//! PixelFit Benchmark Suite
//!
//! Targets:
//!   decay_advance_full_drain ......... < 10μs
//!   decay_total_time_to_zero ......... < 10μs
//!   reconcile_stored_pet ............. < 100μs
//!   store_snapshot_500_rows .......... < 2ms

use std::num::NonZeroU32;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pixelfit_core::config::PersistenceConfig;
use pixelfit_core::decay::{self, HappinessState};
use pixelfit_core::types::{NewActivityLog, NewWeightLog, PetState};
use pixelfit_core::{reconcile, report, Store};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Benchmark: Advance from 100 over a week, i.e. every point (target: < 10μs).
fn bench_advance(c: &mut Criterion) {
    let state = HappinessState::new(100, t0()).unwrap();
    let week = 7.0 * 86_400.0;

    c.bench_function("decay_advance_full_drain", |b| {
        b.iter(|| {
            let next = decay::advance(black_box(state), black_box(week)).unwrap();
            black_box(next);
        });
    });
}

/// Benchmark: Sum every interval from 100 down (target: < 10μs).
fn bench_total_time(c: &mut Criterion) {
    c.bench_function("decay_total_time_to_zero", |b| {
        b.iter(|| black_box(decay::total_time_to_zero(black_box(100)).unwrap()));
    });

    c.bench_function("decay_table_block_10", |b| {
        let block = NonZeroU32::new(10).unwrap();
        b.iter(|| black_box(report::decay_table(black_box(block)).unwrap()));
    });
}

/// Benchmark: One reconcile transaction on an anchored pet (target: < 100μs).
fn bench_reconcile(c: &mut Criterion) {
    let store = Store::open_in_memory(&PersistenceConfig::default()).unwrap();
    store.seed_defaults().unwrap();
    store
        .put_pet(&PetState {
            happiness: 100,
            last_update: Some(t0()),
            ..PetState::default()
        })
        .unwrap();

    let mut now = t0();
    c.bench_function("reconcile_stored_pet", |b| {
        b.iter(|| {
            now += TimeDelta::seconds(1);
            black_box(reconcile::reconcile(&store, black_box(now)).unwrap());
        });
    });
}

/// Benchmark: Full start-up snapshot over 500 log rows (target: < 2ms).
fn bench_snapshot(c: &mut Criterion) {
    let store = Store::open_in_memory(&PersistenceConfig::default()).unwrap();
    store.seed_defaults().unwrap();
    for i in 0..250_i64 {
        store
            .add_weight(&NewWeightLog {
                date: Some(format!("2024-01-{:02}", i % 28 + 1)),
                weight: Some(80.0 - i as f64 * 0.01),
                timestamp: Some(i),
            })
            .unwrap();
        store
            .add_activity(&NewActivityLog {
                date: Some(format!("2024-01-{:02}", i % 28 + 1)),
                kind: Some("workout".to_string()),
                val: Some(10.0),
                task_id: Some(1),
                timestamp: Some(i),
            })
            .unwrap();
    }

    c.bench_function("store_snapshot_500_rows", |b| {
        b.iter(|| black_box(store.snapshot().unwrap()));
    });
}

criterion_group!(
    benches,
    bench_advance,
    bench_total_time,
    bench_reconcile,
    bench_snapshot,
);
criterion_main!(benches);
