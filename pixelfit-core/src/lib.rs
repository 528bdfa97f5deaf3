//! # PixelFit Core Library
//!
//! Everything the PixelFit backend knows about its single virtual pet and the
//! fitness data that feeds it:
//!
//! - **Decay** — piecewise-exponential happiness decay. Every 5-point
//!   segment below 100 speeds decay up by another factor of 1.1.
//! - **Report** — duration formatting and decay tables for diagnostics.
//! - **Pet** — the credit economy (feed, play, workouts, weigh-ins).
//! - **Reconcile** — read the pet, advance it to "now", write it back.
//! - **Persistence** — SQLite store for settings, weight, challenge and
//!   activity logs.
//!
//! The decay engine is pure: it takes state by value and returns a new value,
//! so it can be called from any thread without coordination. Serialising the
//! read-advance-write cycle is the caller's job.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod decay;
pub mod error;
pub mod persistence;
pub mod pet;
pub mod reconcile;
pub mod report;
pub mod types;

pub use config::PixelfitConfig;
pub use decay::HappinessState;
pub use error::PixelfitError;
pub use persistence::Store;
pub use types::*;
