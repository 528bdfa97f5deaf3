//! Core type definitions for PixelFit.
//!
//! Field names follow the JSON the front-end already speaks, so every type
//! here serialises to exactly what `/api/all` returns.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Setting keys
// ---------------------------------------------------------------------------

/// Settings key holding the credit balance.
pub const CREDITS_KEY: &str = "credits";
/// Settings key holding the [`PetState`].
pub const PET_KEY: &str = "pet";
/// Settings key holding the [`LastActivity`] banner.
pub const LAST_ACTIVITY_KEY: &str = "last_activity";

// ---------------------------------------------------------------------------
// Pet
// ---------------------------------------------------------------------------

/// The virtual pet, stored as JSON under [`PET_KEY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetState {
    /// Level, starting at 1.
    #[serde(default = "default_level")]
    pub level: u32,
    /// Happiness in `[0, 100]`.
    #[serde(default = "default_happiness")]
    pub happiness: i32,
    /// Experience toward the next level.
    #[serde(default)]
    pub xp: f64,
    /// Decay anchor. `None` until the first reconciliation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    /// Start of the current run of decay. Reconciliation measures from here,
    /// not from `last_update`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay_origin: Option<DecayOrigin>,
}

/// Happiness and instant at which an unbroken run of decay started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecayOrigin {
    /// Happiness when the run started.
    pub happiness: i32,
    /// When the run started.
    pub at: DateTime<Utc>,
}

impl Default for PetState {
    fn default() -> Self {
        Self {
            level: default_level(),
            happiness: default_happiness(),
            xp: 0.0,
            last_update: None,
            decay_origin: None,
        }
    }
}

impl PetState {
    /// Start a new run of decay from the current happiness at `now`.
    ///
    /// Progress toward the next point under the old run is dropped.
    pub fn restart_decay(&mut self, now: DateTime<Utc>) {
        self.last_update = Some(now);
        self.decay_origin = Some(DecayOrigin {
            happiness: self.happiness,
            at: now,
        });
    }
}

/// How the pet looks, derived from happiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetMood {
    /// Happiness below 30: the pet turns grey.
    Sad,
    /// The normal colouring.
    Content,
    /// Happiness above 80.
    Joyful,
}

impl PetMood {
    /// Mood for a happiness value.
    #[must_use]
    pub fn from_happiness(happiness: i32) -> Self {
        if happiness < 30 {
            Self::Sad
        } else if happiness > 80 {
            Self::Joyful
        } else {
            Self::Content
        }
    }
}

/// "Recent activity" banner, stored under [`LAST_ACTIVITY_KEY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastActivity {
    /// What happened.
    pub title: String,
    /// Display time (`HH:MM`).
    pub time: String,
}

impl Default for LastActivity {
    fn default() -> Self {
        Self {
            title: "No activity yet".to_string(),
            time: "--".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

/// A stored weigh-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightLog {
    /// Row id.
    pub id: i64,
    /// ISO-8601 date or datetime.
    pub date: Option<String>,
    /// Weight in kilograms.
    pub weight: Option<f64>,
    /// Client timestamp (epoch milliseconds).
    pub timestamp: Option<i64>,
}

/// A weigh-in as submitted by the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewWeightLog {
    /// ISO-8601 date or datetime.
    #[serde(default)]
    pub date: Option<String>,
    /// Weight in kilograms.
    #[serde(default)]
    pub weight: Option<f64>,
    /// Client timestamp (epoch milliseconds).
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// A user-defined challenge (e.g. "Pushups, goal 50").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Row id, normally chosen by the client.
    pub id: i64,
    /// Display name.
    pub name: Option<String>,
    /// Daily goal in reps.
    pub goal: Option<i64>,
}

/// A challenge as submitted by the client. Without an id, SQLite assigns one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChallenge {
    /// Client-chosen id.
    #[serde(default)]
    pub id: Option<i64>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Daily goal in reps.
    #[serde(default)]
    pub goal: Option<i64>,
}

/// A stored activity entry (workout progress against a challenge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLog {
    /// Row id.
    pub id: i64,
    /// `YYYY-MM-DD` day key.
    pub date: Option<String>,
    /// Activity kind, e.g. `"workout"`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Amount (reps).
    pub val: Option<f64>,
    /// Challenge this entry counts toward.
    pub task_id: Option<i64>,
    /// Client timestamp (epoch milliseconds).
    pub timestamp: Option<i64>,
}

/// An activity entry as submitted by the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewActivityLog {
    /// `YYYY-MM-DD` day key.
    #[serde(default)]
    pub date: Option<String>,
    /// Activity kind.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Amount (reps).
    #[serde(default)]
    pub val: Option<f64>,
    /// Challenge this entry counts toward.
    #[serde(default)]
    pub task_id: Option<i64>,
    /// Client timestamp (epoch milliseconds).
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Everything the client needs on start-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// All settings, decoded from their stored JSON.
    pub settings: BTreeMap<String, serde_json::Value>,
    /// Weigh-ins ordered by date.
    pub weight_logs: Vec<WeightLog>,
    /// Challenges.
    pub challenges: Vec<Challenge>,
    /// Activity entries.
    pub activity_logs: Vec<ActivityLog>,
}

fn default_level() -> u32 { 1 }
fn default_happiness() -> i32 { 50 }
