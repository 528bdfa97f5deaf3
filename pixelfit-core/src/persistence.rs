//! SQLite persistence layer for PixelFit.
//!
//! Four tables, one file:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS settings      (key TEXT PRIMARY KEY, value TEXT);
//! CREATE TABLE IF NOT EXISTS weight_logs   (id INTEGER PRIMARY KEY AUTOINCREMENT,
//!                                           date TEXT, weight REAL, timestamp INTEGER);
//! CREATE TABLE IF NOT EXISTS challenges    (id INTEGER PRIMARY KEY, name TEXT, goal INTEGER);
//! CREATE TABLE IF NOT EXISTS activity_logs (id INTEGER PRIMARY KEY AUTOINCREMENT,
//!                                           date TEXT, type TEXT, val REAL,
//!                                           task_id INTEGER, timestamp INTEGER);
//! ```
//!
//! Settings are a key-value table whose values are JSON text, so the pet,
//! the credit balance and anything else the client invents (`boss_states`)
//! share one schema.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rusqlite::{params, Connection, OpenFlags, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::error::{PixelfitError, Result};
use crate::types::{
    ActivityLog, Challenge, LastActivity, NewActivityLog, NewChallenge, NewWeightLog, PetState,
    Snapshot, WeightLog, CREDITS_KEY, LAST_ACTIVITY_KEY, PET_KEY,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS settings (
        key   TEXT PRIMARY KEY,
        value TEXT
    );
    CREATE TABLE IF NOT EXISTS weight_logs (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        date      TEXT,
        weight    REAL,
        timestamp INTEGER
    );
    CREATE TABLE IF NOT EXISTS challenges (
        id   INTEGER PRIMARY KEY,
        name TEXT,
        goal INTEGER
    );
    CREATE TABLE IF NOT EXISTS activity_logs (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        date      TEXT,
        type      TEXT,
        val       REAL,
        task_id   INTEGER,
        timestamp INTEGER
    );";

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Handle to the open PixelFit database.
///
/// # Usage
///
/// ```no_run
/// # use pixelfit_core::persistence::Store;
/// # use pixelfit_core::config::PersistenceConfig;
/// let store = Store::open("pixel_fit.db", &PersistenceConfig::default())?;
/// store.seed_defaults()?;
/// store.put_credits(120)?;
/// assert_eq!(store.credits()?, 120);
/// # Ok::<(), pixelfit_core::error::PixelfitError>(())
/// ```
pub struct Store {
    conn: Connection,
    config: PersistenceConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Open (or create) the database at `path` and make sure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`PixelfitError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.busy_timeout(std::time::Duration::from_millis(u64::from(
            config.busy_timeout_ms,
        )))?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "PixelFit store opened"
        );

        Ok(Self {
            conn,
            config: config.clone(),
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`PixelfitError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn,
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Insert the default settings on first run.
    ///
    /// Does nothing once a `credits` row exists, so restarting never resets
    /// the pet. All defaults are written in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`PixelfitError::Database`] on SQLite failures.
    pub fn seed_defaults(&self) -> Result<bool> {
        let defaults = [
            (CREDITS_KEY, serde_json::to_string(&0_i64)?),
            (PET_KEY, serde_json::to_string(&PetState::default())?),
            (
                LAST_ACTIVITY_KEY,
                serde_json::to_string(&LastActivity::default())?,
            ),
        ];

        self.apply(|s| {
            if s.raw_setting(CREDITS_KEY)?.is_some() {
                return Ok(false);
            }

            info!("Initializing default settings");
            for (key, value) in &defaults {
                s.conn.execute(
                    "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
                    params![key, value],
                )?;
            }
            Ok(true)
        })
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    fn raw_setting(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT value FROM settings WHERE key = ?1")?;
        let value: Option<Option<String>> = stmt
            .query_row(params![key], |row| row.get(0))
            .optional()?;
        Ok(value.flatten())
    }

    /// Read a setting and decode it into `T`.
    ///
    /// Returns `None` if the key has never been written.
    ///
    /// # Errors
    ///
    /// Returns [`PixelfitError::Serialization`] if the stored JSON does not
    /// decode as `T`, or [`PixelfitError::Database`] on SQLite failures.
    pub fn get_setting<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.raw_setting(key)?
            .map(|raw| serde_json::from_str(&raw).map_err(PixelfitError::from))
            .transpose()
    }

    /// Upsert a setting, stored as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PixelfitError::Serialization`] if encoding fails, or
    /// [`PixelfitError::Database`] on SQLite failures.
    pub fn put_setting<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, json],
        )?;
        debug!(key, bytes = json.len(), "Saved setting");
        Ok(())
    }

    /// All settings, decoded. Rows whose value is not valid JSON are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`PixelfitError::Database`] on SQLite failures.
    pub fn settings(&self) -> Result<std::collections::BTreeMap<String, serde_json::Value>> {
        let mut stmt = self.conn.prepare_cached("SELECT key, value FROM settings")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?;

        let mut settings = std::collections::BTreeMap::new();
        for row in rows {
            let (key, raw) = row?;
            let value = match raw {
                None => serde_json::Value::Null,
                Some(raw) => match serde_json::from_str(&raw) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(key = %key, error = %e, "Skipping setting with invalid JSON");
                        continue;
                    }
                },
            };
            settings.insert(key, value);
        }
        Ok(settings)
    }

    /// The pet, or the default pet if none is stored yet.
    ///
    /// # Errors
    ///
    /// See [`Store::get_setting`].
    pub fn pet(&self) -> Result<PetState> {
        Ok(self.get_setting(PET_KEY)?.unwrap_or_default())
    }

    /// Persist the pet.
    ///
    /// # Errors
    ///
    /// See [`Store::put_setting`].
    pub fn put_pet(&self, pet: &PetState) -> Result<()> {
        self.put_setting(PET_KEY, pet)
    }

    /// Current credit balance (0 when unset).
    ///
    /// The client may have stored a float; it is truncated.
    ///
    /// # Errors
    ///
    /// See [`Store::get_setting`].
    #[allow(clippy::cast_possible_truncation)]
    pub fn credits(&self) -> Result<i64> {
        let value: Option<serde_json::Value> = self.get_setting(CREDITS_KEY)?;
        Ok(value
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .unwrap_or(0))
    }

    /// Overwrite the credit balance.
    ///
    /// # Errors
    ///
    /// See [`Store::put_setting`].
    pub fn put_credits(&self, credits: i64) -> Result<()> {
        self.put_setting(CREDITS_KEY, &credits)
    }

    /// Update the "recent activity" banner.
    ///
    /// # Errors
    ///
    /// See [`Store::put_setting`].
    pub fn put_last_activity(&self, activity: &LastActivity) -> Result<()> {
        self.put_setting(LAST_ACTIVITY_KEY, activity)
    }

    // ------------------------------------------------------------------
    // Logs
    // ------------------------------------------------------------------

    /// Append a weigh-in and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`PixelfitError::Database`] on SQLite failures.
    pub fn add_weight(&self, log: &NewWeightLog) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO weight_logs (date, weight, timestamp) VALUES (?1, ?2, ?3)",
            params![log.date, log.weight, log.timestamp],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// All weigh-ins, ordered by date.
    ///
    /// # Errors
    ///
    /// Returns [`PixelfitError::Database`] on SQLite failures.
    pub fn weight_logs(&self) -> Result<Vec<WeightLog>> {
        self.collect(
            "SELECT id, date, weight, timestamp FROM weight_logs ORDER BY date",
            |row| {
                Ok(WeightLog {
                    id: row.get(0)?,
                    date: row.get(1)?,
                    weight: row.get(2)?,
                    timestamp: row.get(3)?,
                })
            },
        )
    }

    /// Insert a challenge and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`PixelfitError::Database`] on SQLite failures, including a
    /// primary-key conflict when the client reuses an id.
    pub fn add_challenge(&self, challenge: &NewChallenge) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO challenges (id, name, goal) VALUES (?1, ?2, ?3)",
            params![challenge.id, challenge.name, challenge.goal],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Delete a challenge. Returns `true` if a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`PixelfitError::Database`] on SQLite failures.
    pub fn delete_challenge(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM challenges WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// All challenges.
    ///
    /// # Errors
    ///
    /// Returns [`PixelfitError::Database`] on SQLite failures.
    pub fn challenges(&self) -> Result<Vec<Challenge>> {
        self.collect("SELECT id, name, goal FROM challenges", |row| {
            Ok(Challenge {
                id: row.get(0)?,
                name: row.get(1)?,
                goal: row.get(2)?,
            })
        })
    }

    /// Append an activity entry and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`PixelfitError::Database`] on SQLite failures.
    pub fn add_activity(&self, log: &NewActivityLog) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO activity_logs (date, type, val, task_id, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![log.date, log.kind, log.val, log.task_id, log.timestamp],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// All activity entries.
    ///
    /// # Errors
    ///
    /// Returns [`PixelfitError::Database`] on SQLite failures.
    pub fn activity_logs(&self) -> Result<Vec<ActivityLog>> {
        self.collect(
            "SELECT id, date, type, val, task_id, timestamp FROM activity_logs",
            |row| {
                Ok(ActivityLog {
                    id: row.get(0)?,
                    date: row.get(1)?,
                    kind: row.get(2)?,
                    val: row.get(3)?,
                    task_id: row.get(4)?,
                    timestamp: row.get(5)?,
                })
            },
        )
    }

    /// Everything at once, for the client's start-up fetch.
    ///
    /// # Errors
    ///
    /// Returns [`PixelfitError::Database`] on SQLite failures.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let start = Instant::now();
        let snapshot = Snapshot {
            settings: self.settings()?,
            weight_logs: self.weight_logs()?,
            challenges: self.challenges()?,
            activity_logs: self.activity_logs()?,
        };
        debug!(
            settings = snapshot.settings.len(),
            weights = snapshot.weight_logs.len(),
            challenges = snapshot.challenges.len(),
            activities = snapshot.activity_logs.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Built snapshot"
        );
        Ok(snapshot)
    }

    fn collect<T, F>(&self, sql: &str, map: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map([], map)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(PixelfitError::from)
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Run `f` inside a transaction: committed if it returns `Ok`, rolled
    /// back otherwise. Calls must not nest.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or [`PixelfitError::Database`] if the
    /// transaction cannot be opened or committed.
    pub fn apply<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Store) -> Result<T>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        let outcome = f(self).and_then(|value| {
            self.conn.execute_batch("COMMIT;")?;
            Ok(value)
        });
        if outcome.is_err() && !self.conn.is_autocommit() {
            if let Err(e) = self.conn.execute_batch("ROLLBACK;") {
                warn!(error = %e, "Rollback failed");
            }
        }
        outcome
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Copy the database to `dest_path` using SQLite's online-backup API.
    ///
    /// # Errors
    ///
    /// Returns [`PixelfitError::Database`] on SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&self.conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;

        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Database backup completed"
        );
        Ok(())
    }

    /// Run `PRAGMA integrity_check`; `Ok(true)` means the file is sound.
    ///
    /// # Errors
    ///
    /// Returns [`PixelfitError::Database`] if the check itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }

    /// Path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Adds `.optional()` to `rusqlite::Result`, turning
/// `QueryReturnedNoRows` into `Ok(None)`.
trait OptionalExt<T> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
