//! Configuration for PixelFit.
//!
//! Maps directly to `pixelfit.toml`. Every section and field is optional;
//! an empty file yields the defaults below.

use serde::{Deserialize, Serialize};

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PixelfitConfig {
    /// Logging.
    #[serde(default)]
    pub general: GeneralConfig,
    /// HTTP server.
    #[serde(default)]
    pub server: ServerConfig,
    /// SQLite store.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Pet economy tuning.
    #[serde(default)]
    pub pet: PetConfig,
}

impl PixelfitConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `PixelfitError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::PixelfitError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error. `RUST_LOG` wins if set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log format: "pretty" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served for every non-API path.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    /// Allow any origin (useful when the front-end is served elsewhere).
    #[serde(default)]
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            static_dir: default_static_dir(),
            cors_permissive: false,
        }
    }
}

/// SQLite settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Use WAL journaling.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// How long SQLite waits on a locked database.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            wal_mode: true,
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

/// Pet economy constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetConfig {
    /// Credits spent on feeding.
    #[serde(default = "default_50")]
    pub feed_cost: i64,
    /// Happiness gained from feeding.
    #[serde(default = "default_20")]
    pub feed_happiness: i32,
    /// Credits spent on playing.
    #[serde(default = "default_20_i64")]
    pub play_cost: i64,
    /// Happiness gained from playing.
    #[serde(default = "default_10")]
    pub play_happiness: i32,
    /// Credits for weighing in today.
    #[serde(default = "default_100")]
    pub weigh_in_reward: i64,
    /// Credits for back-filling a missed day.
    #[serde(default = "default_50")]
    pub missed_weigh_in_reward: i64,
    /// Workout amount divided by this becomes xp.
    #[serde(default = "default_10_f64")]
    pub xp_divisor: f64,
    /// Xp needed for the next level.
    #[serde(default = "default_100_f64")]
    pub xp_per_level: f64,
}

impl Default for PetConfig {
    fn default() -> Self {
        Self {
            feed_cost: 50,
            feed_happiness: 20,
            play_cost: 20,
            play_happiness: 10,
            weigh_in_reward: 100,
            missed_weigh_in_reward: 50,
            xp_divisor: 10.0,
            xp_per_level: 100.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }
fn default_bind() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_static_dir() -> String { ".".to_string() }
fn default_db_path() -> String { "pixel_fit.db".to_string() }
fn default_busy_timeout() -> u32 { 5000 }
fn default_10() -> i32 { 10 }
fn default_20() -> i32 { 20 }
fn default_20_i64() -> i64 { 20 }
fn default_50() -> i64 { 50 }
fn default_100() -> i64 { 100 }
fn default_10_f64() -> f64 { 10.0 }
fn default_100_f64() -> f64 { 100.0 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = PixelfitConfig::from_toml("").expect("parse");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.persistence.db_path, "pixel_fit.db");
        assert_eq!(config.pet.feed_cost, 50);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = PixelfitConfig::from_toml(
            r#"
            [server]
            port = 9001

            [pet]
            play_cost = 5
            "#,
        )
        .expect("parse");
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.pet.play_cost, 5);
        assert_eq!(config.pet.play_happiness, 10);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = PixelfitConfig::from_toml("[server\nport = ").expect_err("invalid");
        assert!(matches!(err, crate::PixelfitError::Config(_)));
    }
}
