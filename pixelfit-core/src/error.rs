//! Error types for the PixelFit core library.

use thiserror::Error;

/// Top-level error type for all PixelFit operations.
#[derive(Error, Debug)]
pub enum PixelfitError {
    /// A happiness value fell outside the domain accepted by the operation.
    #[error("Happiness {value} out of range (expected {min}..={max})")]
    InvalidHappinessRange {
        /// The rejected value.
        value: i64,
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },

    /// Elapsed time was negative or not a number.
    #[error("Invalid elapsed duration: {0}s")]
    InvalidDuration(f64),

    /// A workout or weigh-in that cannot earn a reward.
    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    /// The pet action costs more credits than are available.
    #[error("Not enough credits: need {required}, have {available}")]
    InsufficientCredits {
        /// Cost of the action.
        required: i64,
        /// Credits currently held.
        available: i64,
    },

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for PixelfitError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl PixelfitError {
    /// Whether this error was caused by bad caller input rather than by
    /// storage or the environment.
    #[must_use]
    pub fn is_domain_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidHappinessRange { .. }
                | Self::InvalidDuration(_)
                | Self::InvalidEntry(_)
        )
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, PixelfitError>;
