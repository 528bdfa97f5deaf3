//! Tracing subscriber set-up.

use pixelfit_core::config::GeneralConfig;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `general.log_level`. A `log_format` of
/// `"json"` switches to one JSON object per line.
///
/// # Errors
/// Fails if the level string is not a valid filter or a subscriber is
/// already installed.
pub fn init(general: &GeneralConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&general.log_level)?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if general.log_format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!(e))
}
