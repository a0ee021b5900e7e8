//! Logging system setup.

use crate::config::LoggingSettings;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes tracing with the configured level and format.
///
/// `RUST_LOG` takes precedence over `config.level` when set. `json_format`
/// forces JSON output regardless of the file setting.
pub fn setup_logging(config: &LoggingSettings, json_format: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if json_format || config.json_format {
        registry
            .with(fmt::layer().json().with_file(false).with_line_number(false).with_thread_ids(true))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_ansi(true).with_file(false).with_line_number(false).with_thread_ids(true))
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

/// Logs the startup banner.
pub fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║        🔁 MEMBER REMOTING DEMO 🔁        ║");
    info!("║                 v{:<24}║", version);
    info!("║                                          ║");
    info!("║  Host and client object graphs kept in   ║");
    info!("║  step one member at a time               ║");
    info!("╚══════════════════════════════════════════╝");
}
