//! # Member Remoting Demo
//!
//! A host process for the remoting engine: loads configuration, sets up
//! logging, wires a host link and a client link over an in-memory transport
//! and drives a scripted session between them.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration (written to remoting_demo.toml if missing)
//! remoting_demo
//!
//! # Custom configuration, more exchanges, verbose logs
//! remoting_demo --config demo.toml --iterations 20 --log-level debug
//!
//! # JSON logging
//! remoting_demo --json-logs
//! ```
//!
//! Ctrl+C (or SIGTERM) ends the session early; both links are still shut down
//! cleanly.

use tracing::error;

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Parses arguments, sets up logging and runs the demo to completion.
///
/// Called from `main` inside the Tokio runtime.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Load configuration to get logging settings
    let mut logging_settings = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default()
        .logging;
    if let Some(level) = &args.log_level {
        logging_settings.level = level.clone();
    }

    if let Err(e) = logging::setup_logging(&logging_settings, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

pub use app::{run_session, SessionReport};
pub use config::{DemoSettings, LoggingSettings};

#[cfg(test)]
mod tests {
    use super::*;
    use member_remoting::{create_link_pair, RemotingConfig};

    fn quick_settings(iterations: u32) -> DemoSettings {
        DemoSettings {
            iterations,
            tick_interval_ms: 0,
            ..DemoSettings::default()
        }
    }

    #[tokio::test]
    async fn test_scripted_session() {
        let pair = create_link_pair("host", "client", RemotingConfig::default()).unwrap();
        let report = run_session(&pair, &quick_settings(3)).await.unwrap();

        assert_eq!(report.iterations_completed, 3);
        assert_eq!(report.host_name, "Take 3");
        assert_eq!(report.client_name, "Take 3");
        assert_eq!(report.host_play_count, 3);
        assert_eq!(report.client_play_count, 3);
        assert_eq!(report.host_rating, 3);
        assert_eq!(report.echoed_failures, 3);
        assert_eq!(report.host_stats.exceptions_echoed, 3);
        assert_eq!(report.client_stats.messages_dropped, 0);
        assert_eq!(report.host_stats.direction_violations, 0);
    }

    #[tokio::test]
    async fn test_session_over_compressed_link() {
        let config = RemotingConfig {
            enable_compression: true,
            compression_threshold: 32,
            ..RemotingConfig::default()
        };
        let pair = create_link_pair("host", "client", config).unwrap();
        let report = run_session(&pair, &quick_settings(2)).await.unwrap();

        assert_eq!(report.client_name, "Take 2");
        assert_eq!(report.client_play_count, 2);
    }

    #[tokio::test]
    async fn test_application_from_default_config() {
        let mut config = AppConfig::default();
        config.demo.iterations = 1;
        config.demo.tick_interval_ms = 0;

        let app = app::Application::from_config(config).unwrap();
        app.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = AppConfig::default();
        config.demo.client_endpoint = config.demo.host_endpoint.clone();
        assert!(app::Application::from_config(config).is_err());
    }
}
