//! Application lifecycle: configuration, link setup and the scripted session.

use crate::{
    cli::CliArgs,
    config::{AppConfig, DemoSettings},
    logging::display_banner,
    signals::wait_for_shutdown_signal,
};
use member_remoting::{
    create_link_pair, DiagnosticKind, ExampleTrack, LinkPair, LinkStats, RemotingError, RemotingLink,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Outcome of a scripted session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub iterations_completed: u32,
    pub host_name: String,
    pub client_name: String,
    pub host_play_count: u64,
    pub client_play_count: u64,
    pub host_rating: u8,
    pub echoed_failures: u32,
    pub host_stats: LinkStats,
    pub client_stats: LinkStats,
}

/// Main application struct.
///
/// Owns the configuration and both ends of the in-memory link.
pub struct Application {
    config: AppConfig,
    pair: LinkPair,
}

impl Application {
    /// Loads configuration, applies CLI overrides, validates and creates the
    /// link pair. Must be called from within a Tokio runtime.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        if let Some(iterations) = args.iterations {
            config.demo.iterations = iterations;
        }

        Self::from_config(config)
    }

    /// Builds the application from an already loaded configuration.
    pub fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        let pair = create_link_pair(
            &config.demo.host_endpoint,
            &config.demo.client_endpoint,
            config.remoting.clone(),
        )?;

        Ok(Self { config, pair })
    }

    /// Runs the scripted session until it completes or a shutdown signal
    /// arrives, then shuts both links down.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        display_banner();
        self.log_configuration_summary();

        let diagnostics_handles = [
            spawn_diagnostics_logger("host", &self.pair.host),
            spawn_diagnostics_logger("client", &self.pair.client),
        ];

        let outcome = tokio::select! {
            result = run_session(&self.pair, &self.config.demo) => Some(result),
            signal = wait_for_shutdown_signal() => {
                signal?;
                None
            }
        };

        info!("🧹 Shutting down links...");
        if let Err(e) = self.pair.client.shutdown().await {
            warn!("⚠️ Client link shutdown incomplete: {e}");
        }
        if let Err(e) = self.pair.host.shutdown().await {
            warn!("⚠️ Host link shutdown incomplete: {e}");
        }
        for handle in diagnostics_handles {
            handle.abort();
        }

        match outcome {
            Some(Ok(report)) => {
                log_final_statistics(&report);
                info!("✅ Remoting demo complete");
                Ok(())
            }
            Some(Err(e)) => {
                error!("❌ Session failed: {e}");
                Err(e.into())
            }
            None => {
                info!("🛑 Session interrupted");
                Ok(())
            }
        }
    }

    fn log_configuration_summary(&self) {
        let demo = &self.config.demo;
        let remoting = &self.config.remoting;
        info!("📋 Configuration Summary:");
        info!("  🔗 Link: {} <-> {}", demo.host_endpoint, demo.client_endpoint);
        info!("  🆔 Instance: {}", demo.instance_id);
        info!("  🔁 Iterations: {} every {}ms", demo.iterations, demo.tick_interval_ms);
        info!("  ⏱️ Wait timeout: {}ms", remoting.default_wait_timeout_ms);
        info!(
            "  🗜️ Compression: {} (threshold {} bytes)",
            remoting.enable_compression, remoting.compression_threshold
        );
        info!("  📐 Duplicate policy: {:?}", remoting.duplicate_policy);
    }
}

fn spawn_diagnostics_logger(side: &'static str, link: &RemotingLink) -> JoinHandle<()> {
    let mut diagnostics = link.subscribe_diagnostics();
    tokio::spawn(async move {
        while let Ok(event) = diagnostics.recv().await {
            match &event.kind {
                DiagnosticKind::RemoteApplyFailed { .. } | DiagnosticKind::MessageDropped { .. } => {
                    warn!("🩺 [{side}] {:?}", event.kind)
                }
                _ => debug!("🩺 [{side}] {:?}", event.kind),
            }
        }
    })
}

/// Drives `settings.iterations` exchanges over `pair`.
///
/// Each exchange renames the track on the host, waits on a host-published
/// slot so the rename is known to have landed, then rates and plays it from
/// the client. Every exchange also provokes one echoed failure.
pub async fn run_session(pair: &LinkPair, settings: &DemoSettings) -> Result<SessionReport, RemotingError> {
    let id = settings.instance_id.as_str();
    let host_track = Arc::new(Mutex::new(ExampleTrack::new("Untitled")));
    let client_track = Arc::new(Mutex::new(ExampleTrack::new("Untitled")));

    let host = pair.host.remote(id, host_track.clone())?;
    let client = pair.client.remote(id, client_track.clone())?;
    info!("🎵 Registered '{}' on both ends", id);

    let mut echoed_failures = 0;
    let mut iterations_completed = 0;

    for i in 1..=settings.iterations {
        let tick_slot = format!("tick-{i}");

        with_track(&host_track, |track| track.set_name(format!("Take {i}")));
        host.publish_data(&tick_slot, i.into())?;
        client.wait_for_remote_data(&tick_slot, pair.client.config().default_wait_timeout()).await?;
        debug!("🔁 Client sees name '{}'", with_track(&client_track, |track| track.name().to_string()));

        let rating = (i % 6) as u8;
        if let Err(e) = with_track(&client_track, |track| track.set_rating(rating)) {
            warn!("⚠️ Rating {} rejected locally: {}", rating, e);
        }

        let play_count = client.call_remote("Play", vec![]).await?;
        info!("▶️ Iteration {}: host play count {}", i, play_count);

        match client.call_remote("Fail", vec![]).await {
            Err(RemotingError::RemoteException(exception)) => {
                debug!("💥 Echoed failure: {}: {}", exception.type_name, exception.message);
                echoed_failures += 1;
            }
            Err(e) => return Err(e),
            Ok(value) => warn!("⚠️ Fail returned {} instead of failing", value),
        }

        iterations_completed = i;
        if settings.tick_interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(settings.tick_interval_ms)).await;
        }
    }

    let report = SessionReport {
        iterations_completed,
        host_name: with_track(&host_track, |track| track.name().to_string()),
        client_name: with_track(&client_track, |track| track.name().to_string()),
        host_play_count: with_track(&host_track, |track| track.play_count()),
        client_play_count: with_track(&client_track, |track| track.play_count()),
        host_rating: with_track(&host_track, |track| track.rating()),
        echoed_failures,
        host_stats: pair.host.stats(),
        client_stats: pair.client.stats(),
    };

    host.dispose();
    client.dispose();
    Ok(report)
}

fn with_track<R>(track: &Mutex<ExampleTrack>, f: impl FnOnce(&mut ExampleTrack) -> R) -> R {
    let mut guard = track.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut guard)
}

fn log_final_statistics(report: &SessionReport) {
    info!("📊 Final Statistics:");
    info!("  - Iterations completed: {}", report.iterations_completed);
    info!("  - Track name: host '{}' / client '{}'", report.host_name, report.client_name);
    info!("  - Play count: host {} / client {}", report.host_play_count, report.client_play_count);
    info!("  - Echoed failures: {}", report.echoed_failures);
    for (side, stats) in [("host", &report.host_stats), ("client", &report.client_stats)] {
        info!(
            "  - {}: {} sent / {} received / {} applied / {} dropped / {} apply failures",
            side,
            stats.messages_sent,
            stats.messages_received,
            stats.messages_applied,
            stats.messages_dropped,
            stats.apply_failures
        );
    }
}
