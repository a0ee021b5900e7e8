//! Signal handling for early shutdown of the scripted session.

use tokio::signal;
use tracing::info;

/// Resolves when SIGINT or SIGTERM (Ctrl+C on Windows) is received.
pub async fn wait_for_shutdown_signal() -> Result<(), std::io::Error> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    info!("📡 Received shutdown signal - stopping the session");
    Ok(())
}
