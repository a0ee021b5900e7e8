//! # Utility Functions
//!
//! - [`current_timestamp()`] - timestamps for diagnostics
//! - [`create_link_pair()`] - a host link and a client link wired together in
//!   memory, each pumping the other's frames

use crate::config::RemotingConfig;
use crate::direction::RemotingMode;
use crate::error::RemotingError;
use crate::link::RemotingLink;
use crate::transport::ChannelTransport;
use std::sync::Arc;

/// Returns the current Unix timestamp in seconds, or 0 if the system clock
/// reads before the epoch.
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Both endpoints of an in-process link.
#[derive(Debug, Clone)]
pub struct LinkPair {
    pub host: Arc<RemotingLink>,
    pub client: Arc<RemotingLink>,
}

/// Creates a host link and a client link connected through a
/// [`ChannelTransport`], with inbound pumps attached on both sides.
///
/// Must be called from within a Tokio runtime.
pub fn create_link_pair(
    host_endpoint: &str,
    client_endpoint: &str,
    config: RemotingConfig,
) -> Result<LinkPair, RemotingError> {
    let ((host_transport, host_rx), (client_transport, client_rx)) =
        ChannelTransport::pair(host_endpoint, client_endpoint);

    let host = Arc::new(RemotingLink::with_config(
        RemotingMode::Host,
        Arc::new(host_transport),
        client_endpoint,
        config.clone(),
    )?);
    let client = Arc::new(RemotingLink::with_config(
        RemotingMode::Client,
        Arc::new(client_transport),
        host_endpoint,
        config,
    )?);

    host.attach_inbound(host_rx);
    client.attach_inbound(client_rx);

    Ok(LinkPair { host, client })
}
