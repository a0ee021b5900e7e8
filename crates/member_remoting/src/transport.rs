//! # Transport Contract
//!
//! The remoting core does not own connections. It needs two things from a
//! transport: a fire-and-forget `send` of an opaque byte buffer to a named
//! endpoint, and someone to hand inbound buffers to
//! [`RemotingLink::on_data_received`](crate::link::RemotingLink::on_data_received).
//! Ordering and retries are whatever the transport provides.
//!
//! [`ChannelTransport`] is an in-memory implementation over Tokio channels,
//! used to wire two links inside one process.

use crate::error::RemotingError;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

/// A buffer delivered by a transport, tagged with the sending endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub endpoint_id: String,
    pub data: Vec<u8>,
}

/// Outbound side of a transport.
#[async_trait]
pub trait RemoteTransport: Send + Sync + std::fmt::Debug {
    /// Identifier of this endpoint, reported to the peer with every frame.
    fn local_endpoint(&self) -> &str;

    /// Sends `data` to `endpoint_id`. Completion means "handed off", not
    /// "delivered".
    async fn send(&self, endpoint_id: &str, data: Vec<u8>) -> Result<(), RemotingError>;
}

/// In-memory transport: each side pushes frames straight into the peer's
/// inbound channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    local_endpoint: String,
    peer_endpoint: String,
    peer: mpsc::UnboundedSender<InboundFrame>,
}

/// One side of a [`ChannelTransport::pair`]: the transport plus the
/// receiver of frames addressed to it.
pub type ChannelEndpoint = (ChannelTransport, mpsc::UnboundedReceiver<InboundFrame>);

impl ChannelTransport {
    /// Creates two connected endpoints named `a` and `b`.
    pub fn pair(a: &str, b: &str) -> (ChannelEndpoint, ChannelEndpoint) {
        let (to_a, a_rx) = mpsc::unbounded_channel();
        let (to_b, b_rx) = mpsc::unbounded_channel();

        let a_side = ChannelTransport {
            local_endpoint: a.to_string(),
            peer_endpoint: b.to_string(),
            peer: to_b,
        };
        let b_side = ChannelTransport {
            local_endpoint: b.to_string(),
            peer_endpoint: a.to_string(),
            peer: to_a,
        };

        ((a_side, a_rx), (b_side, b_rx))
    }

    pub fn peer_endpoint(&self) -> &str {
        &self.peer_endpoint
    }
}

#[async_trait]
impl RemoteTransport for ChannelTransport {
    fn local_endpoint(&self) -> &str {
        &self.local_endpoint
    }

    async fn send(&self, endpoint_id: &str, data: Vec<u8>) -> Result<(), RemotingError> {
        if endpoint_id != self.peer_endpoint {
            return Err(RemotingError::Transport(format!(
                "endpoint '{}' is not reachable from '{}'",
                endpoint_id, self.local_endpoint
            )));
        }

        trace!("📤 {} -> {} ({} bytes)", self.local_endpoint, endpoint_id, data.len());
        self.peer
            .send(InboundFrame {
                endpoint_id: self.local_endpoint.clone(),
                data,
            })
            .map_err(|_| RemotingError::Transport(format!("endpoint '{endpoint_id}' is closed")))
    }
}
