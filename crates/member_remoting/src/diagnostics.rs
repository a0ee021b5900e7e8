//! # Diagnostics
//!
//! Observable record of everything the link drops, rejects or fails on.
//! Per-message failures never reach callers; subscribers of
//! [`RemotingLink::subscribe_diagnostics`](crate::link::RemotingLink::subscribe_diagnostics)
//! see them here instead.

use crate::utils::current_timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// An inbound frame was discarded before reaching any instance
    MessageDropped { endpoint_id: String, error_kind: String, reason: String },
    /// An inbound message targeted a member whose direction forbids it
    DirectionViolation { instance_id: String, signature: String },
    /// A member failed while applying an inbound message
    RemoteApplyFailed {
        instance_id: String,
        signature: String,
        exception_type: String,
        message: String,
        echoed: bool,
    },
    /// The peer echoed an exception that no waiter claimed
    RemoteExceptionReceived {
        instance_id: String,
        target_name: String,
        exception_type: String,
        message: String,
    },
    SendFailed { instance_id: String, action: String, reason: String },
    InstanceReplaced { instance_id: String },
    InstanceDisposed { instance_id: String, cancelled_waiters: usize },
}

/// A timestamped diagnostic record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub timestamp: u64,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

/// Sending half shared by the link and its member remotes.
#[derive(Debug, Clone)]
pub struct DiagnosticsSink {
    sender: broadcast::Sender<DiagnosticEvent>,
}

impl DiagnosticsSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiagnosticEvent> {
        self.sender.subscribe()
    }

    /// Records an event. Having no subscribers is not an error.
    pub fn emit(&self, kind: DiagnosticKind) {
        let event = DiagnosticEvent {
            timestamp: current_timestamp(),
            kind,
        };
        if self.sender.send(event).is_err() {
            trace!("Diagnostic emitted with no subscribers");
        }
    }
}
