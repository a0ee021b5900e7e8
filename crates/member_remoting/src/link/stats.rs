/// Link statistics
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of a link's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStats {
    /// Messages handed to the transport
    pub messages_sent: u64,
    /// Frames received from the transport
    pub messages_received: u64,
    /// Inbound messages applied (including idempotent no-ops)
    pub messages_applied: u64,
    /// Inbound messages dropped before reaching a member
    pub messages_dropped: u64,
    pub send_failures: u64,
    /// Inbound messages whose member failed while applying
    pub apply_failures: u64,
    pub direction_violations: u64,
    /// Failures echoed back to the peer as `ExceptionThrown`
    pub exceptions_echoed: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Instances registered at snapshot time
    pub registered_instances: usize,
}

/// Lock-free counters behind [`LinkStats`].
#[derive(Debug, Default)]
pub(crate) struct StatsTracker {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    messages_applied: AtomicU64,
    messages_dropped: AtomicU64,
    send_failures: AtomicU64,
    apply_failures: AtomicU64,
    direction_violations: AtomicU64,
    exceptions_echoed: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl StatsTracker {
    pub fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_applied(&self) {
        self.messages_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_apply_failure(&self) {
        self.apply_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_direction_violation(&self) {
        self.direction_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exception_echoed(&self) {
        self.exceptions_echoed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LinkStats {
        LinkStats {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_applied: self.messages_applied.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            apply_failures: self.apply_failures.load(Ordering::Relaxed),
            direction_violations: self.direction_violations.load(Ordering::Relaxed),
            exceptions_echoed: self.exceptions_echoed.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            registered_instances: 0,
        }
    }
}
