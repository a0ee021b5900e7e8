/// Outbound pipeline: intercepted mutations are queued here and a single
/// per-link task serializes and hands them to the transport in order.
use super::stats::StatsTracker;
use crate::converter::MessageConverter;
use crate::diagnostics::{DiagnosticKind, DiagnosticsSink};
use crate::error::RemotingError;
use crate::message::RemoteMessage;
use crate::transport::RemoteTransport;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, trace, warn};

/// A queued message plus the sender-side pending counter to release once
/// the transport has taken it.
#[derive(Debug)]
pub(crate) struct Outbound {
    pub message: RemoteMessage,
    pub pending: Option<Arc<AtomicUsize>>,
}

/// Cloneable handle to the outbound queue.
#[derive(Debug, Clone)]
pub(crate) struct OutboundQueue {
    tx: mpsc::UnboundedSender<Outbound>,
    enqueued: Arc<AtomicU64>,
    processed: watch::Receiver<u64>,
}

/// Receiving half, consumed by [`run_outbound`].
pub(crate) struct OutboundReceiver {
    rx: mpsc::UnboundedReceiver<Outbound>,
    processed: watch::Sender<u64>,
}

impl OutboundQueue {
    pub fn new() -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (processed_tx, processed_rx) = watch::channel(0u64);
        (
            Self {
                tx,
                enqueued: Arc::new(AtomicU64::new(0)),
                processed: processed_rx,
            },
            OutboundReceiver {
                rx,
                processed: processed_tx,
            },
        )
    }

    /// Queues a message without waiting for it to be sent.
    pub fn enqueue(&self, message: RemoteMessage, pending: Option<Arc<AtomicUsize>>) -> Result<(), RemotingError> {
        if let Some(counter) = &pending {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        self.enqueued.fetch_add(1, Ordering::SeqCst);

        self.tx.send(Outbound { message, pending }).map_err(|rejected| {
            if let Some(counter) = &rejected.0.pending {
                counter.fetch_sub(1, Ordering::SeqCst);
            }
            self.enqueued.fetch_sub(1, Ordering::SeqCst);
            RemotingError::Transport("outbound queue is closed".to_string())
        })
    }

    /// Resolves once everything queued before the call has been handed to
    /// the transport (successfully or not).
    pub async fn flush(&self) -> Result<(), RemotingError> {
        let target = self.enqueued.load(Ordering::SeqCst);
        let mut processed = self.processed.clone();
        processed
            .wait_for(|done| *done >= target)
            .await
            .map(|_| ())
            .map_err(|_| RemotingError::Transport("outbound task has stopped".to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Everything the outbound task needs to put bytes on the wire.
pub(crate) struct OutboundContext {
    pub converter: Arc<dyn MessageConverter>,
    pub transport: Arc<dyn RemoteTransport>,
    pub peer_endpoint: String,
    pub stats: Arc<StatsTracker>,
    pub diagnostics: DiagnosticsSink,
    pub log_payloads: bool,
}

/// Drains the queue until every sender is gone.
pub(crate) async fn run_outbound(mut receiver: OutboundReceiver, ctx: OutboundContext) {
    debug!("🚀 Outbound pipeline started towards '{}'", ctx.peer_endpoint);

    while let Some(outbound) = receiver.rx.recv().await {
        send_one(&ctx, &outbound.message).await;

        if let Some(counter) = &outbound.pending {
            counter.fetch_sub(1, Ordering::SeqCst);
        }
        receiver.processed.send_modify(|done| *done += 1);
    }

    debug!("🛑 Outbound pipeline towards '{}' stopped", ctx.peer_endpoint);
}

async fn send_one(ctx: &OutboundContext, message: &RemoteMessage) {
    let bytes = match ctx.converter.serialize(message) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(
                "🔴 Failed to serialize {} for '{}': {}",
                message.kind(),
                message.member_instance_id(),
                e
            );
            report_failure(ctx, message, &e);
            return;
        }
    };

    if ctx.log_payloads {
        trace!("📤 {} -> {}: {}", message.kind(), ctx.peer_endpoint, String::from_utf8_lossy(&bytes));
    }

    let size = bytes.len();
    match ctx.transport.send(&ctx.peer_endpoint, bytes).await {
        Ok(()) => ctx.stats.record_sent(size),
        Err(e) => {
            warn!(
                "⚠️ Transport refused {} for '{}': {}",
                message.kind(),
                message.member_instance_id(),
                e
            );
            report_failure(ctx, message, &e);
        }
    }
}

fn report_failure(ctx: &OutboundContext, message: &RemoteMessage, error: &RemotingError) {
    ctx.stats.record_send_failure();
    ctx.diagnostics.emit(DiagnosticKind::SendFailed {
        instance_id: message.member_instance_id().to_string(),
        action: message.kind().to_string(),
        reason: error.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::JsonMessageConverter;
    use crate::testing::RecordingTransport;

    fn context(transport: Arc<RecordingTransport>, stats: Arc<StatsTracker>) -> OutboundContext {
        OutboundContext {
            converter: Arc::new(JsonMessageConverter),
            transport,
            peer_endpoint: "client".to_string(),
            stats,
            diagnostics: DiagnosticsSink::new(8),
            log_payloads: true,
        }
    }

    #[tokio::test]
    async fn test_flush_waits_for_queued_messages() {
        let transport = Arc::new(RecordingTransport::new("host"));
        let stats = Arc::new(StatsTracker::default());
        let (queue, receiver) = OutboundQueue::new();
        let pending = Arc::new(AtomicUsize::new(0));

        for i in 0..10 {
            queue
                .enqueue(RemoteMessage::none(format!("id-{i}"), "x"), Some(pending.clone()))
                .unwrap();
        }
        assert_eq!(pending.load(Ordering::SeqCst), 10);

        tokio::spawn(run_outbound(receiver, context(transport.clone(), stats.clone())));
        queue.flush().await.unwrap();

        assert_eq!(pending.load(Ordering::SeqCst), 0);
        assert_eq!(transport.sent_count(), 10);
        assert_eq!(stats.snapshot().messages_sent, 10);
    }

    #[tokio::test]
    async fn test_send_failure_is_counted_and_reported() {
        let transport = Arc::new(RecordingTransport::new("host"));
        transport.fail_sends(true);
        let stats = Arc::new(StatsTracker::default());
        let ctx = context(transport, stats.clone());
        let mut diagnostics = ctx.diagnostics.subscribe();
        let (queue, receiver) = OutboundQueue::new();

        tokio::spawn(run_outbound(receiver, ctx));
        queue.enqueue(RemoteMessage::none("track-1", "Name"), None).unwrap();
        queue.flush().await.unwrap();

        assert_eq!(stats.snapshot().send_failures, 1);
        let event = diagnostics.recv().await.unwrap();
        assert!(matches!(event.kind, DiagnosticKind::SendFailed { ref instance_id, .. } if instance_id == "track-1"));
    }

    #[tokio::test]
    async fn test_enqueue_after_task_stops_fails() {
        let (queue, receiver) = OutboundQueue::new();
        drop(receiver);

        let pending = Arc::new(AtomicUsize::new(0));
        let err = queue
            .enqueue(RemoteMessage::none("track-1", "Name"), Some(pending.clone()))
            .unwrap_err();
        assert_eq!(err.kind(), "transport");
        assert_eq!(pending.load(Ordering::SeqCst), 0);
        assert!(queue.flush().await.is_ok());
    }
}
