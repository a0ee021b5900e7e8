/// Inbound pipeline: bytes from the transport to an applied change
use super::core::RemotingLink;
use crate::converter::preview;
use crate::diagnostics::DiagnosticKind;
use crate::error::RemotingError;
use crate::message::RemoteMessage;
use crate::remote::ApplyOutcome;
use crate::transport::InboundFrame;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

impl RemotingLink {
    /// Entry point for the transport's receive callback. Every failure is
    /// contained here: it is logged, counted and reported as a diagnostic,
    /// and the next frame is processed normally.
    pub async fn on_data_received(&self, endpoint_id: &str, data: &[u8]) -> Result<ApplyOutcome, RemotingError> {
        self.stats.record_received(data.len());

        let result = self.receive(data).await;
        match &result {
            Ok(outcome) => {
                self.stats.record_applied();
                trace!("✅ Frame from '{}' handled: {:?}", endpoint_id, outcome);
            }
            Err(e) => self.record_failure(endpoint_id, data, e),
        }
        result
    }

    async fn receive(&self, data: &[u8]) -> Result<ApplyOutcome, RemotingError> {
        if data.len() > self.config.max_message_size {
            return Err(RemotingError::MessageTooLarge {
                size: data.len(),
                limit: self.config.max_message_size,
            });
        }

        let message = self.converter.deserialize(data)?;
        if self.config.log_payloads {
            trace!("📥 {} <- {}: {}", message.kind(), self.peer_endpoint, preview(data));
        }

        let remote = match &message {
            RemoteMessage::MethodCall(m) => self.registry.resolve_member(&m.target_member_signature)?.0,
            RemoteMessage::PropertyChange(m) => self.registry.resolve_member(&m.target_member_signature)?.0,
            other => self.registry.resolve(other.member_instance_id())?,
        };

        remote.apply_inbound(message).await
    }

    fn record_failure(&self, endpoint_id: &str, data: &[u8], error: &RemotingError) {
        match error {
            // Reported by the remote with instance context
            RemotingError::DirectionViolation { .. } => {
                self.stats.record_direction_violation();
                self.stats.record_dropped();
            }
            RemotingError::RemoteApply { .. } => {
                self.stats.record_apply_failure();
            }
            _ => {
                self.stats.record_dropped();
                warn!(
                    "⚠️ Dropped frame from '{}' ({}): {}",
                    endpoint_id,
                    error.kind(),
                    error
                );
                if matches!(error, RemotingError::Deserialization(_) | RemotingError::UnsupportedMessageKind(_)) {
                    debug!("Dropped payload preview: '{}'", preview(data));
                }
                self.diagnostics.emit(DiagnosticKind::MessageDropped {
                    endpoint_id: endpoint_id.to_string(),
                    error_kind: error.kind().to_string(),
                    reason: error.to_string(),
                });
            }
        }
    }

    /// Spawns a task that feeds every frame from `frames` through
    /// [`RemotingLink::on_data_received`], strictly one after another, so
    /// application order equals arrival order.
    pub fn attach_inbound(self: &Arc<Self>, mut frames: mpsc::UnboundedReceiver<InboundFrame>) {
        let link = Arc::downgrade(self);
        let local = self.local_endpoint().to_string();

        let handle = tokio::spawn(async move {
            debug!("📡 Inbound pump for '{}' started", local);
            while let Some(frame) = frames.recv().await {
                let Some(link) = link.upgrade() else {
                    break;
                };
                // Failures are already recorded
                let _ = link.on_data_received(&frame.endpoint_id, &frame.data).await;
            }
            debug!("📡 Inbound pump for '{}' stopped", local);
        });

        self.track_task(handle);
    }
}
