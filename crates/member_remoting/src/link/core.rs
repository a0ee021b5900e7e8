/// Core RemotingLink implementation
use super::outbound::{run_outbound, OutboundContext, OutboundQueue};
use super::stats::{LinkStats, StatsTracker};
use crate::config::RemotingConfig;
use crate::converter::{CompressedMessageConverter, JsonMessageConverter, MessageConverter};
use crate::diagnostics::{DiagnosticEvent, DiagnosticKind, DiagnosticsSink};
use crate::direction::RemotingMode;
use crate::error::RemotingError;
use crate::member::RemotableObject;
use crate::registry::MemberRegistry;
use crate::remote::{MemberRemote, RemoteContext, SharedObject};
use crate::transport::RemoteTransport;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// One endpoint of a link: everything between the remoted objects and the
/// transport.
///
/// A link owns its registry, converter, outbound queue and the background
/// tasks that drain it and pump inbound frames. Creating one spawns its
/// outbound task, so it must happen inside a Tokio runtime.
///
/// # Examples
///
/// ```rust,no_run
/// use member_remoting::*;
/// use std::sync::{Arc, Mutex};
///
/// # async fn example() -> Result<(), RemotingError> {
/// let ((host_side, _host_rx), (_client_side, _client_rx)) = ChannelTransport::pair("host", "client");
/// let link = RemotingLink::new(RemotingMode::Host, Arc::new(host_side), "client");
///
/// let track = Arc::new(Mutex::new(ExampleTrack::new("Intro")));
/// let remote = link.remote("track-1", track.clone())?;
/// remote.set_property("Name", serde_json::json!("Foo")).ok();
/// link.flush().await?;
/// # Ok(())
/// # }
/// ```
pub struct RemotingLink {
    pub(super) mode: RemotingMode,
    pub(super) peer_endpoint: String,
    pub(super) config: Arc<RemotingConfig>,
    pub(super) registry: Arc<MemberRegistry>,
    pub(super) converter: Arc<dyn MessageConverter>,
    pub(super) transport: Arc<dyn RemoteTransport>,
    pub(super) outbound: OutboundQueue,
    pub(super) stats: Arc<StatsTracker>,
    pub(super) diagnostics: DiagnosticsSink,
    pub(super) tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for RemotingLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemotingLink")
            .field("mode", &self.mode)
            .field("local_endpoint", &self.transport.local_endpoint())
            .field("peer_endpoint", &self.peer_endpoint)
            .field("instances", &self.registry.len())
            .finish()
    }
}

impl RemotingLink {
    /// Creates a link with the default configuration.
    pub fn new(mode: RemotingMode, transport: Arc<dyn RemoteTransport>, peer_endpoint: impl Into<String>) -> Self {
        Self::build(mode, transport, peer_endpoint.into(), RemotingConfig::default())
    }

    /// Creates a link with a validated configuration.
    pub fn with_config(
        mode: RemotingMode,
        transport: Arc<dyn RemoteTransport>,
        peer_endpoint: impl Into<String>,
        config: RemotingConfig,
    ) -> Result<Self, RemotingError> {
        config.validate().map_err(RemotingError::InvalidConfig)?;
        Ok(Self::build(mode, transport, peer_endpoint.into(), config))
    }

    fn build(
        mode: RemotingMode,
        transport: Arc<dyn RemoteTransport>,
        peer_endpoint: String,
        config: RemotingConfig,
    ) -> Self {
        let converter: Arc<dyn MessageConverter> = if config.enable_compression {
            Arc::new(CompressedMessageConverter::new(
                JsonMessageConverter::new(),
                config.compression_threshold,
                config.max_message_size,
            ))
        } else {
            Arc::new(JsonMessageConverter::new())
        };

        let stats = Arc::new(StatsTracker::default());
        let diagnostics = DiagnosticsSink::new(config.diagnostics_capacity);
        let (outbound, receiver) = OutboundQueue::new();

        let outbound_task = tokio::spawn(run_outbound(
            receiver,
            OutboundContext {
                converter: converter.clone(),
                transport: transport.clone(),
                peer_endpoint: peer_endpoint.clone(),
                stats: stats.clone(),
                diagnostics: diagnostics.clone(),
                log_payloads: config.log_payloads,
            },
        ));

        info!(
            "🔗 {} link '{}' -> '{}' ready (compression: {})",
            mode,
            transport.local_endpoint(),
            peer_endpoint,
            config.enable_compression
        );

        Self {
            mode,
            peer_endpoint,
            registry: Arc::new(MemberRegistry::new(config.duplicate_policy)),
            config: Arc::new(config),
            converter,
            transport,
            outbound,
            stats,
            diagnostics,
            tasks: Mutex::new(vec![outbound_task]),
        }
    }

    pub fn mode(&self) -> RemotingMode {
        self.mode
    }

    pub fn local_endpoint(&self) -> &str {
        self.transport.local_endpoint()
    }

    pub fn peer_endpoint(&self) -> &str {
        &self.peer_endpoint
    }

    pub fn config(&self) -> &RemotingConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<MemberRegistry> {
        &self.registry
    }

    /// Wraps `object` and registers it under `id`.
    pub fn remote<T: RemotableObject>(
        &self,
        id: impl Into<String>,
        object: Arc<Mutex<T>>,
    ) -> Result<MemberRemote, RemotingError> {
        let object: SharedObject = object;
        self.remote_shared(id, object)
    }

    /// [`RemotingLink::remote`] for an already type-erased object.
    ///
    /// An object can be remoted under one id only. The object gets its hook
    /// once the registration went through, so a rejected attempt leaves an
    /// existing remote untouched.
    pub fn remote_shared(&self, id: impl Into<String>, object: SharedObject) -> Result<MemberRemote, RemotingError> {
        let id = id.into();
        if let Some(holder) = self
            .registry
            .remotes()
            .into_iter()
            .find(|remote| remote.id() != id && remote.wraps(&object))
        {
            warn!("⚠️ Object for '{}' is already remoted as '{}'", id, holder.id());
            return Err(RemotingError::DuplicateInstance(holder.id().to_string()));
        }

        let remote = MemberRemote::new(id, object, self.remote_context());
        let replaced = self.registry.register(remote.clone())?;
        remote.attach();

        if let Some(replaced) = replaced {
            self.diagnostics.emit(DiagnosticKind::InstanceReplaced {
                instance_id: replaced.id().to_string(),
            });
            replaced.dispose();
        }

        Ok(remote)
    }

    fn remote_context(&self) -> RemoteContext {
        RemoteContext {
            mode: self.mode,
            outbound: self.outbound.clone(),
            registry: Arc::downgrade(&self.registry),
            config: self.config.clone(),
            diagnostics: self.diagnostics.clone(),
            stats: self.stats.clone(),
        }
    }

    /// The remote registered under `id`.
    pub fn get(&self, id: &str) -> Result<MemberRemote, RemotingError> {
        self.registry.resolve(id)
    }

    /// Waits until everything queued so far has been handed to the
    /// transport.
    pub async fn flush(&self) -> Result<(), RemotingError> {
        self.outbound.flush().await
    }

    pub fn stats(&self) -> LinkStats {
        let mut stats = self.stats.snapshot();
        stats.registered_instances = self.registry.len();
        stats
    }

    pub fn subscribe_diagnostics(&self) -> broadcast::Receiver<DiagnosticEvent> {
        self.diagnostics.subscribe()
    }

    pub(super) fn track_task(&self, handle: JoinHandle<()>) {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handle);
    }

    /// Disposes every registered remote, sends what is already queued and
    /// stops the link's tasks.
    pub async fn shutdown(&self) -> Result<(), RemotingError> {
        let remotes = self.registry.remotes();
        let count = remotes.len();
        for remote in remotes {
            remote.dispose();
        }

        if let Err(e) = self.flush().await {
            warn!("⚠️ Outbound queue could not be drained during shutdown: {}", e);
        }

        let tasks: Vec<JoinHandle<()>> = self
            .tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
            .collect();
        for task in &tasks {
            task.abort();
        }

        info!("🛑 {} link '{}' shut down ({} remotes disposed)", self.mode, self.local_endpoint(), count);
        Ok(())
    }
}

impl Drop for RemotingLink {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner()).drain(..) {
            task.abort();
        }
    }
}
