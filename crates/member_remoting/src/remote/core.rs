/// Core MemberRemote implementation
use super::intercept::MemberHook;
use super::slots::SlotTable;
use super::{InterceptOutcome, RemoteState};
use crate::config::RemotingConfig;
use crate::diagnostics::{DiagnosticKind, DiagnosticsSink};
use crate::direction::{should_propagate, RemotingMode};
use crate::error::{MemberError, RemotingError};
use crate::link::outbound::OutboundQueue;
use crate::link::stats::StatsTracker;
use crate::member::{MemberKind, RemotableObject, ResolvedMember};
use crate::message::{CustomMessage, RemoteMessage};
use crate::registry::MemberRegistry;
use crate::signature::MemberSignature;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info};
use uuid::Uuid;

/// A remotable object shared between the application and its remote.
pub type SharedObject = Arc<Mutex<dyn RemotableObject>>;

/// Handler for inbound `Custom` messages of one action name.
pub type CustomHandler = Arc<dyn Fn(&CustomMessage) -> Result<(), MemberError> + Send + Sync>;

/// Link-owned collaborators a remote is built with.
#[derive(Clone)]
pub(crate) struct RemoteContext {
    pub mode: RemotingMode,
    pub outbound: OutboundQueue,
    pub registry: Weak<MemberRegistry>,
    pub config: Arc<RemotingConfig>,
    pub diagnostics: DiagnosticsSink,
    pub stats: Arc<StatsTracker>,
}

pub(crate) struct RemoteShared {
    pub(super) id: String,
    pub(super) token: Uuid,
    pub(super) type_name: String,
    pub(super) object: SharedObject,
    /// Annotated members by name; the inbound allow-list
    pub(super) members: HashMap<String, ResolvedMember>,
    pub(super) ctx: RemoteContext,
    /// FIFO lock serializing inbound application for this instance
    pub(super) apply_lock: tokio::sync::Mutex<()>,
    /// Member currently being applied from the wire
    pub(super) applying: Mutex<Option<String>>,
    /// Outbound messages queued but not yet handed to the transport
    pub(super) in_flight: Arc<AtomicUsize>,
    /// Callers blocked in a slot wait
    pub(super) awaiting: AtomicUsize,
    pub(super) slots: SlotTable,
    pub(super) custom_handlers: DashMap<String, CustomHandler>,
    pub(super) self_reporting: AtomicBool,
    pub(super) disposed: AtomicBool,
}

/// Per-instance remoting engine. Cloning yields another handle to the same
/// instance.
#[derive(Clone)]
pub struct MemberRemote {
    pub(super) shared: Arc<RemoteShared>,
}

impl std::fmt::Debug for MemberRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberRemote")
            .field("id", &self.shared.id)
            .field("type_name", &self.shared.type_name)
            .field("mode", &self.shared.ctx.mode)
            .field("members", &self.shared.members.len())
            .field("state", &self.state())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

pub(super) fn lock_object(object: &SharedObject) -> MutexGuard<'_, dyn RemotableObject + 'static> {
    object.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemberRemote {
    /// Wraps `object`. Registration and [`MemberRemote::attach`] are the
    /// caller's job (see [`RemotingLink::remote`](crate::link::RemotingLink::remote)).
    pub(crate) fn new(id: impl Into<String>, object: SharedObject, ctx: RemoteContext) -> Self {
        let id = id.into();
        let (type_name, members) = {
            let guard = lock_object(&object);
            let members = MemberRegistry::enumerate_remotable_members(&*guard)
                .into_iter()
                .map(|member| (member.name.clone(), member))
                .collect::<HashMap<_, _>>();
            (guard.type_name().to_string(), members)
        };

        let slots = SlotTable::new(ctx.config.default_wait_timeout(), ctx.config.max_ready_slots);
        let shared = Arc::new(RemoteShared {
            id,
            token: Uuid::new_v4(),
            type_name,
            object,
            members,
            ctx,
            apply_lock: tokio::sync::Mutex::new(()),
            applying: Mutex::new(None),
            in_flight: Arc::new(AtomicUsize::new(0)),
            awaiting: AtomicUsize::new(0),
            slots,
            custom_handlers: DashMap::new(),
            self_reporting: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        });

        debug!(
            "🔧 Wrapped {} '{}' ({} annotated members)",
            shared.type_name,
            shared.id,
            shared.members.len()
        );

        Self { shared }
    }

    /// Hands the object its interception hook. Only a registered remote may
    /// do this; the hook replaces any the object held before.
    pub(crate) fn attach(&self) {
        let self_reporting = lock_object(&self.shared.object).attach_hook(self.hook());
        self.shared.self_reporting.store(self_reporting, Ordering::SeqCst);
        debug!("🪝 '{}' attached (self-reporting: {})", self.shared.id, self_reporting);
    }

    /// Whether this remote wraps `object` itself, not a copy of it.
    pub fn wraps(&self, object: &SharedObject) -> bool {
        Arc::as_ptr(&self.shared.object) as *const () == Arc::as_ptr(object) as *const ()
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Registration token; distinguishes this remote from a later one
    /// registered under the same id.
    pub fn token(&self) -> Uuid {
        self.shared.token
    }

    pub fn type_name(&self) -> &str {
        &self.shared.type_name
    }

    pub fn mode(&self) -> RemotingMode {
        self.shared.ctx.mode
    }

    /// Looks up an annotated member by name.
    pub fn member(&self, name: &str) -> Result<ResolvedMember, RemotingError> {
        self.shared.members.get(name).cloned().ok_or_else(|| RemotingError::UnknownMember {
            instance_id: self.shared.id.clone(),
            member: name.to_string(),
        })
    }

    /// Every annotated member of the wrapped object.
    pub fn members(&self) -> Vec<ResolvedMember> {
        let mut members: Vec<_> = self.shared.members.values().cloned().collect();
        members.sort_by(|a, b| a.name.cmp(&b.name));
        members
    }

    pub fn signature(&self, member: &str) -> MemberSignature {
        MemberSignature::new(self.shared.id.as_str(), member)
    }

    /// The wrapped object.
    pub fn object(&self) -> SharedObject {
        self.shared.object.clone()
    }

    pub fn state(&self) -> RemoteState {
        let applying = self
            .shared
            .applying
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some();

        if applying {
            RemoteState::ApplyingRemote
        } else if self.shared.in_flight.load(Ordering::SeqCst) > 0
            || self.shared.awaiting.load(Ordering::SeqCst) > 0
        {
            RemoteState::Sending
        } else {
            RemoteState::Idle
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    /// Whether the object reports its own mutations through the hook.
    pub fn is_self_reporting(&self) -> bool {
        self.shared.self_reporting.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_live(&self) -> Result<(), RemotingError> {
        if self.is_disposed() {
            Err(RemotingError::Disposed(self.shared.id.clone()))
        } else {
            Ok(())
        }
    }

    pub(crate) fn enqueue(&self, message: RemoteMessage) -> Result<(), RemotingError> {
        self.ensure_live()?;
        self.shared
            .ctx
            .outbound
            .enqueue(message, Some(self.shared.in_flight.clone()))
    }

    /// Reads a property straight from the object.
    pub fn get_property(&self, name: &str) -> Result<Value, MemberError> {
        lock_object(&self.shared.object).get_property(name)
    }

    /// Sets a property on the object and propagates it when eligible. The
    /// local write always happens first and is never blocked by remoting.
    pub fn set_property(&self, name: &str, value: Value) -> Result<InterceptOutcome, MemberError> {
        let old = {
            let mut object = lock_object(&self.shared.object);
            let old = object.get_property(name)?;
            object.set_property(name, value.clone())?;
            old
        };

        if self.is_self_reporting() {
            return Ok(InterceptOutcome::Delegated);
        }
        Ok(self.intercept_property_set(name, &old, &value))
    }

    /// Invokes a method on the object and propagates the call when eligible.
    pub fn invoke(&self, name: &str, arguments: Vec<Value>) -> Result<(Value, InterceptOutcome), MemberError> {
        let result = lock_object(&self.shared.object).invoke(name, arguments.clone())?;

        if self.is_self_reporting() {
            return Ok((result, InterceptOutcome::Delegated));
        }
        let outcome = self.intercept_method_call(name, &arguments);
        Ok((result, outcome))
    }

    /// Raises an event on the object and propagates it when eligible.
    pub fn raise_event(&self, name: &str, arguments: Vec<Value>) -> Result<InterceptOutcome, MemberError> {
        lock_object(&self.shared.object).invoke(name, arguments.clone())?;

        if self.is_self_reporting() {
            return Ok(InterceptOutcome::Delegated);
        }
        Ok(self.hook().event_raised(name, &arguments))
    }

    pub(super) fn hook(&self) -> MemberHook {
        MemberHook::new(Arc::downgrade(&self.shared))
    }

    /// Publishes the current value of every property this endpoint may
    /// send. Returns the number of messages queued.
    pub fn sync_properties(&self) -> Result<usize, RemotingError> {
        self.ensure_live()?;

        let mut properties: Vec<&ResolvedMember> = self
            .shared
            .members
            .values()
            .filter(|m| m.kind == MemberKind::Property && should_propagate(self.mode(), m.direction))
            .collect();
        properties.sort_by(|a, b| a.name.cmp(&b.name));

        let mut queued = 0;
        for member in properties {
            let value = self.get_property(&member.name).map_err(|source| RemotingError::RemoteApply {
                signature: self.signature(&member.name).encode(),
                source,
            })?;
            self.enqueue(RemoteMessage::property_change(&self.signature(&member.name), value))?;
            queued += 1;
        }

        debug!("🔄 Synced {} properties of '{}'", queued, self.shared.id);
        Ok(queued)
    }

    /// Sends an application-defined message to the peer's instance with the
    /// same id.
    pub fn send_custom(
        &self,
        action_name: &str,
        target_name: &str,
        payload: Value,
    ) -> Result<(), RemotingError> {
        let message = RemoteMessage::custom(self.shared.id.as_str(), target_name, action_name, payload);
        message.validate()?;
        self.enqueue(message)
    }

    /// Registers the handler for inbound custom messages named `action_name`,
    /// replacing any previous one.
    pub fn on_custom<F>(&self, action_name: impl Into<String>, handler: F)
    where
        F: Fn(&CustomMessage) -> Result<(), MemberError> + Send + Sync + 'static,
    {
        self.shared
            .custom_handlers
            .insert(action_name.into(), Arc::new(handler));
    }

    /// Unregisters the instance and cancels every pending slot wait. Safe to
    /// call more than once.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(registry) = self.shared.ctx.registry.upgrade() {
            registry.unregister_instance(&self.shared.id, self.shared.token);
        }

        let cancelled_waiters = self.shared.slots.cancel_all();
        self.shared.custom_handlers.clear();

        info!(
            "🧹 Disposed remote '{}' ({} waiters cancelled)",
            self.shared.id, cancelled_waiters
        );
        self.shared.ctx.diagnostics.emit(DiagnosticKind::InstanceDisposed {
            instance_id: self.shared.id.clone(),
            cancelled_waiters,
        });
    }
}
