/// Outbound interception: deciding whether a local mutation goes to the peer
use super::core::{MemberRemote, RemoteShared};
use super::InterceptOutcome;
use crate::direction::should_propagate;
use crate::member::MemberKind;
use crate::message::RemoteMessage;
use crate::signature::MemberSignature;
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use tracing::{trace, warn};

/// Callback handed to a wrapped object so it can report its own mutations.
///
/// The hook holds only a weak reference: once the remote is disposed or
/// dropped, every call reports [`InterceptOutcome::Detached`] and the object
/// keeps working locally.
#[derive(Clone)]
pub struct MemberHook {
    shared: Weak<RemoteShared>,
}

impl std::fmt::Debug for MemberHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id = self.shared.upgrade().map(|shared| shared.id.clone());
        f.debug_struct("MemberHook").field("instance_id", &id).finish()
    }
}

impl MemberHook {
    pub(super) fn new(shared: Weak<RemoteShared>) -> Self {
        Self { shared }
    }

    /// A hook bound to nothing. Every call reports `Detached`.
    pub fn detached() -> Self {
        Self { shared: Weak::new() }
    }

    fn remote(&self) -> Option<MemberRemote> {
        self.shared.upgrade().map(|shared| MemberRemote { shared })
    }

    /// Reports that property `member` changed from `old` to `new`.
    pub fn property_changed(&self, member: &str, old: &Value, new: &Value) -> InterceptOutcome {
        match self.remote() {
            Some(remote) => remote.intercept_property_set(member, old, new),
            None => InterceptOutcome::Detached,
        }
    }

    /// Reports that method `member` was invoked with `arguments`.
    pub fn method_called(&self, member: &str, arguments: &[Value]) -> InterceptOutcome {
        match self.remote() {
            Some(remote) => remote.intercept_call(member, MemberKind::Method, arguments),
            None => InterceptOutcome::Detached,
        }
    }

    /// Reports that event `member` was raised with `arguments`.
    pub fn event_raised(&self, member: &str, arguments: &[Value]) -> InterceptOutcome {
        match self.remote() {
            Some(remote) => remote.intercept_call(member, MemberKind::Event, arguments),
            None => InterceptOutcome::Detached,
        }
    }
}

enum Gate {
    Open(MemberSignature),
    Closed(InterceptOutcome),
}

impl MemberRemote {
    /// Called when an annotated property changes locally. Never blocks the
    /// write itself, which has already happened.
    pub fn intercept_property_set(&self, member: &str, old: &Value, new: &Value) -> InterceptOutcome {
        let signature = match self.gate(member, MemberKind::Property) {
            Gate::Open(signature) => signature,
            Gate::Closed(outcome) => return outcome,
        };

        if old == new {
            trace!("'{}' unchanged, nothing to send", signature);
            return InterceptOutcome::Unchanged;
        }

        self.queue(RemoteMessage::property_change(&signature, new.clone()))
    }

    /// Called when an annotated method is invoked locally.
    pub fn intercept_method_call(&self, member: &str, arguments: &[Value]) -> InterceptOutcome {
        self.intercept_call(member, MemberKind::Method, arguments)
    }

    pub(super) fn intercept_call(&self, member: &str, kind: MemberKind, arguments: &[Value]) -> InterceptOutcome {
        match self.gate(member, kind) {
            Gate::Open(signature) => {
                self.queue(RemoteMessage::method_call(&signature, arguments.to_vec(), None))
            }
            Gate::Closed(outcome) => outcome,
        }
    }

    /// Checks, in order: liveness, annotation, echo suppression and
    /// direction.
    fn gate(&self, member: &str, kind: MemberKind) -> Gate {
        let shared: &Arc<RemoteShared> = &self.shared;

        if shared.disposed.load(Ordering::SeqCst) {
            return Gate::Closed(InterceptOutcome::Detached);
        }

        let resolved = match shared.members.get(member) {
            Some(resolved) if resolved.kind == kind => resolved,
            _ => return Gate::Closed(InterceptOutcome::NotRemotable),
        };

        let applying = shared
            .applying
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_deref()
            == Some(member);
        if applying {
            trace!("🔇 Suppressed echo of '{}' on '{}'", member, shared.id);
            return Gate::Closed(InterceptOutcome::Suppressed);
        }

        if !should_propagate(shared.ctx.mode, resolved.direction) {
            trace!(
                "'{}' on '{}' is {} and {} may not send it",
                member,
                shared.id,
                resolved.direction,
                shared.ctx.mode
            );
            return Gate::Closed(InterceptOutcome::NotPermitted);
        }

        Gate::Open(self.signature(member))
    }

    fn queue(&self, message: RemoteMessage) -> InterceptOutcome {
        match self.enqueue(message) {
            Ok(()) => InterceptOutcome::Sent,
            Err(e) => {
                warn!("⚠️ Could not queue change for '{}': {}", self.id(), e);
                InterceptOutcome::Failed
            }
        }
    }
}
