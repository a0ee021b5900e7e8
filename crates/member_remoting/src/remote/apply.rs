/// Inbound application: replaying peer messages onto the local object
use super::core::{lock_object, MemberRemote};
use super::slots::CALL_SLOT_PREFIX;
use super::ApplyOutcome;
use crate::diagnostics::DiagnosticKind;
use crate::direction::{accepts_inbound, RemotingDirection};
use crate::error::{MemberError, RemotingError};
use crate::member::{MemberKind, ResolvedMember};
use crate::message::{
    CustomMessage, DataProxyMessage, ExceptionInfo, ExceptionThrownMessage, MethodCallMessage,
    PropertyChangeMessage, RemoteMessage,
};
use crate::signature::MemberSignature;
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;
use tracing::{debug, error, trace, warn};

/// Marks a member as "being applied from the wire" for its lifetime.
struct ApplyingGuard<'a> {
    slot: &'a Mutex<Option<String>>,
}

impl<'a> ApplyingGuard<'a> {
    fn enter(slot: &'a Mutex<Option<String>>, member: &str) -> Self {
        *slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(member.to_string());
        Self { slot }
    }
}

impl Drop for ApplyingGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

/// Runs a member operation, turning a panic into a `MemberError`.
fn guarded<T>(operation: impl FnOnce() -> Result<T, MemberError>) -> Result<T, MemberError> {
    catch_unwind(AssertUnwindSafe(operation)).unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "member panicked".to_string());
        Err(MemberError::new("PanicException", message))
    })
}

impl MemberRemote {
    /// Applies one inbound message. Messages for the same instance are
    /// applied one at a time, in the order callers reach this point.
    ///
    /// Failures are returned, never raised: the link counts and reports them
    /// and goes on with the next message.
    pub async fn apply_inbound(&self, message: RemoteMessage) -> Result<ApplyOutcome, RemotingError> {
        self.ensure_live()?;
        if message.member_instance_id() != self.id() {
            return Err(RemotingError::InvalidMessage(format!(
                "message for '{}' routed to '{}'",
                message.member_instance_id(),
                self.id()
            )));
        }

        let _serialized = self.shared.apply_lock.lock().await;

        match message {
            RemoteMessage::None(_) => {
                trace!("Ignoring inert message for '{}'", self.id());
                Ok(ApplyOutcome::Inert)
            }
            RemoteMessage::PropertyChange(m) => self.apply_property_change(m),
            RemoteMessage::MethodCall(m) => self.apply_method_call(m),
            RemoteMessage::DataProxy(m) => Ok(self.apply_data_proxy(m)),
            RemoteMessage::ExceptionThrown(m) => Ok(self.apply_exception(m)),
            RemoteMessage::Custom(m) => self.apply_custom(m),
        }
    }

    /// Parses the signature and checks it against the allow-list and this
    /// endpoint's inbound policy.
    fn resolve_inbound(&self, signature: &str, kinds: &[MemberKind]) -> Result<ResolvedMember, RemotingError> {
        let parsed = MemberSignature::parse(signature)?;
        if parsed.instance_id() != self.id() {
            return Err(RemotingError::InvalidMessage(format!(
                "signature '{}' does not address instance '{}'",
                signature,
                self.id()
            )));
        }

        let member = self.member(parsed.member_name())?;
        if !kinds.contains(&member.kind) {
            return Err(RemotingError::UnknownMember {
                instance_id: self.id().to_string(),
                member: parsed.member_name().to_string(),
            });
        }

        if !accepts_inbound(self.mode(), member.direction) {
            warn!(
                "🚫 Rejected inbound '{}': {} member cannot be changed by the peer of a {}",
                signature,
                member.direction,
                self.mode()
            );
            self.shared.ctx.diagnostics.emit(DiagnosticKind::DirectionViolation {
                instance_id: self.id().to_string(),
                signature: signature.to_string(),
            });
            return Err(RemotingError::DirectionViolation {
                signature: signature.to_string(),
                reason: format!("{} does not accept {} inbound", self.mode(), member.direction),
            });
        }

        Ok(member)
    }

    fn apply_property_change(&self, message: PropertyChangeMessage) -> Result<ApplyOutcome, RemotingError> {
        let signature = message.target_member_signature;
        let member = self.resolve_inbound(&signature, &[MemberKind::Property])?;

        let result = {
            let mut object = lock_object(&self.shared.object);
            match guarded(|| object.get_property(&member.name)) {
                Ok(current) if current == message.value => {
                    trace!("'{}' already holds the incoming value", signature);
                    return Ok(ApplyOutcome::Unchanged);
                }
                Ok(_) => {
                    let _applying = ApplyingGuard::enter(&self.shared.applying, &member.name);
                    guarded(|| object.set_property(&member.name, message.value))
                }
                Err(e) => Err(e),
            }
        };

        match result {
            Ok(()) => {
                debug!("📥 Applied '{}'", signature);
                Ok(ApplyOutcome::Applied)
            }
            Err(e) => Err(self.apply_failed(&member, &signature, None, e)),
        }
    }

    fn apply_method_call(&self, message: MethodCallMessage) -> Result<ApplyOutcome, RemotingError> {
        let signature = message.target_member_signature;
        let member = self.resolve_inbound(&signature, &[MemberKind::Method, MemberKind::Event])?;

        if message.arguments.len() != member.parameter_count {
            return Err(RemotingError::ArgumentMismatch {
                signature,
                expected: member.parameter_count,
                actual: message.arguments.len(),
            });
        }

        let result = {
            let mut object = lock_object(&self.shared.object);
            let _applying = ApplyingGuard::enter(&self.shared.applying, &member.name);
            guarded(|| object.invoke(&member.name, message.arguments))
        };

        match result {
            Ok(value) => {
                debug!("📥 Applied call '{}'", signature);
                if let Some(slot) = message.response_slot {
                    self.reply(&member, &slot, value);
                }
                Ok(ApplyOutcome::Applied)
            }
            Err(e) => Err(self.apply_failed(&member, &signature, message.response_slot, e)),
        }
    }

    /// Returns a call's value to the waiting caller, when the member is
    /// bidirectional and thus has a reply path.
    fn reply(&self, member: &ResolvedMember, slot: &str, value: Value) {
        if member.direction != RemotingDirection::Bidirectional {
            debug!("Not answering slot '{}': '{}' is {}", slot, member.name, member.direction);
            return;
        }
        if let Err(e) = self.enqueue(RemoteMessage::data_proxy(self.id(), slot, value)) {
            warn!("⚠️ Could not answer slot '{}' on '{}': {}", slot, self.id(), e);
        }
    }

    /// Reports a member failure. Bidirectional members echo it to the
    /// originator; for others it is logged only.
    fn apply_failed(
        &self,
        member: &ResolvedMember,
        signature: &str,
        response_slot: Option<String>,
        source: MemberError,
    ) -> RemotingError {
        let echoed = member.direction == RemotingDirection::Bidirectional;
        error!("🔴 Applying '{}' failed: {}", signature, source);

        if echoed {
            let target = response_slot.unwrap_or_else(|| signature.to_string());
            let exception = ExceptionInfo::from(source.clone());
            match self.enqueue(RemoteMessage::exception_thrown(
                self.id(),
                target,
                Some(signature.to_string()),
                exception,
            )) {
                Ok(()) => self.shared.ctx.stats.record_exception_echoed(),
                Err(e) => warn!("⚠️ Could not echo failure of '{}': {}", signature, e),
            }
        }

        self.shared.ctx.diagnostics.emit(DiagnosticKind::RemoteApplyFailed {
            instance_id: self.id().to_string(),
            signature: signature.to_string(),
            exception_type: source.type_name.clone(),
            message: source.message.clone(),
            echoed,
        });

        RemotingError::RemoteApply {
            signature: signature.to_string(),
            source,
        }
    }

    fn apply_data_proxy(&self, message: DataProxyMessage) -> ApplyOutcome {
        let slot = message.header.target_name;
        // A call reply nobody waits for anymore can never be claimed
        let delivered = if slot.starts_with(CALL_SLOT_PREFIX) {
            self.shared.slots.deliver(&slot, Ok(message.result))
        } else {
            self.shared.slots.publish(&slot, Ok(message.result))
        };
        trace!("📬 Slot '{}' on '{}' filled ({} waiters)", slot, self.id(), delivered);
        ApplyOutcome::Applied
    }

    fn apply_exception(&self, message: ExceptionThrownMessage) -> ApplyOutcome {
        let target = message.header.target_name;
        let delivered = self.shared.slots.deliver(&target, Err(message.exception.clone()));

        if delivered == 0 {
            warn!(
                "⚠️ Peer reported {} for '{}' on '{}'",
                message.exception,
                message.target_member_signature.as_deref().unwrap_or(&target),
                self.id()
            );
            self.shared.ctx.diagnostics.emit(DiagnosticKind::RemoteExceptionReceived {
                instance_id: self.id().to_string(),
                target_name: target,
                exception_type: message.exception.type_name,
                message: message.exception.message,
            });
        }
        ApplyOutcome::Applied
    }

    fn apply_custom(&self, message: CustomMessage) -> Result<ApplyOutcome, RemotingError> {
        let action = message.header.custom_action_name.clone().unwrap_or_default();
        let handler = self
            .shared
            .custom_handlers
            .get(&action)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RemotingError::UnknownMember {
                instance_id: self.id().to_string(),
                member: format!("custom:{action}"),
            })?;

        guarded(|| handler(&message)).map_err(|source| {
            error!("🔴 Custom handler '{}' on '{}' failed: {}", action, self.id(), source);
            RemotingError::RemoteApply {
                signature: format!("custom:{action}"),
                source,
            }
        })?;
        Ok(ApplyOutcome::Applied)
    }
}
