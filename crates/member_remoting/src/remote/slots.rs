/// Named-slot rendezvous for request/response exchanges
use super::core::MemberRemote;
use crate::config::RemotingConfig;
use crate::direction::RemotingDirection;
use crate::error::RemotingError;
use crate::member::MemberKind;
use crate::message::{ExceptionInfo, RemoteMessage};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace};
use uuid::Uuid;

pub(crate) type SlotResult = Result<Value, ExceptionInfo>;

/// Prefix of the private slots [`MemberRemote::call_remote`] waits on.
pub(crate) const CALL_SLOT_PREFIX: &str = "call:";

enum SlotEntry {
    /// Published before anyone waited
    Ready {
        result: SlotResult,
        stored_at: Instant,
        seq: u64,
    },
    Waiting(Vec<oneshot::Sender<SlotResult>>),
}

#[derive(Default)]
struct SlotMap {
    entries: HashMap<String, SlotEntry>,
    /// Set once by `cancel_all`; later waiters are cancelled at once
    closed: bool,
    next_seq: u64,
}

/// Per-instance slot table.
///
/// Values published before anyone waits are kept for at most `ready_ttl`,
/// and at most `max_ready` of them at a time; the oldest goes first.
pub(crate) struct SlotTable {
    slots: Mutex<SlotMap>,
    ready_ttl: Duration,
    max_ready: usize,
}

impl Default for SlotTable {
    fn default() -> Self {
        let config = RemotingConfig::default();
        Self::new(config.default_wait_timeout(), config.max_ready_slots)
    }
}

impl SlotTable {
    pub fn new(ready_ttl: Duration, max_ready: usize) -> Self {
        Self {
            slots: Mutex::new(SlotMap::default()),
            ready_ttl,
            max_ready,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotMap> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a waiter. A value published earlier is handed over at once.
    /// After [`SlotTable::cancel_all`] the waiter is cancelled immediately.
    pub fn subscribe(&self, slot: &str) -> oneshot::Receiver<SlotResult> {
        let (tx, rx) = oneshot::channel();
        let mut slots = self.lock();
        if slots.closed {
            return rx;
        }

        match slots.entries.remove(slot) {
            Some(SlotEntry::Ready { result, stored_at, .. }) if stored_at.elapsed() <= self.ready_ttl => {
                let _ = tx.send(result);
            }
            Some(SlotEntry::Waiting(mut waiters)) => {
                waiters.retain(|w| !w.is_closed());
                waiters.push(tx);
                slots.entries.insert(slot.to_string(), SlotEntry::Waiting(waiters));
            }
            _ => {
                slots.entries.insert(slot.to_string(), SlotEntry::Waiting(vec![tx]));
            }
        }
        rx
    }

    /// Delivers `result` to every live waiter of `slot`, or keeps it for the
    /// next waiter when there is none. Returns the number of waiters reached.
    pub fn publish(&self, slot: &str, result: SlotResult) -> usize {
        self.fulfil(slot, result, true)
    }

    /// Like [`SlotTable::publish`] but never keeps an undelivered result.
    pub fn deliver(&self, slot: &str, result: SlotResult) -> usize {
        self.fulfil(slot, result, false)
    }

    fn fulfil(&self, slot: &str, result: SlotResult, keep: bool) -> usize {
        let mut slots = self.lock();
        if slots.closed {
            return 0;
        }

        let delivered = match slots.entries.remove(slot) {
            Some(SlotEntry::Waiting(waiters)) => waiters
                .into_iter()
                .filter_map(|waiter| waiter.send(result.clone()).ok())
                .count(),
            Some(ready @ SlotEntry::Ready { .. }) if !keep => {
                slots.entries.insert(slot.to_string(), ready);
                0
            }
            _ => 0,
        };

        if delivered == 0 && keep && self.max_ready > 0 {
            self.make_room(&mut slots.entries);
            let seq = slots.next_seq;
            slots.next_seq += 1;
            slots.entries.insert(
                slot.to_string(),
                SlotEntry::Ready {
                    result,
                    stored_at: Instant::now(),
                    seq,
                },
            );
        }
        delivered
    }

    /// Drops expired ready values, then the oldest ones until another fits.
    fn make_room(&self, entries: &mut HashMap<String, SlotEntry>) {
        let ttl = self.ready_ttl;
        entries.retain(|_, entry| match entry {
            SlotEntry::Ready { stored_at, .. } => stored_at.elapsed() <= ttl,
            SlotEntry::Waiting(_) => true,
        });

        let mut ready: Vec<(u64, String)> = entries
            .iter()
            .filter_map(|(slot, entry)| match entry {
                SlotEntry::Ready { seq, .. } => Some((*seq, slot.clone())),
                SlotEntry::Waiting(_) => None,
            })
            .collect();
        if ready.len() < self.max_ready {
            return;
        }

        ready.sort_unstable();
        let excess = ready.len() + 1 - self.max_ready;
        for (_, slot) in ready.into_iter().take(excess) {
            trace!("🗑️ Evicting unclaimed slot '{}'", slot);
            entries.remove(&slot);
        }
    }

    /// Drops closed waiters of `slot` and the slot itself once empty.
    pub fn forget(&self, slot: &str) {
        let mut slots = self.lock();
        if let Some(SlotEntry::Waiting(waiters)) = slots.entries.get_mut(slot) {
            waiters.retain(|w| !w.is_closed());
            if waiters.is_empty() {
                slots.entries.remove(slot);
            }
        }
    }

    /// Drops every waiter, which wakes them with a cancellation, and closes
    /// the table. Returns how many were live.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<SlotEntry> = {
            let mut slots = self.lock();
            slots.closed = true;
            slots.entries.drain().map(|(_, entry)| entry).collect()
        };
        drained
            .iter()
            .map(|entry| match entry {
                SlotEntry::Waiting(waiters) => waiters.iter().filter(|w| !w.is_closed()).count(),
                SlotEntry::Ready { .. } => 0,
            })
            .sum()
    }

    pub fn has_waiters(&self, slot: &str) -> bool {
        matches!(
            self.lock().entries.get(slot),
            Some(SlotEntry::Waiting(waiters)) if waiters.iter().any(|w| !w.is_closed())
        )
    }

    /// Number of published values waiting to be claimed.
    pub fn ready_len(&self) -> usize {
        self.lock()
            .entries
            .values()
            .filter(|entry| matches!(entry, SlotEntry::Ready { .. }))
            .count()
    }
}

struct AwaitingGuard<'a>(&'a AtomicUsize);

impl<'a> AwaitingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for AwaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemberRemote {
    /// Waits for the peer to publish a value into `slot`. Fails with
    /// `Timeout` after `timeout`, with `Cancelled` if the remote is disposed
    /// meanwhile, and with `RemoteException` if the peer answered the slot
    /// with a failure.
    pub async fn wait_for_remote_data(&self, slot: &str, timeout: Duration) -> Result<Value, RemotingError> {
        self.wait_for_remote_data_until(slot, timeout, std::future::pending::<()>())
            .await
    }

    /// [`MemberRemote::wait_for_remote_data`] that also gives up, with
    /// `Cancelled`, as soon as `cancel` completes.
    pub async fn wait_for_remote_data_until<F>(
        &self,
        slot: &str,
        timeout: Duration,
        cancel: F,
    ) -> Result<Value, RemotingError>
    where
        F: Future<Output = ()>,
    {
        self.ensure_live()?;
        let receiver = self.shared.slots.subscribe(slot);
        self.await_slot(slot, receiver, timeout, cancel).await
    }

    /// Typed variant of [`MemberRemote::wait_for_remote_data`].
    pub async fn wait_for_remote_data_as<T: DeserializeOwned>(
        &self,
        slot: &str,
        timeout: Duration,
    ) -> Result<T, RemotingError> {
        let value = self.wait_for_remote_data(slot, timeout).await?;
        serde_json::from_value(value).map_err(|e| RemotingError::Deserialization(e.to_string()))
    }

    async fn await_slot<F>(
        &self,
        slot: &str,
        receiver: oneshot::Receiver<SlotResult>,
        timeout: Duration,
        cancel: F,
    ) -> Result<Value, RemotingError>
    where
        F: Future<Output = ()>,
    {
        let _awaiting = AwaitingGuard::enter(&self.shared.awaiting);
        trace!("⏳ '{}' waiting on slot '{}' ({:?})", self.id(), slot, timeout);

        let outcome = tokio::select! {
            received = receiver => match received {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(exception)) => Err(RemotingError::RemoteException(exception)),
                Err(_) => Err(RemotingError::Cancelled(slot.to_string())),
            },
            _ = tokio::time::sleep(timeout) => Err(RemotingError::Timeout {
                slot: slot.to_string(),
                timeout,
            }),
            _ = cancel => Err(RemotingError::Cancelled(slot.to_string())),
        };

        if outcome.is_err() {
            self.shared.slots.forget(slot);
        }
        outcome
    }

    /// Sends `value` to whoever waits on `slot` on the peer's instance with
    /// the same id.
    pub fn publish_data(&self, slot: &str, value: Value) -> Result<(), RemotingError> {
        self.enqueue(RemoteMessage::data_proxy(self.id(), slot, value))
    }

    /// Typed variant of [`MemberRemote::publish_data`].
    pub fn publish_data_as<T: Serialize>(&self, slot: &str, value: &T) -> Result<(), RemotingError> {
        self.publish_data(slot, serde_json::to_value(value)?)
    }

    /// Blocks until the peer calls [`MemberRemote::remote_release`] for
    /// `slot`. Uses the link's default timeout when `timeout` is `None`.
    pub async fn remote_wait(&self, slot: &str, timeout: Option<Duration>) -> Result<(), RemotingError> {
        let timeout = timeout.unwrap_or_else(|| self.shared.ctx.config.default_wait_timeout());
        self.wait_for_remote_data(slot, timeout).await.map(|_| ())
    }

    /// Releases a peer blocked in [`MemberRemote::remote_wait`] on `slot`.
    pub fn remote_release(&self, slot: &str) -> Result<(), RemotingError> {
        self.publish_data(slot, Value::Null)
    }

    /// Invokes a bidirectional method on the peer's instance and waits for
    /// its return value. A failure on the peer surfaces as
    /// [`RemotingError::RemoteException`].
    pub async fn call_remote(&self, member: &str, arguments: Vec<Value>) -> Result<Value, RemotingError> {
        self.ensure_live()?;
        let resolved = self.member(member)?;
        let signature = self.signature(member);

        if resolved.kind == MemberKind::Property {
            return Err(RemotingError::UnknownMember {
                instance_id: self.id().to_string(),
                member: member.to_string(),
            });
        }
        if resolved.direction != RemotingDirection::Bidirectional {
            return Err(RemotingError::DirectionViolation {
                signature: signature.encode(),
                reason: format!("awaited calls need a Bidirectional member, found {}", resolved.direction),
            });
        }
        if resolved.parameter_count != arguments.len() {
            return Err(RemotingError::ArgumentMismatch {
                signature: signature.encode(),
                expected: resolved.parameter_count,
                actual: arguments.len(),
            });
        }

        let slot = format!("{CALL_SLOT_PREFIX}{}", Uuid::new_v4());
        let receiver = self.shared.slots.subscribe(&slot);
        if let Err(e) = self.enqueue(RemoteMessage::method_call(&signature, arguments, Some(slot.clone()))) {
            self.shared.slots.forget(&slot);
            return Err(e);
        }

        debug!("📞 Awaiting '{}' through slot '{}'", signature, slot);
        let timeout = self.shared.ctx.config.default_wait_timeout();
        self.await_slot(&slot, receiver, timeout, std::future::pending::<()>())
            .await
    }
}
