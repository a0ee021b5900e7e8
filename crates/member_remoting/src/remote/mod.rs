//! # Member Remote
//!
//! One [`MemberRemote`] wraps each registered object. It owns:
//!
//! - outbound change detection, through the [`MemberHook`] handed to the
//!   object and the forwarding wrappers on the remote itself;
//! - inbound application, serialized per instance;
//! - feedback-loop suppression: while a member is being applied from the
//!   wire, interception of that same member is swallowed;
//! - the named-slot rendezvous for request/response exchanges;
//! - disposal, which unregisters the instance and cancels every waiter.
//!
//! ```text
//!            local mutation                 inbound message
//!                  │                               │
//!   Idle ──► Sending (queued / awaiting) ──► Idle  │
//!   Idle ──► ApplyingRemote ◄──────────────────────┘ ──► Idle
//! ```

mod apply;
mod core;
mod intercept;
mod slots;

pub use self::core::{CustomHandler, MemberRemote, SharedObject};
pub(crate) use self::core::RemoteContext;
pub use intercept::MemberHook;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a member remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteState {
    /// Nothing pending
    Idle,
    /// Outbound messages queued or a response awaited
    Sending,
    /// Replaying an inbound message onto the object
    ApplyingRemote,
}

/// What interception did with a local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterceptOutcome {
    /// Queued for the peer
    Sent,
    /// The mutation is the effect of an inbound apply of the same member
    Suppressed,
    /// Old and new values are equal
    Unchanged,
    /// This endpoint's role may not send for the member's direction
    NotPermitted,
    /// The member is not annotated, or is of another kind
    NotRemotable,
    /// The object reported the mutation itself through its hook
    Delegated,
    /// The remote has been disposed or dropped
    Detached,
    /// Queueing failed
    Failed,
}

impl InterceptOutcome {
    pub fn was_sent(&self) -> bool {
        matches!(self, InterceptOutcome::Sent)
    }
}

/// Result of applying one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyOutcome {
    /// The local object or a slot was updated
    Applied,
    /// The property already held the incoming value
    Unchanged,
    /// A `None` message
    Inert,
}
