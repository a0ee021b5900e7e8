//! # Remoting Errors
//!
//! Error types shared by every layer of the remoting engine. Per-message
//! failures (bad bytes, unknown targets, direction violations, apply
//! failures) are all recoverable: the link drops the message, records it and
//! keeps processing. Only the slot rendezvous API and awaited remote calls
//! surface errors to callers.

use crate::message::ExceptionInfo;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Errors produced by the remoting engine.
#[derive(Debug, thiserror::Error)]
pub enum RemotingError {
    /// Serialization failed when converting a message to bytes
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Malformed or unknown-shape bytes
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    /// The envelope carried an `action` this engine does not understand
    #[error("Unsupported message kind: {0}")]
    UnsupportedMessageKind(String),
    /// A member signature could not be parsed
    #[error("Invalid member signature '{signature}': {reason}")]
    InvalidSignature { signature: String, reason: String },
    /// A message violates the envelope invariants (action vs payload)
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    /// No instance is registered under the id
    #[error("Unknown instance: {0}")]
    UnknownInstance(String),
    /// The instance exists but has no remotable member with this name
    #[error("Unknown member '{member}' on instance '{instance_id}'")]
    UnknownMember { instance_id: String, member: String },
    /// The member's resolved direction does not permit this flow
    #[error("Direction violation on '{signature}': {reason}")]
    DirectionViolation { signature: String, reason: String },
    /// Argument count did not match the resolved method
    #[error("Argument mismatch on '{signature}': expected {expected}, got {actual}")]
    ArgumentMismatch {
        signature: String,
        expected: usize,
        actual: usize,
    },
    /// The local member failed while applying an inbound message
    #[error("Remote apply failed on '{signature}': {source}")]
    RemoteApply {
        signature: String,
        #[source]
        source: MemberError,
    },
    /// The peer reported a failure back through `ExceptionThrown`
    #[error("Remote exception {}: {}", .0.type_name, .0.message)]
    RemoteException(ExceptionInfo),
    /// A slot wait exceeded its deadline
    #[error("Timed out after {timeout:?} waiting for slot '{slot}'")]
    Timeout { slot: String, timeout: Duration },
    /// A slot wait was cancelled (disposal or external cancellation)
    #[error("Wait for slot '{0}' was cancelled")]
    Cancelled(String),
    /// An instance with this id is already registered on the link
    #[error("Instance already registered: {0}")]
    DuplicateInstance(String),
    /// The transport refused or failed to send
    #[error("Transport error: {0}")]
    Transport(String),
    /// Compression framing failed
    #[error("Compression error: {0}")]
    Compression(String),
    /// Inbound frame exceeds the configured limit
    #[error("Message of {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge { size: usize, limit: usize },
    /// A link was configured with unusable settings
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// The owning member remote has been disposed
    #[error("Member remote '{0}' has been disposed")]
    Disposed(String),
}

impl RemotingError {
    /// Short, stable name of the error kind, used by diagnostics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RemotingError::Serialization(_) => "serialization",
            RemotingError::Deserialization(_) => "deserialization",
            RemotingError::UnsupportedMessageKind(_) => "unsupported_message_kind",
            RemotingError::InvalidSignature { .. } => "invalid_signature",
            RemotingError::InvalidMessage(_) => "invalid_message",
            RemotingError::UnknownInstance(_) => "unknown_instance",
            RemotingError::UnknownMember { .. } => "unknown_member",
            RemotingError::DirectionViolation { .. } => "direction_violation",
            RemotingError::ArgumentMismatch { .. } => "argument_mismatch",
            RemotingError::RemoteApply { .. } => "remote_apply",
            RemotingError::RemoteException(_) => "remote_exception",
            RemotingError::Timeout { .. } => "timeout",
            RemotingError::Cancelled(_) => "cancelled",
            RemotingError::DuplicateInstance(_) => "duplicate_instance",
            RemotingError::Transport(_) => "transport",
            RemotingError::Compression(_) => "compression",
            RemotingError::MessageTooLarge { .. } => "message_too_large",
            RemotingError::InvalidConfig(_) => "invalid_config",
            RemotingError::Disposed(_) => "disposed",
        }
    }

    /// Returns true for wait outcomes (`Timeout`, `Cancelled`).
    pub fn is_wait_failure(&self) -> bool {
        matches!(self, RemotingError::Timeout { .. } | RemotingError::Cancelled(_))
    }
}

/// Failure raised by a domain object's member: the counterpart of a thrown
/// exception. Carries a type name so the peer can tell failures apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{type_name}: {message}")]
pub struct MemberError {
    pub type_name: String,
    pub message: String,
}

impl MemberError {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// The object is in a state where the operation makes no sense.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new("InvalidOperationException", message)
    }

    /// An argument or value was rejected.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new("ArgumentException", message)
    }

    /// The object does not implement the named member.
    pub fn missing_member(member: &str) -> Self {
        Self::new("MissingMemberException", format!("No member named '{member}'"))
    }

    /// Builds an error from a value that failed to (de)serialize.
    pub fn from_serde(err: serde_json::Error) -> Self {
        Self::new("SerializationException", err.to_string())
    }
}

impl From<MemberError> for ExceptionInfo {
    fn from(err: MemberError) -> Self {
        ExceptionInfo {
            type_name: err.type_name,
            message: err.message,
        }
    }
}

impl From<ExceptionInfo> for MemberError {
    fn from(info: ExceptionInfo) -> Self {
        MemberError {
            type_name: info.type_name,
            message: info.message,
        }
    }
}
