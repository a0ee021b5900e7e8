//! # Remotable Members
//!
//! Metadata a domain object publishes about itself, standing in for
//! attribute annotations: each member declares its kind and, optionally, a
//! direction override. The class may declare a default direction that
//! applies to every member without an override.
//!
//! Domain objects implement [`RemotableObject`]; the engine only ever talks
//! to them through this trait, by member name.

use crate::direction::{resolve_direction, RemotingDirection};
use crate::error::MemberError;
use crate::remote::MemberHook;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberKind {
    Property,
    Method,
    Event,
}

/// A member as declared by the domain object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDescriptor {
    pub name: String,
    pub kind: MemberKind,
    /// Member-level override; `None` means "inherit the class default"
    pub direction: Option<RemotingDirection>,
    /// Number of parameters for methods and events, zero for properties
    pub parameter_count: usize,
}

impl MemberDescriptor {
    pub fn property(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Property,
            direction: None,
            parameter_count: 0,
        }
    }

    pub fn method(name: impl Into<String>, parameter_count: usize) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Method,
            direction: None,
            parameter_count,
        }
    }

    pub fn event(name: impl Into<String>, parameter_count: usize) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Event,
            direction: None,
            parameter_count,
        }
    }

    pub fn with_direction(mut self, direction: RemotingDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Resolves this member against the class default. Returns `None` when
    /// neither the member nor the class carries a direction annotation.
    pub fn resolve(&self, class_direction: Option<RemotingDirection>) -> Option<ResolvedMember> {
        if self.direction.is_none() && class_direction.is_none() {
            return None;
        }

        Some(ResolvedMember {
            name: self.name.clone(),
            kind: self.kind,
            direction: resolve_direction(self.direction, class_direction),
            parameter_count: self.parameter_count,
        })
    }
}

/// An annotated member with its effective direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMember {
    pub name: String,
    pub kind: MemberKind,
    pub direction: RemotingDirection,
    pub parameter_count: usize,
}

impl ResolvedMember {
    /// Whether the member participates in remoting at all.
    pub fn is_remoted(&self) -> bool {
        self.direction != RemotingDirection::None
    }
}

/// A live object that can be wrapped by a [`MemberRemote`](crate::remote::MemberRemote).
///
/// Property values and arguments are exchanged as JSON values so the engine
/// never needs the object's concrete types.
pub trait RemotableObject: Send + 'static {
    /// Stable name of the object's class, for logs and diagnostics.
    fn type_name(&self) -> &str;

    /// Class-level default direction.
    fn class_direction(&self) -> Option<RemotingDirection> {
        None
    }

    /// Every member the object exposes to the engine.
    fn members(&self) -> Vec<MemberDescriptor>;

    fn get_property(&self, name: &str) -> Result<Value, MemberError>;

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), MemberError>;

    /// Invokes a method or raises an event by name.
    fn invoke(&mut self, name: &str, arguments: Vec<Value>) -> Result<Value, MemberError>;

    /// Receives the interception hook when the object is wrapped. Objects
    /// that report their own mutations through the hook return `true`; the
    /// wrapper then leaves reporting to them instead of doing it itself.
    fn attach_hook(&mut self, hook: MemberHook) -> bool {
        let _ = hook;
        false
    }
}
