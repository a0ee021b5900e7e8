//! # Member Remoting
//!
//! Keeps two copies of an object graph, one on a **host** and one on a
//! **client**, in step by mirroring individual member operations across a
//! byte transport: property assignments, method calls and raised events.
//!
//! ## Core Features
//!
//! - **Per-member direction**: every remoted member declares whether it flows
//!   host-to-client, client-to-host, both ways, or not at all. Inbound
//!   messages that contradict the declared direction are rejected.
//! - **No echo**: applying a peer's change never re-sends it.
//! - **Fail closed**: anything malformed, misaddressed or unannotated is
//!   dropped and reported, and processing continues with the next frame.
//! - **Slot rendezvous**: named slots let one side wait for a value or an
//!   exception the other side publishes, with a timeout and cancellation.
//! - **Pluggable codec and transport** through [`MessageConverter`] and
//!   [`RemoteTransport`].
//!
//! ## Architecture Overview
//!
//! - [`RemotingLink`]: one end of a connection. Owns the registry, the
//!   outbound queue and the inbound dispatch.
//! - [`MemberRemote`]: the remoting wrapper around one shared object
//!   instance. Intercepts local changes and applies inbound ones.
//! - [`MemberRegistry`]: instance id to wrapper, and the member allow-lists.
//! - [`RemoteMessage`]: the five wire message kinds plus the `None` no-op.
//!
//! ## Quick Start Example
//!
//! ```rust,no_run
//! use member_remoting::*;
//! use std::sync::{Arc, Mutex};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), RemotingError> {
//!     let pair = create_link_pair("host", "client", RemotingConfig::default())?;
//!
//!     let host_track = Arc::new(Mutex::new(ExampleTrack::new("Intro")));
//!     let client_track = Arc::new(Mutex::new(ExampleTrack::new("Intro")));
//!     pair.host.remote("track-1", host_track.clone())?;
//!     let remote = pair.client.remote("track-1", client_track.clone())?;
//!
//!     // Mirrored to the client as a PropertyChange message
//!     host_track.lock().unwrap().set_name("Foo");
//!     pair.host.flush().await?;
//!
//!     // Runs on the host and waits for its reply
//!     let play_count = remote.call_remote("Play", vec![]).await?;
//!     println!("host play count is now {play_count}");
//!
//!     pair.client.shutdown().await?;
//!     pair.host.shutdown().await?;
//!     Ok(())
//! }
//! ```

// Core modules
pub mod config;
pub mod converter;
pub mod diagnostics;
pub mod direction;
pub mod error;
pub mod member;
pub mod message;
pub mod registry;
pub mod signature;
pub mod transport;

// Runtime
pub mod link;
pub mod remote;

pub mod examples;
pub mod utils;

#[cfg(test)]
mod test_integration;
#[cfg(test)]
mod testing;

// Configuration and errors
pub use config::RemotingConfig;
pub use error::{MemberError, RemotingError};

// Wire model
pub use converter::{CompressedMessageConverter, JsonMessageConverter, MessageConverter};
pub use message::{
    CustomMessage, DataProxyMessage, ExceptionInfo, ExceptionThrownMessage, MessageAction, MessageHeader,
    MethodCallMessage, PropertyChangeMessage, RemoteMessage,
};
pub use signature::{encode_signature, MemberSignature, SIGNATURE_SEPARATOR};

// Directions and members
pub use direction::{accepts_inbound, resolve_direction, should_propagate, RemotingDirection, RemotingMode};
pub use member::{MemberDescriptor, MemberKind, RemotableObject, ResolvedMember};

// Runtime
pub use diagnostics::{DiagnosticEvent, DiagnosticKind};
pub use link::{LinkStats, RemotingLink};
pub use registry::{DuplicatePolicy, MemberRegistry};
pub use remote::{
    ApplyOutcome, CustomHandler, InterceptOutcome, MemberHook, MemberRemote, RemoteState, SharedObject,
};
pub use transport::{ChannelTransport, InboundFrame, RemoteTransport};

pub use examples::ExampleTrack;
pub use utils::{create_link_pair, current_timestamp, LinkPair};

// External dependencies that implementors of the seams need
pub use async_trait::async_trait;
pub use futures;
pub use serde::{Deserialize, Serialize};
pub use serde_json::{json, Value};
