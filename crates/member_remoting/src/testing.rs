//! Test doubles shared by the unit and scenario tests.

use crate::config::RemotingConfig;
use crate::converter::{JsonMessageConverter, MessageConverter};
use crate::diagnostics::DiagnosticsSink;
use crate::direction::{RemotingDirection, RemotingMode};
use crate::error::{MemberError, RemotingError};
use crate::link::outbound::OutboundQueue;
use crate::link::stats::StatsTracker;
use crate::link::RemotingLink;
use crate::member::{MemberDescriptor, RemotableObject};
use crate::message::RemoteMessage;
use crate::registry::MemberRegistry;
use crate::remote::{ApplyOutcome, MemberRemote, RemoteContext};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Transport that records every frame instead of delivering it.
#[derive(Debug)]
pub struct RecordingTransport {
    local_endpoint: String,
    sent: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    fail: AtomicBool,
}

impl RecordingTransport {
    pub fn new(local_endpoint: &str) -> Self {
        Self {
            local_endpoint: local_endpoint.to_string(),
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent send fail.
    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Removes and returns every recorded frame.
    pub fn take_frames(&self) -> Vec<(String, Vec<u8>)> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    /// Decodes the recorded frames without removing them.
    pub fn sent_messages(&self) -> Vec<RemoteMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, data)| JsonMessageConverter.deserialize(data).unwrap())
            .collect()
    }
}

#[async_trait]
impl crate::transport::RemoteTransport for RecordingTransport {
    fn local_endpoint(&self) -> &str {
        &self.local_endpoint
    }

    async fn send(&self, endpoint_id: &str, data: Vec<u8>) -> Result<(), RemotingError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RemotingError::Transport("recording transport set to fail".to_string()));
        }
        self.sent.lock().unwrap().push((endpoint_id.to_string(), data));
        Ok(())
    }
}

/// A link whose outbound frames are captured by a [`RecordingTransport`].
pub fn recording_link(mode: RemotingMode, config: RemotingConfig) -> (Arc<RemotingLink>, Arc<RecordingTransport>) {
    let local = match mode {
        RemotingMode::Host => "host",
        RemotingMode::Client => "client",
    };
    let peer = match mode {
        RemotingMode::Host => "client",
        RemotingMode::Client => "host",
    };
    let transport = Arc::new(RecordingTransport::new(local));
    let link = RemotingLink::with_config(mode, transport.clone(), peer, config).unwrap();
    (Arc::new(link), transport)
}

/// Flushes `from`, then feeds every frame it recorded into `to`.
pub async fn pump(
    from: &RemotingLink,
    transport: &RecordingTransport,
    to: &RemotingLink,
) -> Vec<Result<ApplyOutcome, RemotingError>> {
    from.flush().await.unwrap();
    let mut results = Vec::new();
    for (_, data) in transport.take_frames() {
        results.push(to.on_data_received(from.local_endpoint(), &data).await);
    }
    results
}

/// A remote that is not attached to any running link: its outbound queue
/// is closed.
pub fn detached_remote(registry: &Arc<MemberRegistry>, id: &str) -> MemberRemote {
    let (outbound, receiver) = OutboundQueue::new();
    drop(receiver);
    let ctx = RemoteContext {
        mode: RemotingMode::Host,
        outbound,
        registry: Arc::downgrade(registry),
        config: Arc::new(RemotingConfig::default()),
        diagnostics: DiagnosticsSink::new(8),
        stats: Arc::new(StatsTracker::default()),
    };
    let object: crate::remote::SharedObject = Arc::new(Mutex::new(crate::examples::ExampleTrack::new(id)));
    MemberRemote::new(id, object, ctx)
}

/// An object that does not report its own changes, so the remote's
/// forwarding wrappers do. Members inherit the class direction.
#[derive(Debug, Default)]
pub struct PlainObject {
    pub properties: HashMap<String, Value>,
    pub calls: Vec<(String, Vec<Value>)>,
}

impl RemotableObject for PlainObject {
    fn type_name(&self) -> &str {
        "PlainObject"
    }

    fn class_direction(&self) -> Option<RemotingDirection> {
        Some(RemotingDirection::Bidirectional)
    }

    fn members(&self) -> Vec<MemberDescriptor> {
        vec![
            MemberDescriptor::property("Title"),
            MemberDescriptor::property("Secret").with_direction(RemotingDirection::None),
            MemberDescriptor::method("Echo", 1),
            MemberDescriptor::method("Explode", 0),
        ]
    }

    fn get_property(&self, name: &str) -> Result<Value, MemberError> {
        match name {
            "Title" | "Secret" => Ok(self.properties.get(name).cloned().unwrap_or(Value::Null)),
            other => Err(MemberError::missing_member(other)),
        }
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), MemberError> {
        match name {
            "Title" | "Secret" => {
                self.properties.insert(name.to_string(), value);
                Ok(())
            }
            other => Err(MemberError::missing_member(other)),
        }
    }

    fn invoke(&mut self, name: &str, arguments: Vec<Value>) -> Result<Value, MemberError> {
        self.calls.push((name.to_string(), arguments.clone()));
        match name {
            "Echo" => Ok(arguments.into_iter().next().unwrap_or(Value::Null)),
            "Explode" => panic!("kaboom"),
            other => Err(MemberError::missing_member(other)),
        }
    }
}

/// Builds a property change message for `id.member`.
pub fn property_change(id: &str, member: &str, value: Value) -> RemoteMessage {
    RemoteMessage::property_change(&crate::signature::MemberSignature::new(id, member), value)
}

/// Builds a call message for `id.member`.
pub fn method_call(id: &str, member: &str, arguments: Vec<Value>, response_slot: Option<&str>) -> RemoteMessage {
    RemoteMessage::method_call(
        &crate::signature::MemberSignature::new(id, member),
        arguments,
        response_slot.map(str::to_string),
    )
}

/// JSON encoding of a message, as the peer would send it.
pub fn encode(message: &RemoteMessage) -> Vec<u8> {
    JsonMessageConverter.serialize(message).unwrap()
}

pub fn shared<T: RemotableObject>(object: T) -> Arc<Mutex<T>> {
    Arc::new(Mutex::new(object))
}
