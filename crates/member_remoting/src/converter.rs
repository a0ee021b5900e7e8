//! # Message Converter
//!
//! Turns [`RemoteMessage`] values into bytes and back. Deserialization is
//! two-phase: the bytes are parsed once into a JSON tree, the envelope's
//! `action` discriminator is read, and the tree is then decoded into the
//! concrete payload type that action selects. Unknown actions fail with
//! [`RemotingError::UnsupportedMessageKind`] instead of being guessed.
//!
//! Member signatures travel as ordinary JSON strings; their own escaping
//! (see [`crate::signature`]) keeps them unambiguous, so no sentinel tokens
//! are ever spliced into the payload.

use crate::error::RemotingError;
use crate::message::{MessageAction, RemoteMessage};
use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io::{Read, Write};
use tracing::{debug, trace};

/// Pluggable serializer for wire messages.
pub trait MessageConverter: Send + Sync + std::fmt::Debug {
    /// Serializes a message. Must be symmetric with [`MessageConverter::deserialize`].
    fn serialize(&self, message: &RemoteMessage) -> Result<Vec<u8>, RemotingError>;

    /// Deserializes bytes into the concrete message selected by `action`.
    fn deserialize(&self, data: &[u8]) -> Result<RemoteMessage, RemotingError>;
}

/// JSON converter. Field names are camelCase as documented on the wire types.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMessageConverter;

impl JsonMessageConverter {
    pub fn new() -> Self {
        Self
    }
}

impl MessageConverter for JsonMessageConverter {
    fn serialize(&self, message: &RemoteMessage) -> Result<Vec<u8>, RemotingError> {
        message.validate()?;

        let bytes = match message {
            RemoteMessage::None(header) => serde_json::to_vec(header)?,
            RemoteMessage::MethodCall(m) => serde_json::to_vec(m)?,
            RemoteMessage::PropertyChange(m) => serde_json::to_vec(m)?,
            RemoteMessage::DataProxy(m) => serde_json::to_vec(m)?,
            RemoteMessage::ExceptionThrown(m) => serde_json::to_vec(m)?,
            RemoteMessage::Custom(m) => serde_json::to_vec(m)?,
        };

        trace!("✅ Serialized {} message ({} bytes)", message.kind(), bytes.len());
        Ok(bytes)
    }

    fn deserialize(&self, data: &[u8]) -> Result<RemoteMessage, RemotingError> {
        let tree: Value = serde_json::from_slice(data).map_err(|e| {
            debug!(
                "🔴 Message bytes are not valid JSON: {} (preview: '{}')",
                e,
                preview(data)
            );
            RemotingError::Deserialization(e.to_string())
        })?;

        let action: MessageAction = tree
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RemotingError::Deserialization("envelope has no string 'action' field".to_string())
            })?
            .parse()?;

        let message = match action {
            MessageAction::None => RemoteMessage::None(decode(tree)?),
            MessageAction::MethodCall => RemoteMessage::MethodCall(decode(tree)?),
            MessageAction::PropertyChange => RemoteMessage::PropertyChange(decode(tree)?),
            MessageAction::RemoteDataProxy => RemoteMessage::DataProxy(decode(tree)?),
            MessageAction::ExceptionThrown => RemoteMessage::ExceptionThrown(decode(tree)?),
            MessageAction::Custom => RemoteMessage::Custom(decode(tree)?),
        };

        message
            .validate()
            .map_err(|e| RemotingError::Deserialization(e.to_string()))?;
        Ok(message)
    }
}

fn decode<T: DeserializeOwned>(tree: Value) -> Result<T, RemotingError> {
    serde_json::from_value(tree).map_err(|e| RemotingError::Deserialization(e.to_string()))
}

/// Printable preview of a payload for logs, truncated to 200 bytes.
pub(crate) fn preview(data: &[u8]) -> String {
    if data.len() > 200 {
        format!(
            "{}... (truncated {} bytes)",
            String::from_utf8_lossy(&data[..200]),
            data.len() - 200
        )
    } else {
        String::from_utf8_lossy(data).to_string()
    }
}

const FRAME_PLAIN: u8 = 0;
const FRAME_DEFLATE: u8 = 1;

/// Wraps another converter with a one-byte frame flag and deflates payloads
/// at or above `threshold` bytes. Both ends of a link must agree on using it.
#[derive(Debug, Clone)]
pub struct CompressedMessageConverter<C = JsonMessageConverter> {
    inner: C,
    threshold: usize,
    max_decoded_size: usize,
}

impl<C: MessageConverter> CompressedMessageConverter<C> {
    pub fn new(inner: C, threshold: usize, max_decoded_size: usize) -> Self {
        Self {
            inner,
            threshold,
            max_decoded_size,
        }
    }
}

impl<C: MessageConverter> MessageConverter for CompressedMessageConverter<C> {
    fn serialize(&self, message: &RemoteMessage) -> Result<Vec<u8>, RemotingError> {
        let body = self.inner.serialize(message)?;

        if body.len() < self.threshold {
            let mut framed = Vec::with_capacity(body.len() + 1);
            framed.push(FRAME_PLAIN);
            framed.extend_from_slice(&body);
            return Ok(framed);
        }

        let mut encoder = DeflateEncoder::new(vec![FRAME_DEFLATE], Compression::default());
        encoder
            .write_all(&body)
            .map_err(|e| RemotingError::Compression(e.to_string()))?;
        let framed = encoder
            .finish()
            .map_err(|e| RemotingError::Compression(e.to_string()))?;

        trace!("🗜️ Deflated {} bytes to {}", body.len(), framed.len());
        Ok(framed)
    }

    fn deserialize(&self, data: &[u8]) -> Result<RemoteMessage, RemotingError> {
        let (flag, body) = data
            .split_first()
            .ok_or_else(|| RemotingError::Deserialization("empty frame".to_string()))?;

        match *flag {
            FRAME_PLAIN => self.inner.deserialize(body),
            FRAME_DEFLATE => {
                let mut decoded = Vec::new();
                DeflateDecoder::new(body)
                    .take(self.max_decoded_size as u64 + 1)
                    .read_to_end(&mut decoded)
                    .map_err(|e| RemotingError::Deserialization(format!("inflate failed: {e}")))?;

                if decoded.len() > self.max_decoded_size {
                    return Err(RemotingError::MessageTooLarge {
                        size: decoded.len(),
                        limit: self.max_decoded_size,
                    });
                }
                self.inner.deserialize(&decoded)
            }
            other => Err(RemotingError::Deserialization(format!(
                "unknown frame flag {other}"
            ))),
        }
    }
}
