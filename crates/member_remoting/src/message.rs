//! # Remote Member Messages
//!
//! Wire message types exchanged between the two endpoints of a link. Every
//! message shares the [`MessageHeader`] envelope; its `action` field is the
//! discriminator that decides which concrete payload accompanies it:
//!
//! | action            | payload                                   |
//! |-------------------|-------------------------------------------|
//! | `None`            | nothing, the message is inert             |
//! | `MethodCall`      | signature, ordered arguments, reply slot  |
//! | `PropertyChange`  | signature, new value                      |
//! | `RemoteDataProxy` | result for the slot named by `targetName` |
//! | `ExceptionThrown` | exception description                     |
//! | `Custom`          | opaque payload, `customActionName`        |
//!
//! The types here are plain data. Choosing the concrete type for incoming
//! bytes is the converter's job (see [`crate::converter`]).

use crate::error::RemotingError;
use crate::signature::MemberSignature;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Discriminator of the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageAction {
    None,
    MethodCall,
    PropertyChange,
    RemoteDataProxy,
    ExceptionThrown,
    Custom,
}

impl MessageAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageAction::None => "None",
            MessageAction::MethodCall => "MethodCall",
            MessageAction::PropertyChange => "PropertyChange",
            MessageAction::RemoteDataProxy => "RemoteDataProxy",
            MessageAction::ExceptionThrown => "ExceptionThrown",
            MessageAction::Custom => "Custom",
        }
    }
}

impl fmt::Display for MessageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageAction {
    type Err = RemotingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(MessageAction::None),
            "MethodCall" => Ok(MessageAction::MethodCall),
            "PropertyChange" => Ok(MessageAction::PropertyChange),
            "RemoteDataProxy" => Ok(MessageAction::RemoteDataProxy),
            "ExceptionThrown" => Ok(MessageAction::ExceptionThrown),
            "Custom" => Ok(MessageAction::Custom),
            other => Err(RemotingError::UnsupportedMessageKind(other.to_string())),
        }
    }
}

/// Fields shared by every message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeader {
    /// Id of the owning registered instance
    pub member_instance_id: String,
    /// Member name, member signature or slot id depending on the action
    pub target_name: String,
    pub action: MessageAction,
    /// Present only when `action` is `Custom`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_action_name: Option<String>,
}

impl MessageHeader {
    pub fn new(
        member_instance_id: impl Into<String>,
        target_name: impl Into<String>,
        action: MessageAction,
    ) -> Self {
        Self {
            member_instance_id: member_instance_id.into(),
            target_name: target_name.into(),
            action,
            custom_action_name: None,
        }
    }
}

/// Serialized description of a failure raised on the other side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    #[serde(rename = "type")]
    pub type_name: String,
    pub message: String,
}

impl ExceptionInfo {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ExceptionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodCallMessage {
    #[serde(flatten)]
    pub header: MessageHeader,
    pub target_member_signature: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
    /// Slot the caller waits on for the result, if it awaits one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_slot: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyChangeMessage {
    #[serde(flatten)]
    pub header: MessageHeader,
    pub target_member_signature: String,
    #[serde(default)]
    pub value: Value,
}

/// Request/response payload; `header.target_name` is the slot id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataProxyMessage {
    #[serde(flatten)]
    pub header: MessageHeader,
    #[serde(default)]
    pub result: Value,
}

/// A failure echoed back to the originator; `header.target_name` is the
/// reply slot when the caller awaits one, otherwise the member signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionThrownMessage {
    #[serde(flatten)]
    pub header: MessageHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_member_signature: Option<String>,
    pub exception: ExceptionInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomMessage {
    #[serde(flatten)]
    pub header: MessageHeader,
    #[serde(default)]
    pub payload: Value,
}

/// Any message that can travel over a link.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteMessage {
    None(MessageHeader),
    MethodCall(MethodCallMessage),
    PropertyChange(PropertyChangeMessage),
    DataProxy(DataProxyMessage),
    ExceptionThrown(ExceptionThrownMessage),
    Custom(CustomMessage),
}

impl RemoteMessage {
    /// An inert message. Applying it has no effect.
    pub fn none(member_instance_id: impl Into<String>, target_name: impl Into<String>) -> Self {
        RemoteMessage::None(MessageHeader::new(member_instance_id, target_name, MessageAction::None))
    }

    pub fn method_call(
        signature: &MemberSignature,
        arguments: Vec<Value>,
        response_slot: Option<String>,
    ) -> Self {
        RemoteMessage::MethodCall(MethodCallMessage {
            header: MessageHeader::new(
                signature.instance_id(),
                signature.member_name(),
                MessageAction::MethodCall,
            ),
            target_member_signature: signature.encode(),
            arguments,
            response_slot,
        })
    }

    pub fn property_change(signature: &MemberSignature, value: Value) -> Self {
        RemoteMessage::PropertyChange(PropertyChangeMessage {
            header: MessageHeader::new(
                signature.instance_id(),
                signature.member_name(),
                MessageAction::PropertyChange,
            ),
            target_member_signature: signature.encode(),
            value,
        })
    }

    pub fn data_proxy(member_instance_id: impl Into<String>, slot: impl Into<String>, result: Value) -> Self {
        RemoteMessage::DataProxy(DataProxyMessage {
            header: MessageHeader::new(member_instance_id, slot, MessageAction::RemoteDataProxy),
            result,
        })
    }

    pub fn exception_thrown(
        member_instance_id: impl Into<String>,
        target_name: impl Into<String>,
        target_member_signature: Option<String>,
        exception: ExceptionInfo,
    ) -> Self {
        RemoteMessage::ExceptionThrown(ExceptionThrownMessage {
            header: MessageHeader::new(member_instance_id, target_name, MessageAction::ExceptionThrown),
            target_member_signature,
            exception,
        })
    }

    pub fn custom(
        member_instance_id: impl Into<String>,
        target_name: impl Into<String>,
        custom_action_name: impl Into<String>,
        payload: Value,
    ) -> Self {
        let mut header = MessageHeader::new(member_instance_id, target_name, MessageAction::Custom);
        header.custom_action_name = Some(custom_action_name.into());
        RemoteMessage::Custom(CustomMessage { header, payload })
    }

    /// Builds the concrete message type selected by `header.action`, with
    /// every payload field left empty.
    pub fn from_envelope(header: MessageHeader) -> Self {
        match header.action {
            MessageAction::None => RemoteMessage::None(header),
            MessageAction::MethodCall => RemoteMessage::MethodCall(MethodCallMessage {
                header,
                target_member_signature: String::new(),
                arguments: Vec::new(),
                response_slot: None,
            }),
            MessageAction::PropertyChange => RemoteMessage::PropertyChange(PropertyChangeMessage {
                header,
                target_member_signature: String::new(),
                value: Value::Null,
            }),
            MessageAction::RemoteDataProxy => RemoteMessage::DataProxy(DataProxyMessage {
                header,
                result: Value::Null,
            }),
            MessageAction::ExceptionThrown => RemoteMessage::ExceptionThrown(ExceptionThrownMessage {
                header,
                target_member_signature: None,
                exception: ExceptionInfo::new(String::new(), String::new()),
            }),
            MessageAction::Custom => RemoteMessage::Custom(CustomMessage {
                header,
                payload: Value::Null,
            }),
        }
    }

    pub fn header(&self) -> &MessageHeader {
        match self {
            RemoteMessage::None(header) => header,
            RemoteMessage::MethodCall(m) => &m.header,
            RemoteMessage::PropertyChange(m) => &m.header,
            RemoteMessage::DataProxy(m) => &m.header,
            RemoteMessage::ExceptionThrown(m) => &m.header,
            RemoteMessage::Custom(m) => &m.header,
        }
    }

    /// The action implied by the concrete type.
    pub fn kind(&self) -> MessageAction {
        match self {
            RemoteMessage::None(_) => MessageAction::None,
            RemoteMessage::MethodCall(_) => MessageAction::MethodCall,
            RemoteMessage::PropertyChange(_) => MessageAction::PropertyChange,
            RemoteMessage::DataProxy(_) => MessageAction::RemoteDataProxy,
            RemoteMessage::ExceptionThrown(_) => MessageAction::ExceptionThrown,
            RemoteMessage::Custom(_) => MessageAction::Custom,
        }
    }

    pub fn member_instance_id(&self) -> &str {
        &self.header().member_instance_id
    }

    pub fn target_name(&self) -> &str {
        &self.header().target_name
    }

    /// Signature of the addressed member, for member-bound messages.
    pub fn target_member_signature(&self) -> Option<&str> {
        match self {
            RemoteMessage::MethodCall(m) => Some(&m.target_member_signature),
            RemoteMessage::PropertyChange(m) => Some(&m.target_member_signature),
            RemoteMessage::ExceptionThrown(m) => m.target_member_signature.as_deref(),
            _ => None,
        }
    }

    /// Checks that the header's action agrees with the concrete type and
    /// that `customActionName` is present exactly for `Custom`.
    pub fn validate(&self) -> Result<(), RemotingError> {
        let header = self.header();
        if header.action != self.kind() {
            return Err(RemotingError::InvalidMessage(format!(
                "header action {} does not match {} payload",
                header.action,
                self.kind()
            )));
        }

        match (&header.custom_action_name, header.action) {
            (Some(name), MessageAction::Custom) if !name.is_empty() => Ok(()),
            (_, MessageAction::Custom) => Err(RemotingError::InvalidMessage(
                "custom message requires a non-empty customActionName".to_string(),
            )),
            (Some(_), action) => Err(RemotingError::InvalidMessage(format!(
                "customActionName is only allowed on Custom messages, found on {action}"
            ))),
            (None, _) => Ok(()),
        }
    }
}

// Tests module
#[cfg(test)]
mod tests;
