use super::*;
use serde_json::json;

fn all_actions() -> [MessageAction; 6] {
    [
        MessageAction::None,
        MessageAction::MethodCall,
        MessageAction::PropertyChange,
        MessageAction::RemoteDataProxy,
        MessageAction::ExceptionThrown,
        MessageAction::Custom,
    ]
}

#[test]
fn test_constructors_set_matching_action() {
    let sig = MemberSignature::new("track-1", "Name");
    let messages = [
        RemoteMessage::none("track-1", "Name"),
        RemoteMessage::method_call(&sig, vec![json!(1)], None),
        RemoteMessage::property_change(&sig, json!("Foo")),
        RemoteMessage::data_proxy("track-1", "slot-1", json!(42)),
        RemoteMessage::exception_thrown("track-1", "slot-1", None, ExceptionInfo::new("E", "boom")),
        RemoteMessage::custom("track-1", "Name", "refresh", json!({})),
    ];

    for message in &messages {
        assert_eq!(message.header().action, message.kind());
        assert!(message.validate().is_ok(), "{message:?} should validate");
    }
}

#[test]
fn test_member_bound_constructors_fill_signature() {
    let sig = MemberSignature::new("track-1", "Name");
    let message = RemoteMessage::property_change(&sig, json!("Foo"));

    assert_eq!(message.member_instance_id(), "track-1");
    assert_eq!(message.target_name(), "Name");
    assert_eq!(message.target_member_signature(), Some("track-1.Name"));
}

#[test]
fn test_from_envelope_leaves_payload_empty() {
    for action in all_actions() {
        let mut header = MessageHeader::new("track-1", "target", action);
        if action == MessageAction::Custom {
            header.custom_action_name = Some("refresh".to_string());
        }
        let message = RemoteMessage::from_envelope(header.clone());

        assert_eq!(message.kind(), action);
        assert_eq!(message.header(), &header);
        assert!(message.validate().is_ok());

        match message {
            RemoteMessage::None(_) => {}
            RemoteMessage::MethodCall(m) => {
                assert!(m.target_member_signature.is_empty());
                assert!(m.arguments.is_empty());
                assert!(m.response_slot.is_none());
            }
            RemoteMessage::PropertyChange(m) => {
                assert!(m.target_member_signature.is_empty());
                assert!(m.value.is_null());
            }
            RemoteMessage::DataProxy(m) => assert!(m.result.is_null()),
            RemoteMessage::ExceptionThrown(m) => {
                assert!(m.target_member_signature.is_none());
                assert!(m.exception.message.is_empty());
            }
            RemoteMessage::Custom(m) => assert!(m.payload.is_null()),
        }
    }
}

#[test]
fn test_validate_rejects_mismatched_action() {
    let mut header = MessageHeader::new("track-1", "Name", MessageAction::PropertyChange);
    header.action = MessageAction::MethodCall;
    let message = RemoteMessage::PropertyChange(PropertyChangeMessage {
        header,
        target_member_signature: "track-1.Name".to_string(),
        value: json!(1),
    });

    let err = message.validate().unwrap_err();
    assert_eq!(err.kind(), "invalid_message");
}

#[test]
fn test_custom_action_name_rules() {
    let mut header = MessageHeader::new("track-1", "Name", MessageAction::Custom);
    assert!(RemoteMessage::from_envelope(header.clone()).validate().is_err());

    header.custom_action_name = Some(String::new());
    assert!(RemoteMessage::from_envelope(header.clone()).validate().is_err());

    let mut stray = MessageHeader::new("track-1", "Name", MessageAction::None);
    stray.custom_action_name = Some("refresh".to_string());
    assert!(RemoteMessage::None(stray).validate().is_err());
}

#[test]
fn test_action_from_str() {
    for action in all_actions() {
        assert_eq!(action.as_str().parse::<MessageAction>().unwrap(), action);
    }

    let err = "Teleport".parse::<MessageAction>().unwrap_err();
    assert!(matches!(err, RemotingError::UnsupportedMessageKind(ref kind) if kind == "Teleport"));
}
