//! End-to-end scenarios: two links, one in each role, exchanging real
//! frames.

use super::*;
use crate::testing::{encode, property_change, recording_link, shared};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

async fn eventually<F: Fn() -> bool>(what: &str, check: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn linked_pair() -> LinkPair {
    create_link_pair("host", "client", RemotingConfig::default()).unwrap()
}

/// An object with a single property of a configurable direction.
#[derive(Debug)]
struct Directed {
    direction: RemotingDirection,
    value: Value,
}

impl RemotableObject for Directed {
    fn type_name(&self) -> &str {
        "Directed"
    }

    fn members(&self) -> Vec<MemberDescriptor> {
        vec![MemberDescriptor::property("Value").with_direction(self.direction)]
    }

    fn get_property(&self, name: &str) -> Result<Value, MemberError> {
        match name {
            "Value" => Ok(self.value.clone()),
            other => Err(MemberError::missing_member(other)),
        }
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), MemberError> {
        match name {
            "Value" => {
                self.value = value;
                Ok(())
            }
            other => Err(MemberError::missing_member(other)),
        }
    }

    fn invoke(&mut self, name: &str, _arguments: Vec<Value>) -> Result<Value, MemberError> {
        Err(MemberError::missing_member(name))
    }
}

#[tokio::test]
async fn test_property_change_propagates_to_client() {
    let (host, host_transport) = recording_link(RemotingMode::Host, RemotingConfig::default());
    let (client, _client_transport) = recording_link(RemotingMode::Client, RemotingConfig::default());

    let host_track = shared(ExampleTrack::new("Intro"));
    let client_track = shared(ExampleTrack::new("Intro"));
    host.remote("track-1", host_track.clone()).unwrap();
    client.remote("track-1", client_track.clone()).unwrap();

    host_track.lock().unwrap().set_name("Foo");
    host.flush().await.unwrap();

    let frames = host_transport.take_frames();
    assert_eq!(frames.len(), 1);
    let (endpoint, data) = &frames[0];
    assert_eq!(endpoint, "client");

    match JsonMessageConverter.deserialize(data).unwrap() {
        RemoteMessage::PropertyChange(m) => {
            assert_eq!(m.header.member_instance_id, "track-1");
            assert_eq!(m.target_member_signature, "track-1.Name");
            assert_eq!(m.value, json!("Foo"));
        }
        other => panic!("expected a property change, got {other:?}"),
    }

    let outcome = client.on_data_received("host", data).await.unwrap();
    assert_eq!(outcome, ApplyOutcome::Applied);
    assert_eq!(client.get("track-1").unwrap().get_property("Name").unwrap(), json!("Foo"));
    assert_eq!(client_track.lock().unwrap().name(), "Foo");
}

#[tokio::test]
async fn test_method_call_exception_is_echoed_to_caller() {
    let pair = linked_pair();
    pair.host.remote("track-1", shared(ExampleTrack::new("Intro"))).unwrap();
    let client_remote = pair.client.remote("track-1", shared(ExampleTrack::new("Intro"))).unwrap();

    let err = client_remote.call_remote("Fail", vec![]).await.unwrap_err();
    match err {
        RemotingError::RemoteException(info) => {
            assert_eq!(info.type_name, "InvalidOperationException");
            assert_eq!(info.message, "boom");
        }
        other => panic!("expected a remote exception, got {other:?}"),
    }
    assert_eq!(pair.host.stats().exceptions_echoed, 1);
    assert_eq!(pair.host.stats().apply_failures, 1);
}

#[tokio::test]
async fn test_awaited_call_returns_value_and_side_effects_flow_back() {
    let pair = linked_pair();
    let host_track = shared(ExampleTrack::new("Intro"));
    let client_track = shared(ExampleTrack::new("Intro"));
    pair.host.remote("track-1", host_track.clone()).unwrap();
    let client_remote = pair.client.remote("track-1", client_track.clone()).unwrap();

    let result = client_remote.call_remote("Play", vec![]).await.unwrap();
    assert_eq!(result, json!(1));
    assert_eq!(host_track.lock().unwrap().play_count(), 1);

    // PlayCount and the Played event are host-to-client
    eventually("play count on client", || client_track.lock().unwrap().play_count() == 1).await;
    eventually("played event on client", || {
        client_track.lock().unwrap().played_notifications() == 1
    })
    .await;
}

#[tokio::test]
async fn test_concurrent_awaited_calls_get_their_own_replies() {
    let pair = linked_pair();
    let host_track = shared(ExampleTrack::new("Intro"));
    pair.host.remote("track-1", host_track.clone()).unwrap();
    let client_remote = pair.client.remote("track-1", shared(ExampleTrack::new("Intro"))).unwrap();

    let calls = (0..5).map(|_| client_remote.call_remote("Play", vec![]));
    let mut counts: Vec<u64> = futures::future::join_all(calls)
        .await
        .into_iter()
        .map(|result| result.unwrap().as_u64().unwrap())
        .collect();
    counts.sort_unstable();

    assert_eq!(counts, vec![1, 2, 3, 4, 5]);
    assert_eq!(host_track.lock().unwrap().play_count(), 5);
}

#[tokio::test]
async fn test_wait_without_publish_times_out() {
    let pair = linked_pair();
    let remote = pair.client.remote("track-1", shared(ExampleTrack::new("Intro"))).unwrap();

    let started = tokio::time::Instant::now();
    let err = remote
        .wait_for_remote_data("slot-1", Duration::from_millis(100))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.kind(), "timeout");
    assert!(elapsed >= Duration::from_millis(100), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1000), "returned late: {elapsed:?}");
}

#[tokio::test]
async fn test_publish_reaches_peer_waiter() {
    let pair = linked_pair();
    let host_remote = pair.host.remote("track-1", shared(ExampleTrack::new("Intro"))).unwrap();
    let client_remote = pair.client.remote("track-1", shared(ExampleTrack::new("Intro"))).unwrap();

    let waiter = {
        let client_remote = client_remote.clone();
        tokio::spawn(async move {
            client_remote
                .wait_for_remote_data_as::<Vec<String>>("album-list", Duration::from_secs(2))
                .await
        })
    };

    host_remote
        .publish_data_as("album-list", &vec!["A".to_string(), "B".to_string()])
        .unwrap();
    assert_eq!(waiter.await.unwrap().unwrap(), vec!["A".to_string(), "B".to_string()]);

    // And the data-less variant in the other direction
    let gate = {
        let host_remote = host_remote.clone();
        tokio::spawn(async move { host_remote.remote_wait("ready", None).await })
    };
    tokio::task::yield_now().await;
    client_remote.remote_release("ready").unwrap();
    gate.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_applied_change_is_not_echoed_back() {
    let pair = linked_pair();
    let host_track = shared(ExampleTrack::new("Intro"));
    let client_track = shared(ExampleTrack::new("Intro"));
    pair.host.remote("track-1", host_track.clone()).unwrap();
    pair.client.remote("track-1", client_track.clone()).unwrap();

    host_track.lock().unwrap().set_name("Foo");
    pair.host.flush().await.unwrap();
    eventually("name on client", || client_track.lock().unwrap().name() == "Foo").await;

    pair.client.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(pair.client.stats().messages_sent, 0);
    assert_eq!(pair.host.stats().messages_received, 0);
}

#[tokio::test]
async fn test_inbound_direction_grid_fails_closed() {
    let grid = [
        (RemotingMode::Host, RemotingDirection::HostToClient, false),
        (RemotingMode::Host, RemotingDirection::ClientToHost, true),
        (RemotingMode::Host, RemotingDirection::Bidirectional, true),
        (RemotingMode::Host, RemotingDirection::None, false),
        (RemotingMode::Client, RemotingDirection::HostToClient, true),
        (RemotingMode::Client, RemotingDirection::ClientToHost, false),
        (RemotingMode::Client, RemotingDirection::Bidirectional, true),
        (RemotingMode::Client, RemotingDirection::None, false),
    ];

    for (mode, direction, accepted) in grid {
        let (link, transport) = recording_link(mode, RemotingConfig::default());
        let object = shared(Directed {
            direction,
            value: json!("before"),
        });
        link.remote("obj", object.clone()).unwrap();

        let frame = encode(&property_change("obj", "Value", json!("after")));
        let result = link.on_data_received("peer", &frame).await;
        debug!("{} / {} -> {:?}", mode, direction, result);

        let value = object.lock().unwrap().value.clone();
        if accepted {
            assert_eq!(result.unwrap(), ApplyOutcome::Applied, "{mode} / {direction}");
            assert_eq!(value, json!("after"));
        } else {
            assert_eq!(result.unwrap_err().kind(), "direction_violation", "{mode} / {direction}");
            assert_eq!(value, json!("before"), "{mode} / {direction} changed state");
            assert_eq!(link.stats().direction_violations, 1);
        }

        link.flush().await.unwrap();
        assert_eq!(transport.sent_count(), 0, "{mode} / {direction} sent something");
    }
}

#[tokio::test]
async fn test_duplicate_delivery_is_idempotent() {
    let (client, transport) = recording_link(RemotingMode::Client, RemotingConfig::default());
    let track = shared(ExampleTrack::new("Intro"));
    client.remote("track-1", track.clone()).unwrap();

    let frame = encode(&property_change("track-1", "Name", json!("Foo")));
    assert_eq!(client.on_data_received("host", &frame).await.unwrap(), ApplyOutcome::Applied);
    assert_eq!(client.on_data_received("host", &frame).await.unwrap(), ApplyOutcome::Unchanged);

    client.flush().await.unwrap();
    assert_eq!(track.lock().unwrap().name(), "Foo");
    assert_eq!(transport.sent_count(), 0);
    assert_eq!(client.stats().messages_applied, 2);
}

#[tokio::test]
async fn test_messages_apply_in_arrival_order() {
    let pair = linked_pair();
    let host_track = shared(ExampleTrack::new("Intro"));
    let client_track = shared(ExampleTrack::new("Intro"));
    pair.host.remote("track-1", host_track.clone()).unwrap();
    pair.client.remote("track-1", client_track.clone()).unwrap();

    const N: u64 = 200;
    for i in 0..N {
        host_track.lock().unwrap().set_name(format!("v{i}"));
    }
    pair.host.flush().await.unwrap();

    eventually("every change applied", || pair.client.stats().messages_applied == N).await;
    assert_eq!(client_track.lock().unwrap().name(), format!("v{}", N - 1));
}

#[tokio::test]
async fn test_bad_frames_do_not_stop_the_pipeline() {
    let mut config = RemotingConfig::default();
    config.max_message_size = 512;
    let (client, _transport) = recording_link(RemotingMode::Client, config);
    let track = shared(ExampleTrack::new("Intro"));
    client.remote("track-1", track.clone()).unwrap();
    let mut diagnostics = client.subscribe_diagnostics();

    let bad_frames: Vec<(Vec<u8>, &str)> = vec![
        (b"{not json".to_vec(), "deserialization"),
        (br#"{"memberInstanceId":"track-1","targetName":"Name","action":"Teleport"}"#.to_vec(), "unsupported_message_kind"),
        (encode(&property_change("track-9", "Name", json!("x"))), "unknown_instance"),
        (encode(&property_change("track-1", "Tempo", json!(120))), "unknown_member"),
        (vec![b' '; 1024], "message_too_large"),
    ];

    for (frame, expected) in &bad_frames {
        let err = client.on_data_received("host", frame).await.unwrap_err();
        assert_eq!(err.kind(), *expected);

        let event = diagnostics.recv().await.unwrap();
        match event.kind {
            DiagnosticKind::MessageDropped { error_kind, .. } => assert_eq!(error_kind, *expected),
            other => panic!("unexpected diagnostic {other:?}"),
        }
    }

    let good = encode(&property_change("track-1", "Name", json!("Foo")));
    client.on_data_received("host", &good).await.unwrap();
    assert_eq!(track.lock().unwrap().name(), "Foo");

    let stats = client.stats();
    assert_eq!(stats.messages_received, 6);
    assert_eq!(stats.messages_dropped, 5);
    assert_eq!(stats.messages_applied, 1);
}

#[tokio::test]
async fn test_duplicate_id_policies() {
    let (link, transport) = recording_link(RemotingMode::Host, RemotingConfig::default());
    let track = shared(ExampleTrack::new("A"));
    let original = link.remote("track-1", track.clone()).unwrap();
    let err = link.remote("track-1", shared(ExampleTrack::new("B"))).unwrap_err();
    assert_eq!(err.kind(), "duplicate_instance");

    // Rejected registrations leave the original hooked up
    assert_eq!(link.remote("track-1", track.clone()).unwrap_err().kind(), "duplicate_instance");
    assert_eq!(link.remote("track-2", track.clone()).unwrap_err().kind(), "duplicate_instance");
    assert!(!link.registry().contains("track-2"));

    track.lock().unwrap().set_name("Foo");
    link.flush().await.unwrap();
    assert_eq!(transport.sent_messages(), vec![property_change("track-1", "Name", json!("Foo"))]);
    assert_eq!(link.get("track-1").unwrap().token(), original.token());

    let mut config = RemotingConfig::default();
    config.duplicate_policy = DuplicatePolicy::ReplaceWithWarning;
    let (link, _transport) = recording_link(RemotingMode::Host, config);
    let mut diagnostics = link.subscribe_diagnostics();

    let first = link.remote("track-1", shared(ExampleTrack::new("A"))).unwrap();
    let second = link.remote("track-1", shared(ExampleTrack::new("B"))).unwrap();

    assert!(first.is_disposed());
    assert!(!second.is_disposed());
    assert_eq!(link.get("track-1").unwrap().token(), second.token());
    assert_eq!(link.stats().registered_instances, 1);

    let event = diagnostics.recv().await.unwrap();
    assert!(matches!(event.kind, DiagnosticKind::InstanceReplaced { ref instance_id } if instance_id == "track-1"));
}

#[tokio::test]
async fn test_compressed_link_pair() {
    let mut config = RemotingConfig::default();
    config.enable_compression = true;
    config.compression_threshold = 64;
    let pair = create_link_pair("host", "client", config).unwrap();

    let host_track = shared(ExampleTrack::new("Intro"));
    let client_track = shared(ExampleTrack::new("Intro"));
    pair.host.remote("track-1", host_track.clone()).unwrap();
    pair.client.remote("track-1", client_track.clone()).unwrap();

    let long_name = "Symphony No. 9 ".repeat(40);
    host_track.lock().unwrap().set_name(long_name.clone());
    pair.host.flush().await.unwrap();

    eventually("long name on client", || client_track.lock().unwrap().name() == long_name).await;
    assert!(pair.host.stats().bytes_sent < long_name.len() as u64);
}

#[tokio::test]
async fn test_late_peer_catches_up_with_sync() {
    let pair = linked_pair();
    let host_track = shared(ExampleTrack::new("Intro"));
    let host_remote = pair.host.remote("track-1", host_track.clone()).unwrap();

    // Changed before the client registered: dropped there as unknown
    host_track.lock().unwrap().set_name("Early");
    pair.host.flush().await.unwrap();
    eventually("drop on client", || pair.client.stats().messages_dropped == 1).await;

    let client_track = shared(ExampleTrack::new("Intro"));
    pair.client.remote("track-1", client_track.clone()).unwrap();
    host_remote.sync_properties().unwrap();
    pair.host.flush().await.unwrap();

    eventually("synced name on client", || client_track.lock().unwrap().name() == "Early").await;
}

#[tokio::test]
async fn test_shutdown_releases_waiters() {
    let pair = linked_pair();
    let remote = pair.client.remote("track-1", shared(ExampleTrack::new("Intro"))).unwrap();

    let waiter = {
        let remote = remote.clone();
        tokio::spawn(async move { remote.wait_for_remote_data("never", Duration::from_secs(30)).await })
    };
    tokio::task::yield_now().await;

    pair.client.shutdown().await.unwrap();

    let err = waiter.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), "cancelled");
    assert!(remote.is_disposed());
    assert!(pair.client.registry().is_empty());
}
