//! Subscribe loop scenarios against a scripted transport.
//!
//! Time is paused, so retry back-off elapses instantly once every task
//! is idle.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use pn_client::{ClientBuilder, ClientEvent, MemoryStore, SubscribeRequest, SubscribeState};
use pn_crypto::CryptoModule;
use pn_domain::config::{ReconnectFrom, RetryPolicyKind};
use pn_domain::event::Event;
use pn_domain::{Cursor, StatusCategory};
use serde_json::json;

fn room() -> SubscribeRequest {
    SubscribeRequest {
        channels: vec!["room".into()],
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn handshake_then_messages_in_order() {
    let sub = ScriptedTransport::new([
        handshake(100),
        batch(
            200,
            vec![
                message("room", 150, json!({"text": "first"})),
                message("room", 160, json!({"text": "second"})),
            ],
        ),
    ]);
    let svc = ScriptedTransport::new([]);
    let client = client_with(test_config(), sub.clone(), svc);
    let mut rx = client.events();

    client.subscribe(room()).await.unwrap();

    let status = next_status(&mut rx).await;
    assert_eq!(status.category, StatusCategory::Connected);
    assert!(!status.is_error);
    assert_eq!(status.affected_channels, vec!["room".to_string()]);
    assert_eq!(status.last_cursor, Some(Cursor::ZERO));
    assert_eq!(status.current_cursor, Some(Cursor::new(100, 1)));

    for expected in ["first", "second"] {
        match next_item(&mut rx).await {
            ClientEvent::Event(Event::Message(m)) => {
                assert_eq!(m.channel, "room");
                assert_eq!(m.payload["text"], expected);
                assert_eq!(m.publisher.as_deref(), Some("bob"));
            }
            other => panic!("expected a message, got {other:?}"),
        }
    }

    sub.wait_for_requests(3).await;
    let requests = sub.requests();
    assert_eq!(requests[0].path, "/v2/subscribe/sub-c-test/room/0");
    assert_eq!(requests[0].query_value("tt"), Some("0"));
    assert_eq!(requests[1].query_value("tt"), Some("100"));
    assert_eq!(requests[1].query_value("tr"), Some("1"));
    assert_eq!(requests[2].query_value("tt"), Some("200"));
    assert_eq!(client.cursor().timetoken, 200);
    assert_eq!(client.subscribe_state(), SubscribeState::Connected);
}

#[tokio::test(start_paused = true)]
async fn network_failure_reconnects_at_same_cursor() {
    let sub = ScriptedTransport::new([
        handshake(100),
        Reply::Network,
        batch(300, vec![message("room", 250, json!("after outage"))]),
    ]);
    let client = client_with(test_config(), sub.clone(), ScriptedTransport::new([]));
    let mut rx = client.events();
    let states = client.state_changes();

    client.subscribe(room()).await.unwrap();

    assert_eq!(next_status(&mut rx).await.category, StatusCategory::Connected);

    let outage = next_status(&mut rx).await;
    assert_eq!(outage.category, StatusCategory::UnexpectedDisconnect);
    assert!(outage.is_error);
    assert!(outage.retry.is_some());
    assert_eq!(outage.last_cursor, Some(Cursor::new(100, 1)));
    assert_eq!(outage.current_cursor, Some(Cursor::new(100, 1)));

    let back = next_status(&mut rx).await;
    assert_eq!(back.category, StatusCategory::Reconnected);
    assert_eq!(back.last_cursor, Some(Cursor::new(100, 1)));
    assert_eq!(back.current_cursor, Some(Cursor::new(300, 1)));
    match next_item(&mut rx).await {
        ClientEvent::Event(Event::Message(m)) => assert_eq!(m.payload, json!("after outage")),
        other => panic!("expected a message, got {other:?}"),
    }

    let requests = sub.requests();
    assert_eq!(requests[1].attempt, 0);
    assert_eq!(requests[2].query_value("tt"), Some("100"));
    assert_eq!(requests[2].attempt, 1);
    assert_eq!(client.cursor().timetoken, 300);
    assert_eq!(*states.borrow(), SubscribeState::Connected);
}

#[tokio::test(start_paused = true)]
async fn reconnect_from_now_drops_the_backlog() {
    let sub = ScriptedTransport::new([handshake(100), Reply::Timeout, handshake(900)]);
    let mut config = test_config();
    config.subscribe.reconnect_from = ReconnectFrom::Now;
    let client = client_with(config, sub.clone(), ScriptedTransport::new([]));
    let mut rx = client.events();

    client.subscribe(room()).await.unwrap();
    assert_eq!(next_status(&mut rx).await.category, StatusCategory::Connected);
    assert_eq!(next_status(&mut rx).await.category, StatusCategory::UnexpectedDisconnect);
    assert_eq!(next_status(&mut rx).await.category, StatusCategory::Reconnected);

    assert_eq!(sub.requests()[2].query_value("tt"), Some("0"));
}

#[tokio::test(start_paused = true)]
async fn access_denied_stops_without_retry() {
    let sub = ScriptedTransport::new([
        handshake(100),
        Reply::Json(
            403,
            json!({"status": 403, "error": true, "message": "Forbidden",
                   "payload": {"channels": ["room"]}}),
        ),
    ]);
    let client = client_with(test_config(), sub.clone(), ScriptedTransport::new([]));
    let mut rx = client.events();

    client.subscribe(room()).await.unwrap();
    assert_eq!(next_status(&mut rx).await.category, StatusCategory::Connected);

    let denied = next_status(&mut rx).await;
    assert_eq!(denied.category, StatusCategory::AccessDenied);
    assert!(denied.is_error);
    assert_eq!(denied.status_code, 403);
    assert_eq!(denied.affected_channels, vec!["room".to_string()]);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(sub.request_count(), 2);
    assert_eq!(client.subscribe_state(), SubscribeState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn list_change_restarts_poll_silently() {
    let sub = ScriptedTransport::new([handshake(100)]);
    let client = client_with(test_config(), sub.clone(), ScriptedTransport::new([]));
    let mut rx = client.events();

    client.subscribe(room()).await.unwrap();
    assert_eq!(next_status(&mut rx).await.category, StatusCategory::Connected);
    sub.wait_for_requests(2).await;

    client
        .subscribe(SubscribeRequest {
            channels: vec!["lobby".into()],
            ..Default::default()
        })
        .await
        .unwrap();
    sub.wait_for_requests(3).await;

    let third = &sub.requests()[2];
    assert_eq!(third.path, "/v2/subscribe/sub-c-test/lobby,room/0");
    assert_eq!(third.query_value("tt"), Some("100"));
    // The superseded poll produced no status.
    assert!(rx.try_recv().is_err());
    assert_eq!(client.subscribe_state(), SubscribeState::Connected);
}

#[tokio::test(start_paused = true)]
async fn presence_channels_are_paired_and_decoded() {
    let sub = ScriptedTransport::new([
        handshake(100),
        batch(
            200,
            vec![message(
                "room-pnpres",
                180,
                json!({"action": "join", "uuid": "bob", "occupancy": 2, "timestamp": 1700000000}),
            )],
        ),
    ]);
    let client = client_with(test_config(), sub.clone(), ScriptedTransport::new([]));
    let mut rx = client.events();

    client
        .subscribe(SubscribeRequest {
            channels: vec!["room".into()],
            with_presence: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(
        client.subscribed_channels(),
        vec!["room".to_string(), "room-pnpres".to_string()]
    );

    assert_eq!(next_status(&mut rx).await.category, StatusCategory::Connected);
    match next_item(&mut rx).await {
        ClientEvent::Event(Event::Presence(p)) => {
            assert_eq!(p.channel, "room");
            assert_eq!(p.uuid.as_deref(), Some("bob"));
            assert_eq!(p.occupancy, Some(2));
        }
        other => panic!("expected presence, got {other:?}"),
    }
    assert_eq!(sub.requests()[0].path, "/v2/subscribe/sub-c-test/room,room-pnpres/0");

    client.unsubscribe(&["room".into()], &[]).await.unwrap();
    assert!(client.subscribed_channels().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unsubscribe_all_goes_idle_and_leaves() {
    let sub = ScriptedTransport::new([handshake(100)]);
    let svc = ScriptedTransport::new([Reply::Json(
        200,
        json!({"status": 200, "message": "OK", "action": "leave", "service": "Presence"}),
    )]);
    let client = client_with(test_config(), sub.clone(), svc.clone());
    let mut rx = client.events();

    client
        .subscribe(SubscribeRequest {
            channels: vec!["room".into()],
            groups: vec!["friends".into()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(next_status(&mut rx).await.category, StatusCategory::Connected);

    client.unsubscribe_all().await.unwrap();
    let status = next_status(&mut rx).await;
    assert_eq!(status.category, StatusCategory::Disconnected);
    assert!(!status.is_error);
    assert_eq!(status.affected_channels, vec!["room".to_string()]);
    assert_eq!(status.affected_groups, vec!["friends".to_string()]);

    assert_eq!(client.subscribe_state(), SubscribeState::Idle);
    assert_eq!(client.cursor().timetoken, 0);

    svc.wait_for_requests(1).await;
    let leave = &svc.requests()[0];
    assert_eq!(leave.path, "/v2/presence/sub-key/sub-c-test/channel/room/leave");
    assert_eq!(leave.query_value("channel-group"), Some("friends"));
}

#[tokio::test(start_paused = true)]
async fn suppressed_leave_sends_nothing() {
    let sub = ScriptedTransport::new([handshake(100)]);
    let svc = ScriptedTransport::new([]);
    let mut config = test_config();
    config.subscribe.suppress_leave_events = true;
    let client = client_with(config, sub, svc.clone());

    client.subscribe(room()).await.unwrap();
    client.unsubscribe(&["room".into()], &[]).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(svc.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_disconnect_and_manual_retry_recovers() {
    let sub = ScriptedTransport::new([
        handshake(100),
        Reply::Network,
        Reply::Network,
        Reply::Network,
    ]);
    let mut config = test_config();
    config.retry.policy = RetryPolicyKind::Linear;
    config.retry.maximum_retry = Some(2);
    let client = client_with(config, sub.clone(), ScriptedTransport::new([]));
    let mut rx = client.events();

    client.subscribe(room()).await.unwrap();
    assert_eq!(next_status(&mut rx).await.category, StatusCategory::Connected);
    assert_eq!(next_status(&mut rx).await.category, StatusCategory::UnexpectedDisconnect);

    let gave_up = next_status(&mut rx).await;
    assert_eq!(gave_up.category, StatusCategory::Disconnected);
    assert!(gave_up.is_error);
    assert_eq!(sub.request_count(), 4);
    assert_eq!(client.subscribe_state(), SubscribeState::Disconnected);
    assert_eq!(client.cursor().timetoken, 100);

    sub.push(handshake(500));
    let handle = gave_up.retry.expect("retry handle");
    handle.retry().await.unwrap();

    assert_eq!(next_status(&mut rx).await.category, StatusCategory::Reconnected);
    assert_eq!(sub.requests()[4].query_value("tt"), Some("100"));
}

#[tokio::test(start_paused = true)]
async fn redelivered_messages_are_dropped() {
    let sub = ScriptedTransport::new([
        handshake(100),
        batch(200, vec![message("room", 150, json!(1))]),
        batch(
            300,
            vec![message("room", 150, json!(1)), message("room", 250, json!(2))],
        ),
    ]);
    let client = client_with(test_config(), sub.clone(), ScriptedTransport::new([]));
    let mut rx = client.events();

    client.subscribe(room()).await.unwrap();
    sub.wait_for_requests(4).await;

    let mut payloads = Vec::new();
    while let Ok(item) = rx.try_recv() {
        if let ClientEvent::Event(Event::Message(m)) = item {
            payloads.push(m.payload);
        }
    }
    assert_eq!(payloads, vec![json!(1), json!(2)]);
}

#[tokio::test(start_paused = true)]
async fn message_count_threshold_is_reported() {
    let sub = ScriptedTransport::new([
        handshake(100),
        batch(
            200,
            vec![message("room", 150, json!(1)), message("room", 160, json!(2))],
        ),
    ]);
    let mut config = test_config();
    config.subscribe.request_message_count_threshold = 2;
    let client = client_with(config, sub, ScriptedTransport::new([]));
    let mut rx = client.events();

    client.subscribe(room()).await.unwrap();
    assert_eq!(next_status(&mut rx).await.category, StatusCategory::Connected);
    assert_eq!(
        next_status(&mut rx).await.category,
        StatusCategory::RequestMessageCountExceeded
    );
}

#[tokio::test(start_paused = true)]
async fn disconnect_keeps_set_and_cursor() {
    let sub = ScriptedTransport::new([handshake(100)]);
    let client = client_with(test_config(), sub.clone(), ScriptedTransport::new([]));
    let mut rx = client.events();

    client.subscribe(room()).await.unwrap();
    assert_eq!(next_status(&mut rx).await.category, StatusCategory::Connected);
    sub.wait_for_requests(2).await;

    client.disconnect().await.unwrap();
    let status = next_status(&mut rx).await;
    assert_eq!(status.category, StatusCategory::Disconnected);
    assert!(!status.is_error);
    assert_eq!(client.subscribe_state(), SubscribeState::Disconnected);
    assert_eq!(client.subscribed_channels(), vec!["room".to_string()]);
    assert_eq!(client.cursor().timetoken, 100);

    client.reconnect(None).await.unwrap();
    sub.wait_for_requests(3).await;
    assert_eq!(sub.requests()[2].query_value("tt"), Some("100"));
    assert_eq!(client.subscribe_state(), SubscribeState::Connecting);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_runs_with_subscription() {
    let sub = ScriptedTransport::new([handshake(100)]);
    let svc = ScriptedTransport::new([
        Reply::Json(200, json!({"status": 200, "message": "OK", "service": "Presence"})),
        Reply::Json(200, json!({"status": 200, "message": "OK", "service": "Presence"})),
    ]);
    let mut config = test_config();
    config.presence.heartbeat_value_secs = 60;
    config.presence.heartbeat_interval_secs = 20;
    let client = client_with(config, sub.clone(), svc.clone());

    client.subscribe(room()).await.unwrap();
    assert!(client.is_heartbeat_running());

    svc.wait_for_requests(2).await;
    let beat = &svc.requests()[0];
    assert_eq!(beat.path, "/v2/presence/sub-key/sub-c-test/channel/room/heartbeat");
    assert_eq!(beat.query_value("heartbeat"), Some("60"));
    assert_eq!(sub.requests()[0].query_value("heartbeat"), Some("60"));

    client.unsubscribe_all().await.unwrap();
    assert!(!client.is_heartbeat_running());
}

#[tokio::test(start_paused = true)]
async fn cancelling_automatic_retry_disconnects() {
    let sub = ScriptedTransport::new([handshake(100), Reply::Network, handshake(300)]);
    let client = client_with(test_config(), sub.clone(), ScriptedTransport::new([]));
    let mut rx = client.events();

    client.subscribe(room()).await.unwrap();
    assert_eq!(next_status(&mut rx).await.category, StatusCategory::Connected);

    let outage = next_status(&mut rx).await;
    assert_eq!(outage.category, StatusCategory::UnexpectedDisconnect);
    let handle = outage.retry.expect("retry handle");
    assert!(handle.cancel_automatic_retry());
    assert!(!handle.cancel_automatic_retry());

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(sub.request_count(), 2);
    assert_eq!(client.subscribe_state(), SubscribeState::Disconnected);
    assert_eq!(client.cursor().timetoken, 100);
}

#[tokio::test(start_paused = true)]
async fn reconnect_cuts_pending_backoff_short() {
    let sub = ScriptedTransport::new([handshake(100), Reply::Network, handshake(300)]);
    let mut config = test_config();
    config.retry.policy = RetryPolicyKind::Linear;
    config.retry.delay_secs = 60.0;
    let client = client_with(config, sub.clone(), ScriptedTransport::new([]));
    let mut rx = client.events();

    client.subscribe(room()).await.unwrap();
    assert_eq!(next_status(&mut rx).await.category, StatusCategory::Connected);
    assert_eq!(next_status(&mut rx).await.category, StatusCategory::UnexpectedDisconnect);
    assert_eq!(client.subscribe_state(), SubscribeState::Reconnecting);

    let started = tokio::time::Instant::now();
    client.reconnect(None).await.unwrap();
    assert_eq!(next_status(&mut rx).await.category, StatusCategory::Reconnected);
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(sub.requests()[2].query_value("tt"), Some("100"));
}

#[tokio::test(start_paused = true)]
async fn undecryptable_message_is_delivered_raw_with_a_status() {
    let sub = ScriptedTransport::new([
        handshake(100),
        batch(200, vec![message("room", 150, json!("not a cipher text"))]),
    ]);
    let client = ClientBuilder::new(test_config())
        .transports(sub, ScriptedTransport::new([]))
        .store(Arc::new(MemoryStore::new()))
        .crypto_module(Arc::new(CryptoModule::aes_cbc("enigma", true).unwrap()))
        .build()
        .unwrap();
    let mut rx = client.events();

    client.subscribe(room()).await.unwrap();
    assert_eq!(next_status(&mut rx).await.category, StatusCategory::Connected);

    match next_item(&mut rx).await {
        ClientEvent::Event(Event::Message(m)) => {
            assert_eq!(m.payload, json!("not a cipher text"));
            assert!(m.decryption_error.is_some());
        }
        other => panic!("expected a message, got {other:?}"),
    }
    let status = next_status(&mut rx).await;
    assert_eq!(status.category, StatusCategory::DecryptionError);
    assert!(status.is_error);
    assert_eq!(status.affected_channels, vec!["room".to_string()]);
}
