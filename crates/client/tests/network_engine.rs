mod common;

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use common::{client_with, test_config, Reply, ScriptedTransport};
use pn_client::{
    FetchMessagesRequest, NetworkEngine, ParsedData, PublishRequest, RequestParameters,
};
use pn_crypto::{ChunkProcessor, CryptoError, CryptoModule, Cryptor, EncryptedData};
use pn_domain::{Endpoint, OperationType, StatusCategory};
use pn_transport::RequestBody;
use serde_json::json;

fn sent_reply() -> Reply {
    Reply::Json(200, json!([1, "Sent", "17000000000000000"]))
}

// ── Retry ───────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn idempotent_read_is_retried_with_the_same_identifier() {
    let sub = ScriptedTransport::new([]);
    let svc = ScriptedTransport::new([
        Reply::Network,
        Reply::Json(200, json!([17000000000000001u64])),
    ]);
    let client = client_with(test_config(), sub, svc.clone());

    assert_eq!(client.time().await.unwrap(), 17_000_000_000_000_001);
    let requests = svc.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].identifier, requests[1].identifier);
    assert_eq!(requests[0].attempt, 0);
    assert_eq!(requests[1].attempt, 1);
}

#[tokio::test(start_paused = true)]
async fn publish_failure_is_not_resent_without_the_caller() {
    let sub = ScriptedTransport::new([]);
    let svc = ScriptedTransport::new([Reply::Network, sent_reply()]);
    let client = client_with(test_config(), sub, svc.clone());

    let status = client
        .publish(PublishRequest {
            channel: "room".into(),
            message: json!({"text": "hi"}),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(status.category, StatusCategory::NetworkIssues);
    assert!(!svc.requests()[0].retriable);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(svc.request_count(), 1);

    let retry = status.retry.expect("publish failure keeps a retry handle");
    match retry.retry().await.unwrap() {
        ParsedData::Publish { timetoken } => assert_eq!(timetoken, 17_000_000_000_000_000),
        other => panic!("expected a publish result, got {other:?}"),
    }
    assert_eq!(svc.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn excluded_endpoint_fails_at_once_and_retries_by_hand() {
    let mut config = test_config();
    config.retry.excluded_endpoints = vec![Endpoint::Unknown];
    let sub = ScriptedTransport::new([]);
    let svc = ScriptedTransport::new([Reply::Network]);
    let client = client_with(config, sub, svc.clone());

    let status = client.time().await.unwrap_err();
    assert_eq!(status.category, StatusCategory::NetworkIssues);
    assert_eq!(svc.request_count(), 1);

    svc.push(Reply::Json(200, json!([17000000000000002u64])));
    let retry = status.retry.expect("excluded endpoint keeps a retry handle");
    assert!(retry.retry().await.is_ok());
    assert_eq!(svc.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn bad_request_is_not_retried_but_can_be_retried_by_hand() {
    let sub = ScriptedTransport::new([]);
    let svc = ScriptedTransport::new([Reply::Json(
        400,
        json!({"status": 400, "error": true, "message": "Invalid Arguments"}),
    )]);
    let client = client_with(test_config(), sub, svc.clone());

    let status = client.time().await.unwrap_err();
    assert!(status.is_error);
    assert_eq!(status.category, StatusCategory::BadRequest);
    assert_eq!(status.status_code, 400);
    assert_eq!(svc.request_count(), 1);

    svc.push(Reply::Json(200, json!([17000000000000001u64])));
    let retry = status.retry.expect("bad request keeps a retry handle");
    assert!(retry.retry().await.is_ok());
    assert_eq!(svc.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_the_last_failure() {
    let mut config = test_config();
    config.retry.maximum_retry = Some(2);
    let sub = ScriptedTransport::new([]);
    let svc = ScriptedTransport::new([Reply::Timeout, Reply::Timeout, Reply::Timeout]);
    let client = client_with(config, sub, svc.clone());

    let status = client.time().await.unwrap_err();
    assert_eq!(status.category, StatusCategory::Timeout);
    assert_eq!(svc.request_count(), 3);
}

// ── Cancellation ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn cancelled_request_reports_cancelled_without_retry_handle() {
    let sub = ScriptedTransport::new([]);
    let svc = ScriptedTransport::new([Reply::Hang]);
    let client = client_with(test_config(), sub, svc.clone());

    let (result, hit) = tokio::join!(client.time(), async {
        svc.wait_for_requests(1).await;
        client.cancel_all_operations("/time")
    });

    assert_eq!(hit, 1);
    let status = result.unwrap_err();
    assert_eq!(status.category, StatusCategory::Cancelled);
    assert!(status.retry.is_none());
}

#[tokio::test(start_paused = true)]
async fn cancel_with_other_prefix_leaves_request_alone() {
    let sub = ScriptedTransport::new([]);
    let svc = ScriptedTransport::new([Reply::Hang]);
    let client = client_with(test_config(), sub, svc.clone());

    let time = client.time();
    tokio::pin!(time);
    tokio::select! {
        _ = &mut time => panic!("hanging request completed"),
        _ = svc.wait_for_requests(1) => {}
    }
    assert_eq!(client.cancel_all_operations("/publish"), 0);
    assert_eq!(client.cancel_all_operations("/time"), 1);
    assert_eq!(time.await.unwrap_err().category, StatusCategory::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn invalidate_cancels_in_flight_and_fails_later_calls() {
    let sub = ScriptedTransport::new([]);
    let svc = ScriptedTransport::new([Reply::Hang]);
    let client = client_with(test_config(), sub, svc.clone());

    let (result, ()) = tokio::join!(client.time(), async {
        svc.wait_for_requests(1).await;
        client.invalidate();
    });

    let status = result.unwrap_err();
    assert_eq!(status.category, StatusCategory::ClientInvalidated);
    assert!(status.retry.is_none());

    let later = client.time().await.unwrap_err();
    assert_eq!(later.category, StatusCategory::ClientInvalidated);
    assert_eq!(svc.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn leave_ignores_bulk_cancel_but_stops_on_invalidate() {
    let svc = ScriptedTransport::new([Reply::Hang]);
    let engine = NetworkEngine::new(
        Arc::new(test_config()),
        ScriptedTransport::new([]),
        svc.clone(),
        None,
    );
    let params = RequestParameters::new()
        .path_list("channels", &["room".to_string()])
        .targets(&["room".to_string()]);

    let leave = engine.process_operation(OperationType::Unsubscribe, params, RequestBody::None);
    tokio::pin!(leave);
    tokio::select! {
        _ = &mut leave => panic!("hanging leave completed"),
        _ = svc.wait_for_requests(1) => {}
    }
    assert!(!svc.requests()[0].cancellable);
    assert_eq!(engine.cancel_all_operations("/v2/presence"), 0);
    assert_eq!(engine.cancel_all_operations(""), 0);

    engine.invalidate();
    let status = leave.await.unwrap_err();
    assert_eq!(status.category, StatusCategory::ClientInvalidated);
}

// ── Payload encryption ──────────────────────────────────────────────────

fn crypto() -> Arc<CryptoModule> {
    Arc::new(CryptoModule::aes_cbc("enigma", true).unwrap())
}

#[tokio::test(start_paused = true)]
async fn publish_encrypts_payload_and_bumps_sequence() {
    let module = crypto();
    let sub = ScriptedTransport::new([]);
    let svc = ScriptedTransport::new([sent_reply(), sent_reply()]);
    let client = pn_client::ClientBuilder::new(test_config())
        .transports(sub, svc.clone())
        .store(Arc::new(pn_client::MemoryStore::new()))
        .crypto_module(module.clone())
        .build()
        .unwrap();

    for _ in 0..2 {
        client
            .publish(PublishRequest {
                channel: "room".into(),
                message: json!({"x": 1}),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    let requests = svc.requests();
    let path = &requests[0].path;
    assert!(path.starts_with("/publish/pub-c-test/sub-c-test/0/room/0/%22"));
    assert!(path.ends_with("%22"));

    let segment = path.rsplit('/').next().unwrap();
    let quoted = percent_encoding::percent_decode_str(segment)
        .decode_utf8()
        .unwrap();
    let sealed = quoted.trim_matches('"');
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(sealed)
        .unwrap();
    assert_eq!(&bytes[..4], b"PNED");
    assert_eq!(bytes[4], 1);
    assert_eq!(&bytes[5..9], b"ACRH");
    assert_eq!(module.decrypt_string(sealed).unwrap(), r#"{"x":1}"#);

    let seqn = |i: usize| -> u64 { requests[i].query_value("seqn").unwrap().parse().unwrap() };
    assert_eq!(seqn(1), seqn(0) + 1);
}

/// Cryptor whose encryption always fails.
struct FailingCryptor;

impl Cryptor for FailingCryptor {
    fn identifier(&self) -> [u8; 4] {
        *b"FAIL"
    }

    fn encrypt(&self, _data: &[u8]) -> Result<EncryptedData, CryptoError> {
        Err(CryptoError::Encryption("key revoked".into()))
    }

    fn decrypt(&self, _data: &EncryptedData) -> Result<Vec<u8>, CryptoError> {
        Err(CryptoError::Decryption("key revoked".into()))
    }

    fn stream_encryptor(&self) -> Result<(Option<Vec<u8>>, Box<dyn ChunkProcessor>), CryptoError> {
        Err(CryptoError::Encryption("key revoked".into()))
    }

    fn stream_decryptor(&self, _metadata: Option<&[u8]>) -> Result<Box<dyn ChunkProcessor>, CryptoError> {
        Err(CryptoError::Decryption("key revoked".into()))
    }
}

#[tokio::test(start_paused = true)]
async fn failed_encryption_is_reported_as_encryption_error() {
    let svc = ScriptedTransport::new([]);
    let client = pn_client::ClientBuilder::new(test_config())
        .transports(ScriptedTransport::new([]), svc.clone())
        .store(Arc::new(pn_client::MemoryStore::new()))
        .crypto_module(Arc::new(CryptoModule::new(Arc::new(FailingCryptor), Vec::new())))
        .build()
        .unwrap();

    let status = client
        .publish(PublishRequest {
            channel: "room".into(),
            message: json!({"x": 1}),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(status.category, StatusCategory::EncryptionError);
    assert!(status.is_error);
    assert_eq!(svc.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn fetched_history_is_decrypted() {
    let module = crypto();
    let sealed = module.encrypt_string(r#"{"text":"secret"}"#).unwrap();
    let sub = ScriptedTransport::new([]);
    let svc = ScriptedTransport::new([Reply::Json(
        200,
        json!({"status": 200, "channels": {"room": [{"message": sealed, "timetoken": "1"}]}}),
    )]);
    let client = pn_client::ClientBuilder::new(test_config())
        .transports(sub, svc)
        .store(Arc::new(pn_client::MemoryStore::new()))
        .crypto_module(module)
        .build()
        .unwrap();

    let result = client
        .fetch_messages(FetchMessagesRequest {
            channels: vec!["room".into()],
            ..Default::default()
        })
        .await
        .unwrap();

    let entry = &result.channels["room"][0];
    assert_eq!(entry.message, json!({"text": "secret"}));
    assert_eq!(entry.timetoken, 1);
    assert!(entry.decryption_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn downloaded_file_is_decrypted_to_destination() {
    let module = crypto();
    let plain = b"quarterly numbers".repeat(1000);
    let mut sealed = Vec::new();
    module
        .encrypt_stream(&mut plain.as_slice(), &mut sealed, 4096)
        .unwrap();

    let sub = ScriptedTransport::new([]);
    let svc = ScriptedTransport::new([Reply::File(sealed)]);
    let client = pn_client::ClientBuilder::new(test_config())
        .transports(sub, svc.clone())
        .store(Arc::new(pn_client::MemoryStore::new()))
        .crypto_module(module)
        .build()
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("report.txt");
    let written = client
        .download_file("room", "f-1", "report.txt", &destination)
        .await
        .unwrap();

    assert_eq!(written, plain.len() as u64);
    assert_eq!(std::fs::read(&destination).unwrap(), plain);
    assert!(svc.requests()[0].response_as_file);
}

#[tokio::test(start_paused = true)]
async fn missing_channel_is_rejected_before_sending() {
    let sub = ScriptedTransport::new([]);
    let svc = ScriptedTransport::new([]);
    let client = client_with(test_config(), sub, svc.clone());

    let status = client
        .publish(PublishRequest {
            message: json!("hi"),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(status.category, StatusCategory::BadRequest);
    assert_eq!(svc.request_count(), 0);
}
