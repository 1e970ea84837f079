//! Scripted in-memory transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use pn_client::{Client, ClientBuilder, ClientEvent, MemoryStore, Status};
use pn_domain::config::Config;
use pn_transport::{
    ResponseBody, Transport, TransportError, TransportRequest, TransportResponse,
};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Notify};

// ── Scripted transport ──────────────────────────────────────────────────

pub enum Reply {
    Json(u16, Value),
    /// Body delivered as a downloaded temp file.
    File(Vec<u8>),
    Network,
    Timeout,
    /// Never answers; also what an exhausted script does.
    Hang,
}

#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<TransportRequest>>,
    arrived: Notify,
}

impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().push_back(reply);
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Resolve once at least `n` requests were sent.
    pub async fn wait_for_requests(&self, n: usize) {
        loop {
            let notified = self.arrived.notified();
            if self.requests.lock().len() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().push(request);
        self.arrived.notify_waiters();
        let reply = self.replies.lock().pop_front().unwrap_or(Reply::Hang);
        match reply {
            Reply::Json(status, body) => Ok(TransportResponse::from_bytes(
                status,
                serde_json::to_vec(&body).unwrap(),
            )),
            Reply::File(bytes) => {
                let mut file = tempfile::NamedTempFile::new()?;
                file.write_all(&bytes)?;
                Ok(TransportResponse {
                    status: 200,
                    headers: Vec::new(),
                    url: String::new(),
                    body: ResponseBody::File(file.into_temp_path()),
                })
            }
            Reply::Network => Err(TransportError::Network("connection reset by peer".into())),
            Reply::Timeout => Err(TransportError::Timeout("deadline elapsed".into())),
            Reply::Hang => std::future::pending().await,
        }
    }

    fn invalidate(&self) {}
}

// ── Fixtures ────────────────────────────────────────────────────────────

/// Keys set, heartbeat off, nothing persisted.
pub fn test_config() -> Config {
    let mut config = Config::with_keys("sub-c-test", "alice");
    config.keys.publish_key = Some("pub-c-test".into());
    config.presence.heartbeat_value_secs = 0;
    config.persistence.enabled = false;
    config
}

pub fn client_with(
    config: Config,
    subscribe: Arc<ScriptedTransport>,
    service: Arc<ScriptedTransport>,
) -> Client {
    ClientBuilder::new(config)
        .transports(subscribe, service)
        .store(Arc::new(MemoryStore::new()))
        .build()
        .unwrap()
}

pub fn handshake(timetoken: u64) -> Reply {
    batch(timetoken, vec![])
}

pub fn batch(timetoken: u64, messages: Vec<Value>) -> Reply {
    Reply::Json(
        200,
        json!({"t": {"t": timetoken.to_string(), "r": 1}, "m": messages}),
    )
}

pub fn message(channel: &str, timetoken: u64, payload: Value) -> Value {
    json!({
        "a": "1",
        "f": 0,
        "i": "bob",
        "k": "sub-c-test",
        "c": channel,
        "d": payload,
        "p": {"t": timetoken.to_string(), "r": 1},
    })
}

// ── Event stream helpers ────────────────────────────────────────────────

/// Next status, skipping events.  Fails instead of hanging.
pub async fn next_status(rx: &mut mpsc::UnboundedReceiver<ClientEvent>) -> Status {
    loop {
        match tokio::time::timeout(std::time::Duration::from_secs(3600), rx.recv()).await {
            Ok(Some(ClientEvent::Status(status))) => return status,
            Ok(Some(ClientEvent::Event(_))) => continue,
            Ok(None) => panic!("event stream closed"),
            Err(_) => panic!("no status arrived"),
        }
    }
}

pub async fn next_item(rx: &mut mpsc::UnboundedReceiver<ClientEvent>) -> ClientEvent {
    match tokio::time::timeout(std::time::Duration::from_secs(3600), rx.recv()).await {
        Ok(Some(item)) => item,
        Ok(None) => panic!("event stream closed"),
        Err(_) => panic!("nothing arrived"),
    }
}
