//! The [`Transport`] seam and its reqwest implementation.
//!
//! The network engine owns two transports: a long-poll session that keeps a
//! single idle connection for subscribe, and a service session for every
//! other request.

use std::io::Write;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::RwLock;
use pn_domain::config::Config;
use reqwest::Client;
use tokio::io::AsyncWriteExt;

use crate::error::{from_reqwest, Result, TransportError};
use crate::request::{RequestBody, TransportMethod, TransportRequest};
use crate::response::{ResponseBody, TransportResponse};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one HTTP exchange.  Non-2xx statuses are returned as
    /// responses; only failures below HTTP are errors.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;

    /// Release connections.  Later sends fail with `Invalidated`.
    fn invalidate(&self);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session settings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub name: &'static str,
    pub timeout: Duration,
    pub max_idle_per_host: usize,
    pub user_agent: Option<String>,
}

impl SessionConfig {
    pub fn long_poll(cfg: &Config) -> Self {
        Self {
            name: "subscribe",
            timeout: cfg.subscribe_timeout(),
            max_idle_per_host: 1,
            user_agent: cfg.network.user_agent.clone(),
        }
    }

    pub fn service(cfg: &Config) -> Self {
        Self {
            name: "service",
            timeout: cfg.non_subscribe_timeout(),
            max_idle_per_host: cfg.network.maximum_connections.max(1),
            user_agent: cfg.network.user_agent.clone(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// reqwest transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A transport backed by one `reqwest::Client` and its connection pool.
#[derive(Debug)]
pub struct ReqwestTransport {
    name: &'static str,
    http: RwLock<Option<Client>>,
}

impl ReqwestTransport {
    pub fn new(session: &SessionConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(session.timeout)
            .pool_max_idle_per_host(session.max_idle_per_host)
            .gzip(true);
        if let Some(ref ua) = session.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        let http = builder.build().map_err(from_reqwest)?;
        Ok(Self {
            name: session.name,
            http: RwLock::new(Some(http)),
        })
    }

    fn client(&self) -> Result<Client> {
        self.http.read().clone().ok_or(TransportError::Invalidated)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let http = self.client()?;
        let url = request.url();

        let method = match request.method {
            TransportMethod::Get => reqwest::Method::GET,
            TransportMethod::Post => reqwest::Method::POST,
            TransportMethod::Patch => reqwest::Method::PATCH,
            TransportMethod::Delete => reqwest::Method::DELETE,
        };
        let mut rb = http.request(method, &url).timeout(request.timeout);
        for (name, value) in &request.headers {
            rb = rb.header(name, value);
        }

        let body = match &request.body {
            RequestBody::None => None,
            RequestBody::Bytes(b) => Some(b.clone()),
            RequestBody::Stream(path) => Some(tokio::fs::read(path).await?),
        };
        if let Some(body) = body {
            if request.compress_body {
                rb = rb
                    .header("Content-Encoding", "gzip")
                    .body(gzip(&body)?);
            } else {
                rb = rb.body(body);
            }
        }

        let start = Instant::now();
        let resp = rb.send().await.map_err(from_reqwest)?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_ascii_lowercase(),
                    v.to_str().unwrap_or_default().to_owned(),
                )
            })
            .collect();

        let body = if request.response_as_file && (200..300).contains(&status) {
            ResponseBody::File(stream_to_file(resp).await?)
        } else {
            ResponseBody::Bytes(resp.bytes().await.map_err(from_reqwest)?.to_vec())
        };

        tracing::debug!(
            session = self.name,
            request_id = %request.identifier,
            status,
            attempt = request.attempt,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "transport exchange complete"
        );

        Ok(TransportResponse {
            status,
            headers,
            url,
            body,
        })
    }

    fn invalidate(&self) {
        if self.http.write().take().is_some() {
            tracing::debug!(session = self.name, "transport invalidated");
        }
    }
}

fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data)?;
    Ok(enc.finish()?)
}

async fn stream_to_file(mut resp: reqwest::Response) -> Result<tempfile::TempPath> {
    let (file, path) = tempfile::NamedTempFile::new()?.into_parts();
    let mut file = tokio::fs::File::from_std(file);
    while let Some(chunk) = resp.chunk().await.map_err(from_reqwest)? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(path)
}
