//! Network engine: two transport sessions, automatic retry, bulk
//! cancellation, invalidation and latency telemetry.
//!
//! Every REST operation funnels through [`NetworkEngine::process_operation`].
//! The subscribe loop drives its own retries and uses the lower-level
//! [`NetworkEngine::send`].

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use pn_crypto::CryptoModule;
use pn_domain::config::Config;
use pn_domain::trace::TraceEvent;
use pn_domain::{Endpoint, OperationType, StatusCategory};
use pn_transport::{
    CancelGuard, CancelRegistry, FailureKind, RequestBody, RequestRetryConfig, ReqwestTransport, RetryOutcome,
    ScheduledRetry, SessionConfig, Transport, TransportError, TransportRequest, TransportResponse,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::builder::{build_request, RequestParameters};
use crate::parser::{parse, ParseContext, ParsedData};
use crate::status::{RetryHandle, Status};

/// Window of the rolling latency average.
const LATENCY_WINDOW: Duration = Duration::from_secs(60);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Failure classification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Status for a failure below HTTP.
pub fn transport_status(operation: OperationType, e: &TransportError) -> Status {
    let category = match e {
        TransportError::Timeout(_) => StatusCategory::Timeout,
        TransportError::Network(_) => StatusCategory::NetworkIssues,
        TransportError::Tls(_) => StatusCategory::TlsConnectionFailed,
        TransportError::Cancelled => StatusCategory::Cancelled,
        TransportError::Invalidated => StatusCategory::ClientInvalidated,
        TransportError::Io(_) | TransportError::Build(_) => StatusCategory::Unknown,
    };
    Status::error(operation, category, e.to_string())
}

/// Retry class of an error status.
pub fn failure_kind(status: &Status) -> FailureKind {
    match status.category {
        StatusCategory::Timeout => FailureKind::Timeout,
        StatusCategory::NetworkIssues => FailureKind::Network,
        StatusCategory::TlsConnectionFailed => FailureKind::Tls,
        StatusCategory::Cancelled | StatusCategory::ClientInvalidated => FailureKind::Cancelled,
        StatusCategory::MalformedResponse => FailureKind::MalformedResponse,
        StatusCategory::DecryptionError | StatusCategory::EncryptionError => FailureKind::Crypto,
        _ if status.status_code != 0 => FailureKind::Http(status.status_code),
        // No response and no transport error class: an I/O failure below
        // HTTP.
        StatusCategory::Unknown => FailureKind::Network,
        _ => FailureKind::Rejected,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Latency telemetry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default)]
struct LatencyTracker {
    samples: Mutex<HashMap<Endpoint, VecDeque<(Instant, Duration)>>>,
}

impl LatencyTracker {
    fn record(&self, endpoint: Endpoint, latency: Duration) {
        if endpoint.telemetry_key().is_none() {
            return;
        }
        let now = Instant::now();
        let mut samples = self.samples.lock();
        let queue = samples.entry(endpoint).or_default();
        queue.push_back((now, latency));
        prune(queue, now);
    }

    /// `l_<key>` query pairs: average seconds over the window.
    fn query(&self) -> Vec<(String, String)> {
        let now = Instant::now();
        let mut samples = self.samples.lock();
        let mut out = Vec::new();
        for (endpoint, queue) in samples.iter_mut() {
            prune(queue, now);
            let Some(key) = endpoint.telemetry_key() else { continue };
            if queue.is_empty() {
                continue;
            }
            let total: Duration = queue.iter().map(|(_, d)| *d).sum();
            let average = total.as_secs_f64() / queue.len() as f64;
            out.push((format!("l_{key}"), format!("{average:.3}")));
        }
        out.sort();
        out
    }
}

fn prune(queue: &mut VecDeque<(Instant, Duration)>, now: Instant) {
    while let Some((at, _)) = queue.front() {
        if now.duration_since(*at) > LATENCY_WINDOW {
            queue.pop_front();
        } else {
            break;
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct NetworkEngine {
    config: Arc<Config>,
    subscribe_session: Arc<dyn Transport>,
    service_session: Arc<dyn Transport>,
    /// Bounds concurrent service-session requests.
    permits: Semaphore,
    cancels: Arc<CancelRegistry>,
    /// Fires on invalidation; stops requests bulk cancel cannot reach.
    shutdown: CancellationToken,
    retry: Option<RequestRetryConfig>,
    invalidated: AtomicBool,
    latency: LatencyTracker,
    crypto: Option<Arc<CryptoModule>>,
}

impl NetworkEngine {
    pub fn new(
        config: Arc<Config>,
        subscribe_session: Arc<dyn Transport>,
        service_session: Arc<dyn Transport>,
        crypto: Option<Arc<CryptoModule>>,
    ) -> Arc<Self> {
        let retry = RequestRetryConfig::from_config(&config.retry);
        let permits = Semaphore::new(config.network.maximum_connections.max(1));
        Arc::new(Self {
            config,
            subscribe_session,
            service_session,
            permits,
            cancels: Arc::new(CancelRegistry::new()),
            shutdown: CancellationToken::new(),
            retry,
            invalidated: AtomicBool::new(false),
            latency: LatencyTracker::default(),
            crypto,
        })
    }

    /// Engine over two reqwest sessions built from `config`.
    pub fn with_reqwest(
        config: Arc<Config>,
        crypto: Option<Arc<CryptoModule>>,
    ) -> Result<Arc<Self>, TransportError> {
        let subscribe = ReqwestTransport::new(&SessionConfig::long_poll(&config))?;
        let service = ReqwestTransport::new(&SessionConfig::service(&config))?;
        Ok(Self::new(config, Arc::new(subscribe), Arc::new(service), crypto))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn crypto(&self) -> Option<&CryptoModule> {
        self.crypto.as_deref()
    }

    pub fn shared_crypto(&self) -> Option<Arc<CryptoModule>> {
        self.crypto.clone()
    }

    pub fn retry_config(&self) -> Option<&RequestRetryConfig> {
        self.retry.as_ref()
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    /// Build the transport request for `operation`.
    pub fn build(
        &self,
        operation: OperationType,
        params: &RequestParameters,
        body: RequestBody,
    ) -> Result<TransportRequest, Status> {
        if self.is_invalidated() {
            return Err(Status::invalidated(operation));
        }
        build_request(&self.config, operation, params, body, self.latency.query())
            .map_err(|e| Status::error(operation, StatusCategory::BadRequest, e.to_string()))
    }

    /// Parse a response with this engine's crypto module.
    pub fn parse(
        &self,
        operation: OperationType,
        response: TransportResponse,
        channels: &[String],
    ) -> Result<ParsedData, Status> {
        let ctx = ParseContext {
            crypto: self.crypto(),
            channels,
        };
        parse(operation, response, &ctx)
    }

    /// Build, send with automatic retry, parse.
    ///
    /// A terminal failure carries a [`RetryHandle`] that re-issues the
    /// operation from scratch, unless it was a cancellation or the engine
    /// is invalidated.
    pub async fn process_operation(
        self: &Arc<Self>,
        operation: OperationType,
        params: RequestParameters,
        body: RequestBody,
    ) -> Result<ParsedData, Status> {
        let request = self.build(operation, &params, body.clone())?;
        match self.execute(operation, request, &params.channels).await {
            Ok(data) => Ok(data),
            Err(status) if allows_manual_retry(status.category) => {
                let engine = Arc::clone(self);
                Err(status.with_retry(RetryHandle::new(move || {
                    engine.clone().process_boxed(operation, params.clone(), body.clone())
                })))
            }
            Err(status) => Err(status),
        }
    }

    fn process_boxed(
        self: Arc<Self>,
        operation: OperationType,
        params: RequestParameters,
        body: RequestBody,
    ) -> BoxFuture<'static, Result<ParsedData, Status>> {
        Box::pin(async move { self.process_operation(operation, params, body).await })
    }

    async fn execute(
        &self,
        operation: OperationType,
        mut request: TransportRequest,
        channels: &[String],
    ) -> Result<ParsedData, Status> {
        let guard = self.register(&request);
        let endpoint = operation.endpoint();
        loop {
            let started = Instant::now();
            let sent = tokio::select! {
                biased;
                _ = self.stopped(guard.as_ref()) => return Err(self.cancelled(operation)),
                r = self.dispatch(operation, request.clone()) => r,
            };
            let status = match sent {
                Ok(response) => {
                    let elapsed = started.elapsed();
                    self.latency.record(endpoint, elapsed);
                    TraceEvent::RequestCompleted {
                        operation: operation.to_string(),
                        status: response.status,
                        duration_ms: elapsed.as_millis() as u64,
                        attempt: request.attempt,
                    }
                    .emit();
                    match self.parse(operation, response, channels) {
                        Ok(data) => return Ok(data),
                        Err(status) => status,
                    }
                }
                Err(e) => transport_status(operation, &e),
            };

            let kind = failure_kind(&status);
            let delay = match (&self.retry, request.retriable) {
                (Some(policy), true) => policy.retry_delay(endpoint, request.attempt, kind),
                _ => None,
            };
            let Some(delay) = delay else {
                return Err(status);
            };

            tracing::debug!(
                operation = %operation,
                attempt = request.attempt + 1,
                delay_ms = delay.as_millis() as u64,
                category = %status.category,
                "retrying request"
            );
            TraceEvent::RetryScheduled {
                operation: operation.to_string(),
                attempt: request.attempt + 1,
                delay_ms: delay.as_millis() as u64,
                reason: status.category.to_string(),
            }
            .emit();

            let timer = ScheduledRetry::new(delay);
            let outcome = tokio::select! {
                _ = self.stopped(guard.as_ref()) => {
                    timer.cancel();
                    RetryOutcome::Cancelled
                }
                outcome = timer.wait() => outcome,
            };
            if outcome == RetryOutcome::Cancelled {
                return Err(self.cancelled(operation));
            }
            if self.is_invalidated() {
                return Err(Status::invalidated(operation));
            }
            request = request.next_attempt();
        }
    }

    /// Only cancellable requests are visible to `cancel_all_operations`.
    fn register(&self, request: &TransportRequest) -> Option<CancelGuard> {
        request
            .cancellable
            .then(|| self.cancels.register(request.identifier, &request.path))
    }

    /// Resolves once the request has to stop: on bulk cancel when it is
    /// registered, and on invalidation always.
    async fn stopped(&self, guard: Option<&CancelGuard>) {
        match guard {
            Some(guard) => tokio::select! {
                _ = guard.token().cancelled() => {}
                _ = self.shutdown.cancelled() => {}
            },
            None => self.shutdown.cancelled().await,
        }
    }

    /// Cancellation caused by `invalidate` reports as invalidation.
    fn cancelled(&self, operation: OperationType) -> Status {
        if self.is_invalidated() {
            Status::invalidated(operation)
        } else {
            Status::cancelled(operation)
        }
    }

    async fn dispatch(
        &self,
        operation: OperationType,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        if self.is_invalidated() {
            return Err(TransportError::Invalidated);
        }
        if operation.is_long_poll() {
            return self.subscribe_session.send(request).await;
        }
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| TransportError::Invalidated)?;
        self.service_session.send(request).await
    }

    /// One exchange without engine-level retry; the subscribe loop
    /// schedules its own.  Non-2xx responses are returned as-is.
    pub async fn send(
        &self,
        operation: OperationType,
        request: TransportRequest,
    ) -> Result<TransportResponse, Status> {
        let guard = self.register(&request);
        let started = Instant::now();
        let attempt = request.attempt;
        let sent = tokio::select! {
            biased;
            _ = self.stopped(guard.as_ref()) => return Err(self.cancelled(operation)),
            r = self.dispatch(operation, request) => r,
        };
        match sent {
            Ok(response) => {
                self.latency.record(operation.endpoint(), started.elapsed());
                TraceEvent::RequestCompleted {
                    operation: operation.to_string(),
                    status: response.status,
                    duration_ms: started.elapsed().as_millis() as u64,
                    attempt,
                }
                .emit();
                Ok(response)
            }
            Err(e) => Err(transport_status(operation, &e)),
        }
    }

    /// Cancel in-flight requests whose path starts with `path_prefix`.
    pub fn cancel_all_operations(&self, path_prefix: &str) -> usize {
        let hit = self.cancels.cancel_all(path_prefix);
        if hit > 0 {
            tracing::debug!(prefix = path_prefix, cancelled = hit, "cancelled in-flight requests");
        }
        hit
    }

    /// Release both sessions.  Idempotent; later calls fail fast.
    pub fn invalidate(&self) {
        if self.invalidated.swap(true, Ordering::AcqRel) {
            return;
        }
        let in_flight = self.cancels.in_flight();
        self.permits.close();
        self.shutdown.cancel();
        self.subscribe_session.invalidate();
        self.service_session.invalidate();
        tracing::info!(in_flight, "network engine invalidated");
    }
}

/// Cancellation and invalidation never carry a retry handle.
fn allows_manual_retry(category: StatusCategory) -> bool {
    !matches!(category, StatusCategory::Cancelled | StatusCategory::ClientInvalidated)
}
