//! Presence heartbeat.
//!
//! Runs on its own interval, independent of the long-poll.  Failures are
//! reported only when `heartbeat_notifications` asks for them and never
//! touch the subscribe loop.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pn_domain::config::HeartbeatNotifications;
use pn_domain::trace::TraceEvent;
use pn_domain::{OperationType, StatusCategory};
use pn_transport::RequestBody;
use tokio_util::sync::CancellationToken;

use crate::builder::RequestParameters;
use crate::listener::ListenerRegistry;
use crate::network::NetworkEngine;
use crate::status::Status;
use crate::subscription::SharedSubscription;

pub struct HeartbeatManager {
    engine: Arc<NetworkEngine>,
    shared: SharedSubscription,
    listeners: Arc<ListenerRegistry>,
    interval: Option<Duration>,
    running: Mutex<Option<CancellationToken>>,
}

impl HeartbeatManager {
    pub fn new(
        engine: Arc<NetworkEngine>,
        shared: SharedSubscription,
        listeners: Arc<ListenerRegistry>,
    ) -> Self {
        let interval = engine.config().presence.effective_interval();
        Self {
            engine,
            shared,
            listeners,
            interval,
            running: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Start the interval task.  No-op when already running or when
    /// presence timeout is disabled.  Returns whether a task was started.
    pub fn start(&self) -> bool {
        let Some(period) = self.interval else {
            return false;
        };
        let mut running = self.running.lock();
        if running.is_some() {
            return false;
        }
        let token = CancellationToken::new();
        *running = Some(token.clone());

        let engine = self.engine.clone();
        let shared = self.shared.clone();
        let listeners = self.listeners.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = beat(&engine, &shared, &listeners) => {}
                }
            }
            tracing::debug!("heartbeat task stopped");
        });
        tracing::debug!(interval_secs = period.as_secs(), "heartbeat started");
        true
    }

    /// Stop the interval task.  No-op when not running.
    pub fn stop(&self) -> bool {
        match self.running.lock().take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

impl Drop for HeartbeatManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Send one heartbeat for the current non-presence set.
async fn beat(engine: &Arc<NetworkEngine>, shared: &SharedSubscription, listeners: &ListenerRegistry) {
    let (channels, groups, state) = {
        let snap = shared.read();
        (
            snap.set.non_presence_channels(),
            snap.set.non_presence_groups(),
            snap.state_json(),
        )
    };
    if channels.is_empty() && groups.is_empty() {
        return;
    }
    let notifications = engine.config().presence.heartbeat_notifications;
    let params = RequestParameters::new()
        .path_list("channels", &channels)
        .query("heartbeat", engine.config().presence.heartbeat_value_secs)
        .query_list("channel-group", &groups)
        .query_opt("state", state)
        .targets(&channels);

    let result = engine
        .process_operation(OperationType::Heartbeat, params, RequestBody::None)
        .await;
    TraceEvent::HeartbeatSent {
        channels: channels.len(),
        groups: groups.len(),
        ok: result.is_ok(),
    }
    .emit();
    if let Some(status) = report(result.map(|_| ()), notifications, channels, groups) {
        listeners.emit_status(&status);
    }
}

fn report(
    result: Result<(), Status>,
    notifications: HeartbeatNotifications,
    channels: Vec<String>,
    groups: Vec<String>,
) -> Option<Status> {
    match result {
        Ok(()) if notifications.reports_success() => Some(
            Status::info(OperationType::Heartbeat, StatusCategory::HeartbeatSuccess)
                .with_code(200)
                .with_channels(channels, groups),
        ),
        Err(failure) if notifications.reports_failure() => {
            tracing::debug!(category = %failure.category, "heartbeat failed");
            let mut status = Status::error(
                OperationType::Heartbeat,
                StatusCategory::HeartbeatFailure,
                failure.message,
            )
            .with_code(failure.status_code)
            .with_channels(channels, groups);
            status.retry = failure.retry;
            Some(status)
        }
        Err(failure) => {
            tracing::debug!(category = %failure.category, "heartbeat failed (not reported)");
            None
        }
        Ok(()) => None,
    }
}
