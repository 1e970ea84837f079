//! Subscribe loop state machine.
//!
//! One actor task owns the in-flight long-poll, the retry timer and all
//! writes to the subscription set, client state and cursor.  Commands
//! from the client facade are applied strictly in order, each one
//! acknowledged after its mutation, so request N+1 always reflects every
//! mutation that completed before request N finished.
//!
//! ```text
//!   Idle ──subscribe──▶ Connecting ──ok──▶ Connected ◀──ok── Reconnecting
//!    ▲                      │                  │                  ▲  │
//!    └──unsubscribe all─────┴──────────────────┴──retriable err───┘  │
//!                                  fatal err / give up ──▶ Disconnected
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use pn_domain::config::ReconnectFrom;
use pn_domain::event::{Event, SubscribeBatch};
use pn_domain::trace::TraceEvent;
use pn_domain::{Cursor, Endpoint, OperationType, StatusCategory};
use pn_transport::{RequestBody, RetryOutcome, ScheduledRetry};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};

use crate::builder::RequestParameters;
use crate::heartbeat::HeartbeatManager;
use crate::listener::ListenerRegistry;
use crate::network::{failure_kind, NetworkEngine};
use crate::parser::ParsedData;
use crate::status::{RetryHandle, Status};
use crate::subscription::SharedSubscription;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// States and commands
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscribeState {
    /// Nothing subscribed.
    #[default]
    Idle,
    /// First long-poll in flight.
    Connecting,
    Connected,
    /// Backing off after a retriable failure.
    Reconnecting,
    /// Stopped by the caller, a fatal error, or retry exhaustion.
    Disconnected,
}

impl SubscribeState {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscribeState::Idle => "idle",
            SubscribeState::Connecting => "connecting",
            SubscribeState::Connected => "connected",
            SubscribeState::Reconnecting => "reconnecting",
            SubscribeState::Disconnected => "disconnected",
        }
    }

    pub fn is_active(self) -> bool {
        matches!(
            self,
            SubscribeState::Connecting | SubscribeState::Connected | SubscribeState::Reconnecting
        )
    }
}

impl fmt::Display for SubscribeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to subscribe to.
#[derive(Debug, Clone, Default)]
pub struct SubscribeRequest {
    pub channels: Vec<String>,
    pub groups: Vec<String>,
    /// Also receive presence events for these names.
    pub with_presence: bool,
    /// Start from this timetoken instead of the current cursor.
    pub timetoken: Option<u64>,
}

pub(crate) type Ack = oneshot::Sender<()>;

pub(crate) enum Command {
    Subscribe(SubscribeRequest, Ack),
    Unsubscribe {
        channels: Vec<String>,
        groups: Vec<String>,
        ack: Ack,
    },
    UnsubscribeAll(Ack),
    Reconnect {
        timetoken: Option<u64>,
        ack: Ack,
    },
    Disconnect(Ack),
    /// Merge into the cached client state; `null` removes an entry.
    SetState {
        state: HashMap<String, Value>,
        ack: Ack,
    },
    Shutdown(Ack),
}

/// Client-side end of the actor.
pub(crate) struct SubscribeHandle {
    pub commands: mpsc::UnboundedSender<Command>,
    pub state: watch::Receiver<SubscribeState>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Redelivery filter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Remembers the last `capacity` (publish timetoken, channel) pairs so a
/// catch-up after reconnect does not deliver a message twice.
struct DedupCache {
    capacity: usize,
    order: VecDeque<(u64, String)>,
    seen: HashSet<(u64, String)>,
}

impl DedupCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// `false` when the event was already delivered.
    fn admit(&mut self, event: &Event) -> bool {
        if self.capacity == 0 {
            return true;
        }
        let key = match event {
            Event::Message(e) | Event::Signal(e) => (e.timetoken, e.channel.clone()),
            Event::File(e) => (e.timetoken, e.channel.clone()),
            _ => return true,
        };
        if key.0 == 0 {
            return true;
        }
        if !self.seen.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
        true
    }

    fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Actor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

type Poll = BoxFuture<'static, Result<SubscribeBatch, Status>>;

/// Backoff timer plus the wait polled across loop iterations.
struct PendingRetry {
    handle: ScheduledRetry,
    wait: BoxFuture<'static, RetryOutcome>,
}

impl PendingRetry {
    fn new(handle: ScheduledRetry) -> Self {
        let timer = handle.clone();
        Self {
            handle,
            wait: Box::pin(async move { timer.wait().await }),
        }
    }
}

pub(crate) struct SubscribeLoop {
    engine: Arc<NetworkEngine>,
    shared: SharedSubscription,
    listeners: Arc<ListenerRegistry>,
    heartbeat: Arc<HeartbeatManager>,
    state_tx: watch::Sender<SubscribeState>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// For retry handles; weak so dropping the client stops the actor.
    self_tx: mpsc::WeakUnboundedSender<Command>,
    /// Pending automatic retry, shared with retry handles.
    retry_slot: Arc<Mutex<Option<ScheduledRetry>>>,
    poll: Option<Poll>,
    timer: Option<PendingRetry>,
    attempt: u32,
    /// A failure happened since the last success.
    recovering: bool,
    outage_announced: bool,
    dedup: DedupCache,
}

pub(crate) fn spawn(
    engine: Arc<NetworkEngine>,
    shared: SharedSubscription,
    listeners: Arc<ListenerRegistry>,
    heartbeat: Arc<HeartbeatManager>,
) -> SubscribeHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(SubscribeState::Idle);
    let cache = engine.config().subscribe.maximum_messages_cache_size;
    let actor = SubscribeLoop {
        engine,
        shared,
        listeners,
        heartbeat,
        state_tx,
        commands: rx,
        self_tx: tx.downgrade(),
        retry_slot: Arc::new(Mutex::new(None)),
        poll: None,
        timer: None,
        attempt: 0,
        recovering: false,
        outage_announced: false,
        dedup: DedupCache::new(cache),
    };
    tokio::spawn(actor.run());
    SubscribeHandle {
        commands: tx,
        state: state_rx,
    }
}

async fn next_poll(poll: &mut Option<Poll>) -> Result<SubscribeBatch, Status> {
    match poll {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_timer(timer: &mut Option<PendingRetry>) -> RetryOutcome {
    match timer {
        Some(t) => (&mut t.wait).await,
        None => std::future::pending().await,
    }
}

impl SubscribeLoop {
    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Shutdown(ack)) => {
                        self.halt(SubscribeState::Idle);
                        let _ = ack.send(());
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        self.halt(SubscribeState::Idle);
                        break;
                    }
                },
                outcome = next_poll(&mut self.poll) => {
                    self.poll = None;
                    match outcome {
                        Ok(batch) => self.on_success(batch),
                        Err(status) => self.on_failure(status),
                    }
                }
                fired = next_timer(&mut self.timer) => {
                    self.timer = None;
                    *self.retry_slot.lock() = None;
                    self.on_timer(fired);
                }
            }
        }
        tracing::debug!("subscribe loop stopped");
    }

    fn state(&self) -> SubscribeState {
        *self.state_tx.borrow()
    }

    fn transition(&self, to: SubscribeState) {
        let from = self.state();
        if from == to {
            return;
        }
        self.state_tx.send_replace(to);
        tracing::debug!(from = %from, to = %to, "subscribe state changed");
        TraceEvent::SubscribeStateChanged {
            from: from.to_string(),
            to: to.to_string(),
        }
        .emit();
    }

    fn names(&self) -> (Vec<String>, Vec<String>) {
        let snap = self.shared.read();
        (snap.set.channels(), snap.set.groups())
    }

    fn emit(&self, status: Status) {
        self.listeners.emit_status(&status);
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.cancel();
        }
        *self.retry_slot.lock() = None;
    }

    /// Stop polling and retrying; heartbeat stops too.
    fn halt(&mut self, to: SubscribeState) {
        self.poll = None;
        self.cancel_timer();
        self.heartbeat.stop();
        self.attempt = 0;
        self.outage_announced = false;
        self.transition(to);
    }

    // ── commands ────────────────────────────────────────────────────

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Subscribe(req, ack) => {
                self.subscribe(req);
                let _ = ack.send(());
            }
            Command::Unsubscribe {
                channels,
                groups,
                ack,
            } => {
                self.unsubscribe(&channels, &groups);
                let _ = ack.send(());
            }
            Command::UnsubscribeAll(ack) => {
                let (channels, groups) = self.names();
                self.unsubscribe(&channels, &groups);
                let _ = ack.send(());
            }
            Command::Reconnect { timetoken, ack } => {
                self.reconnect(timetoken);
                let _ = ack.send(());
            }
            Command::Disconnect(ack) => {
                self.disconnect();
                let _ = ack.send(());
            }
            Command::SetState { state, ack } => {
                let mut snap = self.shared.write();
                for (name, value) in state {
                    if value.is_null() {
                        snap.state.remove(&name);
                    } else {
                        snap.state.insert(name, value);
                    }
                }
                drop(snap);
                let _ = ack.send(());
            }
            Command::Shutdown(ack) => {
                // Handled in `run`.
                let _ = ack.send(());
            }
        }
    }

    fn subscribe(&mut self, req: SubscribeRequest) {
        let (added, empty) = {
            let mut snap = self.shared.write();
            let mut added = snap.set.add_channels(&req.channels, req.with_presence);
            added.extend(snap.set.add_groups(&req.groups, req.with_presence));
            if let Some(tt) = req.timetoken {
                snap.cursor = Cursor::new(tt, 0);
            }
            (added, snap.set.is_empty())
        };
        if empty {
            return;
        }
        if added.is_empty() && req.timetoken.is_none() && self.state().is_active() {
            return;
        }
        tracing::debug!(added = ?added, "subscription set grew");
        self.resubscribe(req.timetoken.is_none());
        self.heartbeat.start();
    }

    fn unsubscribe(&mut self, channels: &[String], groups: &[String]) {
        let (removed_channels, removed_groups, now_empty) = {
            let mut snap = self.shared.write();
            let rc = snap.set.remove_channels(channels);
            let rg = snap.set.remove_groups(groups);
            snap.prune_state();
            let empty = snap.set.is_empty();
            if empty {
                snap.cursor = Cursor::ZERO;
            }
            (rc, rg, empty)
        };
        if removed_channels.is_empty() && removed_groups.is_empty() {
            return;
        }

        self.send_leave(&removed_channels, &removed_groups);
        self.emit(
            Status::info(OperationType::Unsubscribe, StatusCategory::Disconnected)
                .with_channels(removed_channels, removed_groups),
        );

        if now_empty {
            self.recovering = false;
            self.dedup.clear();
            self.halt(SubscribeState::Idle);
        } else if self.state().is_active() {
            self.resubscribe(true);
        }
    }

    /// Best-effort presence leave for the removed non-presence names.
    fn send_leave(&self, channels: &[String], groups: &[String]) {
        if self.engine.config().subscribe.suppress_leave_events {
            return;
        }
        let strip = |names: &[String]| -> Vec<String> {
            names
                .iter()
                .filter(|n| !n.ends_with(pn_domain::PRESENCE_SUFFIX))
                .cloned()
                .collect()
        };
        let channels = strip(channels);
        let groups = strip(groups);
        if channels.is_empty() && groups.is_empty() {
            return;
        }
        let params = RequestParameters::new()
            .path_list("channels", &channels)
            .query_list("channel-group", &groups)
            .targets(&channels);
        let engine = self.engine.clone();
        tokio::spawn(async move {
            if let Err(status) = engine
                .process_operation(OperationType::Unsubscribe, params, RequestBody::None)
                .await
            {
                tracing::debug!(category = %status.category, "leave failed");
            }
        });
    }

    fn reconnect(&mut self, timetoken: Option<u64>) {
        if self.shared.read().set.is_empty() {
            return;
        }
        if let Some(tt) = timetoken {
            self.shared.write().cursor = Cursor::new(tt, 0);
        }
        self.attempt = 0;
        self.heartbeat.start();
        // A pending backoff is cut short; its wait resolves as fired and
        // `on_timer` issues the poll.
        if timetoken.is_none() && self.timer.as_ref().is_some_and(|t| t.handle.fire_now()) {
            tracing::debug!("pending reconnect fired early");
            return;
        }
        self.resubscribe(false);
    }

    fn disconnect(&mut self) {
        if self.state().is_active() {
            let (channels, groups) = self.names();
            self.halt(SubscribeState::Disconnected);
            self.emit(
                Status::info(OperationType::Subscribe, StatusCategory::Disconnected)
                    .with_channels(channels, groups),
            );
        }
        self.recovering = false;
    }

    /// Drop any in-flight poll without a status and issue a new one.
    ///
    /// The cursor is kept unless the list changed and
    /// `keep_timetoken_on_list_change` is off.
    fn resubscribe(&mut self, list_changed: bool) {
        let state = self.state();
        match state {
            SubscribeState::Idle | SubscribeState::Disconnected => {
                self.transition(SubscribeState::Connecting)
            }
            SubscribeState::Reconnecting => self.cancel_timer(),
            SubscribeState::Connecting | SubscribeState::Connected => {}
        }
        if list_changed
            && matches!(state, SubscribeState::Connected | SubscribeState::Reconnecting)
            && !self.engine.config().subscribe.keep_timetoken_on_list_change
        {
            self.shared.write().cursor = Cursor::ZERO;
        }
        self.poll = None;
        self.start_poll();
    }

    // ── long-poll ───────────────────────────────────────────────────

    fn start_poll(&mut self) {
        let config = self.engine.config();
        let heartbeat = config.presence.heartbeat_value_secs;
        let params = {
            let snap = self.shared.read();
            let mut params = RequestParameters::new()
                .path_list("channels", &snap.set.channels())
                .query("tt", snap.cursor.timetoken);
            if snap.cursor.region != 0 {
                params = params.query("tr", snap.cursor.region);
            }
            params
                .query_list("channel-group", &snap.set.groups())
                .query_opt("filter-expr", config.subscribe.filter_expression.as_ref())
                .query_opt("heartbeat", (heartbeat > 0).then_some(heartbeat))
                .query_opt("state", snap.state_json())
        };

        let mut request = match self
            .engine
            .build(OperationType::Subscribe, &params, RequestBody::None)
        {
            Ok(request) => request,
            Err(status) => {
                self.on_failure(status);
                return;
            }
        };
        request.attempt = self.attempt;
        tracing::debug!(
            tt = request.query_value("tt").unwrap_or_default(),
            attempt = self.attempt,
            "long-poll issued"
        );

        let engine = self.engine.clone();
        self.poll = Some(Box::pin(async move {
            let response = engine.send(OperationType::Subscribe, request).await?;
            match engine.parse(OperationType::Subscribe, response, &[])? {
                ParsedData::Subscribe(batch) => Ok(batch),
                other => Err(Status::malformed(
                    OperationType::Subscribe,
                    format!("unexpected subscribe result: {other:?}"),
                )),
            }
        }));
    }

    fn on_success(&mut self, batch: SubscribeBatch) {
        let previous = self.state();
        self.attempt = 0;

        let (last, cursor) = {
            let mut snap = self.shared.write();
            let last = snap.cursor;
            if batch.cursor.timetoken >= snap.cursor.timetoken {
                snap.cursor = batch.cursor;
            } else {
                tracing::warn!(
                    current = %snap.cursor,
                    received = %batch.cursor,
                    "ignoring cursor regression"
                );
            }
            (last, snap.cursor)
        };
        TraceEvent::CursorAdvanced {
            timetoken: cursor.timetoken,
            region: cursor.region,
            events: batch.events.len(),
        }
        .emit();

        if previous != SubscribeState::Connected {
            self.transition(SubscribeState::Connected);
            let category = if self.recovering {
                StatusCategory::Reconnected
            } else {
                StatusCategory::Connected
            };
            let (channels, groups) = self.names();
            self.emit(
                Status::info(OperationType::Subscribe, category)
                    .with_code(200)
                    .with_channels(channels, groups)
                    .with_cursors(last, cursor),
            );
            self.recovering = false;
            self.outage_announced = false;
        }

        let threshold = self.engine.config().subscribe.request_message_count_threshold;
        if threshold > 0 && batch.events.len() >= threshold {
            let mut status = Status::info(
                OperationType::Subscribe,
                StatusCategory::RequestMessageCountExceeded,
            );
            status.message = format!("{} events in one response", batch.events.len());
            self.emit(status);
        }

        for event in &batch.events {
            if self.dedup.admit(event) {
                self.listeners.emit_event(event);
                if let Some(reason) = event.decryption_error() {
                    self.emit(
                        Status::error(
                            OperationType::Subscribe,
                            StatusCategory::DecryptionError,
                            reason,
                        )
                        .with_channels(vec![event.channel().to_owned()], Vec::new()),
                    );
                }
            } else {
                tracing::debug!(
                    channel = %event.channel(),
                    timetoken = event.timetoken(),
                    "dropping redelivered event"
                );
            }
        }

        self.start_poll();
    }

    fn on_failure(&mut self, status: Status) {
        let (channels, groups) = self.names();
        let cursor = self.shared.read().cursor;

        if matches!(
            status.category,
            StatusCategory::Cancelled | StatusCategory::ClientInvalidated
        ) {
            self.emit(status.with_channels(channels, groups));
            self.halt(SubscribeState::Disconnected);
            return;
        }

        let kind = failure_kind(&status);
        if !kind.is_retriable() {
            tracing::warn!(
                category = %status.category,
                code = status.status_code,
                message = %status.message,
                "long-poll failed permanently"
            );
            let affected = !status.affected_channels.is_empty() || !status.affected_groups.is_empty();
            let status = if affected {
                status
            } else {
                status.with_channels(channels, groups)
            };
            self.emit(status);
            self.recovering = true;
            self.halt(SubscribeState::Disconnected);
            return;
        }

        let delay = self
            .engine
            .retry_config()
            .and_then(|p| p.retry_delay(Endpoint::MessageSubscribe, self.attempt, kind));
        match delay {
            Some(delay) => {
                self.recovering = true;
                self.transition(SubscribeState::Reconnecting);
                self.attempt += 1;
                tracing::info!(
                    attempt = self.attempt,
                    delay_ms = delay.as_millis() as u64,
                    category = %status.category,
                    "long-poll failed, reconnecting"
                );
                TraceEvent::RetryScheduled {
                    operation: OperationType::Subscribe.to_string(),
                    attempt: self.attempt,
                    delay_ms: delay.as_millis() as u64,
                    reason: status.category.to_string(),
                }
                .emit();

                let timer = ScheduledRetry::new(delay);
                *self.retry_slot.lock() = Some(timer.clone());
                self.timer = Some(PendingRetry::new(timer));

                if !self.outage_announced {
                    self.outage_announced = true;
                    self.emit(
                        Status::error(
                            OperationType::Subscribe,
                            StatusCategory::UnexpectedDisconnect,
                            status.message,
                        )
                        .with_code(status.status_code)
                        .with_channels(channels, groups)
                        .with_cursors(cursor, cursor)
                        .with_retry(self.retry_handle()),
                    );
                }
            }
            None => {
                tracing::warn!(
                    attempts = self.attempt,
                    category = %status.category,
                    "long-poll retries exhausted"
                );
                let message = format!("{}: {}", status.category, status.message);
                self.emit(
                    Status::error(OperationType::Subscribe, StatusCategory::Disconnected, message)
                        .with_code(status.status_code)
                        .with_channels(channels, groups)
                        .with_cursors(cursor, cursor)
                        .with_retry(self.retry_handle()),
                );
                self.recovering = true;
                self.halt(SubscribeState::Disconnected);
            }
        }
    }

    fn on_timer(&mut self, outcome: RetryOutcome) {
        match outcome {
            RetryOutcome::Fired => {
                if self.engine.config().subscribe.reconnect_from == ReconnectFrom::Now {
                    self.shared.write().cursor = Cursor::ZERO;
                }
                self.start_poll();
            }
            RetryOutcome::Cancelled => {
                tracing::debug!("automatic reconnect cancelled");
                self.poll = None;
                self.heartbeat.stop();
                self.transition(SubscribeState::Disconnected);
            }
        }
    }

    /// Manual control for subscribe failures: `retry()` reconnects at the
    /// current cursor, `cancel_automatic_retry()` stops the pending timer.
    fn retry_handle(&self) -> RetryHandle {
        let commands = self.self_tx.clone();
        let slot = self.retry_slot.clone();
        RetryHandle::new(move || {
            let commands = commands.clone();
            Box::pin(async move {
                let gone = || Status::invalidated(OperationType::Subscribe);
                let tx = commands.upgrade().ok_or_else(gone)?;
                let (ack, done) = oneshot::channel();
                tx.send(Command::Reconnect {
                    timetoken: None,
                    ack,
                })
                .map_err(|_| gone())?;
                done.await.map_err(|_| gone())?;
                Ok(ParsedData::Acknowledgment)
            })
        })
        .with_cancel(move || slot.lock().as_ref().map(ScheduledRetry::cancel).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pn_domain::event::MessageEvent;

    fn message(tt: u64, channel: &str) -> Event {
        Event::Message(MessageEvent {
            channel: channel.into(),
            subscription: None,
            timetoken: tt,
            publisher: None,
            payload: Value::Null,
            user_metadata: None,
            custom_message_type: None,
            decryption_error: None,
        })
    }

    #[test]
    fn dedup_drops_redelivery() {
        let mut cache = DedupCache::new(10);
        assert!(cache.admit(&message(1, "a")));
        assert!(cache.admit(&message(1, "b")));
        assert!(!cache.admit(&message(1, "a")));
    }

    #[test]
    fn dedup_is_bounded() {
        let mut cache = DedupCache::new(2);
        assert!(cache.admit(&message(1, "a")));
        assert!(cache.admit(&message(2, "a")));
        assert!(cache.admit(&message(3, "a")));
        // 1 was evicted.
        assert!(cache.admit(&message(1, "a")));
        assert_eq!(cache.order.len(), 2);
    }

    #[test]
    fn zero_capacity_disables_dedup() {
        let mut cache = DedupCache::new(0);
        assert!(cache.admit(&message(1, "a")));
        assert!(cache.admit(&message(1, "a")));
    }

    #[test]
    fn active_states() {
        assert!(SubscribeState::Reconnecting.is_active());
        assert!(!SubscribeState::Disconnected.is_active());
        assert!(!SubscribeState::Idle.is_active());
        assert_eq!(SubscribeState::Connecting.to_string(), "connecting");
    }
}
