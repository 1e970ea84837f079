//! Events listener registry.
//!
//! Listeners are called synchronously from the subscribe actor, in batch
//! order, so a slow listener delays the next long-poll.  Use
//! [`ChannelListener`] to move work onto another task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use pn_domain::event::{
    Event, FileEvent, MessageActionEvent, MessageEvent, ObjectEvent, PresenceEvent, SignalEvent,
};
use tokio::sync::mpsc;

use crate::status::Status;

/// Typed callbacks for real-time traffic.  Every method defaults to a
/// no-op.
pub trait EventListener: Send + Sync {
    fn on_message(&self, _event: &MessageEvent) {}
    fn on_signal(&self, _event: &SignalEvent) {}
    fn on_presence(&self, _event: &PresenceEvent) {}
    fn on_object(&self, _event: &ObjectEvent) {}
    fn on_message_action(&self, _event: &MessageActionEvent) {}
    fn on_file(&self, _event: &FileEvent) {}
    fn on_status(&self, _status: &Status) {}
}

/// Identifier returned by [`ListenerRegistry::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn EventListener>)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(l, _)| *l != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<dyn EventListener>> {
        self.listeners.read().iter().map(|(_, l)| l.clone()).collect()
    }

    pub fn emit_event(&self, event: &Event) {
        for listener in self.snapshot() {
            match event {
                Event::Message(e) => listener.on_message(e),
                Event::Signal(e) => listener.on_signal(e),
                Event::Presence(e) => listener.on_presence(e),
                Event::Object(e) => listener.on_object(e),
                Event::MessageAction(e) => listener.on_message_action(e),
                Event::File(e) => listener.on_file(e),
            }
        }
    }

    pub fn emit_status(&self, status: &Status) {
        tracing::debug!(
            operation = %status.operation,
            category = %status.category,
            is_error = status.is_error,
            "status"
        );
        for listener in self.snapshot() {
            listener.on_status(status);
        }
    }
}

/// Anything a [`ChannelListener`] forwards.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Event(Event),
    Status(Status),
}

/// Forwards every callback into an unbounded channel.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: ClientEvent) {
        // Receiver gone means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl EventListener for ChannelListener {
    fn on_message(&self, event: &MessageEvent) {
        self.forward(ClientEvent::Event(Event::Message(event.clone())));
    }
    fn on_signal(&self, event: &SignalEvent) {
        self.forward(ClientEvent::Event(Event::Signal(event.clone())));
    }
    fn on_presence(&self, event: &PresenceEvent) {
        self.forward(ClientEvent::Event(Event::Presence(event.clone())));
    }
    fn on_object(&self, event: &ObjectEvent) {
        self.forward(ClientEvent::Event(Event::Object(event.clone())));
    }
    fn on_message_action(&self, event: &MessageActionEvent) {
        self.forward(ClientEvent::Event(Event::MessageAction(event.clone())));
    }
    fn on_file(&self, event: &FileEvent) {
        self.forward(ClientEvent::Event(Event::File(event.clone())));
    }
    fn on_status(&self, status: &Status) {
        self.forward(ClientEvent::Status(status.clone()));
    }
}
