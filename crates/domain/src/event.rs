//! Decoded real-time events delivered by the subscribe loop.
//!
//! Every event carries the channel it arrived on and, when the message
//! matched a wildcard or a channel group, the `subscription` that matched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cursor::Cursor;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Messages and signals
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub channel: String,
    pub subscription: Option<String>,
    /// Publish timetoken.
    pub timetoken: u64,
    pub publisher: Option<String>,
    pub payload: Value,
    pub user_metadata: Option<Value>,
    pub custom_message_type: Option<String>,
    /// Set when the payload could not be decrypted; `payload` then holds
    /// the raw value as received.
    pub decryption_error: Option<String>,
}

/// Signals share the message shape; they are never stored or encrypted.
pub type SignalEvent = MessageEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Presence
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresenceAction {
    Join,
    Leave,
    Timeout,
    StateChange,
    /// Announce-max mode: deltas arrive as lists on the event.
    Interval,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEvent {
    /// Channel without the presence suffix.
    pub channel: String,
    pub subscription: Option<String>,
    pub action: PresenceAction,
    pub uuid: Option<String>,
    pub occupancy: Option<u64>,
    pub timestamp: Option<u64>,
    pub state: Option<Value>,
    #[serde(default)]
    pub join: Vec<String>,
    #[serde(default)]
    pub leave: Vec<String>,
    #[serde(default)]
    pub timeout: Vec<String>,
    pub timetoken: u64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// App context, reactions and files
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEvent {
    pub channel: String,
    pub subscription: Option<String>,
    /// `set` or `delete`.
    pub event: String,
    /// `uuid`, `channel` or `membership`.
    pub kind: String,
    pub data: Value,
    pub timetoken: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageActionEvent {
    pub channel: String,
    pub subscription: Option<String>,
    /// `added` or `removed`.
    pub event: String,
    pub action: MessageAction,
    pub timetoken: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    #[serde(rename = "uuid", default)]
    pub user_id: String,
    #[serde(rename = "actionTimetoken", default)]
    pub action_timetoken: String,
    #[serde(rename = "messageTimetoken", default)]
    pub message_timetoken: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEvent {
    pub channel: String,
    pub subscription: Option<String>,
    pub publisher: Option<String>,
    pub file_id: String,
    pub file_name: String,
    pub message: Option<Value>,
    pub timetoken: u64,
    pub decryption_error: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tagged union
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One decoded entry of a subscribe batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Message(MessageEvent),
    Signal(SignalEvent),
    Presence(PresenceEvent),
    Object(ObjectEvent),
    MessageAction(MessageActionEvent),
    File(FileEvent),
}

impl Event {
    pub fn channel(&self) -> &str {
        match self {
            Event::Message(e) | Event::Signal(e) => &e.channel,
            Event::Presence(e) => &e.channel,
            Event::Object(e) => &e.channel,
            Event::MessageAction(e) => &e.channel,
            Event::File(e) => &e.channel,
        }
    }

    pub fn timetoken(&self) -> u64 {
        match self {
            Event::Message(e) | Event::Signal(e) => e.timetoken,
            Event::Presence(e) => e.timetoken,
            Event::Object(e) => e.timetoken,
            Event::MessageAction(e) => e.timetoken,
            Event::File(e) => e.timetoken,
        }
    }

    /// Why the payload is still ciphertext, if it is.
    pub fn decryption_error(&self) -> Option<&str> {
        match self {
            Event::Message(e) | Event::Signal(e) => e.decryption_error.as_deref(),
            Event::File(e) => e.decryption_error.as_deref(),
            _ => None,
        }
    }
}

/// A decoded subscribe batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscribeBatch {
    pub cursor: Cursor,
    pub events: Vec<Event>,
}
