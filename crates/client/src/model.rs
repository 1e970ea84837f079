//! Typed results of the REST operations.

use std::collections::BTreeMap;

use pn_domain::event::MessageAction;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── History ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub message: Value,
    pub timetoken: u64,
    pub meta: Option<Value>,
    pub publisher: Option<String>,
    /// Service-side message kind: 0 message, 1 signal, 4 file.
    pub message_type: Option<i64>,
    pub custom_message_type: Option<String>,
    pub decryption_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchMessagesResult {
    pub channels: BTreeMap<String, Vec<HistoryMessage>>,
    /// Pagination hint, present when the service truncated the page.
    pub more: Option<Value>,
}

// ── Presence ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub uuid: String,
    pub state: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOccupancy {
    pub occupancy: u64,
    pub occupants: Vec<Occupant>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HereNowResult {
    pub total_channels: u64,
    pub total_occupancy: u64,
    pub channels: BTreeMap<String, ChannelOccupancy>,
}

// ── App context ──

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UuidMetadata {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(rename = "eTag", skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMetadata {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(rename = "eTag", skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

// ── Message actions ──

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageActionsPage {
    pub actions: Vec<MessageAction>,
    /// Pagination hint for the next page.
    pub more: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_metadata_uses_wire_names() {
        let raw = r#"{"id":"alice","externalId":"x1","profileUrl":"https://p",
            "eTag":"AbC","updated":"2024-01-01T00:00:00Z"}"#;
        let m: UuidMetadata = serde_json::from_str(raw).unwrap();
        assert_eq!(m.external_id.as_deref(), Some("x1"));
        assert_eq!(m.profile_url.as_deref(), Some("https://p"));
        assert_eq!(m.etag.as_deref(), Some("AbC"));
    }

    #[test]
    fn unset_fields_are_not_serialized() {
        let m = ChannelMetadata {
            id: "room".into(),
            name: Some("Room".into()),
            ..Default::default()
        };
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v, serde_json::json!({"id":"room","name":"Room"}));
    }
}
