//! Response parser registry.
//!
//! [`parse`] dispatches on the operation tag with a plain `match`; every
//! arm is a function from the JSON body (plus the request's auxiliary
//! data in [`ParseContext`]) to a typed [`ParsedData`].  Non-2xx
//! responses and `"error": true` bodies become an error [`Status`].

use std::collections::BTreeMap;

use pn_crypto::CryptoModule;
use pn_domain::event::{
    Event, FileEvent, MessageAction, MessageActionEvent, MessageEvent, ObjectEvent, PresenceAction,
    PresenceEvent, SubscribeBatch,
};
use pn_domain::{Cursor, OperationType, StatusCategory, PRESENCE_SUFFIX};
use pn_transport::{ResponseBody, TransportResponse};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tempfile::TempPath;

use crate::model::{
    ChannelMetadata, ChannelOccupancy, FetchMessagesResult, HereNowResult, HistoryMessage,
    Occupant, UuidMetadata,
};
use crate::status::Status;

/// Typed result of a successfully parsed response.
#[derive(Debug)]
pub enum ParsedData {
    /// The endpoint answered OK with nothing worth returning.
    Acknowledgment,
    Time(u64),
    Publish {
        timetoken: u64,
    },
    Subscribe(SubscribeBatch),
    FetchMessages(FetchMessagesResult),
    MessageCounts(BTreeMap<String, u64>),
    HereNow(HereNowResult),
    WhereNow(Vec<String>),
    /// Channel → state object.
    State(BTreeMap<String, Value>),
    ChannelGroupChannels(Vec<String>),
    UuidMetadata(UuidMetadata),
    ChannelMetadata(ChannelMetadata),
    MessageAction(MessageAction),
    MessageActions {
        actions: Vec<MessageAction>,
        more: Option<Value>,
    },
    /// Downloaded body on disk; removed when dropped.
    File(TempPath),
}

/// Auxiliary inputs a parser may need beyond the body.
#[derive(Clone, Copy, Default)]
pub struct ParseContext<'a> {
    pub crypto: Option<&'a CryptoModule>,
    /// Channels the request targeted; single-channel replies omit the name.
    pub channels: &'a [String],
}

type ParseResult = std::result::Result<ParsedData, String>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn parse(
    operation: OperationType,
    response: TransportResponse,
    ctx: &ParseContext<'_>,
) -> Result<ParsedData, Status> {
    if !response.is_success() {
        return Err(error_status(operation, &response));
    }
    let code = response.status;
    let bytes = match response.body {
        ResponseBody::File(path) if operation == OperationType::DownloadFile => {
            return Ok(ParsedData::File(path));
        }
        ResponseBody::File(_) => {
            return Err(Status::malformed(operation, "unexpected file body").with_code(code));
        }
        ResponseBody::Bytes(b) => b,
    };

    let body: Value = serde_json::from_slice(&bytes)
        .map_err(|e| Status::malformed(operation, format!("invalid JSON: {e}")).with_code(code))?;
    if body.get("error").and_then(Value::as_bool) == Some(true) {
        let code = body
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
            .unwrap_or(code);
        return Err(error_from_body(operation, code, Some(&body), String::new()));
    }

    use OperationType::*;
    let parsed = match operation {
        Subscribe => parse_subscribe(body, ctx),
        Publish | Signal => parse_publish(&body),
        Time => parse_time(&body),
        FetchMessages => parse_fetch_messages(&body, ctx),
        MessageCounts => parse_message_counts(&body),
        HereNow => parse_here_now(&body, ctx),
        WhereNow => parse_where_now(&body),
        GetState => parse_get_state(&body, ctx),
        SetState => parse_set_state(&body, ctx),
        ChannelsForGroup => parse_group_channels(&body),
        GetUuidMetadata | SetUuidMetadata => data_field(&body).map(ParsedData::UuidMetadata),
        GetChannelMetadata | SetChannelMetadata => {
            data_field(&body).map(ParsedData::ChannelMetadata)
        }
        AddMessageAction => data_field(&body).map(ParsedData::MessageAction),
        FetchMessageActions => parse_message_actions(&body),
        Unsubscribe | Heartbeat | DeleteMessages | AddChannelsToGroup | RemoveChannelsFromGroup
        | RemoveGroup | RemoveUuidMetadata | RemoveChannelMetadata | RemoveMessageAction => {
            Ok(ParsedData::Acknowledgment)
        }
        DownloadFile => Err("expected a file body".into()),
    };
    parsed.map_err(|msg| Status::malformed(operation, msg).with_code(code))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error bodies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Error status for a non-2xx response.
pub fn error_status(operation: OperationType, response: &TransportResponse) -> Status {
    let body: Option<Value> = serde_json::from_slice(response.bytes()).ok();
    let text = if body.is_none() { response.text() } else { String::new() };
    error_from_body(operation, response.status, body.as_ref(), text)
}

fn error_from_body(operation: OperationType, code: u16, body: Option<&Value>, text: String) -> Status {
    let message = body
        .and_then(error_message)
        .or_else(|| (!text.trim().is_empty()).then(|| text.trim().to_owned()))
        .unwrap_or_else(|| format!("HTTP {code}"));
    let category = category_for(code, &message);

    let payload = body
        .and_then(|b| b.get("payload").or_else(|| b.get("error").filter(|e| e.is_object())))
        .cloned();
    let (channels, groups) = payload
        .as_ref()
        .map(|p| (string_list(p.get("channels")), string_list(p.get("channel-groups"))))
        .unwrap_or_default();

    let mut status = Status::error(operation, category, message)
        .with_code(code)
        .with_channels(channels, groups);
    status.error_payload = payload;
    status
}

fn error_message(body: &Value) -> Option<String> {
    let candidates = [
        body.get("message"),
        body.pointer("/error/message"),
        body.get("error_message"),
        body.get(1),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
        .map(str::to_owned)
}

fn category_for(code: u16, message: &str) -> StatusCategory {
    match code {
        400 if message.to_ascii_lowercase().contains("filter") => {
            StatusCategory::MalformedFilterExpression
        }
        400 => StatusCategory::BadRequest,
        403 => StatusCategory::AccessDenied,
        414 => StatusCategory::RequestUriTooLong,
        _ => StatusCategory::Unknown,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Timetokens travel as strings (they exceed 2^53) but older endpoints
/// send numbers.
fn timetoken<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }
    match Raw::deserialize(d)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn as_timetoken(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

fn string_list(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_owned).collect())
        .unwrap_or_default()
}

fn data_field<T: serde::de::DeserializeOwned>(body: &Value) -> std::result::Result<T, String> {
    let data = body.get("data").ok_or("missing `data`")?;
    serde_json::from_value(data.clone()).map_err(|e| format!("`data`: {e}"))
}

/// Decrypt a Base64 string payload.  Non-string payloads and clients
/// without crypto pass through.  A failure keeps the raw value.
pub(crate) fn decrypt_payload(payload: Value, crypto: Option<&CryptoModule>) -> (Value, Option<String>) {
    let Some(crypto) = crypto else {
        return (payload, None);
    };
    let encoded = match payload.as_str() {
        Some(s) => s.to_owned(),
        None => return (payload, None),
    };
    match crypto.decrypt_string(&encoded) {
        Ok(plain) => (
            serde_json::from_str(&plain).unwrap_or(Value::String(plain)),
            None,
        ),
        Err(e) => {
            tracing::warn!(error = %e, "payload decryption failed; delivering raw value");
            (payload, Some(e.to_string()))
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Subscribe
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Deserialize)]
struct WireCursor {
    #[serde(deserialize_with = "timetoken")]
    t: u64,
    #[serde(default)]
    r: u32,
}

#[derive(Deserialize)]
struct SubscribeEnvelope {
    t: WireCursor,
    #[serde(default)]
    m: Vec<RawEnvelope>,
}

/// One raw entry of `m`.  Field names are the single-letter wire keys.
#[derive(Deserialize)]
struct RawEnvelope {
    /// Shard.
    #[serde(default, rename = "a")]
    _shard: Option<String>,
    /// Subscription that matched (wildcard or group).
    #[serde(default)]
    b: Option<String>,
    c: String,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    e: Option<u8>,
    #[serde(default, rename = "f")]
    _flags: Option<u64>,
    #[serde(default)]
    i: Option<String>,
    #[serde(default, rename = "k")]
    _subkey: Option<String>,
    #[serde(default)]
    p: Option<WireCursor>,
    #[serde(default)]
    u: Option<Value>,
    #[serde(default, rename = "s")]
    _sequence: Option<u64>,
    #[serde(default)]
    cmt: Option<String>,
}

const TYPE_MESSAGE: u8 = 0;
const TYPE_SIGNAL: u8 = 1;
const TYPE_OBJECT: u8 = 2;
const TYPE_ACTION: u8 = 3;
const TYPE_FILE: u8 = 4;

fn parse_subscribe(body: Value, ctx: &ParseContext<'_>) -> ParseResult {
    let envelope: SubscribeEnvelope =
        serde_json::from_value(body).map_err(|e| format!("subscribe envelope: {e}"))?;
    let events = envelope
        .m
        .into_iter()
        .filter_map(|raw| decode_envelope(raw, ctx.crypto))
        .collect();
    Ok(ParsedData::Subscribe(SubscribeBatch {
        cursor: Cursor::new(envelope.t.t, envelope.t.r),
        events,
    }))
}

#[derive(Deserialize)]
struct WirePresence {
    action: PresenceAction,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    timestamp: Option<u64>,
    #[serde(default)]
    occupancy: Option<u64>,
    #[serde(default, rename = "data")]
    state: Option<Value>,
    #[serde(default)]
    join: Vec<String>,
    #[serde(default)]
    leave: Vec<String>,
    #[serde(default)]
    timeout: Vec<String>,
}

#[derive(Deserialize)]
struct WireObject {
    event: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct WireAction {
    event: String,
    data: MessageAction,
}

#[derive(Deserialize)]
struct WireFileRef {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct WireFile {
    #[serde(default)]
    message: Option<Value>,
    file: WireFileRef,
}

fn strip_presence(name: &str) -> String {
    name.strip_suffix(PRESENCE_SUFFIX).unwrap_or(name).to_owned()
}

fn decode_envelope(raw: RawEnvelope, crypto: Option<&CryptoModule>) -> Option<Event> {
    let timetoken = raw.p.as_ref().map(|p| p.t).unwrap_or(0);
    let subscription = raw.b.filter(|b| *b != raw.c);
    let channel = raw.c;

    match raw.e.unwrap_or(TYPE_MESSAGE) {
        TYPE_MESSAGE if channel.ends_with(PRESENCE_SUFFIX) => {
            let p: WirePresence = match serde_json::from_value(raw.d) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(channel = %channel, error = %e, "skipping undecodable presence event");
                    return None;
                }
            };
            Some(Event::Presence(PresenceEvent {
                channel: strip_presence(&channel),
                subscription: subscription.as_deref().map(strip_presence),
                action: p.action,
                uuid: p.uuid,
                occupancy: p.occupancy,
                timestamp: p.timestamp,
                state: p.state,
                join: p.join,
                leave: p.leave,
                timeout: p.timeout,
                timetoken,
            }))
        }
        kind @ (TYPE_MESSAGE | TYPE_SIGNAL) => {
            // Signals are never encrypted.
            let (payload, decryption_error) = if kind == TYPE_MESSAGE {
                decrypt_payload(raw.d, crypto)
            } else {
                (raw.d, None)
            };
            let message = MessageEvent {
                channel,
                subscription,
                timetoken,
                publisher: raw.i,
                payload,
                user_metadata: raw.u,
                custom_message_type: raw.cmt,
                decryption_error,
            };
            Some(if kind == TYPE_MESSAGE {
                Event::Message(message)
            } else {
                Event::Signal(message)
            })
        }
        TYPE_OBJECT => match serde_json::from_value::<WireObject>(raw.d) {
            Ok(o) => Some(Event::Object(ObjectEvent {
                channel,
                subscription,
                event: o.event,
                kind: o.kind,
                data: o.data,
                timetoken,
            })),
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "skipping undecodable object event");
                None
            }
        },
        TYPE_ACTION => match serde_json::from_value::<WireAction>(raw.d) {
            Ok(a) => {
                let mut action = a.data;
                if let Some(publisher) = raw.i {
                    action.user_id = publisher;
                }
                Some(Event::MessageAction(MessageActionEvent {
                    channel,
                    subscription,
                    event: a.event,
                    action,
                    timetoken,
                }))
            }
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "skipping undecodable message action");
                None
            }
        },
        TYPE_FILE => {
            let (payload, decryption_error) = decrypt_payload(raw.d, crypto);
            match serde_json::from_value::<WireFile>(payload) {
                Ok(f) => Some(Event::File(FileEvent {
                    channel,
                    subscription,
                    publisher: raw.i,
                    file_id: f.file.id,
                    file_name: f.file.name,
                    message: f.message,
                    timetoken,
                    decryption_error,
                })),
                Err(e) => {
                    tracing::warn!(channel = %channel, error = %e, "skipping undecodable file event");
                    None
                }
            }
        }
        other => {
            tracing::debug!(channel = %channel, message_type = other, "ignoring unknown message type");
            None
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Publish, time, history
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `[1, "Sent", "<timetoken>"]`
fn parse_publish(body: &Value) -> ParseResult {
    let timetoken = body
        .get(2)
        .and_then(as_timetoken)
        .ok_or("publish reply without timetoken")?;
    Ok(ParsedData::Publish { timetoken })
}

/// `[<timetoken>]`
fn parse_time(body: &Value) -> ParseResult {
    body.get(0)
        .and_then(as_timetoken)
        .map(ParsedData::Time)
        .ok_or_else(|| "time reply without timetoken".into())
}

#[derive(Deserialize)]
struct WireHistoryEntry {
    message: Value,
    #[serde(deserialize_with = "timetoken")]
    timetoken: u64,
    #[serde(default)]
    meta: Option<Value>,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    message_type: Option<i64>,
    #[serde(default)]
    custom_message_type: Option<String>,
}

fn parse_fetch_messages(body: &Value, ctx: &ParseContext<'_>) -> ParseResult {
    let raw: BTreeMap<String, Vec<WireHistoryEntry>> = match body.get("channels") {
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| format!("`channels`: {e}"))?,
        None => BTreeMap::new(),
    };
    let channels = raw
        .into_iter()
        .map(|(name, entries)| {
            let messages = entries
                .into_iter()
                .map(|e| {
                    let (message, decryption_error) = decrypt_payload(e.message, ctx.crypto);
                    HistoryMessage {
                        message,
                        timetoken: e.timetoken,
                        // The service sends "" for "no meta".
                        meta: e.meta.filter(|m| m.as_str() != Some("")),
                        publisher: e.uuid,
                        message_type: e.message_type,
                        custom_message_type: e.custom_message_type,
                        decryption_error,
                    }
                })
                .collect();
            (name, messages)
        })
        .collect();
    Ok(ParsedData::FetchMessages(FetchMessagesResult {
        channels,
        more: body.get("more").cloned(),
    }))
}

fn parse_message_counts(body: &Value) -> ParseResult {
    let channels = body.get("channels").ok_or("missing `channels`")?;
    serde_json::from_value(channels.clone())
        .map(ParsedData::MessageCounts)
        .map_err(|e| format!("`channels`: {e}"))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Presence and channel groups
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn occupants(uuids: Option<&Value>) -> Vec<Occupant> {
    let Some(list) = uuids.and_then(Value::as_array) else {
        return Vec::new();
    };
    list.iter()
        .filter_map(|entry| match entry {
            Value::String(uuid) => Some(Occupant {
                uuid: uuid.clone(),
                state: None,
            }),
            Value::Object(obj) => Some(Occupant {
                uuid: obj.get("uuid")?.as_str()?.to_owned(),
                state: obj.get("state").cloned(),
            }),
            _ => None,
        })
        .collect()
}

fn channel_occupancy(entry: &Value) -> ChannelOccupancy {
    ChannelOccupancy {
        occupancy: entry.get("occupancy").and_then(Value::as_u64).unwrap_or(0),
        occupants: occupants(entry.get("uuids")),
    }
}

/// Multi-channel replies nest under `payload`; a single-channel reply is
/// flat and does not repeat the channel name.
fn parse_here_now(body: &Value, ctx: &ParseContext<'_>) -> ParseResult {
    if let Some(payload) = body.get("payload") {
        let channels: BTreeMap<String, ChannelOccupancy> = payload
            .get("channels")
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), channel_occupancy(v))).collect())
            .unwrap_or_default();
        return Ok(ParsedData::HereNow(HereNowResult {
            total_channels: payload
                .get("total_channels")
                .and_then(Value::as_u64)
                .unwrap_or(channels.len() as u64),
            total_occupancy: payload
                .get("total_occupancy")
                .and_then(Value::as_u64)
                .unwrap_or_else(|| channels.values().map(|c| c.occupancy).sum()),
            channels,
        }));
    }

    let occupancy = body.get("occupancy").and_then(Value::as_u64).ok_or("missing `occupancy`")?;
    let name = ctx.channels.first().cloned().unwrap_or_default();
    let mut channels = BTreeMap::new();
    channels.insert(name, channel_occupancy(body));
    Ok(ParsedData::HereNow(HereNowResult {
        total_channels: 1,
        total_occupancy: occupancy,
        channels,
    }))
}

fn parse_where_now(body: &Value) -> ParseResult {
    let channels = body
        .pointer("/payload/channels")
        .ok_or("missing `payload.channels`")?;
    Ok(ParsedData::WhereNow(string_list(Some(channels))))
}

fn parse_get_state(body: &Value, ctx: &ParseContext<'_>) -> ParseResult {
    let payload = body.get("payload").ok_or("missing `payload`")?;
    let single = ctx.channels.len() == 1 && body.get("channel").is_some();
    if !single {
        if let Some(map) = payload.get("channels").and_then(Value::as_object) {
            return Ok(ParsedData::State(
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            ));
        }
    }
    let name = body
        .get("channel")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or_else(|| ctx.channels.first().cloned())
        .unwrap_or_default();
    let mut state = BTreeMap::new();
    state.insert(name, payload.clone());
    Ok(ParsedData::State(state))
}

/// The reply echoes the state once; it applies to every channel set.
fn parse_set_state(body: &Value, ctx: &ParseContext<'_>) -> ParseResult {
    let payload = body.get("payload").cloned().unwrap_or(Value::Null);
    Ok(ParsedData::State(
        ctx.channels.iter().map(|c| (c.clone(), payload.clone())).collect(),
    ))
}

fn parse_group_channels(body: &Value) -> ParseResult {
    let channels = body
        .pointer("/payload/channels")
        .ok_or("missing `payload.channels`")?;
    Ok(ParsedData::ChannelGroupChannels(string_list(Some(channels))))
}

// ── message actions ─────────────────────────────────────────────

fn parse_message_actions(body: &Value) -> ParseResult {
    let actions: Vec<MessageAction> = data_field(body)?;
    Ok(ParsedData::MessageActions {
        actions,
        more: body.get("more").cloned(),
    })
}
