use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Operation tags
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Every REST operation the engine knows how to build, send and parse.
///
/// The tag selects the path template in the request builder, the session
/// in the network engine, and the parser function in the parser registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Subscribe,
    Unsubscribe,
    Publish,
    Signal,
    Time,
    FetchMessages,
    DeleteMessages,
    MessageCounts,
    HereNow,
    WhereNow,
    Heartbeat,
    SetState,
    GetState,
    AddChannelsToGroup,
    RemoveChannelsFromGroup,
    ChannelsForGroup,
    RemoveGroup,
    GetUuidMetadata,
    SetUuidMetadata,
    RemoveUuidMetadata,
    GetChannelMetadata,
    SetChannelMetadata,
    RemoveChannelMetadata,
    AddMessageAction,
    RemoveMessageAction,
    FetchMessageActions,
    DownloadFile,
}

impl OperationType {
    /// Endpoint group this operation belongs to.
    pub fn endpoint(self) -> Endpoint {
        use OperationType::*;
        match self {
            Subscribe => Endpoint::MessageSubscribe,
            Publish | Signal => Endpoint::MessageSend,
            Unsubscribe | HereNow | WhereNow | Heartbeat | SetState | GetState => {
                Endpoint::Presence
            }
            FetchMessages | DeleteMessages | MessageCounts => Endpoint::MessageStorage,
            AddChannelsToGroup | RemoveChannelsFromGroup | ChannelsForGroup | RemoveGroup => {
                Endpoint::ChannelGroups
            }
            GetUuidMetadata | SetUuidMetadata | RemoveUuidMetadata | GetChannelMetadata
            | SetChannelMetadata | RemoveChannelMetadata => Endpoint::AppContext,
            AddMessageAction | RemoveMessageAction | FetchMessageActions => {
                Endpoint::MessageReactions
            }
            DownloadFile => Endpoint::Files,
            Time => Endpoint::Unknown,
        }
    }

    /// Whether this operation travels over the long-poll session.
    pub fn is_long_poll(self) -> bool {
        matches!(self, OperationType::Subscribe)
    }

    /// Whether the engine may resend this operation on its own.
    ///
    /// Subscribe drives its own retries.  Publish, signal and adding a
    /// message action are not idempotent and only retry by hand.
    pub fn allows_automatic_retry(self) -> bool {
        use OperationType::*;
        !matches!(self, Subscribe | Publish | Signal | AddMessageAction)
    }

    /// Whether `cancel_all_operations` may stop this operation.
    ///
    /// A presence leave is fire-and-forget; only invalidation stops it.
    pub fn is_cancellable(self) -> bool {
        !matches!(self, OperationType::Unsubscribe)
    }

    pub fn as_str(self) -> &'static str {
        use OperationType::*;
        match self {
            Subscribe => "subscribe",
            Unsubscribe => "unsubscribe",
            Publish => "publish",
            Signal => "signal",
            Time => "time",
            FetchMessages => "fetch_messages",
            DeleteMessages => "delete_messages",
            MessageCounts => "message_counts",
            HereNow => "here_now",
            WhereNow => "where_now",
            Heartbeat => "heartbeat",
            SetState => "set_state",
            GetState => "get_state",
            AddChannelsToGroup => "add_channels_to_group",
            RemoveChannelsFromGroup => "remove_channels_from_group",
            ChannelsForGroup => "channels_for_group",
            RemoveGroup => "remove_group",
            GetUuidMetadata => "get_uuid_metadata",
            SetUuidMetadata => "set_uuid_metadata",
            RemoveUuidMetadata => "remove_uuid_metadata",
            GetChannelMetadata => "get_channel_metadata",
            SetChannelMetadata => "set_channel_metadata",
            RemoveChannelMetadata => "remove_channel_metadata",
            AddMessageAction => "add_message_action",
            RemoveMessageAction => "remove_message_action",
            FetchMessageActions => "fetch_message_actions",
            DownloadFile => "download_file",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Endpoint groups
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Groups of REST endpoints.
///
/// Retry exclusion and latency telemetry are configured per group rather
/// than per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Unknown,
    MessageSend,
    MessageSubscribe,
    Presence,
    Files,
    MessageStorage,
    ChannelGroups,
    DevicePushNotifications,
    AppContext,
    MessageReactions,
}

impl Endpoint {
    /// Telemetry key used in `l_<key>` latency query parameters.
    pub fn telemetry_key(self) -> Option<&'static str> {
        match self {
            Endpoint::MessageSend => Some("pub"),
            Endpoint::Presence => Some("pres"),
            Endpoint::Files => Some("file"),
            Endpoint::MessageStorage => Some("hist"),
            Endpoint::ChannelGroups => Some("cg"),
            Endpoint::DevicePushNotifications => Some("push"),
            Endpoint::AppContext => Some("obj"),
            Endpoint::MessageReactions => Some("msga"),
            Endpoint::Unknown => Some("time"),
            // Long-poll latency is dominated by server idle time.
            Endpoint::MessageSubscribe => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_is_the_only_long_poll() {
        assert!(OperationType::Subscribe.is_long_poll());
        assert!(!OperationType::Publish.is_long_poll());
        assert!(!OperationType::Heartbeat.is_long_poll());
    }

    #[test]
    fn non_idempotent_operations_never_retry_automatically() {
        assert!(!OperationType::Publish.allows_automatic_retry());
        assert!(!OperationType::Signal.allows_automatic_retry());
        assert!(!OperationType::AddMessageAction.allows_automatic_retry());
        assert!(!OperationType::Subscribe.allows_automatic_retry());
        assert!(OperationType::Time.allows_automatic_retry());
        assert!(OperationType::FetchMessages.allows_automatic_retry());
    }

    #[test]
    fn leave_is_not_cancellable() {
        assert!(!OperationType::Unsubscribe.is_cancellable());
        assert!(OperationType::Subscribe.is_cancellable());
        assert!(OperationType::Publish.is_cancellable());
    }

    #[test]
    fn publish_and_signal_share_message_send() {
        assert_eq!(OperationType::Publish.endpoint(), Endpoint::MessageSend);
        assert_eq!(OperationType::Signal.endpoint(), Endpoint::MessageSend);
    }

    #[test]
    fn endpoint_deserializes_snake_case() {
        let e: Endpoint = serde_json::from_str(r#""message_storage""#).unwrap();
        assert_eq!(e, Endpoint::MessageStorage);
    }

    #[test]
    fn subscribe_has_no_telemetry_key() {
        assert!(Endpoint::MessageSubscribe.telemetry_key().is_none());
        assert_eq!(Endpoint::MessageSend.telemetry_key(), Some("pub"));
    }
}
