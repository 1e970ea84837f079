use serde::{Deserialize, Serialize};
use std::fmt;

/// Category attached to every status delivered to callers and listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Unknown,
    /// Request processed; the endpoint has no payload worth returning.
    Acknowledgment,
    AccessDenied,
    Timeout,
    NetworkIssues,
    /// A subscribe batch reached the configured message-count threshold.
    RequestMessageCountExceeded,
    Connected,
    Reconnected,
    Disconnected,
    UnexpectedDisconnect,
    Cancelled,
    BadRequest,
    RequestUriTooLong,
    MalformedFilterExpression,
    MalformedResponse,
    DecryptionError,
    /// Payload could not be encrypted; nothing was sent.
    EncryptionError,
    TlsConnectionFailed,
    HeartbeatSuccess,
    HeartbeatFailure,
    /// The client was invalidated; no further requests may be issued.
    ClientInvalidated,
}

impl StatusCategory {
    /// Whether a failure in this category is transient and may be retried.
    pub fn is_retriable(self) -> bool {
        matches!(
            self,
            StatusCategory::Timeout
                | StatusCategory::NetworkIssues
                | StatusCategory::TlsConnectionFailed
                | StatusCategory::Unknown
        )
    }

    pub fn as_str(self) -> &'static str {
        use StatusCategory::*;
        match self {
            Unknown => "unknown",
            Acknowledgment => "acknowledgment",
            AccessDenied => "access_denied",
            Timeout => "timeout",
            NetworkIssues => "network_issues",
            RequestMessageCountExceeded => "request_message_count_exceeded",
            Connected => "connected",
            Reconnected => "reconnected",
            Disconnected => "disconnected",
            UnexpectedDisconnect => "unexpected_disconnect",
            Cancelled => "cancelled",
            BadRequest => "bad_request",
            RequestUriTooLong => "request_uri_too_long",
            MalformedFilterExpression => "malformed_filter_expression",
            MalformedResponse => "malformed_response",
            DecryptionError => "decryption_error",
            EncryptionError => "encryption_error",
            TlsConnectionFailed => "tls_connection_failed",
            HeartbeatSuccess => "heartbeat_success",
            HeartbeatFailure => "heartbeat_failure",
            ClientInvalidated => "client_invalidated",
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
