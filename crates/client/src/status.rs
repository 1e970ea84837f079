//! Status objects delivered to callers and listeners.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use pn_domain::{Cursor, OperationType, StatusCategory};

use crate::parser::ParsedData;

type RetryFn = dyn Fn() -> BoxFuture<'static, Result<ParsedData, Status>> + Send + Sync;
type CancelFn = dyn Fn() -> bool + Send + Sync;

/// Manual control over a failed operation.
///
/// `retry()` re-issues the operation; `cancel_automatic_retry()` stops a
/// pending automatic retry, if the engine scheduled one.
#[derive(Clone)]
pub struct RetryHandle {
    retry: Arc<RetryFn>,
    cancel: Option<Arc<CancelFn>>,
}

impl RetryHandle {
    pub fn new<F>(retry: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<ParsedData, Status>> + Send + Sync + 'static,
    {
        Self {
            retry: Arc::new(retry),
            cancel: None,
        }
    }

    pub fn with_cancel<C>(mut self, cancel: C) -> Self
    where
        C: Fn() -> bool + Send + Sync + 'static,
    {
        self.cancel = Some(Arc::new(cancel));
        self
    }

    /// Re-issue the operation now.  Any pending automatic retry is
    /// cancelled first so the two never both run.
    pub async fn retry(&self) -> Result<ParsedData, Status> {
        self.cancel_automatic_retry();
        (self.retry)().await
    }

    /// Returns whether a pending automatic retry was stopped.
    pub fn cancel_automatic_retry(&self) -> bool {
        self.cancel.as_ref().map(|c| c()).unwrap_or(false)
    }
}

impl fmt::Debug for RetryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryHandle")
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

/// Outcome report for an operation or a subscribe-loop transition.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{operation}: {category} {message}")]
pub struct Status {
    pub category: StatusCategory,
    pub operation: OperationType,
    pub is_error: bool,
    /// HTTP status, `0` when no response was received.
    pub status_code: u16,
    pub message: String,
    pub affected_channels: Vec<String>,
    pub affected_groups: Vec<String>,
    /// Raw error body `payload`, when the service sent one.
    pub error_payload: Option<serde_json::Value>,
    /// Subscribe statuses: cursor before the transition.
    pub last_cursor: Option<Cursor>,
    /// Subscribe statuses: cursor after the transition.
    pub current_cursor: Option<Cursor>,
    pub retry: Option<RetryHandle>,
}

impl Status {
    pub fn new(operation: OperationType, category: StatusCategory, is_error: bool) -> Self {
        Self {
            category,
            operation,
            is_error,
            status_code: 0,
            message: String::new(),
            affected_channels: Vec::new(),
            affected_groups: Vec::new(),
            error_payload: None,
            last_cursor: None,
            current_cursor: None,
            retry: None,
        }
    }

    pub fn error(operation: OperationType, category: StatusCategory, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::new(operation, category, true)
        }
    }

    pub fn info(operation: OperationType, category: StatusCategory) -> Self {
        Self::new(operation, category, false)
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.status_code = code;
        self
    }

    pub fn with_channels(mut self, channels: Vec<String>, groups: Vec<String>) -> Self {
        self.affected_channels = channels;
        self.affected_groups = groups;
        self
    }

    pub fn with_cursors(mut self, last: Cursor, current: Cursor) -> Self {
        self.last_cursor = Some(last);
        self.current_cursor = Some(current);
        self
    }

    pub fn with_retry(mut self, retry: RetryHandle) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn invalidated(operation: OperationType) -> Self {
        Self::error(operation, StatusCategory::ClientInvalidated, "client invalidated")
    }

    pub fn cancelled(operation: OperationType) -> Self {
        Self::error(operation, StatusCategory::Cancelled, "request cancelled")
    }

    pub fn malformed(operation: OperationType, message: impl Into<String>) -> Self {
        Self::error(operation, StatusCategory::MalformedResponse, message)
    }
}

impl From<Status> for pn_domain::Error {
    fn from(s: Status) -> Self {
        match s.category {
            StatusCategory::Timeout => pn_domain::Error::Timeout(s.to_string()),
            StatusCategory::Cancelled => pn_domain::Error::Cancelled(s.to_string()),
            StatusCategory::AccessDenied => pn_domain::Error::Auth(s.to_string()),
            StatusCategory::ClientInvalidated => pn_domain::Error::Invalidated,
            StatusCategory::DecryptionError | StatusCategory::EncryptionError => {
                pn_domain::Error::Crypto(s.to_string())
            }
            _ => pn_domain::Error::Http(s.to_string()),
        }
    }
}
