use std::path::PathBuf;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use uuid::Uuid;

/// Characters left unescaped in path components and query values.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode a single path component or query value.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl TransportMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportMethod::Get => "GET",
            TransportMethod::Post => "POST",
            TransportMethod::Patch => "PATCH",
            TransportMethod::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    #[default]
    None,
    Bytes(Vec<u8>),
    /// Read from disk when the request is sent.
    Stream(PathBuf),
}

impl RequestBody {
    pub fn is_none(&self) -> bool {
        matches!(self, RequestBody::None)
    }
}

/// Everything needed to perform one HTTP exchange.
///
/// Built once by the request builder and never mutated afterwards; a
/// retry sends [`TransportRequest::next_attempt`], a fresh copy.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: TransportMethod,
    pub secure: bool,
    pub origin: String,
    /// Placeholders already resolved and percent-encoded.
    pub path: String,
    /// Ordered, unencoded.
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub compress_body: bool,
    pub timeout: Duration,
    pub cancellable: bool,
    pub retriable: bool,
    pub response_as_file: bool,
    pub identifier: Uuid,
    pub attempt: u32,
}

impl Default for TransportRequest {
    fn default() -> Self {
        Self {
            method: TransportMethod::Get,
            secure: true,
            origin: String::new(),
            path: "/".into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::None,
            compress_body: false,
            timeout: Duration::from_secs(10),
            cancellable: true,
            retriable: true,
            response_as_file: false,
            identifier: Uuid::new_v4(),
            attempt: 0,
        }
    }
}

impl TransportRequest {
    /// Copy for the next retry.  The identifier is kept so logs correlate.
    pub fn next_attempt(&self) -> TransportRequest {
        TransportRequest {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Percent-encoded query string without the leading `?`.
    pub fn query_string(&self) -> String {
        self.query
            .iter()
            .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        let query = self.query_string();
        if query.is_empty() {
            format!("{scheme}://{}{}", self.origin, self.path)
        } else {
            format!("{scheme}://{}{}?{query}", self.origin, self.path)
        }
    }
}
