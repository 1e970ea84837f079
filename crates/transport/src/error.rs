/// Failures below the HTTP layer.  HTTP error statuses are not transport
/// errors; they arrive as a normal [`crate::TransportResponse`].
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("network: {0}")]
    Network(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("TLS: {0}")]
    Tls(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("transport invalidated")]
    Invalidated,

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("request build: {0}")]
    Build(String),
}

impl From<TransportError> for pn_domain::Error {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout(m) => pn_domain::Error::Timeout(m),
            TransportError::Cancelled => pn_domain::Error::Cancelled("request".into()),
            TransportError::Invalidated => pn_domain::Error::Invalidated,
            TransportError::Io(io) => pn_domain::Error::Io(io),
            other => pn_domain::Error::Http(other.to_string()),
        }
    }
}

/// Convert a `reqwest::Error` into a [`TransportError`].
///
/// Timeouts map to `Timeout`, certificate and handshake failures to `Tls`,
/// builder errors to `Build`; everything else is `Network`.
pub fn from_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        return TransportError::Timeout(e.to_string());
    }
    if e.is_builder() {
        return TransportError::Build(e.to_string());
    }
    if is_tls(&e) {
        return TransportError::Tls(e.to_string());
    }
    TransportError::Network(e.to_string())
}

fn is_tls(e: &reqwest::Error) -> bool {
    let mut source: Option<&dyn std::error::Error> = Some(e);
    while let Some(err) = source {
        let msg = err.to_string().to_ascii_lowercase();
        if msg.contains("certificate") || msg.contains("tls") || msg.contains("handshake") {
            return true;
        }
        source = err.source();
    }
    false
}

pub type Result<T> = std::result::Result<T, TransportError>;
