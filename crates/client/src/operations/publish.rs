use pn_domain::{OperationType, StatusCategory};
use pn_transport::TransportMethod;
use serde_json::Value;

use super::{require, to_json};
use crate::builder::RequestParameters;
use crate::client::{unexpected, Client};
use crate::parser::ParsedData;
use crate::status::Status;

/// Message publish.
#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    pub channel: String,
    pub message: Value,
    /// Filterable metadata, never encrypted.
    pub meta: Option<Value>,
    /// `None` leaves storage to the key's settings.
    pub store: Option<bool>,
    /// Storage TTL in hours.
    pub ttl: Option<u32>,
    /// Send the payload as a POST body instead of in the path.
    pub use_post: bool,
    /// Gzip the POST body.
    pub compress: bool,
    /// Keep the message in this region only.
    pub no_replicate: bool,
    pub custom_message_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SignalRequest {
    pub channel: String,
    pub message: Value,
    pub custom_message_type: Option<String>,
}

impl Client {
    /// Publish a message; returns its timetoken.
    ///
    /// With a crypto module configured the payload is encrypted before it
    /// leaves the client.  A failure to encrypt is returned without
    /// sending anything.
    pub async fn publish(&self, request: PublishRequest) -> Result<u64, Status> {
        let op = OperationType::Publish;
        require(op, &request.channel, "channel")?;
        let payload = self.seal(op, &request.message)?;

        let mut params = RequestParameters::new()
            .path("channel", &request.channel)
            .query("seqn", self.sequence.next())
            .query_opt("store", request.store.map(|s| if s { 1 } else { 0 }))
            .query_opt("ttl", request.ttl)
            .query_opt("custom_message_type", request.custom_message_type.as_ref())
            .targets(std::slice::from_ref(&request.channel));
        if let Some(ref meta) = request.meta {
            params = params.query("meta", to_json(op, meta)?);
        }
        if request.no_replicate {
            params = params.query("norep", "true");
        }

        let parsed = if request.use_post {
            params = params
                .method(TransportMethod::Post)
                .compressed(request.compress);
            self.process_with_body(op, params, payload.into_bytes()).await?
        } else {
            params = params.path("message", &payload);
            self.process(op, params).await?
        };
        match parsed {
            ParsedData::Publish { timetoken } => Ok(timetoken),
            other => Err(unexpected(op, other)),
        }
    }

    /// Publish that is neither stored nor replicated.
    pub async fn fire(&self, channel: &str, message: Value) -> Result<u64, Status> {
        self.publish(PublishRequest {
            channel: channel.to_owned(),
            message,
            store: Some(false),
            no_replicate: true,
            ..Default::default()
        })
        .await
    }

    /// Small unstored message.  Signals are never encrypted.
    pub async fn signal(&self, request: SignalRequest) -> Result<u64, Status> {
        let op = OperationType::Signal;
        require(op, &request.channel, "channel")?;
        let payload = to_json(op, &request.message)?;
        let params = RequestParameters::new()
            .path("channel", &request.channel)
            .path("message", &payload)
            .query_opt("custom_message_type", request.custom_message_type.as_ref())
            .targets(std::slice::from_ref(&request.channel));
        match self.process(op, params).await? {
            ParsedData::Publish { timetoken } => Ok(timetoken),
            other => Err(unexpected(op, other)),
        }
    }

    /// JSON text of `message`, encrypted into a quoted Base64 string
    /// when crypto is configured.
    pub(crate) fn seal(&self, op: OperationType, message: &Value) -> Result<String, Status> {
        let json = to_json(op, message)?;
        let Some(crypto) = self.engine.crypto() else {
            return Ok(json);
        };
        let sealed = crypto.encrypt_string(&json).map_err(|e| {
            Status::error(op, StatusCategory::EncryptionError, format!("encryption failed: {e}"))
        })?;
        Ok(format!("\"{sealed}\""))
    }
}
