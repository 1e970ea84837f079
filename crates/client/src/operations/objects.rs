use pn_domain::OperationType;
use serde_json::{json, Value};

use super::{require, to_json};
use crate::builder::RequestParameters;
use crate::client::{unexpected, Client};
use crate::model::{ChannelMetadata, UuidMetadata};
use crate::parser::ParsedData;
use crate::status::Status;

fn include_custom(params: RequestParameters, include: bool) -> RequestParameters {
    params.query_opt("include", include.then_some("custom"))
}

/// Writable fields only; `id`, `updated` and `eTag` are server-owned.
fn strip_server_fields(mut body: Value) -> Value {
    if let Some(map) = body.as_object_mut() {
        for key in ["id", "updated", "eTag"] {
            map.remove(key);
        }
    }
    body
}

impl Client {
    // ── UUID metadata ───────────────────────────────────────────────

    /// Metadata of `uuid` (default: this client).
    pub async fn get_uuid_metadata(
        &self,
        uuid: Option<&str>,
        custom: bool,
    ) -> Result<UuidMetadata, Status> {
        let op = OperationType::GetUuidMetadata;
        let mut params = include_custom(RequestParameters::new(), custom);
        if let Some(id) = uuid {
            params = params.path("uuid", id);
        }
        match self.process(op, params).await? {
            ParsedData::UuidMetadata(m) => Ok(m),
            other => Err(unexpected(op, other)),
        }
    }

    /// Upsert metadata.  An empty `id` targets this client.
    pub async fn set_uuid_metadata(
        &self,
        metadata: &UuidMetadata,
        custom: bool,
    ) -> Result<UuidMetadata, Status> {
        let op = OperationType::SetUuidMetadata;
        let body = strip_server_fields(json!(metadata));
        let mut params = include_custom(RequestParameters::new(), custom);
        if !metadata.id.is_empty() {
            params = params.path("uuid", &metadata.id);
        }
        match self
            .process_with_body(op, params, to_json(op, &body)?.into_bytes())
            .await?
        {
            ParsedData::UuidMetadata(m) => Ok(m),
            other => Err(unexpected(op, other)),
        }
    }

    pub async fn remove_uuid_metadata(&self, uuid: Option<&str>) -> Result<(), Status> {
        let op = OperationType::RemoveUuidMetadata;
        let mut params = RequestParameters::new();
        if let Some(id) = uuid {
            params = params.path("uuid", id);
        }
        self.acknowledge(op, params).await
    }

    // ── Channel metadata ────────────────────────────────────────────

    pub async fn get_channel_metadata(
        &self,
        channel: &str,
        custom: bool,
    ) -> Result<ChannelMetadata, Status> {
        let op = OperationType::GetChannelMetadata;
        require(op, channel, "channel")?;
        let params = include_custom(RequestParameters::new().path("channel", channel), custom);
        match self.process(op, params).await? {
            ParsedData::ChannelMetadata(m) => Ok(m),
            other => Err(unexpected(op, other)),
        }
    }

    pub async fn set_channel_metadata(
        &self,
        metadata: &ChannelMetadata,
        custom: bool,
    ) -> Result<ChannelMetadata, Status> {
        let op = OperationType::SetChannelMetadata;
        require(op, &metadata.id, "channel")?;
        let body = strip_server_fields(json!(metadata));
        let params = include_custom(
            RequestParameters::new().path("channel", &metadata.id),
            custom,
        );
        match self
            .process_with_body(op, params, to_json(op, &body)?.into_bytes())
            .await?
        {
            ParsedData::ChannelMetadata(m) => Ok(m),
            other => Err(unexpected(op, other)),
        }
    }

    pub async fn remove_channel_metadata(&self, channel: &str) -> Result<(), Status> {
        let op = OperationType::RemoveChannelMetadata;
        require(op, channel, "channel")?;
        self.acknowledge(op, RequestParameters::new().path("channel", channel))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_fields_are_not_sent() {
        let m = UuidMetadata {
            id: "alice".into(),
            name: Some("Alice".into()),
            etag: Some("x".into()),
            ..Default::default()
        };
        assert_eq!(strip_server_fields(json!(m)), json!({"name": "Alice"}));
    }
}
