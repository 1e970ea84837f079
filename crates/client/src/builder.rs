//! Request parameter builder.
//!
//! Stateless: every call maps an [`OperationType`] to its path template,
//! resolves the `{placeholders}`, appends the common query and signs the
//! result when a secret key is configured.

use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use pn_domain::config::Config;
use pn_domain::{OperationType, SDK_NAME};
use pn_transport::{encode_component, RequestBody, TransportMethod, TransportRequest};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Per-operation inputs: path components, query and headers.
#[derive(Debug, Clone, Default)]
pub struct RequestParameters {
    /// Placeholder name → already-encoded value.
    path: HashMap<&'static str, String>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// Overrides the operation's default method.
    pub method: Option<TransportMethod>,
    pub compress_body: bool,
    /// Channels the request targets, handed to the parser.
    pub channels: Vec<String>,
}

impl RequestParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single path component; the value is percent-encoded.
    pub fn path(mut self, name: &'static str, value: &str) -> Self {
        self.path.insert(name, encode_component(value));
        self
    }

    /// Set a comma-joined list component.  An empty list becomes `,`.
    pub fn path_list(mut self, name: &'static str, values: &[String]) -> Self {
        let joined = if values.is_empty() {
            ",".to_owned()
        } else {
            values
                .iter()
                .map(|v| encode_component(v))
                .collect::<Vec<_>>()
                .join(",")
        };
        self.path.insert(name, joined);
        self
    }

    pub fn query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_owned(), value.to_string()));
        self
    }

    pub fn query_opt(self, name: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.query(name, v),
            None => self,
        }
    }

    /// Comma-joined list query value, skipped when empty.
    pub fn query_list(self, name: &str, values: &[String]) -> Self {
        if values.is_empty() {
            return self;
        }
        let joined = values.join(",");
        self.query(name, joined)
    }

    pub fn method(mut self, method: TransportMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn compressed(mut self, compress: bool) -> Self {
        self.compress_body = compress;
        self
    }

    pub fn targets(mut self, channels: &[String]) -> Self {
        self.channels = channels.to_vec();
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing path component `{0}`")]
    MissingComponent(String),
    #[error("{0} is not configured")]
    MissingKey(&'static str),
    #[error("signing failed: {0}")]
    Signature(String),
}

fn default_method(operation: OperationType) -> TransportMethod {
    use OperationType::*;
    match operation {
        SetUuidMetadata | SetChannelMetadata => TransportMethod::Patch,
        RemoveUuidMetadata | RemoveChannelMetadata | DeleteMessages | RemoveMessageAction => {
            TransportMethod::Delete
        }
        AddMessageAction => TransportMethod::Post,
        _ => TransportMethod::Get,
    }
}

fn template(operation: OperationType, method: TransportMethod) -> &'static str {
    use OperationType::*;
    match operation {
        Subscribe => "/v2/subscribe/{sub_key}/{channels}/0",
        Unsubscribe => "/v2/presence/sub-key/{sub_key}/channel/{channels}/leave",
        Publish if method == TransportMethod::Post => "/publish/{pub_key}/{sub_key}/0/{channel}/0",
        Publish => "/publish/{pub_key}/{sub_key}/0/{channel}/0/{message}",
        Signal => "/signal/{pub_key}/{sub_key}/0/{channel}/0/{message}",
        Time => "/time/0",
        FetchMessages => "/v3/history/sub-key/{sub_key}/channel/{channels}",
        DeleteMessages => "/v3/history/sub-key/{sub_key}/channel/{channel}",
        MessageCounts => "/v3/history/sub-key/{sub_key}/message-counts/{channels}",
        HereNow => "/v2/presence/sub-key/{sub_key}/channel/{channels}",
        WhereNow => "/v2/presence/sub-key/{sub_key}/uuid/{uuid}",
        Heartbeat => "/v2/presence/sub-key/{sub_key}/channel/{channels}/heartbeat",
        SetState => "/v2/presence/sub-key/{sub_key}/channel/{channels}/uuid/{uuid}/data",
        GetState => "/v2/presence/sub-key/{sub_key}/channel/{channels}/uuid/{uuid}",
        AddChannelsToGroup | RemoveChannelsFromGroup | ChannelsForGroup => {
            "/v1/channel-registration/sub-key/{sub_key}/channel-group/{group}"
        }
        RemoveGroup => "/v1/channel-registration/sub-key/{sub_key}/channel-group/{group}/remove",
        GetUuidMetadata | SetUuidMetadata | RemoveUuidMetadata => "/v2/objects/{sub_key}/uuids/{uuid}",
        GetChannelMetadata | SetChannelMetadata | RemoveChannelMetadata => {
            "/v2/objects/{sub_key}/channels/{channel}"
        }
        AddMessageAction => "/v1/message-actions/{sub_key}/channel/{channel}/message/{message_timetoken}",
        RemoveMessageAction => {
            "/v1/message-actions/{sub_key}/channel/{channel}/message/{message_timetoken}/action/{action_timetoken}"
        }
        FetchMessageActions => "/v1/message-actions/{sub_key}/channel/{channel}",
        DownloadFile => "/v1/files/{sub_key}/channels/{channel}/files/{file_id}/{file_name}",
    }
}

fn resolve(
    template: &str,
    params: &RequestParameters,
    config: &Config,
) -> Result<String, BuildError> {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let end = rest[start..]
            .find('}')
            .map(|e| start + e)
            .ok_or_else(|| BuildError::MissingComponent(rest.to_owned()))?;
        let name = &rest[start + 1..end];
        let value = match params.path.get(name) {
            Some(v) => v.clone(),
            None => match name {
                "sub_key" => encode_component(&config.keys.subscribe_key),
                "pub_key" => encode_component(
                    config
                        .keys
                        .publish_key
                        .as_deref()
                        .ok_or(BuildError::MissingKey("publish_key"))?,
                ),
                "uuid" => encode_component(&config.keys.user_id),
                other => return Err(BuildError::MissingComponent(other.to_owned())),
            },
        };
        out.push_str(&value);
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Assemble the transport request for `operation`.
///
/// `extra_query` carries engine-owned parameters such as latency
/// telemetry.
pub fn build_request(
    config: &Config,
    operation: OperationType,
    params: &RequestParameters,
    body: RequestBody,
    extra_query: Vec<(String, String)>,
) -> Result<TransportRequest, BuildError> {
    let method = params.method.unwrap_or_else(|| default_method(operation));
    let path = resolve(template(operation, method), params, config)?;
    let identifier = Uuid::new_v4();

    let mut query = params.query.clone();
    query.push(("uuid".into(), config.keys.user_id.clone()));
    query.push(("pnsdk".into(), SDK_NAME.into()));
    query.push(("requestid".into(), identifier.to_string()));
    if let Some(ref auth) = config.keys.auth_key {
        query.push(("auth".into(), auth.clone()));
    }
    query.extend(extra_query);

    let mut headers = params.headers.clone();
    if !body.is_none() && !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
        headers.push(("Content-Type".into(), "application/json".into()));
    }

    if let Some(ref secret) = config.keys.secret_key {
        let timestamp = chrono::Utc::now().timestamp();
        query.push(("timestamp".into(), timestamp.to_string()));
        let body_text = match &body {
            RequestBody::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            _ => String::new(),
        };
        let signature = sign(
            secret,
            method,
            config.keys.publish_key.as_deref().unwrap_or_default(),
            &path,
            &query,
            &body_text,
        )?;
        query.push(("signature".into(), signature));
    }

    let long_poll = operation.is_long_poll();
    Ok(TransportRequest {
        method,
        secure: config.network.secure,
        origin: config.network.origin.clone(),
        path,
        query,
        headers,
        body,
        compress_body: params.compress_body,
        timeout: if long_poll {
            config.subscribe_timeout()
        } else {
            config.non_subscribe_timeout()
        },
        cancellable: operation.is_cancellable(),
        retriable: operation.allows_automatic_retry(),
        response_as_file: operation == OperationType::DownloadFile,
        identifier,
        attempt: 0,
    })
}

/// v2 request signature: `v2.` + unpadded URL-safe Base64 of
/// HMAC-SHA256 over `METHOD\npub_key\npath\nsorted_query\nbody`.
pub fn sign(
    secret: &str,
    method: TransportMethod,
    publish_key: &str,
    path: &str,
    query: &[(String, String)],
    body: &str,
) -> Result<String, BuildError> {
    let mut sorted: Vec<&(String, String)> = query.iter().filter(|(k, _)| k != "signature").collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let query_string = sorted
        .iter()
        .map(|(k, v)| format!("{k}={}", encode_component(v)))
        .collect::<Vec<_>>()
        .join("&");

    let body = match method {
        TransportMethod::Post | TransportMethod::Patch => body,
        _ => "",
    };
    let input = format!(
        "{}\n{publish_key}\n{path}\n{query_string}\n{body}",
        method.as_str()
    );

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BuildError::Signature(e.to_string()))?;
    mac.update(input.as_bytes());
    Ok(format!("v2.{}", URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        let mut cfg = Config::with_keys("sub-c-1", "alice");
        cfg.keys.publish_key = Some("pub-c-1".into());
        cfg
    }

    #[test]
    fn subscribe_path_joins_encoded_channels() {
        let params = RequestParameters::new()
            .path_list("channels", &["a b".into(), "c/d".into()])
            .query("tt", 0);
        let req = build_request(&config(), OperationType::Subscribe, &params, RequestBody::None, vec![])
            .unwrap();
        assert_eq!(req.path, "/v2/subscribe/sub-c-1/a%20b,c%2Fd/0");
        assert_eq!(req.timeout.as_secs(), 310);
        assert!(!req.retriable);
        assert_eq!(req.query_value("uuid"), Some("alice"));
        assert_eq!(req.query_value("pnsdk"), Some(SDK_NAME));
    }

    #[test]
    fn retry_and_cancel_flags_follow_operation() {
        let params = RequestParameters::new()
            .path("channel", "room")
            .path("message", "1");
        let publish = build_request(&config(), OperationType::Publish, &params, RequestBody::None, vec![])
            .unwrap();
        assert!(!publish.retriable);
        assert!(publish.cancellable);

        let time = build_request(&config(), OperationType::Time, &params, RequestBody::None, vec![])
            .unwrap();
        assert!(time.retriable);

        let leave = build_request(
            &config(),
            OperationType::Unsubscribe,
            &RequestParameters::new().path_list("channels", &["room".into()]),
            RequestBody::None,
            vec![],
        )
        .unwrap();
        assert!(!leave.cancellable);
        assert!(leave.retriable);
    }

    #[test]
    fn empty_channel_list_is_comma() {
        let params = RequestParameters::new().path_list("channels", &[]);
        let req = build_request(&config(), OperationType::Subscribe, &params, RequestBody::None, vec![])
            .unwrap();
        assert_eq!(req.path, "/v2/subscribe/sub-c-1/,/0");
    }

    #[test]
    fn publish_post_drops_message_component() {
        let params = RequestParameters::new()
            .path("channel", "ch")
            .method(TransportMethod::Post);
        let req = build_request(
            &config(),
            OperationType::Publish,
            &params,
            RequestBody::Bytes(b"\"hi\"".to_vec()),
            vec![],
        )
        .unwrap();
        assert_eq!(req.path, "/publish/pub-c-1/sub-c-1/0/ch/0");
        assert!(req.headers.iter().any(|(k, v)| k == "Content-Type" && v == "application/json"));
    }

    #[test]
    fn publish_without_key_fails() {
        let cfg = Config::with_keys("sub-c-1", "alice");
        let params = RequestParameters::new().path("channel", "ch").path("message", "1");
        let err = build_request(&cfg, OperationType::Publish, &params, RequestBody::None, vec![])
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingKey("publish_key")));
    }

    #[test]
    fn missing_component_is_reported() {
        let err = build_request(
            &config(),
            OperationType::DownloadFile,
            &RequestParameters::new().path("channel", "c"),
            RequestBody::None,
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::MissingComponent(ref n) if n == "file_id"));
    }

    #[test]
    fn metadata_methods_follow_operation() {
        let params = RequestParameters::new();
        let set = build_request(&config(), OperationType::SetUuidMetadata, &params, RequestBody::None, vec![])
            .unwrap();
        assert_eq!(set.method, TransportMethod::Patch);
        assert_eq!(set.path, "/v2/objects/sub-c-1/uuids/alice");
        let rm = build_request(&config(), OperationType::RemoveUuidMetadata, &params, RequestBody::None, vec![])
            .unwrap();
        assert_eq!(rm.method, TransportMethod::Delete);
    }

    #[test]
    fn download_is_response_as_file() {
        let params = RequestParameters::new()
            .path("channel", "c")
            .path("file_id", "id-1")
            .path("file_name", "cat picture.png");
        let req = build_request(&config(), OperationType::DownloadFile, &params, RequestBody::None, vec![])
            .unwrap();
        assert!(req.response_as_file);
        assert_eq!(req.path, "/v1/files/sub-c-1/channels/c/files/id-1/cat%20picture.png");
    }

    #[test]
    fn auth_and_telemetry_are_appended() {
        let mut cfg = config();
        cfg.keys.auth_key = Some("token".into());
        let req = build_request(
            &cfg,
            OperationType::Time,
            &RequestParameters::new(),
            RequestBody::None,
            vec![("l_pub".into(), "0.120".into())],
        )
        .unwrap();
        assert_eq!(req.query_value("auth"), Some("token"));
        assert_eq!(req.query_value("l_pub"), Some("0.120"));
        assert!(req.query_value("requestid").is_some());
    }

    #[test]
    fn signature_is_deterministic_and_sorted() {
        let q1 = vec![("b".to_string(), "2".to_string()), ("a".to_string(), "1 1".to_string())];
        let q2 = vec![("a".to_string(), "1 1".to_string()), ("b".to_string(), "2".to_string())];
        let s1 = sign("secret", TransportMethod::Get, "pub", "/time/0", &q1, "").unwrap();
        let s2 = sign("secret", TransportMethod::Get, "pub", "/time/0", &q2, "").unwrap();
        assert_eq!(s1, s2);
        assert!(s1.starts_with("v2."));
        assert!(!s1.contains('=') && !s1.contains('+') && !s1.contains('/'));
    }

    #[test]
    fn get_signature_ignores_body() {
        let q = vec![("a".to_string(), "1".to_string())];
        let with = sign("s", TransportMethod::Get, "p", "/x", &q, "body").unwrap();
        let without = sign("s", TransportMethod::Get, "p", "/x", &q, "").unwrap();
        assert_eq!(with, without);
        let post = sign("s", TransportMethod::Post, "p", "/x", &q, "body").unwrap();
        assert_ne!(post, without);
    }

    #[test]
    fn secret_key_adds_timestamp_and_signature() {
        let mut cfg = config();
        cfg.keys.secret_key = Some("sec".into());
        let req = build_request(&cfg, OperationType::Time, &RequestParameters::new(), RequestBody::None, vec![])
            .unwrap();
        assert!(req.query_value("timestamp").is_some());
        assert!(req.query_value("signature").unwrap().starts_with("v2."));
    }
}
