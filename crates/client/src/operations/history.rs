use std::collections::BTreeMap;

use pn_domain::{OperationType, StatusCategory};

use super::require;
use crate::builder::RequestParameters;
use crate::client::{unexpected, Client};
use crate::model::FetchMessagesResult;
use crate::parser::ParsedData;
use crate::status::Status;

#[derive(Debug, Clone, Default)]
pub struct FetchMessagesRequest {
    pub channels: Vec<String>,
    /// Page size; the service defaults to 100 for one channel, 25 for
    /// several.
    pub max: Option<u32>,
    /// Exclusive upper bound.
    pub start: Option<u64>,
    /// Inclusive lower bound.
    pub end: Option<u64>,
    pub include_meta: bool,
    pub include_message_type: bool,
    pub include_uuid: bool,
    pub include_custom_message_type: bool,
}

impl Client {
    /// Stored messages, decrypted when a crypto module is configured.
    pub async fn fetch_messages(
        &self,
        request: FetchMessagesRequest,
    ) -> Result<FetchMessagesResult, Status> {
        let op = OperationType::FetchMessages;
        if request.channels.is_empty() {
            return Err(Status::error(op, StatusCategory::BadRequest, "no channels"));
        }
        let params = RequestParameters::new()
            .path_list("channels", &request.channels)
            .query_opt("max", request.max)
            .query_opt("start", request.start)
            .query_opt("end", request.end)
            .query_opt("include_meta", request.include_meta.then_some("true"))
            .query_opt(
                "include_message_type",
                request.include_message_type.then_some("true"),
            )
            .query_opt("include_uuid", request.include_uuid.then_some("true"))
            .query_opt(
                "include_custom_message_type",
                request.include_custom_message_type.then_some("true"),
            )
            .targets(&request.channels);
        match self.process(op, params).await? {
            ParsedData::FetchMessages(result) => Ok(result),
            other => Err(unexpected(op, other)),
        }
    }

    /// Remove stored messages in `(end, start]` from one channel.
    pub async fn delete_messages(
        &self,
        channel: &str,
        start: Option<u64>,
        end: Option<u64>,
    ) -> Result<(), Status> {
        let op = OperationType::DeleteMessages;
        require(op, channel, "channel")?;
        let params = RequestParameters::new()
            .path("channel", channel)
            .query_opt("start", start)
            .query_opt("end", end);
        self.acknowledge(op, params).await
    }

    /// Messages stored since each timetoken.  One timetoken applies to
    /// every channel; otherwise there must be one per channel.
    pub async fn message_counts(
        &self,
        channels: &[String],
        timetokens: &[u64],
    ) -> Result<BTreeMap<String, u64>, Status> {
        let op = OperationType::MessageCounts;
        if channels.is_empty() {
            return Err(Status::error(op, StatusCategory::BadRequest, "no channels"));
        }
        let mut params = RequestParameters::new().path_list("channels", channels);
        match timetokens {
            [] => {
                return Err(Status::error(op, StatusCategory::BadRequest, "no timetokens"));
            }
            [single] => params = params.query("timetoken", single),
            many if many.len() == channels.len() => {
                let joined: Vec<String> = many.iter().map(u64::to_string).collect();
                params = params.query_list("channelsTimetoken", &joined);
            }
            _ => {
                return Err(Status::error(
                    op,
                    StatusCategory::BadRequest,
                    "timetokens must be one or one per channel",
                ));
            }
        }
        match self.process(op, params).await? {
            ParsedData::MessageCounts(counts) => Ok(counts),
            other => Err(unexpected(op, other)),
        }
    }
}
