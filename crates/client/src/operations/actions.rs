use pn_domain::event::MessageAction;
use pn_domain::OperationType;
use serde_json::json;

use super::{require, to_json};
use crate::builder::RequestParameters;
use crate::client::{unexpected, Client};
use crate::model::MessageActionsPage;
use crate::parser::ParsedData;
use crate::status::Status;

impl Client {
    /// Attach a reaction / receipt to the message published at
    /// `message_timetoken`.
    pub async fn add_message_action(
        &self,
        channel: &str,
        message_timetoken: u64,
        kind: &str,
        value: &str,
    ) -> Result<MessageAction, Status> {
        let op = OperationType::AddMessageAction;
        require(op, channel, "channel")?;
        require(op, kind, "action type")?;
        require(op, value, "action value")?;
        let params = RequestParameters::new()
            .path("channel", channel)
            .path("message_timetoken", &message_timetoken.to_string());
        let body = to_json(op, &json!({ "type": kind, "value": value }))?;
        match self.process_with_body(op, params, body.into_bytes()).await? {
            ParsedData::MessageAction(action) => Ok(action),
            other => Err(unexpected(op, other)),
        }
    }

    pub async fn remove_message_action(
        &self,
        channel: &str,
        message_timetoken: u64,
        action_timetoken: u64,
    ) -> Result<(), Status> {
        let op = OperationType::RemoveMessageAction;
        require(op, channel, "channel")?;
        let params = RequestParameters::new()
            .path("channel", channel)
            .path("message_timetoken", &message_timetoken.to_string())
            .path("action_timetoken", &action_timetoken.to_string());
        self.acknowledge(op, params).await
    }

    /// Actions on `channel`, newest first, bounded by action timetokens.
    pub async fn fetch_message_actions(
        &self,
        channel: &str,
        start: Option<u64>,
        end: Option<u64>,
        limit: Option<u32>,
    ) -> Result<MessageActionsPage, Status> {
        let op = OperationType::FetchMessageActions;
        require(op, channel, "channel")?;
        let params = RequestParameters::new()
            .path("channel", channel)
            .query_opt("start", start)
            .query_opt("end", end)
            .query_opt("limit", limit);
        match self.process(op, params).await? {
            ParsedData::MessageActions { actions, more } => Ok(MessageActionsPage { actions, more }),
            other => Err(unexpected(op, other)),
        }
    }
}
