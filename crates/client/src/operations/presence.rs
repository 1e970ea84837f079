use std::collections::{BTreeMap, HashMap};

use pn_domain::{OperationType, StatusCategory};
use serde_json::Value;

use super::{require_any, to_json};
use crate::builder::RequestParameters;
use crate::client::{unexpected, Client};
use crate::model::HereNowResult;
use crate::parser::ParsedData;
use crate::status::Status;
use crate::subscribe::Command;

#[derive(Debug, Clone, Default)]
pub struct HereNowRequest {
    /// Empty channels and groups asks for the whole key.
    pub channels: Vec<String>,
    pub groups: Vec<String>,
    /// Occupancy only, no occupant list.
    pub disable_uuids: bool,
    pub include_state: bool,
}

impl Client {
    pub async fn here_now(&self, request: HereNowRequest) -> Result<HereNowResult, Status> {
        let op = OperationType::HereNow;
        let params = RequestParameters::new()
            .path_list("channels", &request.channels)
            .query_list("channel-group", &request.groups)
            .query_opt("disable_uuids", request.disable_uuids.then_some(1))
            .query_opt("state", request.include_state.then_some(1))
            .targets(&request.channels);
        match self.process(op, params).await? {
            ParsedData::HereNow(result) => Ok(result),
            other => Err(unexpected(op, other)),
        }
    }

    /// Channels `user_id` (default: this client) is present on.
    pub async fn where_now(&self, user_id: Option<&str>) -> Result<Vec<String>, Status> {
        let op = OperationType::WhereNow;
        let mut params = RequestParameters::new();
        if let Some(id) = user_id {
            params = params.path("uuid", id);
        }
        match self.process(op, params).await? {
            ParsedData::WhereNow(channels) => Ok(channels),
            other => Err(unexpected(op, other)),
        }
    }

    /// Set this client's presence state.  On success the state is also
    /// cached so later long-polls and heartbeats carry it.
    pub async fn set_state(
        &self,
        channels: &[String],
        groups: &[String],
        state: Value,
    ) -> Result<BTreeMap<String, Value>, Status> {
        let op = OperationType::SetState;
        require_any(op, channels, groups)?;
        if !state.is_object() {
            return Err(Status::error(op, StatusCategory::BadRequest, "state must be a JSON object"));
        }
        let params = RequestParameters::new()
            .path_list("channels", channels)
            .query_list("channel-group", groups)
            .query("state", to_json(op, &state)?)
            .targets(channels);
        let result = match self.process(op, params).await? {
            ParsedData::State(result) => result,
            other => return Err(unexpected(op, other)),
        };

        let cached: HashMap<String, Value> = channels
            .iter()
            .chain(groups)
            .map(|name| (name.clone(), state.clone()))
            .collect();
        self.command(op, |ack| Command::SetState { state: cached, ack })
            .await?;
        Ok(result)
    }

    /// Presence state of `user_id` (default: this client), keyed by
    /// channel.
    pub async fn get_state(
        &self,
        channels: &[String],
        groups: &[String],
        user_id: Option<&str>,
    ) -> Result<BTreeMap<String, Value>, Status> {
        let op = OperationType::GetState;
        require_any(op, channels, groups)?;
        let mut params = RequestParameters::new()
            .path_list("channels", channels)
            .query_list("channel-group", groups)
            .targets(channels);
        if let Some(id) = user_id {
            params = params.path("uuid", id);
        }
        match self.process(op, params).await? {
            ParsedData::State(result) => Ok(result),
            other => Err(unexpected(op, other)),
        }
    }

    /// One explicit heartbeat, outside the managed interval.
    pub async fn heartbeat(
        &self,
        channels: &[String],
        groups: &[String],
        state: Option<Value>,
    ) -> Result<(), Status> {
        let op = OperationType::Heartbeat;
        require_any(op, channels, groups)?;
        let heartbeat = self.config().presence.heartbeat_value_secs;
        let mut params = RequestParameters::new()
            .path_list("channels", channels)
            .query_opt("heartbeat", (heartbeat > 0).then_some(heartbeat))
            .query_list("channel-group", groups)
            .targets(channels);
        if let Some(ref state) = state {
            params = params.query("state", to_json(op, state)?);
        }
        self.acknowledge(op, params).await
    }
}
