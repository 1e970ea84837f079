use pn_domain::OperationType;

use super::{require, require_any};
use crate::builder::RequestParameters;
use crate::client::{unexpected, Client};
use crate::parser::ParsedData;
use crate::status::Status;

impl Client {
    pub async fn add_channels_to_group(&self, group: &str, channels: &[String]) -> Result<(), Status> {
        let op = OperationType::AddChannelsToGroup;
        require(op, group, "group")?;
        require_any(op, channels, &[])?;
        let params = RequestParameters::new()
            .path("group", group)
            .query_list("add", channels);
        self.acknowledge(op, params).await
    }

    pub async fn remove_channels_from_group(
        &self,
        group: &str,
        channels: &[String],
    ) -> Result<(), Status> {
        let op = OperationType::RemoveChannelsFromGroup;
        require(op, group, "group")?;
        require_any(op, channels, &[])?;
        let params = RequestParameters::new()
            .path("group", group)
            .query_list("remove", channels);
        self.acknowledge(op, params).await
    }

    pub async fn channels_for_group(&self, group: &str) -> Result<Vec<String>, Status> {
        let op = OperationType::ChannelsForGroup;
        require(op, group, "group")?;
        let params = RequestParameters::new().path("group", group);
        match self.process(op, params).await? {
            ParsedData::ChannelGroupChannels(channels) => Ok(channels),
            other => Err(unexpected(op, other)),
        }
    }

    pub async fn remove_group(&self, group: &str) -> Result<(), Status> {
        let op = OperationType::RemoveGroup;
        require(op, group, "group")?;
        self.acknowledge(op, RequestParameters::new().path("group", group))
            .await
    }
}
