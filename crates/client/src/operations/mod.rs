//! REST operations.
//!
//! Each operation is a parameter builder over the network engine: it
//! fills [`RequestParameters`], hands them to
//! [`NetworkEngine::process_operation`](crate::network::NetworkEngine::process_operation)
//! and unwraps the parsed variant it expects.  Request structs are plain
//! values with `Default`.

mod actions;
mod files;
mod groups;
mod history;
mod objects;
mod presence;
mod publish;

pub use history::FetchMessagesRequest;
pub use presence::HereNowRequest;
pub use publish::{PublishRequest, SignalRequest};

use pn_domain::{OperationType, StatusCategory};
use pn_transport::RequestBody;

use crate::builder::RequestParameters;
use crate::client::Client;
use crate::parser::ParsedData;
use crate::status::Status;

impl Client {
    pub(crate) async fn process(
        &self,
        operation: OperationType,
        params: RequestParameters,
    ) -> Result<ParsedData, Status> {
        self.engine
            .process_operation(operation, params, RequestBody::None)
            .await
    }

    pub(crate) async fn process_with_body(
        &self,
        operation: OperationType,
        params: RequestParameters,
        body: Vec<u8>,
    ) -> Result<ParsedData, Status> {
        self.engine
            .process_operation(operation, params, RequestBody::Bytes(body))
            .await
    }

    /// Operations that only care whether the call succeeded.
    pub(crate) async fn acknowledge(
        &self,
        operation: OperationType,
        params: RequestParameters,
    ) -> Result<(), Status> {
        match self.process(operation, params).await? {
            ParsedData::Acknowledgment => Ok(()),
            other => Err(crate::client::unexpected(operation, other)),
        }
    }
}

/// Reject a missing required argument before anything is sent.
pub(crate) fn require(
    operation: OperationType,
    value: &str,
    name: &str,
) -> Result<(), Status> {
    if value.trim().is_empty() {
        return Err(Status::error(
            operation,
            StatusCategory::BadRequest,
            format!("{name} must not be empty"),
        ));
    }
    Ok(())
}

pub(crate) fn require_any(
    operation: OperationType,
    channels: &[String],
    groups: &[String],
) -> Result<(), Status> {
    if channels.is_empty() && groups.is_empty() {
        return Err(Status::error(
            operation,
            StatusCategory::BadRequest,
            "at least one channel or channel group is required",
        ));
    }
    Ok(())
}

pub(crate) fn to_json(operation: OperationType, value: &impl serde::Serialize) -> Result<String, Status> {
    serde_json::to_string(value)
        .map_err(|e| Status::error(operation, StatusCategory::BadRequest, format!("serialize: {e}")))
}
