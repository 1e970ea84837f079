//! `pn-transport`: HTTP plumbing under the client.
//!
//! Requests and responses are plain values.  A [`Transport`] performs one
//! exchange; [`ReqwestTransport`] is the production implementation.
//! [`RequestRetryConfig`] decides whether and when a failed exchange is
//! retried, [`ScheduledRetry`] is the cancellable wait in between, and
//! [`CancelRegistry`] tracks in-flight requests for bulk cancellation.

pub mod cancel;
pub mod error;
pub mod request;
pub mod response;
pub mod retry;
pub mod transport;

pub use cancel::{CancelGuard, CancelRegistry};
pub use error::{from_reqwest, TransportError};
pub use request::{encode_component, RequestBody, TransportMethod, TransportRequest};
pub use response::{ResponseBody, TransportResponse};
pub use retry::{FailureKind, RequestRetryConfig, RetryOutcome, RetryPolicy, ScheduledRetry};
pub use transport::{ReqwestTransport, SessionConfig, Transport};
