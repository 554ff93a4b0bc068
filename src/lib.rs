//! `api-client-http` is an async HTTP API client wrapper.
//!
//! Every call goes through [`ApiClient::execute`], which:
//! - merges client-wide and per-call headers (colliding names keep all values),
//! - retries connect failures and 5xx responses with linear backoff,
//! - folds every outcome into a single [`ResultEnvelope`].
//!
//! Convenience entry points [`ApiClient::call_json`] and [`ApiClient::call`]
//! JSON-encode a payload and delegate to `execute`.

mod client;
mod error;
mod headers;
mod logging;
mod options;
mod retry;
mod transport;
mod types;

pub use client::{join_url, ApiClient};
pub use error::ApiClientError;
#[cfg(feature = "tracing")]
pub use logging::TracingSink;
pub use logging::{LogLevel, LogSink};
pub use options::{ClientOptions, RetryConfig};
pub use retry::{AttemptOutcome, RetryPolicy, TransportFailureKind};
pub use transport::{HttpResponse, PreparedRequest, ReqwestTransport, Transport, TransportResult};
pub use types::{
    EnvelopeStatus, RequestBody, RequestSpec, ResponseBody, ResultEnvelope, API_REQUEST_ERROR,
    API_REQUEST_ERROR_NO_RESPONSE, REQUEST_CANCELLED, SOME_ERROR_OCCURRED, UNABLE_TO_CONNECT,
};

pub use reqwest::Method;
pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, ApiClientError>;
