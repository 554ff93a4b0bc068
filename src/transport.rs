//! Transport seam between [`ApiClient`](crate::ApiClient) and the network.
//!
//! A transport performs exactly one HTTP exchange per call and reports the
//! outcome as a [`TransportResult`] instead of an error, so the client can
//! classify connect failures and received responses by pattern matching.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Method;

use crate::RequestBody;

/// Fully resolved request handed to a [`Transport`] for one attempt.
#[derive(Clone, Debug)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub query: Vec<(String, String)>,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

/// Response data captured from one attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// First `Content-Type` header value, if any.
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_owned),
            body: body.into(),
        }
    }
}

/// Outcome of a single transport call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportResult {
    /// A response was received; the transport does not judge its status.
    Response(HttpResponse),
    /// A response was received and the transport itself flagged it as an error.
    ResponseError(HttpResponse),
    /// No response: DNS failure, refused connection or timeout.
    ConnectError(String),
    /// No response for any other transport reason.
    Failed(String),
    /// The request was rejected before anything was sent.
    Invalid(String),
}

/// Performs one HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &PreparedRequest) -> TransportResult;
}

/// [`Transport`] backed by `reqwest`. Responses of every status are reported
/// as [`TransportResult::Response`].
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &PreparedRequest) -> TransportResult {
        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone())
            .timeout(request.timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Text(text) => builder.body(text.clone()),
            RequestBody::Form(fields) => builder.form(fields),
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => return classify_reqwest_error(err),
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        match response.text().await {
            Ok(body) => TransportResult::Response(HttpResponse {
                status,
                content_type,
                body,
            }),
            Err(err) => classify_reqwest_error(err),
        }
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportResult {
    if err.is_builder() {
        TransportResult::Invalid(err.to_string())
    } else if err.is_connect() || err.is_timeout() {
        TransportResult::ConnectError(err.to_string())
    } else {
        TransportResult::Failed(err.to_string())
    }
}
