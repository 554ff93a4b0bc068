use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::Serialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    headers::{header_map, merge_headers, parse_header},
    types::DEFAULT_CONTENT_TYPE,
    ApiClientError, AttemptOutcome, ClientOptions, EnvelopeStatus, HttpResponse, LogLevel,
    LogSink, PreparedRequest, ReqwestTransport, RequestSpec, ResponseBody, Result,
    ResultEnvelope, RetryConfig, RetryPolicy, Transport, TransportFailureKind,
    API_REQUEST_ERROR, API_REQUEST_ERROR_NO_RESPONSE, REQUEST_CANCELLED, UNABLE_TO_CONNECT,
};

/// Joins a base URL and a request path with exactly one slash.
///
/// Example: `("https://api.test/", "/v1/items")` → `"https://api.test/v1/items"`
pub fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_owned()
    } else {
        format!("{base}/{path}")
    }
}

#[derive(Clone)]
/// HTTP API client that retries transient failures and normalizes every
/// outcome into a [`ResultEnvelope`].
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    headers: HeaderMap,
    options: ClientOptions,
    logger: Option<Arc<dyn LogSink>>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.keys().map(|name| name.as_str()).collect();
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("headers", &header_names)
            .field("options", &self.options)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

impl ApiClient {
    /// Creates a client for `base_url` using a default `reqwest` transport.
    ///
    /// Trailing slashes on the base URL are dropped.
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self::with_transport(base_url, ReqwestTransport::default())
    }

    /// Creates a client that sends requests through a preconfigured `reqwest::Client`.
    pub fn with_reqwest_client(base_url: impl AsRef<str>, http: reqwest::Client) -> Self {
        Self::with_transport(base_url, ReqwestTransport::new(http))
    }

    /// Creates a client over a custom [`Transport`].
    pub fn with_transport(base_url: impl AsRef<str>, transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            base_url: base_url.as_ref().trim_end_matches('/').to_owned(),
            headers: HeaderMap::new(),
            options: ClientOptions::default(),
            logger: None,
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads `API_CLIENT_BASE_URL` plus everything
    /// [`ClientOptions::from_env`] understands. With the `tracing` feature, a
    /// non-empty `API_CLIENT_LOG_CHANNEL` attaches a
    /// [`TracingSink`](crate::TracingSink) for that channel.
    ///
    /// Returns an error if the base URL is missing or empty, or an option
    /// does not parse.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use api_client_http::ApiClient;
    ///
    /// let api = ApiClient::from_env().expect("missing API_CLIENT_* env vars");
    /// ```
    pub fn from_env() -> std::result::Result<Self, String> {
        let base_url = std::env::var("API_CLIENT_BASE_URL")
            .map_err(|_| "missing API_CLIENT_BASE_URL environment variable".to_owned())?;
        if base_url.trim().is_empty() {
            return Err("API_CLIENT_BASE_URL is set but empty".to_owned());
        }
        let options = ClientOptions::from_env()?;

        #[cfg(feature = "tracing")]
        let logger = options
            .log_channel
            .clone()
            .map(|channel| Arc::new(crate::TracingSink::new(channel)) as Arc<dyn LogSink>);
        #[cfg(not(feature = "tracing"))]
        let logger = None;

        Ok(Self::new(base_url.trim())
            .with_options(options)
            .with_logger_opt(logger))
    }

    /// Applies client options such as timeout and default retry limits.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    /// Adds a client-wide header value sent with every request.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = parse_header(name, value)?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Adds several client-wide headers.
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let extra = header_map(headers)?;
        self.headers = merge_headers(&self.headers, extra);
        Ok(self)
    }

    /// Attaches the logging collaborator.
    pub fn with_logger(self, logger: Arc<dyn LogSink>) -> Self {
        self.with_logger_opt(Some(logger))
    }

    fn with_logger_opt(mut self, logger: Option<Arc<dyn LogSink>>) -> Self {
        self.logger = logger;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Sends `message` to the attached sink; does nothing without one.
    pub fn log(&self, message: &str, level: LogLevel) {
        if let Some(logger) = &self.logger {
            logger.log(message, level);
        }
    }

    /// Runs one logical call with the client's default retry limits.
    pub async fn send(&self, spec: RequestSpec) -> ResultEnvelope {
        self.execute(spec, self.options.retry).await
    }

    /// Runs one logical call, retrying connect failures and 5xx responses.
    ///
    /// Never fails: every outcome, including invalid input, is reported in
    /// the returned envelope.
    pub async fn execute(&self, spec: RequestSpec, retry: RetryConfig) -> ResultEnvelope {
        self.execute_with_cancel(spec, retry, &CancellationToken::new())
            .await
    }

    /// Like [`ApiClient::execute`], but aborts the in-flight attempt or the
    /// pending backoff as soon as `cancel` fires. A cancelled call is not
    /// retried.
    pub async fn execute_with_cancel(
        &self,
        spec: RequestSpec,
        retry: RetryConfig,
        cancel: &CancellationToken,
    ) -> ResultEnvelope {
        let request = match self.prepare(spec) {
            Ok(request) => request,
            Err(err) => return ResultEnvelope::failure(err.to_string()),
        };
        let policy = RetryPolicy::new(retry).with_sink(self.logger.clone());
        let mut attempt = 0u32;

        loop {
            #[cfg(feature = "tracing")]
            tracing::debug!(method = %request.method, url = %request.url, attempt, "sending request");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return cancelled(),
                result = self.transport.send(&request) => result,
            };

            let outcome = match AttemptOutcome::classify(result, self.options.http_errors) {
                Ok(outcome) => outcome,
                Err(message) => return ResultEnvelope::failure(message),
            };

            if !policy.should_retry(attempt, &outcome, &request.url) {
                return self.finish(outcome, &request);
            }

            let delay = policy.delay_for(attempt + 1);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                url = %request.url,
                delay_ms = delay.as_millis() as u64,
                "backing off before retry"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return cancelled(),
                _ = sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    /// JSON-encodes `payload` and sends it with `Accept: application/json`
    /// and `X-Requested-With: XMLHttpRequest`.
    pub async fn call_json<T, I, K, V>(
        &self,
        method: &str,
        path: &str,
        payload: &T,
        headers: I,
    ) -> ResultEnvelope
    where
        T: Serialize + ?Sized,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let spec = match json_spec(method, path, payload, headers) {
            Ok(spec) => spec
                .set_header("Accept", "application/json")
                .set_header("X-Requested-With", "XMLHttpRequest"),
            Err(err) => return ResultEnvelope::failure(err.to_string()),
        };
        self.send(spec).await
    }

    /// JSON-encodes `payload` and sends it without extra headers.
    pub async fn call<T, I, K, V>(
        &self,
        method: &str,
        path: &str,
        payload: &T,
        headers: I,
    ) -> ResultEnvelope
    where
        T: Serialize + ?Sized,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        match json_spec(method, path, payload, headers) {
            Ok(spec) => self.send(spec).await,
            Err(err) => ResultEnvelope::failure(err.to_string()),
        }
    }

    fn prepare(&self, spec: RequestSpec) -> Result<PreparedRequest> {
        let method = Method::from_bytes(spec.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| ApiClientError::InvalidMethod(spec.method.clone()))?;

        let url = join_url(&self.base_url, &spec.path);
        reqwest::Url::parse(&url).map_err(|err| ApiClientError::InvalidUrl {
            url: url.clone(),
            reason: err.to_string(),
        })?;

        let call_headers = header_map(
            spec.headers
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        )?;
        let headers = merge_headers(&self.headers, call_headers);
        let timeout = spec
            .timeout
            .unwrap_or(Duration::from_millis(self.options.timeout_ms));

        Ok(PreparedRequest {
            method,
            url,
            headers,
            body: spec.body,
            query: spec.query,
            timeout,
        })
    }

    fn finish(&self, outcome: AttemptOutcome, request: &PreparedRequest) -> ResultEnvelope {
        let envelope = match outcome {
            AttemptOutcome::Success(response) => response_envelope(response, None),
            AttemptOutcome::HttpFailure(response) => {
                response_envelope(response, Some(API_REQUEST_ERROR))
            }
            AttemptOutcome::TransportFailure { kind, cause } => {
                let error = match kind {
                    TransportFailureKind::Connect => UNABLE_TO_CONNECT,
                    TransportFailureKind::Other => API_REQUEST_ERROR_NO_RESPONSE,
                };
                ResultEnvelope {
                    body: Some(ResponseBody::Text(cause)),
                    ..ResultEnvelope::failure(error)
                }
            }
        };

        if let Some(error) = &envelope.error {
            #[cfg(feature = "tracing")]
            tracing::warn!(url = %request.url, http_code = ?envelope.http_code, error = %error, "request failed");

            self.log(
                &format!("{} {} failed: {error}", request.method, request.url),
                LogLevel::Warning,
            );
        }

        envelope
    }
}

fn json_spec<T, I, K, V>(method: &str, path: &str, payload: &T, headers: I) -> Result<RequestSpec>
where
    T: Serialize + ?Sized,
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let value =
        serde_json::to_value(payload).map_err(|err| ApiClientError::Encode(err.to_string()))?;
    let spec = headers
        .into_iter()
        .fold(RequestSpec::new(method, path).json(value), |spec, (name, header)| {
            spec.header(name.as_ref(), header.as_ref())
        });
    Ok(spec)
}

fn response_envelope(response: HttpResponse, error: Option<&str>) -> ResultEnvelope {
    let content_type = response
        .content_type
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_owned());
    let body = ResponseBody::from_content(response.body, &content_type);
    let status = if error.is_none() {
        EnvelopeStatus::Succeeded
    } else {
        EnvelopeStatus::Failed
    };

    ResultEnvelope {
        status,
        http_code: Some(response.status),
        body: Some(body),
        content_type: Some(content_type),
        error: error.map(str::to_owned),
    }
}

fn cancelled() -> ResultEnvelope {
    ResultEnvelope::failure(REQUEST_CANCELLED)
}
