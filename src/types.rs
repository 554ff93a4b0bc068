use std::time::Duration;

use serde::{Serialize, Serializer};

/// Envelope error for a connect failure that outlived its retries.
pub const UNABLE_TO_CONNECT: &str = "Unable to connect";
/// Envelope error for a response classified as an HTTP failure.
pub const API_REQUEST_ERROR: &str = "Api Request Error";
/// Envelope error for a transport failure that produced no response.
pub const API_REQUEST_ERROR_NO_RESPONSE: &str = "Api Request Error (no response)";
/// Envelope error for a call aborted through its cancellation token.
pub const REQUEST_CANCELLED: &str = "Request cancelled";
/// Envelope error used when no attempt ever completed.
pub const SOME_ERROR_OCCURRED: &str = "Some error occurred";

/// Content type reported when a response carries none.
pub(crate) const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// Outgoing request payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Serialized as JSON with `Content-Type: application/json`.
    Json(serde_json::Value),
    /// Sent verbatim.
    Text(String),
    /// URL-encoded form fields.
    Form(Vec<(String, String)>),
}

/// Description of one logical API call.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestSpec {
    /// HTTP verb, case-insensitive.
    pub method: String,
    /// Path appended to the client base URL.
    pub path: String,
    pub body: RequestBody,
    /// Per-call headers; repeated names are sent as multiple values.
    pub headers: Vec<(String, String)>,
    /// Query string pairs.
    pub query: Vec<(String, String)>,
    /// Overrides the client per-attempt timeout.
    pub timeout: Option<Duration>,
}

impl RequestSpec {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            body: RequestBody::Empty,
            headers: Vec::new(),
            query: Vec::new(),
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new("POST", path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new("PUT", path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new("DELETE", path)
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = RequestBody::Text(body.into());
        self
    }

    pub fn form<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.body = RequestBody::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Adds a header value. Repeating a name adds another value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a header, dropping earlier per-call values with the same name.
    pub fn set_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// `status` field of a [`ResultEnvelope`], serialized as `0` or `1`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EnvelopeStatus {
    Failed = 0,
    Succeeded = 1,
}

impl Serialize for EnvelopeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

/// Response body as exposed to callers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    /// Raw body text.
    Text(String),
    /// Decoded body of a JSON response.
    Json(serde_json::Value),
}

impl ResponseBody {
    /// Decodes `raw` when the content type names JSON, otherwise keeps it as text.
    ///
    /// A JSON content type with an undecodable body falls back to the raw text.
    pub fn from_content(raw: String, content_type: &str) -> Self {
        if !is_json_content_type(content_type) {
            return Self::Text(raw);
        }
        match serde_json::from_str(&raw) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(raw),
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Json(_) => None,
        }
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    content_type
        .to_ascii_lowercase()
        .contains("application/json")
}

/// Uniform result of one logical call. Every field is set on every exit path.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultEnvelope {
    pub status: EnvelopeStatus,
    pub http_code: Option<u16>,
    pub body: Option<ResponseBody>,
    pub content_type: Option<String>,
    pub error: Option<String>,
}

impl Default for ResultEnvelope {
    fn default() -> Self {
        Self::failure(SOME_ERROR_OCCURRED)
    }
}

impl ResultEnvelope {
    pub(crate) fn failure(error: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Failed,
            http_code: None,
            body: None,
            content_type: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == EnvelopeStatus::Succeeded
    }

    pub fn json(&self) -> Option<&serde_json::Value> {
        self.body.as_ref().and_then(ResponseBody::as_json)
    }

    pub fn text(&self) -> Option<&str> {
        self.body.as_ref().and_then(ResponseBody::as_text)
    }
}
