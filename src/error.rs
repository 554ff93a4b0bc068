/// Error type for client configuration and request preparation.
///
/// [`ApiClient::execute`](crate::ApiClient::execute) never returns this type;
/// preparation failures inside a call are folded into the
/// [`ResultEnvelope`](crate::ResultEnvelope) instead.
#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    /// Method string is not a valid HTTP token.
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),
    /// Header name or value could not be encoded.
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },
    /// Joined base URL and path do not form an absolute URL.
    #[error("invalid request URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Outgoing payload could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encode(String),
}
