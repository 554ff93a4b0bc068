/// Retry limits for one logical call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryConfig {
    /// Extra attempts allowed after the first one.
    pub max_retries: u32,
    /// Linear backoff step in milliseconds: retry `n` waits `n * base_delay_ms`.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 1_000,
        }
    }
}

impl RetryConfig {
    /// Disables retries; the first attempt is final.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Client-wide settings, immutable once attached to an [`ApiClient`](crate::ApiClient).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Per-attempt transport timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retry limits used by calls that do not pass their own.
    pub retry: RetryConfig,
    /// Treat every response with status >= 400 as an HTTP failure.
    pub http_errors: bool,
    /// Named log channel for the `tracing` sink.
    pub log_channel: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            retry: RetryConfig::default(),
            http_errors: false,
            log_channel: None,
        }
    }
}

impl ClientOptions {
    /// Reads options from the process environment.
    ///
    /// Recognized variables (all optional):
    /// - `API_CLIENT_TIMEOUT_MS`
    /// - `API_CLIENT_MAX_RETRIES`
    /// - `API_CLIENT_RETRY_DELAY_MS`
    /// - `API_CLIENT_LOG_CHANNEL`
    ///
    /// Unset or blank variables keep their defaults. A value that does not
    /// parse as an unsigned integer is an error.
    pub fn from_env() -> std::result::Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> std::result::Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();
        let value = |key: &str| lookup(key).filter(|raw| !raw.trim().is_empty());

        if let Some(raw) = value("API_CLIENT_TIMEOUT_MS") {
            options.timeout_ms = parse_number("API_CLIENT_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = value("API_CLIENT_MAX_RETRIES") {
            options.retry.max_retries = parse_number("API_CLIENT_MAX_RETRIES", &raw)?;
        }
        if let Some(raw) = value("API_CLIENT_RETRY_DELAY_MS") {
            options.retry.base_delay_ms = parse_number("API_CLIENT_RETRY_DELAY_MS", &raw)?;
        }
        options.log_channel = value("API_CLIENT_LOG_CHANNEL").map(|raw| raw.trim().to_owned());

        Ok(options)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> std::result::Result<T, String> {
    raw.trim()
        .parse()
        .map_err(|_| format!("{key} must be an unsigned integer, got '{raw}'"))
}
