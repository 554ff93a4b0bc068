//! Logging collaborator injected into [`ApiClient`](crate::ApiClient).
//!
//! The client never looks up a global logger. Callers attach a [`LogSink`]
//! explicitly; without one, log calls are no-ops.

use std::fmt;

/// Severity of a log message.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives log messages emitted by the client.
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str, level: LogLevel);
}

impl<F> LogSink for F
where
    F: Fn(&str, LogLevel) + Send + Sync,
{
    fn log(&self, message: &str, level: LogLevel) {
        self(message, level)
    }
}

/// Forwards messages to `tracing`, tagged with a channel name.
///
/// Enabled with the `tracing` feature.
#[cfg(feature = "tracing")]
#[derive(Clone, Debug)]
pub struct TracingSink {
    channel: String,
}

#[cfg(feature = "tracing")]
impl TracingSink {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[cfg(feature = "tracing")]
impl LogSink for TracingSink {
    fn log(&self, message: &str, level: LogLevel) {
        let channel = self.channel.as_str();
        match level {
            LogLevel::Debug => tracing::debug!(channel, "{message}"),
            LogLevel::Info => tracing::info!(channel, "{message}"),
            LogLevel::Warning => tracing::warn!(channel, "{message}"),
            LogLevel::Error => tracing::error!(channel, "{message}"),
        }
    }
}
