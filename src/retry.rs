//! Retry decision and linear backoff schedule.

use std::sync::Arc;
use std::time::Duration;

use crate::{HttpResponse, LogLevel, LogSink, RetryConfig, TransportResult};

/// Why an attempt produced no response.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransportFailureKind {
    /// DNS failure, refused connection or timeout.
    Connect,
    Other,
}

/// Classified result of one attempt, consumed by [`RetryPolicy`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(HttpResponse),
    TransportFailure {
        kind: TransportFailureKind,
        cause: String,
    },
    HttpFailure(HttpResponse),
}

impl AttemptOutcome {
    /// Classifies a transport result.
    ///
    /// Plain responses are failures only when their status is 5xx, or >= 400
    /// when `http_errors` is set. Responses the transport flagged itself are
    /// always failures. `Err` carries the message of a request the transport
    /// refused to send.
    pub fn classify(result: TransportResult, http_errors: bool) -> Result<Self, String> {
        let outcome = match result {
            TransportResult::Response(response) => {
                let threshold = if http_errors { 400 } else { 500 };
                if response.status >= threshold {
                    Self::HttpFailure(response)
                } else {
                    Self::Success(response)
                }
            }
            TransportResult::ResponseError(response) => Self::HttpFailure(response),
            TransportResult::ConnectError(cause) => Self::TransportFailure {
                kind: TransportFailureKind::Connect,
                cause,
            },
            TransportResult::Failed(cause) => Self::TransportFailure {
                kind: TransportFailureKind::Other,
                cause,
            },
            TransportResult::Invalid(message) => return Err(message),
        };
        Ok(outcome)
    }
}

/// Decides whether a failed attempt is retried and how long to wait first.
#[derive(Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
    sink: Option<Arc<dyn LogSink>>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config, sink: None }
    }

    /// Attaches the sink that receives `retry` log messages.
    pub fn with_sink(mut self, sink: Option<Arc<dyn LogSink>>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> RetryConfig {
        self.config
    }

    /// Returns whether the attempt that produced `outcome` should be retried.
    ///
    /// `attempt` is the number of retries already performed (0 after the
    /// first attempt). Only connect failures and 5xx responses are retried.
    pub fn should_retry(&self, attempt: u32, outcome: &AttemptOutcome, target: &str) -> bool {
        if attempt > 0 {
            self.log_retry(attempt, target);
        }

        if attempt >= self.config.max_retries {
            return false;
        }

        match outcome {
            AttemptOutcome::TransportFailure { kind, .. } => {
                *kind == TransportFailureKind::Connect
            }
            AttemptOutcome::HttpFailure(response) => response.status >= 500,
            AttemptOutcome::Success(_) => false,
        }
    }

    /// Delay before retry number `attempt` (1-based): `base_delay_ms * attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.config.base_delay_ms.saturating_mul(u64::from(attempt)))
    }

    fn log_retry(&self, attempt: u32, target: &str) {
        #[cfg(feature = "tracing")]
        tracing::info!(event = "retry_attempt", attempt, target = %target, "retrying request");

        if let Some(sink) = &self.sink {
            sink.log(&format!("retry {attempt} of url {target}"), LogLevel::Info);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::{AttemptOutcome, RetryPolicy, TransportFailureKind};
    use crate::{HttpResponse, LogLevel, LogSink, RetryConfig, TransportResult};

    const TARGET: &str = "https://api.example.test/v1/items";

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_retries,
            base_delay_ms: 1_000,
        })
    }

    fn connect_failure() -> AttemptOutcome {
        AttemptOutcome::TransportFailure {
            kind: TransportFailureKind::Connect,
            cause: "connection refused".to_owned(),
        }
    }

    fn http_failure(status: u16) -> AttemptOutcome {
        AttemptOutcome::HttpFailure(HttpResponse::new(status, None, ""))
    }

    #[test]
    fn stops_once_limit_is_reached() {
        let policy = policy(3);
        for attempt in 3..8 {
            assert!(!policy.should_retry(attempt, &connect_failure(), TARGET));
            assert!(!policy.should_retry(attempt, &http_failure(503), TARGET));
        }
    }

    #[test]
    fn retries_server_errors_below_limit() {
        let policy = policy(3);
        for attempt in 0..3 {
            assert!(policy.should_retry(attempt, &http_failure(500), TARGET));
            assert!(policy.should_retry(attempt, &http_failure(599), TARGET));
        }
    }

    #[test]
    fn never_retries_client_errors() {
        let policy = policy(3);
        for status in [100, 200, 301, 400, 404, 429, 499] {
            assert!(!policy.should_retry(0, &http_failure(status), TARGET));
        }
    }

    #[test]
    fn retries_connect_failures_only() {
        let policy = policy(1);
        assert!(policy.should_retry(0, &connect_failure(), TARGET));

        let other = AttemptOutcome::TransportFailure {
            kind: TransportFailureKind::Other,
            cause: "body stream closed".to_owned(),
        };
        assert!(!policy.should_retry(0, &other, TARGET));
    }

    #[test]
    fn success_is_never_retried() {
        let success = AttemptOutcome::Success(HttpResponse::new(200, None, "ok"));
        assert!(!policy(5).should_retry(0, &success, TARGET));
    }

    #[test]
    fn zero_retries_stops_immediately() {
        assert!(!policy(0).should_retry(0, &connect_failure(), TARGET));
    }

    #[test]
    fn delay_is_linear_in_attempt_number() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 5,
            base_delay_ms: 250,
        });
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(2), Duration::from_millis(500));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1_250));
    }

    #[test]
    fn delay_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 5,
            base_delay_ms: u64::MAX,
        });
        assert_eq!(policy.delay_for(3), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn logs_retry_event_only_after_first_attempt() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let sink: Arc<dyn LogSink> = Arc::new(move |message: &str, level: LogLevel| {
            recorder
                .lock()
                .expect("log buffer mutex must not be poisoned")
                .push((message.to_owned(), level));
        });
        let policy = policy(1).with_sink(Some(sink));

        policy.should_retry(0, &connect_failure(), TARGET);
        policy.should_retry(1, &connect_failure(), TARGET);
        policy.should_retry(2, &http_failure(404), TARGET);

        let seen = seen.lock().expect("log buffer mutex must not be poisoned");
        assert_eq!(
            *seen,
            vec![
                (format!("retry 1 of url {TARGET}"), LogLevel::Info),
                (format!("retry 2 of url {TARGET}"), LogLevel::Info),
            ]
        );
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn retry_event_carries_attempt_and_target_fields() {
        use tracing::field::{Field, Visit};
        use tracing_subscriber::layer::{Context, SubscriberExt};
        use tracing_subscriber::Layer;

        #[derive(Clone, Default)]
        struct FieldRecorder(Arc<Mutex<Vec<(String, String)>>>);

        struct FieldVisitor<'a>(&'a mut Vec<(String, String)>);

        impl Visit for FieldVisitor<'_> {
            fn record_str(&mut self, field: &Field, value: &str) {
                self.0.push((field.name().to_owned(), value.to_owned()));
            }

            fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
                self.0.push((field.name().to_owned(), format!("{value:?}")));
            }
        }

        impl<S: tracing::Subscriber> Layer<S> for FieldRecorder {
            fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
                let mut fields = self.0.lock().expect("field mutex must not be poisoned");
                event.record(&mut FieldVisitor(&mut *fields));
            }
        }

        let recorder = FieldRecorder::default();
        let subscriber = tracing_subscriber::registry().with(recorder.clone());
        tracing::subscriber::with_default(subscriber, || {
            policy(3).should_retry(2, &connect_failure(), TARGET);
        });

        let fields = recorder.0.lock().expect("field mutex must not be poisoned");
        let field = |name: &str, value: &str| (name.to_owned(), value.to_owned());
        assert!(fields.contains(&field("event", "retry_attempt")), "{fields:?}");
        assert!(fields.contains(&field("attempt", "2")), "{fields:?}");
        assert!(fields.contains(&field("target", TARGET)), "{fields:?}");
    }

    #[test]
    fn classify_splits_responses_at_500() {
        let ok = AttemptOutcome::classify(
            TransportResult::Response(HttpResponse::new(404, None, "missing")),
            false,
        );
        assert!(matches!(ok, Ok(AttemptOutcome::Success(_))));

        let failed = AttemptOutcome::classify(
            TransportResult::Response(HttpResponse::new(502, None, "bad gateway")),
            false,
        );
        assert!(matches!(failed, Ok(AttemptOutcome::HttpFailure(_))));
    }

    #[test]
    fn classify_with_http_errors_flags_client_errors() {
        let outcome = AttemptOutcome::classify(
            TransportResult::Response(HttpResponse::new(404, None, "missing")),
            true,
        );
        assert!(matches!(outcome, Ok(AttemptOutcome::HttpFailure(_))));
    }

    #[test]
    fn classify_maps_transport_variants() {
        assert!(matches!(
            AttemptOutcome::classify(TransportResult::ConnectError("dns".to_owned()), false),
            Ok(AttemptOutcome::TransportFailure {
                kind: TransportFailureKind::Connect,
                ..
            })
        ));
        assert!(matches!(
            AttemptOutcome::classify(TransportResult::Failed("reset".to_owned()), false),
            Ok(AttemptOutcome::TransportFailure {
                kind: TransportFailureKind::Other,
                ..
            })
        ));
        assert!(matches!(
            AttemptOutcome::classify(
                TransportResult::ResponseError(HttpResponse::new(418, None, "")),
                false
            ),
            Ok(AttemptOutcome::HttpFailure(_))
        ));
        assert_eq!(
            AttemptOutcome::classify(TransportResult::Invalid("bad url".to_owned()), false),
            Err("bad url".to_owned())
        );
    }
}
