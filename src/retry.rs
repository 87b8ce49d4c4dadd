//! Bounded retry of transient transport failures.
//!
//! Network errors that look transient and 5xx responses are retried with a
//! linearly increasing delay (`base_delay * attempt`). 4xx responses are
//! returned to the caller untouched. Cancellation is observed before every
//! attempt, during the attempt itself, and while backing off.

use std::time::Duration;

use tracing::warn;

use crate::cancel::{CancelSignal, sleep_or_cancel};
use crate::error::LifecycleError;
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay between attempts.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

const RETRYABLE_MARKERS: [&str; 6] = [
    "handshake timeout",
    "connection refused",
    "connection reset",
    "timed out",
    "timeout",
    "eof",
];

/// Retry budget for one logical request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay multiplied by the attempt number before each retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Reports whether a network error message describes a transient failure.
#[must_use]
pub fn is_retryable_network_error(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    RETRYABLE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Sends `request`, retrying transient failures according to `policy`.
///
/// Returns the first response with a status below 500. Server errors and
/// transient network errors that persist past the retry budget become
/// [`LifecycleError::Transport`].
///
/// # Errors
///
/// Returns [`LifecycleError::Transport`] when every attempt fails and
/// [`LifecycleError::Cancelled`] when `cancel` fires.
pub async fn send_with_retry<T: Transport + ?Sized>(
    transport: &T,
    policy: &RetryPolicy,
    request: &ApiRequest,
    cancel: &CancelSignal,
) -> Result<ApiResponse, LifecycleError> {
    let context = || format!("{} {}", request.method.as_str(), request.path);
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(LifecycleError::cancelled(context()));
        }

        let outcome = tokio::select! {
            result = transport.send(request) => result,
            () = cancel.cancelled() => return Err(LifecycleError::cancelled(context())),
        };

        let (status, message) = match outcome {
            Ok(response) if !response.is_server_error() => return Ok(response),
            Ok(response) => (
                Some(response.status),
                format!(
                    "{}: server error {}: {}",
                    context(),
                    response.status,
                    response.body
                ),
            ),
            Err(err) if is_retryable_network_error(&err.message) => {
                (None, format!("{}: {}", context(), err.message))
            }
            Err(err) => {
                return Err(LifecycleError::Transport {
                    status: None,
                    message: format!("{}: {}", context(), err.message),
                });
            }
        };

        if attempt >= policy.max_retries {
            return Err(LifecycleError::Transport { status, message });
        }
        attempt += 1;
        let delay = policy.delay_for(attempt);
        warn!(
            attempt,
            max_attempts = policy.max_retries + 1,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %message,
            "transient failure, retrying"
        );
        sleep_or_cancel(delay, cancel)
            .await
            .map_err(|_| LifecycleError::cancelled(context()))?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedTransport;
    use rstest::rstest;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[rstest]
    #[case("net/http: TLS handshake timeout", true)]
    #[case("dial tcp: connection refused", true)]
    #[case("read: Connection reset by peer", true)]
    #[case("operation timed out", true)]
    #[case("unexpected EOF", true)]
    #[case("invalid certificate", false)]
    #[case("builder error: relative URL without a base", false)]
    fn classifies_network_errors(#[case] message: &str, #[case] expected: bool) {
        assert_eq!(is_retryable_network_error(message), expected);
    }

    #[test]
    fn delay_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(6));
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let transport = ScriptedTransport::new();
        transport.push_status(502, "bad gateway");
        transport.push_status(503, "unavailable");
        transport.push_json(200, &serde_json::json!({}));

        let request = ApiRequest::get("/instances/abc");
        let response = send_with_retry(&transport, &fast_policy(), &request, &CancelSignal::never())
            .await
            .expect("third attempt succeeds");
        assert_eq!(response.status, 200);
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let transport = ScriptedTransport::new();
        transport.push_status(404, "missing");

        let request = ApiRequest::get("/instances/abc");
        let response = send_with_retry(&transport, &fast_policy(), &request, &CancelSignal::never())
            .await
            .expect("4xx is returned, not raised");
        assert_eq!(response.status, 404);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn non_transient_network_error_fails_immediately() {
        let transport = ScriptedTransport::new();
        transport.push_network_error("invalid certificate");
        transport.push_json(200, &serde_json::json!({}));

        let request = ApiRequest::get("/instances/abc");
        let err = send_with_retry(&transport, &fast_policy(), &request, &CancelSignal::never())
            .await
            .expect_err("should not retry");
        assert!(matches!(err, LifecycleError::Transport { status: None, .. }));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn replays_identical_body_on_retry() {
        let transport = ScriptedTransport::new();
        transport.push_network_error("connection reset by peer");
        transport.push_json(201, &serde_json::json!({}));

        let request = ApiRequest::post_json(
            "/instanceOperationCfsParams",
            &serde_json::json!({"paramValue": "x"}),
        )
        .expect("serialise");
        send_with_retry(&transport, &fast_policy(), &request, &CancelSignal::never())
            .await
            .expect("second attempt succeeds");

        let sent = transport.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent.first().map(|r| &r.body), sent.get(1).map(|r| &r.body));
    }

    #[tokio::test]
    async fn cancellation_stops_retrying() {
        let transport = ScriptedTransport::new();
        transport.push_status(503, "unavailable");
        transport.push_status(503, "unavailable");

        let (handle, signal) = crate::cancel::cancel_pair();
        handle.cancel();
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(60),
        };
        let request = ApiRequest::get("/instances/abc");
        let err = send_with_retry(&transport, &policy, &request, &signal)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, LifecycleError::Cancelled { .. }));
        assert!(transport.requests().is_empty());
    }
}
