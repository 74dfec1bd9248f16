//! Retry with exponential backoff for outbound HTTP calls

use std::time::Duration;

use crate::http::HttpError;
use crate::shutdown::is_shutdown_requested;

/// Exponential backoff: `initial * 2^(attempt-1)` (2s, 4s, 8s, ... with the default)
pub fn backoff_duration(initial: Duration, attempt: u32) -> Duration {
    initial.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

/// Retry a fallible HTTP exchange with exponential backoff.
///
/// Retryable errors (see [`HttpError::is_retryable`]) are retried up to
/// `max_retries` times. A pending shutdown stops retrying early.
///
/// Returns `Ok(T)` on first success, or the last `Err` on exhaustion or a
/// non-retryable error.
pub fn retry_with_backoff<T>(
    label: &str,
    max_retries: u32,
    initial_backoff: Duration,
    mut attempt_fn: impl FnMut() -> Result<T, HttpError>,
) -> Result<T, HttpError> {
    let mut attempt = 0u32;
    loop {
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_retries && e.is_retryable() && !is_shutdown_requested() => {
                attempt += 1;
                log::debug!("{label}: attempt {attempt}/{max_retries} failed: {e}, retrying...");
                std::thread::sleep(backoff_duration(initial_backoff, attempt));
            }
            Err(e) => {
                log::debug!("{label}: giving up after {} attempt(s): {e}", attempt + 1);
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_exponential() {
        let base = Duration::from_secs(2);
        assert_eq!(backoff_duration(base, 1), Duration::from_secs(2));
        assert_eq!(backoff_duration(base, 2), Duration::from_secs(4));
        assert_eq!(backoff_duration(base, 3), Duration::from_secs(8));
    }

    #[test]
    fn backoff_zero_base() {
        assert_eq!(backoff_duration(Duration::ZERO, 5), Duration::ZERO);
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let mut calls = 0;
        let result = retry_with_backoff("test", 3, Duration::ZERO, || {
            calls += 1;
            if calls < 3 {
                Err(HttpError::Status {
                    status: 503,
                    body: String::new(),
                })
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn stops_on_non_retryable() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with_backoff("test", 3, Duration::ZERO, || {
            calls += 1;
            Err(HttpError::Status {
                status: 401,
                body: String::new(),
            })
        });
        assert_eq!(result.unwrap_err().status(), Some(401));
        assert_eq!(calls, 1);
    }

    #[test]
    fn gives_up_after_max_retries() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with_backoff("test", 2, Duration::ZERO, || {
            calls += 1;
            Err(HttpError::Timeout)
        });
        assert!(matches!(result, Err(HttpError::Timeout)));
        assert_eq!(calls, 3);
    }
}
