//! Shared HTTP client and runtime.
//!
//! Uses async reqwest internally but presents a blocking interface: the
//! pipeline is strictly sequential, so every request is driven to
//! completion with `SHARED_RUNTIME.handle().block_on(..)`.

use std::sync::{LazyLock, OnceLock};
use std::time::Duration;

/// Timeouts and retry budget for outbound requests
#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    /// Sleep before the first retry; doubles on every further attempt
    pub initial_backoff: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            max_retries: 3,
            initial_backoff: Duration::from_secs(2),
        }
    }
}

static HTTP_CONFIG: OnceLock<HttpConfig> = OnceLock::new();

/// Install the process-wide HTTP settings.
///
/// Must run before the first request; later calls are ignored because the
/// shared client has already been built from the first value.
pub fn set_http_config(config: HttpConfig) {
    if HTTP_CONFIG.set(config).is_err() {
        log::debug!("HTTP config already set, ignoring override");
    }
}

/// Current HTTP settings (defaults if never set)
pub fn http_config() -> &'static HttpConfig {
    HTTP_CONFIG.get_or_init(HttpConfig::default)
}

/// Error from a single HTTP exchange
#[derive(Debug)]
pub enum HttpError {
    /// Server answered with a non-success status
    Status { status: u16, body: String },
    /// Connection, TLS, or body transfer failure
    Transport(String),
    /// Request exceeded the configured timeout
    Timeout,
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status { status, body } if body.is_empty() => write!(f, "HTTP {status}"),
            Self::Status { status, body } => write!(f, "HTTP {status}: {body}"),
            Self::Transport(msg) => write!(f, "HTTP error: {msg}"),
            Self::Timeout => write!(f, "HTTP request timed out"),
        }
    }
}

impl std::error::Error for HttpError {}

impl HttpError {
    /// Create from a reqwest error, dropping the URL so query-string
    /// credentials never reach the logs.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        let e = e.without_url();
        match e.status() {
            Some(status) => Self::Status {
                status: status.as_u16(),
                body: String::new(),
            },
            None => Self::Transport(e.to_string()),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Rate limits, server errors, and transport failures are worth
    /// another attempt; other 4xx answers are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            Self::Transport(_) | Self::Timeout => true,
        }
    }
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    let config = http_config();
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> HttpError {
        HttpError::Status {
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn http_429_retryable() {
        assert!(status(429).is_retryable());
    }

    #[test]
    fn http_5xx_retryable() {
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
    }

    #[test]
    fn http_4xx_not_retryable() {
        assert!(!status(400).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!status(404).is_retryable());
    }

    #[test]
    fn transport_and_timeout_retryable() {
        assert!(HttpError::Transport("connection refused".to_string()).is_retryable());
        assert!(HttpError::Timeout.is_retryable());
    }

    #[test]
    fn display_status_with_body() {
        let err = HttpError::Status {
            status: 400,
            body: "unable to parse points".to_string(),
        };
        assert_eq!(format!("{err}"), "HTTP 400: unable to parse points");
    }

    #[test]
    fn display_status_without_body() {
        assert_eq!(format!("{}", status(503)), "HTTP 503");
    }

    #[test]
    fn status_accessor() {
        assert_eq!(status(401).status(), Some(401));
        assert_eq!(HttpError::Timeout.status(), None);
    }

    #[test]
    fn default_config() {
        let config = HttpConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff, Duration::from_secs(2));
    }
}
