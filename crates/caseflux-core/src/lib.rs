//! Caseflux Core - Common infrastructure for the case-count loader
//!
//! This crate provides the error taxonomy, the shared HTTP client and
//! runtime, retry, logging, progress, and shutdown plumbing used by the
//! ingest pipeline and the CLI.

pub mod error;
pub mod http;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod shutdown;

// Re-exports for convenience
pub use error::IngestError;
pub use http::{HttpConfig, HttpError, SHARED_RUNTIME, http_client, http_config, set_http_config};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use retry::retry_with_backoff;
pub use shutdown::{install_signal_handlers, is_shutdown_requested, request_shutdown};
