//! Fatal error taxonomy for a loader run

use std::path::{Path, PathBuf};

/// Error that aborts a run.
///
/// Every variant is fatal: it unwinds to the top-level handler, suppresses
/// the checkpoint write, and terminates the process with [`exit_code`].
/// Geocoding failures are deliberately absent; they degrade to the
/// unresolved coordinate where they happen.
///
/// [`exit_code`]: IngestError::exit_code
#[derive(Debug)]
pub enum IngestError {
    /// Missing or contradictory setting, detected before any processing.
    Configuration(String),
    /// Directory or file unreadable, or a data file whose name carries no date.
    Filesystem { path: PathBuf, message: String },
    /// Malformed row content. `row` is `None` for header-level problems.
    Parse {
        file: PathBuf,
        row: Option<usize>,
        message: String,
    },
    /// The sink was unreachable or rejected a batch.
    Write {
        batch: usize,
        rows: usize,
        message: String,
    },
    /// Shutdown requested before the run finished.
    Interrupted,
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "configuration: {msg}"),
            Self::Filesystem { path, message } => {
                write!(f, "filesystem: {}: {message}", path.display())
            }
            Self::Parse {
                file,
                row: Some(row),
                message,
            } => write!(f, "parse: {} row {row}: {message}", file.display()),
            Self::Parse {
                file,
                row: None,
                message,
            } => write!(f, "parse: {}: {message}", file.display()),
            Self::Write {
                batch,
                rows,
                message,
            } => write!(f, "write: batch {batch} ({rows} rows): {message}"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

impl std::error::Error for IngestError {}

impl IngestError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn filesystem(path: &Path, message: impl std::fmt::Display) -> Self {
        Self::Filesystem {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn parse(file: &Path, row: Option<usize>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            file: file.to_path_buf(),
            row,
            message: message.to_string(),
        }
    }

    /// Short label used in log lines and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Filesystem { .. } => "filesystem",
            Self::Parse { .. } => "parse",
            Self::Write { .. } => "write",
            Self::Interrupted => "interrupted",
        }
    }

    /// Process exit code: 2 for configuration (usage) errors, 130 for
    /// interrupts, 1 for everything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) => 2,
            Self::Interrupted => 130,
            _ => 1,
        }
    }

    /// Whether the sink may already hold rows from this run.
    pub fn may_have_partial_writes(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }
}
