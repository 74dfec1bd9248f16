//! Input file discovery and watermark filtering

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use caseflux_core::IngestError;
use chrono::NaiveDate;

/// Watermark used when no checkpoint exists: 2020-01-01T00:00:00Z,
/// before the oldest daily report.
pub const DEFAULT_SINCE: i64 = 1_577_836_800;

/// Date layout of data file names (`03-01-2020.csv`)
const FILENAME_DATE_FORMAT: &str = "%m-%d-%Y";

/// How the next run decides which files are new
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumeStrategy {
    /// Files modified and dated after the last run's start time
    #[default]
    Timestamp,
    /// Files after the last processed file, in modification order
    Filename,
}

impl ResumeStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::Filename => "filename",
        }
    }
}

impl std::fmt::Display for ResumeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResumeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "timestamp" | "time" => Ok(Self::Timestamp),
            "filename" | "file" => Ok(Self::Filename),
            other => Err(format!(
                "unknown resume strategy '{other}' (expected 'timestamp' or 'filename')"
            )),
        }
    }
}

/// Resumption marker of the previous successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Watermark {
    /// Unix seconds
    Timestamp(i64),
    /// Last file processed
    File(PathBuf),
    /// Filename strategy before the first run: every file qualifies
    Start,
}

impl Watermark {
    pub fn strategy(&self) -> ResumeStrategy {
        match self {
            Self::Timestamp(_) => ResumeStrategy::Timestamp,
            Self::File(_) | Self::Start => ResumeStrategy::Filename,
        }
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timestamp(ts) => match chrono::DateTime::from_timestamp(*ts, 0) {
                Some(dt) => write!(f, "{ts} ({})", dt.format("%Y-%m-%d %H:%M:%S UTC")),
                None => write!(f, "{ts}"),
            },
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Start => write!(f, "(no file processed yet)"),
        }
    }
}

/// A data file with the metadata selection needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl Candidate {
    fn file_name(&self) -> &std::ffi::OsStr {
        self.path.file_name().unwrap_or_default()
    }

    /// Modification time in unix seconds (pre-epoch clamps to 0)
    pub fn modified_unix(&self) -> i64 {
        self.modified
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }
}

/// List regular files in `dir` ending with `suffix`, oldest first
/// (ties broken by file name).
pub fn list_candidates(dir: &Path, suffix: &str) -> Result<Vec<Candidate>, IngestError> {
    let meta = std::fs::metadata(dir).map_err(|e| IngestError::filesystem(dir, e))?;
    if !meta.is_dir() {
        return Err(IngestError::filesystem(dir, "not a directory"));
    }

    let pattern = format!(
        "{}/*{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        glob::Pattern::escape(suffix)
    );
    let paths = glob::glob(&pattern).map_err(|e| IngestError::filesystem(dir, e))?;

    let mut candidates = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| IngestError::filesystem(dir, e))?;
        let meta = std::fs::metadata(&path).map_err(|e| IngestError::filesystem(&path, e))?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta
            .modified()
            .map_err(|e| IngestError::filesystem(&path, e))?;
        candidates.push(Candidate { path, modified });
    }
    candidates.sort_by(|a, b| {
        a.modified
            .cmp(&b.modified)
            .then_with(|| a.file_name().cmp(b.file_name()))
    });
    Ok(candidates)
}

/// Midnight UTC of the `MM-DD-YYYY` date in a data file name, in unix seconds
pub fn filename_date(path: &Path, suffix: &str) -> Option<i64> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(suffix)?;
    if stem.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(stem, FILENAME_DATE_FORMAT)
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
}

/// Files to process for `watermark`, in processing order.
///
/// Timestamp watermark: both the modification time and the file name date
/// must be strictly newer; a file name without a date is fatal.
/// File watermark: everything after the named file; the named file must
/// still be present. Start: every candidate.
pub fn select_files(
    dir: &Path,
    suffix: &str,
    watermark: &Watermark,
) -> Result<Vec<PathBuf>, IngestError> {
    let candidates = list_candidates(dir, suffix)?;
    log::debug!("{} candidate file(s) in {}", candidates.len(), dir.display());

    match watermark {
        Watermark::Timestamp(since) => {
            let mut selected = Vec::new();
            for candidate in candidates {
                let dated = filename_date(&candidate.path, suffix).ok_or_else(|| {
                    IngestError::filesystem(&candidate.path, "file name carries no MM-DD-YYYY date")
                })?;
                if candidate.modified_unix() > *since && dated > *since {
                    selected.push(candidate.path);
                }
            }
            Ok(selected)
        }
        Watermark::File(last) => {
            let last_name = last.file_name().unwrap_or(last.as_os_str());
            let position = candidates
                .iter()
                .position(|c| c.file_name() == last_name)
                .ok_or_else(|| {
                    IngestError::filesystem(last, "last processed file not found in data directory")
                })?;
            Ok(candidates
                .into_iter()
                .skip(position + 1)
                .map(|c| c.path)
                .collect())
        }
        Watermark::Start => Ok(candidates.into_iter().map(|c| c.path).collect()),
    }
}
