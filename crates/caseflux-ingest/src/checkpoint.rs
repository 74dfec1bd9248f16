//! Resumption checkpoint (`KEY=VALUE` file)
//!
//! The file holds a single line, `LAST_RUN=<unix seconds>` or
//! `LAST_FILE=<path>`, in dotenv syntax so it can also be sourced by a
//! shell or loaded with `dotenvy`.

use std::io::Write;
use std::path::{Path, PathBuf};

use caseflux_core::IngestError;

use crate::select::Watermark;

pub const LAST_RUN_KEY: &str = "LAST_RUN";
pub const LAST_FILE_KEY: &str = "LAST_FILE";

#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored watermark. `None` when the file does not exist.
    pub fn load(&self) -> Result<Option<Watermark>, IngestError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let entries = dotenvy::from_path_iter(&self.path)
            .map_err(|e| IngestError::filesystem(&self.path, e))?;

        let mut last_run = None;
        let mut last_file = None;
        for entry in entries {
            let (key, value) = entry.map_err(|e| {
                IngestError::config(format!("checkpoint {}: {e}", self.path.display()))
            })?;
            match key.as_str() {
                LAST_RUN_KEY => last_run = Some(value),
                LAST_FILE_KEY => last_file = Some(value),
                other => log::debug!("checkpoint: ignoring key {other}"),
            }
        }

        match (last_run, last_file) {
            (Some(_), Some(_)) => Err(IngestError::config(format!(
                "checkpoint {} holds both {LAST_RUN_KEY} and {LAST_FILE_KEY}",
                self.path.display()
            ))),
            (Some(ts), None) => match ts.trim().parse::<i64>() {
                Ok(secs) => Ok(Some(Watermark::Timestamp(secs))),
                Err(_) => Err(IngestError::config(format!(
                    "checkpoint {}: {LAST_RUN_KEY}={ts:?} is not a unix timestamp",
                    self.path.display()
                ))),
            },
            (None, Some(file)) if file.is_empty() => Ok(None),
            (None, Some(file)) => Ok(Some(Watermark::File(PathBuf::from(file)))),
            (None, None) => Ok(None),
        }
    }

    /// Replace the checkpoint with `watermark` (temp file + rename).
    pub fn store(&self, watermark: &Watermark) -> Result<(), IngestError> {
        let line = match watermark {
            Watermark::Timestamp(ts) => format!("{LAST_RUN_KEY}={ts}\n"),
            Watermark::File(path) => {
                format!("{LAST_FILE_KEY}={}\n", quote(&path.to_string_lossy()))
            }
            Watermark::Start => return Ok(()),
        };

        let tmp = self.tmp_path();
        let write = || -> std::io::Result<()> {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(line.as_bytes())?;
            file.sync_all()?;
            std::fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            IngestError::filesystem(&self.path, e)
        })?;
        log::debug!("checkpoint: {} <- {}", self.path.display(), line.trim_end());
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| ".last".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Double-quote a dotenv value when it needs it
fn quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:+@%,".contains(c));
    if plain {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path().join(".last"));
        assert_eq!(checkpoint.load().unwrap(), None);
    }

    #[test]
    fn timestamp_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path().join(".last"));
        checkpoint.store(&Watermark::Timestamp(1_585_778_329)).unwrap();
        let text = std::fs::read_to_string(checkpoint.path()).unwrap();
        assert_eq!(text, "LAST_RUN=1585778329\n");
        assert_eq!(
            checkpoint.load().unwrap(),
            Some(Watermark::Timestamp(1_585_778_329))
        );
    }

    #[test]
    fn file_with_spaces_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path().join(".last"));
        let last = PathBuf::from("/data/daily reports/03-01-2020.csv");
        checkpoint.store(&Watermark::File(last.clone())).unwrap();
        assert_eq!(checkpoint.load().unwrap(), Some(Watermark::File(last)));
    }

    #[test]
    fn overwrite_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path().join(".last"));
        checkpoint.store(&Watermark::Timestamp(1)).unwrap();
        checkpoint.store(&Watermark::Timestamp(2)).unwrap();
        assert_eq!(checkpoint.load().unwrap(), Some(Watermark::Timestamp(2)));
        assert!(!dir.path().join(".last.tmp").exists());
    }

    #[test]
    fn both_keys_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".last");
        std::fs::write(&path, "LAST_RUN=1\nLAST_FILE=a.csv\n").unwrap();
        let err = Checkpoint::new(path).load().unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn garbage_timestamp_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".last");
        std::fs::write(&path, "LAST_RUN=yesterday\n").unwrap();
        let err = Checkpoint::new(path).load().unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn missing_parent_is_filesystem_error() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path().join("nope").join(".last"));
        let err = checkpoint.store(&Watermark::Timestamp(1)).unwrap_err();
        assert_eq!(err.kind(), "filesystem");
    }

    #[test]
    fn quoting() {
        assert_eq!(quote("data/03-01-2020.csv"), "data/03-01-2020.csv");
        assert_eq!(quote("a b"), "\"a b\"");
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
    }
}
