//! Loader pipeline configuration

use std::path::PathBuf;

use crate::select::ResumeStrategy;

/// Rows per sink write
pub const BATCH_SIZE: usize = 500;

/// Leaf level of the S2 hierarchy
pub const DEFAULT_S2_LEVEL: u8 = 30;

/// Runtime configuration for one loader run
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the daily snapshot files
    pub data_dir: PathBuf,
    /// Required filename suffix of input files
    pub suffix: String,
    /// How resumption is tracked between runs
    pub strategy: ResumeStrategy,
    /// Checkpoint file (`KEY=VALUE`)
    pub checkpoint_path: PathBuf,
    pub batch_size: usize,
    pub s2_level: u8,
    /// Skip the real sink and the checkpoint
    pub dry_run: bool,
    /// Timestamp watermark override; ignores the checkpoint when set
    pub since: Option<i64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            suffix: ".csv".to_string(),
            strategy: ResumeStrategy::Timestamp,
            checkpoint_path: PathBuf::from(".last"),
            batch_size: BATCH_SIZE,
            s2_level: DEFAULT_S2_LEVEL,
            dry_run: false,
            since: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.suffix, ".csv");
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.s2_level, 30);
        assert_eq!(config.strategy, ResumeStrategy::Timestamp);
        assert!(!config.dry_run);
        assert!(config.since.is_none());
    }
}
