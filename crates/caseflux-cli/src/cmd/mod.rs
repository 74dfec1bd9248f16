pub mod run;
pub mod status;

use std::path::PathBuf;

use anyhow::Result;
use caseflux_core::IngestError;
use caseflux_ingest::ResumeStrategy;
use chrono::{NaiveDate, NaiveDateTime};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::config::Config;

/// Input selection flags shared by `run` and `status`
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Directory holding the daily report files
    #[arg(short, long, env = "DATA_DIR")]
    pub dir: Option<PathBuf>,

    /// How progress is remembered between runs (timestamp or filename)
    #[arg(short, long, env = "RESUME_STRATEGY")]
    pub strategy: Option<ResumeStrategy>,

    /// Checkpoint file (default: .last)
    #[arg(long, env = "CHECKPOINT_FILE")]
    pub checkpoint: Option<PathBuf>,

    /// Ignore the checkpoint and take files newer than this instant
    /// (unix seconds, YYYY-MM-DD, or YYYY-MM-DDTHH:MM:SS, UTC)
    #[arg(long, env = "LAST_RUN", value_parser = parse_since)]
    pub since: Option<i64>,
}

impl InputArgs {
    /// Merge flags over the config file into a pipeline configuration
    pub fn pipeline_config(&self, config: &Config) -> Result<caseflux_ingest::Config> {
        let defaults = caseflux_ingest::Config::default();

        let data_dir = self.dir.clone().or_else(|| config.input.dir.clone()).ok_or_else(|| {
            IngestError::config("data directory not set (use --dir, DATA_DIR, or [input] dir)")
        })?;

        let strategy = match (self.strategy, config.input.strategy.as_deref()) {
            (Some(s), _) => s,
            (None, Some(s)) => s.parse().map_err(IngestError::config)?,
            (None, None) => defaults.strategy,
        };

        Ok(caseflux_ingest::Config {
            data_dir,
            suffix: config.input.suffix.clone().unwrap_or(defaults.suffix),
            strategy,
            checkpoint_path: self
                .checkpoint
                .clone()
                .or_else(|| config.input.checkpoint.clone())
                .unwrap_or(defaults.checkpoint_path),
            batch_size: config.pipeline.batch_size.max(1),
            s2_level: config.pipeline.s2_level,
            dry_run: false,
            since: self.since,
        })
    }
}

fn parse_since(s: &str) -> Result<i64, String> {
    if let Ok(secs) = s.parse::<i64>() {
        return Ok(secs);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.and_utc().timestamp());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| format!("invalid instant '{s}': expected unix seconds or YYYY-MM-DD"))
}

/// Print a key-value summary table on stderr
pub fn print_summary(title: &str, rows: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new(title).fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}

/// `configured` / `not set` for secrets
pub fn mask(secret: Option<&str>) -> String {
    match secret {
        Some(s) if !s.is_empty() => "configured".to_string(),
        _ => "not set".to_string(),
    }
}
