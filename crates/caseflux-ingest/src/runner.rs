//! Main runner for the loader pipeline

use std::path::PathBuf;

use caseflux_core::{IngestError, ProgressContext, fmt_num, is_shutdown_requested};

use crate::batch::BatchWriter;
use crate::checkpoint::Checkpoint;
use crate::config::Config;
use crate::context::{RunContext, RunSummary};
use crate::geo::Geocoder;
use crate::normalize::Normalizer;
use crate::record::RecordReader;
use crate::select::{DEFAULT_SINCE, ResumeStrategy, Watermark, select_files};
use crate::sink::MetricSink;
use crate::spatial::SpatialIndexer;

/// What a run would do, computed without touching the sink
#[derive(Debug, Clone)]
pub struct Plan {
    /// Watermark the selection was made against
    pub watermark: Watermark,
    /// Files to process, in order
    pub files: Vec<PathBuf>,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// No qualifying files; checkpoint untouched
    NothingToDo(Plan),
    Completed {
        summary: RunSummary,
        /// Watermark persisted for the next run (`None` on dry runs)
        checkpoint: Option<Watermark>,
    },
}

/// Pick the effective watermark from the configuration and the stored
/// checkpoint. A checkpoint written under the other strategy is a
/// configuration error.
pub fn resolve_watermark(
    config: &Config,
    stored: Option<Watermark>,
) -> Result<Watermark, IngestError> {
    if let Some(since) = config.since {
        if config.strategy != ResumeStrategy::Timestamp {
            return Err(IngestError::config(
                "an explicit --since watermark requires the timestamp strategy",
            ));
        }
        return Ok(Watermark::Timestamp(since));
    }
    match stored {
        None => Ok(match config.strategy {
            ResumeStrategy::Timestamp => Watermark::Timestamp(DEFAULT_SINCE),
            ResumeStrategy::Filename => Watermark::Start,
        }),
        Some(w) if w.strategy() == config.strategy => Ok(w),
        Some(w) => Err(IngestError::config(format!(
            "checkpoint {} holds a {} watermark ({w}) but the configured strategy is {}",
            config.checkpoint_path.display(),
            w.strategy(),
            config.strategy
        ))),
    }
}

/// Load the checkpoint and select the files the next run would process.
pub fn plan(config: &Config) -> Result<Plan, IngestError> {
    let stored = Checkpoint::new(&config.checkpoint_path).load()?;
    let watermark = resolve_watermark(config, stored)?;
    let files = select_files(&config.data_dir, &config.suffix, &watermark)?;
    Ok(Plan { watermark, files })
}

/// Run the loader pipeline.
///
/// Files are processed oldest first, rows in file order. Any fatal error
/// aborts the run before the checkpoint is written, so the next run
/// reprocesses the same files.
pub fn run<S: MetricSink>(
    config: &Config,
    sink: S,
    geocoder: Option<&dyn Geocoder>,
    progress: &ProgressContext,
) -> Result<RunOutcome, IngestError> {
    let mut ctx = RunContext::new();
    let checkpoint = Checkpoint::new(&config.checkpoint_path);

    let plan = plan(config)?;
    log::info!("Resuming after {}", plan.watermark);
    if plan.files.is_empty() {
        log::info!("No new data files to process");
        return Ok(RunOutcome::NothingToDo(plan));
    }
    log::info!(
        "Processing {} data file(s) from {} into {}",
        plan.files.len(),
        config.data_dir.display(),
        sink.describe()
    );

    let mut normalizer = Normalizer::new(geocoder, SpatialIndexer::new(config.s2_level));
    let mut writer = BatchWriter::new(sink, config.batch_size);
    let files_bar = progress.files_bar(plan.files.len());

    for path in &plan.files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let line = progress.file_line(&name);
        let rows_before = ctx.stats.rows;

        for record in RecordReader::open(path)? {
            if is_shutdown_requested() {
                line.abandon_with_message("interrupted");
                return Err(IngestError::Interrupted);
            }
            let observation = normalizer.normalize(&mut ctx, record?)?;
            writer.push(&observation)?;
            line.inc(1);
        }

        ctx.stats.files += 1;
        line.finish_and_clear();
        files_bar.inc(1);
        log::info!(
            "{name}: {} rows",
            fmt_num(ctx.stats.rows - rows_before)
        );
    }

    writer.finish(&mut ctx.stats)?;
    files_bar.finish_and_clear();

    let next = match config.strategy {
        ResumeStrategy::Timestamp => Watermark::Timestamp(ctx.started_at.timestamp()),
        // plan.files is non-empty here
        ResumeStrategy::Filename => plan
            .files
            .last()
            .map(|p| Watermark::File(p.clone()))
            .unwrap_or(Watermark::Start),
    };

    let persisted = if config.dry_run {
        log::info!("Dry run: checkpoint not written (would be {next})");
        None
    } else {
        checkpoint.store(&next)?;
        log::info!("Checkpoint {} updated", checkpoint.path().display());
        Some(next)
    };

    let summary = ctx.summary();
    summary.log();
    Ok(RunOutcome::Completed {
        summary,
        checkpoint: persisted,
    })
}
