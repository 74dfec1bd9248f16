//! caseflux - incremental loader for daily case-count reports
//!
//! Picks up the CSV snapshots that arrived since the last run, normalizes
//! them, and writes them to InfluxDB.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use caseflux_core::IngestError;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use cmd::{mask, print_summary};
use config::Config;

#[derive(Parser)]
#[command(name = "caseflux")]
#[command(about = "Incremental CSV to InfluxDB loader for daily case counts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "debug")]
    quiet: bool,

    /// Config file path (default: ./caseflux.toml or ~/.config/caseflux/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Load new daily reports into InfluxDB
    Run(cmd::run::RunArgs),
    /// Show the checkpoint and the files the next run would load
    Status(cmd::status::StatusArgs),
    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    // Existing environment variables win over .env
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(caseflux_core::ProgressContext::new());

    // Logging:
    //   TTY:     warn unless --debug, progress bars show activity
    //   non-TTY: info unless --quiet, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = cli.quiet || (is_tty && !cli.debug);
    caseflux_core::init_logging(quiet, cli.debug, multi);

    match dotenv {
        Ok(path) => log::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => log::warn!("Ignoring .env: {e}"),
    }

    let writes_sink = matches!(&cli.command, Command::Run(args) if !args.dry_run);
    match execute(cli, &progress) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            if let Some(IngestError::Configuration(_)) = e.downcast_ref::<IngestError>() {
                eprintln!("See `caseflux run --help` for the required settings.");
            }
            if writes_sink && may_have_partial_writes(&e) {
                log::warn!(
                    "Batches flushed before the failure stay in InfluxDB; \
                     the checkpoint was not updated, so the next run loads them again"
                );
            }
            ExitCode::from(exit_code(&e))
        }
    }
}

fn execute(cli: Cli, progress: &caseflux_core::SharedProgress) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    caseflux_core::set_http_config(config.http.to_http_config());

    match cli.command {
        Command::Run(args) => cmd::run::run(args, &config, progress),
        Command::Status(args) => cmd::status::run(args, &config),
        Command::Config => {
            show_config(&config);
            Ok(())
        }
    }
}

/// Process exit status for a failed command
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<IngestError>()
        .map(IngestError::exit_code)
        .unwrap_or(1)
}

/// Whether a failed run may have left rows in the sink.
/// Errors raised outside the pipeline (config file, signal setup) happen
/// before any write.
fn may_have_partial_writes(err: &anyhow::Error) -> bool {
    err.downcast_ref::<IngestError>()
        .is_some_and(IngestError::may_have_partial_writes)
}

fn show_config(config: &Config) {
    let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
    let or_env = |file: &Option<String>, name: &str| {
        env(name).or_else(|| file.clone()).unwrap_or_else(|| "not set".to_string())
    };

    let dir = env("DATA_DIR")
        .or_else(|| config.input.dir.as_ref().map(|d| d.display().to_string()))
        .unwrap_or_else(|| "not set".to_string());
    let influx = &config.influx;

    print_summary(
        "Setting",
        &[
            ("Data directory", dir),
            (
                "File suffix",
                config.input.suffix.clone().unwrap_or_else(|| ".csv".to_string()),
            ),
            (
                "Strategy",
                env("RESUME_STRATEGY")
                    .or_else(|| config.input.strategy.clone())
                    .unwrap_or_else(|| "timestamp".to_string()),
            ),
            (
                "Checkpoint",
                env("CHECKPOINT_FILE")
                    .or_else(|| {
                        config
                            .input
                            .checkpoint
                            .as_ref()
                            .map(|p| p.display().to_string())
                    })
                    .unwrap_or_else(|| ".last".to_string()),
            ),
            ("InfluxDB URL", or_env(&influx.url, "INFLUX_URL")),
            (
                "InfluxDB token",
                mask(env("INFLUX_TOKEN").or_else(|| influx.token.clone()).as_deref()),
            ),
            ("Organization", or_env(&influx.org, "INFLUX_ORG")),
            ("Bucket", or_env(&influx.bucket, "INFLUX_BUCKET")),
            ("Measurement", or_env(&influx.measurement, "INFLUX_MEASURE")),
            (
                "Maps key",
                mask(env("MAPS_TOKEN").or_else(|| config.geocode.token.clone()).as_deref()),
            ),
            ("Geocode URL", config.geocode.base_url.clone()),
            ("Batch size", config.pipeline.batch_size.to_string()),
            ("S2 level", config.pipeline.s2_level.to_string()),
            (
                "HTTP timeouts",
                format!(
                    "{}s connect, {}s request",
                    config.http.connect_timeout, config.http.request_timeout
                ),
            ),
            (
                "Retries",
                format!(
                    "{} (backoff from {}s)",
                    config.http.max_retries, config.http.initial_backoff
                ),
            ),
        ],
    );
}
