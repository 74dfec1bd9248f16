//! `caseflux run` - load new daily reports into InfluxDB

use anyhow::Result;
use clap::Args;

use caseflux_core::{IngestError, SharedProgress, fmt_num};
use caseflux_ingest::{DryRunSink, GoogleGeocoder, InfluxSink, MetricSink, RunOutcome, RunSummary};

use super::{InputArgs, print_summary};
use crate::config::Config;

/// Measurement shown by `--dry-run` when none is configured
const DRY_RUN_MEASUREMENT: &str = "cases";

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// InfluxDB base URL
    #[arg(short, long, env = "INFLUX_URL")]
    pub url: Option<String>,

    /// InfluxDB API token
    #[arg(short, long, env = "INFLUX_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// InfluxDB organization
    #[arg(short, long, env = "INFLUX_ORG")]
    pub organization: Option<String>,

    /// InfluxDB bucket
    #[arg(short, long, env = "INFLUX_BUCKET")]
    pub bucket: Option<String>,

    /// Measurement name for every point
    #[arg(short, long, env = "INFLUX_MEASURE")]
    pub measurement: Option<String>,

    /// Google Maps geocoding key; rows without coordinates stay unresolved when unset
    #[arg(short, long, env = "MAPS_TOKEN", hide_env_values = true)]
    pub gtoken: Option<String>,

    /// Normalize everything but write neither points nor the checkpoint
    #[arg(long)]
    pub dry_run: bool,
}

/// Required sink settings after merging flags, env and config file
struct InfluxSettings {
    url: String,
    token: String,
    org: String,
    bucket: String,
    measurement: String,
}

impl RunArgs {
    fn influx_settings(&self, config: &Config) -> Result<InfluxSettings, IngestError> {
        fn pick(
            flag: &Option<String>,
            file: &Option<String>,
            what: &str,
        ) -> Result<String, IngestError> {
            flag.clone()
                .or_else(|| file.clone())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| IngestError::config(format!("{what} not set")))
        }

        let influx = &config.influx;
        Ok(InfluxSettings {
            url: pick(&self.url, &influx.url, "InfluxDB URL (--url, INFLUX_URL)")?,
            token: pick(&self.token, &influx.token, "InfluxDB token (--token, INFLUX_TOKEN)")?,
            org: pick(&self.organization, &influx.org, "InfluxDB organization (--organization, INFLUX_ORG)")?,
            bucket: pick(&self.bucket, &influx.bucket, "InfluxDB bucket (--bucket, INFLUX_BUCKET)")?,
            measurement: pick(
                &self.measurement,
                &influx.measurement,
                "measurement (--measurement, INFLUX_MEASURE)",
            )?,
        })
    }

    /// Measurement for dry-run previews when the sink is not fully configured
    fn measurement_or_default(&self, config: &Config) -> String {
        self.measurement
            .clone()
            .or_else(|| config.influx.measurement.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DRY_RUN_MEASUREMENT.to_string())
    }

    fn geocoder(&self, config: &Config) -> Option<GoogleGeocoder> {
        let key = self
            .gtoken
            .clone()
            .or_else(|| config.geocode.token.clone())
            .filter(|k| !k.is_empty())?;
        let http = caseflux_core::http_config();
        Some(
            GoogleGeocoder::new(key)
                .with_base_url(config.geocode.base_url.clone())
                .with_retries(
                    config.geocode.max_retries.unwrap_or(http.max_retries),
                    http.initial_backoff,
                ),
        )
    }
}

pub fn run(args: RunArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let mut pipeline = args.input.pipeline_config(config)?;
    pipeline.dry_run = args.dry_run;

    // A dry run tolerates missing sink settings
    let sink: Box<dyn MetricSink> = match args.influx_settings(config) {
        Ok(s) if args.dry_run => Box::new(DryRunSink::new(s.measurement)),
        Ok(s) => Box::new(InfluxSink::new(s.url, s.token, s.org, s.bucket, s.measurement)),
        Err(e) if args.dry_run => {
            log::debug!("dry run without sink settings: {e}");
            Box::new(DryRunSink::new(args.measurement_or_default(config)))
        }
        Err(e) => return Err(e.into()),
    };

    let geocoder = args.geocoder(config);
    match &geocoder {
        Some(_) => log::info!("Geocoding enabled for rows without coordinates"),
        None => log::info!("No geocoding key; rows without coordinates stay unresolved"),
    }

    caseflux_core::install_signal_handlers()?;

    let outcome = caseflux_ingest::run(
        &pipeline,
        sink,
        geocoder.as_ref().map(|g| g as &dyn caseflux_ingest::Geocoder),
        progress,
    )?;

    match outcome {
        RunOutcome::NothingToDo(plan) => {
            eprintln!("Nothing to do: no files newer than {}", plan.watermark);
        }
        RunOutcome::Completed {
            summary,
            checkpoint,
        } => {
            if progress.is_tty() {
                print_run_summary(&summary, checkpoint.as_ref(), args.dry_run);
            }
        }
    }
    Ok(())
}

fn print_run_summary(
    summary: &RunSummary,
    checkpoint: Option<&caseflux_ingest::Watermark>,
    dry_run: bool,
) {
    let s = &summary.stats;
    let mut rows = vec![
        ("Files", s.files.to_string()),
        (
            "Rows",
            format!(
                "{} ({} legacy, {} coded)",
                fmt_num(s.rows),
                fmt_num(s.legacy_rows),
                fmt_num(s.coded_rows)
            ),
        ),
        ("Batches", s.batches.to_string()),
        (
            "Coordinates",
            format!(
                "{} explicit, {} geocoded, {} unresolved",
                fmt_num(s.explicit_coordinates),
                fmt_num(s.geocoded_coordinates),
                fmt_num(s.unresolved_coordinates)
            ),
        ),
    ];
    if s.geocode_requests > 0 {
        rows.push((
            "Geocoding",
            format!(
                "{} requests, {} cache hits, {} failures",
                s.geocode_requests, s.geocode_cache_hits, s.geocode_failures
            ),
        ));
    }
    rows.push((
        "Checkpoint",
        match (checkpoint, dry_run) {
            (_, true) => "unchanged (dry run)".to_string(),
            (Some(w), false) => w.to_string(),
            (None, false) => "unchanged".to_string(),
        },
    ));
    rows.push(("Time", format!("{:.1}s", summary.elapsed.as_secs_f64())));

    print_summary("Load", &rows);
}
