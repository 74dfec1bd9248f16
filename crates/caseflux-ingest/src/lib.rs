//! Caseflux Ingest - incremental case-count loader
//!
//! Reads daily CSV snapshots of case counts, reconciles the two column
//! layouts, canonicalizes place names and timestamps, resolves coordinates
//! (explicit, geocoded, or unresolved), tags rows with an S2 cell, and writes
//! them to a time-series sink in batches of 500.
//!
//! # Example
//!
//! ```ignore
//! use caseflux_ingest::{Config, DryRunSink, RunOutcome, run};
//!
//! let config = Config {
//!     data_dir: "csse_covid_19_daily_reports".into(),
//!     dry_run: true,
//!     ..Default::default()
//! };
//!
//! let progress = caseflux_core::ProgressContext::new();
//! match run(&config, DryRunSink::new("cases"), None, &progress)? {
//!     RunOutcome::NothingToDo(_) => println!("up to date"),
//!     RunOutcome::Completed { summary, .. } => println!("{} rows", summary.stats.rows),
//! }
//! ```

pub mod batch;
pub mod canon;
pub mod checkpoint;
pub mod coerce;
pub mod config;
pub mod context;
pub mod geo;
pub mod normalize;
pub mod record;
pub mod runner;
pub mod select;
pub mod sink;
pub mod spatial;
pub mod timestamp;

// Re-exports
pub use checkpoint::Checkpoint;
pub use config::{BATCH_SIZE, Config};
pub use context::{RunContext, RunStats, RunSummary};
pub use geo::{Coordinate, GeocodeQuery, Geocoder, GoogleGeocoder};
pub use normalize::{NormalizedObservation, Normalizer};
pub use runner::{Plan, RunOutcome, plan, run};
pub use select::{ResumeStrategy, Watermark};
pub use sink::{DryRunSink, InfluxSink, MetricSink, Point};
