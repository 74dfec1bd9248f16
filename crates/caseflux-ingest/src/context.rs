//! Per-run state threaded through the pipeline

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Counters collected while a run progresses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub files: usize,
    pub rows: u64,
    pub batches: usize,
    pub legacy_rows: u64,
    pub coded_rows: u64,
    pub explicit_coordinates: u64,
    pub geocoded_coordinates: u64,
    pub unresolved_coordinates: u64,
    pub geocode_requests: u64,
    pub geocode_cache_hits: u64,
    pub geocode_failures: u64,
    /// Rows whose coordinates produced no spatial cell
    pub empty_cells: u64,
}

/// Start time plus counters for one invocation
#[derive(Debug)]
pub struct RunContext {
    /// Wall-clock start, the value persisted as the next timestamp watermark
    pub started_at: DateTime<Utc>,
    started: Instant,
    pub stats: RunStats,
}

impl RunContext {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            started: Instant::now(),
            stats: RunStats::default(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            stats: self.stats.clone(),
            elapsed: self.elapsed(),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Pipeline execution summary
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub stats: RunStats,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Log the summary the way every run ends
    pub fn log(&self) {
        let s = &self.stats;
        log::info!("=== Load Summary ===");
        log::info!("Files: {}, rows: {}, batches: {}", s.files, s.rows, s.batches);
        log::info!(
            "Coordinates: {} explicit, {} geocoded, {} unresolved",
            s.explicit_coordinates,
            s.geocoded_coordinates,
            s.unresolved_coordinates
        );
        if s.geocode_requests > 0 || s.geocode_failures > 0 {
            log::info!(
                "Geocoding: {} requests, {} cache hits, {} failures",
                s.geocode_requests,
                s.geocode_cache_hits,
                s.geocode_failures
            );
        }
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
        if s.rows > 0 && self.elapsed.as_secs_f64() > 0.0 {
            log::info!(
                "Throughput: {:.0} rows/sec",
                s.rows as f64 / self.elapsed.as_secs_f64()
            );
        }
    }
}
