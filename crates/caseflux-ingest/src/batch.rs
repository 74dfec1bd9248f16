//! Fixed-size batching in front of a [`MetricSink`]

use caseflux_core::IngestError;

use crate::context::RunStats;
use crate::normalize::NormalizedObservation;
use crate::sink::{MetricSink, Point};

/// Buffers rows and writes them in batches of at most `threshold`.
///
/// A batch is flushed as soon as the buffer reaches the threshold, and
/// [`finish`](BatchWriter::finish) flushes the remainder. An empty buffer is
/// never written. A failed write is fatal: it is not retried and the rows stay
/// in the buffer, while earlier batches remain committed.
pub struct BatchWriter<S: MetricSink> {
    sink: S,
    threshold: usize,
    buffer: Vec<Point>,
    batches_written: usize,
    rows_written: u64,
}

impl<S: MetricSink> BatchWriter<S> {
    pub fn new(sink: S, threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            sink,
            threshold,
            buffer: Vec::with_capacity(threshold),
            batches_written: 0,
            rows_written: 0,
        }
    }

    pub fn push(&mut self, observation: &NormalizedObservation) -> Result<(), IngestError> {
        self.buffer.push(Point::from(observation));
        if self.buffer.len() >= self.threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Write the buffered rows, if any.
    pub fn flush(&mut self) -> Result<(), IngestError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = self.batches_written + 1;
        let rows = self.buffer.len();
        self.sink
            .write_points(&self.buffer)
            .map_err(|e| IngestError::Write {
                batch,
                rows,
                message: e.to_string(),
            })?;
        log::debug!("{}: wrote batch {batch} ({rows} rows)", self.sink.describe());
        self.buffer.clear();
        self.batches_written = batch;
        self.rows_written += rows as u64;
        Ok(())
    }

    /// Flush the remainder and report totals into `stats`.
    pub fn finish(mut self, stats: &mut RunStats) -> Result<S, IngestError> {
        self.flush()?;
        stats.batches = self.batches_written;
        Ok(self.sink)
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn batches_written(&self) -> usize {
        self.batches_written
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    use crate::geo::{Coordinate, Resolution, UnresolvedReason};
    use crate::record::{RecordShape, SourceRow};
    use crate::sink::SinkError;
    use crate::timestamp::parse_last_update;

    /// Records batch sizes; fails the write numbered `fail_at` (1-based)
    #[derive(Default)]
    struct RecordingSink {
        sizes: Vec<usize>,
        fail_at: Option<usize>,
    }

    impl MetricSink for RecordingSink {
        fn write_points(&mut self, points: &[Point]) -> Result<(), SinkError> {
            if self.fail_at == Some(self.sizes.len() + 1) {
                return Err(SinkError::new("HTTP 503"));
            }
            self.sizes.push(points.len());
            Ok(())
        }

        fn describe(&self) -> String {
            "recording".to_string()
        }
    }

    fn observation() -> NormalizedObservation {
        NormalizedObservation {
            country: "Italy".to_string(),
            province: String::new(),
            fips: None,
            combined_key: None,
            shape: RecordShape::Legacy,
            confirmed: 1,
            deaths: 0,
            recovered: 0,
            location: Coordinate::UNRESOLVED,
            resolution: Resolution::Unresolved(UnresolvedReason::NoProvider),
            cell: String::new(),
            last_update: parse_last_update("2020-03-01T10:00:00").unwrap(),
            source: SourceRow {
                file: Arc::from(Path::new("03-01-2020.csv")),
                row: 1,
            },
        }
    }

    fn run(n: usize, threshold: usize) -> Vec<usize> {
        let obs = observation();
        let mut writer = BatchWriter::new(RecordingSink::default(), threshold);
        for _ in 0..n {
            writer.push(&obs).unwrap();
        }
        let mut stats = RunStats::default();
        let sink = writer.finish(&mut stats).unwrap();
        assert_eq!(stats.batches, sink.sizes.len());
        sink.sizes
    }

    #[test]
    fn one_flush_per_threshold_plus_remainder() {
        assert_eq!(run(1_234, 500), vec![500, 500, 234]);
    }

    #[test]
    fn exact_multiple_has_no_empty_flush() {
        assert_eq!(run(1_000, 500), vec![500, 500]);
    }

    #[test]
    fn no_input_no_flush() {
        assert!(run(0, 500).is_empty());
    }

    #[test]
    fn under_threshold_single_final_flush() {
        assert_eq!(run(1, 500), vec![1]);
    }

    #[test]
    fn failure_keeps_earlier_batches_and_reports_batch_number() {
        let obs = observation();
        let sink = RecordingSink {
            fail_at: Some(2),
            ..Default::default()
        };
        let mut writer = BatchWriter::new(sink, 3);
        for _ in 0..3 {
            writer.push(&obs).unwrap();
        }
        writer.push(&obs).unwrap();
        writer.push(&obs).unwrap();
        let err = writer.push(&obs).unwrap_err();
        match err {
            IngestError::Write { batch, rows, .. } => {
                assert_eq!(batch, 2);
                assert_eq!(rows, 3);
            }
            other => panic!("expected write error, got {other}"),
        }
        assert_eq!(writer.batches_written(), 1);
        assert_eq!(writer.rows_written(), 3);
        assert_eq!(writer.pending(), 3);
    }
}
