//! Sink rows and the sink abstraction

pub mod influx;

use crate::normalize::NormalizedObservation;

pub use influx::InfluxSink;

/// Field value of a sink row
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
}

/// One sink row: tags sorted by key, fields in fixed order, unix-seconds timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub tags: Vec<(&'static str, String)>,
    pub fields: Vec<(&'static str, FieldValue)>,
    pub timestamp: i64,
}

fn count(n: u64) -> FieldValue {
    FieldValue::Integer(i64::try_from(n).unwrap_or(i64::MAX))
}

impl From<&NormalizedObservation> for Point {
    fn from(obs: &NormalizedObservation) -> Self {
        let mut tags = vec![
            ("country_region", obs.country.clone()),
            ("last_update", obs.last_update.rendered.clone()),
            ("s2_cell_id", obs.cell.clone()),
            ("state_province", obs.province.clone()),
        ];
        if let Some(fips) = &obs.fips {
            tags.push(("fips", fips.clone()));
        }
        if let Some(combined) = &obs.combined_key {
            tags.push(("combined_tag", combined.clone()));
        }
        tags.sort_by_key(|(k, _)| *k);

        Self {
            tags,
            fields: vec![
                ("confirmed", count(obs.confirmed)),
                ("deaths", count(obs.deaths)),
                ("recovered", count(obs.recovered)),
                ("lat", FieldValue::Float(obs.location.lat)),
                ("lon", FieldValue::Float(obs.location.lon)),
            ],
            timestamp: obs.last_update.instant.timestamp(),
        }
    }
}

impl Point {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn field(&self, key: &str) -> Option<FieldValue> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}

/// A rejected or undeliverable write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkError {
    pub message: String,
}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SinkError {}

/// Destination for batches of rows. One call is one write request.
pub trait MetricSink {
    fn write_points(&mut self, points: &[Point]) -> Result<(), SinkError>;

    /// Label for logs
    fn describe(&self) -> String;
}

impl<S: MetricSink + ?Sized> MetricSink for &mut S {
    fn write_points(&mut self, points: &[Point]) -> Result<(), SinkError> {
        (**self).write_points(points)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<S: MetricSink + ?Sized> MetricSink for Box<S> {
    fn write_points(&mut self, points: &[Point]) -> Result<(), SinkError> {
        (**self).write_points(points)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Accepts everything and only logs; used by `--dry-run`.
#[derive(Debug)]
pub struct DryRunSink {
    measurement: String,
    pub batches: usize,
    pub points: usize,
    /// Line protocol of the first row of the latest batch
    pub last_preview: Option<String>,
}

impl DryRunSink {
    /// `measurement` is the one the real sink would write to
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            batches: 0,
            points: 0,
            last_preview: None,
        }
    }
}

impl MetricSink for DryRunSink {
    fn write_points(&mut self, points: &[Point]) -> Result<(), SinkError> {
        self.batches += 1;
        self.points += points.len();
        log::debug!("dry run: would write batch {} ({} rows)", self.batches, points.len());
        if let Some(first) = points.first() {
            let line = influx::encode_line(&self.measurement, first);
            log::trace!("dry run: first row {line}");
            self.last_preview = Some(line);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("dry run ({})", self.measurement)
    }
}
