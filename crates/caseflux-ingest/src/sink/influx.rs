//! InfluxDB v2 writer (line protocol over `/api/v2/write`)

use std::fmt::Write as _;

use caseflux_core::{HttpError, SHARED_RUNTIME, http_client};

use super::{FieldValue, MetricSink, Point, SinkError};

/// Connection settings for one bucket
#[derive(Debug, Clone)]
pub struct InfluxSink {
    url: String,
    token: String,
    org: String,
    bucket: String,
    measurement: String,
}

impl InfluxSink {
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        org: impl Into<String>,
        bucket: impl Into<String>,
        measurement: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            org: org.into(),
            bucket: bucket.into(),
            measurement: measurement.into(),
        }
    }

    fn post(&self, body: String) -> Result<(), HttpError> {
        let url = format!("{}/api/v2/write", self.url);
        SHARED_RUNTIME.handle().block_on(async {
            let resp = http_client()
                .post(&url)
                .query(&[
                    ("org", self.org.as_str()),
                    ("bucket", self.bucket.as_str()),
                    ("precision", "s"),
                ])
                .header("Authorization", format!("Token {}", self.token))
                .header("Content-Type", "text/plain; charset=utf-8")
                .body(body)
                .send()
                .await
                .map_err(HttpError::from_reqwest)?;
            let status = resp.status();
            if status.is_success() {
                return Ok(());
            }
            let body = resp.text().await.unwrap_or_default();
            Err(HttpError::Status {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            })
        })
    }
}

impl MetricSink for InfluxSink {
    fn write_points(&mut self, points: &[Point]) -> Result<(), SinkError> {
        if points.is_empty() {
            return Ok(());
        }
        let body = encode_batch(&self.measurement, points);
        self.post(body).map_err(|e| SinkError::new(e.to_string()))
    }

    fn describe(&self) -> String {
        format!("influx {}/{} ({})", self.org, self.bucket, self.measurement)
    }
}

/// Line-protocol body, one line per point
pub fn encode_batch(measurement: &str, points: &[Point]) -> String {
    let mut body = String::with_capacity(points.len() * 200);
    for (i, point) in points.iter().enumerate() {
        if i > 0 {
            body.push('\n');
        }
        write_line(&mut body, measurement, point);
    }
    body
}

/// One line-protocol line
pub fn encode_line(measurement: &str, point: &Point) -> String {
    let mut line = String::new();
    write_line(&mut line, measurement, point);
    line
}

fn write_line(out: &mut String, measurement: &str, point: &Point) {
    escape_into(out, measurement, &[',', ' ']);
    // Line protocol has no empty tag values; such tags are left out.
    for (key, value) in point.tags.iter().filter(|(_, v)| !v.is_empty()) {
        out.push(',');
        escape_into(out, key, &[',', '=', ' ']);
        out.push('=');
        escape_into(out, value, &[',', '=', ' ']);
    }
    for (i, (key, value)) in point.fields.iter().enumerate() {
        out.push(if i == 0 { ' ' } else { ',' });
        escape_into(out, key, &[',', '=', ' ']);
        out.push('=');
        let _ = match value {
            FieldValue::Integer(n) => write!(out, "{n}i"),
            FieldValue::Float(x) => write!(out, "{x}"),
        };
    }
    let _ = write!(out, " {}", point.timestamp);
}

fn escape_into(out: &mut String, s: &str, special: &[char]) {
    for c in s.chars() {
        match c {
            '\n' | '\r' => out.push(' '),
            c if special.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
}
