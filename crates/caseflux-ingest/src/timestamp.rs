//! Multi-format `Last Update` parsing

use chrono::{DateTime, NaiveDateTime, Utc};

/// Canonical rendering of a parsed instant
const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S +0000 UTC";

/// Accepted timestamp layouts. All are read as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// `2020-03-01 10:00:00`
    IsoSpace,
    /// `2020-03-01T10:00:00`
    IsoT,
    /// `3/1/2020 10:00`
    SlashFullYear,
    /// `3/1/20 10:00`
    SlashShortYear,
}

impl TimestampFormat {
    /// Try order; the first layout that parses wins.
    pub const PRIORITY: [TimestampFormat; 4] = [
        Self::IsoSpace,
        Self::IsoT,
        Self::SlashFullYear,
        Self::SlashShortYear,
    ];

    fn pattern(self) -> &'static str {
        match self {
            Self::IsoSpace => "%Y-%m-%d %H:%M:%S",
            Self::IsoT => "%Y-%m-%dT%H:%M:%S",
            Self::SlashFullYear => "%m/%d/%Y %H:%M",
            Self::SlashShortYear => "%m/%d/%y %H:%M",
        }
    }

    /// chrono's `%Y` accepts any width, so `3/1/20` would otherwise match
    /// the four-digit layout as year 20.
    fn year_width_ok(self, s: &str) -> bool {
        let year = match self {
            Self::IsoSpace | Self::IsoT => s.split('-').next(),
            Self::SlashFullYear | Self::SlashShortYear => s
                .split_whitespace()
                .next()
                .and_then(|date| date.split('/').nth(2)),
        };
        let width = match self {
            Self::SlashShortYear => 2,
            _ => 4,
        };
        year.is_some_and(|y| y.len() == width && y.bytes().all(|b| b.is_ascii_digit()))
    }

    fn parse(self, s: &str) -> Option<DateTime<Utc>> {
        if !self.year_width_ok(s) {
            return None;
        }
        NaiveDateTime::parse_from_str(s, self.pattern())
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// A parsed `Last Update` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastUpdate {
    pub instant: DateTime<Utc>,
    /// `YYYY-MM-DD HH:MM:SS +0000 UTC`
    pub rendered: String,
    pub format: TimestampFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampError {
    pub value: String,
}

impl std::fmt::Display for TimestampError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unrecognized Last Update timestamp {:?}", self.value)
    }
}

impl std::error::Error for TimestampError {}

/// Parse with the layouts of [`TimestampFormat::PRIORITY`], first match wins.
pub fn parse_last_update(raw: &str) -> Result<LastUpdate, TimestampError> {
    let s = raw.trim();
    TimestampFormat::PRIORITY
        .iter()
        .find_map(|&format| {
            format.parse(s).map(|instant| LastUpdate {
                instant,
                rendered: instant.format(CANONICAL_FORMAT).to_string(),
                format,
            })
        })
        .ok_or_else(|| TimestampError {
            value: raw.to_string(),
        })
}
