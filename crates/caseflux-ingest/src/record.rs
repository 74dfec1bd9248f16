//! Raw CSV records and shape detection
//!
//! Daily snapshots come in two column layouts. The legacy layout names its
//! columns `Province/State`, `Country/Region`, `Last Update`, `Latitude`,
//! `Longitude`; the coded layout adds `FIPS`, `Admin2`, `Combined_Key` and
//! renames the rest (`Province_State`, `Lat`, `Long_`, ...). Both header
//! spellings are accepted for every column; the shape of a row is decided
//! by whether its `FIPS` value is non-empty.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use caseflux_core::IngestError;
use serde::Deserialize;

/// Header spellings accepted for the country column
const COUNTRY_HEADERS: &[&str] = &["Country/Region", "Country_Region"];
/// Header spellings accepted for the last-update column
const LAST_UPDATE_HEADERS: &[&str] = &["Last Update", "Last_Update"];

/// One CSV row as it appears on disk, either layout.
#[derive(Debug, Default, Deserialize)]
struct CsvRow {
    #[serde(rename = "FIPS", default)]
    fips: Option<String>,
    #[serde(rename = "Admin2", default)]
    admin2: Option<String>,
    #[serde(rename = "Province/State", alias = "Province_State", default)]
    province: Option<String>,
    #[serde(rename = "Country/Region", alias = "Country_Region", default)]
    country: Option<String>,
    #[serde(rename = "Last Update", alias = "Last_Update", default)]
    last_update: Option<String>,
    #[serde(rename = "Confirmed", default)]
    confirmed: Option<String>,
    #[serde(rename = "Deaths", default)]
    deaths: Option<String>,
    #[serde(rename = "Recovered", default)]
    recovered: Option<String>,
    #[serde(rename = "Latitude", alias = "Lat", default)]
    latitude: Option<String>,
    #[serde(rename = "Longitude", alias = "Long_", default)]
    longitude: Option<String>,
    #[serde(rename = "Combined_Key", default)]
    combined_key: Option<String>,
}

/// Fields shared by both layouts, still uncoerced.
///
/// Blank text fields are empty strings. Coordinates stay `None` when the
/// column is missing or the cell is blank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCase {
    pub province: String,
    pub country: String,
    pub last_update: String,
    pub confirmed: String,
    pub deaths: String,
    pub recovered: String,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    Legacy,
    Coded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    Legacy(RawCase),
    Coded {
        fips: String,
        admin2: String,
        combined_key: String,
        case: RawCase,
    },
}

impl RawRecord {
    pub fn shape(&self) -> RecordShape {
        match self {
            Self::Legacy(_) => RecordShape::Legacy,
            Self::Coded { .. } => RecordShape::Coded,
        }
    }

    pub fn case(&self) -> &RawCase {
        match self {
            Self::Legacy(case) | Self::Coded { case, .. } => case,
        }
    }

    /// Admin-area name, coded rows only
    pub fn admin_area(&self) -> Option<&str> {
        match self {
            Self::Legacy(_) => None,
            Self::Coded { admin2, .. } if admin2.is_empty() => None,
            Self::Coded { admin2, .. } => Some(admin2),
        }
    }
}

impl From<CsvRow> for RawRecord {
    fn from(row: CsvRow) -> Self {
        let case = RawCase {
            province: row.province.unwrap_or_default(),
            country: row.country.unwrap_or_default(),
            last_update: row.last_update.unwrap_or_default(),
            confirmed: row.confirmed.unwrap_or_default(),
            deaths: row.deaths.unwrap_or_default(),
            recovered: row.recovered.unwrap_or_default(),
            latitude: row.latitude.filter(|s| !s.is_empty()),
            longitude: row.longitude.filter(|s| !s.is_empty()),
        };
        match row.fips.filter(|s| !s.is_empty()) {
            Some(fips) => Self::Coded {
                fips,
                admin2: row.admin2.unwrap_or_default(),
                combined_key: row.combined_key.unwrap_or_default(),
                case,
            },
            None => Self::Legacy(case),
        }
    }
}

/// Where a record came from (diagnostics only)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    pub file: Arc<Path>,
    /// 1-based data row, header excluded
    pub row: usize,
}

impl std::fmt::Display for SourceRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.row)
    }
}

#[derive(Debug, Clone)]
pub struct SourcedRecord {
    pub source: SourceRow,
    pub record: RawRecord,
}

/// Streaming reader yielding one [`SourcedRecord`] per CSV row, in file order.
pub struct RecordReader<R: Read> {
    file: Arc<Path>,
    rows: csv::DeserializeRecordsIntoIter<R, CsvRow>,
    next_row: usize,
}

impl RecordReader<File> {
    pub fn open(path: &Path) -> Result<Self, IngestError> {
        let file = File::open(path).map_err(|e| IngestError::filesystem(path, e))?;
        Self::from_reader(path, file)
    }
}

impl<R: Read> RecordReader<R> {
    /// Wrap any reader; `path` is only used to label errors and rows.
    pub fn from_reader(path: &Path, reader: R) -> Result<Self, IngestError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| csv_error(path, None, e))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim())
            .collect::<csv::StringRecord>();
        validate_headers(path, &headers)?;
        csv_reader.set_headers(headers);

        Ok(Self {
            file: Arc::from(path),
            rows: csv_reader.into_deserialize(),
            next_row: 1,
        })
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<SourcedRecord, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.next_row;
        let result = self.rows.next()?;
        self.next_row += 1;
        Some(
            result
                .map(|csv_row| SourcedRecord {
                    source: SourceRow {
                        file: Arc::clone(&self.file),
                        row,
                    },
                    record: RawRecord::from(csv_row),
                })
                .map_err(|e| csv_error(&self.file, Some(row), e)),
        )
    }
}

fn validate_headers(path: &Path, headers: &csv::StringRecord) -> Result<(), IngestError> {
    let has_any = |names: &[&str]| headers.iter().any(|h| names.contains(&h));
    if !has_any(COUNTRY_HEADERS) || !has_any(LAST_UPDATE_HEADERS) {
        return Err(IngestError::parse(
            path,
            None,
            format!(
                "unrecognized record shape: header lacks a country or last-update column ({})",
                headers.iter().collect::<Vec<_>>().join(",")
            ),
        ));
    }
    Ok(())
}

fn csv_error(path: &Path, row: Option<usize>, e: csv::Error) -> IngestError {
    if e.is_io_error() {
        IngestError::filesystem(path, e)
    } else {
        IngestError::parse(path, row, e)
    }
}
