//! Numeric field coercion

/// A field value that could not be coerced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub value: String,
    pub reason: &'static str,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}: {}", self.field, self.value, self.reason)
    }
}

impl std::error::Error for FieldError {}

fn field_error(field: &'static str, value: &str, reason: &'static str) -> FieldError {
    FieldError {
        field,
        value: value.to_string(),
        reason,
    }
}

/// Parse a count column: blank is 0, otherwise a base-10 non-negative integer.
pub fn parse_count(field: &'static str, raw: &str) -> Result<u64, FieldError> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(0);
    }
    if s.starts_with('-') {
        return Err(field_error(field, raw, "negative count"));
    }
    s.parse::<u64>()
        .map_err(|_| field_error(field, raw, "not a non-negative integer"))
}

/// Parse an explicit coordinate pair.
///
/// `None` when both are absent. One side without the other, a malformed
/// number, or a non-finite value is an error.
pub fn parse_coordinates(
    latitude: Option<&str>,
    longitude: Option<&str>,
) -> Result<Option<(f64, f64)>, FieldError> {
    match (latitude, longitude) {
        (None, None) => Ok(None),
        (Some(lat), None) => Err(field_error("Latitude", lat, "longitude missing")),
        (None, Some(lon)) => Err(field_error("Longitude", lon, "latitude missing")),
        (Some(lat), Some(lon)) => Ok(Some((
            parse_degrees("Latitude", lat)?,
            parse_degrees("Longitude", lon)?,
        ))),
    }
}

fn parse_degrees(field: &'static str, raw: &str) -> Result<f64, FieldError> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(field_error(field, raw, "not a finite number")),
        Err(_) => Err(field_error(field, raw, "not a decimal number")),
    }
}
