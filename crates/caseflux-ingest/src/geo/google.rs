//! Google Maps Geocoding API adapter

use std::time::Duration;

use caseflux_core::{HttpError, SHARED_RUNTIME, http_client, retry_with_backoff};
use serde::Deserialize;

use super::{Coordinate, GeocodeError, GeocodeQuery, Geocoder};

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com";
const GEOCODE_PATH: &str = "/maps/api/geocode/json";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

/// Structured-component geocoder backed by the Google HTTP API.
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    api_key: String,
    base_url: String,
    language: String,
    max_retries: u32,
    initial_backoff: Duration,
}

impl GoogleGeocoder {
    pub fn new(api_key: impl Into<String>) -> Self {
        let http = caseflux_core::http_config();
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            language: "en".to_string(),
            max_retries: http.max_retries,
            initial_backoff: http.initial_backoff,
        }
    }

    /// Point at another host (mock servers, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retries(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }

    fn request_params(&self, query: &GeocodeQuery) -> Option<Vec<(&'static str, String)>> {
        let code = query.country_code_override();
        let admin_area = query.admin_area.as_deref().unwrap_or_default();
        let components = [
            ("country", code.unwrap_or(query.country.as_str())),
            ("administrative_area", query.province.as_str()),
            ("locality", admin_area),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{k}:{v}"))
        .collect::<Vec<_>>();
        if components.is_empty() {
            return None;
        }

        let mut params = vec![
            ("components", components.join("|")),
            ("language", self.language.clone()),
            ("key", self.api_key.clone()),
        ];
        if let Some(code) = code {
            params.push(("address", code.to_string()));
        }
        Some(params)
    }

    fn fetch(&self, params: &[(&'static str, String)]) -> Result<String, HttpError> {
        let url = format!("{}{GEOCODE_PATH}", self.base_url);
        SHARED_RUNTIME.handle().block_on(async {
            let resp = http_client()
                .get(&url)
                .query(params)
                .send()
                .await
                .map_err(HttpError::from_reqwest)?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(HttpError::Status {
                    status: status.as_u16(),
                    body: body.chars().take(200).collect(),
                });
            }
            resp.text().await.map_err(HttpError::from_reqwest)
        })
    }
}

impl Geocoder for GoogleGeocoder {
    fn geocode(&self, query: &GeocodeQuery) -> Result<Option<Coordinate>, GeocodeError> {
        let Some(params) = self.request_params(query) else {
            log::debug!("geocode: nothing to look up for empty place");
            return Ok(None);
        };
        let label = format!("geocode {query}");
        let body = retry_with_backoff(&label, self.max_retries, self.initial_backoff, || {
            self.fetch(&params)
        })
        .map_err(|e| GeocodeError::new(e.to_string()))?;
        let response: GeocodeResponse = serde_json::from_str(&body)
            .map_err(|e| GeocodeError::new(format!("invalid response: {e}")))?;
        interpret(response)
    }
}

fn interpret(response: GeocodeResponse) -> Result<Option<Coordinate>, GeocodeError> {
    match response.status.as_str() {
        "OK" => Ok(response
            .results
            .first()
            .map(|r| Coordinate::new(r.geometry.location.lat, r.geometry.location.lng))),
        "ZERO_RESULTS" => Ok(None),
        other => Err(GeocodeError::new(match response.error_message {
            Some(msg) => format!("{other}: {msg}"),
            None => other.to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::Place;

    fn query(country: &str, province: &str, admin: Option<&str>) -> GeocodeQuery {
        GeocodeQuery::new(
            &Place {
                country: country.to_string(),
                province: province.to_string(),
            },
            admin,
        )
    }

    fn param<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn components_country_and_province() {
        let geocoder = GoogleGeocoder::new("k");
        let params = geocoder.request_params(&query("China", "Hubei", None)).unwrap();
        assert_eq!(
            param(&params, "components"),
            Some("country:China|administrative_area:Hubei")
        );
        assert_eq!(param(&params, "language"), Some("en"));
        assert_eq!(param(&params, "key"), Some("k"));
        assert_eq!(param(&params, "address"), None);
    }

    #[test]
    fn georgia_sends_iso_code() {
        let geocoder = GoogleGeocoder::new("k");
        let params = geocoder.request_params(&query("Georgia", "", None)).unwrap();
        assert_eq!(param(&params, "components"), Some("country:GE"));
        assert_eq!(param(&params, "address"), Some("GE"));
    }

    #[test]
    fn admin_area_is_a_locality_component() {
        let geocoder = GoogleGeocoder::new("k");
        let params = geocoder
            .request_params(&query("US", "Florida", Some("Miami-Dade")))
            .unwrap();
        assert_eq!(
            param(&params, "components"),
            Some("country:US|administrative_area:Florida|locality:Miami-Dade")
        );
        assert_eq!(param(&params, "address"), None);
    }

    #[test]
    fn empty_place_sends_nothing() {
        let geocoder = GoogleGeocoder::new("k");
        assert!(geocoder.request_params(&query("", "", None)).is_none());
        assert_eq!(geocoder.geocode(&query("", "", None)), Ok(None));
    }

    #[test]
    fn interpret_statuses() {
        let ok: GeocodeResponse = serde_json::from_str(
            r#"{"status":"OK","results":[{"geometry":{"location":{"lat":30.97,"lng":112.27}}},
                {"geometry":{"location":{"lat":1.0,"lng":1.0}}}]}"#,
        )
        .unwrap();
        assert_eq!(interpret(ok), Ok(Some(Coordinate::new(30.97, 112.27))));

        let zero: GeocodeResponse =
            serde_json::from_str(r#"{"status":"ZERO_RESULTS","results":[]}"#).unwrap();
        assert_eq!(interpret(zero), Ok(None));

        let denied: GeocodeResponse = serde_json::from_str(
            r#"{"status":"REQUEST_DENIED","error_message":"The provided API key is invalid."}"#,
        )
        .unwrap();
        let err = interpret(denied).unwrap_err();
        assert_eq!(err.message, "REQUEST_DENIED: The provided API key is invalid.");
    }

    #[test]
    fn base_url_trailing_slash() {
        let geocoder = GoogleGeocoder::new("k").with_base_url("http://127.0.0.1:9/");
        assert_eq!(geocoder.base_url, "http://127.0.0.1:9");
    }
}
