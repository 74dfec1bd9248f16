//! Coordinate resolution
//!
//! Explicit coordinates win. Otherwise an optional [`Geocoder`] is asked,
//! unless the place is excluded. Anything else degrades to
//! [`Coordinate::UNRESOLVED`]. Geocoding failures are logged and never abort
//! the run.

pub mod google;

use rustc_hash::FxHashMap;

use crate::canon::Place;
use crate::context::RunStats;

pub use google::GoogleGeocoder;

/// Country names the provider only understands as ISO codes
pub const COUNTRY_CODE_OVERRIDES: &[(&str, &str)] = &[("Georgia", "GE")];

/// Latitude/longitude in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// "No location known". Never a real observation site.
    pub const UNRESOLVED: Coordinate = Coordinate { lat: 0.0, lon: 0.0 };

    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_unresolved(&self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    NoProvider,
    Excluded,
    NoResult,
    ProviderFailed,
}

/// Where a coordinate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Explicit,
    Geocoded,
    Unresolved(UnresolvedReason),
}

/// Structured geocoding request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeocodeQuery {
    pub country: String,
    pub province: String,
    pub admin_area: Option<String>,
}

impl GeocodeQuery {
    /// Build a query from canonical names. Placeholder provinces
    /// (`None`, `none`, ...) are dropped.
    pub fn new(place: &Place, admin_area: Option<&str>) -> Self {
        let province = if place.province.to_lowercase().contains("none") {
            String::new()
        } else {
            place.province.clone()
        };
        Self {
            country: place.country.clone(),
            province,
            admin_area: admin_area.filter(|a| !a.is_empty()).map(str::to_string),
        }
    }

    /// ISO code to send instead of the country name, if any
    pub fn country_code_override(&self) -> Option<&'static str> {
        COUNTRY_CODE_OVERRIDES
            .iter()
            .find(|(name, _)| *name == self.country)
            .map(|(_, code)| *code)
    }
}

impl std::fmt::Display for GeocodeQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.country)?;
        if !self.province.is_empty() {
            write!(f, "/{}", self.province)?;
        }
        if let Some(admin) = &self.admin_area {
            write!(f, "/{admin}")?;
        }
        Ok(())
    }
}

/// Provider-side failure (bad status, denied key, transport)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodeError {
    pub message: String,
}

impl GeocodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for GeocodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "geocode failed: {}", self.message)
    }
}

impl std::error::Error for GeocodeError {}

/// A geocoding provider. `Ok(None)` means the provider found nothing.
pub trait Geocoder {
    fn geocode(&self, query: &GeocodeQuery) -> Result<Option<Coordinate>, GeocodeError>;
}

/// Applies the resolution policy and memoizes provider answers (hits and
/// misses, never failures) for the run.
pub struct GeoResolver<'a> {
    provider: Option<&'a dyn Geocoder>,
    cache: FxHashMap<GeocodeQuery, Option<Coordinate>>,
}

impl<'a> GeoResolver<'a> {
    pub fn new(provider: Option<&'a dyn Geocoder>) -> Self {
        Self {
            provider,
            cache: FxHashMap::default(),
        }
    }

    pub fn resolve(
        &mut self,
        stats: &mut RunStats,
        explicit: Option<(f64, f64)>,
        place: &Place,
        admin_area: Option<&str>,
    ) -> (Coordinate, Resolution) {
        let resolved = self.resolve_inner(stats, explicit, place, admin_area);
        match resolved.1 {
            Resolution::Explicit => stats.explicit_coordinates += 1,
            Resolution::Geocoded => stats.geocoded_coordinates += 1,
            Resolution::Unresolved(_) => stats.unresolved_coordinates += 1,
        }
        resolved
    }

    fn resolve_inner(
        &mut self,
        stats: &mut RunStats,
        explicit: Option<(f64, f64)>,
        place: &Place,
        admin_area: Option<&str>,
    ) -> (Coordinate, Resolution) {
        if let Some((lat, lon)) = explicit {
            return (Coordinate::new(lat, lon), Resolution::Explicit);
        }
        let Some(provider) = self.provider else {
            return unresolved(UnresolvedReason::NoProvider);
        };
        if place.is_excluded() {
            return unresolved(UnresolvedReason::Excluded);
        }

        let query = GeocodeQuery::new(place, admin_area);
        if let Some(cached) = self.cache.get(&query) {
            stats.geocode_cache_hits += 1;
            return match cached {
                Some(coord) => (*coord, Resolution::Geocoded),
                None => unresolved(UnresolvedReason::NoResult),
            };
        }

        stats.geocode_requests += 1;
        match provider.geocode(&query) {
            Ok(Some(coord)) => {
                self.cache.insert(query, Some(coord));
                (coord, Resolution::Geocoded)
            }
            Ok(None) => {
                log::warn!("geocode: no result for {query}");
                self.cache.insert(query, None);
                unresolved(UnresolvedReason::NoResult)
            }
            // Not cached: the next row for this place asks again
            Err(e) => {
                stats.geocode_failures += 1;
                log::warn!("{e} for {query}");
                unresolved(UnresolvedReason::ProviderFailed)
            }
        }
    }
}

fn unresolved(reason: UnresolvedReason) -> (Coordinate, Resolution) {
    (Coordinate::UNRESOLVED, Resolution::Unresolved(reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records queries, answers from a fixed script
    struct ScriptedGeocoder {
        calls: RefCell<Vec<GeocodeQuery>>,
        answer: Result<Option<Coordinate>, GeocodeError>,
    }

    impl ScriptedGeocoder {
        fn new(answer: Result<Option<Coordinate>, GeocodeError>) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                answer,
            }
        }
    }

    impl Geocoder for ScriptedGeocoder {
        fn geocode(&self, query: &GeocodeQuery) -> Result<Option<Coordinate>, GeocodeError> {
            self.calls.borrow_mut().push(query.clone());
            self.answer.clone()
        }
    }

    fn place(country: &str, province: &str) -> Place {
        Place {
            country: country.to_string(),
            province: province.to_string(),
        }
    }

    #[test]
    fn explicit_never_geocodes() {
        let geocoder = ScriptedGeocoder::new(Ok(Some(Coordinate::new(1.0, 1.0))));
        let mut resolver = GeoResolver::new(Some(&geocoder));
        let mut stats = RunStats::default();
        let (coord, how) =
            resolver.resolve(&mut stats, Some((25.7, -80.2)), &place("US", "Florida"), None);
        assert_eq!(coord, Coordinate::new(25.7, -80.2));
        assert_eq!(how, Resolution::Explicit);
        assert!(geocoder.calls.borrow().is_empty());
        assert_eq!(stats.explicit_coordinates, 1);
    }

    #[test]
    fn no_provider_is_sentinel() {
        let mut resolver = GeoResolver::new(None);
        let mut stats = RunStats::default();
        let (coord, how) = resolver.resolve(&mut stats, None, &place("China", "Hubei"), None);
        assert!(coord.is_unresolved());
        assert_eq!(how, Resolution::Unresolved(UnresolvedReason::NoProvider));
        assert_eq!(stats.unresolved_coordinates, 1);
    }

    #[test]
    fn excluded_places_skip_provider() {
        let geocoder = ScriptedGeocoder::new(Ok(Some(Coordinate::new(1.0, 1.0))));
        let mut resolver = GeoResolver::new(Some(&geocoder));
        let mut stats = RunStats::default();
        for p in [
            place("Others", "Diamond Princess cruise ship"),
            place("Canada", "Grand Princess"),
            place("US", "Diamond Princess"),
        ] {
            let (coord, _) = resolver.resolve(&mut stats, None, &p, None);
            if p.province == "Grand Princess" {
                assert!(!coord.is_unresolved());
            } else {
                assert!(coord.is_unresolved());
            }
        }
        assert_eq!(geocoder.calls.borrow().len(), 1);
    }

    #[test]
    fn answers_are_cached_including_misses() {
        let geocoder = ScriptedGeocoder::new(Ok(None));
        let mut resolver = GeoResolver::new(Some(&geocoder));
        let mut stats = RunStats::default();
        for _ in 0..3 {
            let (coord, how) =
                resolver.resolve(&mut stats, None, &place("Atlantis", "Nowhere"), None);
            assert!(coord.is_unresolved());
            assert_eq!(how, Resolution::Unresolved(UnresolvedReason::NoResult));
        }
        assert_eq!(geocoder.calls.borrow().len(), 1);
        assert_eq!(stats.geocode_requests, 1);
        assert_eq!(stats.geocode_cache_hits, 2);
    }

    #[test]
    fn provider_failure_degrades() {
        let geocoder = ScriptedGeocoder::new(Err(GeocodeError::new("REQUEST_DENIED")));
        let mut resolver = GeoResolver::new(Some(&geocoder));
        let mut stats = RunStats::default();
        let (coord, how) = resolver.resolve(&mut stats, None, &place("Italy", ""), None);
        assert!(coord.is_unresolved());
        assert_eq!(how, Resolution::Unresolved(UnresolvedReason::ProviderFailed));
        assert_eq!(stats.geocode_failures, 1);
    }

    /// Fails on the first call, answers on every later one
    struct FlakyGeocoder {
        calls: RefCell<usize>,
    }

    impl Geocoder for FlakyGeocoder {
        fn geocode(&self, _query: &GeocodeQuery) -> Result<Option<Coordinate>, GeocodeError> {
            *self.calls.borrow_mut() += 1;
            if *self.calls.borrow() == 1 {
                Err(GeocodeError::new("HTTP 503"))
            } else {
                Ok(Some(Coordinate::new(41.87, 12.56)))
            }
        }
    }

    #[test]
    fn failures_are_retried_on_next_row() {
        let geocoder = FlakyGeocoder {
            calls: RefCell::new(0),
        };
        let mut resolver = GeoResolver::new(Some(&geocoder));
        let mut stats = RunStats::default();
        let italy = place("Italy", "");

        let (_, first) = resolver.resolve(&mut stats, None, &italy, None);
        assert_eq!(first, Resolution::Unresolved(UnresolvedReason::ProviderFailed));
        let (coord, second) = resolver.resolve(&mut stats, None, &italy, None);
        assert_eq!(second, Resolution::Geocoded);
        assert_eq!(coord, Coordinate::new(41.87, 12.56));
        let (_, third) = resolver.resolve(&mut stats, None, &italy, None);
        assert_eq!(third, Resolution::Geocoded);

        assert_eq!(*geocoder.calls.borrow(), 2);
        assert_eq!(stats.geocode_requests, 2);
        assert_eq!(stats.geocode_failures, 1);
        assert_eq!(stats.geocode_cache_hits, 1);
    }

    #[test]
    fn query_scrubs_placeholder_province() {
        let query = GeocodeQuery::new(&place("Peru", "None"), Some(""));
        assert_eq!(query.province, "");
        assert_eq!(query.admin_area, None);
    }

    #[test]
    fn georgia_override() {
        let query = GeocodeQuery::new(&place("Georgia", ""), None);
        assert_eq!(query.country_code_override(), Some("GE"));
        let query = GeocodeQuery::new(&place("US", "Georgia"), None);
        assert_eq!(query.country_code_override(), None);
    }

    #[test]
    fn query_display() {
        let query = GeocodeQuery::new(&place("US", "Florida"), Some("Miami-Dade"));
        assert_eq!(query.to_string(), "US/Florida/Miami-Dade");
    }
}
