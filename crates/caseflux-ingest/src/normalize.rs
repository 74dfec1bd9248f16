//! Row normalization: raw CSV record to [`NormalizedObservation`]

use caseflux_core::IngestError;

use crate::canon::canonicalize;
use crate::coerce::{parse_coordinates, parse_count};
use crate::context::RunContext;
use crate::geo::{Coordinate, GeoResolver, Geocoder, Resolution};
use crate::record::{RawRecord, RecordShape, SourceRow, SourcedRecord};
use crate::spatial::SpatialIndexer;
use crate::timestamp::{LastUpdate, parse_last_update};

/// One canonical observation, ready for the sink
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedObservation {
    pub country: String,
    /// May be empty
    pub province: String,
    /// Region code, coded rows only
    pub fips: Option<String>,
    /// Combined-key label, coded rows only
    pub combined_key: Option<String>,
    pub shape: RecordShape,
    pub confirmed: u64,
    pub deaths: u64,
    pub recovered: u64,
    /// [`Coordinate::UNRESOLVED`] when no location is known
    pub location: Coordinate,
    pub resolution: Resolution,
    /// S2 token, empty when the location is unusable
    pub cell: String,
    pub last_update: LastUpdate,
    pub source: SourceRow,
}

/// Turns raw records into observations: canonical names, coerced counts,
/// resolved coordinates, spatial cell, parsed timestamp.
pub struct Normalizer<'a> {
    geo: GeoResolver<'a>,
    spatial: SpatialIndexer,
}

impl<'a> Normalizer<'a> {
    pub fn new(geocoder: Option<&'a dyn Geocoder>, spatial: SpatialIndexer) -> Self {
        Self {
            geo: GeoResolver::new(geocoder),
            spatial,
        }
    }

    /// Normalize one record. Any unparsable required field is a fatal
    /// [`IngestError::Parse`] naming the file and row.
    pub fn normalize(
        &mut self,
        ctx: &mut RunContext,
        sourced: SourcedRecord,
    ) -> Result<NormalizedObservation, IngestError> {
        let SourcedRecord { source, record } = sourced;
        let shape = record.shape();
        let admin_area = record.admin_area().map(str::to_string);

        let case = record.case();
        let place = canonicalize(&case.country, &case.province);
        let at = |e: String| IngestError::parse(&source.file, Some(source.row), e);
        let last_update = parse_last_update(&case.last_update).map_err(|e| at(e.to_string()))?;
        let confirmed =
            parse_count("Confirmed", &case.confirmed).map_err(|e| at(e.to_string()))?;
        let deaths = parse_count("Deaths", &case.deaths).map_err(|e| at(e.to_string()))?;
        let recovered =
            parse_count("Recovered", &case.recovered).map_err(|e| at(e.to_string()))?;
        let explicit = parse_coordinates(case.latitude.as_deref(), case.longitude.as_deref())
            .map_err(|e| at(e.to_string()))?;

        let (location, resolution) =
            self.geo
                .resolve(&mut ctx.stats, explicit, &place, admin_area.as_deref());
        let cell = self.spatial.token(location);
        if cell.is_empty() {
            ctx.stats.empty_cells += 1;
        }

        match shape {
            RecordShape::Legacy => ctx.stats.legacy_rows += 1,
            RecordShape::Coded => ctx.stats.coded_rows += 1,
        }
        ctx.stats.rows += 1;

        let (fips, combined_key) = match record {
            RawRecord::Legacy(_) => (None, None),
            RawRecord::Coded {
                fips, combined_key, ..
            } => (Some(fips), Some(combined_key.replace('"', ""))),
        };

        Ok(NormalizedObservation {
            country: place.country,
            province: place.province,
            fips,
            combined_key,
            shape,
            confirmed,
            deaths,
            recovered,
            location,
            resolution,
            cell,
            last_update,
            source,
        })
    }
}
