//! S2 cell tokens for resolved coordinates

use s2::cellid::CellID;
use s2::latlng::LatLng;

use crate::config::DEFAULT_S2_LEVEL;
use crate::geo::Coordinate;

/// Leaf token of the cell containing (0, 0)
pub const DEGENERATE_LEAF_TOKEN: &str = "1000000000000001";

const MAX_LEVEL: u8 = 30;

/// Maps coordinates to S2 cell tokens at a fixed level.
#[derive(Debug, Clone)]
pub struct SpatialIndexer {
    level: u8,
    /// Token of the origin cell at `level`
    degenerate: String,
}

impl SpatialIndexer {
    /// Levels above 30 are clamped to the leaf level.
    pub fn new(level: u8) -> Self {
        let level = level.min(MAX_LEVEL);
        let degenerate = Self::cell(Coordinate::UNRESOLVED, level)
            .map(|cell| cell.to_token())
            .unwrap_or_else(|| DEGENERATE_LEAF_TOKEN.to_string());
        Self { level, degenerate }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    fn cell(coord: Coordinate, level: u8) -> Option<CellID> {
        let ll = LatLng::from_degrees(coord.lat, coord.lon);
        if !ll.is_valid() {
            return None;
        }
        let leaf = CellID::from(&ll);
        let cell = if level < MAX_LEVEL {
            leaf.parent(u64::from(level))
        } else {
            leaf
        };
        cell.is_valid().then_some(cell)
    }

    /// Cell token, or empty for the unresolved sentinel, out-of-range
    /// coordinates, and the degenerate origin cell.
    pub fn token(&self, coord: Coordinate) -> String {
        if coord.is_unresolved() {
            return String::new();
        }
        match Self::cell(coord, self.level) {
            Some(cell) => self.scrub(cell.to_token()),
            None => {
                log::debug!(
                    "no S2 cell for lat {:.5} lon {:.5}",
                    coord.lat,
                    coord.lon
                );
                String::new()
            }
        }
    }

    /// Replace the degenerate origin token with the empty string.
    pub fn scrub(&self, token: String) -> String {
        if token == DEGENERATE_LEAF_TOKEN || token == self.degenerate {
            String::new()
        } else {
            token
        }
    }
}

impl Default for SpatialIndexer {
    fn default() -> Self {
        Self::new(DEFAULT_S2_LEVEL)
    }
}
