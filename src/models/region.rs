//! Query targets for the data fetcher.

use serde::{Deserialize, Serialize};

use crate::error::RegionError;

/// Geographic bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self, RegionError> {
        if ![north, south, east, west].iter().all(|v| v.is_finite()) {
            return Err(RegionError::InvalidBoundingBox(
                "coordinates must be finite".to_string(),
            ));
        }
        if !(-90.0..=90.0).contains(&north) || !(-90.0..=90.0).contains(&south) {
            return Err(RegionError::InvalidBoundingBox(format!(
                "latitude out of range (north {}, south {})",
                north, south
            )));
        }
        if !(-180.0..=180.0).contains(&east) || !(-180.0..=180.0).contains(&west) {
            return Err(RegionError::InvalidBoundingBox(format!(
                "longitude out of range (east {}, west {})",
                east, west
            )));
        }
        if north <= south {
            return Err(RegionError::InvalidBoundingBox(format!(
                "north ({}) must be greater than south ({})",
                north, south
            )));
        }

        Ok(Self {
            north,
            south,
            east,
            west,
        })
    }

    /// Overpass QL bbox filter: "(south,west,north,east)"
    pub fn to_overpass(&self) -> String {
        format!("({},{},{},{})", self.south, self.west, self.north, self.east)
    }
}

/// What the data fetcher should query. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionQuery {
    /// Free-text place name, resolved to an administrative boundary
    Place(String),
    /// Explicit box, queried for coastline ways only
    BoundingBox(BoundingBox),
}

impl std::fmt::Display for RegionQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionQuery::Place(name) => write!(f, "place '{}'", name),
            RegionQuery::BoundingBox(bbox) => write!(f, "bbox {}", bbox.to_overpass()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_overpass_order() {
        let bbox = BoundingBox::new(47.46, 42.97, -66.89, -71.09).unwrap();
        assert_eq!(bbox.to_overpass(), "(42.97,-71.09,47.46,-66.89)");
    }

    #[test]
    fn test_bbox_rejects_inverted_latitudes() {
        assert!(matches!(
            BoundingBox::new(40.0, 41.0, -70.0, -71.0),
            Err(RegionError::InvalidBoundingBox(_))
        ));
    }

    #[test]
    fn test_bbox_rejects_out_of_range() {
        assert!(BoundingBox::new(91.0, 10.0, 0.0, 1.0).is_err());
        assert!(BoundingBox::new(10.0, 0.0, 181.0, 1.0).is_err());
        assert!(BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0).is_err());
    }
}
