//! Region resolution: decide between a place-name query and a bounding-box
//! coastline query for a location string.

use tracing::debug;

use crate::error::RegionError;
use crate::models::{BoundingBox, RegionQuery};

/// Location rendered when none is given on the command line
pub const DEFAULT_LOCATION: &str = "Maine, USA";

/// Routes a whole large area to a fixed bounding box.
///
/// Matches when the lower-cased location contains `pattern` and has fewer
/// than `max_segments` comma-separated parts, so "Maine, USA" matches while
/// "Boothbay, Maine, USA" does not.
#[derive(Debug, Clone, PartialEq)]
pub struct LargeAreaRule {
    pub pattern: String,
    pub max_segments: usize,
    pub bbox: BoundingBox,
}

impl LargeAreaRule {
    pub fn new(pattern: &str, max_segments: usize, bbox: BoundingBox) -> Self {
        Self {
            pattern: pattern.to_lowercase(),
            max_segments,
            bbox,
        }
    }

    pub fn matches(&self, location: &str) -> bool {
        let normalized = location.trim().to_lowercase();
        normalized.contains(&self.pattern) && segment_count(&normalized) < self.max_segments
    }
}

/// Number of comma-separated parts in a location string
fn segment_count(location: &str) -> usize {
    location.split(',').count()
}

/// State of Maine, coastline extent
fn maine_bbox() -> BoundingBox {
    BoundingBox {
        north: 47.46,
        south: 42.97,
        east: -66.89,
        west: -71.09,
    }
}

#[derive(Debug, Clone)]
pub struct RegionResolver {
    rules: Vec<LargeAreaRule>,
}

impl RegionResolver {
    pub fn new(rules: Vec<LargeAreaRule>) -> Self {
        Self { rules }
    }

    /// Resolve a location to a query. The first matching rule wins.
    pub fn resolve(&self, location: &str) -> Result<RegionQuery, RegionError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(RegionError::EmptyLocation);
        }

        if let Some(rule) = self.rules.iter().find(|r| r.matches(location)) {
            debug!(
                "Location '{}' matched large-area rule '{}'",
                location, rule.pattern
            );
            return Ok(RegionQuery::BoundingBox(rule.bbox));
        }

        Ok(RegionQuery::Place(location.to_string()))
    }
}

impl Default for RegionResolver {
    fn default() -> Self {
        Self::new(vec![LargeAreaRule::new("maine", 3, maine_bbox())])
    }
}
