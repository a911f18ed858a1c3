//! Data fetching from OpenStreetMap services.
//!
//! One land query (administrative boundary or coastline) and one point query
//! (lighthouses) per run, issued sequentially.

mod nominatim;
mod overpass;
mod stitch;

use std::future::Future;
use std::time::Duration;

pub use overpass::OverpassClient;
pub use stitch::{stitch_ways, WaySegment};

use crate::error::FetchError;
use crate::models::{FeatureCollection, RegionQuery};

pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Server-side query timeout, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Maximum Overpass query memory, in bytes (1 GiB)
pub const DEFAULT_MAX_SIZE: u64 = 1_073_741_824;

/// Single OSM `key=value` tag filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    pub key: String,
    pub value: String,
}

impl TagFilter {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    /// Overpass QL tag clause, e.g. `["man_made"="lighthouse"]`
    pub fn to_overpass(&self) -> String {
        format!("[\"{}\"=\"{}\"]", self.key, self.value)
    }
}

/// Settings for one fetch, passed explicitly into the fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub overpass_url: String,
    pub nominatim_url: String,
    pub user_agent: String,
    /// Server-side timeout; the HTTP client allows a little longer
    pub timeout: Duration,
    /// Overpass `[maxsize:N]` in bytes
    pub max_size: u64,
    /// Selects land features for bounding-box queries
    pub boundary_filter: TagFilter,
    /// Selects point features of interest
    pub point_filter: TagFilter,
}

impl FetchConfig {
    /// Overpass QL settings line, e.g. `[out:json][timeout:180][maxsize:1073741824];`
    pub fn overpass_settings(&self) -> String {
        format!(
            "[out:json][timeout:{}][maxsize:{}];",
            self.timeout.as_secs(),
            self.max_size
        )
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            user_agent: format!("coastglow/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_size: DEFAULT_MAX_SIZE,
            boundary_filter: TagFilter::new("natural", "coastline"),
            point_filter: TagFilter::new("man_made", "lighthouse"),
        }
    }
}

/// Land shapes and point features for one region
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedData {
    pub land: FeatureCollection,
    pub points: FeatureCollection,
}

/// Source of geometry for a region query.
///
/// Implemented by [`OverpassClient`] for live data and by fixtures in tests.
pub trait GeoDataSource {
    fn fetch(
        &self,
        query: &RegionQuery,
    ) -> impl Future<Output = Result<FetchedData, FetchError>> + Send;
}
