//! Nominatim place search: free-text name to boundary polygon.

use geo::Geometry;
use serde::Deserialize;
use url::Url;

use crate::error::FetchError;
use crate::models::{BoundingBox, Feature, OsmType};

/// One search hit from `/search?format=jsonv2&polygon_geojson=1`
#[derive(Debug, Deserialize)]
pub(crate) struct NominatimPlace {
    pub osm_type: Option<OsmType>,
    pub osm_id: Option<i64>,
    #[serde(default)]
    pub display_name: String,
    /// [south, north, west, east] as strings
    #[serde(default)]
    pub boundingbox: Vec<String>,
    pub geojson: Option<geojson::Geometry>,
}

impl NominatimPlace {
    /// Overpass area id for this place, if it has one.
    ///
    /// Overpass derives area ids from relations (3600000000 + id) and
    /// closed ways (2400000000 + id). Nodes have no area.
    pub fn area_id(&self) -> Option<i64> {
        match (self.osm_type?, self.osm_id?) {
            (OsmType::Relation, id) => Some(3_600_000_000 + id),
            (OsmType::Way, id) => Some(2_400_000_000 + id),
            (OsmType::Node, _) => None,
        }
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        let values: Vec<f64> = self
            .boundingbox
            .iter()
            .filter_map(|v| v.trim().parse().ok())
            .collect();
        if values.len() != 4 {
            return None;
        }
        BoundingBox::new(values[1], values[0], values[3], values[2]).ok()
    }

    /// Boundary geometry as a land feature
    pub fn into_feature(self) -> Result<Feature, FetchError> {
        let geojson = self.geojson.ok_or_else(|| {
            FetchError::Malformed(format!("no boundary geometry for '{}'", self.display_name))
        })?;
        let geometry: Geometry<f64> = geojson
            .try_into()
            .map_err(|e: geojson::Error| FetchError::Malformed(e.to_string()))?;

        let feature = Feature::new(
            geometry,
            self.osm_type.unwrap_or(OsmType::Relation),
            self.osm_id.unwrap_or_default(),
            0,
        );
        Ok(if self.display_name.is_empty() {
            feature
        } else {
            feature.with_name(self.display_name)
        })
    }
}

/// Build the search URL for a place name
pub(crate) fn search_url(endpoint: &str, place: &str) -> Result<Url, FetchError> {
    let url = Url::parse_with_params(
        endpoint,
        &[
            ("q", place),
            ("format", "jsonv2"),
            ("polygon_geojson", "1"),
            ("limit", "1"),
        ],
    )?;
    Ok(url)
}

/// Parse a search response body and take the first hit
pub(crate) fn parse_search(body: &str, place: &str) -> Result<NominatimPlace, FetchError> {
    let mut hits: Vec<NominatimPlace> = serde_json::from_str(body)?;
    if hits.is_empty() {
        return Err(FetchError::PlaceNotFound(place.to_string()));
    }
    Ok(hits.remove(0))
}
