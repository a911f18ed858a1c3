//! Overpass API client and the live [`GeoDataSource`].

use std::collections::HashMap;
use std::time::Duration;

use geo::{Coord, Geometry, Point};
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::nominatim::{self, NominatimPlace};
use super::{stitch_ways, FetchConfig, FetchedData, GeoDataSource, TagFilter, WaySegment};
use crate::error::FetchError;
use crate::models::{BoundingBox, Feature, FeatureCollection, OsmType, RegionQuery};

/// Extra time the HTTP client waits past the server-side query timeout
const CLIENT_TIMEOUT_GRACE: Duration = Duration::from_secs(15);

/// Where an Overpass query looks for features
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum QueryScope {
    /// Overpass area id (derived from a relation or way)
    Area(i64),
    BoundingBox(BoundingBox),
}

/// Build an Overpass QL query.
///
/// `selector` is `way`, `node` or `nwr`; `out` is the output mode
/// (`geom` for full way geometry, `center` for a single coordinate).
pub(crate) fn build_query(
    config: &FetchConfig,
    selector: &str,
    filter: &TagFilter,
    scope: &QueryScope,
    out: &str,
) -> String {
    let (prefix, spatial) = match scope {
        QueryScope::Area(id) => (
            format!("area(id:{})->.searchArea;", id),
            "(area.searchArea)".to_string(),
        ),
        QueryScope::BoundingBox(bbox) => (String::new(), bbox.to_overpass()),
    };

    format!(
        "{}{}{}{}{};out {};",
        config.overpass_settings(),
        prefix,
        selector,
        filter.to_overpass(),
        spatial,
        out
    )
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<Element>,
    remark: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LatLon {
    lat: f64,
    lon: f64,
}

impl From<LatLon> for Coord<f64> {
    fn from(ll: LatLon) -> Self {
        Coord { x: ll.lon, y: ll.lat }
    }
}

#[derive(Debug, Deserialize)]
struct Element {
    #[serde(rename = "type")]
    osm_type: OsmType,
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<LatLon>,
    #[serde(default)]
    geometry: Vec<LatLon>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

impl Element {
    /// Single coordinate: node position, or the `out center` point
    fn position(&self) -> Option<Coord<f64>> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coord { x: lon, y: lat }),
            _ => self.center.map(Coord::from),
        }
    }

    fn name(&self) -> Option<&String> {
        self.tags.get("name")
    }
}

/// Parse an Overpass JSON body, surfacing runtime errors reported in `remark`
fn parse_response(body: &str) -> Result<OverpassResponse, FetchError> {
    let response: OverpassResponse = serde_json::from_str(body)?;
    if let Some(remark) = &response.remark {
        if remark.contains("error") {
            return Err(FetchError::Remote(remark.clone()));
        }
        debug!("Overpass remark: {}", remark);
    }
    Ok(response)
}

/// Point features from an `out center` response, in response order
pub(crate) fn parse_points(body: &str) -> Result<FeatureCollection, FetchError> {
    let response = parse_response(body)?;

    let mut features = Vec::with_capacity(response.elements.len());
    for element in response.elements {
        let Some(position) = element.position() else {
            debug!(
                "Skipping {}/{} without coordinates",
                element.osm_type, element.id
            );
            continue;
        };

        let seq = features.len();
        let mut feature = Feature::new(
            Geometry::Point(Point(position)),
            element.osm_type,
            element.id,
            seq,
        );
        if let Some(name) = element.name() {
            feature = feature.with_name(name.clone());
        }
        features.push(feature);
    }

    Ok(FeatureCollection::new(features))
}

/// Coastline ways from an `out geom` response, stitched into rings and chains
pub(crate) fn parse_coastline(body: &str) -> Result<FeatureCollection, FetchError> {
    let response = parse_response(body)?;

    let segments: Vec<WaySegment> = response
        .elements
        .iter()
        .filter(|e| e.osm_type == OsmType::Way)
        .map(|e| (e.id, e.geometry.iter().copied().map(Coord::from).collect()))
        .collect();

    Ok(stitch_ways(segments)
        .into_iter()
        .enumerate()
        .map(|(seq, (id, geometry))| Feature::new(geometry, OsmType::Way, id, seq))
        .collect())
}

/// Live data source backed by Nominatim and the Overpass API
pub struct OverpassClient {
    client: Client,
    config: FetchConfig,
}

/// HTTP client settings shared by every request of one fetch
fn client_builder(config: &FetchConfig) -> ClientBuilder {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout + CLIENT_TIMEOUT_GRACE)
        .gzip(true)
}

impl OverpassClient {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = client_builder(&config).build()?;
        Ok(Self { client, config })
    }

    async fn get_text(&self, url: Url) -> Result<String, FetchError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Request failed with status {}", status);
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.text().await?)
    }

    async fn run_query(&self, query: &str) -> Result<String, FetchError> {
        let url = Url::parse_with_params(&self.config.overpass_url, &[("data", query)])?;
        self.get_text(url).await
    }

    async fn geocode(&self, place: &str) -> Result<NominatimPlace, FetchError> {
        let url = nominatim::search_url(&self.config.nominatim_url, place)?;
        let body = self.get_text(url).await?;
        nominatim::parse_search(&body, place)
    }

    async fn fetch_points(&self, scope: &QueryScope) -> Result<FeatureCollection, FetchError> {
        let query = build_query(
            &self.config,
            "nwr",
            &self.config.point_filter,
            scope,
            "center",
        );
        let body = self.run_query(&query).await?;
        parse_points(&body)
    }

    async fn fetch_place(&self, place: &str) -> Result<FetchedData, FetchError> {
        let hit = self.geocode(place).await?;

        let scope = match (hit.area_id(), hit.bbox()) {
            (Some(area), _) => QueryScope::Area(area),
            (None, Some(bbox)) => QueryScope::BoundingBox(bbox),
            (None, None) => {
                return Err(FetchError::Malformed(format!(
                    "place '{}' has neither an area nor a bounding box",
                    place
                )))
            }
        };

        let land = FeatureCollection::new(vec![hit.into_feature()?]);
        info!("Resolved boundary for '{}'", place);

        let points = self.fetch_points(&scope).await?;
        Ok(FetchedData { land, points })
    }

    async fn fetch_bbox(&self, bbox: &BoundingBox) -> Result<FetchedData, FetchError> {
        let scope = QueryScope::BoundingBox(*bbox);

        let query = build_query(
            &self.config,
            "way",
            &self.config.boundary_filter,
            &scope,
            "geom",
        );
        let body = self.run_query(&query).await?;
        let land = parse_coastline(&body)?;
        info!("Fetched {} coastline geometries", land.len());

        let points = self.fetch_points(&scope).await?;
        Ok(FetchedData { land, points })
    }
}

impl GeoDataSource for OverpassClient {
    async fn fetch(&self, query: &RegionQuery) -> Result<FetchedData, FetchError> {
        let data = match query {
            RegionQuery::Place(place) => self.fetch_place(place).await?,
            RegionQuery::BoundingBox(bbox) => self.fetch_bbox(bbox).await?,
        };

        info!(
            "Fetched {} land features and {} point features",
            data.land.len(),
            data.points.len()
        );
        Ok(data)
    }
}
