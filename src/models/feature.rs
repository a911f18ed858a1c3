//! Fetched OSM features and the ordered collections that carry them.

use geo::{BoundingRect, Centroid, Coord, Geometry, Rect};
use serde::{Deserialize, Serialize};

/// Type of OSM object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsmType {
    Node,
    Way,
    Relation,
}

impl std::fmt::Display for OsmType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsmType::Node => write!(f, "node"),
            OsmType::Way => write!(f, "way"),
            OsmType::Relation => write!(f, "relation"),
        }
    }
}

/// A single geometry with the attributes the renderer cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry<f64>,
    /// Display name (OSM `name` tag), if any
    pub name: Option<String>,
    pub osm_type: OsmType,
    pub osm_id: i64,
    /// Position in the fetch response
    pub seq: usize,
}

impl Feature {
    pub fn new(geometry: Geometry<f64>, osm_type: OsmType, osm_id: i64, seq: usize) -> Self {
        Self {
            geometry,
            name: None,
            osm_type,
            osm_id,
            seq,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name with surrounding whitespace removed, `None` when blank.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Coordinate used for markers and label anchors.
    ///
    /// Points use their own position, everything else its centroid.
    pub fn anchor(&self) -> Option<Coord<f64>> {
        match &self.geometry {
            Geometry::Point(p) => Some(p.0),
            other => other.centroid().map(|p| p.0),
        }
    }

    /// Source identifier: "{osm_type}/{osm_id}"
    pub fn source_id(&self) -> String {
        format!("{}/{}", self.osm_type, self.osm_id)
    }
}

/// Order in which named features are stacked in the label key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LabelOrder {
    /// Order the features came back from the data service
    #[default]
    FetchOrder,
    /// Alphabetical by display name, ties broken by fetch order
    Name,
}

/// Ordered set of features produced by one fetch. May be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Total extent of every geometry in the collection
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.bounding_rect())
            .reduce(|acc, rect| {
                Rect::new(
                    Coord {
                        x: acc.min().x.min(rect.min().x),
                        y: acc.min().y.min(rect.min().y),
                    },
                    Coord {
                        x: acc.max().x.max(rect.max().x),
                        y: acc.max().y.max(rect.max().y),
                    },
                )
            })
    }

    /// Features in a deterministic order for label stacking.
    pub fn in_label_order(&self, order: LabelOrder) -> Vec<&Feature> {
        let mut ordered: Vec<&Feature> = self.features.iter().collect();
        match order {
            LabelOrder::FetchOrder => ordered.sort_by_key(|f| f.seq),
            LabelOrder::Name => ordered.sort_by(|a, b| {
                let a_name = a.display_name().unwrap_or("").to_lowercase();
                let b_name = b.display_name().unwrap_or("").to_lowercase();
                a_name.cmp(&b_name).then(a.seq.cmp(&b.seq))
            }),
        }
        ordered
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
