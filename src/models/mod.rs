//! Core data models shared by the pipeline stages.

pub mod feature;
pub mod region;

pub use feature::{Feature, FeatureCollection, LabelOrder, OsmType};
pub use region::{BoundingBox, RegionQuery};
