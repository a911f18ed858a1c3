//! Coastglow - glowing coastline maps from OpenStreetMap data
//!
//! Fetches a region's boundary (or coastline) and its lighthouses, stacks
//! glow layers over a black background and writes a PNG.

pub mod compose;
pub mod error;
pub mod fetch;
pub mod models;
pub mod pipeline;
pub mod raster;
pub mod region;
pub mod viewport;

pub use error::{FetchError, PipelineError};
pub use models::{Feature, FeatureCollection, LabelOrder, RegionQuery};
pub use pipeline::{MapPlan, Pipeline, RunOutcome};
