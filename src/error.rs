//! Error types for each pipeline stage.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while turning a location string into a query.
#[derive(Debug, Error)]
pub enum RegionError {
    #[error("Location must not be empty")]
    EmptyLocation,

    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),
}

/// Any failure while talking to the geodata services.
///
/// The pipeline treats every variant the same way: log it and abort the run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Malformed(String),

    #[error("Service reported an error: {0}")]
    Remote(String),

    #[error("No place found matching '{0}'")]
    PlaceNotFound(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(e.to_string())
        } else if e.is_decode() {
            FetchError::Malformed(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Malformed(e.to_string())
    }
}

impl From<url::ParseError> for FetchError {
    fn from(e: url::ParseError) -> Self {
        FetchError::Network(format!("invalid endpoint URL: {}", e))
    }
}

#[derive(Debug, Error)]
pub enum ViewportError {
    #[error("Land collection is empty, bounds are undefined")]
    EmptyLand,

    #[error("Land collection has non-finite bounds")]
    NonFinite,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Viewport has zero width or height")]
    DegenerateViewport,

    #[error("Drawing failed: {0}")]
    Draw(String),

    #[error("Failed to encode image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a failed run, one variant per stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Region(#[from] RegionError),

    #[error("Error fetching data: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Viewport(#[from] ViewportError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl PipelineError {
    pub fn is_fetch(&self) -> bool {
        matches!(self, PipelineError::Fetch(_))
    }
}
