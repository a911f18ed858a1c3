//! Visible window of the map, cropped to the land extent.

use crate::error::ViewportError;
use crate::models::FeatureCollection;

/// Rectangle in lon/lat degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Viewport {
    /// Exact bounding extent of the land collection. Point features never
    /// widen the window.
    pub fn from_land(land: &FeatureCollection) -> Result<Self, ViewportError> {
        let rect = land.bounding_rect().ok_or(ViewportError::EmptyLand)?;

        let viewport = Self {
            min_x: rect.min().x,
            min_y: rect.min().y,
            max_x: rect.max().x,
            max_y: rect.max().y,
        };

        if ![viewport.min_x, viewport.min_y, viewport.max_x, viewport.max_y]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(ViewportError::NonFinite);
        }

        Ok(viewport)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Vertical stretch for lon/lat data so shapes are not squashed away
    /// from the equator: `1 / cos(mid latitude)`.
    pub fn aspect(&self) -> f64 {
        let mid_lat = (self.min_y + self.max_y) / 2.0;
        let cos = mid_lat.to_radians().cos();
        if cos > 1e-6 {
            1.0 / cos
        } else {
            1.0
        }
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:.4}, {:.4}] - [{:.4}, {:.4}]",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}
