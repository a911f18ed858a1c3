//! Layer composition: turns fetched land and point collections into an
//! ordered list of draw instructions.
//!
//! The glow effect is a stack of passes of the same colour at different
//! widths (or marker sizes) and opacities. The order is fixed:
//!
//! 1. land glow passes, widest first
//! 2. land fill (dark silhouette on top of its own glow)
//! 3. point glow passes, largest first (only when there are points)
//! 4. point core
//! 5. label key entries, one per named point

use geo::Coord;
use tracing::debug;

use crate::models::{FeatureCollection, LabelOrder};

/// 8-bit RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// One outline pass: width in points, opacity 0..1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlowPass {
    pub width: f64,
    pub alpha: f64,
}

/// One marker pass: size as area in points², opacity 0..1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerPass {
    pub size: f64,
    pub alpha: f64,
}

/// Colours and pass parameters for every layer
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub glow: Rgb,
    pub land_glow: [GlowPass; 3],
    pub land_fill: Rgb,
    pub land_edge: Rgb,
    pub land_edge_width: f64,
    pub point_glow: [MarkerPass; 2],
    pub point_core_color: Rgb,
    pub point_core: MarkerPass,
    pub label: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            glow: Rgb::new(0xfd, 0xfb, 0xd3),
            land_glow: [
                GlowPass { width: 8.0, alpha: 0.03 },
                GlowPass { width: 5.0, alpha: 0.08 },
                GlowPass { width: 2.0, alpha: 0.15 },
            ],
            land_fill: Rgb::new(0x0a, 0x0a, 0x0a),
            land_edge: Rgb::new(0x22, 0x22, 0x22),
            land_edge_width: 0.5,
            point_glow: [
                MarkerPass { size: 300.0, alpha: 0.05 },
                MarkerPass { size: 100.0, alpha: 0.15 },
            ],
            point_core_color: Rgb::new(0xff, 0xff, 0xff),
            point_core: MarkerPass { size: 15.0, alpha: 0.9 },
            label: Rgb::new(0xfd, 0xfb, 0xd3),
        }
    }
}

/// Which collection an instruction draws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Land,
    Points,
}

/// Purpose of an instruction within the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    LandGlow,
    LandFill,
    PointGlow,
    PointCore,
    Label,
}

impl Role {
    pub fn source(&self) -> Source {
        match self {
            Role::LandGlow | Role::LandFill => Source::Land,
            Role::PointGlow | Role::PointCore | Role::Label => Source::Points,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    /// Stroke every ring and line, no fill
    Outline { color: Rgb, width: f64, alpha: f64 },
    /// Solid polygon fill with a thin edge
    Fill { fill: Rgb, edge: Rgb, edge_width: f64 },
    /// Filled circle at every point
    Marker { color: Rgb, size: f64, alpha: f64 },
    /// Connector line from `anchor` to label slot `slot`, plus the text there
    Label {
        anchor: Coord<f64>,
        slot: usize,
        text: String,
        color: Rgb,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerInstruction {
    pub role: Role,
    pub z_order: u32,
    pub paint: Paint,
}

impl LayerInstruction {
    pub fn source(&self) -> Source {
        self.role.source()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposeOptions {
    pub show_labels: bool,
    pub label_order: LabelOrder,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            show_labels: true,
            label_order: LabelOrder::FetchOrder,
        }
    }
}

/// Build the ordered instruction list for one map.
pub fn compose(
    land: &FeatureCollection,
    points: &FeatureCollection,
    palette: &Palette,
    options: &ComposeOptions,
) -> Vec<LayerInstruction> {
    debug!(
        "Composing layers for {} land and {} point features",
        land.len(),
        points.len()
    );

    let mut layers = Vec::new();
    let mut push = |role: Role, paint: Paint| {
        let z_order = layers.len() as u32;
        layers.push(LayerInstruction {
            role,
            z_order,
            paint,
        });
    };

    for pass in &palette.land_glow {
        push(
            Role::LandGlow,
            Paint::Outline {
                color: palette.glow,
                width: pass.width,
                alpha: pass.alpha,
            },
        );
    }

    push(
        Role::LandFill,
        Paint::Fill {
            fill: palette.land_fill,
            edge: palette.land_edge,
            edge_width: palette.land_edge_width,
        },
    );

    if points.is_empty() {
        return layers;
    }

    for pass in &palette.point_glow {
        push(
            Role::PointGlow,
            Paint::Marker {
                color: palette.glow,
                size: pass.size,
                alpha: pass.alpha,
            },
        );
    }

    push(
        Role::PointCore,
        Paint::Marker {
            color: palette.point_core_color,
            size: palette.point_core.size,
            alpha: palette.point_core.alpha,
        },
    );

    if !options.show_labels {
        return layers;
    }

    let mut slot = 0;
    for feature in points.in_label_order(options.label_order) {
        let (Some(text), Some(anchor)) = (feature.display_name(), feature.anchor()) else {
            debug!("No label for {}", feature.source_id());
            continue;
        };
        push(
            Role::Label,
            Paint::Label {
                anchor,
                slot,
                text: text.to_string(),
                color: palette.label,
            },
        );
        slot += 1;
    }

    layers
}
