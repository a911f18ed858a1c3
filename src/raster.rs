//! Image writer: rasterizes layer instructions onto a black canvas and
//! writes a PNG.
//!
//! The canvas is drawn into an in-memory buffer and written through a
//! temporary file in the target directory, so a failed run never leaves a
//! partial image behind.

use std::path::{Path, PathBuf};

use geo::{Coord, Geometry, LineString, Polygon};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tempfile::Builder;
use tracing::{debug, info, warn};

use crate::compose::{LayerInstruction, Paint, Rgb, Source};
use crate::error::RenderError;
use crate::models::FeatureCollection;
use crate::viewport::Viewport;

pub const DEFAULT_OUTPUT: &str = "coastline_output.png";

/// Points per inch; line widths and marker sizes are given in points
const POINTS_PER_INCH: f64 = 72.0;

/// Label key geometry, in inches
const LABEL_TOP: f64 = 0.5;
const LABEL_STEP: f64 = 0.25;
const LABEL_INDENT: f64 = 0.3;
const LABEL_FONT: f64 = 0.12;
const CONNECTOR_WIDTH: f64 = 0.5;
const CONNECTOR_ALPHA: f64 = 0.4;

/// Output settings. Defaults reproduce the fixed 12x12 in, 300 DPI export.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub output: PathBuf,
    pub dpi: u32,
    /// Plot area, inches
    pub width_in: f64,
    pub height_in: f64,
    /// Extra width added on the right when there is a label key
    pub label_margin_in: f64,
    pub background: Rgb,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            output: PathBuf::from(DEFAULT_OUTPUT),
            dpi: 300,
            width_in: 12.0,
            height_in: 12.0,
            label_margin_in: 3.0,
            background: Rgb::new(0, 0, 0),
        }
    }
}

impl RenderOptions {
    fn px(&self, inches: f64) -> f64 {
        inches * self.dpi as f64
    }

    /// Points to pixels
    fn pt(&self, points: f64) -> f64 {
        points * self.dpi as f64 / POINTS_PER_INCH
    }
}

/// Pixel dimensions of the exported image.
///
/// The viewport is fitted into the plot area keeping its aspect ratio and the
/// image is trimmed to the fitted area (plus the label margin, if any).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasLayout {
    pub width: u32,
    pub height: u32,
    pub plot_width: u32,
    pub plot_height: u32,
}

impl CanvasLayout {
    pub fn new(
        viewport: &Viewport,
        options: &RenderOptions,
        label_count: usize,
    ) -> Result<Self, RenderError> {
        if viewport.is_degenerate() {
            return Err(RenderError::DegenerateViewport);
        }

        let max_w = options.px(options.width_in).max(1.0);
        let max_h = options.px(options.height_in).max(1.0);

        let ratio = viewport.width() / (viewport.height() * viewport.aspect());
        let (plot_w, plot_h) = if ratio >= max_w / max_h {
            (max_w, max_w / ratio)
        } else {
            (max_h * ratio, max_h)
        };
        let plot_width = (plot_w.round() as u32).max(1);
        let plot_height = (plot_h.round() as u32).max(1);

        if label_count == 0 {
            return Ok(Self {
                width: plot_width,
                height: plot_height,
                plot_width,
                plot_height,
            });
        }

        let margin = options.px(options.label_margin_in).round() as u32;
        let key_height = options
            .px(LABEL_TOP * 2.0 + LABEL_STEP * label_count as f64)
            .round() as u32;

        Ok(Self {
            width: plot_width + margin,
            height: plot_height.max(key_height),
            plot_width,
            plot_height,
        })
    }
}

/// Maps lon/lat onto plot-area pixels
struct Projection {
    viewport: Viewport,
    width: f64,
    height: f64,
}

impl Projection {
    fn to_pixel(&self, c: Coord<f64>) -> (i32, i32) {
        let x = (c.x - self.viewport.min_x) / self.viewport.width() * self.width;
        let y = (self.viewport.max_y - c.y) / self.viewport.height() * self.height;
        (x.round() as i32, y.round() as i32)
    }

    fn path(&self, line: &LineString<f64>) -> Vec<(i32, i32)> {
        line.coords().map(|c| self.to_pixel(*c)).collect()
    }
}

fn color(rgb: Rgb) -> RGBColor {
    RGBColor(rgb.r, rgb.g, rgb.b)
}

fn stroke_px(px: f64) -> u32 {
    (px.round() as u32).max(1)
}

fn draw_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

/// Every ring and line string of a geometry
fn outlines(geometry: &Geometry<f64>) -> Vec<LineString<f64>> {
    match geometry {
        Geometry::LineString(ls) => vec![ls.clone()],
        Geometry::MultiLineString(mls) => mls.0.clone(),
        Geometry::Line(line) => vec![LineString::from(vec![line.start, line.end])],
        Geometry::Polygon(p) => rings(p),
        Geometry::MultiPolygon(mp) => mp.0.iter().flat_map(rings).collect(),
        Geometry::Rect(r) => rings(&r.to_polygon()),
        Geometry::Triangle(t) => rings(&t.to_polygon()),
        Geometry::GeometryCollection(gc) => gc.0.iter().flat_map(outlines).collect(),
        Geometry::Point(_) | Geometry::MultiPoint(_) => vec![],
    }
}

fn rings(polygon: &Polygon<f64>) -> Vec<LineString<f64>> {
    std::iter::once(polygon.exterior().clone())
        .chain(polygon.interiors().iter().cloned())
        .collect()
}

/// Every polygon of a geometry; lines and points have no fill
fn polygons(geometry: &Geometry<f64>) -> Vec<Polygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => vec![p.clone()],
        Geometry::MultiPolygon(mp) => mp.0.clone(),
        Geometry::Rect(r) => vec![r.to_polygon()],
        Geometry::Triangle(t) => vec![t.to_polygon()],
        Geometry::GeometryCollection(gc) => gc.0.iter().flat_map(polygons).collect(),
        _ => vec![],
    }
}

struct Canvas<'a> {
    options: &'a RenderOptions,
    layout: CanvasLayout,
    projection: Projection,
    land: &'a FeatureCollection,
    points: &'a FeatureCollection,
}

impl Canvas<'_> {
    fn draw(
        &self,
        root: &DrawingArea<BitMapBackend<'_>, Shift>,
        instructions: &[LayerInstruction],
    ) -> Result<(), RenderError> {
        root.fill(&color(self.options.background))
            .map_err(draw_err)?;

        // Map layers use the plot area; the label key spans the whole canvas
        let (plot, _) = root.split_horizontally(self.layout.plot_width);

        let mut ordered: Vec<&LayerInstruction> = instructions.iter().collect();
        ordered.sort_by_key(|l| l.z_order);

        for layer in ordered {
            match (&layer.paint, layer.source()) {
                (Paint::Outline { color: c, width, alpha }, Source::Land) => {
                    self.draw_outlines(&plot, *c, *width, *alpha)?
                }
                (
                    Paint::Fill {
                        fill,
                        edge,
                        edge_width,
                    },
                    Source::Land,
                ) => self.draw_fill(&plot, *fill, *edge, *edge_width)?,
                (Paint::Marker { color: c, size, alpha }, Source::Points) => {
                    self.draw_markers(&plot, *c, *size, *alpha)?
                }
                (
                    Paint::Label {
                        anchor,
                        slot,
                        text,
                        color: c,
                    },
                    _,
                ) => self.draw_label(root, *anchor, *slot, text, *c)?,
                (paint, source) => {
                    warn!("Skipping {:?} layer for {:?} collection", paint, source);
                }
            }
        }

        Ok(())
    }

    fn draw_outlines(
        &self,
        area: &DrawingArea<BitMapBackend<'_>, Shift>,
        rgb: Rgb,
        width: f64,
        alpha: f64,
    ) -> Result<(), RenderError> {
        let style = color(rgb)
            .mix(alpha)
            .stroke_width(stroke_px(self.options.pt(width)));

        for feature in self.land.iter() {
            for line in outlines(&feature.geometry) {
                area.draw(&PathElement::new(self.projection.path(&line), style))
                    .map_err(draw_err)?;
            }
        }
        Ok(())
    }

    fn draw_fill(
        &self,
        area: &DrawingArea<BitMapBackend<'_>, Shift>,
        fill: Rgb,
        edge: Rgb,
        edge_width: f64,
    ) -> Result<(), RenderError> {
        let background = color(self.options.background).filled();
        let edge_style = color(edge).stroke_width(stroke_px(self.options.pt(edge_width)));

        for feature in self.land.iter() {
            for polygon in polygons(&feature.geometry) {
                area.draw(&plotters::element::Polygon::new(
                    self.projection.path(polygon.exterior()),
                    color(fill).filled(),
                ))
                .map_err(draw_err)?;
                // Holes show the background through
                for hole in polygon.interiors() {
                    area.draw(&plotters::element::Polygon::new(
                        self.projection.path(hole),
                        background,
                    ))
                    .map_err(draw_err)?;
                }
            }
            for line in outlines(&feature.geometry) {
                area.draw(&PathElement::new(self.projection.path(&line), edge_style))
                    .map_err(draw_err)?;
            }
        }
        Ok(())
    }

    fn draw_markers(
        &self,
        area: &DrawingArea<BitMapBackend<'_>, Shift>,
        rgb: Rgb,
        size: f64,
        alpha: f64,
    ) -> Result<(), RenderError> {
        // Marker size is an area in points²
        let radius = stroke_px(self.options.pt(size.sqrt() / 2.0));
        let style = color(rgb).mix(alpha).filled();

        for feature in self.points.iter() {
            if let Some(anchor) = feature.anchor() {
                area.draw(&Circle::new(self.projection.to_pixel(anchor), radius, style))
                    .map_err(draw_err)?;
            }
        }
        Ok(())
    }

    fn draw_label(
        &self,
        root: &DrawingArea<BitMapBackend<'_>, Shift>,
        anchor: Coord<f64>,
        slot: usize,
        text: &str,
        rgb: Rgb,
    ) -> Result<(), RenderError> {
        let options = self.options;
        let x = self.layout.plot_width as i32 + options.px(LABEL_INDENT).round() as i32;
        let y = options.px(LABEL_TOP + LABEL_STEP * slot as f64).round() as i32;

        let connector = color(rgb)
            .mix(CONNECTOR_ALPHA)
            .stroke_width(stroke_px(options.pt(CONNECTOR_WIDTH)));
        let gap = options.px(LABEL_INDENT / 4.0).round() as i32;
        root.draw(&PathElement::new(
            vec![self.projection.to_pixel(anchor), (x - gap, y)],
            connector,
        ))
        .map_err(draw_err)?;

        let font = ("sans-serif", options.px(LABEL_FONT))
            .into_font()
            .color(&color(rgb))
            .pos(Pos::new(HPos::Left, VPos::Center));
        root.draw(&Text::new(text.to_string(), (x, y), font))
            .map_err(draw_err)?;

        Ok(())
    }
}

/// Rasterize the instructions and write the image to `options.output`.
///
/// Returns the path that was written.
pub fn render(
    instructions: &[LayerInstruction],
    land: &FeatureCollection,
    points: &FeatureCollection,
    viewport: &Viewport,
    options: &RenderOptions,
) -> Result<PathBuf, RenderError> {
    let label_count = instructions
        .iter()
        .filter(|l| matches!(l.paint, Paint::Label { .. }))
        .count();
    let layout = CanvasLayout::new(viewport, options, label_count)?;
    debug!(
        "Canvas {}x{} px (plot {}x{}) at {} dpi",
        layout.width, layout.height, layout.plot_width, layout.plot_height, options.dpi
    );

    let canvas = Canvas {
        options,
        layout,
        projection: Projection {
            viewport: *viewport,
            width: layout.plot_width as f64,
            height: layout.plot_height as f64,
        },
        land,
        points,
    };

    let mut buffer = vec![0u8; layout.width as usize * layout.height as usize * 3];
    {
        let root =
            BitMapBackend::with_buffer(&mut buffer, (layout.width, layout.height)).into_drawing_area();
        canvas.draw(&root, instructions)?;
        root.present().map_err(draw_err)?;
    }

    write_png(&options.output, buffer, layout.width, layout.height)?;
    info!("Image saved to {}", options.output.display());

    Ok(options.output.clone())
}

/// Encode RGB pixels as PNG and move the file into place
fn write_png(path: &Path, buffer: Vec<u8>, width: u32, height: u32) -> Result<(), RenderError> {
    let image = image::RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| RenderError::Draw("pixel buffer does not match canvas size".to_string()))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let io_err = |source: std::io::Error| RenderError::Io {
        path: path.to_path_buf(),
        source,
    };

    let staged = Builder::new()
        .prefix(".coastglow-")
        .suffix(".png")
        .tempfile_in(dir)
        .map_err(io_err)?;
    image.save_with_format(staged.path(), image::ImageFormat::Png)?;
    staged.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{compose, ComposeOptions, Palette};
    use crate::models::{Feature, OsmType};
    use geo::{line_string, point, polygon};

    fn viewport() -> Viewport {
        Viewport {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 2.0,
            max_y: 1.0,
        }
    }

    fn small_options(output: PathBuf) -> RenderOptions {
        RenderOptions {
            output,
            dpi: 10,
            ..RenderOptions::default()
        }
    }

    #[test]
    fn test_layout_wide_region_without_labels() {
        let options = RenderOptions::default();
        let layout = CanvasLayout::new(&viewport(), &options, 0).unwrap();
        assert_eq!(layout.width, 3600);
        assert_eq!(layout.height, 1800);
        assert_eq!(layout.plot_width, 3600);
    }

    #[test]
    fn test_layout_tall_region() {
        let tall = Viewport {
            min_x: 0.0,
            min_y: -2.0,
            max_x: 1.0,
            max_y: 2.0,
        };
        let layout = CanvasLayout::new(&tall, &RenderOptions::default(), 0).unwrap();
        assert_eq!(layout.height, 3600);
        assert_eq!(layout.width, 900);
    }

    #[test]
    fn test_layout_adds_label_margin() {
        let options = RenderOptions::default();
        let layout = CanvasLayout::new(&viewport(), &options, 2).unwrap();
        assert_eq!(layout.plot_width, 3600);
        assert_eq!(layout.width, 3600 + 900);
        assert_eq!(layout.height, 1800);
    }

    #[test]
    fn test_layout_grows_for_long_label_key() {
        let options = RenderOptions::default();
        let layout = CanvasLayout::new(&viewport(), &options, 100).unwrap();
        // 0.5 in top and bottom plus 100 slots of 0.25 in
        assert_eq!(layout.height, 7800);
    }

    #[test]
    fn test_layout_rejects_degenerate_viewport() {
        let flat = Viewport {
            min_x: 0.0,
            min_y: 1.0,
            max_x: 2.0,
            max_y: 1.0,
        };
        assert!(matches!(
            CanvasLayout::new(&flat, &RenderOptions::default(), 0),
            Err(RenderError::DegenerateViewport)
        ));
    }

    #[test]
    fn test_projection_corners() {
        let projection = Projection {
            viewport: viewport(),
            width: 200.0,
            height: 100.0,
        };
        assert_eq!(projection.to_pixel(Coord { x: 0.0, y: 1.0 }), (0, 0));
        assert_eq!(projection.to_pixel(Coord { x: 2.0, y: 0.0 }), (200, 100));
        assert_eq!(projection.to_pixel(Coord { x: 1.0, y: 0.5 }), (100, 50));
    }

    #[test]
    fn test_outlines_and_polygons() {
        let square: Geometry<f64> =
            polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)]
                .into();
        let line: Geometry<f64> = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)].into();
        let pt: Geometry<f64> = point!(x: 0.0, y: 0.0).into();

        assert_eq!(outlines(&square).len(), 1);
        assert_eq!(polygons(&square).len(), 1);
        assert_eq!(outlines(&line).len(), 1);
        assert!(polygons(&line).is_empty());
        assert!(outlines(&pt).is_empty());
    }

    #[test]
    fn test_render_land_only_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("map.png");

        let land = FeatureCollection::new(vec![Feature::new(
            polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 0.0, y: 1.0)]
                .into(),
            OsmType::Relation,
            1,
            0,
        )]);
        let points = FeatureCollection::empty();
        let layers = compose(&land, &points, &Palette::default(), &ComposeOptions::default());

        let written = render(&layers, &land, &points, &viewport(), &small_options(output.clone()))
            .unwrap();
        assert_eq!(written, output);

        let image = image::open(&output).unwrap().to_rgb8();
        assert_eq!(image.dimensions(), (120, 60));
        // Interior is the dark land fill
        assert_eq!(image.get_pixel(60, 30).0, [0x0a, 0x0a, 0x0a]);
    }

    #[test]
    fn test_render_markers_without_labels() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("points.png");

        let land = FeatureCollection::new(vec![Feature::new(
            line_string![(x: 0.0, y: 0.0), (x: 2.0, y: 1.0)].into(),
            OsmType::Way,
            1,
            0,
        )]);
        let points = FeatureCollection::new(vec![Feature::new(
            point!(x: 1.0, y: 0.5).into(),
            OsmType::Node,
            2,
            0,
        )]);
        let options = ComposeOptions {
            show_labels: false,
            ..ComposeOptions::default()
        };
        let layers = compose(&land, &points, &Palette::default(), &options);

        render(&layers, &land, &points, &viewport(), &small_options(output.clone())).unwrap();

        let image = image::open(&output).unwrap().to_rgb8();
        assert_eq!(image.dimensions(), (120, 60));
        // Core marker is near-white on black
        let center = image.get_pixel(60, 30).0;
        assert!(center.iter().all(|&c| c > 200), "center pixel {:?}", center);
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_render_label_key_in_margin() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("labels.png");

        let land = FeatureCollection::new(vec![Feature::new(
            polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 0.0, y: 1.0)]
                .into(),
            OsmType::Relation,
            1,
            0,
        )]);
        let points = FeatureCollection::new(vec![
            Feature::new(point!(x: 0.5, y: 0.25).into(), OsmType::Node, 2, 0)
                .with_name("Seguin Light"),
            Feature::new(point!(x: 1.5, y: 0.75).into(), OsmType::Node, 3, 1)
                .with_name("Hendricks Head Light"),
        ]);
        let layers = compose(&land, &points, &Palette::default(), &ComposeOptions::default());
        let options = RenderOptions {
            output: output.clone(),
            dpi: 30,
            ..RenderOptions::default()
        };

        render(&layers, &land, &points, &viewport(), &options).unwrap();

        let layout = CanvasLayout::new(&viewport(), &options, 2).unwrap();
        assert_eq!(layout.plot_width, 360);
        assert_eq!(layout.width, layout.plot_width + 90);

        let image = image::open(&output).unwrap().to_rgb8();
        assert_eq!(image.dimensions(), (layout.width, layout.height));
        let lit_in_margin = (layout.plot_width..layout.width)
            .flat_map(|x| (0..layout.height).map(move |y| (x, y)))
            .any(|(x, y)| image.get_pixel(x, y).0 != [0, 0, 0]);
        assert!(lit_in_margin, "label key left the margin black");
    }

    #[test]
    fn test_degenerate_viewport_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("never.png");
        let flat = Viewport {
            min_x: 1.0,
            min_y: 1.0,
            max_x: 1.0,
            max_y: 1.0,
        };

        let result = render(
            &[],
            &FeatureCollection::empty(),
            &FeatureCollection::empty(),
            &flat,
            &small_options(output.clone()),
        );
        assert!(matches!(result, Err(RenderError::DegenerateViewport)));
        assert!(!output.exists());
    }
}
