// Composes a structured flow field into a single raster figure

pub mod color;
pub mod contour;
pub mod frame;
pub mod obstacle;
pub mod quiver;

use std::{
    ffi::OsString,
    fmt::Display,
    fs,
    ops::Range,
    path::{Path, PathBuf},
};

use image::{ImageError, ImageFormat, RgbImage};
use num_traits::ToPrimitive;
use plotters::{
    coord::{Shift, types::RangedCoordf64},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    field::{ContourQuantity, ObstacleGeometry, StructuredField},
    render::{
        color::{ColorMap, parse_color},
        contour::ContourLayer,
        frame::FrameDecoration,
        obstacle::ObstacleLayer,
        quiver::QuiverLayer,
    },
};

/// Layout sizes in pixels at 100 dpi; scaled with the configured dpi.
const TITLE_HEIGHT: f64 = 40.;
const MARGIN: f64 = 15.;
const X_LABEL_AREA: f64 = 45.;
const Y_LABEL_AREA: f64 = 55.;
const LEGEND_WIDTH: f64 = 130.;

/// Smallest plotting area (either axis) a figure must leave after layout.
const MIN_PLOT_PIXELS: u32 = 16;

/// Largest figure, in pixels, the in-memory buffer may hold
const MAX_FIGURE_PIXELS: u64 = 64_000_000;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("field has no area to draw ({rows}x{cols} nodes)")]
    EmptyField { rows: usize, cols: usize },

    #[error("unable to write figure to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: ImageError,
    },

    #[error("invalid render setting: {0}")]
    InvalidSetting(String),

    #[error("unknown colour `{0}`")]
    UnknownColor(String),

    #[error("drawing failed: {0}")]
    Draw(String),
}

pub(crate) fn draw_err<E: Display>(err: E) -> RenderError {
    RenderError::Draw(err.to_string())
}

/// Rendering configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RenderSettings {
    /// Figure size (width, height) in inches
    pub figure_size: (f64, f64),

    /// Number of filled contour bands
    pub contour_levels: usize,

    pub colormap: ColorMap,

    /// Draw an arrow at every `quiver_stride`-th row and column
    pub quiver_stride: usize,

    pub quiver_color: String,

    pub obstacle_color: String,

    /// Output density in dots per inch
    pub dpi: u32,

    pub title: String,

    /// (x label, y label)
    pub axis_labels: (String, String),

    /// Scalar shaded by the contour layer
    pub quantity: ContourQuantity,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            figure_size: (12., 6.),
            contour_levels: 20,
            colormap: ColorMap::Jet,
            quiver_stride: 3,
            quiver_color: "white".into(),
            obstacle_color: "black".into(),
            dpi: 150,
            title: ContourQuantity::Speed.default_title().into(),
            axis_labels: ("x".into(), "y".into()),
            quantity: ContourQuantity::Speed,
        }
    }
}

impl RenderSettings {
    /// Output image size in pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        let to_px = |inches: f64| {
            (inches * self.dpi as f64)
                .round()
                .to_u32()
                .unwrap_or_default()
        };
        (to_px(self.figure_size.0), to_px(self.figure_size.1))
    }

    /// Pixels per typographic point at the configured dpi.
    pub fn px_per_pt(&self) -> f64 {
        self.dpi as f64 / 72.
    }

    fn layout(&self) -> Layout {
        let scale = self.dpi as f64 / 100.;
        let px = |base: f64| (base * scale).round().to_u32().unwrap_or_default();

        Layout {
            title: px(TITLE_HEIGHT),
            margin: px(MARGIN),
            x_label_area: px(X_LABEL_AREA),
            y_label_area: px(Y_LABEL_AREA),
            legend: px(LEGEND_WIDTH),
        }
    }
}

/// Pixel sizes of the fixed figure regions.
#[derive(Clone, Copy, Debug)]
struct Layout {
    title: u32,
    margin: u32,
    x_label_area: u32,
    y_label_area: u32,
    legend: u32,
}

impl Layout {
    /// Pixel size left for the plotting area in a figure of `size`.
    fn plot_room(&self, (width, height): (u32, u32)) -> (i64, i64) {
        let w = width as i64
            - self.legend as i64
            - 2 * self.margin as i64
            - self.y_label_area as i64;
        let h = height as i64
            - self.title as i64
            - 2 * self.margin as i64
            - self.x_label_area as i64;
        (w, h)
    }
}

/// Placement of the plotting area in the image and the data window it shows.
#[derive(Clone, Debug, PartialEq)]
pub struct PlotFrame {
    pub x_range: Range<f64>,
    pub y_range: Range<f64>,

    /// Absolute pixel columns covered by the plotting area
    pub pixel_x: Range<i32>,

    /// Absolute pixel rows covered by the plotting area
    pub pixel_y: Range<i32>,
}

impl PlotFrame {
    /// Plotting area size in pixels
    pub fn size(&self) -> (i32, i32) {
        (
            self.pixel_x.end - self.pixel_x.start,
            self.pixel_y.end - self.pixel_y.start,
        )
    }

    /// Data units covered by one pixel along (x, y)
    pub fn units_per_pixel(&self) -> (f64, f64) {
        let (w, h) = self.size();
        (
            (self.x_range.end - self.x_range.start) / w as f64,
            (self.y_range.end - self.y_range.start) / h as f64,
        )
    }

    /// Data coordinates at the centre of the plotting-area pixel `(i, j)`,
    /// counted from the area's top-left corner.
    pub fn pixel_center(&self, i: i32, j: i32) -> (f64, f64) {
        let (upp_x, upp_y) = self.units_per_pixel();
        (
            self.x_range.start + (i as f64 + 0.5) * upp_x,
            self.y_range.end - (j as f64 + 0.5) * upp_y,
        )
    }
}

/// Widen the shorter data range so one data unit spans the same number of
/// pixels on both axes.
fn equal_aspect(
    x: Range<f64>,
    y: Range<f64>,
    (width, height): (u32, u32),
) -> (Range<f64>, Range<f64>) {
    let (w, h) = (width.max(1) as f64, height.max(1) as f64);
    let per_px = ((x.end - x.start) / w).max((y.end - y.start) / h);

    let widen = |r: Range<f64>, px: f64| {
        let mid = (r.start + r.end) / 2.;
        let half = per_px * px / 2.;
        (mid - half)..(mid + half)
    };

    (widen(x, w), widen(y, h))
}

pub type PlotChart<'a, 'b> =
    ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// The owned drawing surface of one figure, handed to each layer in turn.
pub struct Canvas<'a, 'b> {
    /// Strip above the chart holding the title
    pub header: DrawingArea<BitMapBackend<'b>, Shift>,

    /// Chart in data coordinates
    pub chart: PlotChart<'a, 'b>,

    /// Strip right of the chart holding the colour scale
    pub legend: DrawingArea<BitMapBackend<'b>, Shift>,

    pub frame: PlotFrame,

    /// Pixels per typographic point
    pub px_per_pt: f64,
}

/// One visual layer of the figure. Layers are drawn in order, each on top of
/// the previous.
pub trait Layer {
    fn draw(&self, canvas: &mut Canvas<'_, '_>) -> Result<(), RenderError>;
}

/// A composed figure held in memory until written.
pub struct RenderedFigure {
    pub image: RgbImage,
    pub frame: PlotFrame,
}

impl RenderedFigure {
    /// Encode the figure to `path`. The format follows the extension (PNG
    /// when unknown). The image is staged next to the target and renamed into
    /// place, so a failed write leaves no partial file behind.
    pub fn write(&self, path: &Path) -> Result<(), RenderError> {
        let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Png);
        let staging = staging_path(path);

        let written = self
            .image
            .save_with_format(&staging, format)
            .and_then(|_| fs::rename(&staging, path).map_err(ImageError::IoError));

        if let Err(source) = written {
            _ = fs::remove_file(&staging);
            return Err(RenderError::Write {
                path: path.to_path_buf(),
                source,
            });
        }

        info!(
            "Wrote {}x{} figure to {}",
            self.image.width(),
            self.image.height(),
            path.display()
        );
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".partial");
    path.with_file_name(name)
}

/// Renders structured fields with a fixed set of settings. Holds no drawing
/// state between renders.
pub struct FieldRenderer {
    settings: RenderSettings,
    quiver_color: RGBColor,
    obstacle_color: RGBColor,
}

impl FieldRenderer {
    /// Validate `settings` and build a renderer.
    pub fn new(settings: RenderSettings) -> Result<Self, RenderError> {
        let invalid = |msg: &str| Err(RenderError::InvalidSetting(msg.to_string()));

        if settings.contour_levels == 0 {
            return invalid("contour_levels must be at least 1");
        }
        if settings.quiver_stride == 0 {
            return invalid("quiver_stride must be at least 1");
        }
        if settings.dpi == 0 {
            return invalid("dpi must be at least 1");
        }
        let (fw, fh) = settings.figure_size;
        if !(fw.is_finite() && fh.is_finite() && fw > 0. && fh > 0.) {
            return invalid("figure_size must be positive");
        }

        let (pw, ph) = settings.pixel_size();
        if pw as u64 * ph as u64 > MAX_FIGURE_PIXELS {
            return invalid("figure_size at this dpi exceeds the largest supported image");
        }

        let (w, h) = settings.layout().plot_room((pw, ph));
        if w < MIN_PLOT_PIXELS as i64 || h < MIN_PLOT_PIXELS as i64 {
            return invalid("figure_size is too small for the plot at this dpi");
        }

        let color = |name: &str| {
            parse_color(name).ok_or_else(|| RenderError::UnknownColor(name.to_string()))
        };

        Ok(Self {
            quiver_color: color(&settings.quiver_color)?,
            obstacle_color: color(&settings.obstacle_color)?,
            settings,
        })
    }

    /// Compose the contour, quiver, obstacle and frame layers into a figure.
    pub fn render(
        &self,
        field: &StructuredField,
        obstacle: &ObstacleGeometry,
    ) -> Result<RenderedFigure, RenderError> {
        ensure_area(field)?;
        if !obstacle.is_valid() {
            return Err(RenderError::InvalidSetting(format!(
                "obstacle needs a finite centre and a finite, positive radius (got {:?}, r = {})",
                obstacle.center, obstacle.radius
            )));
        }

        let contour = ContourLayer::new(
            field,
            obstacle,
            self.settings.quantity,
            self.settings.contour_levels,
            self.settings.colormap,
        )?;
        let quiver = QuiverLayer::new(field, self.settings.quiver_stride, self.quiver_color);
        let body = ObstacleLayer::new(*obstacle, self.obstacle_color);
        let decoration = FrameDecoration::new(&self.settings, contour.scale().clone());

        self.compose(field, &[&contour, &quiver, &body, &decoration])
    }

    /// Draw `layers` in order onto a fresh figure framing `field`.
    pub fn compose(
        &self,
        field: &StructuredField,
        layers: &[&dyn Layer],
    ) -> Result<RenderedFigure, RenderError> {
        ensure_area(field)?;

        let (width, height) = self.settings.pixel_size();
        let layout = self.settings.layout();
        let mut buffer = vec![0u8; width as usize * height as usize * 3];

        let frame = {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            root.fill(&WHITE).map_err(draw_err)?;

            let (header, rest) = root.split_vertically(layout.title);
            let (body, legend) = rest.split_horizontally(width - layout.legend);

            let (x_range, y_range) = field.extent();
            let probe = build_chart(&body, &layout, x_range.clone(), y_range.clone())?;
            let (x_range, y_range) =
                equal_aspect(x_range, y_range, probe.plotting_area().dim_in_pixel());
            drop(probe);

            let chart = build_chart(&body, &layout, x_range.clone(), y_range.clone())?;
            let (pixel_x, pixel_y) = chart.plotting_area().get_pixel_range();
            let frame = PlotFrame {
                x_range,
                y_range,
                pixel_x,
                pixel_y,
            };
            debug!("Plot frame: {:?}", frame);

            let mut canvas = Canvas {
                header,
                chart,
                legend,
                frame,
                px_per_pt: self.settings.px_per_pt(),
            };

            for layer in layers {
                layer.draw(&mut canvas)?;
            }

            root.present().map_err(draw_err)?;
            canvas.frame
        };

        let image = RgbImage::from_raw(width, height, buffer)
            .ok_or_else(|| RenderError::Draw("figure buffer has the wrong size".into()))?;

        Ok(RenderedFigure { image, frame })
    }
}

fn build_chart<'a, 'b>(
    area: &'a DrawingArea<BitMapBackend<'b>, Shift>,
    layout: &Layout,
    x: Range<f64>,
    y: Range<f64>,
) -> Result<PlotChart<'a, 'b>, RenderError> {
    ChartBuilder::on(area)
        .margin(layout.margin)
        .x_label_area_size(layout.x_label_area)
        .y_label_area_size(layout.y_label_area)
        .build_cartesian_2d(x, y)
        .map_err(draw_err)
}

fn ensure_area(field: &StructuredField) -> Result<(), RenderError> {
    if field.has_area() {
        return Ok(());
    }

    let (rows, cols) = field.shape();
    Err(RenderError::EmptyField { rows, cols })
}
