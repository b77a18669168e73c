// Filled contour layer and its colour scale

use na::DMatrix;
use ndarray::Array1;
use plotters::prelude::*;

use crate::{
    field::{ContourQuantity, GridAxes, ObstacleGeometry, ScalarField, StructuredField},
    render::{Canvas, Layer, RenderError, color::ColorMap, draw_err},
};

/// Interpolation weight below which a pixel is left unshaded
const MIN_WEIGHT: f64 = 1e-12;

/// Colour scale bar geometry, relative to the legend strip, in pixels at
/// 100 dpi.
const BAR_GAP: f64 = 12.;
const BAR_WIDTH: f64 = 18.;

/// Equal-width value bands spanning the shaded range.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorScale {
    /// Band boundaries, ascending; band `k` covers `bounds[k]..bounds[k + 1]`
    bounds: Vec<f64>,
    colormap: ColorMap,
}

impl ColorScale {
    /// Split `min..max` into `levels` bands. A degenerate range yields a
    /// single band.
    pub fn new(min: f64, max: f64, levels: usize, colormap: ColorMap) -> Self {
        let magnitude = min.abs().max(max.abs()).max(1.);
        let bounds = if max - min <= f64::EPSILON * magnitude {
            vec![min, max]
        } else {
            Array1::linspace(min, max, levels.max(1) + 1).to_vec()
        };

        Self { bounds, colormap }
    }

    pub fn bands(&self) -> usize {
        self.bounds.len() - 1
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    pub fn min(&self) -> f64 {
        self.bounds[0]
    }

    pub fn max(&self) -> f64 {
        self.bounds[self.bounds.len() - 1]
    }

    /// Band holding `value`. Values outside the range land in the end bands.
    pub fn band_of(&self, value: f64) -> usize {
        let interior = &self.bounds[1..self.bounds.len() - 1];
        interior.partition_point(|&b| b <= value)
    }

    /// Fill colour of band `k`, taken at the band's centre.
    pub fn band_color(&self, k: usize) -> RGBColor {
        self.colormap
            .color_at((k as f64 + 0.5) / self.bands() as f64)
    }
}

/// Pixel placement of the colour scale bar inside the legend strip.
pub struct ColorBar {
    pub x: (i32, i32),

    /// (top, bottom)
    pub y: (i32, i32),
}

impl ColorBar {
    /// Place the bar beside the plotting area, spanning its full height.
    pub fn place(canvas: &Canvas<'_, '_>) -> Self {
        let scale = canvas.px_per_pt * 72. / 100.;
        let (_, base_y) = canvas.legend.get_base_pixel();

        let left = (BAR_GAP * scale).round() as i32;
        let width = ((BAR_WIDTH * scale).round() as i32).max(1);

        Self {
            x: (left, left + width),
            y: (
                canvas.frame.pixel_y.start - base_y,
                canvas.frame.pixel_y.end - base_y,
            ),
        }
    }

    /// Pixel row of `value` on a bar showing `scale`.
    pub fn row_of(&self, scale: &ColorScale, value: f64) -> i32 {
        let span = scale.max() - scale.min();
        let t = if span > 0. {
            (value - scale.min()) / span
        } else {
            0.5
        };
        let (top, bottom) = self.y;
        bottom - (t * (bottom - top) as f64).round() as i32
    }
}

/// Filled contour of a scalar over the grid.
///
/// Values between nodes are interpolated bilinearly. Nodes inside the
/// obstacle are left out of the interpolation weights, and the colour range
/// is taken from the remaining nodes.
pub struct ContourLayer<'a> {
    values: &'a ScalarField,
    axes: GridAxes,
    mask: DMatrix<bool>,
    obstacle: ObstacleGeometry,
    scale: ColorScale,
}

impl<'a> ContourLayer<'a> {
    pub fn new(
        field: &'a StructuredField,
        obstacle: &ObstacleGeometry,
        quantity: ContourQuantity,
        levels: usize,
        colormap: ColorMap,
    ) -> Result<Self, RenderError> {
        let values = field.scalar(quantity).ok_or_else(|| {
            RenderError::InvalidSetting(format!(
                "field carries no values for {}",
                quantity.legend_label()
            ))
        })?;

        let mask = field.obstacle_mask(obstacle);
        let (min, max) = value_range(values, &mask);

        Ok(Self {
            values,
            axes: field.axes(),
            mask,
            obstacle: *obstacle,
            scale: ColorScale::new(min, max, levels, colormap),
        })
    }

    pub fn scale(&self) -> &ColorScale {
        &self.scale
    }

    /// Interpolated value at `(x, y)`, or `None` outside the grid or where
    /// every surrounding node is masked.
    pub fn sample(&self, x: f64, y: f64) -> Option<f64> {
        let ((r, tr), (c, tc)) = self.axes.locate(x, y)?;

        let corners = [
            (r, c, (1. - tr) * (1. - tc)),
            (r, c + 1, (1. - tr) * tc),
            (r + 1, c, tr * (1. - tc)),
            (r + 1, c + 1, tr * tc),
        ];

        let (mut sum, mut weight) = (0., 0.);
        for (row, col, w) in corners {
            if self.mask[(row, col)] {
                continue;
            }
            sum += w * self.values[(row, col)];
            weight += w;
        }

        (weight > MIN_WEIGHT).then(|| sum / weight)
    }

    /// Contour band at `(x, y)`; `None` where nothing is shaded.
    pub fn band_at(&self, x: f64, y: f64) -> Option<usize> {
        if self.obstacle.contains(x, y) {
            return None;
        }
        self.sample(x, y).map(|v| self.scale.band_of(v))
    }
}

/// Min and max over unmasked values, falling back to all values when the
/// mask covers everything.
fn value_range(values: &ScalarField, mask: &DMatrix<bool>) -> (f64, f64) {
    let fold = |include: &dyn Fn(usize) -> bool| {
        values
            .iter()
            .enumerate()
            .filter(|(k, _)| include(*k))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, &v)| {
                (lo.min(v), hi.max(v))
            })
    };

    let mask = mask.as_slice();
    let (lo, hi) = fold(&|k| !mask[k]);
    if lo <= hi { (lo, hi) } else { fold(&|_| true) }
}

impl Layer for ContourLayer<'_> {
    fn draw(&self, canvas: &mut Canvas<'_, '_>) -> Result<(), RenderError> {
        let area = canvas.chart.plotting_area().strip_coord_spec();
        let (w, h) = canvas.frame.size();

        for j in 0..h {
            for i in 0..w {
                let (x, y) = canvas.frame.pixel_center(i, j);
                if let Some(band) = self.band_at(x, y) {
                    area.draw_pixel((i, j), &self.scale.band_color(band))
                        .map_err(draw_err)?;
                }
            }
        }

        // colour scale swatches; ticks and label belong to the frame
        let bar = ColorBar::place(canvas);
        for k in 0..self.scale.bands() {
            let top = bar.row_of(&self.scale, self.scale.bounds[k + 1]);
            let bottom = bar.row_of(&self.scale, self.scale.bounds[k]);
            let (top, bottom) = if self.scale.bands() == 1 {
                bar.y
            } else {
                (top, bottom)
            };

            canvas
                .legend
                .draw(&Rectangle::new(
                    [(bar.x.0, top), (bar.x.1, bottom)],
                    self.scale.band_color(k).filled(),
                ))
                .map_err(draw_err)?;
        }

        Ok(())
    }
}
