// Decimated vector (quiver) layer

use plotters::prelude::*;

use crate::{
    field::StructuredField,
    render::{Canvas, Layer, RenderError, draw_err},
};

/// Share of a decimated cell spanned by the longest arrow
const ARROW_FILL: f64 = 0.9;

/// Arrow head length as a share of the arrow
const HEAD_LENGTH: f64 = 0.3;

/// Arrow head half-width as a share of the head length
const HEAD_HALF_WIDTH: f64 = 0.4;

/// Shaft width in points
const SHAFT_WIDTH_PT: f64 = 0.75;

/// One sampled vector of the field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Arrow {
    pub row: usize,
    pub col: usize,

    /// Node position in data coordinates
    pub tail: (f64, f64),

    /// (u, v) at the node
    pub vector: (f64, f64),
}

impl Arrow {
    pub fn magnitude(&self) -> f64 {
        self.vector.0.hypot(self.vector.1)
    }
}

/// Grid indices kept by decimating `rows x cols` with `stride`: every
/// `stride`-th row and column starting from zero.
pub fn decimate(
    (rows, cols): (usize, usize),
    stride: usize,
) -> impl Iterator<Item = (usize, usize)> {
    let stride = stride.max(1);
    (0..rows)
        .step_by(stride)
        .flat_map(move |r| (0..cols).step_by(stride).map(move |c| (r, c)))
}

/// Arrows of `(u, v)` on the decimated grid.
pub struct QuiverLayer {
    arrows: Vec<Arrow>,

    /// Data units of arrow length per unit of velocity
    length_scale: f64,
    color: RGBColor,
}

impl QuiverLayer {
    pub fn new(field: &StructuredField, stride: usize, color: RGBColor) -> Self {
        let arrows: Vec<Arrow> = decimate(field.shape(), stride)
            .map(|(row, col)| Arrow {
                row,
                col,
                tail: (field.x[(row, col)], field.y[(row, col)]),
                vector: (field.u[(row, col)], field.v[(row, col)]),
            })
            .collect();

        let (rows, cols) = field.shape();
        let (xr, yr) = field.extent();
        let cell = ((xr.end - xr.start) / (cols.max(2) - 1) as f64)
            .min((yr.end - yr.start) / (rows.max(2) - 1) as f64)
            * stride.max(1) as f64;

        let longest = arrows.iter().map(Arrow::magnitude).fold(0., f64::max);
        let length_scale = if longest > 0. {
            ARROW_FILL * cell / longest
        } else {
            0.
        };

        Self {
            arrows,
            length_scale,
            color,
        }
    }

    pub fn arrows(&self) -> &[Arrow] {
        &self.arrows
    }

    /// Shaft end point and head triangle of `arrow`, in data coordinates.
    /// `None` for zero-length arrows.
    fn geometry(&self, arrow: &Arrow) -> Option<((f64, f64), [(f64, f64); 3])> {
        let (x0, y0) = arrow.tail;
        let (dx, dy) = (
            arrow.vector.0 * self.length_scale,
            arrow.vector.1 * self.length_scale,
        );
        let len = dx.hypot(dy);
        if len <= 0. {
            return None;
        }

        let tip = (x0 + dx, y0 + dy);
        let (ux, uy) = (dx / len, dy / len);
        let head = len * HEAD_LENGTH;
        let half = head * HEAD_HALF_WIDTH;

        let base = (tip.0 - ux * head, tip.1 - uy * head);
        let triangle = [
            tip,
            (base.0 - uy * half, base.1 + ux * half),
            (base.0 + uy * half, base.1 - ux * half),
        ];

        Some((base, triangle))
    }
}

impl Layer for QuiverLayer {
    fn draw(&self, canvas: &mut Canvas<'_, '_>) -> Result<(), RenderError> {
        let stroke = ((SHAFT_WIDTH_PT * canvas.px_per_pt).round() as u32).max(1);
        let shaft_style = self.color.stroke_width(stroke);
        let head_style = self.color.filled();

        for arrow in &self.arrows {
            let Some((base, triangle)) = self.geometry(arrow) else {
                continue;
            };

            canvas
                .chart
                .draw_series(std::iter::once(PathElement::new(
                    vec![arrow.tail, base],
                    shaft_style,
                )))
                .map_err(draw_err)?;
            canvas
                .chart
                .draw_series(std::iter::once(Polygon::new(triangle.to_vec(), head_style)))
                .map_err(draw_err)?;
        }

        Ok(())
    }
}
