// Opaque overlay of the solid body

use std::f64::consts::PI;

use plotters::prelude::*;

use crate::{
    field::ObstacleGeometry,
    render::{Canvas, Layer, RenderError, draw_err},
};

/// Vertices of the polygon standing in for the disc
const SEGMENTS: usize = 360;

pub struct ObstacleLayer {
    geometry: ObstacleGeometry,
    color: RGBColor,
}

impl ObstacleLayer {
    pub fn new(geometry: ObstacleGeometry, color: RGBColor) -> Self {
        Self { geometry, color }
    }

    /// Polygon circumscribing the disc, so every point of the disc lies
    /// inside it.
    pub fn outline(&self) -> Vec<(f64, f64)> {
        let (cx, cy) = self.geometry.center;
        let r = self.geometry.radius / (PI / SEGMENTS as f64).cos();

        (0..SEGMENTS)
            .map(|k| {
                let theta = 2. * PI * k as f64 / SEGMENTS as f64;
                (cx + r * theta.cos(), cy + r * theta.sin())
            })
            .collect()
    }
}

impl Layer for ObstacleLayer {
    fn draw(&self, canvas: &mut Canvas<'_, '_>) -> Result<(), RenderError> {
        canvas
            .chart
            .draw_series(std::iter::once(Polygon::new(
                self.outline(),
                self.color.filled(),
            )))
            .map_err(draw_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outline_encloses_disc() {
        let geometry = ObstacleGeometry::new((1., -2.), 0.5);
        let layer = ObstacleLayer::new(geometry, BLACK);
        let outline = layer.outline();

        assert_eq!(outline.len(), SEGMENTS);

        // every edge midpoint sits on or outside the circle
        for (k, a) in outline.iter().enumerate() {
            let b = outline[(k + 1) % outline.len()];
            let mid = ((a.0 + b.0) / 2. - 1., (a.1 + b.1) / 2. + 2.);
            assert!(mid.0.hypot(mid.1) >= 0.5 - 1e-12);
        }
    }
}
