// Title, axes and colour scale annotations

use plotters::{
    prelude::*,
    style::{
        FontTransform,
        text_anchor::{HPos, Pos, VPos},
    },
};

use crate::render::{
    Canvas, Layer, RenderError, RenderSettings,
    contour::{ColorBar, ColorScale},
    draw_err,
};

const FONT: &str = "sans-serif";

/// Font sizes in points
const TITLE_PT: f64 = 14.;
const LABEL_PT: f64 = 11.;
const TICK_PT: f64 = 9.;

/// Most tick labels printed beside the colour scale
const MAX_LEGEND_TICKS: usize = 6;

/// Tick length and label gap in points
const TICK_LEN_PT: f64 = 3.;
const TICK_GAP_PT: f64 = 2.;

pub struct FrameDecoration {
    title: String,
    axis_labels: (String, String),
    legend_label: &'static str,
    scale: ColorScale,
}

impl FrameDecoration {
    pub fn new(settings: &RenderSettings, scale: ColorScale) -> Self {
        Self {
            title: settings.title.clone(),
            axis_labels: settings.axis_labels.clone(),
            legend_label: settings.quantity.legend_label(),
            scale,
        }
    }

    pub fn legend_label(&self) -> &str {
        self.legend_label
    }

    /// Band boundaries labelled on the colour scale: evenly thinned to at
    /// most `MAX_LEGEND_TICKS`, always including both ends.
    pub fn legend_ticks(&self) -> Vec<f64> {
        let bounds = self.scale.bounds();
        let bands = self.scale.bands();
        if bounds[0] == bounds[bands] {
            return vec![bounds[0]];
        }

        let step = bands.div_ceil(MAX_LEGEND_TICKS - 1).max(1);
        let mut ticks: Vec<f64> = bounds.iter().copied().step_by(step).collect();
        if (bands % step) != 0 {
            ticks.push(bounds[bands]);
        }
        ticks
    }
}

/// Format a tick value with enough decimals to tell neighbouring ticks apart.
fn format_tick(value: f64, span: f64) -> String {
    let decimals = if span > 0. {
        (2 - span.log10().floor() as i32).clamp(0, 6) as usize
    } else {
        2
    };
    format!("{value:.decimals$}")
}

impl Layer for FrameDecoration {
    fn draw(&self, canvas: &mut Canvas<'_, '_>) -> Result<(), RenderError> {
        let pt = canvas.px_per_pt;

        // title
        let (w, h) = canvas.header.dim_in_pixel();
        let title_style = (FONT, TITLE_PT * pt)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        canvas
            .header
            .draw(&Text::new(
                self.title.as_str(),
                (w as i32 / 2, h as i32 / 2),
                title_style,
            ))
            .map_err(draw_err)?;

        // axes
        canvas
            .chart
            .configure_mesh()
            .disable_mesh()
            .x_desc(self.axis_labels.0.as_str())
            .y_desc(self.axis_labels.1.as_str())
            .label_style((FONT, TICK_PT * pt).into_font())
            .axis_desc_style((FONT, LABEL_PT * pt).into_font())
            .draw()
            .map_err(draw_err)?;

        // colour scale
        let bar = ColorBar::place(canvas);
        let tick_len = (TICK_LEN_PT * pt).round() as i32;
        let gap = (TICK_GAP_PT * pt).round() as i32;
        let span = self.scale.max() - self.scale.min();

        canvas
            .legend
            .draw(&Rectangle::new(
                [(bar.x.0, bar.y.0), (bar.x.1, bar.y.1)],
                BLACK.stroke_width(1),
            ))
            .map_err(draw_err)?;

        let tick_style = (FONT, TICK_PT * pt)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Left, VPos::Center));
        let mut label_right = bar.x.1;

        for tick in self.legend_ticks() {
            let row = bar.row_of(&self.scale, tick);
            let text = format_tick(tick, span);

            canvas
                .legend
                .draw(&PathElement::new(
                    vec![(bar.x.1, row), (bar.x.1 + tick_len, row)],
                    BLACK.stroke_width(1),
                ))
                .map_err(draw_err)?;

            let x = bar.x.1 + tick_len + gap;
            let (text_w, _) = canvas
                .legend
                .estimate_text_size(&text, &tick_style)
                .map_err(draw_err)?;
            label_right = label_right.max(x + text_w as i32);

            canvas
                .legend
                .draw(&Text::new(text, (x, row), tick_style.clone()))
                .map_err(draw_err)?;
        }

        let label_style = (FONT, LABEL_PT * pt)
            .into_font()
            .transform(FontTransform::Rotate270)
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Top));
        let middle = (bar.y.0 + bar.y.1) / 2;
        canvas
            .legend
            .draw(&Text::new(
                self.legend_label,
                (label_right + 2 * gap, middle),
                label_style,
            ))
            .map_err(draw_err)?;

        Ok(())
    }
}
