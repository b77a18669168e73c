// Contains post-processors run after the figures are written

pub mod display;

use tracing::{info, warn};

use crate::{preprocessing::RenderInput, render::RenderedFigure};

/// Show the last written figure when the input asks for it. Failures here
/// never affect the written images.
pub fn postprocess(render_input: &RenderInput, figures: &[RenderedFigure]) {
    if !render_input.display {
        return;
    }

    let Some(figure) = figures.last() else {
        warn!("Nothing to display");
        return;
    };

    if figures.len() > 1 {
        info!("Displaying the last of {} figures", figures.len());
    }

    _ = display::show_figure(&figure.image, &render_input.settings.title)
        .inspect_err(|err| warn!("Unable to display figure: {:?}", err));
}
