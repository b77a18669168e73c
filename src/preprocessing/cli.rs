use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use crate::{
    field::{ContourQuantity, GridShape, ObstacleGeometry},
    preprocessing::{ConfigError, RenderInput},
    render::{RenderSettings, color::ColorMap},
};

// Raw, CLI input
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    #[arg(
        help = "CSV tables of flow samples to render.",
        default_value = "flow_field_final.csv"
    )]
    inputs: Vec<PathBuf>,

    #[arg(
        short,
        long,
        help = "Where to write the figure. With several inputs, each figure is named <stem>_<input stem>.<ext>.",
        default_value = "flow_field.png"
    )]
    output: PathBuf,

    #[arg(long, help = "An input file with pre-loaded parameters.")]
    input_json: Option<PathBuf>,

    #[arg(long, help = "Optional path to save the input file to.")]
    input_json_savepath: Option<PathBuf>,

    #[arg(long, help = "Grid columns (samples along x).", default_value = "60")]
    nx: usize,

    #[arg(long, help = "Grid rows (samples along y).", default_value = "30")]
    ny: usize,

    #[arg(
        long,
        help = "Reshape without checking that samples are in row-major grid order."
    )]
    trust_ordering: bool,

    #[arg(long, help = "Obstacle centre x.", default_value = "0.0")]
    obstacle_x: f64,

    #[arg(long, help = "Obstacle centre y.", default_value = "0.0")]
    obstacle_y: f64,

    #[arg(long, help = "Obstacle radius.", default_value = "0.5")]
    obstacle_radius: f64,

    #[arg(long, help = "Number of filled contour bands.", default_value = "20")]
    levels: usize,

    #[arg(long, help = "Contour colour map.", value_enum, default_value = "jet")]
    colormap: ColorMap,

    #[arg(
        long,
        help = "Scalar shaded by the contour.",
        value_enum,
        default_value = "speed"
    )]
    quantity: ContourQuantity,

    #[arg(
        long,
        help = "Draw an arrow at every n-th row and column.",
        default_value = "3"
    )]
    stride: usize,

    #[arg(long, help = "Arrow colour (name or #rrggbb).", default_value = "white")]
    quiver_color: String,

    #[arg(
        long,
        help = "Obstacle colour (name or #rrggbb).",
        default_value = "black"
    )]
    obstacle_color: String,

    #[arg(long, help = "Figure width in inches.", default_value = "12.0")]
    width: f64,

    #[arg(long, help = "Figure height in inches.", default_value = "6.0")]
    height: f64,

    #[arg(long, help = "Output resolution in dots per inch.", default_value = "150")]
    dpi: u32,

    #[arg(long, help = "Figure title. Defaults to one matching --quantity.")]
    title: Option<String>,

    #[arg(long, help = "Horizontal axis label.", default_value = "x")]
    x_label: String,

    #[arg(long, help = "Vertical axis label.", default_value = "y")]
    y_label: String,

    #[arg(
        short,
        long,
        help = "Whether the figure should be shown in a window after writing."
    )]
    display: bool,
}

impl CliArgs {
    pub fn crate_input(&self) -> Result<RenderInput, ConfigError> {
        // if the input file is supplied, just use that
        if let Some(input_filepath) = &self.input_json {
            let loaded_input = RenderInput::from_file(input_filepath)?;
            self.save_input(&loaded_input)?;
            return Ok(loaded_input);
        }

        // otherwise, build the input from the other arguments
        let title = self
            .title
            .clone()
            .unwrap_or_else(|| self.quantity.default_title().to_string());

        let input = RenderInput {
            inputs: self.inputs.clone(),
            output: self.output.clone(),
            grid: GridShape::new(self.nx, self.ny),
            trust_ordering: self.trust_ordering,
            obstacle: ObstacleGeometry::new((self.obstacle_x, self.obstacle_y), self.obstacle_radius),
            settings: RenderSettings {
                figure_size: (self.width, self.height),
                contour_levels: self.levels,
                colormap: self.colormap,
                quiver_stride: self.stride,
                quiver_color: self.quiver_color.clone(),
                obstacle_color: self.obstacle_color.clone(),
                dpi: self.dpi,
                title,
                axis_labels: (self.x_label.clone(), self.y_label.clone()),
                quantity: self.quantity,
            },
            display: self.display,
        };

        self.save_input(&input)?;
        Ok(input)
    }

    fn save_input(&self, input: &RenderInput) -> Result<(), ConfigError> {
        match &self.input_json_savepath {
            Some(path) => input.save(path),
            None => {
                info!("No input savepath given; input file will not be saved");
                Ok(())
            }
        }
    }
}
