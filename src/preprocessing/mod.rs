use std::{
    io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    field::{ContourQuantity, GridShape, ObstacleGeometry},
    pipeline::RenderJob,
    preprocessing::grid_loader::LoadOptions,
    render::RenderSettings,
};

pub mod cli;
pub mod grid_loader;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("input file {0:?} does not exist")]
    NotFound(PathBuf),

    #[error("input file {0:?} is a directory")]
    IsDirectory(PathBuf),

    #[error("unable to access input file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to (de)serialize input file {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no input tables were given")]
    NoInputs,
}

/// Everything needed to render a set of tables, as resolved from the command
/// line or an input file.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RenderInput {
    /// Sample tables, each rendered to its own figure
    pub inputs: Vec<PathBuf>,

    /// Figure path; with several inputs, the stem of each output
    pub output: PathBuf,

    #[serde(default)]
    pub grid: GridShape,

    /// Reshape without checking the table's row-major ordering
    #[serde(default)]
    pub trust_ordering: bool,

    #[serde(default)]
    pub obstacle: ObstacleGeometry,

    #[serde(default)]
    pub settings: RenderSettings,

    /// Show the written figure in a window
    #[serde(default)]
    pub display: bool,
}

impl RenderInput {
    /// Pair each input with its output path. A single input renders straight
    /// to `output`; several inputs render to `<output stem>_<input stem>.<ext>`
    /// beside it.
    pub fn jobs(&self) -> Vec<RenderJob> {
        if let [input] = self.inputs.as_slice() {
            return vec![RenderJob {
                input: input.clone(),
                output: self.output.clone(),
            }];
        }

        let stem = self
            .output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = self
            .output
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "png".into());

        self.inputs
            .iter()
            .map(|input| {
                let input_stem = input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();

                RenderJob {
                    input: input.clone(),
                    output: self
                        .output
                        .with_file_name(format!("{stem}_{input_stem}.{ext}")),
                }
            })
            .collect()
    }

    /// Loader parameters for this input
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            shape: self.grid,
            trust_ordering: self.trust_ordering,
            require_pressure: self.settings.quantity == ContourQuantity::Pressure,
        }
    }

    /// Read an input file saved by [`RenderInput::save`] or written by hand.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        if path.is_dir() {
            return Err(ConfigError::IsDirectory(path.to_path_buf()));
        }

        info!("Using input file {}", path.display());

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let input: RenderInput =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        if input.inputs.is_empty() {
            return Err(ConfigError::NoInputs);
        }

        Ok(input)
    }

    /// Save this input as pretty JSON to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Saved input file to {}", path.display());
        Ok(())
    }
}

impl RenderInput {
    pub fn log(&self) {
        let (w, h) = self.settings.pixel_size();

        info!(
            "Render input is shown below:\n\n\
        \t inputs:     {}\n\
        \t output:     {}\n\
        \t grid:       {} x {} (nx x ny)\n\
        \t ordering:   {}\n\
        \t obstacle:   r = {} at ({}, {})\n\
        \t figure:     {} x {} px ({} dpi)\n\n\
        ",
            self.inputs.len(),
            self.output.display(),
            self.grid.nx,
            self.grid.ny,
            if self.trust_ordering {
                "trusted"
            } else {
                "checked"
            },
            self.obstacle.radius,
            self.obstacle.center.0,
            self.obstacle.center.1,
            w,
            h,
            self.settings.dpi,
        );

        match serde_json::to_string_pretty(&self.settings) {
            Ok(settings_str) => info!("Render settings are:\n\n{}", settings_str),
            Err(err) => warn!("Unable to format render settings: {:?}", err),
        }
    }
}
