use std::{fmt::Display, process::exit};

extern crate nalgebra as na;

mod field;
mod pipeline;
mod postprocessing;
mod preprocessing;
mod render;

use clap::Parser;
use pipeline::Pipeline;
use preprocessing::{cli::CliArgs, grid_loader::GridLoader};
use render::FieldRenderer;
use tracing::error;

fn main() {
    tracing_subscriber::fmt::init();

    let args = CliArgs::parse();

    let render_input = or_exit(args.crate_input());

    render_input.log();

    let renderer = or_exit(FieldRenderer::new(render_input.settings.clone()));

    let pipeline = Pipeline::new(
        GridLoader::new(render_input.load_options()),
        renderer,
        render_input.obstacle,
    );

    let figures = or_exit(pipeline.run_all(&render_input.jobs()));

    postprocessing::postprocess(&render_input, &figures);
}

/// Report a fatal error and exit.
fn or_exit<T, E: Display>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            error!("{}", err);
            exit(1);
        }
    }
}
