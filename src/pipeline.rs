// Runs render jobs: load -> reshape -> render -> write

use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    field::ObstacleGeometry,
    preprocessing::grid_loader::{GridLoader, LoadError},
    render::{FieldRenderer, RenderError, RenderedFigure},
};

/// One input table and the image it is rendered to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("load stage failed for {path:?}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    #[error("render stage failed for {path:?}: {source}")]
    Render {
        path: PathBuf,
        #[source]
        source: RenderError,
    },
}

pub struct Pipeline {
    loader: GridLoader,
    renderer: FieldRenderer,
    obstacle: ObstacleGeometry,
}

impl Pipeline {
    pub fn new(loader: GridLoader, renderer: FieldRenderer, obstacle: ObstacleGeometry) -> Self {
        Self {
            loader,
            renderer,
            obstacle,
        }
    }

    /// Load, render and write a single job.
    pub fn run_job(&self, job: &RenderJob) -> Result<RenderedFigure, PipelineError> {
        let field = self
            .loader
            .load(&job.input)
            .map_err(|source| PipelineError::Load {
                path: job.input.clone(),
                source,
            })?;

        let render_err = |source| PipelineError::Render {
            path: job.input.clone(),
            source,
        };

        let figure = self
            .renderer
            .render(&field, &self.obstacle)
            .map_err(render_err)?;
        figure.write(&job.output).map_err(render_err)?;

        Ok(figure)
    }

    /// Run `jobs` in order, stopping at the first failure. Outputs written
    /// by earlier jobs are kept.
    ///
    /// Returns the figures of every job, in order.
    pub fn run_all(&self, jobs: &[RenderJob]) -> Result<Vec<RenderedFigure>, PipelineError> {
        let bar = if jobs.len() > 1 {
            job_bar(jobs.len())
        } else {
            ProgressBar::hidden()
        };

        let mut figures = Vec::with_capacity(jobs.len());
        for job in jobs {
            bar.set_message(job.input.display().to_string());

            match self.run_job(job) {
                Ok(figure) => figures.push(figure),
                Err(err) => {
                    bar.abandon();
                    if !figures.is_empty() {
                        warn!(
                            "{} of {} figures were written before the failure",
                            figures.len(),
                            jobs.len()
                        );
                    }
                    return Err(err);
                }
            }

            bar.inc(1);
        }

        bar.finish();
        info!("Rendered {} figure(s)", figures.len());

        Ok(figures)
    }
}

fn job_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template(
        "[Elapsed: {elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}",
    )
    .map(|style| style.progress_chars("##-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

#[cfg(test)]
mod tests {
    use std::{fmt::Write, fs};

    use super::*;
    use crate::{
        field::{
            GridShape,
            tests::{flatten_row_major, uniform_field},
        },
        preprocessing::grid_loader::{LoadOptions, tests::solver_table},
        render::{
            color::ColorMap,
            contour::ColorScale,
            tests::small_settings,
        },
    };

    /// Uniform +x flow of `speed`, zero inside the obstacle, written in the
    /// solver's column order.
    fn uniform_table(shape: GridShape, speed: f64) -> String {
        let field = uniform_field(shape, speed);
        let [x, y, u, v, s] = [&field.x, &field.y, &field.u, &field.v, &field.speed]
            .map(flatten_row_major);

        let mut out = String::from("x,y,u,v,p,speed\n");
        for k in 0..shape.len() {
            writeln!(out, "{},{},{},{},0,{}", x[k], y[k], u[k], v[k], s[k]).unwrap();
        }
        out
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("flowplot-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn pipeline(shape: GridShape) -> Pipeline {
        Pipeline::new(
            GridLoader::new(LoadOptions::new(shape)),
            FieldRenderer::new(small_settings()).unwrap(),
            ObstacleGeometry::default(),
        )
    }

    #[test]
    fn test_missing_column_writes_nothing() {
        let dir = scratch("missing-v");
        let shape = GridShape::new(6, 4);

        // drop the v column from the solver's table
        let table: String = solver_table(shape, false)
            .lines()
            .map(|line| {
                let cells: Vec<&str> = line.split(',').collect();
                format!("{},{},{},{},{}\n", cells[0], cells[1], cells[2], cells[4], cells[5])
            })
            .collect();
        let input = dir.join("field.csv");
        fs::write(&input, table).unwrap();

        let job = RenderJob {
            input: input.clone(),
            output: dir.join("field.png"),
        };
        let err = pipeline(shape).run_all(&[job.clone()]).err().unwrap();

        match &err {
            PipelineError::Load {
                path,
                source: LoadError::MissingColumn(column),
            } => {
                assert_eq!(column, "v");
                assert_eq!(path, &input);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().starts_with("load stage failed"));
        assert!(!job.output.exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_render_failures_name_the_stage() {
        let dir = scratch("single-column");
        let input = dir.join("line.csv");
        fs::write(&input, "x,y,speed,u,v\n0,-1,1,1,0\n0,0,1,1,0\n0,1,1,1,0\n").unwrap();

        let job = RenderJob {
            input,
            output: dir.join("line.png"),
        };
        let err = pipeline(GridShape::new(1, 3)).run_job(&job).err().unwrap();

        assert!(matches!(
            err,
            PipelineError::Render {
                source: RenderError::EmptyField { rows: 3, cols: 1 },
                ..
            }
        ));
        assert!(err.to_string().starts_with("render stage failed"));
        assert!(!job.output.exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_first_failure_stops_the_run() {
        let dir = scratch("stop");
        let shape = GridShape::new(6, 4);

        let jobs = [
            RenderJob {
                input: dir.join("absent.csv"),
                output: dir.join("absent.png"),
            },
            RenderJob {
                input: dir.join("also-absent.csv"),
                output: dir.join("also-absent.png"),
            },
        ];
        let err = pipeline(shape).run_all(&jobs).err().unwrap();

        assert!(matches!(
            err,
            PipelineError::Load {
                ref path,
                source: LoadError::Io { .. },
            } if *path == jobs[0].input
        ));
        assert!(jobs.iter().all(|job| !job.output.exists()));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_uniform_flow_end_to_end() {
        let dir = scratch("uniform");
        let shape = GridShape::default();
        let input = dir.join("flow_field_final.csv");
        fs::write(&input, uniform_table(shape, 5.)).unwrap();

        let job = RenderJob {
            input,
            output: dir.join("flow_field.png"),
        };
        let figure = pipeline(shape).run_job(&job).unwrap();

        let decoded = image::open(&job.output).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (360, 180));
        assert_eq!(decoded, figure.image);

        let band = ColorScale::new(5., 5., 20, ColorMap::Jet).band_color(0);
        let band = [band.0, band.1, band.2];
        let white = [255, 255, 255];
        let black = [0, 0, 0];

        let frame = &figure.frame;
        let upp = frame.units_per_pixel().0;
        let radius = ObstacleGeometry::default().radius;

        // arrows sit on every third node outside the body, pointing +x and
        // spanning 90% of three of the narrower cells
        let length = 0.9 * (4. / 59f64).min(2. / 29.) * 3.;
        let half_head = length * 0.3 * 0.4;
        let tails: Vec<(f64, f64)> = (0..shape.ny)
            .step_by(3)
            .flat_map(|r| (0..shape.nx).step_by(3).map(move |c| (r, c)))
            .map(|(r, c)| {
                (
                    -1. + c as f64 / 59. * 4.,
                    -1. + r as f64 / 29. * 2.,
                )
            })
            .filter(|(x, y)| x.hypot(*y) >= radius)
            .collect();
        let near_arrow = |x: f64, y: f64| {
            let pad = 2. * upp;
            tails.iter().any(|&(tx, ty)| {
                x >= tx - pad && x <= tx + length + pad && (y - ty).abs() <= half_head + pad
            })
        };

        let (w, h) = frame.size();
        let edge = 3. * upp;
        let (mut shaded, mut covered, mut arrow_pixels) = (0, 0, 0);

        for j in 0..h {
            for i in 0..w {
                let (x, y) = frame.pixel_center(i, j);
                if x < -1. + edge || x > 3. - edge || y < -1. + edge || y > 1. - edge {
                    continue;
                }

                let px = figure
                    .image
                    .get_pixel((frame.pixel_x.start + i) as u32, (frame.pixel_y.start + j) as u32)
                    .0;

                let r = x.hypot(y);
                if r < radius - 1.5 * upp {
                    assert_eq!(px, black, "pixel ({i}, {j}) inside the body");
                    covered += 1;
                    continue;
                }
                if r <= radius + 1.5 * upp {
                    continue;
                }

                if near_arrow(x, y) {
                    if px == white {
                        arrow_pixels += 1;
                    }
                    continue;
                }

                assert_eq!(px, band, "pixel ({i}, {j}) outside the single band");
                shaded += 1;
            }
        }

        assert!(covered > 100);
        assert!(shaded > 1000);
        assert!(arrow_pixels > 0);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_invalid_obstacle_fails_the_render_stage() {
        let dir = scratch("bad-obstacle");
        let shape = GridShape::new(6, 4);
        let input = dir.join("field.csv");
        fs::write(&input, solver_table(shape, false)).unwrap();

        let pipeline = Pipeline::new(
            GridLoader::new(LoadOptions::new(shape)),
            FieldRenderer::new(small_settings()).unwrap(),
            ObstacleGeometry::new((0., 0.), f64::INFINITY),
        );
        let job = RenderJob {
            input,
            output: dir.join("field.png"),
        };
        let err = pipeline.run_job(&job).err().unwrap();

        assert!(matches!(
            err,
            PipelineError::Render {
                source: RenderError::InvalidSetting(_),
                ..
            }
        ));
        assert!(!job.output.exists());

        fs::remove_dir_all(&dir).unwrap();
    }
}
