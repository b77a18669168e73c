// Loads a flat table of flow samples and reshapes it onto the structured grid

use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::{Path, PathBuf},
};

use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;
use tracing::{debug, info};

use crate::field::{GridShape, ScalarField, StructuredField, reshape_row_major};

/// Columns every table must carry, in the order they are reshaped.
pub const REQUIRED_COLUMNS: [&str; 5] = ["x", "y", "speed", "u", "v"];

/// Optional pressure column written by the flow solver.
pub const PRESSURE_COLUMN: &str = "p";

/// Relative tolerance used when checking that coordinates repeat across rows
/// and columns.
const COORD_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unable to open {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed table: {0}")]
    Csv(#[from] csv::Error),

    #[error("required column `{0}` is missing")]
    MissingColumn(String),

    #[error("column `{column}` holds non-numeric value {value:?} in data row {row}")]
    NonNumericData {
        column: String,
        row: usize,
        value: String,
    },

    #[error("table has {found} rows but a {nx}x{ny} grid needs exactly {expected}")]
    ShapeMismatch {
        nx: usize,
        ny: usize,
        expected: usize,
        found: usize,
    },

    #[error(
        "samples are not in row-major grid order: {axis} breaks at row {row}, column {col}"
    )]
    Ordering {
        axis: &'static str,
        row: usize,
        col: usize,
    },
}

/// Loader parameters
#[derive(Clone, Copy, Debug)]
pub struct LoadOptions {
    /// Grid the table is reshaped onto
    pub shape: GridShape,

    /// Skip the row-major ordering assertion and trust the declared shape
    pub trust_ordering: bool,

    /// Read the pressure column and fail when the table has none. When unset
    /// the column is ignored, even if present.
    pub require_pressure: bool,
}

impl LoadOptions {
    pub fn new(shape: GridShape) -> Self {
        Self {
            shape,
            trust_ordering: false,
            require_pressure: false,
        }
    }
}

/// Reads sample tables into structured fields.
pub struct GridLoader {
    options: LoadOptions,
}

impl GridLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self { options }
    }

    /// Load and reshape the table at `path`.
    pub fn load(&self, path: &Path) -> Result<StructuredField, LoadError> {
        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Loading flow samples from {}", path.display());
        self.read(BufReader::new(file))
    }

    /// Read and reshape a table from any reader.
    pub fn read<R: Read>(&self, reader: R) -> Result<StructuredField, LoadError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let required: Vec<usize> = REQUIRED_COLUMNS
            .iter()
            .map(|name| column_index(&headers, name))
            .collect::<Result<_, _>>()?;

        let pressure = if self.options.require_pressure {
            Some(column_index(&headers, PRESSURE_COLUMN)?)
        } else {
            None
        };

        let expected = self.options.shape.len();
        let mut columns: [Vec<f64>; REQUIRED_COLUMNS.len()] =
            std::array::from_fn(|_| Vec::with_capacity(expected));
        let mut pressure_column: Vec<f64> = Vec::new();

        let mut record = StringRecord::new();
        let mut row = 0;
        while reader.read_record(&mut record)? {
            row += 1;

            for (slot, (&idx, name)) in required.iter().zip(REQUIRED_COLUMNS).enumerate() {
                columns[slot].push(parse_cell(&record, idx, name, row)?);
            }

            if let Some(idx) = pressure {
                pressure_column.push(parse_cell(&record, idx, PRESSURE_COLUMN, row)?);
            }
        }

        if row != expected {
            return Err(LoadError::ShapeMismatch {
                nx: self.options.shape.nx,
                ny: self.options.shape.ny,
                expected,
                found: row,
            });
        }

        let shape = self.options.shape;
        let [x, y, speed, u, v] = columns.map(|col| reshape_row_major(&col, shape));

        let field = StructuredField {
            x,
            y,
            speed,
            u,
            v,
            pressure: pressure.map(|_| reshape_row_major(&pressure_column, shape)),
        };

        if self.options.trust_ordering {
            debug!("Skipping grid ordering check");
        } else {
            check_ordering(&field.x, Axis::X)?;
            check_ordering(&field.y, Axis::Y)?;
        }

        debug!(
            "Reshaped {} samples onto a {}x{} grid",
            row, shape.nx, shape.ny
        );

        Ok(field)
    }
}

fn column_index(headers: &StringRecord, name: &str) -> Result<usize, LoadError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| LoadError::MissingColumn(name.to_string()))
}

fn parse_cell(record: &StringRecord, idx: usize, column: &str, row: usize) -> Result<f64, LoadError> {
    let raw = record.get(idx).unwrap_or_default();
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| LoadError::NonNumericData {
            column: column.to_string(),
            row,
            value: raw.to_string(),
        })
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

impl Axis {
    fn name(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
        }
    }
}

/// Assert that a coordinate array describes a rectilinear grid sampled in
/// row-major order. `x` must vary strictly monotonically along each row and
/// repeat down each column; `y` the other way around.
fn check_ordering(coords: &ScalarField, axis: Axis) -> Result<(), LoadError> {
    let (rows, cols) = coords.shape();
    if rows == 0 || cols == 0 {
        return Ok(());
    }

    // maps (index along the varying axis, index along the repeating axis)
    // to (row, col)
    let cell = |vary: usize, fixed: usize| match axis {
        Axis::X => (fixed, vary),
        Axis::Y => (vary, fixed),
    };
    let at = |vary: usize, fixed: usize| coords[cell(vary, fixed)];
    let (n_vary, n_fixed) = match axis {
        Axis::X => (cols, rows),
        Axis::Y => (rows, cols),
    };
    let broken = |vary: usize, fixed: usize| {
        let (row, col) = cell(vary, fixed);
        LoadError::Ordering {
            axis: axis.name(),
            row,
            col,
        }
    };

    let span = coords.max() - coords.min();
    let tolerance = COORD_TOLERANCE * span.max(1.);

    let ascending = n_vary < 2 || at(1, 0) > at(0, 0);
    for fixed in 0..n_fixed {
        for vary in 0..n_vary {
            if (at(vary, fixed) - at(vary, 0)).abs() > tolerance {
                return Err(broken(vary, fixed));
            }

            if vary == 0 {
                continue;
            }

            let step = at(vary, fixed) - at(vary - 1, fixed);
            let monotonic = if ascending { step > 0. } else { step < 0. };
            if !monotonic {
                return Err(broken(vary, fixed));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::fmt::Write;

    use super::*;
    use crate::field::{ObstacleGeometry, tests::flatten_row_major};

    /// Write a table the way the flow solver does: rows of y, x fastest,
    /// with the solver's column order.
    pub fn solver_table(shape: GridShape, column_major: bool) -> String {
        let GridShape { nx, ny } = shape;
        let obstacle = ObstacleGeometry::default();
        let mut out = String::from("x,y,u,v,p,speed\n");

        let mut push = |i: usize, j: usize| {
            let x = -1. + (j as f64 / (nx - 1) as f64) * 4.;
            let y = -1. + (i as f64 / (ny - 1) as f64) * 2.;
            if obstacle.contains(x, y) {
                writeln!(out, "{x},{y},0,0,0,0").unwrap();
            } else {
                let (u, v) = (1. + 0.1 * y, 0.05 * x);
                let p = 0.5 - x * 0.1;
                writeln!(out, "{x},{y},{u},{v},{p},{}", (u * u + v * v).sqrt()).unwrap();
            }
        };

        if column_major {
            for j in 0..nx {
                for i in 0..ny {
                    push(i, j);
                }
            }
        } else {
            for i in 0..ny {
                for j in 0..nx {
                    push(i, j);
                }
            }
        }

        out
    }

    fn loader(shape: GridShape) -> GridLoader {
        GridLoader::new(LoadOptions::new(shape))
    }

    #[test]
    fn test_load_solver_table() {
        let shape = GridShape::default();
        let table = solver_table(shape, false);

        let field = loader(shape).read(table.as_bytes()).unwrap();

        for array in [&field.x, &field.y, &field.speed, &field.u, &field.v] {
            assert_eq!(array.shape(), (30, 60));
        }
        assert!(field.pressure.is_none());

        // first row walks along x at the bottom wall
        assert_eq!(field.x[(0, 0)], -1.);
        assert_eq!(field.x[(0, 59)], 3.);
        assert_eq!(field.y[(0, 59)], -1.);
        assert_eq!(field.y[(29, 0)], 1.);
    }

    #[test]
    fn test_columns_keep_table_order() {
        let shape = GridShape::new(4, 3);
        let table = solver_table(shape, false);

        let field = loader(shape).read(table.as_bytes()).unwrap();

        let mut rdr = ReaderBuilder::new().from_reader(table.as_bytes());
        let speeds: Vec<f64> = rdr
            .records()
            .map(|r| r.unwrap()[5].parse().unwrap())
            .collect();

        assert_eq!(flatten_row_major(&field.speed), speeds);
    }

    #[test]
    fn test_row_count_must_match_grid() {
        let shape = GridShape::new(6, 4);
        let table = solver_table(shape, false);
        let mut lines: Vec<&str> = table.lines().collect();

        let short = lines[..lines.len() - 1].join("\n");
        match loader(shape).read(short.as_bytes()) {
            Err(LoadError::ShapeMismatch {
                expected, found, ..
            }) => assert_eq!((expected, found), (24, 23)),
            other => panic!("expected shape mismatch, got {other:?}"),
        }

        let extra = lines[lines.len() - 1];
        lines.push(extra);
        let long = lines.join("\n");
        match loader(shape).read(long.as_bytes()) {
            Err(LoadError::ShapeMismatch {
                expected, found, ..
            }) => assert_eq!((expected, found), (24, 25)),
            other => panic!("expected shape mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_column() {
        let table = "x,y,speed,u\n0,0,1,1\n";

        let err = loader(GridShape::new(1, 1))
            .read(table.as_bytes())
            .unwrap_err();

        assert!(matches!(err, LoadError::MissingColumn(ref c) if c == "v"));
    }

    #[test]
    fn test_pressure_can_be_required() {
        let table = "x,y,speed,u,v\n0,0,1,1,0\n";
        let mut options = LoadOptions::new(GridShape::new(1, 1));

        let field = GridLoader::new(options).read(table.as_bytes()).unwrap();
        assert!(field.pressure.is_none());

        options.require_pressure = true;
        let err = GridLoader::new(options).read(table.as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn(ref c) if c == "p"));
    }

    #[test]
    fn test_pressure_is_read_only_when_required() {
        let shape = GridShape::new(6, 4);
        let table = solver_table(shape, false);
        let mut options = LoadOptions::new(shape);
        options.require_pressure = true;

        let field = GridLoader::new(options).read(table.as_bytes()).unwrap();
        assert_eq!(field.pressure.as_ref().map(|p| p.shape()), Some((4, 6)));

        // a broken pressure cell only matters when pressure is shaded
        let table = "x,y,speed,u,v,p
0,0,1,1,0,n/a
";
        let single = GridShape::new(1, 1);

        let field = loader(single).read(table.as_bytes()).unwrap();
        assert!(field.pressure.is_none());

        let mut options = LoadOptions::new(single);
        options.require_pressure = true;
        let err = GridLoader::new(options).read(table.as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::NonNumericData { ref column, .. } if column == "p"));
    }

    #[test]
    fn test_non_numeric_cell() {
        let table = "x,y,speed,u,v\n0,0,1,1,0\n1,0,fast,1,0\n";

        let err = loader(GridShape::new(2, 1))
            .read(table.as_bytes())
            .unwrap_err();

        match err {
            LoadError::NonNumericData { column, row, value } => {
                assert_eq!(column, "speed");
                assert_eq!(row, 2);
                assert_eq!(value, "fast");
            }
            other => panic!("expected non-numeric error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_finite_cell() {
        let table = "x,y,speed,u,v\n0,0,nan,1,0\n";

        let err = loader(GridShape::new(1, 1))
            .read(table.as_bytes())
            .unwrap_err();

        assert!(matches!(err, LoadError::NonNumericData { .. }));
    }

    #[test]
    fn test_column_major_table_is_rejected() {
        let shape = GridShape::new(8, 5);
        let table = solver_table(shape, true);

        let err = loader(shape).read(table.as_bytes()).unwrap_err();

        assert!(matches!(err, LoadError::Ordering { .. }), "{err:?}");
    }

    #[test]
    fn test_trusted_ordering_reshapes_anyway() {
        let shape = GridShape::new(8, 5);
        let table = solver_table(shape, true);
        let mut options = LoadOptions::new(shape);
        options.trust_ordering = true;

        let field = GridLoader::new(options).read(table.as_bytes()).unwrap();

        // first row now holds the first grid column, walking up in y
        assert_eq!(field.x[(0, 0)], field.x[(0, 4)]);
        assert!(field.y[(0, 1)] > field.y[(0, 0)]);
    }

    #[test]
    fn test_descending_axes_are_accepted() {
        let table = "x,y,speed,u,v\n\
            1,1,0,0,0\n0,1,0,0,0\n\
            1,0,0,0,0\n0,0,0,0,0\n";

        let field = loader(GridShape::new(2, 2)).read(table.as_bytes()).unwrap();

        assert_eq!(field.x[(1, 0)], 1.);
        assert_eq!(field.y[(1, 1)], 0.);
    }

    #[test]
    fn test_missing_file() {
        let err = loader(GridShape::default())
            .load(Path::new("does/not/exist.csv"))
            .unwrap_err();

        assert!(matches!(err, LoadError::Io { .. }));
    }
}
