// Structured field types shared by the loader and the renderer

use std::ops::Range;

use na::DMatrix;
use serde::{Deserialize, Serialize};

/// A 2-D array of samples indexed by `(row, col)`, shaped `(ny, nx)`.
pub type ScalarField = DMatrix<f64>;

/// Dimensions of the fixed rectangular sampling grid.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridShape {
    /// Number of columns (samples along x)
    pub nx: usize,

    /// Number of rows (samples along y)
    pub ny: usize,
}

impl GridShape {
    pub fn new(nx: usize, ny: usize) -> Self {
        Self { nx, ny }
    }

    /// Number of samples a table must contain for this grid.
    pub fn len(&self) -> usize {
        self.nx * self.ny
    }
}

impl Default for GridShape {
    fn default() -> Self {
        Self { nx: 60, ny: 30 }
    }
}

/// Reshape a flat, row-major sequence into a `(ny, nx)` matrix. Element `k`
/// lands at `(k / nx, k % nx)`.
///
/// The caller guarantees `values.len() == shape.len()`.
pub fn reshape_row_major(values: &[f64], shape: GridShape) -> ScalarField {
    DMatrix::from_row_slice(shape.ny, shape.nx, values)
}

/// The solid circular body the flow is computed around.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ObstacleGeometry {
    pub center: (f64, f64),
    pub radius: f64,
}

impl ObstacleGeometry {
    pub fn new(center: (f64, f64), radius: f64) -> Self {
        Self { center, radius }
    }

    /// A finite centre and a finite, positive radius.
    pub fn is_valid(&self) -> bool {
        self.center.0.is_finite()
            && self.center.1.is_finite()
            && self.radius.is_finite()
            && self.radius > 0.
    }

    /// Whether a point lies strictly inside the body.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let (dx, dy) = (x - self.center.0, y - self.center.1);
        dx * dx + dy * dy < self.radius * self.radius
    }
}

impl Default for ObstacleGeometry {
    fn default() -> Self {
        Self {
            center: (0., 0.),
            radius: 0.5,
        }
    }
}

/// Which scalar the contour layer shades.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ContourQuantity {
    #[default]
    Speed,
    Pressure,
}

impl ContourQuantity {
    /// Label printed beside the colour scale.
    pub fn legend_label(&self) -> &'static str {
        match self {
            ContourQuantity::Speed => "Velocity Magnitude",
            ContourQuantity::Pressure => "Pressure",
        }
    }

    /// Figure title used when none is configured.
    pub fn default_title(&self) -> &'static str {
        match self {
            ContourQuantity::Speed => "Flow Around Cylinder - PINN Solution",
            ContourQuantity::Pressure => "Pressure Around Cylinder - PINN Solution",
        }
    }
}

/// A flow solution reshaped onto its structured grid. Every matrix has shape
/// `(ny, nx)`.
#[derive(Clone, Debug, PartialEq)]
pub struct StructuredField {
    pub x: ScalarField,
    pub y: ScalarField,
    pub speed: ScalarField,
    pub u: ScalarField,
    pub v: ScalarField,

    /// Pressure, present when the table carries a `p` column
    pub pressure: Option<ScalarField>,
}

impl StructuredField {
    /// `(ny, nx)` of the grid
    pub fn shape(&self) -> (usize, usize) {
        self.x.shape()
    }

    /// The scalar shaded for `quantity`, if the field carries it.
    pub fn scalar(&self, quantity: ContourQuantity) -> Option<&ScalarField> {
        match quantity {
            ContourQuantity::Speed => Some(&self.speed),
            ContourQuantity::Pressure => self.pressure.as_ref(),
        }
    }

    /// Bounding box of the coordinate arrays as `(x_range, y_range)`.
    pub fn extent(&self) -> (Range<f64>, Range<f64>) {
        (span(&self.x), span(&self.y))
    }

    /// A field has area when it has at least two nodes along each axis and its
    /// coordinates span a non-zero box.
    pub fn has_area(&self) -> bool {
        let (rows, cols) = self.shape();
        if rows < 2 || cols < 2 {
            return false;
        }

        let (xr, yr) = self.extent();
        xr.end > xr.start && yr.end > yr.start
    }

    /// Per-axis node coordinates, read from the first row (x) and the first
    /// column (y).
    pub fn axes(&self) -> GridAxes {
        GridAxes {
            xs: self.x.row(0).iter().copied().collect(),
            ys: self.y.column(0).iter().copied().collect(),
        }
    }

    /// Mask of nodes that fall inside the obstacle.
    pub fn obstacle_mask(&self, obstacle: &ObstacleGeometry) -> DMatrix<bool> {
        let (rows, cols) = self.shape();
        DMatrix::from_fn(rows, cols, |r, c| {
            obstacle.contains(self.x[(r, c)], self.y[(r, c)])
        })
    }
}

fn span(field: &ScalarField) -> Range<f64> {
    let lo = field.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = field.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    lo..hi
}

/// Node coordinates of a rectilinear grid.
#[derive(Clone, Debug, PartialEq)]
pub struct GridAxes {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

impl GridAxes {
    /// Find the cell containing `(x, y)`.
    ///
    /// Returns `((row, t_row), (col, t_col))` where `row`/`col` index the
    /// cell's first node and `t` is the fractional position inside the cell.
    pub fn locate(&self, x: f64, y: f64) -> Option<((usize, f64), (usize, f64))> {
        let col = locate_1d(&self.xs, x)?;
        let row = locate_1d(&self.ys, y)?;
        Some((row, col))
    }
}

/// Locate `v` on a monotonic axis (ascending or descending).
fn locate_1d(nodes: &[f64], v: f64) -> Option<(usize, f64)> {
    let n = nodes.len();
    if n < 2 {
        return None;
    }

    let ascending = nodes[n - 1] >= nodes[0];
    let (lo, hi) = if ascending {
        (nodes[0], nodes[n - 1])
    } else {
        (nodes[n - 1], nodes[0])
    };
    if !(lo..=hi).contains(&v) {
        return None;
    }

    // first node strictly past v
    let past = if ascending {
        nodes.partition_point(|&node| node <= v)
    } else {
        nodes.partition_point(|&node| node >= v)
    };
    let i = past.clamp(1, n - 1) - 1;

    let width = nodes[i + 1] - nodes[i];
    let t = if width == 0. {
        0.
    } else {
        ((v - nodes[i]) / width).clamp(0., 1.)
    };

    Some((i, t))
}
