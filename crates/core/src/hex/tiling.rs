//! Brick-pattern hexagon tiling over a rectangular extent
//!
//! Columns are `h_step` apart and every other column is shifted by half a row.
//! The walk starts one column left of `xmin` and one row below `ymin` and stops
//! one step past `xmax`/`ymax`, so the tiling covers the rectangle plus a margin
//! of one cell on every side.
//!
//! Centers are emitted column-major (increasing x, then increasing y within a
//! column). Cell IDs are assigned in this order downstream, so the order is part
//! of the output contract and must not change.

use super::geometry::HexGeometry;
use crate::error::ConfigError;
use crate::types::Bounds;
use geo::Coord;
use std::ops::Range;

/// One column of the tiling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridColumn {
    /// x coordinate shared by every center in the column
    pub x: f64,
    /// y coordinate of the lowest center in the column
    pub y_start: f64,
    /// Index of the column's first center in `HexLayout::centers`
    pub first: usize,
    /// Number of centers in the column
    pub len: usize,
}

/// Ordered hexagon centers plus the column structure used for lattice lookups
#[derive(Debug, Clone)]
pub struct HexLayout {
    pub geometry: HexGeometry,
    pub centers: Vec<Coord<f64>>,
    pub columns: Vec<GridColumn>,
}

/// Rough number of centers `generate_grid` will emit for `bounds`
///
/// Used to refuse absurd grids before allocating them.
pub fn estimate_cell_count(geometry: &HexGeometry, bounds: &Bounds) -> f64 {
    let cols = (bounds.width() / geometry.h_step).ceil() + 3.0;
    let rows = (bounds.height() / geometry.v_step).ceil() + 3.0;
    cols * rows
}

/// Generate hexagon centers covering `bounds`
///
/// # Arguments
///
/// * `geometry` - Spacing derived from the cell area
/// * `bounds` - Rectangle to cover (must be finite with positive width and height)
///
/// # Returns
///
/// `HexLayout` with centers in emission order
///
/// # Errors
///
/// Returns `ConfigError::PrecisionLoss` when the coordinates are so large
/// that adding one step no longer moves a center, which shows up as a walk
/// running past its expected number of columns or rows.
pub fn generate_grid(geometry: &HexGeometry, bounds: &Bounds) -> Result<HexLayout, ConfigError> {
    let h_step = geometry.h_step;
    let v_step = geometry.v_step;

    // One spare column/row over the worst case for accumulated rounding
    let max_columns = (bounds.width() / h_step).ceil() + 4.0;
    let max_rows = (bounds.height() / v_step).ceil() + 5.0;

    // Back off one extra column/row so xmin and ymin are fully covered
    let h_skip = (bounds.xmin / h_step).ceil() - 1.0;
    let h_start = h_skip * h_step;

    let v_skip = (bounds.ymin / v_step).ceil() - 1.0;
    let v_start = v_skip * v_step;

    let h_end = bounds.xmax + h_step;
    let v_end = bounds.ymax + v_step;

    // [offset column start, aligned column start]
    let row_starts = if v_start - v_step / 2.0 < bounds.ymin {
        [v_start + v_step / 2.0, v_start]
    } else {
        [v_start - v_step / 2.0, v_start]
    };
    let mut parity = (h_skip.abs() % 2.0) as usize;

    let mut centers = Vec::new();
    let mut columns = Vec::new();

    // Positions accumulate by repeated addition; this keeps center coordinates
    // bit-identical to earlier runs of the tool.
    let mut x = h_start;
    while x < h_end {
        let y_start = row_starts[parity];
        parity = (parity + 1) % 2;

        if columns.len() as f64 >= max_columns {
            return Err(ConfigError::PrecisionLoss {
                step: h_step,
                coordinate: x,
            });
        }

        let first = centers.len();
        let mut y = y_start;
        while y < v_end {
            if (centers.len() - first) as f64 >= max_rows {
                return Err(ConfigError::PrecisionLoss {
                    step: v_step,
                    coordinate: y,
                });
            }
            centers.push(Coord { x, y });
            y += v_step;
        }
        columns.push(GridColumn {
            x,
            y_start,
            first,
            len: centers.len() - first,
        });
        x += h_step;
    }

    Ok(HexLayout {
        geometry: *geometry,
        centers,
        columns,
    })
}

impl HexLayout {
    /// Number of hexagons in the layout
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Columns whose hexagons can reach into the x interval `[x_min, x_max]`
    pub fn columns_near(&self, x_min: f64, x_max: f64) -> Range<usize> {
        let Some(first) = self.columns.first() else {
            return 0..0;
        };
        let reach = self.geometry.edge;
        let h_step = self.geometry.h_step;
        let lo = ((x_min - reach - first.x) / h_step).floor() - 1.0;
        let hi = ((x_max + reach - first.x) / h_step).ceil() + 1.0;
        clamp_range(lo, hi, self.columns.len())
    }

    /// Center indices in `column` whose hexagons can reach into `[y_min, y_max]`
    pub fn rows_near(&self, column: &GridColumn, y_min: f64, y_max: f64) -> Range<usize> {
        let reach = self.geometry.apothem();
        let v_step = self.geometry.v_step;
        let lo = ((y_min - reach - column.y_start) / v_step).floor() - 1.0;
        let hi = ((y_max + reach - column.y_start) / v_step).ceil() + 1.0;
        let rows = clamp_range(lo, hi, column.len);
        column.first + rows.start..column.first + rows.end
    }
}

/// Convert a float index interval `[lo, hi]` into a clamped half-open range
fn clamp_range(lo: f64, hi: f64, len: usize) -> Range<usize> {
    if !lo.is_finite() || !hi.is_finite() || hi < 0.0 {
        return 0..0;
    }
    let start = (lo.max(0.0) as usize).min(len);
    let end = ((hi + 1.0).max(0.0) as usize).min(len);
    start..end.max(start)
}
