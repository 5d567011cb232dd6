//! Hexagon geometry and tessellation

pub mod geometry;
pub mod tiling;

pub use geometry::{HexGeometry, HEX_CORNERS};
pub use tiling::{estimate_cell_count, generate_grid, GridColumn, HexLayout};
