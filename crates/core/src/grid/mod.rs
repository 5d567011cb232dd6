//! Identified hexagon cells and spatial queries over them

pub mod cell_index;

pub use cell_index::{Cell, CellIndex, Containment, SEAM_TOLERANCE, ZERO_AREA_TOLERANCE};
