//! Parameters of one pipeline run
//!
//! Deserializable so a host program can load it from a file and override
//! individual values from its command line.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Default hexagon area: one square kilometre in a metre-based projection
pub const DEFAULT_CELL_AREA: f64 = 1_000_000.0;

/// Default refusal threshold for tessellation size
pub const DEFAULT_MAX_CELLS: usize = 5_000_000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Area of one hexagon in squared coordinate units
    pub cell_area: f64,
    /// A cell counts as touched only when its intersection with the fire
    /// extent is strictly larger than this area. Zero keeps every cell with
    /// a non-empty-area overlap.
    pub min_overlap_area: f64,
    /// Run the per-fire assignment on the rayon thread pool
    pub parallel: bool,
    /// Refuse to build grids larger than this
    pub max_cells: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cell_area: DEFAULT_CELL_AREA,
            min_overlap_area: 0.0,
            parallel: true,
            max_cells: DEFAULT_MAX_CELLS,
        }
    }
}

impl PipelineConfig {
    /// Config with the given cell area and defaults for everything else
    pub fn with_cell_area(cell_area: f64) -> Self {
        Self {
            cell_area,
            ..Self::default()
        }
    }

    /// Check parameters that do not depend on the input data
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for a non-positive or non-finite cell area, or a
    /// negative or non-finite overlap threshold.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cell_area.is_finite() || self.cell_area <= 0.0 {
            return Err(ConfigError::NonPositiveCellArea(self.cell_area));
        }
        if !self.min_overlap_area.is_finite() || self.min_overlap_area < 0.0 {
            return Err(ConfigError::InvalidOverlapThreshold(self.min_overlap_area));
        }
        Ok(())
    }
}
