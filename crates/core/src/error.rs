//! Error types for grid configuration, per-fire geometry and aggregation

use crate::types::{CellId, FireId};
use serde::Serialize;

/// Invalid run parameters, detected before any grid is built
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Cell area must be finite and strictly positive
    NonPositiveCellArea(f64),
    /// Overlap threshold must be finite and non-negative
    InvalidOverlapThreshold(f64),
    /// No well-formed fire extent to derive grid bounds from
    EmptyExtent,
    /// Bounds with zero/negative width or height, or non-finite corners
    DegenerateBounds {
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
    },
    /// The requested tessellation would exceed the configured cell limit
    GridTooLarge { cells: f64, limit: usize },
    /// Coordinates too large for the cell spacing to be represented
    PrecisionLoss { step: f64, coordinate: f64 },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NonPositiveCellArea(area) => {
                write!(f, "Cell area must be positive and finite, got {area}")
            }
            ConfigError::InvalidOverlapThreshold(value) => write!(
                f,
                "Minimum overlap area must be non-negative and finite, got {value}"
            ),
            ConfigError::EmptyExtent => {
                write!(f, "No well-formed fire extent to build the grid over")
            }
            ConfigError::DegenerateBounds {
                xmin,
                ymin,
                xmax,
                ymax,
            } => write!(
                f,
                "Degenerate grid bounds ({xmin}, {ymin}) - ({xmax}, {ymax})"
            ),
            ConfigError::GridTooLarge { cells, limit } => write!(
                f,
                "Grid would contain about {cells:.0} cells, above the limit of {limit}"
            ),
            ConfigError::PrecisionLoss { step, coordinate } => write!(
                f,
                "Cell spacing {step} is below the floating-point resolution near {coordinate}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Why a single fire was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail")]
pub enum AnomalyKind {
    /// The ignition collection names a fire with no extent record
    NoFireExtent,
    /// The fire's extent polygon is unusable (non-finite, too few vertices, zero area)
    MalformedExtent(String),
    /// The ignition point lies on a cell edge or vertex, so no cell strictly contains it
    IgnitionOnBoundary,
    /// The ignition point lies outside the tessellated area
    IgnitionOutsideGrid,
    /// Polygon clipping failed for this fire
    OverlapFailure(String),
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyKind::NoFireExtent => write!(f, "no matching fire extent"),
            AnomalyKind::MalformedExtent(reason) => write!(f, "malformed extent: {reason}"),
            AnomalyKind::IgnitionOnBoundary => {
                write!(f, "ignition point lies on a cell boundary")
            }
            AnomalyKind::IgnitionOutsideGrid => {
                write!(f, "ignition point lies outside the grid")
            }
            AnomalyKind::OverlapFailure(reason) => write!(f, "overlap query failed: {reason}"),
        }
    }
}

/// A recoverable per-fire failure; the fire is skipped and the run continues
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeometricAnomaly {
    pub fire_id: FireId,
    #[serde(flatten)]
    pub kind: AnomalyKind,
}

impl GeometricAnomaly {
    pub fn new(fire_id: FireId, kind: AnomalyKind) -> Self {
        Self { fire_id, kind }
    }
}

impl std::fmt::Display for GeometricAnomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fire {}: {}", self.fire_id, self.kind)
    }
}

impl std::error::Error for GeometricAnomaly {}

/// Fatal pipeline failures
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Invalid configuration or bounds
    Config(ConfigError),
    /// A join record with identical origin and touched cell reached aggregation
    SelfPair { cell: CellId, fire_id: FireId },
    /// A count referenced a cell the index does not hold
    UnknownCell(CellId),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Config(e) => write!(f, "Configuration error: {e}"),
            PipelineError::SelfPair { cell, fire_id } => write!(
                f,
                "Aggregation invariant violated: fire {fire_id} produced a self pair on cell {cell}"
            ),
            PipelineError::UnknownCell(cell) => write!(f, "Cell {cell} is not part of the grid"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Config(e) => Some(e),
            PipelineError::SelfPair { .. } | PipelineError::UnknownCell(_) => None,
        }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        PipelineError::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anomaly_display() {
        let anomaly = GeometricAnomaly::new(FireId(12), AnomalyKind::IgnitionOutsideGrid);
        assert_eq!(
            anomaly.to_string(),
            "fire 12: ignition point lies outside the grid"
        );
    }

    #[test]
    fn test_config_error_converts_to_pipeline_error() {
        let err: PipelineError = ConfigError::NonPositiveCellArea(-1.0).into();
        assert!(matches!(
            err,
            PipelineError::Config(ConfigError::NonPositiveCellArea(_))
        ));
        assert!(std::error::Error::source(&err).is_some());
    }
}
