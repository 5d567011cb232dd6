//! Directed arcs between cell centroids for export

use crate::error::PipelineError;
use crate::grid::CellIndex;
use crate::types::{CellId, DirectedCount};
use geo::Line;
use serde::Serialize;

/// Directed edge from the ignition cell's centroid to the touched cell's centroid
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpreadArc {
    pub origin: CellId,
    pub touched: CellId,
    pub count: u32,
    #[serde(skip)]
    pub line: Line<f64>,
}

/// Build one arc per directed count, preserving the input order
///
/// Counts of zero are never produced by aggregation and are dropped here.
///
/// # Errors
///
/// Returns `PipelineError::UnknownCell` when a count names a cell that is not
/// in `index`.
pub fn materialize_arcs(
    counts: &[DirectedCount],
    index: &CellIndex,
) -> Result<Vec<SpreadArc>, PipelineError> {
    counts
        .iter()
        .filter(|c| {
            debug_assert!(c.count > 0, "aggregation emitted a zero count");
            c.count > 0
        })
        .map(|c| {
            let from = index
                .centroid_of(c.origin)
                .ok_or(PipelineError::UnknownCell(c.origin))?;
            let to = index
                .centroid_of(c.touched)
                .ok_or(PipelineError::UnknownCell(c.touched))?;
            Ok(SpreadArc {
                origin: c.origin,
                touched: c.touched,
                count: c.count,
                line: Line::new(from, to),
            })
        })
        .collect()
}
