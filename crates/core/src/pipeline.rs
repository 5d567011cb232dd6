//! End-to-end run: grid, assignment, aggregation, arcs
//!
//! Stages run strictly forward. The grid is built once before any assignment
//! and aggregation only starts after every fire has been assigned.

use crate::aggregation::aggregate;
use crate::arcs::{materialize_arcs, SpreadArc};
use crate::assignment::{assign_all, validate_extent};
use crate::config::PipelineConfig;
use crate::error::{ConfigError, GeometricAnomaly, PipelineError};
use crate::grid::CellIndex;
use crate::types::{Bounds, DirectedCount, FireInstance, IgnitionPoint, JoinRecord};
use geo::BoundingRect;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// Summary of a run, including every fire that was skipped
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub cells: usize,
    pub fires_seen: usize,
    pub fires_assigned: usize,
    pub duplicate_ignitions: usize,
    /// Extent records left out of the grid bounds because they are malformed
    pub extents_excluded_from_bounds: usize,
    pub join_records: usize,
    pub directed_pairs: usize,
    pub anomalies: Vec<GeometricAnomaly>,
}

impl RunReport {
    /// Number of fires skipped because of a geometric anomaly
    pub fn skipped(&self) -> usize {
        self.anomalies.len()
    }

    /// Log the summary, one warning line per skipped fire
    pub fn log(&self) {
        info!(
            "Run complete: {} cells, {}/{} fires assigned, {} join records, {} directed pairs",
            self.cells, self.fires_assigned, self.fires_seen, self.join_records, self.directed_pairs
        );
        if self.skipped() > 0 {
            warn!("{} fires skipped:", self.skipped());
            for anomaly in &self.anomalies {
                warn!("  {}", anomaly);
            }
        }
    }
}

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub index: CellIndex,
    pub join_records: Vec<JoinRecord>,
    pub counts: Vec<DirectedCount>,
    pub arcs: Vec<SpreadArc>,
    pub report: RunReport,
}

/// Total bounds of every well-formed fire extent
///
/// Returns the bounds together with the number of extents left out.
///
/// # Errors
///
/// Returns `ConfigError::EmptyExtent` when no extent is usable.
pub fn extent_bounds(fires: &[FireInstance]) -> Result<(Bounds, usize), ConfigError> {
    let mut bounds: Option<Bounds> = None;
    let mut excluded = 0;
    for fire in fires {
        let rect = match validate_extent(&fire.extent) {
            Ok(()) => fire.extent.bounding_rect(),
            Err(_) => None,
        };
        match rect {
            Some(rect) => {
                let rect = Bounds::from(rect);
                bounds = Some(bounds.map_or(rect, |b| b.union(&rect)));
            }
            None => excluded += 1,
        }
    }
    bounds
        .map(|b| (b, excluded))
        .ok_or(ConfigError::EmptyExtent)
}

/// Run the full pipeline over grid bounds derived from the fire extents
///
/// # Errors
///
/// Returns `PipelineError::Config` for invalid parameters or unusable
/// extents, and the aggregation/arc invariant errors. Per-fire geometric
/// problems are not errors; they are listed in the report.
pub fn run(
    config: &PipelineConfig,
    fires: &[FireInstance],
    ignitions: &[IgnitionPoint],
) -> Result<PipelineOutput, PipelineError> {
    config.validate()?;
    let (bounds, excluded) = extent_bounds(fires)?;
    if excluded > 0 {
        warn!("{} malformed extents left out of the grid bounds", excluded);
    }
    let mut output = run_with_bounds(config, &bounds, fires, ignitions)?;
    output.report.extents_excluded_from_bounds = excluded;
    Ok(output)
}

/// Run the full pipeline over explicit grid bounds
///
/// # Errors
///
/// Same as [`run`], minus the extent-derived bounds check.
pub fn run_with_bounds(
    config: &PipelineConfig,
    bounds: &Bounds,
    fires: &[FireInstance],
    ignitions: &[IgnitionPoint],
) -> Result<PipelineOutput, PipelineError> {
    let started = Instant::now();

    let t = Instant::now();
    let index = CellIndex::build(config, bounds)?;
    info!(
        "Grid over ({:.1}, {:.1}) - ({:.1}, {:.1}) built in {:.1} ms",
        bounds.xmin,
        bounds.ymin,
        bounds.xmax,
        bounds.ymax,
        t.elapsed().as_secs_f64() * 1000.0
    );

    let t = Instant::now();
    let outcome = assign_all(&index, fires, ignitions, config);
    info!(
        "Assignment finished in {:.1} ms",
        t.elapsed().as_secs_f64() * 1000.0
    );

    let counts = aggregate(&outcome.records)?;
    let arcs = materialize_arcs(&counts, &index)?;

    let report = RunReport {
        cells: index.len(),
        fires_seen: outcome.fires_seen,
        fires_assigned: outcome.fires_assigned,
        duplicate_ignitions: outcome.duplicate_ignitions,
        extents_excluded_from_bounds: 0,
        join_records: outcome.records.len(),
        directed_pairs: counts.len(),
        anomalies: outcome.anomalies,
    };
    info!(
        "Pipeline finished in {:.1} ms",
        started.elapsed().as_secs_f64() * 1000.0
    );

    Ok(PipelineOutput {
        index,
        join_records: outcome.records,
        counts,
        arcs,
        report,
    })
}
