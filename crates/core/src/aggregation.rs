//! Reduction of join records into directed pairwise counts

use crate::error::PipelineError;
use crate::types::{CellId, DirectedCount, FireId, JoinRecord};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::info;

/// Count distinct fires per (origin, touched) pair
///
/// Duplicate records from the same fire count once. Output is ordered by
/// ascending count, then origin, then touched cell.
///
/// # Errors
///
/// Returns `PipelineError::SelfPair` if any record has `origin == touched`;
/// assignment never emits those, so one reaching here is a defect.
pub fn aggregate(records: &[JoinRecord]) -> Result<Vec<DirectedCount>, PipelineError> {
    let mut fires_per_pair: FxHashMap<(CellId, CellId), FxHashSet<FireId>> =
        FxHashMap::default();

    for record in records {
        if record.origin == record.touched {
            return Err(PipelineError::SelfPair {
                cell: record.origin,
                fire_id: record.fire_id,
            });
        }
        fires_per_pair
            .entry((record.origin, record.touched))
            .or_default()
            .insert(record.fire_id);
    }

    let mut counts: Vec<DirectedCount> = fires_per_pair
        .into_iter()
        .map(|((origin, touched), fires)| DirectedCount {
            origin,
            touched,
            count: fires.len() as u32,
        })
        .collect();
    counts.sort_unstable_by_key(|c| (c.count, c.origin, c.touched));

    info!(
        "Aggregated {} join records into {} directed pairs",
        records.len(),
        counts.len()
    );
    Ok(counts)
}
