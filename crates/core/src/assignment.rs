//! Spatial assignment: fire extents and ignition points onto grid cells
//!
//! Each fire is handled independently and returns either its join records or
//! a `GeometricAnomaly`. The driver maps fires in parallel on the rayon pool
//! and partitions the results afterwards, so there is no shared mutable state
//! while fires are being processed.
//!
//! All inputs are assumed to share one projected coordinate system.

use crate::config::PipelineConfig;
use crate::error::{AnomalyKind, GeometricAnomaly};
use crate::grid::cell_index::{intersection_area, ClipArea};
use crate::grid::{CellIndex, Containment};
use crate::types::{FireId, FireInstance, IgnitionPoint, JoinRecord};
use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, Coord, Line, LineString, MultiPolygon, Polygon};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

/// Join records and skipped fires produced by one assignment pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentOutcome {
    /// Records in fire processing order, ascending touched cell within a fire
    pub records: Vec<JoinRecord>,
    /// Fires skipped, in processing order
    pub anomalies: Vec<GeometricAnomaly>,
    /// Distinct fire IDs found in the ignition collection
    pub fires_seen: usize,
    /// Fires that produced a result (possibly with zero records)
    pub fires_assigned: usize,
    /// Ignition records ignored because their fire already had one
    pub duplicate_ignitions: usize,
}

/// Check that an extent can be clipped against the grid
///
/// # Errors
///
/// Returns a short reason when the extent has no polygons, non-finite
/// coordinates, a ring with fewer than three distinct vertices, zero area, or
/// a ring that crosses or touches itself.
pub fn validate_extent(extent: &MultiPolygon<f64>) -> Result<(), String> {
    if extent.0.is_empty() {
        return Err("no polygons".to_string());
    }
    for polygon in &extent.0 {
        validate_polygon(polygon)?;
    }
    Ok(())
}

fn validate_polygon(polygon: &Polygon<f64>) -> Result<(), String> {
    let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
    for ring in rings {
        if ring.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err("non-finite coordinate".to_string());
        }
    }
    // Closed rings repeat the first vertex, so a triangle has four coordinates
    if polygon.exterior().0.len() < 4 {
        return Err(format!(
            "exterior ring has {} coordinates",
            polygon.exterior().0.len()
        ));
    }
    let area = polygon.unsigned_area();
    if area.is_nan() || area <= 0.0 {
        return Err("zero area".to_string());
    }
    let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
    for (i, ring) in rings.enumerate() {
        if ring_self_intersects(ring) {
            return Err(if i == 0 {
                "self-intersecting exterior ring".to_string()
            } else {
                format!("self-intersecting interior ring {i}")
            });
        }
    }
    Ok(())
}

/// True when two edges of a closed ring meet anywhere other than the vertex
/// shared by consecutive edges
fn ring_self_intersects(ring: &LineString<f64>) -> bool {
    let mut coords: Vec<Coord<f64>> = ring.0.clone();
    coords.dedup();
    let edges: Vec<Line<f64>> = coords.windows(2).map(|w| Line::new(w[0], w[1])).collect();
    let n = edges.len();

    for i in 0..n {
        for j in i + 1..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if !boxes_touch(&edges[i], &edges[j]) {
                continue;
            }
            match line_intersection(edges[i], edges[j]) {
                None => {}
                // Consecutive edges always share their common vertex
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(_) => return true,
            }
        }
    }
    false
}

fn boxes_touch(a: &Line<f64>, b: &Line<f64>) -> bool {
    a.start.x.min(a.end.x) <= b.start.x.max(b.end.x)
        && b.start.x.min(b.end.x) <= a.start.x.max(a.end.x)
        && a.start.y.min(a.end.y) <= b.start.y.max(b.end.y)
        && b.start.y.min(b.end.y) <= a.start.y.max(a.end.y)
}

/// Assign one fire: locate its ignition cell and every cell its extents overlap
///
/// # Arguments
///
/// * `index` - The run's cell index
/// * `fire_id` - Fire being processed
/// * `extents` - Every extent record carrying `fire_id` (all iterations together)
/// * `ignition` - The fire's ignition point
/// * `min_overlap_area` - Overlap threshold, see `PipelineConfig`
///
/// # Errors
///
/// Returns `GeometricAnomaly` when the fire has no extent, an extent is
/// malformed, the ignition has no strictly containing cell, or clipping fails.
pub fn assign_fire(
    index: &CellIndex,
    fire_id: FireId,
    extents: &[&FireInstance],
    ignition: &IgnitionPoint,
    min_overlap_area: f64,
) -> Result<Vec<JoinRecord>, GeometricAnomaly> {
    assign_fire_with(
        index,
        fire_id,
        extents,
        ignition,
        min_overlap_area,
        intersection_area,
    )
}

fn assign_fire_with(
    index: &CellIndex,
    fire_id: FireId,
    extents: &[&FireInstance],
    ignition: &IgnitionPoint,
    min_overlap_area: f64,
    clip: ClipArea,
) -> Result<Vec<JoinRecord>, GeometricAnomaly> {
    let anomaly = |kind: AnomalyKind| GeometricAnomaly::new(fire_id, kind);

    if extents.is_empty() {
        return Err(anomaly(AnomalyKind::NoFireExtent));
    }
    for instance in extents {
        validate_extent(&instance.extent)
            .map_err(|reason| anomaly(AnomalyKind::MalformedExtent(reason)))?;
    }

    let origin = match index.cell_containing(ignition.location) {
        Containment::Inside(id) => id,
        Containment::OnBoundary => return Err(anomaly(AnomalyKind::IgnitionOnBoundary)),
        Containment::Outside => return Err(anomaly(AnomalyKind::IgnitionOutsideGrid)),
    };

    let mut touched = Vec::new();
    for instance in extents {
        touched.extend(
            index
                .cells_overlapping_with(&instance.extent, min_overlap_area, clip)
                .map_err(anomaly)?,
        );
    }
    touched.sort_unstable();
    touched.dedup();

    Ok(touched
        .into_iter()
        .filter(|&cell| cell != origin)
        .map(|cell| JoinRecord {
            fire_id,
            touched: cell,
            origin,
        })
        .collect())
}

/// Run assignment for every distinct fire in the ignition collection
///
/// Fires are processed in order of first appearance in `ignitions`. Only the
/// first ignition of a fire is used; extra ones are counted and logged.
/// Extents are grouped by fire ID across iterations.
pub fn assign_all(
    index: &CellIndex,
    fires: &[FireInstance],
    ignitions: &[IgnitionPoint],
    config: &PipelineConfig,
) -> AssignmentOutcome {
    assign_all_with(index, fires, ignitions, config, intersection_area)
}

fn assign_all_with(
    index: &CellIndex,
    fires: &[FireInstance],
    ignitions: &[IgnitionPoint],
    config: &PipelineConfig,
    clip: ClipArea,
) -> AssignmentOutcome {
    let mut extents_by_fire: FxHashMap<FireId, Vec<&FireInstance>> = FxHashMap::default();
    for fire in fires {
        extents_by_fire.entry(fire.fire_id).or_default().push(fire);
    }

    let mut seen = FxHashSet::default();
    let mut duplicate_ignitions = 0;
    let mut work: Vec<&IgnitionPoint> = Vec::new();
    for ignition in ignitions {
        if seen.insert(ignition.fire_id) {
            work.push(ignition);
        } else {
            duplicate_ignitions += 1;
        }
    }
    if duplicate_ignitions > 0 {
        warn!(
            "{} ignition records ignored: their fires already have an ignition point",
            duplicate_ignitions
        );
    }

    info!(
        "Assigning {} fires ({} extent records) to {} cells, parallel={}",
        work.len(),
        fires.len(),
        index.len(),
        config.parallel
    );

    let assign = |ignition: &&IgnitionPoint| {
        let extents = extents_by_fire
            .get(&ignition.fire_id)
            .map_or(&[][..], Vec::as_slice);
        assign_fire_with(
            index,
            ignition.fire_id,
            extents,
            ignition,
            config.min_overlap_area,
            clip,
        )
    };

    // Order-preserving collect keeps the output identical in both modes
    let results: Vec<Result<Vec<JoinRecord>, GeometricAnomaly>> = if config.parallel {
        work.par_iter().map(assign).collect()
    } else {
        work.iter().map(assign).collect()
    };

    let mut outcome = AssignmentOutcome {
        fires_seen: work.len(),
        duplicate_ignitions,
        ..AssignmentOutcome::default()
    };
    for result in results {
        match result {
            Ok(records) => {
                outcome.fires_assigned += 1;
                outcome.records.extend(records);
            }
            Err(anomaly) => {
                warn!("Skipping {}", anomaly);
                outcome.anomalies.push(anomaly);
            }
        }
    }

    debug!(
        "Assignment produced {} join records, {} anomalies",
        outcome.records.len(),
        outcome.anomalies.len()
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bounds, CellId};
    use geo::{polygon, Point};

    fn index() -> CellIndex {
        let config = PipelineConfig::with_cell_area(1_000_000.0);
        CellIndex::build(&config, &Bounds::new(0.0, 0.0, 10_000.0, 10_000.0)).unwrap()
    }

    fn square(fire: u32, cx: f64, cy: f64, half: f64) -> FireInstance {
        FireInstance::from_polygon(
            FireId(fire),
            1,
            polygon![
                (x: cx - half, y: cy - half),
                (x: cx + half, y: cy - half),
                (x: cx + half, y: cy + half),
                (x: cx - half, y: cy + half),
            ],
        )
    }

    fn center_of(index: &CellIndex, x: f64, y: f64) -> (CellId, f64, f64) {
        let id = index.cell_containing(Point::new(x, y)).cell().unwrap();
        let c = index.get(id).unwrap().center;
        (id, c.x, c.y)
    }

    #[test]
    fn test_validate_extent_rejects_bad_polygons() {
        let flat = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0), (x: 2.0, y: 2.0)];
        assert_eq!(
            validate_extent(&MultiPolygon::new(vec![flat])),
            Err("zero area".to_string())
        );

        let nan = polygon![(x: 0.0, y: 0.0), (x: f64::NAN, y: 1.0), (x: 2.0, y: 0.0)];
        assert!(validate_extent(&MultiPolygon::new(vec![nan])).is_err());

        assert!(validate_extent(&MultiPolygon::new(vec![])).is_err());

        let bowtie = polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 2.5), (x: 4.0, y: 0.0), (x: 0.0, y: 0.8)];
        assert_eq!(
            validate_extent(&MultiPolygon::new(vec![bowtie])),
            Err("self-intersecting exterior ring".to_string())
        );

        // Two lobes pinched at (2, 2)
        let pinched = polygon![
            (x: 0.0, y: 0.0), (x: 2.0, y: 2.0), (x: 4.0, y: 0.0),
            (x: 4.0, y: 4.0), (x: 2.0, y: 2.0), (x: 0.0, y: 4.0),
        ];
        assert!(validate_extent(&MultiPolygon::new(vec![pinched])).is_err());

        let hole_crossing = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]),
            vec![LineString::from(vec![(2.0, 2.0), (8.0, 8.0), (8.0, 2.0), (2.0, 8.0)])],
        );
        assert_eq!(
            validate_extent(&MultiPolygon::new(vec![hole_crossing])),
            Err("self-intersecting interior ring 1".to_string())
        );

        let ok = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 0.0, y: 1.0)];
        assert!(validate_extent(&MultiPolygon::new(vec![ok])).is_ok());

        // Repeated vertices are not crossings
        let repeated = polygon![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0), (x: 0.0, y: 1.0),
        ];
        assert!(validate_extent(&MultiPolygon::new(vec![repeated])).is_ok());
    }

    #[test]
    fn test_assign_fire_rejects_bowtie_extent() {
        let index = index();
        let (_, cx, cy) = center_of(&index, 5_000.0, 5_000.0);
        let bowtie = FireInstance::from_polygon(
            FireId(8),
            1,
            polygon![
                (x: cx - 3_000.0, y: cy),
                (x: cx + 1_000.0, y: cy + 2_500.0),
                (x: cx + 1_000.0, y: cy),
                (x: cx - 3_000.0, y: cy + 800.0),
            ],
        );
        let ignition = IgnitionPoint::new(FireId(8), 1, cx, cy);
        let result = assign_fire(&index, FireId(8), &[&bowtie], &ignition, 0.0);
        assert!(matches!(
            result.unwrap_err().kind,
            AnomalyKind::MalformedExtent(_)
        ));
    }

    fn clip_failing_left_of_3000(subject: &Polygon<f64>, hexagon: &Polygon<f64>) -> f64 {
        assert!(subject.exterior().0[0].x >= 3_000.0, "clipping failed");
        intersection_area(subject, hexagon)
    }

    #[test]
    fn test_clipping_failure_skips_only_that_fire() {
        let index = index();
        let (cell, cx, cy) = center_of(&index, 5_000.0, 5_000.0);
        let (_, fx, fy) = center_of(&index, 2_000.0, 2_000.0);
        let apothem = index.geometry().apothem();

        let fires = vec![square(1, cx, cy + apothem, 10.0), square(2, fx, fy, 10.0)];
        let ignitions = vec![
            IgnitionPoint::new(FireId(1), 1, cx, cy),
            IgnitionPoint::new(FireId(2), 1, fx, fy),
        ];
        let config = PipelineConfig {
            parallel: false,
            ..PipelineConfig::default()
        };

        let outcome =
            assign_all_with(&index, &fires, &ignitions, &config, clip_failing_left_of_3000);
        assert_eq!(outcome.fires_assigned, 1);
        assert_eq!(
            outcome.anomalies,
            vec![GeometricAnomaly::new(
                FireId(2),
                AnomalyKind::OverlapFailure("clipping failed".to_string())
            )]
        );
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].fire_id, FireId(1));
        assert_eq!(outcome.records[0].origin, cell);
    }

    #[test]
    fn test_assign_fire_excludes_origin_cell() {
        let index = index();
        let (cell, cx, cy) = center_of(&index, 5_000.0, 5_000.0);
        let apothem = index.geometry().apothem();

        // Straddles the top edge of `cell`, ignited inside `cell`
        let fire = square(1, cx, cy + apothem, 10.0);
        let ignition = IgnitionPoint::new(FireId(1), 1, cx, cy);
        let records = assign_fire(&index, FireId(1), &[&fire], &ignition, 0.0).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].origin, cell);
        assert_ne!(records[0].touched, cell);
    }

    #[test]
    fn test_assign_fire_anomalies() {
        let index = index();
        let (_, cx, cy) = center_of(&index, 5_000.0, 5_000.0);
        let fire = square(3, cx, cy, 10.0);

        let missing = assign_fire(
            &index,
            FireId(3),
            &[],
            &IgnitionPoint::new(FireId(3), 1, cx, cy),
            0.0,
        );
        assert_eq!(missing.unwrap_err().kind, AnomalyKind::NoFireExtent);

        let outside = assign_fire(
            &index,
            FireId(3),
            &[&fire],
            &IgnitionPoint::new(FireId(3), 1, -1.0e6, cy),
            0.0,
        );
        assert_eq!(outside.unwrap_err().kind, AnomalyKind::IgnitionOutsideGrid);

        let vertex = index.cells()[0].boundary.exterior().0[3];
        let on_edge = assign_fire(
            &index,
            FireId(3),
            &[&fire],
            &IgnitionPoint::new(FireId(3), 1, vertex.x, vertex.y),
            0.0,
        );
        assert_eq!(on_edge.unwrap_err().kind, AnomalyKind::IgnitionOnBoundary);
    }

    #[test]
    fn test_assign_all_parallel_matches_sequential() {
        let index = index();
        let (_, cx, cy) = center_of(&index, 5_000.0, 5_000.0);
        let v = index.geometry().v_step;

        let fires: Vec<FireInstance> = (0..20)
            .map(|i| square(i, cx, cy + f64::from(i) * 100.0, 700.0))
            .collect();
        let ignitions: Vec<IgnitionPoint> = (0..20)
            .map(|i| IgnitionPoint::new(FireId(i), 1, cx, cy + v))
            .collect();

        let parallel = assign_all(&index, &fires, &ignitions, &PipelineConfig::default());
        let sequential = assign_all(
            &index,
            &fires,
            &ignitions,
            &PipelineConfig {
                parallel: false,
                ..PipelineConfig::default()
            },
        );
        assert_eq!(parallel, sequential);
        assert_eq!(parallel.fires_seen, 20);
        assert!(parallel.anomalies.is_empty());
    }

    #[test]
    fn test_assign_all_uses_first_ignition_and_groups_iterations() {
        let index = index();
        let (cell, cx, cy) = center_of(&index, 5_000.0, 5_000.0);
        let (far, fx, fy) = center_of(&index, 2_000.0, 2_000.0);
        let (neighbor, nx, ny) = center_of(&index, cx, cy + index.geometry().v_step);

        // Two iterations of fire 7: one inside `cell`, one inside `far`
        let mut second = square(7, fx, fy, 10.0);
        second.iteration = 2;
        let fires = vec![square(7, cx, cy, 10.0), second];
        let ignitions = vec![
            IgnitionPoint::new(FireId(7), 1, nx, ny),
            IgnitionPoint::new(FireId(7), 2, cx, cy),
        ];

        let outcome = assign_all(&index, &fires, &ignitions, &PipelineConfig::default());
        assert_eq!(outcome.fires_seen, 1);
        assert_eq!(outcome.duplicate_ignitions, 1);

        let mut expected = vec![
            JoinRecord {
                fire_id: FireId(7),
                touched: cell,
                origin: neighbor,
            },
            JoinRecord {
                fire_id: FireId(7),
                touched: far,
                origin: neighbor,
            },
        ];
        expected.sort_by_key(|r| r.touched);
        assert_eq!(outcome.records, expected);
    }
}
