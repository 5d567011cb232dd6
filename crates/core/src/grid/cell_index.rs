//! Identified hexagon cells and the geometric queries run against them
//!
//! Candidate cells for a query are found from the tessellation's column/row
//! lattice, then confirmed with exact polygon predicates from `geo`.

use crate::config::PipelineConfig;
use crate::error::{AnomalyKind, ConfigError};
use crate::hex::{estimate_cell_count, generate_grid, HexGeometry, HexLayout};
use crate::types::{Bounds, CellId};
use geo::{Area, BooleanOps, BoundingRect, Contains, Coord, Intersects, MultiPolygon, Point, Polygon};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, info};

/// Intersection areas at or below this fraction of a cell are treated as
/// zero-area contact (shared edge or vertex) rather than overlap
pub const ZERO_AREA_TOLERANCE: f64 = 1e-9;

/// Points closer than this fraction of the edge length to a cell's boundary
/// count as on the seam
pub const SEAM_TOLERANCE: f64 = 1e-9;

/// One hexagon of the tessellation
#[derive(Debug, Clone)]
pub struct Cell {
    pub id: CellId,
    pub center: Coord<f64>,
    pub boundary: Polygon<f64>,
}

impl Cell {
    /// Hexagon centroid; equal to the generating center by construction
    #[inline]
    pub fn centroid(&self) -> Point<f64> {
        Point::from(self.center)
    }
}

/// Result of locating an ignition point on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    /// Strictly inside this cell
    Inside(CellId),
    /// On an edge or vertex of at least one cell, inside none
    OnBoundary,
    /// Not within any cell
    Outside,
}

impl Containment {
    pub fn cell(self) -> Option<CellId> {
        match self {
            Containment::Inside(id) => Some(id),
            Containment::OnBoundary | Containment::Outside => None,
        }
    }
}

/// Immutable set of cells, built once per run and shared read-only
#[derive(Debug, Clone)]
pub struct CellIndex {
    layout: HexLayout,
    cells: Vec<Cell>,
}

impl CellIndex {
    /// Tessellate `bounds` with hexagons of `config.cell_area`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the config is invalid, the bounds are
    /// degenerate, or the grid would exceed `config.max_cells`.
    pub fn build(config: &PipelineConfig, bounds: &Bounds) -> Result<Self, ConfigError> {
        config.validate()?;
        if !bounds.is_usable() {
            return Err(ConfigError::DegenerateBounds {
                xmin: bounds.xmin,
                ymin: bounds.ymin,
                xmax: bounds.xmax,
                ymax: bounds.ymax,
            });
        }

        let geometry = HexGeometry::from_area(config.cell_area);
        let estimate = estimate_cell_count(&geometry, bounds);
        if !estimate.is_finite() || estimate > config.max_cells as f64 {
            return Err(ConfigError::GridTooLarge {
                cells: estimate,
                limit: config.max_cells,
            });
        }

        let layout = generate_grid(&geometry, bounds)?;
        info!(
            "Hexagon grid generated: {} cells in {} columns, edge={:.3}",
            layout.len(),
            layout.columns.len(),
            geometry.edge
        );
        Ok(Self::from_layout(layout))
    }

    /// Wrap an already generated layout, numbering cells in emission order
    pub fn from_layout(layout: HexLayout) -> Self {
        let geometry = layout.geometry;
        let cells = layout
            .centers
            .iter()
            .enumerate()
            .map(|(i, &center)| Cell {
                id: CellId::from_index(i),
                center,
                boundary: geometry.boundary(center),
            })
            .collect();
        Self { layout, cells }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn geometry(&self) -> &HexGeometry {
        &self.layout.geometry
    }

    pub fn layout(&self) -> &HexLayout {
        &self.layout
    }

    pub fn get(&self, id: CellId) -> Option<&Cell> {
        if id.0 == 0 {
            return None;
        }
        self.cells.get(id.index())
    }

    /// Center point of a cell, `None` for unknown IDs
    pub fn centroid_of(&self, id: CellId) -> Option<Point<f64>> {
        self.get(id).map(Cell::centroid)
    }

    /// Axis-aligned box of a cell's hexagon
    fn cell_bounds(&self, cell: &Cell) -> Bounds {
        let geometry = self.geometry();
        Bounds::new(
            cell.center.x - geometry.edge,
            cell.center.y - geometry.apothem(),
            cell.center.x + geometry.edge,
            cell.center.y + geometry.apothem(),
        )
    }

    /// Cells whose hexagons may intersect `query`
    fn candidates(&self, query: Bounds) -> impl Iterator<Item = &Cell> + '_ {
        let columns = self.layout.columns_near(query.xmin, query.xmax);
        self.layout.columns[columns]
            .iter()
            .flat_map(move |column| {
                let rows = self.layout.rows_near(column, query.ymin, query.ymax);
                self.cells[rows].iter()
            })
            .filter(move |cell| self.cell_bounds(cell).intersects(&query))
    }

    /// Cells sharing more than a zero-area boundary with `extent`
    ///
    /// A cell is included when its intersection with any polygon of the
    /// extent has area strictly greater than `min_overlap_area`. The threshold
    /// never drops below `cell_area * ZERO_AREA_TOLERANCE`, so genuine slivers
    /// smaller than that (about 0.001 square units at a cell area of 1e6) are
    /// dropped together with edge-only contact. IDs come back ascending.
    ///
    /// # Errors
    ///
    /// Returns `AnomalyKind::MalformedExtent` for an extent without a bounding
    /// box and `AnomalyKind::OverlapFailure` if polygon clipping fails.
    pub fn cells_overlapping(
        &self,
        extent: &MultiPolygon<f64>,
        min_overlap_area: f64,
    ) -> Result<Vec<CellId>, AnomalyKind> {
        self.cells_overlapping_with(extent, min_overlap_area, intersection_area)
    }

    /// `cells_overlapping` with the clipping routine supplied by the caller
    pub(crate) fn cells_overlapping_with(
        &self,
        extent: &MultiPolygon<f64>,
        min_overlap_area: f64,
        clip: ClipArea,
    ) -> Result<Vec<CellId>, AnomalyKind> {
        let threshold = min_overlap_area.max(self.geometry().cell_area * ZERO_AREA_TOLERANCE);
        let mut touched = Vec::new();

        for polygon in &extent.0 {
            let rect = polygon
                .bounding_rect()
                .ok_or_else(|| AnomalyKind::MalformedExtent("empty polygon".to_string()))?;
            let query = Bounds::from(rect);

            for cell in self.candidates(query) {
                if !cell.boundary.intersects(polygon) {
                    continue;
                }
                let area = clipped_area(polygon, &cell.boundary, clip)?;
                if area > threshold {
                    touched.push(cell.id);
                }
            }
        }

        touched.sort_unstable();
        touched.dedup();
        debug!("Extent overlaps {} cells", touched.len());
        Ok(touched)
    }

    /// Locate the cell strictly containing `point`
    ///
    /// Points on a shared edge or vertex are contained by no cell and report
    /// `OnBoundary`. Neighboring hexagons compute their shared edge
    /// independently, so a point in the sub-ulp gap between them is also
    /// reported as `OnBoundary` rather than `Outside`. Should floating-point
    /// noise place a point strictly inside two hexagons, the lowest cell ID
    /// wins.
    pub fn cell_containing(&self, point: Point<f64>) -> Containment {
        if !point.x().is_finite() || !point.y().is_finite() {
            return Containment::Outside;
        }
        let query = Bounds::new(point.x(), point.y(), point.x(), point.y());

        let tolerance = self.geometry().edge * SEAM_TOLERANCE;
        let mut inside: Option<CellId> = None;
        let mut on_boundary = false;
        for cell in self.candidates(query) {
            if cell.boundary.contains(&point) {
                inside = Some(inside.map_or(cell.id, |best| best.min(cell.id)));
            } else if cell.boundary.intersects(&point)
                || distance_to_ring(cell, point) <= tolerance
            {
                on_boundary = true;
            }
        }

        match inside {
            Some(id) => Containment::Inside(id),
            None if on_boundary => Containment::OnBoundary,
            None => Containment::Outside,
        }
    }
}

/// Shortest distance from `point` to the boundary ring of `cell`
fn distance_to_ring(cell: &Cell, point: Point<f64>) -> f64 {
    let p = Coord::from(point);
    cell.boundary
        .exterior()
        .lines()
        .map(|line| {
            let d = line.delta();
            let len2 = d.x * d.x + d.y * d.y;
            let t = if len2 > 0.0 {
                (((p.x - line.start.x) * d.x + (p.y - line.start.y) * d.y) / len2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let nearest_x = line.start.x + t * d.x;
            let nearest_y = line.start.y + t * d.y;
            ((p.x - nearest_x).powi(2) + (p.y - nearest_y).powi(2)).sqrt()
        })
        .fold(f64::INFINITY, f64::min)
}

/// Area of the intersection of an extent polygon with a hexagon
pub(crate) type ClipArea = fn(&Polygon<f64>, &Polygon<f64>) -> f64;

pub(crate) fn intersection_area(subject: &Polygon<f64>, hexagon: &Polygon<f64>) -> f64 {
    subject.intersection(hexagon).unsigned_area()
}

/// Run `clip`, turning panics and non-finite areas into anomalies
fn clipped_area(
    subject: &Polygon<f64>,
    hexagon: &Polygon<f64>,
    clip: ClipArea,
) -> Result<f64, AnomalyKind> {
    let area = catch_unwind(AssertUnwindSafe(|| clip(subject, hexagon))).map_err(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "polygon clipping panicked".to_string());
        AnomalyKind::OverlapFailure(reason)
    })?;
    if area.is_finite() {
        Ok(area)
    } else {
        Err(AnomalyKind::OverlapFailure(format!("clipped area is {area}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn index() -> CellIndex {
        let config = PipelineConfig::with_cell_area(1_000_000.0);
        CellIndex::build(&config, &Bounds::new(0.0, 0.0, 10_000.0, 10_000.0)).unwrap()
    }

    fn square(cx: f64, cy: f64, half: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: cx - half, y: cy - half),
            (x: cx + half, y: cy - half),
            (x: cx + half, y: cy + half),
            (x: cx - half, y: cy + half),
        ]])
    }

    #[test]
    fn test_ids_follow_emission_order() {
        let index = index();
        for (i, cell) in index.cells().iter().enumerate() {
            assert_eq!(cell.id.0 as usize, i + 1);
            assert_eq!(cell.center, index.layout().centers[i]);
        }
        assert!(index.get(CellId(0)).is_none());
        assert!(index.get(CellId(index.len() as u32 + 1)).is_none());
    }

    #[test]
    fn test_center_point_is_inside_its_cell() {
        let index = index();
        for cell in index.cells() {
            assert_eq!(index.cell_containing(cell.centroid()), Containment::Inside(cell.id));
        }
    }

    #[test]
    fn test_vertex_point_is_on_boundary() {
        let index = index();
        // Leftmost vertex of the first cell: no neighbor further left
        let cell = &index.cells()[0];
        let vertex = cell.boundary.exterior().0[3];
        assert_eq!(index.cell_containing(Point::from(vertex)), Containment::OnBoundary);
    }

    #[test]
    fn test_shared_edge_point_is_never_outside() {
        let index = index();
        let cell = index.cell_containing(Point::new(5_000.0, 5_000.0)).cell().unwrap();
        let center = index.get(cell).unwrap().center;
        let above = index
            .cell_containing(Point::new(center.x, center.y + index.geometry().v_step))
            .cell()
            .unwrap();

        let ring = &index.get(cell).unwrap().boundary.exterior().0;
        let mid = Point::new((ring[1].x + ring[2].x) / 2.0, (ring[1].y + ring[2].y) / 2.0);
        match index.cell_containing(mid) {
            Containment::OnBoundary => {}
            Containment::Inside(id) => assert!(id == cell || id == above),
            Containment::Outside => panic!("seam point reported outside the grid"),
        }
    }

    #[test]
    fn test_far_point_is_outside() {
        let index = index();
        assert_eq!(
            index.cell_containing(Point::new(1.0e7, 1.0e7)),
            Containment::Outside
        );
        assert_eq!(
            index.cell_containing(Point::new(f64::NAN, 0.0)),
            Containment::Outside
        );
    }

    #[test]
    fn test_small_extent_overlaps_single_cell() {
        let index = index();
        let cell = index.cell_containing(Point::new(5_000.0, 5_000.0)).cell().unwrap();
        let center = index.get(cell).unwrap().center;

        let touched = index.cells_overlapping(&square(center.x, center.y, 50.0), 0.0).unwrap();
        assert_eq!(touched, vec![cell]);
    }

    #[test]
    fn test_extent_straddling_top_edge_overlaps_two_cells() {
        let index = index();
        let cell = index.cell_containing(Point::new(5_000.0, 5_000.0)).cell().unwrap();
        let center = index.get(cell).unwrap().center;
        let geometry = *index.geometry();
        let above = index
            .cell_containing(Point::new(center.x, center.y + geometry.v_step))
            .cell()
            .unwrap();

        let extent = square(center.x, center.y + geometry.apothem(), 10.0);
        let touched = index.cells_overlapping(&extent, 0.0).unwrap();

        let mut expected = vec![cell, above];
        expected.sort_unstable();
        assert_eq!(touched, expected);
    }

    #[test]
    fn test_cell_boundary_as_extent_excludes_neighbors() {
        let index = index();
        let cell = index.cell_containing(Point::new(5_000.0, 5_000.0)).cell().unwrap();
        let extent = MultiPolygon::new(vec![index.get(cell).unwrap().boundary.clone()]);

        // Neighbors only share edges with the extent
        let touched = index.cells_overlapping(&extent, 0.0).unwrap();
        assert_eq!(touched, vec![cell]);
    }

    #[test]
    fn test_threshold_filters_slivers() {
        let index = index();
        let cell = index.cell_containing(Point::new(5_000.0, 5_000.0)).cell().unwrap();
        let center = index.get(cell).unwrap().center;
        let geometry = *index.geometry();

        // 20 x 20 square: 10 x 20 = 200 units in each of the two cells
        let extent = square(center.x, center.y + geometry.apothem(), 10.0);
        assert_eq!(index.cells_overlapping(&extent, 150.0).unwrap().len(), 2);
        assert!(index.cells_overlapping(&extent, 250.0).unwrap().is_empty());
    }

    fn failing_clip(_: &Polygon<f64>, _: &Polygon<f64>) -> f64 {
        panic!("clipping failed")
    }

    fn nan_clip(_: &Polygon<f64>, _: &Polygon<f64>) -> f64 {
        f64::NAN
    }

    #[test]
    fn test_clipping_failures_become_overlap_anomalies() {
        let index = index();
        let extent = square(5_000.0, 5_000.0, 50.0);

        assert_eq!(
            index.cells_overlapping_with(&extent, 0.0, failing_clip),
            Err(AnomalyKind::OverlapFailure("clipping failed".to_string()))
        );
        assert!(matches!(
            index.cells_overlapping_with(&extent, 0.0, nan_clip),
            Err(AnomalyKind::OverlapFailure(_))
        ));
        assert!(index.cells_overlapping_with(&extent, 0.0, intersection_area).is_ok());
    }

    #[test]
    fn test_overlap_floor_scales_with_cell_area() {
        let index = index();
        let cell = index.cell_containing(Point::new(5_000.0, 5_000.0)).cell().unwrap();
        let center = index.get(cell).unwrap().center;
        let top = center.y + index.geometry().apothem();
        let above = index
            .cell_containing(Point::new(center.x, center.y + index.geometry().v_step))
            .cell()
            .unwrap();

        let strip = |width: f64, reach: f64| {
            MultiPolygon::new(vec![polygon![
                (x: center.x - width / 2.0, y: top - 10.0),
                (x: center.x + width / 2.0, y: top - 10.0),
                (x: center.x + width / 2.0, y: top + reach),
                (x: center.x - width / 2.0, y: top + reach),
            ]])
        };

        // 100 x 0.001 = 0.1 square units above the seam: kept
        let mut expected = vec![cell, above];
        expected.sort_unstable();
        assert_eq!(index.cells_overlapping(&strip(100.0, 1e-3), 0.0).unwrap(), expected);

        // 1 x 0.0001 = 1e-4 square units: below the 1e-3 floor for 1e6 cells
        assert_eq!(index.cells_overlapping(&strip(1.0, 1e-4), 0.0).unwrap(), vec![cell]);
    }

    #[test]
    fn test_build_rejects_degenerate_bounds() {
        let config = PipelineConfig::default();
        let result = CellIndex::build(&config, &Bounds::new(0.0, 0.0, 0.0, 10.0));
        assert!(matches!(result, Err(ConfigError::DegenerateBounds { .. })));
    }

    #[test]
    fn test_build_rejects_coordinates_beyond_float_resolution() {
        let config = PipelineConfig::with_cell_area(1_000_000.0);
        let bounds = Bounds::new(1.0e20, 0.0, 1.0e20 + 65_536.0, 2_000.0);
        assert!(bounds.is_usable());
        assert!(matches!(
            CellIndex::build(&config, &bounds),
            Err(ConfigError::PrecisionLoss { .. })
        ));
    }

    #[test]
    fn test_build_rejects_huge_grid() {
        let config = PipelineConfig {
            cell_area: 1.0,
            max_cells: 1_000,
            ..PipelineConfig::default()
        };
        let result = CellIndex::build(&config, &Bounds::new(0.0, 0.0, 1_000.0, 1_000.0));
        assert!(matches!(result, Err(ConfigError::GridTooLarge { .. })));
    }
}
