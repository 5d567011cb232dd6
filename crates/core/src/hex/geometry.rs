//! Flat-top regular hexagon geometry derived from a target cell area
//!
//! All tessellation spacing follows from the edge length `l` of a regular
//! hexagon with area `A`:
//!
//! - `l = 3^(1/4) * sqrt(2A / 9)`
//! - row spacing (center to center within a column) `v = sqrt(3) * l`
//! - column spacing `h = 1.5 * l`
//!
//! Vertices sit at 0°, 60°, ... 300° from the center, so the top and bottom
//! edges are horizontal.

use geo::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

/// Number of corners on a hexagon
pub const HEX_CORNERS: usize = 6;

/// Spacing constants for a hexagon of a given area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HexGeometry {
    /// Target area of one cell (squared coordinate units)
    pub cell_area: f64,
    /// Edge length, equal to the circumradius
    pub edge: f64,
    /// Horizontal distance between adjacent column centers
    pub h_step: f64,
    /// Vertical distance between adjacent row centers in one column
    pub v_step: f64,
}

impl HexGeometry {
    /// Derive hexagon spacing from the configured cell area
    ///
    /// The caller is responsible for passing a positive, finite area;
    /// `PipelineConfig::validate` checks this before a grid is built.
    pub fn from_area(cell_area: f64) -> Self {
        let edge = 3.0_f64.powf(0.25) * (2.0 * cell_area / 9.0).sqrt();
        Self {
            cell_area,
            edge,
            h_step: 1.5 * edge,
            v_step: 3.0_f64.sqrt() * edge,
        }
    }

    /// Corner coordinates of the hexagon centered at `center`, counter-clockwise from 0°
    pub fn corners(&self, center: Coord<f64>) -> [Coord<f64>; HEX_CORNERS] {
        let mut out = [center; HEX_CORNERS];
        for (i, corner) in out.iter_mut().enumerate() {
            let angle = (60.0 * i as f64).to_radians();
            *corner = Coord {
                x: center.x + angle.cos() * self.edge,
                y: center.y + angle.sin() * self.edge,
            };
        }
        out
    }

    /// Closed boundary polygon of the hexagon centered at `center`
    pub fn boundary(&self, center: Coord<f64>) -> Polygon<f64> {
        let corners = self.corners(center);
        // LineString -> Polygon closes the ring by repeating the first corner
        Polygon::new(LineString::from(corners.to_vec()), vec![])
    }

    /// Half the hexagon's height (apothem), i.e. center to flat edge
    #[inline]
    pub fn apothem(&self) -> f64 {
        self.v_step / 2.0
    }
}
