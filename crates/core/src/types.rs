//! Identifiers and records shared by every pipeline stage

use geo::{MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable 1-based cell identifier, assigned in grid emission order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(pub u32);

impl CellId {
    /// Position of the cell in the index's storage
    #[inline]
    pub fn index(self) -> usize {
        (self.0 as usize).saturating_sub(1)
    }

    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32 + 1)
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one simulated fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FireId(pub u32);

impl fmt::Display for FireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One simulated fire's burned-area snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct FireInstance {
    pub fire_id: FireId,
    pub iteration: u32,
    pub extent: MultiPolygon<f64>,
}

impl FireInstance {
    pub fn new(fire_id: FireId, iteration: u32, extent: impl Into<MultiPolygon<f64>>) -> Self {
        Self {
            fire_id,
            iteration,
            extent: extent.into(),
        }
    }

    /// Convenience constructor for single-polygon extents
    pub fn from_polygon(fire_id: FireId, iteration: u32, polygon: Polygon<f64>) -> Self {
        Self::new(fire_id, iteration, MultiPolygon::new(vec![polygon]))
    }
}

/// Simulated origin location of a fire
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IgnitionPoint {
    pub fire_id: FireId,
    /// Carried through but not used to disambiguate ignitions
    pub iteration: u32,
    pub location: Point<f64>,
}

impl IgnitionPoint {
    pub fn new(fire_id: FireId, iteration: u32, x: f64, y: f64) -> Self {
        Self {
            fire_id,
            iteration,
            location: Point::new(x, y),
        }
    }
}

/// A fire whose burned area touched `touched` after igniting in `origin`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JoinRecord {
    pub fire_id: FireId,
    pub touched: CellId,
    pub origin: CellId,
}

/// Number of distinct fires igniting in `origin` that reached `touched`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectedCount {
    pub origin: CellId,
    pub touched: CellId,
    pub count: u32,
}

/// Axis-aligned rectangle in the shared projected coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Bounds {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Finite with strictly positive width and height
    pub fn is_usable(&self) -> bool {
        [self.xmin, self.ymin, self.xmax, self.ymax]
            .iter()
            .all(|v| v.is_finite())
            && self.width() > 0.0
            && self.height() > 0.0
    }

    /// True when the rectangles share at least one point (edges included)
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.xmin <= other.xmax
            && other.xmin <= self.xmax
            && self.ymin <= other.ymax
            && other.ymin <= self.ymax
    }

    /// Smallest rectangle containing both `self` and `other`
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            xmin: self.xmin.min(other.xmin),
            ymin: self.ymin.min(other.ymin),
            xmax: self.xmax.max(other.xmax),
            ymax: self.ymax.max(other.ymax),
        }
    }
}

impl From<geo::Rect<f64>> for Bounds {
    fn from(rect: geo::Rect<f64>) -> Self {
        Bounds::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}
