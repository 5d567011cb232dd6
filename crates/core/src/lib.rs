//! Fire-Spread Adjacency Core Library
//!
//! Turns many simulated wildfire perimeters and their ignition points into a
//! directed, weighted graph over a regular hexagonal tessellation: for each pair
//! of cells (j, i), how many distinct fires that ignited in cell j burned into
//! cell i.
//!
//! ## Pipeline
//!
//! 1. [`hex`] - hexagon geometry from a target cell area and a brick-pattern
//!    tiling covering the study extent plus a one-cell margin
//! 2. [`grid`] - cells with stable 1-based IDs and overlap/containment queries
//! 3. [`assignment`] - per-fire origin cell and touched cells, failures isolated per fire
//! 4. [`aggregation`] - distinct-fire counts per directed cell pair
//! 5. [`arcs`] - centroid-to-centroid line segments for export
//!
//! [`pipeline::run`] drives all five stages. File formats and coordinate
//! reference systems are the host program's concern; every geometry handed to
//! the library must already share one projected coordinate system.

pub mod aggregation;
pub mod arcs;
pub mod assignment;
pub mod config;
pub mod error;
pub mod grid;
pub mod hex;
pub mod pipeline;
pub mod types;

// Re-export the main entry points
pub use aggregation::aggregate;
pub use arcs::{materialize_arcs, SpreadArc};
pub use assignment::{assign_all, assign_fire, AssignmentOutcome};
pub use config::PipelineConfig;
pub use error::{AnomalyKind, ConfigError, GeometricAnomaly, PipelineError};
pub use grid::{Cell, CellIndex, Containment};
pub use hex::{generate_grid, HexGeometry, HexLayout};
pub use pipeline::{extent_bounds, run, run_with_bounds, PipelineOutput, RunReport};
pub use types::{Bounds, CellId, DirectedCount, FireId, FireInstance, IgnitionPoint, JoinRecord};
