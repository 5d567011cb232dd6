//! Minimal GeoJSON reading and writing
//!
//! Only the geometry types the pipeline exchanges are modelled. Positions may
//! carry a third (z) ordinate, which is ignored.

use crate::error::IoError;
use geo::{Coord, LineString, MultiPolygon, Polygon};
use pij_core::{FireId, FireInstance};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

type Position = Vec<f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    LineString { coordinates: Vec<Position> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
}

#[derive(Debug, Deserialize)]
struct InputCollection {
    features: Vec<InputFeature>,
}

#[derive(Debug, Deserialize)]
struct InputFeature {
    #[serde(default)]
    properties: Option<FireProperties>,
    geometry: Option<Geometry>,
}

/// Burn-P3 style attributes; numbers may arrive as floats
#[derive(Debug, Deserialize)]
struct FireProperties {
    fire: f64,
    #[serde(default)]
    iteration: f64,
}

#[derive(Debug, Serialize)]
struct OutputFeature<'a, P: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    properties: &'a P,
    geometry: Geometry,
}

#[derive(Debug, Serialize)]
struct OutputCollection<'a, P: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    features: Vec<OutputFeature<'a, P>>,
}

/// Non-negative integral number as an ID
pub fn to_id(value: f64) -> Option<u32> {
    (value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX))
        .then_some(value as u32)
}

fn to_coord(position: &[f64], source: &str) -> Result<Coord<f64>, IoError> {
    match position {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => Err(IoError::parse(
            source,
            format!("position with {} ordinates", position.len()),
        )),
    }
}

fn to_ring(ring: &[Position], source: &str) -> Result<LineString<f64>, IoError> {
    ring.iter()
        .map(|p| to_coord(p, source))
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::from)
}

fn to_polygon(rings: &[Vec<Position>], source: &str) -> Result<Polygon<f64>, IoError> {
    let mut rings = rings.iter().map(|r| to_ring(r, source));
    let exterior = rings
        .next()
        .transpose()?
        .unwrap_or_else(|| LineString::new(vec![]));
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

/// Convert a polygonal GeoJSON geometry; a missing geometry yields an empty extent
fn to_extent(geometry: Option<&Geometry>, source: &str) -> Result<MultiPolygon<f64>, IoError> {
    match geometry {
        None => Ok(MultiPolygon::new(vec![])),
        Some(Geometry::Polygon { coordinates }) => {
            Ok(MultiPolygon::new(vec![to_polygon(coordinates, source)?]))
        }
        Some(Geometry::MultiPolygon { coordinates }) => coordinates
            .iter()
            .map(|p| to_polygon(p, source))
            .collect::<Result<Vec<_>, _>>()
            .map(MultiPolygon::new),
        Some(other) => Err(IoError::parse(
            source,
            format!("expected Polygon or MultiPolygon, got {}", type_name(other)),
        )),
    }
}

fn type_name(geometry: &Geometry) -> &'static str {
    match geometry {
        Geometry::Point { .. } => "Point",
        Geometry::LineString { .. } => "LineString",
        Geometry::Polygon { .. } => "Polygon",
        Geometry::MultiPolygon { .. } => "MultiPolygon",
    }
}

/// Parse a fire-extent `FeatureCollection` with `fire` and `iteration` properties
///
/// # Errors
///
/// Returns `IoError::Parse` for invalid JSON, missing or non-integral IDs and
/// non-polygonal geometries.
pub fn parse_fires(text: &str) -> Result<Vec<FireInstance>, IoError> {
    let collection: InputCollection =
        serde_json::from_str(text).map_err(|e| IoError::parse("fire collection", e.to_string()))?;

    collection
        .features
        .iter()
        .enumerate()
        .map(|(i, feature)| {
            let source = format!("fire feature #{i}");
            let props = feature
                .properties
                .as_ref()
                .ok_or_else(|| IoError::parse(&source, "missing properties"))?;
            let fire = to_id(props.fire)
                .ok_or_else(|| IoError::parse(&source, format!("invalid fire id {}", props.fire)))?;
            let iteration = to_id(props.iteration).ok_or_else(|| {
                IoError::parse(&source, format!("invalid iteration {}", props.iteration))
            })?;
            let extent = to_extent(feature.geometry.as_ref(), &source)?;
            Ok(FireInstance::new(FireId(fire), iteration, extent))
        })
        .collect()
}

/// Read a fire-extent GeoJSON file
///
/// # Errors
///
/// Returns `IoError` if the file cannot be read or parsed.
pub fn read_fires(path: &Path) -> Result<Vec<FireInstance>, IoError> {
    let text = fs::read_to_string(path).map_err(|e| IoError::file(path, &e))?;
    let fires = parse_fires(&text)?;
    info!("Read {} fire extents from {}", fires.len(), path.display());
    Ok(fires)
}

pub fn point_geometry(coord: Coord<f64>) -> Geometry {
    Geometry::Point {
        coordinates: vec![coord.x, coord.y],
    }
}

pub fn line_geometry(start: Coord<f64>, end: Coord<f64>) -> Geometry {
    Geometry::LineString {
        coordinates: vec![vec![start.x, start.y], vec![end.x, end.y]],
    }
}

pub fn polygon_geometry(polygon: &Polygon<f64>) -> Geometry {
    let ring = |ls: &LineString<f64>| ls.0.iter().map(|c| vec![c.x, c.y]).collect::<Vec<_>>();
    let mut rings = vec![ring(polygon.exterior())];
    rings.extend(polygon.interiors().iter().map(ring));
    Geometry::Polygon { coordinates: rings }
}

/// Write `(properties, geometry)` pairs as a `FeatureCollection`
///
/// # Errors
///
/// Returns `IoError` if serialization or the write fails.
pub fn write_collection<P: Serialize>(
    path: &Path,
    features: impl IntoIterator<Item = (P, Geometry)>,
) -> Result<(), IoError> {
    let owned: Vec<(P, Geometry)> = features.into_iter().collect();
    let collection = OutputCollection {
        kind: "FeatureCollection",
        features: owned
            .iter()
            .map(|(properties, geometry)| OutputFeature {
                kind: "Feature",
                properties,
                geometry: geometry.clone(),
            })
            .collect(),
    };
    let text =
        serde_json::to_string(&collection).map_err(|e| IoError::Serialize(e.to_string()))?;
    fs::write(path, text).map_err(|e| IoError::file(path, &e))?;
    debug!("Wrote {} features to {}", owned.len(), path.display());
    Ok(())
}
