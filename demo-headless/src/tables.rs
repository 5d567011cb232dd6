//! Delimited text inputs and outputs
//!
//! Ignitions arrive as comma-separated text with a header row. The burning
//! event and pair count tables are tab-separated.

use crate::error::IoError;
use crate::geojson::to_id;
use pij_core::{DirectedCount, FireId, IgnitionPoint, JoinRecord};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

const IGNITION_COLUMNS: [&str; 4] = ["fire", "iteration", "x_coord", "y_coord"];

fn column_positions(header: &str) -> Result<[usize; 4], IoError> {
    let names: Vec<&str> = header.split(',').map(|s| s.trim().trim_matches('"')).collect();
    let mut positions = [0; 4];
    for (slot, wanted) in positions.iter_mut().zip(IGNITION_COLUMNS) {
        *slot = names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| IoError::parse("ignition header", format!("missing column '{wanted}'")))?;
    }
    Ok(positions)
}

fn field<'a>(fields: &[&'a str], position: usize, line: usize) -> Result<&'a str, IoError> {
    fields
        .get(position)
        .map(|s| s.trim().trim_matches('"'))
        .ok_or_else(|| IoError::parse(format!("ignition line {line}"), "too few fields"))
}

fn number(text: &str, line: usize) -> Result<f64, IoError> {
    text.parse::<f64>()
        .map_err(|e| IoError::parse(format!("ignition line {line}"), format!("'{text}': {e}")))
}

fn id(text: &str, line: usize) -> Result<u32, IoError> {
    let value = number(text, line)?;
    to_id(value).ok_or_else(|| {
        IoError::parse(format!("ignition line {line}"), format!("invalid id {value}"))
    })
}

/// Parse ignition rows with `fire`, `iteration`, `x_coord` and `y_coord` columns
///
/// Columns are located by header name; extra columns and blank lines are
/// ignored.
///
/// # Errors
///
/// Returns `IoError::Parse` for a missing column or an unreadable value.
pub fn parse_ignitions(reader: impl BufRead) -> Result<Vec<IgnitionPoint>, IoError> {
    let mut lines = reader.lines().enumerate();
    let header = match lines.next() {
        Some((_, line)) => line.map_err(|e| IoError::parse("ignition header", e.to_string()))?,
        None => return Ok(Vec::new()),
    };
    let [fire, iteration, x, y] = column_positions(header.trim_start_matches('\u{feff}'))?;

    let mut ignitions = Vec::new();
    for (i, line) in lines {
        let number_in_file = i + 1;
        let line = line
            .map_err(|e| IoError::parse(format!("ignition line {number_in_file}"), e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        ignitions.push(IgnitionPoint::new(
            FireId(id(field(&fields, fire, number_in_file)?, number_in_file)?),
            id(field(&fields, iteration, number_in_file)?, number_in_file)?,
            number(field(&fields, x, number_in_file)?, number_in_file)?,
            number(field(&fields, y, number_in_file)?, number_in_file)?,
        ));
    }
    Ok(ignitions)
}

/// Read an ignition CSV file
///
/// # Errors
///
/// Returns `IoError` if the file cannot be opened or parsed.
pub fn read_ignitions(path: &Path) -> Result<Vec<IgnitionPoint>, IoError> {
    let file = File::open(path).map_err(|e| IoError::file(path, &e))?;
    let ignitions = parse_ignitions(BufReader::new(file))?;
    info!("Read {} ignitions from {}", ignitions.len(), path.display());
    Ok(ignitions)
}

/// Burning events as `touched\torigin\tfire`, ordered by fire then touched cell
pub fn write_burning_events(out: &mut impl Write, records: &[JoinRecord]) -> std::io::Result<()> {
    let mut rows = records.to_vec();
    rows.sort_by_key(|r| (r.fire_id, r.touched, r.origin));
    writeln!(out, "touched\torigin\tfire")?;
    for r in rows {
        writeln!(out, "{}\t{}\t{}", r.touched, r.origin, r.fire_id)?;
    }
    Ok(())
}

/// Directed counts as headerless `origin\ttouched\tcount` rows, in the given order
pub fn write_pair_counts(out: &mut impl Write, counts: &[DirectedCount]) -> std::io::Result<()> {
    for c in counts {
        writeln!(out, "{}\t{}\t{}", c.origin, c.touched, c.count)?;
    }
    Ok(())
}

/// Create `path` and hand a buffered writer to `write`
///
/// # Errors
///
/// Returns `IoError::File` if creating, writing or flushing fails.
pub fn write_table(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
) -> Result<(), IoError> {
    let file = File::create(path).map_err(|e| IoError::file(path, &e))?;
    let mut out = BufWriter::new(file);
    write(&mut out)
        .and_then(|()| out.flush())
        .map_err(|e| IoError::file(path, &e))
}
