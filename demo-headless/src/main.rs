mod error;
mod geojson;
mod tables;

use clap::Parser;
use error::IoError;
use geojson::{line_geometry, point_geometry, polygon_geometry, write_collection};
use pij_core::{run, PipelineConfig, PipelineOutput};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Count directed fire-spread pairs between hexagon cells
#[derive(Parser, Debug)]
#[command(name = "pij-headless")]
#[command(about = "Hexagon grid fire-spread adjacency counts", long_about = None)]
struct Args {
    /// Fire extents (GeoJSON `FeatureCollection` with `fire` and `iteration` properties)
    #[arg(short, long)]
    fires: PathBuf,

    /// Ignition points (CSV with `fire`, `iteration`, `x_coord` and `y_coord` columns)
    #[arg(short, long)]
    ignitions: PathBuf,

    /// Directory receiving every output artifact
    #[arg(short, long, default_value = "pij_output")]
    out_dir: PathBuf,

    /// Hexagon area in squared coordinate units (overrides the config file)
    #[arg(short = 'a', long)]
    cell_area: Option<f64>,

    /// Minimum overlap area for a cell to count as touched (overrides the config file)
    #[arg(long)]
    min_overlap_area: Option<f64>,

    /// Assign fires on a single thread
    #[arg(long)]
    sequential: bool,

    /// JSON file with pipeline parameters
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct NodeProperties {
    #[serde(rename = "Node_ID")]
    node_id: u32,
}

#[derive(Serialize)]
struct ArcProperties {
    #[serde(rename = "ignPt")]
    ign_pt: u32,
    #[serde(rename = "spreadPt")]
    spread_pt: u32,
    counts: u32,
}

/// Config file values with command-line overrides applied
fn load_config(args: &Args) -> Result<PipelineConfig, IoError> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| IoError::file(path, &e))?;
            parse_config(&text)?
        }
        None => PipelineConfig::default(),
    };
    if let Some(area) = args.cell_area {
        config.cell_area = area;
    }
    if let Some(min) = args.min_overlap_area {
        config.min_overlap_area = min;
    }
    if args.sequential {
        config.parallel = false;
    }
    Ok(config)
}

fn parse_config(text: &str) -> Result<PipelineConfig, IoError> {
    serde_json::from_str(text).map_err(|e| IoError::parse("config file", e.to_string()))
}

fn write_outputs(out_dir: &Path, output: &PipelineOutput) -> Result<(), IoError> {
    fs::create_dir_all(out_dir).map_err(|e| IoError::file(out_dir, &e))?;
    let cells = output.index.cells();

    write_collection(
        &out_dir.join("hexagons.geojson"),
        cells.iter().map(|c| {
            (
                NodeProperties { node_id: c.id.0 },
                polygon_geometry(&c.boundary),
            )
        }),
    )?;
    write_collection(
        &out_dir.join("nodes.geojson"),
        cells.iter().map(|c| {
            (
                NodeProperties { node_id: c.id.0 },
                point_geometry(c.centroid().0),
            )
        }),
    )?;
    write_collection(
        &out_dir.join("arcs.geojson"),
        output.arcs.iter().map(|a| {
            (
                ArcProperties {
                    ign_pt: a.origin.0,
                    spread_pt: a.touched.0,
                    counts: a.count,
                },
                line_geometry(a.line.start, a.line.end),
            )
        }),
    )?;

    tables::write_table(&out_dir.join("burning_events.txt"), |out| {
        tables::write_burning_events(out, &output.join_records)
    })?;
    tables::write_table(&out_dir.join("pij_counts.txt"), |out| {
        tables::write_pair_counts(out, &output.counts)
    })?;

    let report_path = out_dir.join("run_report.json");
    let report = serde_json::to_string_pretty(&output.report)
        .map_err(|e| IoError::Serialize(e.to_string()))?;
    fs::write(&report_path, report).map_err(|e| IoError::file(&report_path, &e))?;

    info!("Outputs written to {}", out_dir.display());
    Ok(())
}

fn execute(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args)?;
    info!(
        "Cell area {}, minimum overlap {}, parallel {}",
        config.cell_area, config.min_overlap_area, config.parallel
    );

    let fires = geojson::read_fires(&args.fires)?;
    let ignitions = tables::read_ignitions(&args.ignitions)?;

    let output = run(&config, &fires, &ignitions)?;
    output.report.log();
    write_outputs(&args.out_dir, &output)?;

    println!("=== Fire spread counts ===");
    println!("Cells:            {}", output.report.cells);
    println!(
        "Fires assigned:   {}/{}",
        output.report.fires_assigned, output.report.fires_seen
    );
    println!("Fires skipped:    {}", output.report.skipped());
    println!("Directed pairs:   {}", output.report.directed_pairs);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match execute(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
