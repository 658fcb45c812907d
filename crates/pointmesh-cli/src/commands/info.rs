//! pointmesh info command - display point cloud statistics.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use pointmesh::{SpatialIndex, load_points, mesh::bounds_of};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct CloudInfo {
    path: String,
    points: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    bounds: Option<BoundsInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    average_spacing: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggested_radius: Option<f64>,
}

#[derive(Serialize)]
struct BoundsInfo {
    min: [f64; 3],
    max: [f64; 3],
    dimensions: [f64; 3],
}

/// Multiple of the average spacing suggested as a search radius.
const RADIUS_PER_SPACING: f64 = 3.0;

pub fn run(input: &Path, samples: usize, cli: &Cli) -> Result<()> {
    let points = load_points(input)
        .with_context(|| format!("Failed to load point cloud from {:?}", input))?;

    let bounds = bounds_of(&points).map(|(min, max)| {
        let dims = max - min;
        BoundsInfo {
            min: [min.x, min.y, min.z],
            max: [max.x, max.y, max.z],
            dimensions: [dims.x, dims.y, dims.z],
        }
    });
    let average_spacing = SpatialIndex::build(&points).average_spacing(samples);

    let info = CloudInfo {
        path: input.display().to_string(),
        points: points.len(),
        bounds,
        average_spacing,
        suggested_radius: average_spacing.map(|s| s * RADIUS_PER_SPACING),
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&info, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", "Point Cloud Information".bold().underline());
                println!("  {}: {}", "File".cyan(), input.display());
                println!("  {}: {}", "Points".cyan(), info.points);

                if let Some(ref b) = info.bounds {
                    println!(
                        "  {}: {:.4} x {:.4} x {:.4}",
                        "Dimensions".cyan(),
                        b.dimensions[0],
                        b.dimensions[1],
                        b.dimensions[2]
                    );
                    println!(
                        "  {}: ({:.4}, {:.4}, {:.4})",
                        "Min bounds".cyan(),
                        b.min[0],
                        b.min[1],
                        b.min[2]
                    );
                    println!(
                        "  {}: ({:.4}, {:.4}, {:.4})",
                        "Max bounds".cyan(),
                        b.max[0],
                        b.max[1],
                        b.max[2]
                    );
                }
                if let Some(spacing) = info.average_spacing {
                    println!("  {}: {:.6}", "Average spacing".cyan(), spacing);
                }
                if let Some(radius) = info.suggested_radius {
                    println!("  {}: {:.6}", "Suggested radius".cyan(), radius);
                }
            }
        }
    }

    Ok(())
}
