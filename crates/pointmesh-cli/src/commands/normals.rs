//! pointmesh normals command - estimate per-point normals.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use pointmesh::{
    OrientedPoint, ReconstructionParams, estimate_point_normals, load_points, save_oriented_points,
};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct NormalsResult {
    input: String,
    output: String,
    radius: f64,
    points: usize,
    valid: usize,
    insufficient_neighbors: usize,
    collinear: usize,
    flipped: usize,
}

pub fn run(
    input: &Path,
    radius: f64,
    output_path: &Path,
    consistent: bool,
    cli: &Cli,
) -> Result<()> {
    let points = load_points(input)
        .with_context(|| format!("Failed to load point cloud from {:?}", input))?;

    let params = ReconstructionParams::new(radius).with_normal_consistency(consistent);
    let (normals, flipped) = estimate_point_normals(&points, &params)?;

    save_oriented_points(&OrientedPoint::zip(&points, &normals), output_path)
        .with_context(|| format!("Failed to save normals to {:?}", output_path))?;

    let collinear = normals
        .iter()
        .filter(|n| matches!(n, pointmesh::NormalEstimate::Collinear))
        .count();
    let valid = normals.iter().filter(|n| n.is_valid()).count();
    let result = NormalsResult {
        input: input.display().to_string(),
        output: output_path.display().to_string(),
        radius,
        points: points.len(),
        valid,
        insufficient_neighbors: points.len() - valid - collinear,
        collinear,
        flipped,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&result, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                output::success(
                    &format!("Normals saved to {}", output_path.display()),
                    cli.format,
                    cli.quiet,
                );
                println!("  {}: {}", "Points".cyan(), result.points);
                println!("  {}: {}", "Valid".cyan(), result.valid);
                if result.insufficient_neighbors > 0 {
                    println!(
                        "  {}: {} (fewer than 3 neighbors within {})",
                        "Sparse".yellow(),
                        result.insufficient_neighbors,
                        radius
                    );
                }
                if result.collinear > 0 {
                    println!("  {}: {}", "Collinear".yellow(), result.collinear);
                }
                if consistent {
                    println!("  {}: {}", "Flipped".cyan(), result.flipped);
                }
            }
        }
    }

    Ok(())
}
