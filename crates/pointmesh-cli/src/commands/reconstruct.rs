//! pointmesh reconstruct command - point cloud to triangle mesh.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use pointmesh::{
    ReconstructionParams, ReconstructionResult, ReconstructionWarning, load_points, reconstruct,
    save_mesh,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::{Cli, OutputFormat, output};

/// Per-field parameter overrides. Angles are in degrees.
#[derive(Args, Debug, Default)]
pub struct ParamOverrides {
    /// Multiplier on the nearest-neighbor distance bounding the candidate search
    #[arg(long)]
    mu: Option<f64>,

    /// Maximum number of neighbors considered per expansion
    #[arg(long)]
    max_nn: Option<usize>,

    /// Maximum deviation between neighboring normals (degrees)
    #[arg(long)]
    max_surface_angle: Option<f64>,

    /// Minimum triangle interior angle (degrees)
    #[arg(long)]
    min_angle: Option<f64>,

    /// Maximum triangle interior angle (degrees)
    #[arg(long)]
    max_angle: Option<f64>,

    /// Propagate a consistent normal orientation before triangulating
    #[arg(long)]
    normal_consistency: bool,

    /// Stop after this many front expansions
    #[arg(long)]
    max_iterations: Option<usize>,
}

impl ParamOverrides {
    fn apply(&self, mut params: ReconstructionParams) -> ReconstructionParams {
        if let Some(mu) = self.mu {
            params.mu = mu;
        }
        if let Some(k) = self.max_nn {
            params.max_nearest_neighbors = k;
        }
        if let Some(angle) = self.max_surface_angle {
            params.max_surface_angle = angle.to_radians();
        }
        if let Some(angle) = self.min_angle {
            params.min_angle = angle.to_radians();
        }
        if let Some(angle) = self.max_angle {
            params.max_angle = angle.to_radians();
        }
        if self.normal_consistency {
            params.normal_consistency = true;
        }
        if self.max_iterations.is_some() {
            params.max_iterations = self.max_iterations;
        }
        params
    }
}

#[derive(Serialize)]
struct ReconstructSummary {
    input: String,
    output: String,
    search_radius: f64,
    points: usize,
    faces: usize,
    valid_normals: usize,
    degenerate_normals: usize,
    flipped_normals: usize,
    seeds: usize,
    completed: usize,
    boundary: usize,
    unreached: usize,
    status: String,
    warnings: Vec<WarningInfo>,
}

#[derive(Serialize)]
struct WarningInfo {
    code: &'static str,
    severity: String,
    message: String,
    suggestion: &'static str,
}

/// Resolve parameters: defaults, then the config file, then flags, then
/// the positional radius.
fn resolve_params(
    radius: Option<f64>,
    overrides: &ParamOverrides,
    config: Option<&Path>,
) -> Result<ReconstructionParams> {
    let base = match config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            ReconstructionParams::from_json(&json)?
        }
        None => ReconstructionParams::default(),
    };

    let mut params = overrides.apply(base);
    if let Some(r) = radius {
        params.search_radius = r;
    }
    params.validate()?;
    debug!(?params, "Resolved reconstruction parameters");
    Ok(params)
}

/// Group per-point degenerate warnings into a single entry.
fn summarize_warnings(result: &ReconstructionResult) -> Vec<WarningInfo> {
    let degenerate = result
        .warnings
        .iter()
        .filter(|w| matches!(w, ReconstructionWarning::DegenerateNeighborhood { .. }))
        .count();

    let mut infos = Vec::new();
    if let Some(first) = result
        .warnings
        .iter()
        .find(|w| matches!(w, ReconstructionWarning::DegenerateNeighborhood { .. }))
    {
        infos.push(WarningInfo {
            code: first.code(),
            severity: format!("{:?}", first.severity()),
            message: format!("{} points have no usable normal", degenerate),
            suggestion: first.suggestion(),
        });
    }
    for w in result
        .warnings
        .iter()
        .filter(|w| !matches!(w, ReconstructionWarning::DegenerateNeighborhood { .. }))
    {
        infos.push(WarningInfo {
            code: w.code(),
            severity: format!("{:?}", w.severity()),
            message: w.to_string(),
            suggestion: w.suggestion(),
        });
    }
    infos
}

pub fn run(
    input: &Path,
    radius: Option<f64>,
    output_path: &Path,
    overrides: &ParamOverrides,
    config: Option<&Path>,
    cli: &Cli,
) -> Result<()> {
    let params = resolve_params(radius, overrides, config)?;

    let points = load_points(input)
        .with_context(|| format!("Failed to load point cloud from {:?}", input))?;
    info!(points = points.len(), radius = params.search_radius, "Reconstructing");
    let result = reconstruct(&points, &params)?;

    save_mesh(&result.mesh, output_path)
        .with_context(|| format!("Failed to save mesh to {:?}", output_path))?;

    let tri = &result.stats.triangulation;
    let summary = ReconstructSummary {
        input: input.display().to_string(),
        output: output_path.display().to_string(),
        search_radius: params.search_radius,
        points: points.len(),
        faces: result.mesh.face_count(),
        valid_normals: result.stats.valid_normals,
        degenerate_normals: result.stats.degenerate_normals,
        flipped_normals: result.stats.flipped_normals,
        seeds: tri.seeds,
        completed: tri.completed,
        boundary: tri.boundary,
        unreached: tri.unreached,
        status: format!("{:?}", result.status),
        warnings: summarize_warnings(&result),
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&summary, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                output::success(
                    &format!(
                        "Reconstructed {} triangles, saved to {}",
                        summary.faces,
                        output_path.display()
                    ),
                    cli.format,
                    cli.quiet,
                );
                println!("  {}: {}", "Points".cyan(), summary.points);
                println!("  {}: {}", "Search radius".cyan(), summary.search_radius);
                println!(
                    "  {}: {} valid, {} degenerate",
                    "Normals".cyan(),
                    summary.valid_normals,
                    summary.degenerate_normals
                );
                if params.normal_consistency {
                    println!("  {}: {}", "Flipped".cyan(), summary.flipped_normals);
                }
                println!(
                    "  {}: {} completed, {} boundary, {} unreached",
                    "Coverage".cyan(),
                    summary.completed,
                    summary.boundary,
                    summary.unreached
                );
                println!("  {}: {}", "Patches".cyan(), summary.seeds);

                for w in &summary.warnings {
                    output::warning(
                        &format!("[{}] {} ({})", w.code, w.message, w.suggestion),
                        cli.format,
                        cli.quiet,
                    );
                }
            }
        }
    }

    Ok(())
}
