//! pointmesh-cli: Command-line surface reconstruction for point clouds.
//!
//! This tool exposes the pointmesh pipeline from the command line, suitable
//! for scripting and batch processing of scans.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=pointmesh=info` - Basic operation logging
//! - `RUST_LOG=pointmesh=debug` - Detailed per-stage logging
//! - `RUST_LOG=pointmesh::timing=debug` - Performance timing
//! - `RUST_LOG=debug` - All debug output
//!
//! # Example
//!
//! ```bash
//! # Reconstruct with a search radius of 0.025 and info logging
//! RUST_LOG=pointmesh=info pointmesh reconstruct scan.ply 0.025 -o mesh.ply
//!
//! # Inspect a cloud before choosing a radius
//! pointmesh info scan.ply
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use commands::{info, normals, reconstruct};

/// pointmesh - Surface reconstruction from unorganized point clouds.
///
/// Estimate normals and triangulate scanned points into a mesh.
#[derive(Parser)]
#[command(name = "pointmesh")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Suppress all non-error output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct a triangle mesh from a point cloud
    Reconstruct {
        /// Input point cloud (.ply or .xyz)
        input: PathBuf,

        /// Search radius (maximum edge length), in point units
        radius: Option<f64>,

        /// Output mesh path (.ply or .obj)
        #[arg(short, long, default_value = "mesh.ply")]
        output: PathBuf,

        #[command(flatten)]
        overrides: reconstruct::ParamOverrides,

        /// JSON file with reconstruction parameters
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Estimate per-point normals without triangulating
    Normals {
        /// Input point cloud (.ply or .xyz)
        input: PathBuf,

        /// Neighborhood radius for plane fitting
        #[arg(short, long, default_value_t = pointmesh::DEFAULT_SEARCH_RADIUS)]
        radius: f64,

        /// Output point cloud with normals (.ply)
        #[arg(short, long, default_value = "normals.ply")]
        output: PathBuf,

        /// Propagate a consistent normal orientation
        #[arg(long)]
        consistent: bool,
    },

    /// Display point cloud statistics
    Info {
        /// Input point cloud (.ply or .xyz)
        input: PathBuf,

        /// Number of points sampled for the spacing estimate
        #[arg(long, default_value = "1000")]
        samples: usize,
    },
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // RUST_LOG wins over -v flags.
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "pointmesh=info,pointmesh_cli=info",
            2 => "pointmesh=debug,pointmesh_cli=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    #[cfg(debug_assertions)]
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Reconstruct {
            input,
            radius,
            output,
            overrides,
            config,
        } => reconstruct::run(input, *radius, output, overrides, config.as_deref(), &cli),
        Commands::Normals {
            input,
            radius,
            output,
            consistent,
        } => normals::run(input, *radius, output, *consistent, &cli),
        Commands::Info { input, samples } => info::run(input, *samples, &cli),
    };

    if let Err(e) = &result {
        if !cli.quiet {
            if let Some(err) = e.downcast_ref::<pointmesh::ReconstructError>() {
                eprintln!("{}: {}", "Error".red().bold(), err);
                eprintln!("  {}: {}", "Code".cyan(), err.code());
                eprintln!("  {}: {}", "Suggestion".green(), err.recovery_suggestion());
            } else {
                eprintln!("{}: {}", "Error".red().bold(), e);
                for cause in e.chain().skip(1) {
                    eprintln!("  {}: {}", "Caused by".yellow(), cause);
                }
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
