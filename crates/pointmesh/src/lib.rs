//! Surface reconstruction from unorganized point clouds.
//!
//! This crate turns a set of 3D sample points into a triangle mesh by
//! greedy projection triangulation:
//!
//! - **Normal estimation**: fit a plane to each point's fixed-radius
//!   neighborhood and take its smallest principal direction
//! - **Orientation** (optional): propagate a consistent normal sign across
//!   each connected neighborhood graph
//! - **Triangulation**: grow a mesh from seed points by projecting nearby
//!   candidates onto the local tangent plane and connecting them in angular
//!   order, subject to edge length and triangle angle limits
//!
//! The output mesh reuses the input points as vertices, in input order.
//! Points that cannot be triangulated stay in the mesh as isolated vertices.
//!
//! # Units and Scale
//!
//! The search radius is in the same units as the points. The reconstruction
//! is scale-covariant: scaling the points and the radius by the same factor
//! yields the same faces.
//!
//! # Quick Start
//!
//! ```no_run
//! use pointmesh::{ReconstructionParams, load_points, reconstruct, save_mesh};
//! use std::path::Path;
//!
//! let points = load_points(Path::new("scan.ply")).unwrap();
//! let result = reconstruct(&points, &ReconstructionParams::new(3.0)).unwrap();
//!
//! for warning in &result.warnings {
//!     println!("{}", warning);
//! }
//! save_mesh(&result.mesh, Path::new("mesh.ply")).unwrap();
//! ```
//!
//! # Tuning
//!
//! ```
//! use pointmesh::ReconstructionParams;
//! use std::f64::consts::PI;
//!
//! let params = ReconstructionParams::new(0.025)
//!     .with_mu(2.5)
//!     .with_max_nearest_neighbors(100)
//!     .with_max_surface_angle(PI / 4.0)
//!     .with_angle_range(PI / 18.0, 2.0 * PI / 3.0)
//!     .with_normal_consistency(true);
//! assert!(params.validate().is_ok());
//! ```
//!
//! # Error Handling
//!
//! Fallible operations return `ReconstructResult<T>`, which is
//! `Result<T, ReconstructError>`. Conditions that do not stop the run, such
//! as degenerate neighborhoods or uncovered points, are reported as
//! [`ReconstructionWarning`]s on the result.
//!
//! ```
//! use nalgebra::Point3;
//! use pointmesh::{ReconstructError, ReconstructionParams, reconstruct};
//!
//! let points = vec![Point3::new(0.0, 0.0, 0.0)];
//! match reconstruct(&points, &ReconstructionParams::default()) {
//!     Err(ReconstructError::InsufficientPoints { required, actual }) => {
//!         assert_eq!((required, actual), (3, 1));
//!     }
//!     other => panic!("unexpected: {:?}", other.map(|r| r.mesh.face_count())),
//! }
//! ```
//!
//! # Supported Formats
//!
//! | Format | Extension        | Points in | Mesh out | Notes                          |
//! |--------|------------------|-----------|----------|--------------------------------|
//! | PLY    | `.ply`           | ✓         | ✓        | ASCII & binary in, ASCII out   |
//! | XYZ    | `.xyz`, `.txt`   | ✓         | ✗        | One `x y z` per line           |
//! | OBJ    | `.obj`           | ✗         | ✓        | Vertex normals when available  |

mod eigen;
mod error;
mod params;
mod pipeline;
mod types;

#[cfg(test)]
mod edge_cases;

pub mod io;
pub mod mesh;
pub mod normals;
pub mod progress;
pub mod spatial;
pub mod tracing_ext;
pub mod triangulate;
pub mod validate;

// Re-export core types
pub use error::{
    DegenerateReason, ErrorCode, IssueSeverity, MIN_POINTS, ReconstructError,
    ReconstructResult, ReconstructionWarning, RecoverySuggestion,
};
pub use mesh::Mesh;
pub use types::{NormalEstimate, OrientedPoint, Triangle, UNIT_NORMAL_TOLERANCE, Vertex};

pub use params::{
    DEFAULT_MAX_ANGLE, DEFAULT_MAX_NEAREST_NEIGHBORS, DEFAULT_MAX_SURFACE_ANGLE,
    DEFAULT_MIN_ANGLE, DEFAULT_MU, DEFAULT_SEARCH_RADIUS, ReconstructionParams,
};
pub use pipeline::{
    ReconstructionResult, ReconstructionStats, estimate_point_normals, reconstruct,
    reconstruct_with_progress,
};

pub use io::{
    MeshFormat, PointFormat, load_points, save_mesh, save_obj, save_oriented_points, save_ply,
};
pub use normals::{estimate_normals, orient_normals_consistent};
pub use spatial::{Neighbor, SpatialIndex};
pub use triangulate::{
    PointState, Triangulation, TriangulationStats, TriangulationStatus, triangulate,
    triangulate_with_progress,
};
pub use validate::{MeshReport, validate_mesh, validate_points};

// Re-export progress tracking types for long-running operations
pub use progress::{Progress, ProgressCallback, ProgressTracker};

// Re-export tracing extensions for structured logging and performance monitoring
pub use tracing_ext::{
    OperationTimer, log_io_operation, log_mesh_stats, log_perf_section, log_progress,
    log_validation_result,
};

// Convenience methods on Mesh
impl Mesh {
    /// Save the mesh to a file, auto-detecting format from extension.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> ReconstructResult<()> {
        io::save_mesh(self, path.as_ref())
    }

    /// Validate the mesh and return a report of any issues.
    pub fn validate(&self) -> MeshReport {
        validate::validate_mesh(self)
    }
}
