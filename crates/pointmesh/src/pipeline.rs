//! End-to-end reconstruction: raw points to mesh.
//!
//! The pipeline runs in fixed stages, each owning its own data:
//!
//! 1. validate input points and parameters;
//! 2. build a spatial index over the raw points and estimate normals;
//! 3. optionally propagate a consistent normal orientation;
//! 4. merge points and normals into oriented points;
//! 5. triangulate over a second index built from the oriented points.
//!
//! # Example
//!
//! ```
//! use nalgebra::Point3;
//! use pointmesh::{ReconstructionParams, reconstruct};
//!
//! let mut points = Vec::new();
//! for j in 0..6 {
//!     for i in 0..6 {
//!         points.push(Point3::new(i as f64, j as f64, 0.0));
//!     }
//! }
//!
//! let result = reconstruct(&points, &ReconstructionParams::new(3.0)).unwrap();
//! assert_eq!(result.mesh.vertex_count(), 36);
//! assert_eq!(result.mesh.face_count(), 50);
//! ```

use nalgebra::Point3;
use tracing::{info, warn};

use crate::error::{ReconstructError, ReconstructResult, ReconstructionWarning};
use crate::mesh::Mesh;
use crate::normals::{estimate_normals, orient_normals_consistent};
use crate::params::ReconstructionParams;
use crate::progress::ProgressCallback;
use crate::spatial::SpatialIndex;
use crate::tracing_ext::{OperationTimer, log_mesh_stats, log_perf_section};
use crate::triangulate::{
    PointState, TriangulationStats, TriangulationStatus, triangulate_with_progress,
};
use crate::types::{NormalEstimate, OrientedPoint};
use crate::validate::validate_points;

/// Counters for a full reconstruction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconstructionStats {
    /// Points with a valid estimated normal.
    pub valid_normals: usize,
    /// Points whose neighborhood was degenerate.
    pub degenerate_normals: usize,
    /// Normals flipped by orientation propagation.
    pub flipped_normals: usize,
    /// Counters from the triangulation stage.
    pub triangulation: TriangulationStats,
}

/// Output of [`reconstruct`].
#[derive(Debug, Clone)]
pub struct ReconstructionResult {
    /// Mesh whose vertices are the input points, in input order.
    pub mesh: Mesh,
    /// Normal estimate per input point.
    pub normals: Vec<NormalEstimate>,
    /// Final triangulation state per input point.
    pub states: Vec<PointState>,
    /// Non-fatal issues found along the way.
    pub warnings: Vec<ReconstructionWarning>,
    pub stats: ReconstructionStats,
    pub status: TriangulationStatus,
}

impl ReconstructionResult {
    /// Whether the triangulation ran to completion and reached every point.
    pub fn is_complete(&self) -> bool {
        self.status == TriangulationStatus::Complete && self.stats.triangulation.unreached == 0
    }
}

/// Reconstruct a surface mesh from `points`.
///
/// # Errors
///
/// - [`ReconstructError::InsufficientPoints`] for fewer than three points
/// - [`ReconstructError::InvalidCoordinate`] for NaN or infinite coordinates
/// - [`ReconstructError::InvalidParameter`] for out-of-range parameters
/// - [`ReconstructError::CountMismatch`] if normal estimation loses points
pub fn reconstruct(
    points: &[Point3<f64>],
    params: &ReconstructionParams,
) -> ReconstructResult<ReconstructionResult> {
    reconstruct_with_progress(points, params, None)
}

/// Like [`reconstruct`], with a progress callback for the triangulation
/// stage. Returning `false` from the callback stops early with
/// [`TriangulationStatus::Cancelled`].
pub fn reconstruct_with_progress(
    points: &[Point3<f64>],
    params: &ReconstructionParams,
    progress: Option<&ProgressCallback>,
) -> ReconstructResult<ReconstructionResult> {
    let _timer = OperationTimer::with_context("reconstruction", points.len(), params.search_radius);

    let (normals, flipped_normals) = estimate_point_normals(points, params)?;
    let mut warnings = degenerate_warnings(&normals);

    let oriented = OrientedPoint::zip(points, &normals);
    let triangulation = triangulate_with_progress(&oriented, params, progress)?;

    let tri_stats = &triangulation.stats;
    if tri_stats.boundary > 0 || tri_stats.unreached > 0 {
        warnings.push(ReconstructionWarning::IncompleteCoverage {
            boundary: tri_stats.boundary,
            unreached: tri_stats.unreached,
        });
    }
    match triangulation.status {
        TriangulationStatus::Complete => {}
        TriangulationStatus::Truncated => warnings.push(ReconstructionWarning::Truncated {
            expansions: tri_stats.expansions,
        }),
        TriangulationStatus::Cancelled => warnings.push(ReconstructionWarning::Cancelled {
            expansions: tri_stats.expansions,
        }),
    }

    let valid_normals = normals.iter().filter(|n| n.is_valid()).count();
    let stats = ReconstructionStats {
        valid_normals,
        degenerate_normals: normals.len() - valid_normals,
        flipped_normals,
        triangulation: triangulation.stats,
    };

    log_mesh_stats(&triangulation.mesh, "reconstruction");
    info!(
        points = points.len(),
        faces = triangulation.mesh.face_count(),
        warnings = warnings.len(),
        "Reconstruction finished"
    );

    Ok(ReconstructionResult {
        mesh: triangulation.mesh,
        normals,
        states: triangulation.states,
        warnings,
        stats,
        status: triangulation.status,
    })
}

/// Validate `points` and `params`, then estimate one normal per point.
///
/// Returns the normals and how many were flipped by orientation
/// propagation (always 0 unless `normal_consistency` is set).
pub fn estimate_point_normals(
    points: &[Point3<f64>],
    params: &ReconstructionParams,
) -> ReconstructResult<(Vec<NormalEstimate>, usize)> {
    validate_points(points)?;
    params.validate()?;

    let index = SpatialIndex::build(points);
    let mut normals = estimate_normals(&index, params.search_radius);
    if normals.len() != points.len() {
        return Err(ReconstructError::CountMismatch {
            points: points.len(),
            normals: normals.len(),
        });
    }

    let flipped = if params.normal_consistency {
        let _section = log_perf_section("normal_orientation");
        orient_normals_consistent(&index, &mut normals, params.search_radius)
    } else {
        0
    };
    Ok((normals, flipped))
}

fn degenerate_warnings(normals: &[NormalEstimate]) -> Vec<ReconstructionWarning> {
    let warnings: Vec<ReconstructionWarning> = normals
        .iter()
        .enumerate()
        .filter_map(|(index, n)| {
            n.degenerate_reason()
                .map(|reason| ReconstructionWarning::DegenerateNeighborhood { index, reason })
        })
        .collect();
    if !warnings.is_empty() {
        warn!(
            count = warnings.len(),
            "Points with degenerate neighborhoods have no normal"
        );
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DegenerateReason;

    fn grid(n: usize) -> Vec<Point3<f64>> {
        let mut points = Vec::new();
        for j in 0..n {
            for i in 0..n {
                points.push(Point3::new(i as f64, j as f64, 0.0));
            }
        }
        points
    }

    #[test]
    fn test_reconstruct_grid() {
        let result = reconstruct(&grid(10), &ReconstructionParams::new(3.0)).unwrap();
        assert_eq!(result.mesh.vertex_count(), 100);
        assert_eq!(result.mesh.face_count(), 162);
        assert_eq!(result.stats.valid_normals, 100);
        assert_eq!(result.status, TriangulationStatus::Complete);
        assert!(result.is_complete());
        assert!(matches!(
            result.warnings.as_slice(),
            [ReconstructionWarning::IncompleteCoverage {
                boundary: 36,
                unreached: 0
            }]
        ));
    }

    #[test]
    fn test_too_few_points() {
        let err = reconstruct(&grid(1), &ReconstructionParams::default()).unwrap_err();
        assert!(matches!(
            err,
            ReconstructError::InsufficientPoints {
                required: 3,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_non_finite_point() {
        let mut points = grid(3);
        points[4].z = f64::NAN;
        let err = reconstruct(&points, &ReconstructionParams::default()).unwrap_err();
        assert!(matches!(
            err,
            ReconstructError::InvalidCoordinate { index: 4, .. }
        ));
    }

    #[test]
    fn test_invalid_params() {
        let err = reconstruct(&grid(3), &ReconstructionParams::new(0.0)).unwrap_err();
        assert!(matches!(err, ReconstructError::InvalidParameter { .. }));
    }

    #[test]
    fn test_isolated_point_warned() {
        let mut points = grid(4);
        points.push(Point3::new(50.0, 50.0, 50.0));
        let result = reconstruct(&points, &ReconstructionParams::new(3.0)).unwrap();

        assert!(result.warnings.contains(&ReconstructionWarning::DegenerateNeighborhood {
            index: 16,
            reason: DegenerateReason::InsufficientNeighbors { found: 0 },
        }));
        assert_eq!(result.stats.degenerate_normals, 1);
        assert_eq!(result.states[16], PointState::Free);
        assert_eq!(result.stats.triangulation.unreached, 1);
        assert!(!result.is_complete());
    }

    #[test]
    fn test_consistency_flag_counts_flips() {
        let (normals, flipped) =
            estimate_point_normals(&grid(4), &ReconstructionParams::new(1.5)).unwrap();
        assert_eq!(flipped, 0);
        assert_eq!(normals.len(), 16);

        let params = ReconstructionParams::new(1.5).with_normal_consistency(true);
        let (oriented, _) = estimate_point_normals(&grid(4), &params).unwrap();
        let first = oriented[0].vector().unwrap();
        assert!(oriented.iter().all(|n| n.vector().unwrap().dot(&first) > 0.0));
    }

    #[test]
    fn test_truncated_reports_warning() {
        let params = ReconstructionParams::new(3.0).with_max_iterations(Some(1));
        let result = reconstruct(&grid(5), &params).unwrap();
        assert_eq!(result.status, TriangulationStatus::Truncated);
        assert!(result
            .warnings
            .contains(&ReconstructionWarning::Truncated { expansions: 1 }));
    }
}
