//! Tracing helpers for reconstruction stages.
//!
//! Enable output by installing a subscriber in the application, e.g. with
//! `RUST_LOG=pointmesh=debug`.
//!
//! # Log Levels
//!
//! - **WARN**: Degenerate neighborhoods, incomplete coverage, early termination
//! - **INFO**: Stage summaries, timing
//! - **DEBUG**: Per-seed detail, intermediate counts, progress
//! - **TRACE**: Per-expansion and per-section detail

use std::time::Instant;
use tracing::{Span, debug, info, trace, warn};

use crate::mesh::Mesh;
use crate::validate::MeshReport;

/// A performance timer that logs duration on drop.
///
/// ```rust,ignore
/// use pointmesh::tracing_ext::OperationTimer;
///
/// fn estimate() {
///     let _timer = OperationTimer::new("normal_estimation");
///     // ... do work ...
/// } // Timer logs duration when dropped
/// ```
pub struct OperationTimer {
    name: &'static str,
    start: Instant,
    span: Span,
}

impl OperationTimer {
    /// Create a new operation timer.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!("reconstruction_stage", stage = name);
        debug!(target: "pointmesh::timing", stage = name, "Starting stage");
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    /// Create a timer that also records the input size and search radius.
    pub fn with_context(name: &'static str, point_count: usize, radius: f64) -> Self {
        let span = tracing::info_span!(
            "reconstruction_stage",
            stage = name,
            points = point_count,
            radius = radius
        );
        debug!(
            target: "pointmesh::timing",
            stage = name,
            points = point_count,
            radius = radius,
            "Starting stage"
        );
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    /// Get the elapsed time.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Get the span for this timer.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        let elapsed_ms = self.elapsed_ms();
        info!(
            target: "pointmesh::timing",
            stage = self.name,
            elapsed_ms = format!("{:.2}", elapsed_ms),
            "Stage completed"
        );
    }
}

/// Log mesh statistics at debug level.
pub fn log_mesh_stats(mesh: &Mesh, context: &str) {
    let (min_bounds, max_bounds) = mesh.bounds().unwrap_or_default();
    let dims = max_bounds - min_bounds;

    debug!(
        target: "pointmesh::mesh_state",
        context = context,
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        dimensions = format!("{:.3} x {:.3} x {:.3}", dims.x, dims.y, dims.z),
        "Mesh state"
    );
}

/// Log a validation report: info when clean, warn when it found problems.
pub fn log_validation_result(report: &MeshReport) {
    if report.is_valid() {
        info!(
            target: "pointmesh::validation",
            vertex_count = report.vertex_count,
            face_count = report.face_count,
            boundary_edges = report.boundary_edge_count,
            is_manifold = report.is_manifold,
            "Mesh validation passed"
        );
    } else {
        warn!(
            target: "pointmesh::validation",
            invalid_faces = report.invalid_face_count,
            duplicate_faces = report.duplicate_face_count,
            non_manifold_edges = report.non_manifold_edge_count,
            inconsistent_edges = report.inconsistent_edge_count,
            "Mesh validation found issues"
        );
    }
}

/// Log progress for a long-running operation.
pub fn log_progress(operation: &str, current: usize, total: usize, stage: Option<&str>) {
    let percent = if total > 0 {
        (current as f64 / total as f64 * 100.0) as u32
    } else {
        0
    };

    debug!(
        target: "pointmesh::progress",
        operation = operation,
        current = current,
        total = total,
        percent = percent,
        stage = stage.unwrap_or("processing"),
        "Progress update"
    );
}

/// Log a file I/O operation.
pub fn log_io_operation(
    operation: &str,
    path: &std::path::Path,
    format: Option<&str>,
    success: bool,
) {
    if success {
        info!(
            target: "pointmesh::io",
            operation = operation,
            path = path.display().to_string(),
            format = format.unwrap_or("auto"),
            "I/O operation completed"
        );
    } else {
        warn!(
            target: "pointmesh::io",
            operation = operation,
            path = path.display().to_string(),
            format = format.unwrap_or("auto"),
            "I/O operation failed"
        );
    }
}

/// Log a performance-critical section.
///
/// Returns a guard that logs when dropped.
#[must_use]
pub fn log_perf_section(name: &'static str) -> impl Drop {
    struct PerfGuard {
        name: &'static str,
        start: Instant,
    }
    impl Drop for PerfGuard {
        fn drop(&mut self) {
            let elapsed = self.start.elapsed();
            trace!(
                target: "pointmesh::perf",
                section = self.name,
                elapsed_us = elapsed.as_micros(),
                "Performance section completed"
            );
        }
    }
    PerfGuard {
        name,
        start: Instant::now(),
    }
}
