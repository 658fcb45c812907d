//! Error types for surface reconstruction with rich diagnostics.
//!
//! Failures come in two flavours:
//! - [`ReconstructError`]: fatal conditions that abort the pipeline before a mesh
//!   is produced (too few points, invalid parameters, invariant violations, I/O).
//! - [`ReconstructionWarning`]: non-fatal quality signals attached to a finished
//!   result (degenerate neighborhoods, incomplete coverage, early termination).
//!
//! # Error Codes
//!
//! Each error has a unique code in the format `RECON-XXXX`:
//! - `RECON-1xxx`: I/O errors (file reading, writing, parsing)
//! - `RECON-2xxx`: Input errors (point count, coordinates, parameters)
//! - `RECON-3xxx`: Pipeline errors (invariant violations)
//! - `RECON-4xxx`: Format errors (unsupported or malformed data)
//!
//! # Example
//!
//! ```
//! use pointmesh::{ErrorCode, ReconstructError};
//!
//! let err = ReconstructError::insufficient_points(1);
//! assert_eq!(err.code(), ErrorCode::InsufficientPoints);
//! assert_eq!(err.code().as_str(), "RECON-2001");
//! ```

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for reconstruction operations.
pub type ReconstructResult<T> = Result<T, ReconstructError>;

/// Minimum number of points the pipeline accepts.
pub const MIN_POINTS: usize = 3;

/// Machine-readable error codes for reconstruction operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // I/O errors (1xxx)
    /// RECON-1001: Failed to read file
    IoRead = 1001,
    /// RECON-1002: Failed to write file
    IoWrite = 1002,
    /// RECON-1003: Failed to parse file
    ParseError = 1003,

    // Input errors (2xxx)
    /// RECON-2001: Fewer points than the pipeline requires
    InsufficientPoints = 2001,
    /// RECON-2002: Point has NaN or Infinity coordinate
    InvalidCoordinate = 2002,
    /// RECON-2003: Configuration value out of range
    InvalidParameter = 2003,

    // Pipeline errors (3xxx)
    /// RECON-3001: Normal count differs from point count
    CountMismatch = 3001,
    /// RECON-3002: Triangle rejected by the mesh container
    InvalidTriangle = 3002,

    // Format errors (4xxx)
    /// RECON-4001: Unsupported file format
    UnsupportedFormat = 4001,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `RECON-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::IoRead => "RECON-1001",
            ErrorCode::IoWrite => "RECON-1002",
            ErrorCode::ParseError => "RECON-1003",
            ErrorCode::InsufficientPoints => "RECON-2001",
            ErrorCode::InvalidCoordinate => "RECON-2002",
            ErrorCode::InvalidParameter => "RECON-2003",
            ErrorCode::CountMismatch => "RECON-3001",
            ErrorCode::InvalidTriangle => "RECON-3002",
            ErrorCode::UnsupportedFormat => "RECON-4001",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recovery suggestions for reconstruction errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Provide more input data.
    ProvideMorePoints { minimum: usize },
    /// Check the source data for problems.
    CheckSourceData { checks: Vec<String> },
    /// Adjust parameters for the operation.
    AdjustParameters { parameters: Vec<(String, String)> },
    /// Use a different file format.
    UseDifferentFormat { suggested: Vec<String> },
    /// The failure indicates a defect rather than bad input.
    ReportBug,
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoverySuggestion::ProvideMorePoints { minimum } => {
                write!(f, "Provide a point cloud with at least {} points", minimum)
            }
            RecoverySuggestion::CheckSourceData { checks } => {
                write!(f, "Check the source data for: {}", checks.join(", "))
            }
            RecoverySuggestion::AdjustParameters { parameters } => {
                let params: Vec<String> = parameters
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, v))
                    .collect();
                write!(f, "Try adjusting: {}", params.join(", "))
            }
            RecoverySuggestion::UseDifferentFormat { suggested } => {
                write!(f, "Try using a different format: {}", suggested.join(", "))
            }
            RecoverySuggestion::ReportBug => {
                write!(f, "This is an internal invariant violation; please report it")
            }
        }
    }
}

/// Errors that abort surface reconstruction.
#[derive(Debug, Error, Diagnostic)]
pub enum ReconstructError {
    /// Error reading from a file.
    #[error("failed to read point cloud from {path}")]
    #[diagnostic(
        code(pointmesh::io::read),
        help("Check that the file exists and is readable. Try: ls -la {}", path.display())
    )]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error writing to a file.
    #[error("failed to write output to {path}")]
    #[diagnostic(
        code(pointmesh::io::write),
        help("Check that the directory exists and is writable")
    )]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing an input file.
    #[error("failed to parse {path}: {details}")]
    #[diagnostic(
        code(pointmesh::parse::error),
        help("The file may be corrupted or use an unsupported variant of the format.")
    )]
    ParseError { path: PathBuf, details: String },

    /// Unsupported file format.
    #[error("unsupported file format: {extension:?}")]
    #[diagnostic(
        code(pointmesh::format::unsupported),
        help("Supported point formats: PLY, XYZ. Supported mesh formats: PLY, OBJ")
    )]
    UnsupportedFormat { extension: Option<String> },

    /// Too few points to reconstruct anything.
    #[error("insufficient points: need at least {required}, got {actual}")]
    #[diagnostic(
        code(pointmesh::input::insufficient_points),
        help("A surface needs at least three points to form a single triangle.")
    )]
    InsufficientPoints { required: usize, actual: usize },

    /// Point coordinate is NaN or infinite.
    #[error("invalid coordinate at point {index}: {coordinate} is {value}")]
    #[diagnostic(
        code(pointmesh::input::coordinate),
        help("Remove or repair non-finite samples before reconstruction.")
    )]
    InvalidCoordinate {
        index: usize,
        coordinate: &'static str,
        value: f64,
    },

    /// Configuration value out of range.
    #[error("invalid parameter `{name}`: {reason}")]
    #[diagnostic(code(pointmesh::config::invalid))]
    InvalidParameter { name: &'static str, reason: String },

    /// Normal estimation produced a different number of normals than points.
    #[error("point count {points} does not match normal count {normals}")]
    #[diagnostic(
        code(pointmesh::pipeline::count_mismatch),
        help("Every point must have exactly one normal slot before triangulation.")
    )]
    CountMismatch { points: usize, normals: usize },

    /// Triangle rejected by the mesh container.
    #[error("invalid triangle [{a}, {b}, {c}] for mesh with {vertex_count} vertices")]
    #[diagnostic(code(pointmesh::mesh::invalid_triangle))]
    InvalidTriangle {
        a: u32,
        b: u32,
        c: u32,
        vertex_count: usize,
    },
}

impl ReconstructError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ReconstructError::IoRead { .. } => ErrorCode::IoRead,
            ReconstructError::IoWrite { .. } => ErrorCode::IoWrite,
            ReconstructError::ParseError { .. } => ErrorCode::ParseError,
            ReconstructError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            ReconstructError::InsufficientPoints { .. } => ErrorCode::InsufficientPoints,
            ReconstructError::InvalidCoordinate { .. } => ErrorCode::InvalidCoordinate,
            ReconstructError::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            ReconstructError::CountMismatch { .. } => ErrorCode::CountMismatch,
            ReconstructError::InvalidTriangle { .. } => ErrorCode::InvalidTriangle,
        }
    }

    /// Returns a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            ReconstructError::IoRead { .. } => RecoverySuggestion::CheckSourceData {
                checks: vec!["file exists".into(), "file permissions".into()],
            },
            ReconstructError::IoWrite { .. } => RecoverySuggestion::CheckSourceData {
                checks: vec!["directory exists".into(), "write permissions".into()],
            },
            ReconstructError::ParseError { .. } => RecoverySuggestion::CheckSourceData {
                checks: vec!["file header".into(), "vertex x/y/z properties".into()],
            },
            ReconstructError::UnsupportedFormat { .. } => RecoverySuggestion::UseDifferentFormat {
                suggested: vec!["PLY".into(), "XYZ".into(), "OBJ".into()],
            },
            ReconstructError::InsufficientPoints { required, .. } => {
                RecoverySuggestion::ProvideMorePoints { minimum: *required }
            }
            ReconstructError::InvalidCoordinate { .. } => RecoverySuggestion::CheckSourceData {
                checks: vec!["NaN samples".into(), "infinite samples".into()],
            },
            ReconstructError::InvalidParameter { name, .. } => {
                RecoverySuggestion::AdjustParameters {
                    parameters: vec![((*name).into(), "see parameter documentation".into())],
                }
            }
            ReconstructError::CountMismatch { .. } | ReconstructError::InvalidTriangle { .. } => {
                RecoverySuggestion::ReportBug
            }
        }
    }

    // Constructor helpers for common error patterns

    /// Create an IoRead error.
    pub fn io_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReconstructError::IoRead {
            path: path.into(),
            source,
        }
    }

    /// Create an IoWrite error.
    pub fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReconstructError::IoWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a ParseError.
    pub fn parse_error(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        ReconstructError::ParseError {
            path: path.into(),
            details: details.into(),
        }
    }

    /// Create an InsufficientPoints error for `actual` input points.
    pub fn insufficient_points(actual: usize) -> Self {
        ReconstructError::InsufficientPoints {
            required: MIN_POINTS,
            actual,
        }
    }

    /// Create an InvalidParameter error.
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        ReconstructError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Create an UnsupportedFormat error.
    pub fn unsupported_format(extension: Option<String>) -> Self {
        ReconstructError::UnsupportedFormat { extension }
    }
}

/// Why a point has no usable normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegenerateReason {
    /// Fewer than three neighbors within the search radius.
    InsufficientNeighbors { found: usize },
    /// Neighborhood lies on a line (or a single location); no plane is defined.
    Collinear,
}

impl std::fmt::Display for DegenerateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegenerateReason::InsufficientNeighbors { found } => {
                write!(f, "only {} neighbors within search radius", found)
            }
            DegenerateReason::Collinear => write!(f, "neighborhood is collinear"),
        }
    }
}

/// Non-fatal issues collected while reconstructing.
///
/// Unlike [`ReconstructError`], these never abort the pipeline; the mesh is
/// still returned and the warnings describe how complete it is.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconstructionWarning {
    /// A point's normal could not be estimated.
    DegenerateNeighborhood {
        index: usize,
        reason: DegenerateReason,
    },
    /// Some points were left open or never reached.
    IncompleteCoverage { boundary: usize, unreached: usize },
    /// Triangulation stopped after exhausting its expansion budget.
    Truncated { expansions: usize },
    /// Triangulation stopped because the progress callback requested it.
    Cancelled { expansions: usize },
}

impl ReconstructionWarning {
    /// Returns a severity level for the warning.
    pub fn severity(&self) -> IssueSeverity {
        match self {
            ReconstructionWarning::DegenerateNeighborhood { .. } => IssueSeverity::Info,
            ReconstructionWarning::IncompleteCoverage { .. } => IssueSeverity::Info,
            ReconstructionWarning::Truncated { .. } => IssueSeverity::Warning,
            ReconstructionWarning::Cancelled { .. } => IssueSeverity::Warning,
        }
    }

    /// Returns a code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            ReconstructionWarning::DegenerateNeighborhood { .. } => "RECON-5001",
            ReconstructionWarning::IncompleteCoverage { .. } => "RECON-5002",
            ReconstructionWarning::Truncated { .. } => "RECON-5003",
            ReconstructionWarning::Cancelled { .. } => "RECON-5004",
        }
    }

    /// Returns a suggestion for improving the result.
    pub fn suggestion(&self) -> &'static str {
        match self {
            ReconstructionWarning::DegenerateNeighborhood { .. } => {
                "Increase the search radius or remove isolated samples"
            }
            ReconstructionWarning::IncompleteCoverage { .. } => {
                "Increase mu or the search radius to bridge sparse regions"
            }
            ReconstructionWarning::Truncated { .. } => "Raise or remove the iteration budget",
            ReconstructionWarning::Cancelled { .. } => "Re-run without cancelling",
        }
    }
}

/// Severity levels for reconstruction warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IssueSeverity {
    /// Informational, expected for real-world scans.
    Info,
    /// The mesh is known to be incomplete.
    Warning,
}

impl std::fmt::Display for ReconstructionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconstructionWarning::DegenerateNeighborhood { index, reason } => {
                write!(f, "point {} has no normal: {}", index, reason)
            }
            ReconstructionWarning::IncompleteCoverage {
                boundary,
                unreached,
            } => {
                write!(
                    f,
                    "mesh is partial: {} boundary points, {} unreached points",
                    boundary, unreached
                )
            }
            ReconstructionWarning::Truncated { expansions } => {
                write!(f, "triangulation truncated after {} expansions", expansions)
            }
            ReconstructionWarning::Cancelled { expansions } => {
                write!(f, "triangulation cancelled after {} expansions", expansions)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::IoRead.as_str(), "RECON-1001");
        assert_eq!(ErrorCode::CountMismatch.to_string(), "RECON-3001");
        assert_eq!(ErrorCode::UnsupportedFormat as u32, 4001);
    }

    #[test]
    fn test_insufficient_points_error() {
        let err = ReconstructError::insufficient_points(2);
        assert_eq!(
            format!("{err}"),
            "insufficient points: need at least 3, got 2"
        );
        assert_eq!(err.code(), ErrorCode::InsufficientPoints);
        assert_eq!(
            err.recovery_suggestion(),
            RecoverySuggestion::ProvideMorePoints { minimum: 3 }
        );
    }

    #[test]
    fn test_count_mismatch_is_a_bug() {
        let err = ReconstructError::CountMismatch {
            points: 10,
            normals: 9,
        };
        assert_eq!(
            format!("{err}"),
            "point count 10 does not match normal count 9"
        );
        assert_eq!(err.recovery_suggestion(), RecoverySuggestion::ReportBug);
    }

    #[test]
    fn test_invalid_parameter_error() {
        let err = ReconstructError::invalid_parameter("mu", "must be greater than 1, got 0.5");
        assert_eq!(
            format!("{err}"),
            "invalid parameter `mu`: must be greater than 1, got 0.5"
        );
        let suggestion = err.recovery_suggestion().to_string();
        assert!(suggestion.contains("mu"));
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = ReconstructError::io_read("cloud.ply", io_err);
        assert!(err.source().is_some());
        assert_eq!(err.code(), ErrorCode::IoRead);
    }

    #[test]
    fn test_warning_display_and_severity() {
        let warning = ReconstructionWarning::DegenerateNeighborhood {
            index: 4,
            reason: DegenerateReason::InsufficientNeighbors { found: 1 },
        };
        assert_eq!(
            warning.to_string(),
            "point 4 has no normal: only 1 neighbors within search radius"
        );
        assert_eq!(warning.severity(), IssueSeverity::Info);

        let truncated = ReconstructionWarning::Truncated { expansions: 12 };
        assert_eq!(truncated.severity(), IssueSeverity::Warning);
        assert_eq!(truncated.code(), "RECON-5003");
        assert!(IssueSeverity::Warning > IssueSeverity::Info);
    }
}
