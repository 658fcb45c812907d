//! Reconstruction parameters.

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{ReconstructError, ReconstructResult};
use std::f64::consts::PI;

/// Default neighborhood radius for normal estimation and triangulation.
pub const DEFAULT_SEARCH_RADIUS: f64 = 3.0;
/// Default multiplier on the nearest-neighbor distance.
pub const DEFAULT_MU: f64 = 2.5;
/// Default cap on candidate neighbors per expansion.
pub const DEFAULT_MAX_NEAREST_NEIGHBORS: usize = 100;
/// Default maximum deviation between neighboring normals (45 degrees).
pub const DEFAULT_MAX_SURFACE_ANGLE: f64 = PI / 4.0;
/// Default minimum interior triangle angle (10 degrees).
pub const DEFAULT_MIN_ANGLE: f64 = PI / 18.0;
/// Default maximum interior triangle angle (120 degrees).
pub const DEFAULT_MAX_ANGLE: f64 = 2.0 * PI / 3.0;

/// Parameters for surface reconstruction.
///
/// All lengths share the unit of the input coordinates; all angles are in
/// radians.
///
/// # Example
///
/// ```
/// use pointmesh::ReconstructionParams;
///
/// let params = ReconstructionParams::new(0.05)
///     .with_mu(3.0)
///     .with_normal_consistency(true);
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ReconstructionParams {
    /// Neighborhood radius `R` for normal estimation, and the maximum
    /// triangle edge length.
    pub search_radius: f64,

    /// Multiplier on the distance to the nearest neighbor that bounds the
    /// candidate search at each point. Must be greater than 1.
    pub mu: f64,

    /// Maximum number of candidate neighbors examined per point.
    pub max_nearest_neighbors: usize,

    /// Maximum angle between two point normals for them to be connected,
    /// and between a triangle normal and its expanding point's normal.
    pub max_surface_angle: f64,

    /// Minimum interior angle of an accepted triangle.
    pub min_angle: f64,

    /// Maximum interior angle of an accepted triangle.
    pub max_angle: f64,

    /// Propagate one normal orientation across each connected patch before
    /// triangulation. Off leaves each normal's sign as estimated.
    pub normal_consistency: bool,

    /// Stop triangulation after this many point expansions.
    /// `None` runs to completion.
    pub max_iterations: Option<usize>,
}

impl Default for ReconstructionParams {
    fn default() -> Self {
        Self {
            search_radius: DEFAULT_SEARCH_RADIUS,
            mu: DEFAULT_MU,
            max_nearest_neighbors: DEFAULT_MAX_NEAREST_NEIGHBORS,
            max_surface_angle: DEFAULT_MAX_SURFACE_ANGLE,
            min_angle: DEFAULT_MIN_ANGLE,
            max_angle: DEFAULT_MAX_ANGLE,
            normal_consistency: false,
            max_iterations: None,
        }
    }
}

impl ReconstructionParams {
    /// Default parameters with the given search radius.
    pub fn new(search_radius: f64) -> Self {
        Self {
            search_radius,
            ..Default::default()
        }
    }

    pub fn with_mu(mut self, mu: f64) -> Self {
        self.mu = mu;
        self
    }

    pub fn with_max_nearest_neighbors(mut self, k: usize) -> Self {
        self.max_nearest_neighbors = k;
        self
    }

    pub fn with_max_surface_angle(mut self, angle: f64) -> Self {
        self.max_surface_angle = angle;
        self
    }

    /// Set both interior angle bounds.
    pub fn with_angle_range(mut self, min_angle: f64, max_angle: f64) -> Self {
        self.min_angle = min_angle;
        self.max_angle = max_angle;
        self
    }

    pub fn with_normal_consistency(mut self, enabled: bool) -> Self {
        self.normal_consistency = enabled;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: Option<usize>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Check every field against its allowed range.
    ///
    /// # Errors
    ///
    /// [`ReconstructError::InvalidParameter`] naming the first bad field.
    pub fn validate(&self) -> ReconstructResult<()> {
        if !(self.search_radius.is_finite() && self.search_radius > 0.0) {
            return Err(ReconstructError::invalid_parameter(
                "search_radius",
                format!("must be positive and finite, got {}", self.search_radius),
            ));
        }
        if !(self.mu.is_finite() && self.mu > 1.0) {
            return Err(ReconstructError::invalid_parameter(
                "mu",
                format!("must be greater than 1, got {}", self.mu),
            ));
        }
        if self.max_nearest_neighbors == 0 {
            return Err(ReconstructError::invalid_parameter(
                "max_nearest_neighbors",
                "must be at least 1",
            ));
        }
        if !(self.max_surface_angle > 0.0 && self.max_surface_angle <= PI) {
            return Err(ReconstructError::invalid_parameter(
                "max_surface_angle",
                format!("must be in (0, pi], got {}", self.max_surface_angle),
            ));
        }
        if !(self.min_angle > 0.0 && self.min_angle < self.max_angle) {
            return Err(ReconstructError::invalid_parameter(
                "min_angle",
                format!(
                    "must be positive and below max_angle ({}), got {}",
                    self.max_angle, self.min_angle
                ),
            ));
        }
        if self.max_angle > PI {
            return Err(ReconstructError::invalid_parameter(
                "max_angle",
                format!("must not exceed pi, got {}", self.max_angle),
            ));
        }
        if self.max_iterations == Some(0) {
            return Err(ReconstructError::invalid_parameter(
                "max_iterations",
                "must be at least 1 when set",
            ));
        }
        Ok(())
    }

    /// Parse parameters from JSON. Missing fields take their defaults.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> ReconstructResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ReconstructError::invalid_parameter("config", e.to_string()))
    }

    /// Serialize parameters to pretty-printed JSON.
    #[cfg(feature = "config")]
    pub fn to_json(&self) -> ReconstructResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ReconstructError::invalid_parameter("config", e.to_string()))
    }
}
