//! Core point and geometry types.

use nalgebra::{Point3, Vector3};

use crate::error::DegenerateReason;

/// Tolerance on `|n| - 1` for a normal to count as unit length.
pub const UNIT_NORMAL_TOLERANCE: f64 = 1e-6;

/// Result of estimating a normal at one point.
///
/// Degenerate neighborhoods are explicit variants; a zero vector is never
/// passed off as a normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NormalEstimate {
    /// Unit normal of the best-fit plane. Sign is not globally resolved.
    Valid(Vector3<f64>),
    /// Fewer than three neighbors within the search radius.
    InsufficientNeighbors { found: usize },
    /// Neighborhood spans a line or a single location.
    Collinear,
}

impl NormalEstimate {
    /// Wrap a vector as a valid normal, normalizing it.
    ///
    /// Returns [`NormalEstimate::Collinear`] if the vector has no direction.
    pub fn from_vector(v: Vector3<f64>) -> Self {
        match v.try_normalize(f64::EPSILON) {
            Some(n) if n.iter().all(|c| c.is_finite()) => NormalEstimate::Valid(n),
            _ => NormalEstimate::Collinear,
        }
    }

    /// The unit normal, if one was estimated.
    #[inline]
    pub fn vector(&self) -> Option<Vector3<f64>> {
        match self {
            NormalEstimate::Valid(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, NormalEstimate::Valid(_))
    }

    /// Why this estimate is degenerate, or `None` for a valid normal.
    pub fn degenerate_reason(&self) -> Option<DegenerateReason> {
        match self {
            NormalEstimate::Valid(_) => None,
            NormalEstimate::InsufficientNeighbors { found } => {
                Some(DegenerateReason::InsufficientNeighbors { found: *found })
            }
            NormalEstimate::Collinear => Some(DegenerateReason::Collinear),
        }
    }

    /// Flip the sign of a valid normal; degenerate estimates are unchanged.
    pub fn flipped(&self) -> Self {
        match self {
            NormalEstimate::Valid(n) => NormalEstimate::Valid(-n),
            other => *other,
        }
    }
}

/// A point paired with its normal estimate: the unit of work for triangulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedPoint {
    pub position: Point3<f64>,
    pub normal: NormalEstimate,
}

impl OrientedPoint {
    #[inline]
    pub fn new(position: Point3<f64>, normal: NormalEstimate) -> Self {
        Self { position, normal }
    }

    /// Pair every point with the normal at the same index.
    ///
    /// Callers must pass slices of equal length; the pipeline checks this
    /// before merging.
    pub fn zip(points: &[Point3<f64>], normals: &[NormalEstimate]) -> Vec<Self> {
        points
            .iter()
            .zip(normals)
            .map(|(p, n)| Self::new(*p, *n))
            .collect()
    }
}

/// A mesh vertex: a position and, when known, a unit normal.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// 3D position.
    pub position: Point3<f64>,

    /// Unit normal carried over from normal estimation.
    pub normal: Option<Vector3<f64>>,
}

impl Vertex {
    /// Create a new vertex with only position set.
    #[inline]
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: None,
        }
    }

    /// Create a vertex from raw coordinates.
    #[inline]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }

    /// Create a vertex from an oriented point, keeping the normal if valid.
    #[inline]
    pub fn from_oriented(point: &OrientedPoint) -> Self {
        Self {
            position: point.position,
            normal: point.normal.vector(),
        }
    }
}

/// A triangle with concrete vertex positions.
///
/// Utility type for geometric calculations. Winding is counter-clockwise
/// when viewed from the front (normal points toward viewer).
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
}

impl Triangle {
    /// Create a new triangle from three points.
    #[inline]
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// Compute the (unnormalized) face normal via cross product.
    /// The direction follows the right-hand rule with CCW winding.
    #[inline]
    pub fn normal_unnormalized(&self) -> Vector3<f64> {
        let e1 = self.v1 - self.v0;
        let e2 = self.v2 - self.v0;
        e1.cross(&e2)
    }

    /// Compute the unit face normal.
    /// Returns None for degenerate triangles (zero area).
    pub fn normal(&self) -> Option<Vector3<f64>> {
        let n = self.normal_unnormalized();
        let len_sq = n.norm_squared();
        if len_sq > f64::EPSILON * f64::EPSILON {
            Some(n / len_sq.sqrt())
        } else {
            None
        }
    }

    /// Compute the area of the triangle.
    #[inline]
    pub fn area(&self) -> f64 {
        self.normal_unnormalized().norm() * 0.5
    }

    /// Compute the centroid (center of mass).
    #[inline]
    pub fn centroid(&self) -> Point3<f64> {
        Point3::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }

    /// Compute the lengths of the three edges.
    /// Returns [len01, len12, len20] where lenXY is the distance from vX to vY.
    #[inline]
    pub fn edge_lengths(&self) -> [f64; 3] {
        [
            (self.v1 - self.v0).norm(),
            (self.v2 - self.v1).norm(),
            (self.v0 - self.v2).norm(),
        ]
    }

    /// Get the length of the longest edge.
    #[inline]
    pub fn max_edge_length(&self) -> f64 {
        let lengths = self.edge_lengths();
        lengths[0].max(lengths[1]).max(lengths[2])
    }

    /// Interior angles in radians at `v0`, `v1` and `v2`.
    ///
    /// Angles at a vertex with a zero-length adjacent edge are reported as 0.
    pub fn interior_angles(&self) -> [f64; 3] {
        [
            corner_angle(self.v0, self.v1, self.v2),
            corner_angle(self.v1, self.v2, self.v0),
            corner_angle(self.v2, self.v0, self.v1),
        ]
    }
}

/// Angle at `apex` between the rays to `a` and `b`.
fn corner_angle(apex: Point3<f64>, a: Point3<f64>, b: Point3<f64>) -> f64 {
    let u = a - apex;
    let v = b - apex;
    if u.norm_squared() == 0.0 || v.norm_squared() == 0.0 {
        return 0.0;
    }
    // atan2 stays accurate for angles near 0 and pi, unlike acos.
    u.cross(&v).norm().atan2(u.dot(&v))
}
