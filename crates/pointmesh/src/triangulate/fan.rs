//! Tangent-plane geometry for fan construction.
//!
//! Everything here works in the 2D frame of the point being expanded:
//! neighbors are projected onto its tangent plane and compared by polar
//! angle.

use nalgebra::{Point3, Vector2, Vector3};
use std::f64::consts::{PI, TAU};

/// Angular tolerance for sector tests, in radians.
pub const ANGLE_EPSILON: f64 = 1e-9;

/// Orthonormal tangent frame at a point.
#[derive(Debug, Clone, Copy)]
pub struct LocalFrame {
    pub origin: Point3<f64>,
    pub normal: Vector3<f64>,
    u: Vector3<f64>,
    v: Vector3<f64>,
}

impl LocalFrame {
    /// Build a frame whose `(u, v, normal)` axes are right-handed, so that
    /// counter-clockwise in `(u, v)` is counter-clockwise about `normal`.
    ///
    /// `normal` must be unit length.
    pub fn new(origin: Point3<f64>, normal: Vector3<f64>) -> Self {
        let helper = if normal.x.abs() < 0.9 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let u = normal.cross(&helper).normalize();
        let v = normal.cross(&u);
        Self {
            origin,
            normal,
            u,
            v,
        }
    }

    /// Coordinates of `p` projected onto the tangent plane.
    #[inline]
    pub fn project(&self, p: &Point3<f64>) -> Vector2<f64> {
        let d = p - self.origin;
        Vector2::new(d.dot(&self.u), d.dot(&self.v))
    }
}

/// Polar angle of `v` in `[0, 2pi)`.
#[inline]
pub fn polar_angle(v: &Vector2<f64>) -> f64 {
    normalize_angle(v.y.atan2(v.x))
}

/// Wrap an angle into `[0, 2pi)`.
#[inline]
pub fn normalize_angle(a: f64) -> f64 {
    let r = a.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if r >= TAU { 0.0 } else { r }
}

/// An angular wedge around a vertex: from `start`, counter-clockwise by
/// `width`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sector {
    pub start: f64,
    pub width: f64,
}

impl Sector {
    /// The wedge at `apex` spanned by the rays to `a` and `b`, taking the
    /// side narrower than a half-turn.
    pub fn between(apex: &Vector2<f64>, a: &Vector2<f64>, b: &Vector2<f64>) -> Self {
        let ta = polar_angle(&(a - apex));
        let tb = polar_angle(&(b - apex));
        let d = normalize_angle(tb - ta);
        if d <= PI {
            Sector { start: ta, width: d }
        } else {
            Sector {
                start: tb,
                width: TAU - d,
            }
        }
    }

    /// Whether `angle` lies strictly inside the wedge.
    #[inline]
    pub fn contains(&self, angle: f64) -> bool {
        let d = normalize_angle(angle - self.start);
        d > ANGLE_EPSILON && d < self.width - ANGLE_EPSILON
    }

    /// Whether the interiors of two wedges intersect. Wedges that only share
    /// a bounding ray do not overlap.
    pub fn overlaps(&self, other: &Sector) -> bool {
        if self.width <= ANGLE_EPSILON || other.width <= ANGLE_EPSILON {
            return false;
        }
        let d = normalize_angle(other.start - self.start);
        d < self.width - ANGLE_EPSILON || d > TAU - other.width + ANGLE_EPSILON
    }
}

/// Whether `q` lies strictly inside the circle with diameter `a`-`b`.
#[inline]
pub fn inside_diametral_circle(a: &Vector2<f64>, b: &Vector2<f64>, q: &Vector2<f64>) -> bool {
    let centre = (a + b) * 0.5;
    let r2 = (b - a).norm_squared() * 0.25;
    (q - centre).norm_squared() < r2 * (1.0 - ANGLE_EPSILON)
}

/// Twice the signed area of triangle `abc`; positive when counter-clockwise.
#[inline]
pub fn orient2d(a: &Vector2<f64>, b: &Vector2<f64>, c: &Vector2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Whether `q` lies strictly inside triangle `abc` (any winding), with a
/// tolerance of `tolerance` on each doubled sub-area.
pub fn strictly_inside_triangle(
    a: &Vector2<f64>,
    b: &Vector2<f64>,
    c: &Vector2<f64>,
    q: &Vector2<f64>,
    tolerance: f64,
) -> bool {
    let sign = orient2d(a, b, c).signum();
    if sign == 0.0 {
        return false;
    }
    let d1 = orient2d(a, b, q) * sign;
    let d2 = orient2d(b, c, q) * sign;
    let d3 = orient2d(c, a, q) * sign;
    d1 > tolerance && d2 > tolerance && d3 > tolerance
}
