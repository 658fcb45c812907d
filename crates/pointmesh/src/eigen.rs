//! Eigen-decomposition of 3x3 symmetric matrices.
//!
//! Thin wrapper over nalgebra's `SymmetricEigen` that sorts eigenpairs and
//! fixes the sign of each eigenvector, so PCA results do not depend on the
//! solver's internal iteration order.

use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};

/// Sorted eigen-decomposition of a symmetric 3x3 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eigen3 {
    /// Eigenvalues in ascending order.
    pub values: [f64; 3],
    /// Unit eigenvectors matching `values`, each with canonical sign.
    pub vectors: [Vector3<f64>; 3],
}

impl Eigen3 {
    /// Decompose `matrix`. Only the lower triangle is read.
    ///
    /// Returns `None` if the matrix has non-finite entries.
    pub fn decompose(matrix: &Matrix3<f64>) -> Option<Self> {
        if !matrix.iter().all(|v| v.is_finite()) {
            return None;
        }

        let eig = SymmetricEigen::new(*matrix);
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));

        let values = order.map(|i| eig.eigenvalues[i]);
        let vectors = order.map(|i| canonical_sign(eig.eigenvectors.column(i).into_owned()));
        Some(Self { values, vectors })
    }

    /// The eigenpair with the smallest eigenvalue.
    #[inline]
    pub fn smallest(&self) -> (f64, Vector3<f64>) {
        (self.values[0], self.vectors[0])
    }

    /// The largest eigenvalue.
    #[inline]
    pub fn largest_value(&self) -> f64 {
        self.values[2]
    }
}

/// Covariance of `points` about their centroid, with the centroid.
///
/// Returns `None` for an empty input.
pub fn covariance(points: &[Point3<f64>]) -> Option<(Point3<f64>, Matrix3<f64>)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let centroid = Point3::from(
        points
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords)
            / n,
    );

    let mut cov = Matrix3::zeros();
    for p in points {
        let d = p - centroid;
        cov += d * d.transpose();
    }
    Some((centroid, cov / n))
}

/// Flip `v` so its largest-magnitude component is positive.
fn canonical_sign(v: Vector3<f64>) -> Vector3<f64> {
    let mut dominant = 0;
    for i in 1..3 {
        if v[i].abs() > v[dominant].abs() {
            dominant = i;
        }
    }
    let v = v.normalize();
    if v[dominant] < 0.0 { -v } else { v }
}
