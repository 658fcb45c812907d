//! Per-point surface normal estimation.
//!
//! Each normal is the smallest-eigenvalue eigenvector of the covariance of
//! the point's radius neighborhood (including the point itself). The sign is
//! whatever the eigensolver's canonical form gives; call
//! [`orient_normals_consistent`] to propagate one orientation across each
//! connected patch.

use std::collections::VecDeque;

use nalgebra::Point3;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::eigen::{Eigen3, covariance};
use crate::spatial::SpatialIndex;
use crate::tracing_ext::OperationTimer;
use crate::types::NormalEstimate;

/// Minimum neighbor count (excluding the point) for a plane fit.
pub const MIN_NEIGHBORS: usize = 3;

/// A neighborhood is collinear when its middle eigenvalue is at most this
/// fraction of the largest.
pub const COLLINEAR_TOLERANCE: f64 = 1e-12;

/// Estimate a normal for every point in `index` using neighbors within
/// `radius`. Output order matches the index's point order.
///
/// Points are processed in parallel; the result does not depend on thread
/// scheduling.
pub fn estimate_normals(index: &SpatialIndex, radius: f64) -> Vec<NormalEstimate> {
    let _timer = OperationTimer::with_context("normal_estimation", index.len(), radius);

    let normals: Vec<NormalEstimate> = (0..index.len())
        .into_par_iter()
        .map(|i| estimate_normal_at(index, i, radius))
        .collect();

    let valid = normals.iter().filter(|n| n.is_valid()).count();
    info!(
        points = normals.len(),
        valid = valid,
        degenerate = normals.len() - valid,
        "Estimated normals"
    );
    normals
}

/// Estimate the normal of point `i`.
pub fn estimate_normal_at(index: &SpatialIndex, i: usize, radius: f64) -> NormalEstimate {
    let neighbors = index.radius_neighbors(i, radius);
    if neighbors.len() < MIN_NEIGHBORS {
        return NormalEstimate::InsufficientNeighbors {
            found: neighbors.len(),
        };
    }

    let mut local: Vec<Point3<f64>> = Vec::with_capacity(neighbors.len() + 1);
    local.push(index.point(i));
    local.extend(neighbors.iter().map(|n| index.point(n.index)));
    fit_plane_normal(&local)
}

/// Normal of the least-squares plane through `points`.
pub fn fit_plane_normal(points: &[Point3<f64>]) -> NormalEstimate {
    let Some((_, cov)) = covariance(points) else {
        return NormalEstimate::InsufficientNeighbors { found: 0 };
    };
    let Some(eig) = Eigen3::decompose(&cov) else {
        return NormalEstimate::Collinear;
    };

    let largest = eig.largest_value();
    if largest <= 0.0 || eig.values[1] <= COLLINEAR_TOLERANCE * largest {
        return NormalEstimate::Collinear;
    }
    NormalEstimate::from_vector(eig.smallest().1)
}

/// Flip normals so neighbors within `radius` agree in sign.
///
/// Breadth-first from the lowest-index unvisited valid normal of each
/// connected component; that seed keeps its sign. Degenerate normals are
/// neither flipped nor traversed. Returns the number of flipped normals.
pub fn orient_normals_consistent(
    index: &SpatialIndex,
    normals: &mut [NormalEstimate],
    radius: f64,
) -> usize {
    let _timer = OperationTimer::new("normal_orientation");

    let mut visited = vec![false; normals.len()];
    let mut queue = VecDeque::new();
    let mut flipped = 0usize;
    let mut components = 0usize;

    for seed in 0..normals.len() {
        if visited[seed] || !normals[seed].is_valid() {
            continue;
        }
        components += 1;
        visited[seed] = true;
        queue.push_back(seed);

        while let Some(current) = queue.pop_front() {
            let Some(current_normal) = normals[current].vector() else {
                continue;
            };

            for neighbor in index.radius_neighbors(current, radius) {
                let j = neighbor.index;
                if visited[j] {
                    continue;
                }
                let Some(n) = normals[j].vector() else {
                    continue;
                };
                visited[j] = true;
                if n.dot(&current_normal) < 0.0 {
                    normals[j] = normals[j].flipped();
                    flipped += 1;
                }
                queue.push_back(j);
            }
        }
    }

    debug!(components, flipped, "Propagated normal orientation");
    flipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn make_planar_grid(n: usize, z: f64) -> Vec<Point3<f64>> {
        let mut points = Vec::new();
        for j in 0..n {
            for i in 0..n {
                points.push(Point3::new(i as f64, j as f64, z));
            }
        }
        points
    }

    #[test]
    fn test_planar_normals() {
        let points = make_planar_grid(6, 3.0);
        let index = SpatialIndex::build(&points);
        let normals = estimate_normals(&index, 1.5);

        assert_eq!(normals.len(), points.len());
        for normal in &normals {
            let n = normal.vector().expect("planar neighborhoods are well-defined");
            assert!((n.norm() - 1.0).abs() < 1e-6);
            assert!(n.z.abs() > 1.0 - 1e-9);
        }
    }

    #[test]
    fn test_tilted_plane_normals() {
        let axis = Vector3::new(1.0, -2.0, 0.5).normalize();
        let u = axis.cross(&Vector3::x()).normalize();
        let v = axis.cross(&u);
        let points: Vec<Point3<f64>> = (0..8)
            .flat_map(|j| (0..8).map(move |i| (i, j)))
            .map(|(i, j)| Point3::origin() + u * i as f64 * 0.3 + v * j as f64 * 0.3)
            .collect();

        let index = SpatialIndex::build(&points);
        for normal in estimate_normals(&index, 0.5) {
            let n = normal.vector().unwrap();
            assert!(n.dot(&axis).abs() > 1.0 - 1e-9);
        }
    }

    #[test]
    fn test_insufficient_neighbors() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(10.0, 10.0, 10.0),
        ];
        let index = SpatialIndex::build(&points);
        let normals = estimate_normals(&index, 2.0);
        assert_eq!(normals[0], NormalEstimate::InsufficientNeighbors { found: 2 });
        assert_eq!(normals[3], NormalEstimate::InsufficientNeighbors { found: 0 });
    }

    #[test]
    fn test_collinear_neighborhood() {
        let points: Vec<Point3<f64>> = (0..6).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let index = SpatialIndex::build(&points);
        assert_eq!(estimate_normal_at(&index, 2, 3.0), NormalEstimate::Collinear);
    }

    #[test]
    fn test_coincident_neighborhood_is_collinear() {
        let points = vec![Point3::new(1.0, 1.0, 1.0); 5];
        let index = SpatialIndex::build(&points);
        assert_eq!(estimate_normal_at(&index, 0, 0.1), NormalEstimate::Collinear);
    }

    #[test]
    fn test_estimation_is_deterministic() {
        let points = make_planar_grid(7, 0.0);
        let index = SpatialIndex::build(&points);
        assert_eq!(estimate_normals(&index, 1.5), estimate_normals(&index, 1.5));
    }

    #[test]
    fn test_orient_normals_consistent() {
        let points = make_planar_grid(5, 0.0);
        let index = SpatialIndex::build(&points);
        let mut normals: Vec<NormalEstimate> = (0..points.len())
            .map(|i| {
                let sign = if i % 3 == 0 { -1.0 } else { 1.0 };
                NormalEstimate::Valid(Vector3::z() * sign)
            })
            .collect();
        normals[7] = NormalEstimate::Collinear;

        let flipped = orient_normals_consistent(&index, &mut normals, 1.5);
        assert!(flipped > 0);

        // Seed 0 keeps its (negative) sign; everything valid agrees with it.
        for (i, n) in normals.iter().enumerate() {
            if i == 7 {
                assert_eq!(*n, NormalEstimate::Collinear);
            } else {
                assert_eq!(n.vector().unwrap().z, -1.0);
            }
        }
    }

    #[test]
    fn test_orient_separate_components() {
        let mut points = make_planar_grid(3, 0.0);
        points.extend(make_planar_grid(3, 100.0));
        let index = SpatialIndex::build(&points);
        let mut normals = vec![NormalEstimate::Valid(Vector3::z()); points.len()];
        normals[9] = NormalEstimate::Valid(-Vector3::z());

        orient_normals_consistent(&index, &mut normals, 1.5);
        // Second patch is seeded at index 9 and keeps that sign.
        assert!(normals[9..].iter().all(|n| n.vector().unwrap().z == -1.0));
        assert!(normals[..9].iter().all(|n| n.vector().unwrap().z == 1.0));
    }
}
