//! Edge case tests for reconstruction robustness.
//!
//! Unusual inputs must either produce a well-formed mesh or a typed error,
//! never a panic.

#[cfg(test)]
mod tests {
    use nalgebra::{Point3, Vector3};

    use crate::error::{DegenerateReason, ReconstructError, ReconstructionWarning};
    use crate::params::ReconstructionParams;
    use crate::pipeline::reconstruct;
    use crate::spatial::SpatialIndex;
    use crate::triangulate::TriangulationStatus;
    use crate::types::NormalEstimate;
    use crate::validate::validate_mesh;

    fn grid(n: usize, spacing: f64) -> Vec<Point3<f64>> {
        let mut points = Vec::with_capacity(n * n);
        for j in 0..n {
            for i in 0..n {
                points.push(Point3::new(i as f64 * spacing, j as f64 * spacing, 0.0));
            }
        }
        points
    }

    fn fibonacci_sphere(n: usize) -> Vec<Point3<f64>> {
        let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
        (0..n)
            .map(|i| {
                let y = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
                let r = (1.0 - y * y).sqrt();
                let theta = golden * i as f64;
                Point3::new(r * theta.cos(), y, r * theta.sin())
            })
            .collect()
    }

    // ==================== Degenerate Input Tests ====================

    #[test]
    fn test_empty_input() {
        let err = reconstruct(&[], &ReconstructionParams::default()).unwrap_err();
        assert!(matches!(
            err,
            ReconstructError::InsufficientPoints { actual: 0, .. }
        ));
    }

    #[test]
    fn test_three_points_have_too_few_neighbors() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let result = reconstruct(&points, &ReconstructionParams::new(3.0)).unwrap();

        assert_eq!(result.mesh.vertex_count(), 3);
        assert_eq!(result.mesh.face_count(), 0);
        assert!(
            result
                .normals
                .iter()
                .all(|n| *n == NormalEstimate::InsufficientNeighbors { found: 2 })
        );
        assert_eq!(result.stats.triangulation.unreached, 3);
    }

    #[test]
    fn test_collinear_cloud() {
        let points: Vec<_> = (0..11).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let result = reconstruct(&points, &ReconstructionParams::new(3.0)).unwrap();

        assert_eq!(result.mesh.face_count(), 0);
        assert!(result.normals.iter().all(|n| *n == NormalEstimate::Collinear));
        let degenerate = result
            .warnings
            .iter()
            .filter(|w| {
                matches!(
                    w,
                    ReconstructionWarning::DegenerateNeighborhood {
                        reason: DegenerateReason::Collinear,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(degenerate, 11);
    }

    #[test]
    fn test_nan_and_infinite_coordinates() {
        let mut points = grid(3, 1.0);
        points[2].y = f64::INFINITY;
        let err = reconstruct(&points, &ReconstructionParams::default()).unwrap_err();
        assert!(matches!(
            err,
            ReconstructError::InvalidCoordinate {
                index: 2,
                coordinate: "y",
                ..
            }
        ));

        // The index alone tolerates them by skipping.
        points[2].y = f64::NAN;
        let index = SpatialIndex::build(&points);
        assert!(index.radius_neighbors(0, 10.0).iter().all(|n| n.index != 2));
    }

    // ==================== Duplicate Point Tests ====================

    #[test]
    fn test_duplicate_points() {
        let mut points = grid(5, 1.0);
        points.push(points[12]);
        points.push(points[0]);
        points.push(points[12]);
        let result = reconstruct(&points, &ReconstructionParams::new(3.0)).unwrap();

        assert_eq!(result.mesh.vertex_count(), 28);
        assert!(result.mesh.face_count() > 0);
        assert!(validate_mesh(&result.mesh).is_valid());

        for tri in result.mesh.triangles() {
            assert!(tri.area() > 0.0);
        }
        for &[a, b, c] in result.mesh.faces() {
            let p = |i: u32| points[i as usize];
            assert_ne!(p(a), p(b));
            assert_ne!(p(b), p(c));
            assert_ne!(p(c), p(a));
        }
    }

    #[test]
    fn test_all_points_identical() {
        let points = vec![Point3::new(1.0, 2.0, 3.0); 10];
        let result = reconstruct(&points, &ReconstructionParams::new(1.0)).unwrap();
        assert_eq!(result.mesh.face_count(), 0);
        assert!(result.normals.iter().all(|n| !n.is_valid()));
    }

    // ==================== Scale Tests ====================

    #[test]
    fn test_scale_covariance() {
        let base = reconstruct(&grid(6, 1.0), &ReconstructionParams::new(3.0)).unwrap();
        let scaled = reconstruct(&grid(6, 2.0), &ReconstructionParams::new(6.0)).unwrap();

        assert_eq!(base.mesh.faces(), scaled.mesh.faces());
        assert_eq!(base.states, scaled.states);
    }

    #[test]
    fn test_tiny_coordinates() {
        let result = reconstruct(&grid(6, 1e-6), &ReconstructionParams::new(3e-6)).unwrap();
        assert!(result.mesh.face_count() > 0);
        assert_eq!(result.stats.valid_normals, 36);
        assert!(validate_mesh(&result.mesh).is_valid());
    }

    #[test]
    fn test_far_from_origin() {
        let points: Vec<_> = grid(6, 1.0)
            .into_iter()
            .map(|p| p + Vector3::new(1e6, -1e6, 5e5))
            .collect();
        let result = reconstruct(&points, &ReconstructionParams::new(3.0)).unwrap();
        assert!(result.mesh.face_count() > 0);
        assert!(validate_mesh(&result.mesh).is_valid());
    }

    #[test]
    fn test_radius_smaller_than_spacing() {
        let result = reconstruct(&grid(5, 1.0), &ReconstructionParams::new(0.5)).unwrap();
        assert_eq!(result.mesh.face_count(), 0);
        assert_eq!(result.stats.degenerate_normals, 25);
        assert_eq!(result.status, TriangulationStatus::Complete);
    }

    // ==================== Curved Surface Tests ====================

    #[test]
    fn test_sphere_normals_radial_and_consistent() {
        let points = fibonacci_sphere(500);
        let params = ReconstructionParams::new(0.5).with_normal_consistency(true);
        let result = reconstruct(&points, &params).unwrap();

        let dots: Vec<f64> = result
            .normals
            .iter()
            .zip(&points)
            .map(|(n, p)| n.vector().unwrap().dot(&p.coords))
            .collect();
        assert!(dots.iter().all(|d| d.abs() > 0.9));
        assert!(dots.iter().all(|d| *d > 0.0) || dots.iter().all(|d| *d < 0.0));

        assert!(result.mesh.face_count() > 0);
        let report = validate_mesh(&result.mesh);
        assert!(report.is_valid());
    }

    #[test]
    fn test_perpendicular_sheets_stay_separate() {
        // A floor and a wall that would meet along the y axis, with a gap
        // wider than the search radius.
        let mut points = Vec::new();
        for j in 0..6 {
            for i in 1..6 {
                points.push(Point3::new(i as f64, j as f64, 0.0));
                points.push(Point3::new(0.0, j as f64, i as f64 + 1.0));
            }
        }
        let result = reconstruct(&points, &ReconstructionParams::new(1.5)).unwrap();
        let report = validate_mesh(&result.mesh);
        assert!(report.is_valid());
        assert_eq!(report.component_count, 2);

        for &[a, b, c] in result.mesh.faces() {
            let on_floor = [a, b, c].map(|i| points[i as usize].z == 0.0);
            let on_wall = [a, b, c].map(|i| points[i as usize].x == 0.0);
            assert!(on_floor.iter().all(|&f| f) || on_wall.iter().all(|&w| w));
        }
    }
}
