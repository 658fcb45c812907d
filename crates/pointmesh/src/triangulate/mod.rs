//! Greedy front-expansion triangulation of oriented points.
//!
//! The mesh grows outward from seed points. Each point on the front is
//! expanded once: its neighbors are projected onto its tangent plane, the
//! visible and admissible ones are sorted by angle, and each angularly
//! adjacent pair is offered as a triangle. A triangle is kept only if it
//! is well shaped, follows the local surface, and leaves the mesh
//! edge-manifold with consistent winding.
//!
//! Processing order is fully determined by point indices: the lowest-index
//! fringe point is always expanded next, and new patches are seeded from
//! the lowest-index free point with a valid normal.

pub mod fan;
pub mod front;

use std::collections::BTreeSet;
use std::f64::consts::PI;

use nalgebra::{Point3, Vector2, Vector3};
use tracing::{debug, info, trace, warn};

use crate::error::ReconstructResult;
use crate::mesh::Mesh;
use crate::params::ReconstructionParams;
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::spatial::SpatialIndex;
use crate::tracing_ext::{OperationTimer, log_progress};
use crate::types::{OrientedPoint, Triangle};

use fan::{ANGLE_EPSILON, LocalFrame, Sector, normalize_angle, polar_angle};
use front::EdgeBook;

/// Squared distances below this fraction of `R^2` count as coincident.
pub const COINCIDENT_EPSILON: f64 = 1e-12;

/// How often, in expansions, progress is logged.
const PROGRESS_LOG_INTERVAL: usize = 1024;

/// Per-point triangulation state.
///
/// Transitions are monotonic: `Free -> Fringe -> Completed | Boundary`, and
/// `Boundary -> Completed` once later triangles close the point's fan. No
/// point returns to `Free` or `Fringe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointState {
    /// Not yet touched by any triangle.
    Free,
    /// Part of the mesh, waiting to be expanded.
    Fringe,
    /// Expanded, and surrounded by a closed fan of triangles.
    Completed,
    /// Expanded, with an open fan (or no triangles at all). Still accepts
    /// triangles from neighbors expanded later.
    Boundary,
}

/// How the triangulation loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriangulationStatus {
    /// Every reachable point was expanded.
    Complete,
    /// The expansion budget ran out.
    Truncated,
    /// The progress callback asked to stop.
    Cancelled,
}

/// Counters describing a triangulation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriangulationStats {
    /// Number of patches started from a seed point.
    pub seeds: usize,
    /// Number of points expanded.
    pub expansions: usize,
    /// Number of triangles produced.
    pub triangles: usize,
    pub completed: usize,
    pub boundary: usize,
    /// Points left on the front when the loop stopped early.
    pub fringe: usize,
    /// Points never reached by any patch.
    pub unreached: usize,
}

/// Output of [`triangulate`].
#[derive(Debug, Clone)]
pub struct Triangulation {
    pub mesh: Mesh,
    /// Final state of every point, in input order.
    pub states: Vec<PointState>,
    pub status: TriangulationStatus,
    pub stats: TriangulationStats,
}

/// Triangulate `points` with the given parameters.
///
/// # Errors
///
/// [`ReconstructError::InvalidParameter`](crate::ReconstructError) for
/// out-of-range parameters. Degenerate geometry never fails; it shows up as
/// `Boundary` or unreached points instead.
pub fn triangulate(
    points: &[OrientedPoint],
    params: &ReconstructionParams,
) -> ReconstructResult<Triangulation> {
    triangulate_with_progress(points, params, None)
}

/// Like [`triangulate`], reporting progress and honouring cancellation.
///
/// Progress counts points whose expansion has finished.
pub fn triangulate_with_progress(
    points: &[OrientedPoint],
    params: &ReconstructionParams,
    progress: Option<&ProgressCallback>,
) -> ReconstructResult<Triangulation> {
    params.validate()?;
    let _timer =
        OperationTimer::with_context("triangulation", points.len(), params.search_radius);

    let positions: Vec<Point3<f64>> = points.iter().map(|p| p.position).collect();
    let index = SpatialIndex::build(&positions);

    let mut triangulator = Triangulator::new(points, &index, params);
    let status = triangulator.run(progress)?;
    let result = triangulator.finish(status);

    info!(
        triangles = result.stats.triangles,
        seeds = result.stats.seeds,
        completed = result.stats.completed,
        boundary = result.stats.boundary,
        unreached = result.stats.unreached,
        status = ?result.status,
        "Triangulation finished"
    );
    Ok(result)
}

/// A neighbor of the expanding point, in that point's tangent frame.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    projected: Vector2<f64>,
    angle: f64,
    distance_squared: f64,
}

struct Triangulator<'a> {
    points: &'a [OrientedPoint],
    index: &'a SpatialIndex,
    params: &'a ReconstructionParams,
    states: Vec<PointState>,
    mesh: Mesh,
    edges: EdgeBook,
    queue: BTreeSet<usize>,
    /// All points below this index are either non-free or have no valid
    /// normal.
    seed_cursor: usize,
    cos_surface_angle: f64,
    coincident_squared: f64,
    stats: TriangulationStats,
    settled: usize,
}

impl<'a> Triangulator<'a> {
    fn new(
        points: &'a [OrientedPoint],
        index: &'a SpatialIndex,
        params: &'a ReconstructionParams,
    ) -> Self {
        Self {
            points,
            index,
            params,
            states: vec![PointState::Free; points.len()],
            mesh: Mesh::from_oriented_points(points),
            edges: EdgeBook::new(points.len()),
            queue: BTreeSet::new(),
            seed_cursor: 0,
            cos_surface_angle: params.max_surface_angle.cos(),
            coincident_squared: COINCIDENT_EPSILON
                * params.search_radius
                * params.search_radius,
            stats: TriangulationStats::default(),
            settled: 0,
        }
    }

    fn run(&mut self, progress: Option<&ProgressCallback>) -> ReconstructResult<TriangulationStatus> {
        let total = self.points.len();
        let tracker = ProgressTracker::new(total as u64);

        loop {
            if self.queue.is_empty() && self.find_seed().is_none() {
                return Ok(TriangulationStatus::Complete);
            }
            if let Some(limit) = self.params.max_iterations {
                if self.stats.expansions >= limit {
                    warn!(expansions = self.stats.expansions, "Expansion budget exhausted");
                    return Ok(TriangulationStatus::Truncated);
                }
            }
            tracker.set(self.settled as u64);
            if !tracker.maybe_callback(progress, "Triangulating") {
                warn!(expansions = self.stats.expansions, "Triangulation cancelled");
                return Ok(TriangulationStatus::Cancelled);
            }

            let p = match self.queue.pop_first() {
                Some(p) => p,
                None => match self.find_seed() {
                    Some(seed) => {
                        self.states[seed] = PointState::Fringe;
                        self.stats.seeds += 1;
                        debug!(seed, patch = self.stats.seeds, "Seeding new patch");
                        seed
                    }
                    None => return Ok(TriangulationStatus::Complete),
                },
            };

            self.expand(p)?;
            self.stats.expansions += 1;
            if self.stats.expansions % PROGRESS_LOG_INTERVAL == 0 {
                log_progress("triangulation", self.settled, total, Some("expanding front"));
            }
        }
    }

    fn finish(self, status: TriangulationStatus) -> Triangulation {
        let mut stats = self.stats;
        stats.triangles = self.mesh.face_count();
        for state in &self.states {
            match state {
                PointState::Free => stats.unreached += 1,
                PointState::Fringe => stats.fringe += 1,
                PointState::Completed => stats.completed += 1,
                PointState::Boundary => stats.boundary += 1,
            }
        }
        Triangulation {
            mesh: self.mesh,
            states: self.states,
            status,
            stats,
        }
    }

    /// Lowest-index free point with a valid normal.
    fn find_seed(&mut self) -> Option<usize> {
        while self.seed_cursor < self.points.len() {
            let i = self.seed_cursor;
            if self.states[i] == PointState::Free && self.points[i].normal.is_valid() {
                return Some(i);
            }
            self.seed_cursor += 1;
        }
        None
    }

    fn expand(&mut self, p: usize) -> ReconstructResult<()> {
        let Some(frame) = self.local_frame(p) else {
            self.settle(p);
            return Ok(());
        };

        let neighbors = self.gather(p, &frame);
        let occupied = self.occupied_sectors(p, &frame);

        let admissible: Vec<Candidate> = neighbors
            .iter()
            .filter(|q| is_gabriel_neighbor(q, &neighbors))
            .filter(|q| self.states[q.index] != PointState::Completed)
            .filter(|q| !occupied.iter().any(|s| s.contains(q.angle)))
            .filter(|q| self.normals_compatible(&frame, q.index))
            .copied()
            .collect();

        let before = self.mesh.face_count();
        let m = admissible.len();
        if m >= 2 {
            for k in 0..m {
                let (a, b) = (&admissible[k], &admissible[(k + 1) % m]);
                self.try_triangle(p, &frame, a, b, &neighbors)?;
            }
        }

        trace!(
            point = p,
            neighbors = neighbors.len(),
            admissible = m,
            added = self.mesh.face_count() - before,
            "Expanded point"
        );
        self.settle(p);
        Ok(())
    }

    /// Tangent frame at `p`, with the normal flipped to agree with the
    /// triangles already around `p`. Points without a valid normal borrow
    /// the average normal of their triangles.
    fn local_frame(&self, p: usize) -> Option<LocalFrame> {
        let incident: Vector3<f64> = self
            .edges
            .faces_at(p)
            .iter()
            .filter_map(|&f| self.mesh.triangle(f).and_then(|t| t.normal()))
            .sum();

        let base = match self.points[p].normal.vector() {
            Some(n) => n,
            None => incident.try_normalize(f64::EPSILON)?,
        };
        let normal = if incident.dot(&base) < 0.0 { -base } else { base };
        Some(LocalFrame::new(self.points[p].position, normal))
    }

    /// Non-coincident neighbors of `p` within `min(R, mu * d1)`, projected and
    /// sorted by (angle, distance, index).
    fn gather(&self, p: usize, frame: &LocalFrame) -> Vec<Candidate> {
        let nearest = self
            .index
            .nearest_neighbors(p, self.params.max_nearest_neighbors);
        let Some(first) = nearest
            .iter()
            .find(|n| n.distance_squared > self.coincident_squared)
        else {
            return Vec::new();
        };

        let radius = self
            .params
            .search_radius
            .min(self.params.mu * first.distance());
        let radius_squared = radius * radius;

        let mut candidates: Vec<Candidate> = nearest
            .iter()
            .filter(|n| {
                n.distance_squared > self.coincident_squared && n.distance_squared <= radius_squared
            })
            .filter_map(|n| {
                let projected = frame.project(&self.points[n.index].position);
                (projected.norm_squared() > self.coincident_squared).then(|| Candidate {
                    index: n.index,
                    projected,
                    angle: polar_angle(&projected),
                    distance_squared: n.distance_squared,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.angle
                .total_cmp(&b.angle)
                .then(a.distance_squared.total_cmp(&b.distance_squared))
                .then(a.index.cmp(&b.index))
        });
        candidates
    }

    /// Wedges covered by existing triangles at vertex `v`, in `frame`.
    fn occupied_sectors(&self, v: usize, frame: &LocalFrame) -> Vec<Sector> {
        let apex = frame.project(&self.points[v].position);
        let faces = self.mesh.faces();
        self.edges
            .faces_at(v)
            .iter()
            .map(|&f| {
                let [x, y] = other_two(faces[f], v as u32);
                Sector::between(
                    &apex,
                    &frame.project(&self.points[x as usize].position),
                    &frame.project(&self.points[y as usize].position),
                )
            })
            .collect()
    }

    fn normals_compatible(&self, frame: &LocalFrame, q: usize) -> bool {
        match self.points[q].normal.vector() {
            Some(n) => n.dot(&frame.normal).abs() >= self.cos_surface_angle,
            None => true,
        }
    }

    /// Offer triangle `(p, a, b)`, with `b` counter-clockwise from `a`.
    fn try_triangle(
        &mut self,
        p: usize,
        frame: &LocalFrame,
        a: &Candidate,
        b: &Candidate,
        neighbors: &[Candidate],
    ) -> ReconstructResult<bool> {
        let width = normalize_angle(b.angle - a.angle);
        if width <= ANGLE_EPSILON || width >= PI - ANGLE_EPSILON {
            return Ok(false);
        }
        let (pi, ai, bi) = (p as u32, a.index as u32, b.index as u32);
        if self.mesh.contains_triangle(pi, ai, bi) {
            return Ok(false);
        }

        let triangle = Triangle::new(
            self.points[p].position,
            self.points[a.index].position,
            self.points[b.index].position,
        );
        if triangle.max_edge_length() > self.params.search_radius {
            return Ok(false);
        }
        let shaped = triangle
            .interior_angles()
            .iter()
            .all(|&angle| angle >= self.params.min_angle && angle <= self.params.max_angle);
        if !shaped {
            return Ok(false);
        }
        match triangle.normal() {
            Some(n) if n.dot(&frame.normal) >= self.cos_surface_angle => {}
            _ => return Ok(false),
        }

        let origin = Vector2::zeros();
        let at_p = Sector {
            start: a.angle,
            width,
        };
        let at_a = Sector::between(&a.projected, &b.projected, &origin);
        let at_b = Sector::between(&b.projected, &origin, &a.projected);
        for (vertex, sector) in [(p, at_p), (a.index, at_a), (b.index, at_b)] {
            if self
                .occupied_sectors(vertex, frame)
                .iter()
                .any(|s| s.overlaps(&sector))
            {
                return Ok(false);
            }
        }

        let tolerance = self.coincident_squared;
        let blocked = neighbors.iter().any(|q| {
            q.index != a.index
                && q.index != b.index
                && fan::strictly_inside_triangle(
                    &origin,
                    &a.projected,
                    &b.projected,
                    &q.projected,
                    tolerance,
                )
        });
        if blocked {
            return Ok(false);
        }

        let face = [pi, ai, bi];
        if let Err(conflict) = self.edges.check(face) {
            trace!(?face, ?conflict, "Rejected triangle");
            return Ok(false);
        }
        if !self.mesh.add_triangle(pi, ai, bi)? {
            return Ok(false);
        }
        self.edges.insert(self.mesh.face_count() - 1, face);

        for v in [a.index, b.index] {
            match self.states[v] {
                PointState::Free => {
                    self.states[v] = PointState::Fringe;
                    self.queue.insert(v);
                }
                PointState::Boundary if self.edges.is_closed_fan(v, self.mesh.faces()) => {
                    trace!(point = v, "Fan closed after expansion");
                    self.states[v] = PointState::Completed;
                }
                _ => {}
            }
        }
        Ok(true)
    }

    fn settle(&mut self, p: usize) {
        self.states[p] = if self.edges.is_closed_fan(p, self.mesh.faces()) {
            PointState::Completed
        } else {
            PointState::Boundary
        };
        self.settled += 1;
    }
}

/// Whether no other neighbor lies strictly inside the circle whose diameter
/// joins the expanding point (the frame origin) to `q`.
fn is_gabriel_neighbor(q: &Candidate, neighbors: &[Candidate]) -> bool {
    let origin = Vector2::zeros();
    !neighbors.iter().any(|s| {
        s.index != q.index && fan::inside_diametral_circle(&origin, &q.projected, &s.projected)
    })
}

/// The two vertices of `face` other than `v`, in winding order.
fn other_two(face: [u32; 3], v: u32) -> [u32; 2] {
    match face.iter().position(|&w| w == v) {
        Some(0) => [face[1], face[2]],
        Some(1) => [face[2], face[0]],
        _ => [face[0], face[1]],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NormalEstimate;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn grid(n: usize, spacing: f64) -> Vec<OrientedPoint> {
        let mut points = Vec::with_capacity(n * n);
        for j in 0..n {
            for i in 0..n {
                points.push(OrientedPoint::new(
                    Point3::new(i as f64 * spacing, j as f64 * spacing, 0.0),
                    NormalEstimate::Valid(Vector3::z()),
                ));
            }
        }
        points
    }

    /// Grid with a fixed, irregular in-plane offset of up to `amplitude`.
    fn jittered_grid(n: usize, amplitude: f64) -> Vec<OrientedPoint> {
        grid(n, 1.0)
            .into_iter()
            .enumerate()
            .map(|(k, p)| {
                let dx = ((k * 7 + 3) % 11) as f64 / 5.0 - 1.0;
                let dy = ((k * 5 + 1) % 13) as f64 / 6.0 - 1.0;
                OrientedPoint::new(
                    p.position + Vector3::new(amplitude * dx, amplitude * dy, 0.0),
                    p.normal,
                )
            })
            .collect()
    }

    fn face_normals(mesh: &Mesh) -> Vec<Vector3<f64>> {
        mesh.triangles().filter_map(|t| t.normal()).collect()
    }

    #[test]
    fn test_single_triangle() {
        let points = vec![
            OrientedPoint::new(Point3::new(0.0, 0.0, 0.0), NormalEstimate::Valid(Vector3::z())),
            OrientedPoint::new(Point3::new(1.0, 0.0, 0.0), NormalEstimate::Valid(Vector3::z())),
            OrientedPoint::new(Point3::new(0.0, 1.0, 0.0), NormalEstimate::Valid(Vector3::z())),
        ];
        let result = triangulate(&points, &ReconstructionParams::new(3.0)).unwrap();

        assert_eq!(result.mesh.faces(), &[[0, 1, 2]]);
        assert_eq!(result.status, TriangulationStatus::Complete);
        assert!(result.states.iter().all(|s| *s == PointState::Boundary));
        assert_eq!(result.stats.seeds, 1);
        assert_eq!(result.stats.expansions, 3);
    }

    #[test]
    fn test_grid_interior_completed_and_ring_boundary() {
        let points = grid(10, 1.0);
        let result = triangulate(&points, &ReconstructionParams::new(3.0)).unwrap();

        assert_eq!(result.status, TriangulationStatus::Complete);
        assert_eq!(result.mesh.face_count(), 162);
        assert_eq!(result.stats.seeds, 1);
        for j in 0..10 {
            for i in 0..10 {
                let expected = if i == 0 || j == 0 || i == 9 || j == 9 {
                    PointState::Boundary
                } else {
                    PointState::Completed
                };
                assert_eq!(result.states[j * 10 + i], expected, "point ({i}, {j})");
            }
        }
        assert_eq!(result.stats.completed, 64);
        assert_eq!(result.stats.boundary, 36);
        assert!((result.mesh.surface_area() - 81.0).abs() < 1e-9);
    }

    #[test]
    fn test_jittered_grid_has_no_interior_holes() {
        let n = 12;
        let points = jittered_grid(n, 0.1);
        let result = triangulate(&points, &ReconstructionParams::new(2.5)).unwrap();

        assert_eq!(result.mesh.face_count(), 2 * (n - 1) * (n - 1));
        let report = crate::validate::validate_mesh(&result.mesh);
        assert!(report.is_valid(), "{report}");
        assert_eq!(report.boundary_edge_count, 4 * (n - 1));

        // Interior points settled as Boundary early are promoted once their
        // fan closes.
        assert_eq!(result.stats.completed, (n - 2) * (n - 2));
        assert_eq!(result.stats.boundary, 4 * (n - 1));
        for j in 1..n - 1 {
            for i in 1..n - 1 {
                assert_eq!(result.states[j * n + i], PointState::Completed, "point ({i}, {j})");
            }
        }
    }

    #[test]
    fn test_winding_follows_seed_normal() {
        let mut points = grid(6, 1.0);
        // Arbitrary per-point signs, as produced by normal estimation.
        for (i, p) in points.iter_mut().enumerate() {
            if i % 2 == 1 || i == 0 {
                p.normal = p.normal.flipped();
            }
        }
        let result = triangulate(&points, &ReconstructionParams::new(3.0)).unwrap();

        assert_eq!(result.mesh.face_count(), 50);
        // Seed 0 points down, so every face does.
        assert!(face_normals(&result.mesh).iter().all(|n| n.z < 0.0));
    }

    #[test]
    fn test_collinear_points_produce_no_triangles() {
        let points: Vec<OrientedPoint> = (0..5)
            .map(|i| {
                OrientedPoint::new(
                    Point3::new(i as f64, 0.0, 0.0),
                    NormalEstimate::Valid(Vector3::z()),
                )
            })
            .collect();
        let result = triangulate(&points, &ReconstructionParams::new(3.0)).unwrap();
        assert_eq!(result.mesh.face_count(), 0);
        assert_eq!(result.states[0], PointState::Boundary);
        assert_eq!(result.status, TriangulationStatus::Complete);
    }

    #[test]
    fn test_points_without_normals_are_unreached() {
        let points: Vec<OrientedPoint> = grid(3, 1.0)
            .into_iter()
            .map(|p| OrientedPoint::new(p.position, NormalEstimate::Collinear))
            .collect();
        let result = triangulate(&points, &ReconstructionParams::new(3.0)).unwrap();
        assert_eq!(result.stats.seeds, 0);
        assert_eq!(result.stats.unreached, 9);
        assert!(result.mesh.is_empty());
    }

    #[test]
    fn test_separate_patches_get_separate_seeds() {
        let mut points = grid(3, 1.0);
        points.extend(grid(3, 1.0).into_iter().map(|p| {
            OrientedPoint::new(p.position + Vector3::new(100.0, 0.0, 0.0), p.normal)
        }));
        let result = triangulate(&points, &ReconstructionParams::new(3.0)).unwrap();
        assert_eq!(result.stats.seeds, 2);
        assert_eq!(result.mesh.face_count(), 16);
    }

    #[test]
    fn test_edges_longer_than_radius_rejected() {
        let points = grid(4, 1.0);
        let result = triangulate(&points, &ReconstructionParams::new(1.2)).unwrap();
        // Diagonals are sqrt(2) > 1.2, so no right triangle fits.
        assert_eq!(result.mesh.face_count(), 0);
    }

    #[test]
    fn test_max_iterations_truncates() {
        let points = grid(5, 1.0);
        let params = ReconstructionParams::new(3.0).with_max_iterations(Some(2));
        let result = triangulate(&points, &params).unwrap();
        assert_eq!(result.status, TriangulationStatus::Truncated);
        assert_eq!(result.stats.expansions, 2);
        assert!(result.stats.fringe > 0);
    }

    #[test]
    fn test_cancellation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let callback: ProgressCallback = Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            false
        });

        let points = grid(5, 1.0);
        let result =
            triangulate_with_progress(&points, &ReconstructionParams::new(3.0), Some(&callback))
                .unwrap();
        assert_eq!(result.status, TriangulationStatus::Cancelled);
        assert_eq!(result.stats.expansions, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let points = grid(3, 1.0);
        assert!(triangulate(&points, &ReconstructionParams::new(-1.0)).is_err());
    }

    #[test]
    fn test_deterministic() {
        let points = grid(7, 0.5);
        let params = ReconstructionParams::new(1.5);
        let a = triangulate(&points, &params).unwrap();
        let b = triangulate(&points, &params).unwrap();
        assert_eq!(a.mesh.faces(), b.mesh.faces());
        assert_eq!(a.states, b.states);
    }

    #[test]
    fn test_other_two_keeps_winding() {
        assert_eq!(other_two([4, 5, 6], 4), [5, 6]);
        assert_eq!(other_two([4, 5, 6], 5), [6, 4]);
        assert_eq!(other_two([4, 5, 6], 6), [4, 5]);
    }
}
