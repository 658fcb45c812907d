//! Input validation and mesh reporting.

use hashbrown::HashMap;
use nalgebra::Point3;
use tracing::debug;

use crate::error::{MIN_POINTS, ReconstructError, ReconstructResult};
use crate::mesh::Mesh;
use crate::tracing_ext::log_validation_result;

/// Structural report for a triangle mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshReport {
    /// Total vertex count.
    pub vertex_count: usize,

    /// Total face count.
    pub face_count: usize,

    /// Faces with an out-of-range or repeated vertex index.
    pub invalid_face_count: usize,

    /// Faces whose unordered vertex triple appeared earlier.
    pub duplicate_face_count: usize,

    /// Edges with exactly one adjacent face.
    pub boundary_edge_count: usize,

    /// Edges with more than two adjacent faces.
    pub non_manifold_edge_count: usize,

    /// Edges traversed twice in the same direction (flipped neighbor).
    pub inconsistent_edge_count: usize,

    /// Vertices not referenced by any face.
    pub isolated_vertex_count: usize,

    /// Number of edge-connected face components.
    pub component_count: usize,

    /// Whether all edges have at most 2 adjacent faces.
    pub is_manifold: bool,

    /// Whether the mesh has faces and no boundary edges.
    pub is_watertight: bool,

    /// Bounding box as (min_corner, max_corner).
    pub bounds: Option<(Point3<f64>, Point3<f64>)>,

    /// Total surface area.
    pub surface_area: f64,

    /// Smallest and largest interior angle over all faces, in degrees.
    pub angle_range: Option<(f64, f64)>,
}

impl MeshReport {
    /// Whether every face is well formed, unique, manifold and consistently
    /// oriented with its neighbors. Open boundaries are allowed.
    pub fn is_valid(&self) -> bool {
        self.invalid_face_count == 0
            && self.duplicate_face_count == 0
            && self.non_manifold_edge_count == 0
            && self.inconsistent_edge_count == 0
    }
}

impl std::fmt::Display for MeshReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Mesh Report:")?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Faces: {}", self.face_count)?;
        writeln!(f, "  Components: {}", self.component_count)?;
        writeln!(f, "  Isolated vertices: {}", self.isolated_vertex_count)?;

        if let Some((min, max)) = &self.bounds {
            writeln!(
                f,
                "  Bounds: [{:.3}, {:.3}, {:.3}] to [{:.3}, {:.3}, {:.3}]",
                min.x, min.y, min.z, max.x, max.y, max.z
            )?;
        }

        writeln!(f, "  Surface Area: {:.4}", self.surface_area)?;
        if let Some((lo, hi)) = self.angle_range {
            writeln!(f, "  Interior angles: {:.1} to {:.1} degrees", lo, hi)?;
        }

        writeln!(
            f,
            "  Watertight: {} (boundary edges: {})",
            if self.is_watertight { "yes" } else { "no" },
            self.boundary_edge_count
        )?;
        writeln!(
            f,
            "  Manifold: {} (non-manifold edges: {})",
            if self.is_manifold { "yes" } else { "NO" },
            self.non_manifold_edge_count
        )?;
        writeln!(
            f,
            "  Orientation: {} (inconsistent edges: {})",
            if self.inconsistent_edge_count == 0 {
                "consistent"
            } else {
                "INCONSISTENT"
            },
            self.inconsistent_edge_count
        )?;

        if self.invalid_face_count > 0 || self.duplicate_face_count > 0 {
            writeln!(
                f,
                "  Invalid faces: {}, duplicate faces: {}",
                self.invalid_face_count, self.duplicate_face_count
            )?;
        }

        Ok(())
    }
}

/// Validate a mesh and return a report.
pub fn validate_mesh(mesh: &Mesh) -> MeshReport {
    let mut report = validate_faces(mesh.vertex_count(), mesh.faces());
    report.bounds = mesh.bounds();
    report.surface_area = mesh.surface_area();
    report.angle_range = mesh
        .triangles()
        .filter(|t| t.area() > 0.0)
        .flat_map(|t| t.interior_angles())
        .map(f64::to_degrees)
        .fold(None, |acc, a| match acc {
            None => Some((a, a)),
            Some((lo, hi)) => Some((f64::min(lo, a), f64::max(hi, a))),
        });

    log_validation_result(&report);
    report
}

/// Check the connectivity of raw face triples against `vertex_count`.
///
/// Geometry fields of the report (`bounds`, `surface_area`, `angle_range`)
/// are left empty.
pub fn validate_faces(vertex_count: usize, faces: &[[u32; 3]]) -> MeshReport {
    let mut invalid_face_count = 0;
    let mut duplicate_face_count = 0;
    let mut seen = hashbrown::HashSet::with_capacity(faces.len());
    let mut edge_faces: HashMap<(u32, u32), usize> = HashMap::new();
    let mut directed: HashMap<(u32, u32), usize> = HashMap::new();
    let mut referenced = vec![false; vertex_count];
    let mut components = DisjointSet::new(faces.len());
    let mut edge_owner: HashMap<(u32, u32), usize> = HashMap::new();
    let mut valid_faces = 0usize;

    for (fi, &[a, b, c]) in faces.iter().enumerate() {
        let in_range = [a, b, c].iter().all(|&v| (v as usize) < vertex_count);
        if !in_range || a == b || b == c || a == c {
            invalid_face_count += 1;
            continue;
        }
        let mut key = [a, b, c];
        key.sort_unstable();
        if !seen.insert(key) {
            duplicate_face_count += 1;
            continue;
        }
        valid_faces += 1;

        for v in [a, b, c] {
            referenced[v as usize] = true;
        }
        for (from, to) in [(a, b), (b, c), (c, a)] {
            let edge = if from < to { (from, to) } else { (to, from) };
            *edge_faces.entry(edge).or_insert(0) += 1;
            *directed.entry((from, to)).or_insert(0) += 1;
            match edge_owner.get(&edge) {
                Some(&other) => components.union(fi, other),
                None => {
                    edge_owner.insert(edge, fi);
                }
            }
        }
    }

    let boundary_edge_count = edge_faces.values().filter(|&&n| n == 1).count();
    let non_manifold_edge_count = edge_faces.values().filter(|&&n| n > 2).count();
    let inconsistent_edge_count = directed.values().filter(|&&n| n > 1).count();
    let isolated_vertex_count = referenced.iter().filter(|&&r| !r).count();

    // Only faces that made it into the edge maps count towards components.
    let mut roots = hashbrown::HashSet::new();
    for &fi in edge_owner.values() {
        roots.insert(components.find(fi));
    }

    debug!(
        faces = faces.len(),
        valid_faces,
        boundary_edge_count,
        non_manifold_edge_count,
        "Checked mesh connectivity"
    );

    MeshReport {
        vertex_count,
        face_count: faces.len(),
        invalid_face_count,
        duplicate_face_count,
        boundary_edge_count,
        non_manifold_edge_count,
        inconsistent_edge_count,
        isolated_vertex_count,
        component_count: roots.len(),
        is_manifold: non_manifold_edge_count == 0,
        is_watertight: valid_faces > 0 && boundary_edge_count == 0,
        bounds: None,
        surface_area: 0.0,
        angle_range: None,
    }
}

/// Check that a point cloud can be reconstructed: at least three points and
/// only finite coordinates.
///
/// # Errors
///
/// [`ReconstructError::InsufficientPoints`] or the first
/// [`ReconstructError::InvalidCoordinate`].
pub fn validate_points(points: &[Point3<f64>]) -> ReconstructResult<()> {
    if points.len() < MIN_POINTS {
        return Err(ReconstructError::insufficient_points(points.len()));
    }
    for (index, p) in points.iter().enumerate() {
        for (coordinate, value) in [("x", p.x), ("y", p.y), ("z", p.z)] {
            if !value.is_finite() {
                return Err(ReconstructError::InvalidCoordinate {
                    index,
                    coordinate,
                    value,
                });
            }
        }
    }
    Ok(())
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vertex;

    fn tetrahedron() -> Mesh {
        let mut mesh = Mesh::from_vertices(vec![
            Vertex::from_coords(0.0, 0.0, 0.0),
            Vertex::from_coords(1.0, 0.0, 0.0),
            Vertex::from_coords(0.5, 1.0, 0.0),
            Vertex::from_coords(0.5, 0.5, 1.0),
        ]);
        for [a, b, c] in [[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]] {
            mesh.add_triangle(a, b, c).unwrap();
        }
        mesh
    }

    #[test]
    fn test_validate_watertight_mesh() {
        let report = validate_mesh(&tetrahedron());
        assert!(report.is_valid());
        assert!(report.is_watertight);
        assert!(report.is_manifold);
        assert_eq!(report.boundary_edge_count, 0);
        assert_eq!(report.inconsistent_edge_count, 0);
        assert_eq!(report.component_count, 1);
        assert!(report.surface_area > 0.0);
    }

    #[test]
    fn test_validate_open_mesh() {
        let mut mesh = Mesh::from_vertices(vec![
            Vertex::from_coords(0.0, 0.0, 0.0),
            Vertex::from_coords(1.0, 0.0, 0.0),
            Vertex::from_coords(0.0, 1.0, 0.0),
            Vertex::from_coords(5.0, 5.0, 5.0),
        ]);
        mesh.add_triangle(0, 1, 2).unwrap();
        let report = validate_mesh(&mesh);
        assert!(report.is_valid());
        assert!(!report.is_watertight);
        assert_eq!(report.boundary_edge_count, 3);
        assert_eq!(report.isolated_vertex_count, 1);
        let (lo, hi) = report.angle_range.unwrap();
        assert!((lo - 45.0).abs() < 1e-9);
        assert!((hi - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_validate_faces_flags_problems() {
        let faces = [
            [0, 1, 2],
            [2, 1, 0], // duplicate triple
            [0, 0, 1], // repeated index
            [0, 1, 9], // out of range
            [0, 1, 3], // same direction as face 0 on 0->1
            [1, 0, 4],
            [0, 1, 5], // third face on edge 0-1
        ];
        let report = validate_faces(6, &faces);
        assert_eq!(report.invalid_face_count, 2);
        assert_eq!(report.duplicate_face_count, 1);
        assert_eq!(report.non_manifold_edge_count, 1);
        assert!(report.inconsistent_edge_count >= 1);
        assert!(!report.is_valid());
        assert!(!report.is_manifold);
    }

    #[test]
    fn test_components() {
        let faces = [[0, 1, 2], [1, 3, 2], [4, 5, 6]];
        let report = validate_faces(7, &faces);
        assert_eq!(report.component_count, 2);
    }

    #[test]
    fn test_empty_mesh() {
        let report = validate_mesh(&Mesh::new());
        assert!(report.is_valid());
        assert!(!report.is_watertight);
        assert_eq!(report.component_count, 0);
        assert!(report.bounds.is_none());
        assert!(report.angle_range.is_none());
    }

    #[test]
    fn test_report_display() {
        let text = validate_mesh(&tetrahedron()).to_string();
        assert!(text.contains("Vertices: 4"));
        assert!(text.contains("Watertight: yes"));
        assert!(text.contains("consistent"));
    }

    #[test]
    fn test_validate_points() {
        let ok = vec![Point3::new(0.0, 0.0, 0.0); 3];
        assert!(validate_points(&ok).is_ok());

        match validate_points(&ok[..2]) {
            Err(ReconstructError::InsufficientPoints { required, actual }) => {
                assert_eq!((required, actual), (3, 2));
            }
            other => panic!("expected InsufficientPoints, got {other:?}"),
        }

        let mut bad = ok.clone();
        bad[1].y = f64::INFINITY;
        match validate_points(&bad) {
            Err(ReconstructError::InvalidCoordinate {
                index, coordinate, ..
            }) => {
                assert_eq!(index, 1);
                assert_eq!(coordinate, "y");
            }
            other => panic!("expected InvalidCoordinate, got {other:?}"),
        }
    }
}
