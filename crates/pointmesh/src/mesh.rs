//! Triangle mesh container with validated insertion.
//!
//! Storage is private so the two structural invariants hold for every mesh
//! the crate hands out:
//! - every face references three distinct vertices `< vertex_count`;
//! - no unordered vertex triple is stored twice.

use hashbrown::HashSet;
use nalgebra::Point3;

use crate::error::{ReconstructError, ReconstructResult};
use crate::types::{OrientedPoint, Triangle, Vertex};

/// A triangle mesh with indexed vertices and faces.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    faces: Vec<[u32; 3]>,
    /// Sorted triples of every stored face.
    face_keys: HashSet<[u32; 3]>,
}

impl Mesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh over a fixed vertex list with no faces.
    pub fn from_vertices(vertices: Vec<Vertex>) -> Self {
        Self {
            vertices,
            faces: Vec::new(),
            face_keys: HashSet::new(),
        }
    }

    /// Create a mesh whose vertices mirror the oriented points, in order.
    pub fn from_oriented_points(points: &[OrientedPoint]) -> Self {
        Self::from_vertices(points.iter().map(Vertex::from_oriented).collect())
    }

    /// Number of vertices in the mesh.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces (triangles) in the mesh.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if mesh is empty (no vertices or faces).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Faces as index triples, in insertion order.
    #[inline]
    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    /// Add a triangle `(a, b, c)` with the given winding.
    ///
    /// Returns `Ok(false)` without modifying the mesh when the same unordered
    /// triple is already present.
    ///
    /// # Errors
    ///
    /// [`ReconstructError::InvalidTriangle`] if an index is out of range or
    /// two indices are equal.
    pub fn add_triangle(&mut self, a: u32, b: u32, c: u32) -> ReconstructResult<bool> {
        let n = self.vertices.len();
        let in_range = [a, b, c].iter().all(|&i| (i as usize) < n);
        if !in_range || a == b || b == c || a == c {
            return Err(ReconstructError::InvalidTriangle {
                a,
                b,
                c,
                vertex_count: n,
            });
        }

        if !self.face_keys.insert(sorted_key(a, b, c)) {
            return Ok(false);
        }
        self.faces.push([a, b, c]);
        Ok(true)
    }

    /// Whether the unordered triple `{a, b, c}` is stored, in any winding.
    pub fn contains_triangle(&self, a: u32, b: u32, c: u32) -> bool {
        self.face_keys.contains(&sorted_key(a, b, c))
    }

    /// Consume the mesh, returning its vertex list and face triples.
    pub fn into_parts(self) -> (Vec<Vertex>, Vec<[u32; 3]>) {
        (self.vertices, self.faces)
    }

    /// Compute the axis-aligned bounding box.
    /// Returns (min_corner, max_corner) or None if mesh has no vertices.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        bounds_of(self.vertices.iter().map(|v| &v.position))
    }

    /// Iterate over triangles, yielding Triangle structs with actual vertex data.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.faces.iter().map(|&[i0, i1, i2]| self.make_triangle(i0, i1, i2))
    }

    /// Get a specific triangle by face index.
    pub fn triangle(&self, face_idx: usize) -> Option<Triangle> {
        self.faces
            .get(face_idx)
            .map(|&[i0, i1, i2]| self.make_triangle(i0, i1, i2))
    }

    /// Compute the total surface area of the mesh.
    pub fn surface_area(&self) -> f64 {
        self.triangles().map(|tri| tri.area()).sum()
    }

    fn make_triangle(&self, i0: u32, i1: u32, i2: u32) -> Triangle {
        Triangle::new(
            self.vertices[i0 as usize].position,
            self.vertices[i1 as usize].position,
            self.vertices[i2 as usize].position,
        )
    }
}

/// Axis-aligned bounds of a set of points, or `None` when empty.
pub fn bounds_of<'a>(
    points: impl IntoIterator<Item = &'a Point3<f64>>,
) -> Option<(Point3<f64>, Point3<f64>)> {
    let mut iter = points.into_iter();
    let first = *iter.next()?;
    let (mut min, mut max) = (first, first);
    for p in iter {
        min = min.inf(p);
        max = max.sup(p);
    }
    Some((min, max))
}

#[inline]
fn sorted_key(a: u32, b: u32, c: u32) -> [u32; 3] {
    let mut key = [a, b, c];
    key.sort_unstable();
    key
}
