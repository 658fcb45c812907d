//! Edge bookkeeping for the advancing front.

use hashbrown::{HashMap, HashSet};

/// Why a triangle cannot join the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeConflict {
    /// An edge is already shared by two triangles.
    EdgeFull { a: u32, b: u32 },
    /// A directed edge already exists with the same orientation.
    Orientation { from: u32, to: u32 },
}

/// Per-edge face counts, directed edges and per-vertex incident faces.
#[derive(Debug, Default)]
pub struct EdgeBook {
    edge_faces: HashMap<(u32, u32), u8>,
    directed: HashSet<(u32, u32)>,
    vertex_faces: Vec<Vec<usize>>,
}

impl EdgeBook {
    pub fn new(vertex_count: usize) -> Self {
        Self {
            edge_faces: HashMap::new(),
            directed: HashSet::new(),
            vertex_faces: vec![Vec::new(); vertex_count],
        }
    }

    /// Number of faces using the undirected edge `a-b`.
    #[inline]
    pub fn face_count(&self, a: u32, b: u32) -> u8 {
        self.edge_faces.get(&undirected(a, b)).copied().unwrap_or(0)
    }

    /// Check that face `[a, b, c]` keeps every edge 2-manifold and
    /// consistently oriented.
    pub fn check(&self, face: [u32; 3]) -> Result<(), EdgeConflict> {
        for (from, to) in directed_edges(face) {
            if self.face_count(from, to) >= 2 {
                return Err(EdgeConflict::EdgeFull { a: from, b: to });
            }
            if self.directed.contains(&(from, to)) {
                return Err(EdgeConflict::Orientation { from, to });
            }
        }
        Ok(())
    }

    /// Record face number `face_index` with vertices `face`.
    pub fn insert(&mut self, face_index: usize, face: [u32; 3]) {
        for (from, to) in directed_edges(face) {
            *self.edge_faces.entry(undirected(from, to)).or_insert(0) += 1;
            self.directed.insert((from, to));
        }
        for v in face {
            self.vertex_faces[v as usize].push(face_index);
        }
    }

    /// Indices of the faces incident to `v`.
    #[inline]
    pub fn faces_at(&self, v: usize) -> &[usize] {
        &self.vertex_faces[v]
    }

    /// Whether the faces around `v` close into a full fan: at least one face,
    /// and every edge leaving `v` shared by exactly two faces.
    pub fn is_closed_fan(&self, v: usize, faces: &[[u32; 3]]) -> bool {
        let incident = &self.vertex_faces[v];
        if incident.is_empty() {
            return false;
        }
        let v = v as u32;
        incident.iter().all(|&f| {
            faces[f]
                .iter()
                .filter(|&&w| w != v)
                .all(|&w| self.face_count(v, w) == 2)
        })
    }
}

#[inline]
fn undirected(a: u32, b: u32) -> (u32, u32) {
    if a < b { (a, b) } else { (b, a) }
}

#[inline]
fn directed_edges([a, b, c]: [u32; 3]) -> [(u32, u32); 3] {
    [(a, b), (b, c), (c, a)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_counts() {
        let mut book = EdgeBook::new(4);
        book.insert(0, [0, 1, 2]);
        assert_eq!(book.face_count(0, 1), 1);
        assert_eq!(book.face_count(1, 0), 1);
        assert_eq!(book.face_count(0, 3), 0);
        assert_eq!(book.faces_at(2), &[0]);
    }

    #[test]
    fn test_orientation_conflict() {
        let mut book = EdgeBook::new(4);
        book.insert(0, [0, 1, 2]);
        // Shares 0->1 in the same direction.
        assert_eq!(
            book.check([0, 1, 3]),
            Err(EdgeConflict::Orientation { from: 0, to: 1 })
        );
        // Uses 1->0: consistent neighbor.
        assert!(book.check([1, 0, 3]).is_ok());
    }

    #[test]
    fn test_full_edge_conflict() {
        let mut book = EdgeBook::new(5);
        book.insert(0, [0, 1, 2]);
        book.insert(1, [1, 0, 3]);
        assert_eq!(
            book.check([0, 4, 1]),
            Err(EdgeConflict::EdgeFull { a: 1, b: 0 })
        );
    }

    #[test]
    fn test_closed_fan() {
        // Vertex 0 at the centre of a square split into four triangles.
        let faces = vec![[0, 1, 2], [0, 2, 3], [0, 3, 4], [0, 4, 1]];
        let mut book = EdgeBook::new(5);
        for (i, f) in faces.iter().enumerate().take(3) {
            book.insert(i, *f);
        }
        assert!(!book.is_closed_fan(0, &faces));
        book.insert(3, faces[3]);
        assert!(book.is_closed_fan(0, &faces));
        assert!(!book.is_closed_fan(1, &faces));
        assert!(!EdgeBook::new(1).is_closed_fan(0, &[]));
    }
}
