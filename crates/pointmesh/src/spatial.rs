//! Radius and k-nearest neighbor queries over a fixed point set.
//!
//! [`SpatialIndex`] wraps a kiddo k-d tree. Results are always re-ranked by
//! the exact squared distance computed from the original coordinates, with
//! ties broken by index, so query output is deterministic and unaffected by
//! the tree's internal layout.
//!
//! # Example
//!
//! ```
//! use nalgebra::Point3;
//! use pointmesh::SpatialIndex;
//!
//! let points = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(3.0, 0.0, 0.0),
//! ];
//! let index = SpatialIndex::build(&points);
//!
//! let near = index.radius_neighbors(0, 1.5);
//! assert_eq!(near.len(), 1);
//! assert_eq!(near[0].index, 1);
//! ```

use hashbrown::HashMap;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Point3, Rotation3};

/// Relative slack applied to tree queries before exact re-filtering.
const QUERY_SLACK: f64 = 1e-9;

/// One query result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index of the neighbor in the point set the index was built from.
    pub index: usize,
    /// Exact squared Euclidean distance to the query.
    pub distance_squared: f64,
}

impl Neighbor {
    #[inline]
    pub fn distance(&self) -> f64 {
        self.distance_squared.sqrt()
    }
}

/// Spatial index over an immutable point set.
///
/// The tree stores each distinct position once, in a fixed rotated frame.
/// Gridded or planar clouds otherwise put many points on the same split
/// value, which the mutable kiddo tree cannot bucket. Exact duplicates are
/// tracked beside the tree and expanded on query.
pub struct SpatialIndex {
    points: Vec<Point3<f64>>,
    tree: KdTree<f64, 3>,
    frame: Rotation3<f64>,
    /// Representative index -> other indices at the identical position.
    duplicates: HashMap<usize, Vec<usize>>,
    /// Point index -> index of the tree entry holding its position.
    representative: Vec<usize>,
}

impl SpatialIndex {
    /// Build an index over `points`. Non-finite points are never returned.
    pub fn build(points: &[Point3<f64>]) -> Self {
        let frame = Rotation3::from_euler_angles(0.372_1, 1.109_3, 2.441_7);
        let mut tree: KdTree<f64, 3> = KdTree::new();
        let mut representatives: HashMap<[u64; 3], usize> = HashMap::new();
        let mut duplicates: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut representative: Vec<usize> = (0..points.len()).collect();

        for (i, p) in points.iter().enumerate() {
            if !p.coords.iter().all(|c| c.is_finite()) {
                continue;
            }
            match representatives.entry(position_key(p)) {
                hashbrown::hash_map::Entry::Occupied(entry) => {
                    let rep = *entry.get();
                    duplicates.entry(rep).or_default().push(i);
                    representative[i] = rep;
                }
                hashbrown::hash_map::Entry::Vacant(entry) => {
                    entry.insert(i);
                    tree.add(&rotated(&frame, p), i as u64);
                }
            }
        }

        Self {
            points: points.to_vec(),
            tree,
            frame,
            duplicates,
            representative,
        }
    }

    /// Number of points the index was built from.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The original coordinates, in input order.
    #[inline]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Coordinates of point `index`.
    #[inline]
    pub fn point(&self, index: usize) -> Point3<f64> {
        self.points[index]
    }

    /// All points within distance `radius` of `query` (inclusive), sorted by
    /// distance then index.
    pub fn radius_search(&self, query: &Point3<f64>, radius: f64) -> Vec<Neighbor> {
        self.radius_filtered(query, radius, None)
    }

    /// All other points within distance `radius` of point `index`.
    pub fn radius_neighbors(&self, index: usize, radius: f64) -> Vec<Neighbor> {
        self.radius_filtered(&self.points[index], radius, Some(index))
    }

    /// The `k` points closest to `query`, sorted by distance then index.
    pub fn nearest_search(&self, query: &Point3<f64>, k: usize) -> Vec<Neighbor> {
        self.nearest_filtered(query, k, None)
    }

    /// The `k` points closest to point `index`, excluding the point itself.
    pub fn nearest_neighbors(&self, index: usize, k: usize) -> Vec<Neighbor> {
        self.nearest_filtered(&self.points[index], k, Some(index))
    }

    /// Mean distance from a sample of points to their nearest neighbor at a
    /// different position. Returns `None` if no such pair exists.
    pub fn average_spacing(&self, max_samples: usize) -> Option<f64> {
        if self.points.len() < 2 || max_samples == 0 {
            return None;
        }
        let step = (self.points.len() / max_samples).max(1);

        let mut total = 0.0;
        let mut count = 0usize;
        for i in (0..self.points.len()).step_by(step) {
            if !self.points[i].coords.iter().all(|c| c.is_finite()) {
                continue;
            }
            // Duplicates of `i` come first; the tree holds each position once,
            // so two representatives always reach a distinct neighbor.
            let extra = self.duplicates_of(i);
            let nearest = self
                .nearest_neighbors(i, extra + 1)
                .into_iter()
                .find(|n| n.distance_squared > 0.0);
            if let Some(n) = nearest {
                total += n.distance();
                count += 1;
            }
        }

        (count > 0).then(|| total / count as f64)
    }

    fn radius_filtered(
        &self,
        query: &Point3<f64>,
        radius: f64,
        exclude: Option<usize>,
    ) -> Vec<Neighbor> {
        if self.tree.size() == 0
            || radius.is_nan()
            || radius < 0.0
            || !query.coords.iter().all(|c| c.is_finite())
        {
            return Vec::new();
        }
        let r2 = radius * radius;
        let hits = self.tree.within::<SquaredEuclidean>(
            &rotated(&self.frame, query),
            r2 * (1.0 + QUERY_SLACK) + f64::MIN_POSITIVE,
        );

        let mut out = self.expand(query, hits.iter().map(|h| h.item as usize), exclude);
        out.retain(|n| n.distance_squared <= r2);
        sort_neighbors(&mut out);
        out
    }

    fn nearest_filtered(
        &self,
        query: &Point3<f64>,
        k: usize,
        exclude: Option<usize>,
    ) -> Vec<Neighbor> {
        if self.tree.size() == 0 || k == 0 || !query.coords.iter().all(|c| c.is_finite()) {
            return Vec::new();
        }

        // The k+1 nearest distinct positions bound the k-th exact distance;
        // a radius pass at that bound then resolves ties deterministically.
        let hits = self
            .tree
            .nearest_n::<SquaredEuclidean>(&rotated(&self.frame, query), k + 1);
        let bound = hits
            .iter()
            .map(|h| (self.points[h.item as usize] - query).norm_squared())
            .fold(0.0_f64, f64::max);
        let wide = self.tree.within::<SquaredEuclidean>(
            &rotated(&self.frame, query),
            bound * (1.0 + QUERY_SLACK) + f64::MIN_POSITIVE,
        );

        let mut out = self.expand(query, wide.iter().map(|h| h.item as usize), exclude);
        out.retain(|n| n.distance_squared <= bound);
        sort_neighbors(&mut out);
        out.truncate(k);
        out
    }

    /// Turn tree hits into exact neighbors, including stored duplicates.
    fn expand(
        &self,
        query: &Point3<f64>,
        representatives: impl Iterator<Item = usize>,
        exclude: Option<usize>,
    ) -> Vec<Neighbor> {
        let mut out = Vec::new();
        for rep in representatives {
            let distance_squared = (self.points[rep] - query).norm_squared();
            let group = std::iter::once(rep).chain(
                self.duplicates
                    .get(&rep)
                    .into_iter()
                    .flat_map(|dups| dups.iter().copied()),
            );
            for index in group {
                if Some(index) != exclude {
                    out.push(Neighbor {
                        index,
                        distance_squared,
                    });
                }
            }
        }
        out
    }

    /// Number of other points sharing the position of `index`.
    fn duplicates_of(&self, index: usize) -> usize {
        self.duplicates
            .get(&self.representative[index])
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("points", &self.points.len())
            .field("distinct", &self.tree.size())
            .finish()
    }
}

fn sort_neighbors(neighbors: &mut [Neighbor]) {
    neighbors.sort_by(|a, b| {
        a.distance_squared
            .total_cmp(&b.distance_squared)
            .then(a.index.cmp(&b.index))
    });
}

#[inline]
fn rotated(frame: &Rotation3<f64>, p: &Point3<f64>) -> [f64; 3] {
    let r = frame * p;
    [r.x, r.y, r.z]
}

/// Bit-exact position key; `-0.0` and `0.0` map to the same key.
#[inline]
fn position_key(p: &Point3<f64>) -> [u64; 3] {
    [p.x, p.y, p.z].map(|c| (c + 0.0).to_bits())
}
