//! Nearest-node lookup in planar map space
//!
//! This module is only available with the `spatial-index` feature. Hosts use
//! it to resolve a click or cursor position to the node under it.

use glam::DVec2;
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;

/// Wrapper around a KD-tree over node positions
///
/// Items are dense node indices into the owning world's node arena.
///
/// # Performance
///
/// - Construction: O(n log n), once per world
/// - Query: O(log n)
#[derive(Clone)]
pub struct SpatialIndex {
    tree: Option<ImmutableKdTree<f64, usize, 2, 32>>,
}

impl SpatialIndex {
    /// Build the index from planar positions
    ///
    /// ```
    /// use rust_node_network::SpatialIndex;
    /// use glam::DVec2;
    ///
    /// let index = SpatialIndex::new(&[DVec2::new(0.0, 0.0), DVec2::new(10.0, 0.0)]);
    /// assert_eq!(index.find_nearest(DVec2::new(9.0, 1.0)), Some((1, 2.0)));
    /// ```
    pub fn new(positions: &[DVec2]) -> Self {
        if positions.is_empty() {
            return Self { tree: None };
        }
        let points: Vec<[f64; 2]> = positions.iter().map(|p| [p.x, p.y]).collect();
        Self {
            tree: Some(ImmutableKdTree::new_from_slice(&points)),
        }
    }

    /// Index of the nearest position and its squared distance
    ///
    /// Returns `None` for an empty index.
    pub fn find_nearest(&self, position: DVec2) -> Option<(usize, f64)> {
        let tree = self.tree.as_ref()?;
        let result = tree.nearest_one::<SquaredEuclidean>(&[position.x, position.y]);
        Some((result.item, result.distance))
    }
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("populated", &self.tree.is_some())
            .finish()
    }
}
