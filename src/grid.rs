//! Uniform lat/lng bucket grid for discovery queries
//!
//! Cells are `cell_size` degrees tall and `2 * cell_size` degrees wide; the
//! wider cells roughly compensate for longitude compression at mid
//! latitudes. Distance queries widen the column reach further by the
//! latitude of the query point.

use ahash::AHashMap;

use crate::node::{BaseNode, NodeId};

/// Kilometres per degree of latitude
const KM_PER_DEGREE: f64 = 111.195;

/// Grid cell key: `(lat row, lon column)`
pub type CellKey = (i32, i32);

/// How far around the query cell to look
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingRadius {
    /// The `(2n + 1)²` cells centred on the query cell
    Cells(u32),
    /// `rows` cells north and south, `cols` cells east and west
    Span { rows: u32, cols: u32 },
    /// Every node, ignoring the partition
    All,
}

/// Node ids bucketed by grid cell
///
/// Built once per world and never updated incrementally.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f64,
    cells: AHashMap<CellKey, Vec<NodeId>>,
    all: Vec<NodeId>,
    min: CellKey,
    max: CellKey,
}

impl SpatialGrid {
    /// Create an empty grid
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            cells: AHashMap::new(),
            all: Vec::new(),
            min: (i32::MAX, i32::MAX),
            max: (i32::MIN, i32::MIN),
        }
    }

    /// Bucket every node by its earth coordinates
    pub fn build<'a>(cell_size: f64, nodes: impl IntoIterator<Item = &'a BaseNode>) -> Self {
        let mut grid = Self::new(cell_size);
        for node in nodes {
            grid.insert(node.id, node.lat(), node.lon());
        }
        grid
    }

    /// Cell height in degrees
    #[inline]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Cell containing a coordinate
    #[inline]
    pub fn cell_key(&self, lat: f64, lon: f64) -> CellKey {
        (
            (lat / self.cell_size).floor() as i32,
            (lon / (2.0 * self.cell_size)).floor() as i32,
        )
    }

    fn insert(&mut self, id: NodeId, lat: f64, lon: f64) {
        let key = self.cell_key(lat, lon);
        self.cells.entry(key).or_default().push(id);
        self.all.push(id);
        self.min = (self.min.0.min(key.0), self.min.1.min(key.1));
        self.max = (self.max.0.max(key.0), self.max.1.max(key.1));
    }

    /// Ids in the cells within `ring` of the cell containing `(lat, lon)`
    ///
    /// Results are ordered row by row, then by insertion order within a
    /// cell; scan selection relies on this order for tie-breaking.
    pub fn query_adjacent(&self, lat: f64, lon: f64, ring: RingRadius) -> Vec<NodeId> {
        let (rows, cols) = match ring {
            RingRadius::All => return self.all.clone(),
            RingRadius::Cells(r) => (r as i32, r as i32),
            RingRadius::Span { rows, cols } => (rows as i32, cols as i32),
        };

        let (row, col) = self.cell_key(lat, lon);
        let mut found = Vec::new();
        for dr in -rows..=rows {
            for dc in -cols..=cols {
                if let Some(ids) = self.cells.get(&(row.saturating_add(dr), col.saturating_add(dc))) {
                    found.extend_from_slice(ids);
                }
            }
        }
        found
    }

    /// Smallest span guaranteed to cover every point within `km` of a
    /// query point at latitude `lat`
    ///
    /// Rows cover the meridian reach. Columns cover the widest longitude
    /// offset of the distance circle, which grows as `1 / cos(lat)`; once a
    /// pole falls inside the circle every longitude is in reach.
    ///
    /// Returns [`RingRadius::All`] when the span would cover the whole
    /// populated extent, where partitioning no longer narrows the search.
    pub fn ring_for_distance_km(&self, lat: f64, km: f64) -> RingRadius {
        if self.all.is_empty() {
            return RingRadius::All;
        }

        let reach = km.max(0.0) / KM_PER_DEGREE;
        if reach >= 90.0 - lat.abs() {
            return RingRadius::All;
        }

        let ratio = reach.to_radians().sin() / lat.to_radians().cos();
        let lon_reach = ratio.clamp(0.0, 1.0).asin().to_degrees();
        let rows = (reach / self.cell_size).ceil();
        let cols = (lon_reach / (2.0 * self.cell_size)).ceil();

        let row_span = (self.max.0 - self.min.0).max(0) as f64;
        let col_span = (self.max.1 - self.min.1).max(0) as f64;
        if rows >= row_span && cols >= col_span {
            RingRadius::All
        } else {
            RingRadius::Span {
                rows: rows as u32,
                cols: cols as u32,
            }
        }
    }

    /// Node groups keyed by cell
    pub fn groups(&self) -> &AHashMap<CellKey, Vec<NodeId>> {
        &self.cells
    }

    /// Number of indexed nodes
    #[inline]
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// Whether the grid is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeType;
    use glam::DVec2;
    use proptest::prelude::*;

    fn node(id: NodeId, lon: f64, lat: f64) -> BaseNode {
        BaseNode::new(id, DVec2::ZERO, [lon, lat], "X", NodeType::Basic)
    }

    #[test]
    fn test_cell_key_uses_double_width() {
        let grid = SpatialGrid::new(2.0);
        assert_eq!(grid.cell_key(1.0, 3.9), (0, 0));
        assert_eq!(grid.cell_key(2.0, 4.0), (1, 1));
        assert_eq!(grid.cell_key(-0.1, -0.1), (-1, -1));
    }

    #[test]
    fn test_query_ring_zero_and_one() {
        let nodes = vec![node(1, 1.0, 1.0), node(2, 5.0, 1.0), node(3, 50.0, 50.0)];
        let grid = SpatialGrid::build(2.0, &nodes);

        assert_eq!(grid.query_adjacent(1.5, 1.5, RingRadius::Cells(0)), vec![1]);
        let mut near = grid.query_adjacent(1.5, 1.5, RingRadius::Cells(1));
        near.sort_unstable();
        assert_eq!(near, vec![1, 2]);
        assert_eq!(grid.query_adjacent(0.0, 0.0, RingRadius::All).len(), 3);
    }

    #[test]
    fn test_ring_for_distance() {
        let nodes = vec![node(1, -100.0, -40.0), node(2, 100.0, 40.0)];
        let grid = SpatialGrid::build(2.0, &nodes);
        assert_eq!(
            grid.ring_for_distance_km(0.0, 100.0),
            RingRadius::Span { rows: 1, cols: 1 }
        );
        assert_eq!(
            grid.ring_for_distance_km(0.0, 500.0),
            RingRadius::Span { rows: 3, cols: 2 }
        );
        assert_eq!(grid.ring_for_distance_km(0.0, 50_000.0), RingRadius::All);

        let empty = SpatialGrid::new(2.0);
        assert_eq!(empty.ring_for_distance_km(0.0, 1.0), RingRadius::All);
    }

    #[test]
    fn test_ring_widens_columns_toward_poles() {
        let nodes = vec![node(1, -100.0, -40.0), node(2, 100.0, 80.0)];
        let grid = SpatialGrid::build(2.0, &nodes);

        // 500 km spans ~13.3 degrees of longitude at 70N
        assert_eq!(
            grid.ring_for_distance_km(70.0, 500.0),
            RingRadius::Span { rows: 3, cols: 4 }
        );
        assert_eq!(
            grid.ring_for_distance_km(-70.0, 500.0),
            RingRadius::Span { rows: 3, cols: 4 }
        );
        // The pole is within reach
        assert_eq!(grid.ring_for_distance_km(87.0, 500.0), RingRadius::All);
    }

    #[test]
    fn test_span_query_is_row_major() {
        let nodes = vec![node(1, 9.0, 3.0), node(2, 1.0, 3.0), node(3, 9.0, 1.0)];
        let grid = SpatialGrid::build(2.0, &nodes);
        let found = grid.query_adjacent(1.0, 1.0, RingRadius::Span { rows: 1, cols: 2 });
        assert_eq!(found, vec![3, 2, 1]);
    }

    #[test]
    fn test_groups_partition_all_nodes() {
        let nodes: Vec<_> = (0..20).map(|i| node(i, i as f64 * 3.0, i as f64)).collect();
        let grid = SpatialGrid::build(2.0, &nodes);
        let total: usize = grid.groups().values().map(Vec::len).sum();
        assert_eq!(total, 20);
        assert_eq!(grid.len(), 20);
    }

    proptest! {
        #[test]
        fn prop_query_has_no_false_negatives(
            lat in -80.0f64..80.0,
            lon in -170.0f64..170.0,
            dlat in -1.0f64..1.0,
            dlon in -1.0f64..1.0,
            ring in 1u32..4,
            cell_size in 0.5f64..3.0,
        ) {
            let reach = ring as f64 * cell_size;
            let q_lat = lat + dlat * reach;
            let q_lon = lon + dlon * reach;
            let distance = ((q_lat - lat).powi(2) + (q_lon - lon).powi(2)).sqrt();
            prop_assume!(distance < reach);

            let grid = SpatialGrid::build(cell_size, &[node(7, q_lon, q_lat)]);
            let found = grid.query_adjacent(lat, lon, RingRadius::Cells(ring));
            prop_assert_eq!(found, vec![7]);
        }

        #[test]
        fn prop_distance_span_has_no_false_negatives(
            lat in -80.0f64..80.0,
            lon in -120.0f64..120.0,
            u in -1.0f64..1.0,
            v in -1.0f64..1.0,
            km in 50.0f64..1000.0,
            cell_size in 0.5f64..3.0,
        ) {
            let reach = km / KM_PER_DEGREE;
            let q_lat = lat + u * reach;
            let q_lon = lon + v * reach / lat.to_radians().cos();
            let distance = crate::projection::great_circle_km([lon, lat], [q_lon, q_lat]);
            prop_assume!(distance <= km);

            // Corner anchors keep the populated extent wide
            let nodes = [
                node(1, -179.0, -89.0),
                node(2, 179.0, 89.0),
                node(7, q_lon, q_lat),
            ];
            let grid = SpatialGrid::build(cell_size, &nodes);
            let ring = grid.ring_for_distance_km(lat, km);
            let found = grid.query_adjacent(lat, lon, ring);
            prop_assert!(found.contains(&7));
        }
    }
}
