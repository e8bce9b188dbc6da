//! The immutable generated world

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::config::WorldConfig;
use crate::error::{NetworkError, Result};
use crate::generation::{generate_base_nodes, WorldInputs};
use crate::grid::{RingRadius, SpatialGrid};
use crate::node::{BaseNode, NodeId, NodeType};

#[cfg(feature = "spatial-index")]
use crate::spatial::SpatialIndex;
#[cfg(feature = "spatial-index")]
use glam::DVec2;

/// A generated node set plus the indices built over it
///
/// Nodes live in a dense arena; `index_of` maps a stable [`NodeId`] to its
/// arena slot. Nothing here changes after construction, so a world can be
/// shared between the simulation and any number of readers.
///
/// ```
/// use rust_node_network::{BaseNode, NodeType, World};
/// use glam::DVec2;
///
/// let nodes = vec![
///     BaseNode::new(5, DVec2::ZERO, [0.0, 0.0], "Home", NodeType::Home),
///     BaseNode::new(6, DVec2::ONE, [1.0, 1.0], "Home", NodeType::Basic),
/// ];
/// let world = World::from_nodes(nodes, 5, 2.0).unwrap();
/// assert_eq!(world.home().id, 5);
/// assert_eq!(world.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct World {
    nodes: Vec<BaseNode>,
    index: AHashMap<NodeId, usize>,
    home_index: usize,
    grid: SpatialGrid,

    #[cfg(feature = "spatial-index")]
    spatial_index: SpatialIndex,
}

/// Serialisable cache of a generated world
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    /// Snapshot layout version
    pub version: u32,
    /// Home node id
    pub home_id: NodeId,
    /// Grid cell size in degrees
    pub cell_size: f64,
    /// All base nodes in arena order
    pub nodes: Vec<BaseNode>,
}

const SNAPSHOT_VERSION: u32 = 1;

impl World {
    /// Generate a world from the input datasets
    pub fn generate(config: &WorldConfig, inputs: &WorldInputs) -> Result<Self> {
        let nodes = generate_base_nodes(inputs, config);
        Self::from_nodes(nodes, config.home.id, config.grid_cell_size)
    }

    /// Build a world around an explicit node list
    ///
    /// # Errors
    ///
    /// - `DuplicateNode` if two nodes share an id
    /// - `UnknownNode` if `home_id` is not in `nodes`
    /// - `InvalidConfig` if `cell_size` is not positive
    pub fn from_nodes(mut nodes: Vec<BaseNode>, home_id: NodeId, cell_size: f64) -> Result<Self> {
        if !(cell_size > 0.0) {
            return Err(NetworkError::InvalidConfig(format!(
                "grid cell size must be positive (got {})",
                cell_size
            )));
        }

        let mut index = AHashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id, i).is_some() {
                return Err(NetworkError::DuplicateNode(node.id));
            }
        }

        let home_index = *index.get(&home_id).ok_or(NetworkError::UnknownNode(home_id))?;
        // The home node is always typed home regardless of where it came from
        nodes[home_index].node_type = NodeType::Home;

        let grid = SpatialGrid::build(cell_size, &nodes);

        #[cfg(feature = "spatial-index")]
        let spatial_index = {
            let positions: Vec<DVec2> = nodes.iter().map(|n| n.position).collect();
            SpatialIndex::new(&positions)
        };

        Ok(Self {
            nodes,
            index,
            home_index,
            grid,
            #[cfg(feature = "spatial-index")]
            spatial_index,
        })
    }

    /// Number of base nodes
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the world has no nodes (never true for a constructed world)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in arena order
    #[inline]
    pub fn nodes(&self) -> &[BaseNode] {
        &self.nodes
    }

    /// Look up a node by id
    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&BaseNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// Arena slot of a node id
    #[inline]
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Node stored in an arena slot
    #[inline]
    pub fn node_at_index(&self, index: usize) -> Option<&BaseNode> {
        self.nodes.get(index)
    }

    /// Whether `id` belongs to this world
    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// The home node
    #[inline]
    pub fn home(&self) -> &BaseNode {
        &self.nodes[self.home_index]
    }

    /// Id of the home node
    #[inline]
    pub fn home_id(&self) -> NodeId {
        self.nodes[self.home_index].id
    }

    /// The lat/lng bucket grid
    #[inline]
    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// Ids near a node within `range_km`, in grid order
    ///
    /// The grid narrows the candidates; the great-circle filter is exact.
    pub fn nodes_within_km(&self, id: NodeId, range_km: f64) -> Vec<(NodeId, f64)> {
        let Some(origin) = self.node(id) else {
            return Vec::new();
        };
        let ring = self.grid.ring_for_distance_km(origin.lat(), range_km);
        self.grid
            .query_adjacent(origin.lat(), origin.lon(), ring)
            .into_iter()
            .filter(|&other| other != id)
            .filter_map(|other| {
                let d = origin.distance_km(self.node(other)?);
                (d <= range_km).then_some((other, d))
            })
            .collect()
    }

    /// Every id, bypassing the grid
    pub fn all_ids(&self) -> Vec<NodeId> {
        self.grid.query_adjacent(0.0, 0.0, RingRadius::All)
    }

    /// Find the node nearest to a planar position (requires `spatial-index`)
    #[cfg(feature = "spatial-index")]
    pub fn node_at(&self, position: DVec2) -> Option<&BaseNode> {
        let (i, _) = self.spatial_index.find_nearest(position)?;
        self.nodes.get(i)
    }

    /// Snapshot the node set for caching
    pub fn to_snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            version: SNAPSHOT_VERSION,
            home_id: self.home_id(),
            cell_size: self.grid.cell_size(),
            nodes: self.nodes.clone(),
        }
    }

    /// Rebuild a world from a cached snapshot
    pub fn from_snapshot(snapshot: WorldSnapshot) -> Result<Self> {
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(NetworkError::UnsupportedSaveVersion(snapshot.version));
        }
        Self::from_nodes(snapshot.nodes, snapshot.home_id, snapshot.cell_size)
    }

    /// Serialise the snapshot as JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_snapshot())?)
    }

    /// Rebuild a world from [`World::to_json`] output
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_snapshot(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::WorldConfigBuilder;
    use crate::generation::tests::sample_inputs;
    use glam::DVec2;

    /// A tiny hand-placed world: home at the origin and a ring of neighbours
    pub(crate) fn line_world(home_id: NodeId) -> World {
        let mut nodes = vec![BaseNode::new(home_id, DVec2::ZERO, [0.0, 0.0], "Test", NodeType::Home)];
        for (i, lon) in [1.0, 2.0, 3.0, 4.0, 10.0, 30.0].into_iter().enumerate() {
            let position = DVec2::new(lon * 10.0, 0.0);
            nodes.push(BaseNode::new(i as NodeId + 1, position, [lon, 0.0], "Test", NodeType::Basic));
        }
        World::from_nodes(nodes, home_id, 2.0).unwrap()
    }

    #[test]
    fn test_world_generation() {
        let config = WorldConfigBuilder::new()
            .seed(42)
            .home(0, [-10.0, 40.0])
            .build()
            .unwrap();
        let world = World::generate(&config, &sample_inputs()).unwrap();

        assert!(world.len() > 1);
        assert_eq!(world.home_id(), 0);
        assert_eq!(world.grid().len(), world.len());
    }

    #[test]
    fn test_missing_home_is_rejected() {
        let nodes = vec![BaseNode::new(1, DVec2::ZERO, [0.0, 0.0], "A", NodeType::Basic)];
        assert!(matches!(
            World::from_nodes(nodes, 9, 2.0),
            Err(NetworkError::UnknownNode(9))
        ));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let nodes = vec![
            BaseNode::new(1, DVec2::ZERO, [0.0, 0.0], "A", NodeType::Home),
            BaseNode::new(1, DVec2::ONE, [1.0, 1.0], "A", NodeType::Basic),
        ];
        assert!(matches!(
            World::from_nodes(nodes, 1, 2.0),
            Err(NetworkError::DuplicateNode(1))
        ));
    }

    #[test]
    fn test_home_type_is_forced() {
        let nodes = vec![BaseNode::new(3, DVec2::ZERO, [0.0, 0.0], "A", NodeType::Bank)];
        let world = World::from_nodes(nodes, 3, 2.0).unwrap();
        assert_eq!(world.home().node_type, NodeType::Home);
    }

    #[test]
    fn test_nodes_within_km() {
        let world = line_world(100);
        let near: Vec<NodeId> = world.nodes_within_km(100, 250.0).into_iter().map(|(id, _)| id).collect();
        // 1° and 2° of longitude at the equator are ~111 and ~222 km
        assert_eq!(near, vec![1, 2]);
        assert!(world.nodes_within_km(999, 250.0).is_empty());
    }

    #[test]
    fn test_nodes_within_km_at_high_latitude() {
        let nodes = vec![
            BaseNode::new(0, DVec2::ZERO, [3.9, 70.0], "Norway", NodeType::Home),
            BaseNode::new(1, DVec2::ZERO, [16.5, 70.0], "Norway", NodeType::Basic),
            BaseNode::new(2, DVec2::ZERO, [3.9, -40.0], "Far", NodeType::Basic),
        ];
        let world = World::from_nodes(nodes, 0, 2.0).unwrap();

        // 12.6° of longitude at 70N is ~478 km, four grid columns away
        let near = world.nodes_within_km(0, 500.0);
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].0, 1);
        assert!((near[0].1 - 478.0).abs() < 5.0);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let world = line_world(100);
        let json = world.to_json().unwrap();
        let restored = World::from_json(&json).unwrap();
        assert_eq!(restored.nodes(), world.nodes());
        assert_eq!(restored.home_id(), 100);
    }

    #[test]
    fn test_snapshot_rejects_garbage() {
        assert!(matches!(
            World::from_json("{\"nodes\": 3}"),
            Err(NetworkError::MalformedSave(_))
        ));
    }

    #[cfg(feature = "spatial-index")]
    #[test]
    fn test_node_at() {
        let world = line_world(100);
        assert_eq!(world.node_at(DVec2::new(29.0, 1.0)).map(|n| n.id), Some(3));
        assert_eq!(world.node_at(DVec2::new(-5.0, 0.0)).map(|n| n.id), Some(100));
    }
}
