//! Node structures
//!
//! [`BaseNode`] is the immutable generated half of a node; [`NodeState`] is
//! the mutable per-node ownership state layered on top of it.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::projection::great_circle_km;

/// Stable node identifier (generation order for sampled nodes)
pub type NodeId = u32;

/// Kind of machine a node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// The player's starting machine; exactly one per world
    Home,
    /// Ordinary node
    #[default]
    Basic,
    /// Higher income, harder to hack
    Rich,
    /// Highest income, hardest to hack
    Bank,
}

impl NodeType {
    /// Range of per-tick income a scanned node of this type is assigned
    pub fn income_range(self) -> RangeInclusive<f64> {
        match self {
            NodeType::Home => 1.0..=1.0,
            NodeType::Basic => 0.5..=2.0,
            NodeType::Rich => 3.0..=8.0,
            NodeType::Bank => 15.0..=30.0,
        }
    }

    /// Range of extra hack ticks on top of the base hack duration
    pub fn hack_difficulty_range(self) -> RangeInclusive<f64> {
        match self {
            NodeType::Home => 0.0..=0.0,
            NodeType::Basic => 5.0..=15.0,
            NodeType::Rich => 20.0..=40.0,
            NodeType::Bank => 60.0..=120.0,
        }
    }

    /// Money needed to start a hack, before per-node scaling
    pub fn base_hack_cost(self) -> f64 {
        match self {
            NodeType::Home => 0.0,
            NodeType::Basic => 10.0,
            NodeType::Rich => 50.0,
            NodeType::Bank => 250.0,
        }
    }

    /// Ordering used when a cluster of mixed types collapses to one node
    pub(crate) fn rank(self) -> u8 {
        match self {
            NodeType::Basic => 0,
            NodeType::Rich => 1,
            NodeType::Bank => 2,
            NodeType::Home => 3,
        }
    }
}

/// A generated node on the world map
///
/// Base nodes are never mutated after generation. Saves reference them by
/// `id`, so the generation order must be reproducible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseNode {
    /// Unique identifier, stable for the lifetime of the world
    pub id: NodeId,

    /// Planar position in projected map space
    pub position: DVec2,

    /// Geographic position as `[longitude, latitude]` in degrees
    pub earth_coords: [f64; 2],

    /// Country the node was sampled in
    pub country: String,

    /// Node kind
    #[serde(rename = "type")]
    pub node_type: NodeType,

    /// Hack-cost multiplier (≥ 0)
    pub scaling: f64,

    /// Display radius derived from the size of the merged cluster
    pub radius: f64,
}

impl BaseNode {
    /// Create a new base node with scaling 1.0
    pub fn new(
        id: NodeId,
        position: DVec2,
        earth_coords: [f64; 2],
        country: impl Into<String>,
        node_type: NodeType,
    ) -> Self {
        Self {
            id,
            position,
            earth_coords,
            country: country.into(),
            node_type,
            scaling: 1.0,
            radius: 0.1,
        }
    }

    /// Latitude in degrees
    #[inline]
    pub fn lat(&self) -> f64 {
        self.earth_coords[1]
    }

    /// Longitude in degrees
    #[inline]
    pub fn lon(&self) -> f64 {
        self.earth_coords[0]
    }

    /// Great-circle distance to another node in kilometres
    #[inline]
    pub fn distance_km(&self, other: &BaseNode) -> f64 {
        great_circle_km(self.earth_coords, other.earth_coords)
    }

    /// Money needed to hack this node
    pub fn hack_cost(&self) -> f64 {
        self.node_type.base_hack_cost() * self.scaling.max(0.0)
    }
}

/// Mutable public state of a node that has become relevant to the player
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    /// Under player control
    pub is_owned: bool,
    /// Discovered by a scan
    pub is_scanned: bool,
    /// Ticks remaining on an active scan (0 = idle)
    pub scan_duration: f64,
    /// Ticks remaining on an active hack (0 = idle)
    pub hack_duration: f64,
    /// Money contributed per tick while owned
    pub income: f64,
    /// Upstream node this node forwards money to
    pub target: Option<NodeId>,
    /// Downstream nodes whose `target` is this node
    pub sources: BTreeSet<NodeId>,
}

impl NodeState {
    /// A hack is in progress
    #[inline]
    pub fn is_hacking(&self) -> bool {
        self.hack_duration > 0.0
    }

    /// A scan is in progress
    #[inline]
    pub fn is_scanning(&self) -> bool {
        self.scan_duration > 0.0
    }
}
