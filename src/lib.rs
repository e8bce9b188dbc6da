//! Geographic node-network generation and takeover simulation
//!
//! Builds a world of hackable nodes scattered over real country outlines,
//! then runs a tick-based game where the player spreads an ownership tree
//! outward from a single home node while investigations prune it back.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rust_node_network::*;
//!
//! # fn main() -> Result<()> {
//! let json = std::fs::read_to_string("world_inputs.json").unwrap();
//! let inputs: WorldInputs = serde_json::from_str(&json)?;
//!
//! // Generate the world (deterministic for a given seed and inputs)
//! let config = WorldConfigBuilder::new().seed(42).build()?;
//! let world = Arc::new(World::generate(&config, &inputs)?);
//!
//! // Run the game
//! let mut engine = SimulationEngine::new(world, SimulationConfig::default())
//!     .with_store(MemoryStore::new());
//! let home = engine.world().home_id();
//! engine.apply(Action::Scan, home);
//! for _ in 0..100 {
//!     for event in engine.advance() {
//!         println!("{:?}", event);
//!     }
//! }
//! let payload = engine.save()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `spatial-index` (default): Enables O(log n) planar point-to-node lookups using KD-tree

// Modules
pub mod error;
pub mod config;
pub mod projection;
pub mod node;
pub mod generation;
pub mod grid;
pub mod world;
pub mod network;
pub mod upgrades;
pub mod economy;
pub mod simulation;
pub mod save;

#[cfg(feature = "spatial-index")]
pub mod spatial;

// Re-export core types for convenience
pub use error::{NetworkError, Result};
pub use config::{
    DensityConfig, DensityTable, HomeNode, SimulationConfig, WorldConfig, WorldConfigBuilder,
};
pub use projection::{great_circle_km, GeoProjection, ProjectionCache, ProjectionKind};
pub use node::{BaseNode, NodeId, NodeState, NodeType};
pub use generation::{generate_base_nodes, CityRecord, NodeOverride, PolygonData, WorldInputs};
pub use grid::{RingRadius, SpatialGrid};
pub use world::{World, WorldSnapshot};
pub use network::NetworkGraph;
pub use upgrades::{UpgradeCatalog, UpgradeCost, UpgradeDefinition, UpgradeKey, UpgradeLevels};
pub use economy::EconomyState;
pub use simulation::{Action, SimulationEngine, SimulationEvent};
pub use save::{MemoryStore, SaveData, SaveStore};

#[cfg(feature = "spatial-index")]
pub use spatial::SpatialIndex;

// Re-export glam::DVec2 for convenience
pub use glam::DVec2;
