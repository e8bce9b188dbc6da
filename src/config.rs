//! World and simulation configuration
//!
//! [`WorldConfig`] controls deterministic world generation and is built
//! through a validating builder. [`DensityTable`] tunes how many nodes each
//! city produces. [`SimulationConfig`] collects the tick constants.

use std::collections::BTreeMap;

use ahash::AHashMap;
use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, Result};
use crate::node::NodeId;
use crate::projection::{GeoProjection, ProjectionKind};

/// Seed used when none is given; saves depend on it staying fixed
pub const DEFAULT_SEED: u64 = 0x5EED_2065;

/// Id of the home node unless configured otherwise
pub const DEFAULT_HOME_ID: NodeId = 2065;

/// The pre-designated home node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomeNode {
    /// Node id reserved for home
    pub id: NodeId,
    /// `[longitude, latitude]` in degrees
    pub earth_coords: [f64; 2],
}

impl Default for HomeNode {
    fn default() -> Self {
        Self {
            id: DEFAULT_HOME_ID,
            earth_coords: [-122.42, 37.77],
        }
    }
}

/// Configuration for deterministic world generation
///
/// The same configuration and the same input datasets always produce the
/// identical base node set, with identical ids.
///
/// ```
/// use rust_node_network::WorldConfigBuilder;
///
/// let config = WorldConfigBuilder::new()
///     .seed(7)
///     .grid_cell_size(1.5)
///     .unwrap()
///     .build()
///     .unwrap();
/// assert_eq!(config.seed, 7);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Seed for the sampling generator
    pub seed: u64,

    /// Fixed home node injected into the base set
    pub home: HomeNode,

    /// Projection from earth coordinates to planar map space
    pub projection: GeoProjection,

    /// Spatial grid cell height in degrees of latitude (width is twice this)
    pub grid_cell_size: f64,

    /// Planar distance under which sampled points merge into one node
    pub merge_threshold: f64,

    /// Chance that a non-bank sampled point is typed `rich`
    pub rich_probability: f64,

    /// City density above which a city's first node is a bank
    pub bank_density_threshold: f64,

    /// Consecutive rejected samples before a city gives up
    pub max_sample_failures: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            home: HomeNode::default(),
            projection: GeoProjection::default(),
            grid_cell_size: 2.0,
            merge_threshold: 0.3,
            rich_probability: 0.2,
            bank_density_threshold: 2000.0,
            max_sample_failures: 1000,
        }
    }
}

/// Builder for [`WorldConfig`] with validation
#[derive(Debug, Clone, Default)]
pub struct WorldConfigBuilder {
    config: WorldConfig,
}

impl WorldConfigBuilder {
    /// Start from the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the generation seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Set the home node id and coordinates
    pub fn home(mut self, id: NodeId, earth_coords: [f64; 2]) -> Self {
        self.config.home = HomeNode { id, earth_coords };
        self
    }

    /// Set the projection
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `scale` is not strictly positive
    pub fn projection(mut self, kind: ProjectionKind, scale: f64, translate: DVec2) -> Result<Self> {
        if !(scale > 0.0) {
            return Err(NetworkError::InvalidConfig(format!(
                "projection scale must be positive (got {})",
                scale
            )));
        }
        self.config.projection = GeoProjection::new(kind, scale, translate);
        Ok(self)
    }

    /// Set the spatial grid cell size in degrees
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `size` is not strictly positive
    pub fn grid_cell_size(mut self, size: f64) -> Result<Self> {
        if !(size > 0.0) {
            return Err(NetworkError::InvalidConfig(format!(
                "grid cell size must be positive (got {})",
                size
            )));
        }
        self.config.grid_cell_size = size;
        Ok(self)
    }

    /// Set the cluster merge threshold in planar units
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `threshold` is not strictly positive
    pub fn merge_threshold(mut self, threshold: f64) -> Result<Self> {
        if !(threshold > 0.0) {
            return Err(NetworkError::InvalidConfig(format!(
                "merge threshold must be positive (got {})",
                threshold
            )));
        }
        self.config.merge_threshold = threshold;
        Ok(self)
    }

    /// Set the probability of a sampled node being `rich`
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `p` is outside `[0, 1]`
    pub fn rich_probability(mut self, p: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&p) {
            return Err(NetworkError::InvalidConfig(format!(
                "rich probability must be within [0, 1] (got {})",
                p
            )));
        }
        self.config.rich_probability = p;
        Ok(self)
    }

    /// Set the density above which a city seeds a bank
    pub fn bank_density_threshold(mut self, threshold: f64) -> Self {
        self.config.bank_density_threshold = threshold;
        self
    }

    /// Set how many consecutive rejected samples end a city's sampling
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `failures` is zero
    pub fn max_sample_failures(mut self, failures: usize) -> Result<Self> {
        if failures == 0 {
            return Err(NetworkError::InvalidConfig(
                "max sample failures must be at least 1".into(),
            ));
        }
        self.config.max_sample_failures = failures;
        Ok(self)
    }

    /// Build the configuration
    pub fn build(self) -> Result<WorldConfig> {
        let [lon, lat] = self.config.home.earth_coords;
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            return Err(NetworkError::InvalidConfig(format!(
                "home coordinates out of range ({}, {})",
                lon, lat
            )));
        }
        Ok(self.config)
    }
}

/// Per-country (or continent, or global) node density tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DensityConfig {
    /// Numerator of the sampling radius
    pub density_factor: f64,
    /// Cap on the city density used for the radius
    pub max_density: f64,
    /// Cap on nodes per city
    pub max_nodes: f64,
    /// Population per node
    pub pop_factor: f64,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            density_factor: 4000.0,
            max_density: 4000.0,
            max_nodes: 12.0,
            pop_factor: 500_000.0,
        }
    }
}

impl DensityConfig {
    /// Sampling radius for a city of the given density
    pub fn radius(&self, density: f64) -> f64 {
        // Density of zero would make the radius unbounded
        self.density_factor / self.max_density.min(density).max(1.0)
    }

    /// Number of nodes to sample for a city of the given population
    pub fn count(&self, population: f64) -> usize {
        let count = self.max_nodes.min((population / self.pop_factor).max(1.0));
        count.floor().max(0.0) as usize
    }
}

/// Density lookup with country → continent → global fallback
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DensityTable {
    /// Country-specific overrides
    #[serde(default)]
    pub countries: AHashMap<String, DensityConfig>,
    /// Continent-level defaults
    #[serde(default)]
    pub continents: AHashMap<String, DensityConfig>,
    /// Continent → member countries
    ///
    /// A country listed under several continents resolves to the first
    /// continent in name order.
    #[serde(default)]
    pub continent_members: BTreeMap<String, Vec<String>>,
    /// Used when neither the country nor its continent is configured
    #[serde(default)]
    pub global: DensityConfig,
}

impl DensityTable {
    /// Resolve the density configuration for a country
    pub fn lookup(&self, country: &str) -> &DensityConfig {
        if let Some(config) = self.countries.get(country) {
            return config;
        }
        self.continent_of(country)
            .and_then(|continent| self.continents.get(continent))
            .unwrap_or(&self.global)
    }

    fn continent_of(&self, country: &str) -> Option<&str> {
        self.continent_members
            .iter()
            .find(|(_, members)| members.iter().any(|m| m == country))
            .map(|(continent, _)| continent.as_str())
    }
}

/// Tick constants for the simulation engine
///
/// Durations are in ticks; the tick period itself is owned by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Money at the start of a fresh game
    pub starting_money: f64,

    /// Suspicion at which an investigation fires
    pub suspicion_threshold: f64,

    /// Suspicion gained per tick before the decay upgrade applies
    pub base_suspicion_per_tick: f64,

    /// Ticks a scan takes at hack speed 1.0
    pub base_scan_duration: f64,

    /// Ticks a hack takes before the node-type difficulty is added
    pub base_hack_duration: f64,

    /// Ticks between automatic saves
    pub save_interval: u32,

    /// Discovery range in kilometres at upgrade level 0
    pub base_discovery_range_km: f64,

    /// Nodes a scan reveals at upgrade level 0
    pub base_scan_efficiency: usize,

    /// Points earned per owned node per tick
    pub points_per_node: f64,

    /// Point cap with only the home node owned
    pub base_max_points: f64,

    /// Extra point cap per owned node
    pub max_points_per_node: f64,

    /// Points spent to start a scan
    pub scan_point_cost: f64,

    /// Relative weights for investigating at depth 0, 1, 2, ...
    pub investigation_depth_weights: Vec<u32>,

    /// Investigations pick among this many furthest edge nodes
    pub investigation_frontier: usize,

    /// Ticks between autohack runs
    pub autohack_interval: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            starting_money: 100.0,
            suspicion_threshold: 10_000.0,
            base_suspicion_per_tick: 10.0,
            base_scan_duration: 20.0,
            base_hack_duration: 10.0,
            save_interval: 300,
            base_discovery_range_km: 500.0,
            base_scan_efficiency: 2,
            points_per_node: 0.1,
            base_max_points: 10.0,
            max_points_per_node: 2.0,
            scan_point_cost: 1.0,
            investigation_depth_weights: vec![60, 25, 10, 5],
            investigation_frontier: 3,
            autohack_interval: 50.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = WorldConfigBuilder::new().build().unwrap();
        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(config.home.id, DEFAULT_HOME_ID);
        assert_eq!(config.rich_probability, 0.2);
        assert_eq!(config.max_sample_failures, 1000);
    }

    #[test]
    fn test_builder_rejects_bad_values() {
        assert!(WorldConfigBuilder::new().grid_cell_size(0.0).is_err());
        assert!(WorldConfigBuilder::new().merge_threshold(-1.0).is_err());
        assert!(WorldConfigBuilder::new().rich_probability(1.5).is_err());
        assert!(WorldConfigBuilder::new().max_sample_failures(0).is_err());
        assert!(WorldConfigBuilder::new()
            .projection(ProjectionKind::Mercator, 0.0, DVec2::ZERO)
            .is_err());
        assert!(WorldConfigBuilder::new().home(1, [200.0, 0.0]).build().is_err());
    }

    #[test]
    fn test_density_radius_and_count() {
        let density = DensityConfig {
            density_factor: 100.0,
            max_density: 50.0,
            max_nodes: 5.0,
            pop_factor: 1000.0,
        };
        // Capped by max_density
        assert_eq!(density.radius(200.0), 2.0);
        assert_eq!(density.radius(25.0), 4.0);
        // Never below one node, never above max_nodes
        assert_eq!(density.count(10.0), 1);
        assert_eq!(density.count(3500.0), 3);
        assert_eq!(density.count(1e9), 5);
    }

    #[test]
    fn test_density_lookup_fallback() {
        let mut table = DensityTable::default();
        let japan = DensityConfig {
            density_factor: 1.0,
            ..Default::default()
        };
        let asia = DensityConfig {
            density_factor: 2.0,
            ..Default::default()
        };
        table.countries.insert("Japan".into(), japan);
        table.continents.insert("Asia".into(), asia);
        table
            .continent_members
            .insert("Asia".into(), vec!["Japan".into(), "Nepal".into()]);

        assert_eq!(table.lookup("Japan").density_factor, 1.0);
        assert_eq!(table.lookup("Nepal").density_factor, 2.0);
        assert_eq!(table.lookup("Chile"), &DensityConfig::default());
    }

    #[test]
    fn test_density_lookup_two_continents_is_stable() {
        let build = || {
            let mut table = DensityTable::default();
            for (continent, factor) in [("Europe", 1.0), ("Asia", 2.0)] {
                table.continents.insert(
                    continent.into(),
                    DensityConfig {
                        density_factor: factor,
                        ..Default::default()
                    },
                );
                table
                    .continent_members
                    .insert(continent.into(), vec!["Turkey".into()]);
            }
            table
        };

        // Asia sorts before Europe
        for _ in 0..64 {
            assert_eq!(build().lookup("Turkey").density_factor, 2.0);
        }
    }

    #[test]
    fn test_config_serialization() {
        let config = WorldConfigBuilder::new().seed(12345).build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let restored: WorldConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }
}
