//! Tick-based simulation engine
//!
//! [`SimulationEngine`] owns the ownership graph and the economy and is their
//! only writer. Hosts drive it with [`SimulationEngine::advance`] on a fixed
//! period and feed player input through [`SimulationEngine::apply`] or the
//! named action methods. Calls must be serialised by the caller; a tick is
//! applied completely before `advance` returns.
//!
//! Gameplay randomness (incomes, hack difficulty, investigations, autohack
//! choices) comes from an entropy-seeded [`StdRng`]. World layout uses its
//! own seeded generator and is unaffected by anything here.
//!
//! ```
//! use std::sync::Arc;
//! use glam::DVec2;
//! use rust_node_network::{BaseNode, NodeType, SimulationConfig, SimulationEngine, World};
//!
//! let nodes = vec![
//!     BaseNode::new(2065, DVec2::ZERO, [0.0, 0.0], "Home", NodeType::Home),
//!     BaseNode::new(1, DVec2::ONE, [1.0, 0.0], "Home", NodeType::Basic),
//! ];
//! let world = Arc::new(World::from_nodes(nodes, 2065, 2.0).unwrap());
//! let mut engine = SimulationEngine::with_rng_seed(world, SimulationConfig::default(), 1);
//!
//! assert!(engine.start_scan(2065));
//! for _ in 0..20 {
//!     engine.advance();
//! }
//! assert_eq!(engine.graph().state(1).and_then(|s| s.target), Some(2065));
//! ```

use std::sync::Arc;

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::economy::EconomyState;
use crate::error::{NetworkError, Result};
use crate::network::NetworkGraph;
use crate::node::{BaseNode, NodeId, NodeState};
use crate::save::{self, SaveData, SaveStore};
use crate::upgrades::{UpgradeCatalog, UpgradeKey};
use crate::world::World;

/// A player action on a single node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    /// Start a scan from an owned node
    Scan,
    /// Start hacking a scanned node
    Hack,
    /// Drop an owned node and everything downstream of it
    Disconnect,
    /// Make the node the current selection
    Select,
}

/// Something that happened during a tick
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationEvent {
    /// A scan finished and revealed nodes
    ScanCompleted {
        scanner: NodeId,
        discovered: Vec<NodeId>,
    },
    /// A hack finished; the node is now owned
    HackCompleted { node: NodeId },
    /// The player disconnected a node since the last tick
    Disconnected { node: NodeId, lost: Vec<NodeId> },
    /// Suspicion crossed the threshold
    Investigation {
        /// Edge node the investigation started from, `None` if nothing was exposed
        origin: Option<NodeId>,
        /// Depth rolled from the weighted distribution
        depth: usize,
        /// Node actually cut
        target: Option<NodeId>,
        /// Nodes that lost ownership
        disconnected: Vec<NodeId>,
    },
    /// Automatic save succeeded
    Saved { tick: u64, bytes: usize },
    /// Automatic save failed; the tick still completed
    SaveFailed { tick: u64, reason: String },
    /// The autohack timer elapsed
    AutoHack {
        scanned: Option<NodeId>,
        hacking: Vec<NodeId>,
    },
}

/// Whether an owned node can start a scan with the current points
pub fn can_scan(state: &NodeState, economy: &EconomyState, config: &SimulationConfig) -> bool {
    state.is_owned && !state.is_scanning() && economy.points >= config.scan_point_cost
}

/// Whether a scanned node can be hacked from its upstream node
///
/// `target_owned` is the ownership of `state.target`.
pub fn is_hackable(state: &NodeState, target_owned: bool) -> bool {
    state.is_scanned && !state.is_owned && !state.is_hacking() && target_owned
}

/// Whether a node can be disconnected by the player
pub fn can_disconnect(state: &NodeState, is_home: bool) -> bool {
    state.is_owned && !is_home
}

/// The simulation context: ownership graph, economy and gameplay RNG
pub struct SimulationEngine {
    config: SimulationConfig,
    catalog: UpgradeCatalog,
    graph: NetworkGraph,
    economy: EconomyState,
    selected: Option<NodeId>,
    tick: u64,
    rng: StdRng,
    store: Option<Box<dyn SaveStore>>,
    pending: Vec<SimulationEvent>,
}

impl SimulationEngine {
    /// Fresh game over `world` with an entropy-seeded gameplay RNG
    pub fn new(world: Arc<World>, config: SimulationConfig) -> Self {
        Self::with_rng(world, config, StdRng::from_entropy())
    }

    /// Fresh game with a fixed gameplay seed, for tests and replays
    pub fn with_rng_seed(world: Arc<World>, config: SimulationConfig, seed: u64) -> Self {
        Self::with_rng(world, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(world: Arc<World>, config: SimulationConfig, rng: StdRng) -> Self {
        let economy = EconomyState::new(&config);
        Self {
            config,
            catalog: UpgradeCatalog::standard(),
            graph: NetworkGraph::new(world),
            economy,
            selected: None,
            tick: 0,
            rng,
            store: None,
            pending: Vec::new(),
        }
    }

    /// Replace the upgrade catalog
    pub fn with_catalog(mut self, catalog: UpgradeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Persist automatic saves to `store`
    pub fn with_store(mut self, store: impl SaveStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Resume a game from a save payload
    pub fn load(world: Arc<World>, config: SimulationConfig, payload: &str) -> Result<Self> {
        let mut engine = Self::new(world, config);
        engine.restore(payload)?;
        Ok(engine)
    }

    /// Replace the current game with a save payload
    ///
    /// On error the engine is left untouched.
    pub fn restore(&mut self, payload: &str) -> Result<()> {
        let data = save::decode(payload)?;
        let world = Arc::clone(self.graph.world());
        if let Some(id) = data.selected_node_id {
            if !world.contains(id) {
                return Err(NetworkError::UnknownNode(id));
            }
        }
        let graph = data.rebuild_graph(world, &mut self.rng)?;

        let mut economy = EconomyState::new(&self.config);
        economy.money = data.money.max(0.0);
        economy.suspicion = data.suspicion.max(0.0);
        economy.auto_hack_timer = data.auto_hack_timer;
        economy.upgrades = data.upgrade_levels();

        info!(
            rendered = graph.rendered_ids().len(),
            owned = graph.owned_count(),
            "restored save"
        );
        self.graph = graph;
        self.economy = economy;
        self.selected = data.selected_node_id;
        self.pending.clear();
        Ok(())
    }

    /// Serialise the current game
    pub fn save(&self) -> Result<String> {
        save::encode(&SaveData::capture(&self.graph, &self.economy, self.selected))
    }

    // ---- queries ----

    /// The underlying world
    #[inline]
    pub fn world(&self) -> &Arc<World> {
        self.graph.world()
    }

    /// The ownership graph
    #[inline]
    pub fn graph(&self) -> &NetworkGraph {
        &self.graph
    }

    /// Active configuration
    #[inline]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Active upgrade catalog
    #[inline]
    pub fn catalog(&self) -> &UpgradeCatalog {
        &self.catalog
    }

    /// Current economy
    #[inline]
    pub fn economy(&self) -> &EconomyState {
        &self.economy
    }

    /// Currently selected node
    #[inline]
    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    /// Ticks advanced so far
    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Base node and state of `id`
    pub fn get_node(&self, id: NodeId) -> Option<(&BaseNode, Option<&NodeState>)> {
        self.graph.node(id)
    }

    /// Every node the player has discovered, home included
    pub fn rendered_node_ids(&self) -> Vec<NodeId> {
        self.graph.rendered_ids()
    }

    /// Whether a scan can be started from `id`
    pub fn can_scan(&self, id: NodeId) -> bool {
        self.graph
            .state(id)
            .is_some_and(|s| can_scan(s, &self.economy, &self.config))
    }

    /// Whether `id` can be hacked, ignoring its price
    pub fn is_hackable(&self, id: NodeId) -> bool {
        if id == self.graph.home_id() {
            return false;
        }
        self.graph.state(id).is_some_and(|s| {
            let target_owned = s.target.is_some_and(|t| self.graph.is_owned(t));
            is_hackable(s, target_owned)
        })
    }

    /// Whether `id` can be disconnected
    pub fn can_disconnect(&self, id: NodeId) -> bool {
        let is_home = id == self.graph.home_id();
        self.graph.state(id).is_some_and(|s| can_disconnect(s, is_home))
    }

    /// Money needed to hack `id`
    pub fn hack_cost(&self, id: NodeId) -> Option<f64> {
        self.graph.world().node(id).map(BaseNode::hack_cost)
    }

    /// Effect of an upgrade at its current level, or at the next one
    pub fn upgrade_effect(&self, key: UpgradeKey, preview_next: bool) -> f64 {
        self.economy.effect(key, preview_next, &self.config)
    }

    /// Price of the next level of an upgrade, `None` when maxed out
    pub fn upgrade_cost(&self, key: UpgradeKey) -> Option<f64> {
        self.catalog.cost(key, self.economy.upgrades.level(key))
    }

    /// Whether the next level of an upgrade can be bought right now
    pub fn can_buy_upgrade(&self, key: UpgradeKey) -> bool {
        let Some(definition) = self.catalog.get(key) else {
            return false;
        };
        self.upgrade_cost(key)
            .is_some_and(|cost| self.economy.money >= cost)
            && self.graph.owned_count() >= definition.required_node_count
    }

    // ---- player actions ----

    /// Apply a player action; returns whether anything changed
    pub fn apply(&mut self, action: Action, id: NodeId) -> bool {
        let applied = match action {
            Action::Scan => self.start_scan(id),
            Action::Hack => self.start_hack(id),
            Action::Disconnect => self.disconnect(id),
            Action::Select => self.select(id),
        };
        if !applied {
            debug!(?action, node = id, "action rejected");
        }
        applied
    }

    /// Start a scan from an owned node, spending points
    pub fn start_scan(&mut self, id: NodeId) -> bool {
        if !self.can_scan(id) {
            return false;
        }
        self.economy.points -= self.config.scan_point_cost;
        let duration = self.config.base_scan_duration.max(f64::MIN_POSITIVE);
        self.graph.update(id, |s| s.scan_duration = duration);
        debug!(node = id, duration, "scan started");
        true
    }

    /// Start hacking a scanned node, spending money
    pub fn start_hack(&mut self, id: NodeId) -> bool {
        if !self.is_hackable(id) {
            return false;
        }
        let Some(node) = self.graph.world().node(id) else {
            return false;
        };
        let cost = node.hack_cost();
        let difficulty = node.node_type.hack_difficulty_range();
        if self.economy.money < cost {
            return false;
        }

        self.economy.money -= cost;
        let duration = (self.config.base_hack_duration + self.rng.gen_range(difficulty))
            .max(f64::MIN_POSITIVE);
        self.graph.update(id, |s| s.hack_duration = duration);
        debug!(node = id, cost, duration, "hack started");
        true
    }

    /// Disconnect an owned node and everything downstream of it
    pub fn disconnect(&mut self, id: NodeId) -> bool {
        if !self.can_disconnect(id) {
            return false;
        }
        let lost = self.graph.disconnect_cascade(id);
        info!(node = id, lost = lost.len(), "disconnected");
        self.pending.push(SimulationEvent::Disconnected { node: id, lost });
        true
    }

    /// Select a node
    pub fn select(&mut self, id: NodeId) -> bool {
        if !self.graph.world().contains(id) {
            return false;
        }
        self.selected = Some(id);
        true
    }

    /// Buy the next level of an upgrade
    pub fn buy_upgrade(&mut self, key: UpgradeKey) -> bool {
        if !self.can_buy_upgrade(key) {
            debug!(?key, money = self.economy.money, "upgrade rejected");
            return false;
        }
        let Some(cost) = self.upgrade_cost(key) else {
            return false;
        };
        let level = self.economy.upgrades.level(key) + 1;
        self.economy.money -= cost;
        self.economy.upgrades.set(key, level);
        info!(?key, level, cost, "upgrade bought");
        true
    }

    // ---- tick ----

    /// Run one tick and report what happened
    pub fn advance(&mut self) -> Vec<SimulationEvent> {
        self.tick += 1;
        let mut events = std::mem::take(&mut self.pending);

        self.economy.save_counter = self.economy.save_counter.saturating_sub(1);
        if self.economy.save_counter == 0 {
            self.economy.save_counter = self.config.save_interval.max(1);
            events.extend(self.persist());
        }

        let speed = self.upgrade_effect(UpgradeKey::HackSpeed, false);
        let (scans, hacks) = self.graph.tick_timers(speed);

        for scanner in scans {
            let discovered = self.discover(scanner);
            info!(scanner, found = discovered.len(), "scan completed");
            events.push(SimulationEvent::ScanCompleted { scanner, discovered });
        }
        for &node in &hacks {
            self.graph.complete_hack(node);
            info!(node, "hack completed");
            events.push(SimulationEvent::HackCompleted { node });
        }

        let income: f64 = self
            .graph
            .iter_states()
            .filter(|(_, s)| s.is_owned)
            .map(|(_, s)| s.income)
            .sum();
        let owned = self.graph.owned_count();
        self.economy.collect(income, owned, &self.config);

        if self.economy.accrue_suspicion(&self.config) {
            events.push(self.investigate(&hacks));
        }
        events.extend(self.run_autohack());

        events
    }

    /// Reveal the nearest discoverable nodes around a finished scan
    fn discover(&mut self, scanner: NodeId) -> Vec<NodeId> {
        if !self.graph.is_owned(scanner) {
            return Vec::new();
        }
        let range = self.upgrade_effect(UpgradeKey::DiscoveryRange, false);
        let count = self.upgrade_effect(UpgradeKey::ScanEfficiency, false) as usize;
        let home = self.graph.home_id();

        let mut candidates: Vec<(NodeId, f64)> = self
            .graph
            .world()
            .nodes_within_km(scanner, range)
            .into_iter()
            .filter(|&(id, _)| id != home && self.is_discoverable(id))
            .collect();
        // Stable: equal distances keep grid order
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
        candidates.truncate(count);

        let mut discovered = Vec::with_capacity(candidates.len());
        for (id, _) in candidates {
            let Some(node_type) = self.graph.world().node(id).map(|n| n.node_type) else {
                continue;
            };
            let income = self.rng.gen_range(node_type.income_range());
            if self.graph.mark_scanned(id, scanner, income) {
                discovered.push(id);
            }
        }
        discovered
    }

    /// Undiscovered, or scanned but orphaned by an earlier disconnect
    fn is_discoverable(&self, id: NodeId) -> bool {
        match self.graph.state(id) {
            None => true,
            Some(s) => !s.is_owned && s.target.is_none(),
        }
    }

    /// Cut the network somewhere behind one of the furthest edge nodes
    ///
    /// Nodes whose hack completed this tick are never picked as the origin.
    /// The cascade from a cut ancestor can still disconnect one, since every
    /// owned node must stay linked to home through owned sources.
    fn investigate(&mut self, just_hacked: &[NodeId]) -> SimulationEvent {
        let home = self.graph.home_id();
        let edges: Vec<NodeId> = self
            .graph
            .edge_nodes()
            .into_iter()
            .filter(|id| *id != home && !just_hacked.contains(id))
            .collect();
        let width = edges.len().min(self.config.investigation_frontier.max(1));
        let depth = self.roll_depth();

        let Some(&origin) = edges[..width].choose(&mut self.rng) else {
            info!("investigation found nothing exposed");
            return SimulationEvent::Investigation {
                origin: None,
                depth,
                target: None,
                disconnected: Vec::new(),
            };
        };

        let mut chain = vec![origin];
        chain.extend(
            self.graph
                .targets(origin)
                .into_iter()
                .map(|(id, _)| id)
                .filter(|&id| id != home),
        );
        let target = chain[depth.min(chain.len() - 1)];
        let disconnected = self.graph.disconnect_cascade(target);
        warn!(origin, depth, target, lost = disconnected.len(), "investigation cut the network");

        SimulationEvent::Investigation {
            origin: Some(origin),
            depth,
            target: Some(target),
            disconnected,
        }
    }

    fn roll_depth(&mut self) -> usize {
        match WeightedIndex::new(&self.config.investigation_depth_weights) {
            Ok(weights) => weights.sample(&mut self.rng),
            Err(_) => 0,
        }
    }

    /// Scan from a random edge node and hack a random sibling group
    fn run_autohack(&mut self) -> Option<SimulationEvent> {
        let efficiency = self.upgrade_effect(UpgradeKey::AutoHack, false) as usize;
        if efficiency == 0 {
            return None;
        }
        self.economy.auto_hack_timer -= 1.0;
        if self.economy.auto_hack_timer > 0.0 {
            return None;
        }
        self.economy.auto_hack_timer = self.config.autohack_interval;

        let scannable: Vec<NodeId> = self
            .graph
            .edge_nodes()
            .into_iter()
            .filter(|&id| self.can_scan(id))
            .collect();
        let mut scanned = None;
        if let Some(&id) = scannable.choose(&mut self.rng) {
            if self.start_scan(id) {
                scanned = Some(id);
            }
        }

        let hackable: Vec<NodeId> = self
            .graph
            .rendered_ids()
            .into_iter()
            .filter(|&id| self.is_hackable(id))
            .collect();
        let mut hacking = Vec::new();
        if let Some(&first) = hackable.choose(&mut self.rng) {
            let parent = self.graph.state(first).and_then(|s| s.target);
            let mut batch = vec![first];
            batch.extend(
                hackable
                    .iter()
                    .copied()
                    .filter(|&id| id != first && self.graph.state(id).and_then(|s| s.target) == parent),
            );
            batch.truncate(efficiency);
            for id in batch {
                if self.start_hack(id) {
                    hacking.push(id);
                }
            }
        }

        debug!(?scanned, hacking = hacking.len(), "autohack ran");
        Some(SimulationEvent::AutoHack { scanned, hacking })
    }

    /// Write an automatic save if a store is attached
    fn persist(&mut self) -> Option<SimulationEvent> {
        self.store.as_ref()?;
        let tick = self.tick;
        let outcome = self.save().and_then(|payload| {
            let store = self
                .store
                .as_mut()
                .ok_or_else(|| NetworkError::Persist("no save store attached".into()))?;
            store.store(&payload)?;
            Ok(payload.len())
        });

        Some(match outcome {
            Ok(bytes) => {
                debug!(tick, bytes, "saved");
                SimulationEvent::Saved { tick, bytes }
            }
            Err(err) => {
                warn!(tick, error = %err, "automatic save failed");
                SimulationEvent::SaveFailed {
                    tick,
                    reason: err.to_string(),
                }
            }
        })
    }
}

impl std::fmt::Debug for SimulationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("tick", &self.tick)
            .field("owned", &self.graph.owned_count())
            .field("economy", &self.economy)
            .field("selected", &self.selected)
            .field("has_store", &self.store.is_some())
            .finish()
    }
}
