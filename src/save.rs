//! Save payload codec and persistence seam
//!
//! The payload stores only what cannot be regenerated: the economy, upgrade
//! levels, the selection and the `target` links. Base nodes are referenced
//! by id, so a payload is only meaningful against the world it was written
//! for.
//!
//! Layout (JSON, camelCase):
//!
//! ```json
//! {
//!   "version": 1,
//!   "money": 120.5,
//!   "suspicion": 310.0,
//!   "autoHackTimer": 50.0,
//!   "selectedNodeId": 12,
//!   "upgrades": [{ "key": "hackSpeed", "level": 2 }],
//!   "nodeConnections": { "12": 2065, "13": 12 },
//!   "owned": [12]
//! }
//! ```
//!
//! Payloads without `version` or `owned` are read as the legacy layout,
//! where a node counts as owned when some other node targets it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::economy::EconomyState;
use crate::error::{NetworkError, Result};
use crate::network::NetworkGraph;
use crate::node::NodeId;
use crate::upgrades::{UpgradeKey, UpgradeLevels};
use crate::world::World;

/// Payload layout written by [`encode`]
pub const SAVE_VERSION: u32 = 1;

/// Upgrade key as found in a payload
///
/// Keys this build does not know are kept so they can be reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SavedUpgradeKey {
    Known(UpgradeKey),
    Unknown(String),
}

/// One purchased upgrade track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedUpgrade {
    pub key: SavedUpgradeKey,
    pub level: u32,
}

/// Serialisable game state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveData {
    /// Layout version, 0 for legacy payloads
    #[serde(default)]
    pub version: u32,
    pub money: f64,
    pub suspicion: f64,
    #[serde(default)]
    pub auto_hack_timer: f64,
    #[serde(default)]
    pub selected_node_id: Option<NodeId>,
    #[serde(default)]
    pub upgrades: Vec<SavedUpgrade>,
    /// Node id to the id it targets
    #[serde(default)]
    pub node_connections: BTreeMap<NodeId, NodeId>,
    /// Owned non-home nodes; absent in legacy payloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned: Option<Vec<NodeId>>,
}

#[derive(Deserialize)]
struct VersionProbe {
    #[serde(default)]
    version: u32,
}

impl SaveData {
    /// Snapshot the persistent part of a running game
    pub fn capture(graph: &NetworkGraph, economy: &EconomyState, selected: Option<NodeId>) -> Self {
        let home = graph.home_id();
        let node_connections = graph
            .iter_states()
            .filter_map(|(node, state)| state.target.map(|t| (node.id, t)))
            .collect();
        let owned: Vec<NodeId> = graph.owned_ids().into_iter().filter(|&id| id != home).collect();
        let upgrades = economy
            .upgrades
            .iter()
            .map(|(key, level)| SavedUpgrade {
                key: SavedUpgradeKey::Known(key),
                level,
            })
            .collect();

        Self {
            version: SAVE_VERSION,
            money: economy.money,
            suspicion: economy.suspicion,
            auto_hack_timer: economy.auto_hack_timer,
            selected_node_id: selected,
            upgrades,
            node_connections,
            owned: Some(owned),
        }
    }

    /// Upgrade levels, skipping keys this build does not know
    pub fn upgrade_levels(&self) -> UpgradeLevels {
        let mut levels = UpgradeLevels::default();
        for upgrade in &self.upgrades {
            match &upgrade.key {
                SavedUpgradeKey::Known(key) => levels.set(*key, upgrade.level),
                SavedUpgradeKey::Unknown(name) => {
                    warn!(key = %name, level = upgrade.level, "ignoring unknown upgrade in save");
                }
            }
        }
        levels
    }

    /// Rebuild the ownership graph over `world`
    ///
    /// Every referenced id must exist in `world`. Incomes are re-sampled
    /// and all scan and hack countdowns start idle.
    ///
    /// # Errors
    ///
    /// - `UnknownNode` for an id missing from the world
    /// - `InconsistentSave` if the links do not form a forest rooted at home
    pub fn rebuild_graph<R: Rng>(&self, world: Arc<World>, rng: &mut R) -> Result<NetworkGraph> {
        let home = world.home_id();

        let mut rendered = BTreeSet::from([home]);
        for (&id, &target) in &self.node_connections {
            rendered.insert(id);
            rendered.insert(target);
        }
        let owned: BTreeSet<NodeId> = match &self.owned {
            Some(list) => list.iter().copied().collect(),
            None => self.node_connections.values().copied().collect(),
        };
        rendered.extend(owned.iter().copied());

        if let Some(&missing) = rendered.iter().find(|&&id| !world.contains(id)) {
            return Err(NetworkError::UnknownNode(missing));
        }

        let mut graph = NetworkGraph::new(world);
        for &id in &rendered {
            if id == home {
                continue;
            }
            let Some(node_type) = graph.world().node(id).map(|n| n.node_type) else {
                continue;
            };
            let income = rng.gen_range(node_type.income_range());
            let is_owned = owned.contains(&id);
            graph.ensure_state(id);
            graph.update(id, |s| {
                s.is_scanned = true;
                s.is_owned = is_owned;
                s.income = income;
            });
        }

        for (&id, &target) in &self.node_connections {
            if id == home {
                debug!(target, "dropping stored target of the home node");
                continue;
            }
            if !graph.set_target(id, Some(target)) {
                return Err(NetworkError::InconsistentSave(format!(
                    "node {} cannot target {}",
                    id, target
                )));
            }
        }

        if !graph.is_consistent() {
            return Err(NetworkError::InconsistentSave(
                "owned nodes are not connected to home".into(),
            ));
        }
        Ok(graph)
    }
}

/// Serialise a save as JSON
pub fn encode(data: &SaveData) -> Result<String> {
    Ok(serde_json::to_string(data)?)
}

/// Parse a save payload
///
/// The version is checked before the rest of the layout, so a payload from
/// a newer build reports `UnsupportedSaveVersion` rather than a parse error.
pub fn decode(payload: &str) -> Result<SaveData> {
    let probe: VersionProbe = serde_json::from_str(payload)?;
    if probe.version > SAVE_VERSION {
        return Err(NetworkError::UnsupportedSaveVersion(probe.version));
    }
    Ok(serde_json::from_str(payload)?)
}

/// Destination for automatic saves
pub trait SaveStore: Send {
    /// Persist one payload, replacing any earlier one
    fn store(&mut self, payload: &str) -> Result<()>;
}

impl<F> SaveStore for F
where
    F: FnMut(&str) -> Result<()> + Send,
{
    fn store(&mut self, payload: &str) -> Result<()> {
        self(payload)
    }
}

/// In-memory store; clones share the same history
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    saves: Arc<Mutex<Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent payload
    pub fn latest(&self) -> Option<String> {
        self.saves.lock().ok()?.last().cloned()
    }

    /// Number of payloads written
    pub fn writes(&self) -> usize {
        self.saves.lock().map(|saves| saves.len()).unwrap_or(0)
    }
}

impl SaveStore for MemoryStore {
    fn store(&mut self, payload: &str) -> Result<()> {
        self.saves
            .lock()
            .map_err(|_| NetworkError::Persist("memory store lock poisoned".into()))?
            .push(payload.to_owned());
        Ok(())
    }
}
