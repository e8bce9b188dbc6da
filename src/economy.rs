//! Process-wide economy state

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::upgrades::{upgrade_effect, UpgradeKey, UpgradeLevels};

/// Money, points, suspicion and upgrade levels
///
/// Money is the only currency. Points are a capped processing resource
/// spent on scans; the cap grows with the number of owned nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomyState {
    /// Spendable money
    pub money: f64,
    /// Processing points, within `[0, max_points]`
    pub points: f64,
    /// Accumulated suspicion
    pub suspicion: f64,
    /// Points gained last tick
    pub points_per_tick: f64,
    /// Money gained last tick
    pub money_per_tick: f64,
    /// Ticks until the next automatic save
    pub save_counter: u32,
    /// Ticks until the next autohack run
    pub auto_hack_timer: f64,
    /// Purchased upgrade levels
    pub upgrades: UpgradeLevels,
}

impl EconomyState {
    /// Starting economy for a fresh game
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            money: config.starting_money,
            points: config.base_max_points,
            suspicion: 0.0,
            points_per_tick: 0.0,
            money_per_tick: 0.0,
            save_counter: config.save_interval.max(1),
            auto_hack_timer: config.autohack_interval,
            upgrades: UpgradeLevels::default(),
        }
    }

    /// Point cap for the given number of owned nodes
    pub fn max_points(owned: usize, config: &SimulationConfig) -> f64 {
        config.base_max_points + owned as f64 * config.max_points_per_node
    }

    /// Effect of an upgrade at its current level, or the next one
    pub fn effect(&self, key: UpgradeKey, preview_next: bool, config: &SimulationConfig) -> f64 {
        let level = self.upgrades.level(key) + u32::from(preview_next);
        upgrade_effect(key, level, config)
    }

    /// Fold one tick of income into the running totals
    pub(crate) fn collect(&mut self, income: f64, owned: usize, config: &SimulationConfig) {
        self.money_per_tick = income * self.effect(UpgradeKey::StealAmount, false, config);
        self.points_per_tick = owned as f64 * config.points_per_node;

        self.money = (self.money + self.money_per_tick).max(0.0);
        let cap = Self::max_points(owned, config);
        self.points = (self.points + self.points_per_tick).clamp(0.0, cap);
    }

    /// Add one tick of suspicion; returns whether the threshold was crossed
    ///
    /// Crossing resets suspicion to zero.
    pub(crate) fn accrue_suspicion(&mut self, config: &SimulationConfig) -> bool {
        self.suspicion += config.base_suspicion_per_tick
            * self.effect(UpgradeKey::SuspicionDecay, false, config);
        if self.suspicion >= config.suspicion_threshold {
            self.suspicion = 0.0;
            true
        } else {
            false
        }
    }
}
