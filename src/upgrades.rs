//! Purchasable upgrades and their effects

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;

/// Identifier of an upgrade track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpgradeKey {
    /// Scan reach in kilometres
    DiscoveryRange,
    /// Nodes revealed per scan
    ScanEfficiency,
    /// Speed multiplier for scan and hack countdowns
    HackSpeed,
    /// Income multiplier
    StealAmount,
    /// Suspicion gain multiplier
    SuspicionDecay,
    /// Unlocks and strengthens automatic hacking
    AutoHack,
}

impl UpgradeKey {
    /// Every key in catalog order
    pub const ALL: [UpgradeKey; 6] = [
        UpgradeKey::DiscoveryRange,
        UpgradeKey::ScanEfficiency,
        UpgradeKey::HackSpeed,
        UpgradeKey::StealAmount,
        UpgradeKey::SuspicionDecay,
        UpgradeKey::AutoHack,
    ];
}

/// How an upgrade's price grows with its level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpgradeCost {
    /// Explicit price per level; the table length caps the level
    Table(Vec<f64>),
    /// `base_cost * cost_exponent ^ level`
    Exponential {
        /// Price of level 1
        base_cost: f64,
        /// Growth factor per level
        cost_exponent: f64,
    },
}

/// One entry of the upgrade catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeDefinition {
    /// Track identifier
    pub key: UpgradeKey,
    /// Display name
    pub name: String,
    /// Display description
    pub description: String,
    /// Owned nodes needed before the upgrade can be bought
    pub required_node_count: usize,
    /// Pricing
    pub cost: UpgradeCost,
}

impl UpgradeDefinition {
    /// Price of going from `level` to `level + 1`, or `None` at the cap
    pub fn cost_at(&self, level: u32) -> Option<f64> {
        match &self.cost {
            UpgradeCost::Table(prices) => prices.get(level as usize).copied(),
            UpgradeCost::Exponential {
                base_cost,
                cost_exponent,
            } => Some(base_cost * cost_exponent.powi(level as i32)),
        }
    }

    /// Highest purchasable level, `None` when unbounded
    pub fn max_level(&self) -> Option<u32> {
        match &self.cost {
            UpgradeCost::Table(prices) => Some(prices.len() as u32),
            UpgradeCost::Exponential { .. } => None,
        }
    }
}

/// Ordered list of upgrade definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeCatalog {
    entries: Vec<UpgradeDefinition>,
}

impl UpgradeCatalog {
    /// Build a catalog from explicit entries
    pub fn new(entries: Vec<UpgradeDefinition>) -> Self {
        Self { entries }
    }

    /// The built-in catalog
    pub fn standard() -> Self {
        let entry = |key, name: &str, description: &str, required_node_count, cost| UpgradeDefinition {
            key,
            name: name.into(),
            description: description.into(),
            required_node_count,
            cost,
        };

        Self::new(vec![
            entry(
                UpgradeKey::DiscoveryRange,
                "Signal Booster",
                "Scans reach further",
                0,
                UpgradeCost::Exponential { base_cost: 50.0, cost_exponent: 1.6 },
            ),
            entry(
                UpgradeKey::ScanEfficiency,
                "Port Sweeper",
                "Each scan reveals one more node",
                0,
                UpgradeCost::Exponential { base_cost: 80.0, cost_exponent: 1.8 },
            ),
            entry(
                UpgradeKey::HackSpeed,
                "Overclock",
                "Scans and hacks finish sooner",
                3,
                UpgradeCost::Exponential { base_cost: 120.0, cost_exponent: 1.7 },
            ),
            entry(
                UpgradeKey::StealAmount,
                "Skimming Scripts",
                "Owned nodes yield more money",
                5,
                UpgradeCost::Exponential { base_cost: 200.0, cost_exponent: 1.9 },
            ),
            entry(
                UpgradeKey::SuspicionDecay,
                "Log Scrubber",
                "Suspicion builds more slowly",
                5,
                UpgradeCost::Table(vec![300.0, 900.0, 2700.0, 8100.0, 24300.0]),
            ),
            entry(
                UpgradeKey::AutoHack,
                "Worm",
                "Periodically scans and hacks on its own",
                10,
                UpgradeCost::Table(vec![1000.0, 4000.0, 16000.0]),
            ),
        ])
    }

    /// Entries in catalog order
    pub fn entries(&self) -> &[UpgradeDefinition] {
        &self.entries
    }

    /// Definition for a key
    pub fn get(&self, key: UpgradeKey) -> Option<&UpgradeDefinition> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Price of going from `level` to `level + 1`
    pub fn cost(&self, key: UpgradeKey, level: u32) -> Option<f64> {
        self.get(key)?.cost_at(level)
    }
}

impl Default for UpgradeCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// Current level of every upgrade track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeLevels {
    levels: BTreeMap<UpgradeKey, u32>,
}

impl UpgradeLevels {
    /// Level of a track (0 if never bought)
    #[inline]
    pub fn level(&self, key: UpgradeKey) -> u32 {
        self.levels.get(&key).copied().unwrap_or(0)
    }

    /// Set a track's level
    pub fn set(&mut self, key: UpgradeKey, level: u32) {
        self.levels.insert(key, level);
    }

    /// Every track with a non-zero level
    pub fn iter(&self) -> impl Iterator<Item = (UpgradeKey, u32)> + '_ {
        self.levels
            .iter()
            .filter(|(_, &level)| level > 0)
            .map(|(&key, &level)| (key, level))
    }
}

/// Effect value of an upgrade at a level
///
/// | key | effect |
/// |---|---|
/// | `DiscoveryRange` | kilometres, base + 150 per level |
/// | `ScanEfficiency` | nodes per scan, base + 1 per level |
/// | `HackSpeed` | countdown multiplier, 1 + 0.25 per level |
/// | `StealAmount` | income multiplier, 1 + 0.2 per level |
/// | `SuspicionDecay` | suspicion multiplier, 0.85 ^ level |
/// | `AutoHack` | nodes per autohack run, 0 = locked |
pub fn upgrade_effect(key: UpgradeKey, level: u32, config: &SimulationConfig) -> f64 {
    let level = level as f64;
    match key {
        UpgradeKey::DiscoveryRange => config.base_discovery_range_km + 150.0 * level,
        UpgradeKey::ScanEfficiency => config.base_scan_efficiency as f64 + level,
        UpgradeKey::HackSpeed => 1.0 + 0.25 * level,
        UpgradeKey::StealAmount => 1.0 + 0.2 * level,
        UpgradeKey::SuspicionDecay => 0.85f64.powf(level),
        UpgradeKey::AutoHack => level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_cost() {
        let catalog = UpgradeCatalog::standard();
        let range = catalog.get(UpgradeKey::DiscoveryRange).unwrap();
        assert_eq!(range.cost_at(0), Some(50.0));
        assert!((range.cost_at(2).unwrap() - 50.0 * 1.6 * 1.6).abs() < 1e-9);
    }

    #[test]
    fn test_table_cost_caps_level() {
        let catalog = UpgradeCatalog::standard();
        let auto = catalog.get(UpgradeKey::AutoHack).unwrap();
        assert_eq!(auto.cost_at(0), Some(1000.0));
        assert_eq!(auto.cost_at(2), Some(16000.0));
        assert_eq!(auto.cost_at(3), None);
        assert_eq!(auto.max_level(), Some(3));
        assert_eq!(catalog.cost(UpgradeKey::AutoHack, 1), Some(4000.0));
        assert_eq!(catalog.get(UpgradeKey::HackSpeed).unwrap().max_level(), None);
    }

    #[test]
    fn test_catalog_covers_every_key() {
        let catalog = UpgradeCatalog::standard();
        for key in UpgradeKey::ALL {
            assert!(catalog.get(key).is_some(), "{:?} missing", key);
        }
        assert_eq!(catalog.entries()[0].key, UpgradeKey::DiscoveryRange);
    }

    #[test]
    fn test_effects() {
        let config = SimulationConfig::default();
        assert_eq!(upgrade_effect(UpgradeKey::DiscoveryRange, 0, &config), 500.0);
        assert_eq!(upgrade_effect(UpgradeKey::DiscoveryRange, 2, &config), 800.0);
        assert_eq!(upgrade_effect(UpgradeKey::ScanEfficiency, 1, &config), 3.0);
        assert_eq!(upgrade_effect(UpgradeKey::HackSpeed, 4, &config), 2.0);
        assert_eq!(upgrade_effect(UpgradeKey::SuspicionDecay, 0, &config), 1.0);
        assert!(upgrade_effect(UpgradeKey::SuspicionDecay, 3, &config) < 1.0);
        assert_eq!(upgrade_effect(UpgradeKey::AutoHack, 0, &config), 0.0);
    }

    #[test]
    fn test_levels_default_to_zero() {
        let mut levels = UpgradeLevels::default();
        assert_eq!(levels.level(UpgradeKey::HackSpeed), 0);
        levels.set(UpgradeKey::HackSpeed, 2);
        levels.set(UpgradeKey::AutoHack, 0);
        assert_eq!(levels.iter().collect::<Vec<_>>(), vec![(UpgradeKey::HackSpeed, 2)]);
    }

    #[test]
    fn test_key_serializes_camel_case() {
        let json = serde_json::to_string(&UpgradeKey::StealAmount).unwrap();
        assert_eq!(json, "\"stealAmount\"");
    }
}
