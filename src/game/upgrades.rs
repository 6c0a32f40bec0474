use tracing::{debug, info};

use crate::config::UpgradeConfig;
use crate::game::ledger::{round_amount, ResourceLedger};
use crate::game::nodes::NodeRegistry;
use crate::protocol::{UpgradeKind, UpgradeView};

// ── Upgrade definition ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct UpgradeDefinition {
    pub kind: UpgradeKind,
    pub name: String,
    pub base_cost: u64,
    pub cost_growth: f64,
    /// 0 = unlimited.
    pub max_level: u32,
    pub effect_multiplier: f64,
    pub flat_bonus: u64,
    pub current_level: u32,
}

impl UpgradeDefinition {
    pub fn from_config(config: &UpgradeConfig) -> Self {
        Self {
            kind: config.kind,
            name: config.name.clone(),
            base_cost: config.base_cost.max(1),
            cost_growth: config.cost_growth.max(1.0),
            max_level: config.max_level,
            effect_multiplier: if config.effect_multiplier > 0.0 {
                config.effect_multiplier
            } else {
                1.0
            },
            flat_bonus: config.flat_bonus,
            current_level: 0,
        }
    }

    /// `round(baseCost * costGrowth ^ currentLevel)`.
    pub fn cost(&self) -> u64 {
        round_amount(self.base_cost as f64 * self.cost_growth.powi(self.current_level as i32))
    }

    pub fn is_maxed(&self) -> bool {
        self.max_level > 0 && self.current_level >= self.max_level
    }

    /// Multiplier accumulated so far (`effect ^ level`).
    pub fn total_multiplier(&self) -> f64 {
        self.effect_multiplier.powi(self.current_level as i32)
    }

    pub fn total_flat_bonus(&self) -> u64 {
        self.flat_bonus * self.current_level as u64
    }
}

// ── Registry ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct UpgradeRegistry {
    definitions: Vec<UpgradeDefinition>,
}

impl UpgradeRegistry {
    pub fn new(configs: &[UpgradeConfig]) -> Self {
        let mut definitions: Vec<UpgradeDefinition> = Vec::new();
        for config in configs {
            // First definition per kind wins.
            if definitions.iter().all(|d| d.kind != config.kind) {
                definitions.push(UpgradeDefinition::from_config(config));
            }
        }
        Self { definitions }
    }

    pub fn get(&self, kind: UpgradeKind) -> Option<&UpgradeDefinition> {
        self.definitions.iter().find(|d| d.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UpgradeDefinition> {
        self.definitions.iter()
    }

    pub fn cost(&self, kind: UpgradeKind) -> Option<u64> {
        self.get(kind).map(UpgradeDefinition::cost)
    }

    pub fn level(&self, kind: UpgradeKind) -> u32 {
        self.get(kind).map(|d| d.current_level).unwrap_or(0)
    }

    /// Returns `true` if the upgrade is below its level cap and affordable.
    pub fn can_purchase(&self, kind: UpgradeKind, ledger: &ResourceLedger) -> bool {
        match self.get(kind) {
            Some(def) => !def.is_maxed() && ledger.can_afford(def.cost()),
            None => false,
        }
    }

    /// Buys one level: spends the coins, compounds the mapped ledger rate and
    /// grows the mapped node's output by the flat bonus.
    pub fn purchase(
        &mut self,
        kind: UpgradeKind,
        ledger: &mut ResourceLedger,
        nodes: &mut NodeRegistry,
    ) -> bool {
        let Some(def) = self.definitions.iter_mut().find(|d| d.kind == kind) else {
            debug!(?kind, "no definition for upgrade");
            return false;
        };
        if def.is_maxed() {
            debug!(?kind, level = def.current_level, "upgrade already at max level");
            return false;
        }
        let cost = def.cost();
        if !ledger.spend_coins(cost) {
            debug!(?kind, cost, coins = ledger.coins(), "upgrade not affordable");
            return false;
        }

        def.current_level += 1;
        if let Some(rate) = kind.rate() {
            ledger.apply_rate_multiplier(rate, def.effect_multiplier);
        }
        if def.flat_bonus > 0 {
            if let Some(node_kind) = kind.bonus_node() {
                nodes.add_output_bonus(node_kind, def.flat_bonus);
            }
        }

        info!(
            "Purchased {} level {} for {} coins",
            def.name, def.current_level, cost
        );
        true
    }

    /// Restore a persisted level without charging for it.
    ///
    /// Only the level is restored; rate multipliers are persisted on the
    /// ledger separately. Node flat bonuses are reapplied here.
    pub fn restore_level(&mut self, kind: UpgradeKind, level: u32, nodes: &mut NodeRegistry) {
        let Some(def) = self.definitions.iter_mut().find(|d| d.kind == kind) else {
            return;
        };
        def.current_level = if def.max_level > 0 {
            level.min(def.max_level)
        } else {
            level
        };
        if let Some(node_kind) = kind.bonus_node() {
            let bonus = def.total_flat_bonus();
            if bonus > 0 {
                nodes.add_output_bonus(node_kind, bonus);
            }
        }
    }

    pub fn reset(&mut self) {
        for def in self.definitions.iter_mut() {
            def.current_level = 0;
        }
    }

    pub fn views(&self, ledger: &ResourceLedger) -> Vec<UpgradeView> {
        self.definitions
            .iter()
            .map(|d| UpgradeView {
                kind: d.kind,
                level: d.current_level,
                max_level: d.max_level,
                cost: d.cost(),
                affordable: ledger.can_afford(d.cost()),
                maxed: d.is_maxed(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_upgrades, GameConfig};
    use crate::protocol::{NodeKind, RateKind};

    fn make_world(coins: u64) -> (UpgradeRegistry, ResourceLedger, NodeRegistry) {
        let config = GameConfig {
            starting_coins: coins,
            ..GameConfig::default()
        };
        (
            UpgradeRegistry::new(&config.upgrades),
            ResourceLedger::new(&config),
            NodeRegistry::from_config(&config),
        )
    }

    fn single(kind: UpgradeKind, base_cost: u64, growth: f64, max_level: u32) -> UpgradeRegistry {
        UpgradeRegistry::new(&[UpgradeConfig {
            kind,
            name: "test".to_string(),
            base_cost,
            cost_growth: growth,
            max_level,
            effect_multiplier: 1.2,
            flat_bonus: 0,
        }])
    }

    #[test]
    fn cost_follows_geometric_curve() {
        let (_, mut ledger, mut nodes) = make_world(100_000);
        let mut upgrades = single(UpgradeKind::SellPrice, 100, 1.5, 0);
        for level in 0..6 {
            let expected = (100.0 * 1.5f64.powi(level)).round_ties_even() as u64;
            assert_eq!(upgrades.cost(UpgradeKind::SellPrice), Some(expected));
            assert!(upgrades.purchase(UpgradeKind::SellPrice, &mut ledger, &mut nodes));
        }
    }

    #[test]
    fn stock_seeds_cost_ties_round_to_even() {
        let (mut upgrades, mut ledger, mut nodes) = make_world(10_000);
        assert_eq!(upgrades.cost(UpgradeKind::CornYield), Some(50));
        assert!(upgrades.purchase(UpgradeKind::CornYield, &mut ledger, &mut nodes));
        assert_eq!(upgrades.cost(UpgradeKind::CornYield), Some(75));
        assert!(upgrades.purchase(UpgradeKind::CornYield, &mut ledger, &mut nodes));
        // 50 * 1.5^2 = 112.5
        assert_eq!(upgrades.cost(UpgradeKind::CornYield), Some(112));
        assert_eq!(ledger.coins(), 10_000 - 50 - 75);
    }

    #[test]
    fn purchase_refused_at_max_level_even_when_rich() {
        let (_, mut ledger, mut nodes) = make_world(1_000_000);
        let mut upgrades = single(UpgradeKind::CornYield, 10, 1.0, 2);
        assert!(upgrades.purchase(UpgradeKind::CornYield, &mut ledger, &mut nodes));
        assert!(upgrades.purchase(UpgradeKind::CornYield, &mut ledger, &mut nodes));
        let coins = ledger.coins();
        assert!(!upgrades.can_purchase(UpgradeKind::CornYield, &ledger));
        assert!(!upgrades.purchase(UpgradeKind::CornYield, &mut ledger, &mut nodes));
        assert_eq!(ledger.coins(), coins);
        assert_eq!(upgrades.level(UpgradeKind::CornYield), 2);
    }

    #[test]
    fn unaffordable_purchase_changes_nothing() {
        let (mut upgrades, mut ledger, mut nodes) = make_world(10);
        assert!(!upgrades.purchase(UpgradeKind::SellPrice, &mut ledger, &mut nodes));
        assert_eq!(ledger.coins(), 10);
        assert_eq!(upgrades.level(UpgradeKind::SellPrice), 0);
        assert_eq!(ledger.rate(RateKind::Price), 1.0);
    }

    #[test]
    fn purchase_compounds_mapped_rate() {
        let (mut upgrades, mut ledger, mut nodes) = make_world(10_000);
        assert!(upgrades.purchase(UpgradeKind::SellPrice, &mut ledger, &mut nodes));
        assert!(upgrades.purchase(UpgradeKind::SellPrice, &mut ledger, &mut nodes));
        assert!((ledger.rate(RateKind::Price) - 1.44).abs() < 1e-9);
        let def = upgrades.get(UpgradeKind::SellPrice).unwrap();
        assert!((def.total_multiplier() - 1.44).abs() < 1e-9);
    }

    #[test]
    fn capacity_adds_flat_bonus_to_market() {
        let (mut upgrades, mut ledger, mut nodes) = make_world(10_000);
        let market = nodes.first_of_kind(NodeKind::Market).unwrap();
        assert_eq!(nodes.get(market).unwrap().output_amount(), 1);
        assert!(upgrades.purchase(UpgradeKind::Capacity, &mut ledger, &mut nodes));
        assert_eq!(nodes.get(market).unwrap().output_amount(), 2);
        // Capacity has no ledger rate.
        assert_eq!(ledger.rate(RateKind::Price), 1.0);
    }

    #[test]
    fn restore_level_reapplies_flat_bonus() {
        let (mut upgrades, _, mut nodes) = make_world(0);
        upgrades.restore_level(UpgradeKind::Capacity, 2, &mut nodes);
        let market = nodes.first_of_kind(NodeKind::Market).unwrap();
        assert_eq!(upgrades.level(UpgradeKind::Capacity), 2);
        assert_eq!(nodes.get(market).unwrap().output_amount(), 3);
    }

    #[test]
    fn reset_zeroes_levels() {
        let (mut upgrades, mut ledger, mut nodes) = make_world(10_000);
        upgrades.purchase(UpgradeKind::Speed, &mut ledger, &mut nodes);
        upgrades.reset();
        assert!(default_upgrades()
            .iter()
            .all(|u| upgrades.level(u.kind) == 0));
    }
}
