use tracing::debug;

use crate::config::{GameConfig, NodeConfig};
use crate::game::ledger::ResourceLedger;
use crate::protocol::{Color, GameEvent, NodeId, NodeKind, NodeStateKind, NodeView, Vec2};

/// Why an interaction was ignored. Rejections never touch the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotReady(NodeStateKind),
    NotEnoughCorn { need: u64, have: u64 },
    NoEggs,
    UnknownNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractOutcome {
    Accepted,
    Rejected(RejectReason),
}

impl InteractOutcome {
    pub fn is_accepted(self) -> bool {
        matches!(self, InteractOutcome::Accepted)
    }
}

/// A cooldown-gated interactable: Ready → Busy → Cooldown → Ready.
///
/// `cooldown_remaining` is zero whenever the node is Ready and positive
/// whenever it is in Cooldown.
#[derive(Debug, Clone)]
pub struct ProductionNode {
    id: NodeId,
    kind: NodeKind,
    state: NodeStateKind,
    position: Vec2,
    busy_duration: f32,
    cooldown_duration: f32,
    busy_remaining: f32,
    cooldown_remaining: f32,
    base_output: u64,
    output_amount: u64,
    feed_cost: u64,
    /// Producer only: eggs laid but not yet collected into the ledger.
    uncollected: u64,
    hint_color: Color,
}

impl ProductionNode {
    pub fn new(
        id: NodeId,
        kind: NodeKind,
        node: &NodeConfig,
        output_amount: u64,
        feed_cost: u64,
        hint_color: Color,
    ) -> Self {
        Self {
            id,
            kind,
            state: NodeStateKind::Ready,
            position: node.position,
            busy_duration: node.busy.max(0.0),
            cooldown_duration: node.cooldown.max(0.0),
            busy_remaining: 0.0,
            cooldown_remaining: 0.0,
            base_output: output_amount,
            output_amount,
            feed_cost,
            uncollected: 0,
            hint_color,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn state(&self) -> NodeStateKind {
        self.state
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn cooldown_remaining(&self) -> f32 {
        self.cooldown_remaining
    }

    pub fn output_amount(&self) -> u64 {
        self.output_amount
    }

    pub fn uncollected(&self) -> u64 {
        self.uncollected
    }

    /// Ready and the kind-specific resource precondition holds.
    pub fn can_interact(&self, ledger: &ResourceLedger) -> bool {
        self.check(ledger).is_ok()
    }

    fn check(&self, ledger: &ResourceLedger) -> Result<(), RejectReason> {
        if self.state != NodeStateKind::Ready {
            return Err(RejectReason::NotReady(self.state));
        }
        match self.kind {
            NodeKind::Field => Ok(()),
            NodeKind::Producer if ledger.corn() < self.feed_cost => {
                Err(RejectReason::NotEnoughCorn {
                    need: self.feed_cost,
                    have: ledger.corn(),
                })
            }
            NodeKind::Producer => Ok(()),
            NodeKind::Market if ledger.eggs() == 0 => Err(RejectReason::NoEggs),
            NodeKind::Market => Ok(()),
        }
    }

    /// Apply the node's immediate effect and start the Busy phase.
    ///
    /// A rejected call leaves both the node and the ledger untouched.
    pub fn interact(&mut self, ledger: &mut ResourceLedger) -> InteractOutcome {
        if let Err(reason) = self.check(ledger) {
            debug!(node = self.id, kind = ?self.kind, ?reason, "interaction rejected");
            return InteractOutcome::Rejected(reason);
        }

        match self.kind {
            NodeKind::Field => {
                let added = ledger.add_corn(self.output_amount);
                self.hint(ledger, format!("+{} corn", added));
            }
            NodeKind::Producer => {
                if !ledger.use_corn(self.feed_cost) {
                    return InteractOutcome::Rejected(RejectReason::NotEnoughCorn {
                        need: self.feed_cost,
                        have: ledger.corn(),
                    });
                }
            }
            NodeKind::Market => {
                let mut earned = 0;
                for _ in 0..self.output_amount.max(1) {
                    let price = ledger.sell_price();
                    if !ledger.sell_one_egg() {
                        break;
                    }
                    earned += price;
                }
                self.hint(ledger, format!("+{} coins", earned));
            }
        }

        self.state = NodeStateKind::Busy;
        self.busy_remaining = self.busy_duration;
        debug!(node = self.id, kind = ?self.kind, "interaction accepted");
        InteractOutcome::Accepted
    }

    /// Advance Busy/Cooldown timers by `dt` seconds of game time scaled by
    /// the ledger's speed rate.
    pub fn advance(&mut self, dt: f32, ledger: &mut ResourceLedger) {
        let step = dt * ledger.speed_rate() as f32;
        match self.state {
            NodeStateKind::Ready => {}
            NodeStateKind::Busy => {
                self.busy_remaining -= step;
                if self.busy_remaining <= 0.0 {
                    let overshoot = -self.busy_remaining;
                    self.busy_remaining = 0.0;
                    self.finish_busy(overshoot, ledger);
                }
            }
            NodeStateKind::Cooldown => {
                self.cooldown_remaining -= step;
                if self.cooldown_remaining <= 0.0 {
                    self.cooldown_remaining = 0.0;
                    self.state = NodeStateKind::Ready;
                }
            }
        }
    }

    /// Leaves Busy. `overshoot` is the part of this tick's step past the end
    /// of Busy; it already counts against the cooldown.
    fn finish_busy(&mut self, overshoot: f32, ledger: &mut ResourceLedger) {
        if self.kind == NodeKind::Producer {
            self.uncollected += self.output_amount;
            self.hint(ledger, format!("{} egg ready", self.output_amount));
        }
        let cooldown = self.cooldown_duration - overshoot;
        if cooldown > 0.0 {
            self.state = NodeStateKind::Cooldown;
            self.cooldown_remaining = cooldown;
        } else {
            self.state = NodeStateKind::Ready;
        }
    }

    /// Move laid eggs into the ledger. Returns the eggs actually credited.
    pub fn collect(&mut self, ledger: &mut ResourceLedger) -> u64 {
        if self.uncollected == 0 {
            return 0;
        }
        let laid = std::mem::take(&mut self.uncollected);
        let added = ledger.add_egg(laid);
        self.hint(ledger, format!("+{} eggs", added));
        added
    }

    pub fn add_output_bonus(&mut self, bonus: u64) {
        self.output_amount += bonus;
    }

    /// Back to Ready with the configured output and an empty tray.
    pub fn reset(&mut self) {
        self.state = NodeStateKind::Ready;
        self.busy_remaining = 0.0;
        self.cooldown_remaining = 0.0;
        self.output_amount = self.base_output;
        self.uncollected = 0;
    }

    pub fn view(&self, ledger: &ResourceLedger) -> NodeView {
        NodeView {
            id: self.id,
            kind: self.kind,
            state: self.state,
            position: self.position,
            busy_remaining: self.busy_remaining,
            cooldown_remaining: self.cooldown_remaining,
            output_amount: self.output_amount,
            uncollected: self.uncollected,
            can_interact: self.can_interact(ledger),
        }
    }

    fn hint(&self, ledger: &mut ResourceLedger, label: String) {
        ledger.events_mut().emit(GameEvent::ResourceGained {
            label,
            location: self.position,
            color: self.hint_color,
        });
    }
}

/// Every production node in the session, addressed by index.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: Vec<ProductionNode>,
}

impl NodeRegistry {
    /// One Field, one Producer and one Market laid out from the config.
    pub fn from_config(config: &GameConfig) -> Self {
        let mut registry = Self::default();
        registry.add(
            NodeKind::Field,
            &config.field,
            config.corn_per_harvest,
            0,
            config.palette.corn,
        );
        registry.add(
            NodeKind::Producer,
            &config.producer,
            config.yield_per_feed,
            config.feed_cost,
            config.palette.egg,
        );
        registry.add(
            NodeKind::Market,
            &config.market,
            config.eggs_per_sale,
            0,
            config.palette.coin,
        );
        registry
    }

    pub fn add(
        &mut self,
        kind: NodeKind,
        node: &NodeConfig,
        output_amount: u64,
        feed_cost: u64,
        hint_color: Color,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes
            .push(ProductionNode::new(id, kind, node, output_amount, feed_cost, hint_color));
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&ProductionNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut ProductionNode> {
        self.nodes.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProductionNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn first_of_kind(&self, kind: NodeKind) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.kind == kind).map(|n| n.id)
    }

    /// Nearest node within `radius` of `point`.
    pub fn nearest(&self, point: Vec2, radius: f32) -> Option<NodeId> {
        self.nodes
            .iter()
            .map(|n| (n.id, n.position.distance(point)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    pub fn interact(&mut self, id: NodeId, ledger: &mut ResourceLedger) -> InteractOutcome {
        match self.nodes.get_mut(id) {
            Some(node) => node.interact(ledger),
            None => InteractOutcome::Rejected(RejectReason::UnknownNode),
        }
    }

    pub fn advance_all(&mut self, dt: f32, ledger: &mut ResourceLedger) {
        for node in self.nodes.iter_mut() {
            node.advance(dt, ledger);
        }
    }

    pub fn add_output_bonus(&mut self, kind: NodeKind, bonus: u64) {
        for node in self.nodes.iter_mut().filter(|n| n.kind == kind) {
            node.add_output_bonus(bonus);
        }
    }

    pub fn reset(&mut self) {
        for node in self.nodes.iter_mut() {
            node.reset();
        }
    }

    pub fn views(&self, ledger: &ResourceLedger) -> Vec<NodeView> {
        self.nodes.iter().map(|n| n.view(ledger)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(corn: u64, eggs: u64) -> (NodeRegistry, ResourceLedger) {
        let config = GameConfig {
            starting_corn: corn,
            starting_eggs: eggs,
            ..GameConfig::default()
        };
        (NodeRegistry::from_config(&config), ResourceLedger::new(&config))
    }

    const FIELD: NodeId = 0;
    const PRODUCER: NodeId = 1;
    const MARKET: NodeId = 2;

    #[test]
    fn field_cycles_ready_busy_cooldown_ready() {
        let (mut nodes, mut ledger) = setup(0, 0);
        assert!(nodes.interact(FIELD, &mut ledger).is_accepted());
        assert_eq!(ledger.corn(), 1);
        assert_eq!(nodes.get(FIELD).unwrap().state(), NodeStateKind::Busy);

        // Zero busy time: the next advance enters the 2s cooldown.
        nodes.advance_all(0.05, &mut ledger);
        let field = nodes.get(FIELD).unwrap();
        assert_eq!(field.state(), NodeStateKind::Cooldown);
        assert!(field.cooldown_remaining() > 0.0);

        nodes.advance_all(1.0, &mut ledger);
        assert_eq!(nodes.get(FIELD).unwrap().state(), NodeStateKind::Cooldown);
        nodes.advance_all(1.0, &mut ledger);
        let field = nodes.get(FIELD).unwrap();
        assert_eq!(field.state(), NodeStateKind::Ready);
        assert_eq!(field.cooldown_remaining(), 0.0);
    }

    #[test]
    fn interact_during_cooldown_is_a_no_op() {
        let (mut nodes, mut ledger) = setup(0, 0);
        nodes.interact(FIELD, &mut ledger);
        nodes.advance_all(0.05, &mut ledger);
        let remaining = nodes.get(FIELD).unwrap().cooldown_remaining();

        for _ in 0..5 {
            let outcome = nodes.interact(FIELD, &mut ledger);
            assert_eq!(
                outcome,
                InteractOutcome::Rejected(RejectReason::NotReady(NodeStateKind::Cooldown))
            );
        }
        assert_eq!(ledger.corn(), 1);
        let field = nodes.get(FIELD).unwrap();
        assert_eq!(field.state(), NodeStateKind::Cooldown);
        assert_eq!(field.cooldown_remaining(), remaining);
    }

    #[test]
    fn second_interact_in_same_tick_is_rejected() {
        let (mut nodes, mut ledger) = setup(0, 0);
        assert!(nodes.interact(FIELD, &mut ledger).is_accepted());
        assert!(!nodes.interact(FIELD, &mut ledger).is_accepted());
        assert_eq!(ledger.corn(), 1);
    }

    #[test]
    fn producer_needs_corn() {
        let (mut nodes, mut ledger) = setup(0, 0);
        assert!(!nodes.get(PRODUCER).unwrap().can_interact(&ledger));
        assert_eq!(
            nodes.interact(PRODUCER, &mut ledger),
            InteractOutcome::Rejected(RejectReason::NotEnoughCorn { need: 1, have: 0 })
        );
        assert_eq!(nodes.get(PRODUCER).unwrap().state(), NodeStateKind::Ready);
    }

    #[test]
    fn producer_lays_egg_after_busy_and_collect_credits_ledger() {
        let (mut nodes, mut ledger) = setup(2, 0);
        assert!(nodes.interact(PRODUCER, &mut ledger).is_accepted());
        assert_eq!(ledger.corn(), 1);

        nodes.advance_all(1.0, &mut ledger);
        assert_eq!(nodes.get(PRODUCER).unwrap().uncollected(), 0);
        nodes.advance_all(0.6, &mut ledger);
        let producer = nodes.get(PRODUCER).unwrap();
        assert_eq!(producer.uncollected(), 1);
        assert_eq!(producer.state(), NodeStateKind::Cooldown);
        assert_eq!(ledger.eggs(), 0);

        let added = nodes.get_mut(PRODUCER).unwrap().collect(&mut ledger);
        assert_eq!(added, 1);
        assert_eq!(ledger.eggs(), 1);
        assert_eq!(nodes.get_mut(PRODUCER).unwrap().collect(&mut ledger), 0);
    }

    #[test]
    fn speed_rate_shortens_timers() {
        let (mut nodes, mut ledger) = setup(1, 0);
        ledger.apply_rate_multiplier(crate::protocol::RateKind::Speed, 2.0);
        nodes.interact(PRODUCER, &mut ledger);
        // 1.5s busy at 2x speed finishes after 0.75s of game time.
        nodes.advance_all(0.8, &mut ledger);
        assert_eq!(nodes.get(PRODUCER).unwrap().uncollected(), 1);
    }

    #[test]
    fn busy_overshoot_counts_against_cooldown() {
        let (mut nodes, mut ledger) = setup(1, 0);
        nodes.interact(FIELD, &mut ledger);
        nodes.advance_all(0.25, &mut ledger);
        let field = nodes.get(FIELD).unwrap();
        assert_eq!(field.state(), NodeStateKind::Cooldown);
        assert!((field.cooldown_remaining() - 1.75).abs() < 1e-5);

        // Producer: 1.5s busy + 0.5s cooldown both used up by one long step.
        nodes.interact(PRODUCER, &mut ledger);
        nodes.advance_all(2.5, &mut ledger);
        let producer = nodes.get(PRODUCER).unwrap();
        assert_eq!(producer.state(), NodeStateKind::Ready);
        assert_eq!(producer.cooldown_remaining(), 0.0);
        assert_eq!(producer.uncollected(), 1);
    }

    #[test]
    fn market_sells_and_respects_capacity() {
        let (mut nodes, mut ledger) = setup(0, 3);
        nodes.add_output_bonus(NodeKind::Market, 1);
        assert!(nodes.interact(MARKET, &mut ledger).is_accepted());
        assert_eq!(ledger.eggs(), 1);
        assert_eq!(ledger.coins(), 50 + 20);
    }

    #[test]
    fn market_rejects_without_eggs() {
        let (mut nodes, mut ledger) = setup(0, 0);
        assert_eq!(
            nodes.interact(MARKET, &mut ledger),
            InteractOutcome::Rejected(RejectReason::NoEggs)
        );
        assert_eq!(ledger.coins(), 50);
    }

    #[test]
    fn nearest_respects_radius() {
        let (nodes, _) = setup(0, 0);
        let field_pos = nodes.get(FIELD).unwrap().position();
        assert_eq!(nodes.nearest(field_pos, 1.0), Some(FIELD));
        assert_eq!(nodes.nearest(Vec2::new(100.0, 100.0), 1.5), None);
        assert_eq!(nodes.first_of_kind(NodeKind::Market), Some(MARKET));
    }

    #[test]
    fn unknown_node_is_rejected() {
        let (mut nodes, mut ledger) = setup(0, 0);
        assert_eq!(
            nodes.interact(99, &mut ledger),
            InteractOutcome::Rejected(RejectReason::UnknownNode)
        );
    }
}
