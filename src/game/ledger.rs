use tracing::debug;

use crate::config::GameConfig;
use crate::game::events::EventBus;
use crate::protocol::{GameEvent, LedgerSnapshot, RateKind};

/// Round to the nearest integer, ties to even (`112.5` is `112`).
pub fn round_amount(value: f64) -> u64 {
    value.round_ties_even().max(0.0) as u64
}

/// Apply a compounding rate to an integer amount.
pub fn scaled(amount: u64, rate: f64) -> u64 {
    round_amount(amount as f64 * rate)
}

/// The single source of truth for corn, eggs, coins and the four rate
/// multipliers.
///
/// Every decrement checks sufficiency and mutates in the same call, so holding
/// `&mut ResourceLedger` is all the serialization the tick loop needs.
#[derive(Debug)]
pub struct ResourceLedger {
    corn: u64,
    eggs: u64,
    coins: u64,
    agent_count: u64,
    corn_rate: f64,
    egg_rate: f64,
    price_rate: f64,
    speed_rate: f64,
    base_sell_price: u64,
    events: EventBus,
}

impl ResourceLedger {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            corn: config.starting_corn,
            eggs: config.starting_eggs,
            coins: config.starting_coins,
            agent_count: 0,
            corn_rate: 1.0,
            egg_rate: 1.0,
            price_rate: 1.0,
            speed_rate: 1.0,
            base_sell_price: config.base_sell_price,
            events: EventBus::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn corn(&self) -> u64 {
        self.corn
    }

    pub fn eggs(&self) -> u64 {
        self.eggs
    }

    pub fn coins(&self) -> u64 {
        self.coins
    }

    pub fn agent_count(&self) -> u64 {
        self.agent_count
    }

    pub fn rate(&self, kind: RateKind) -> f64 {
        match kind {
            RateKind::Corn => self.corn_rate,
            RateKind::Egg => self.egg_rate,
            RateKind::Price => self.price_rate,
            RateKind::Speed => self.speed_rate,
        }
    }

    pub fn speed_rate(&self) -> f64 {
        self.speed_rate
    }

    /// Coins credited by the next egg sale.
    pub fn sell_price(&self) -> u64 {
        scaled(self.base_sell_price, self.price_rate)
    }

    pub fn can_afford(&self, amount: u64) -> bool {
        self.coins >= amount
    }

    pub fn hire_cost(&self, base_cost: u64, increment: u64) -> u64 {
        base_cost + self.agent_count * increment
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    // ── Corn ─────────────────────────────────────────────────────────

    /// Adds `round(n * cornRate)` corn. Returns the amount actually added.
    pub fn add_corn(&mut self, n: u64) -> u64 {
        let actual = scaled(n, self.corn_rate);
        self.corn += actual;
        self.events.emit(GameEvent::CornChanged(self.corn));
        actual
    }

    pub fn use_corn(&mut self, n: u64) -> bool {
        if self.corn < n {
            return false;
        }
        self.corn -= n;
        self.events.emit(GameEvent::CornChanged(self.corn));
        true
    }

    // ── Eggs ─────────────────────────────────────────────────────────

    /// Adds `round(n * eggRate)` eggs. Returns the amount actually added.
    pub fn add_egg(&mut self, n: u64) -> u64 {
        let actual = scaled(n, self.egg_rate);
        self.eggs += actual;
        self.events.emit(GameEvent::EggsChanged(self.eggs));
        actual
    }

    pub fn sell_one_egg(&mut self) -> bool {
        if self.eggs == 0 {
            return false;
        }
        self.eggs -= 1;
        self.events.emit(GameEvent::EggsChanged(self.eggs));

        let price = self.sell_price();
        self.add_coins(price);
        true
    }

    // ── Coins ────────────────────────────────────────────────────────

    pub fn add_coins(&mut self, n: u64) {
        self.coins += n;
        self.events.emit(GameEvent::CoinsChanged(self.coins));
    }

    pub fn spend_coins(&mut self, n: u64) -> bool {
        if self.coins < n {
            return false;
        }
        self.coins -= n;
        self.events.emit(GameEvent::CoinsChanged(self.coins));
        true
    }

    // ── Agents ───────────────────────────────────────────────────────

    /// Pays `base_cost + agentCount * increment` and bumps the agent count.
    pub fn hire_agent(&mut self, base_cost: u64, increment: u64) -> bool {
        let cost = self.hire_cost(base_cost, increment);
        if !self.spend_coins(cost) {
            debug!(cost, coins = self.coins, "hire refused");
            return false;
        }
        self.agent_count += 1;
        self.events
            .emit(GameEvent::AgentCountChanged(self.agent_count));
        true
    }

    // ── Rates ────────────────────────────────────────────────────────

    /// Compounds the matching rate by `factor`. Non-positive factors are
    /// ignored so every rate stays strictly positive.
    pub fn apply_rate_multiplier(&mut self, kind: RateKind, factor: f64) {
        if !(factor > 0.0) {
            debug!(?kind, factor, "ignoring non-positive rate factor");
            return;
        }
        let rate = match kind {
            RateKind::Corn => &mut self.corn_rate,
            RateKind::Egg => &mut self.egg_rate,
            RateKind::Price => &mut self.price_rate,
            RateKind::Speed => &mut self.speed_rate,
        };
        *rate *= factor;
    }

    // ── Snapshot / reset ─────────────────────────────────────────────

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            corn: self.corn,
            eggs: self.eggs,
            coins: self.coins,
            agent_count: self.agent_count,
            corn_rate: self.corn_rate,
            egg_rate: self.egg_rate,
            price_rate: self.price_rate,
            speed_rate: self.speed_rate,
        }
    }

    /// Replace every balance and rate with a persisted snapshot.
    pub fn restore(&mut self, snapshot: &LedgerSnapshot) {
        self.corn = snapshot.corn;
        self.eggs = snapshot.eggs;
        self.coins = snapshot.coins;
        self.agent_count = snapshot.agent_count;
        self.corn_rate = positive_or_one(snapshot.corn_rate);
        self.egg_rate = positive_or_one(snapshot.egg_rate);
        self.price_rate = positive_or_one(snapshot.price_rate);
        self.speed_rate = positive_or_one(snapshot.speed_rate);
        self.emit_all();
    }

    /// Restore starting balances, zero agents and all rates to 1.0.
    pub fn reset(&mut self, config: &GameConfig) {
        self.corn = config.starting_corn;
        self.eggs = config.starting_eggs;
        self.coins = config.starting_coins;
        self.agent_count = 0;
        self.corn_rate = 1.0;
        self.egg_rate = 1.0;
        self.price_rate = 1.0;
        self.speed_rate = 1.0;
        self.base_sell_price = config.base_sell_price;
        self.emit_all();
    }

    fn emit_all(&mut self) {
        self.events.emit(GameEvent::CornChanged(self.corn));
        self.events.emit(GameEvent::EggsChanged(self.eggs));
        self.events.emit(GameEvent::CoinsChanged(self.coins));
        self.events
            .emit(GameEvent::AgentCountChanged(self.agent_count));
    }
}

fn positive_or_one(rate: f64) -> f64 {
    if rate.is_finite() && rate > 0.0 {
        rate
    } else {
        1.0
    }
}
