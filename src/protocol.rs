use serde::{Deserialize, Serialize};

// ── Core type aliases ──────────────────────────────────────────────

pub type EntityId = u64;
pub type Tick = u64;
pub type NodeId = usize;

// ── Geometry ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Moves `self` toward `target` by at most `step`. Returns `true` once
    /// the target has been reached (never overshoots).
    pub fn step_toward(&mut self, target: Vec2, step: f32) -> bool {
        let dist = self.distance(target);
        if dist <= step || dist <= f32::EPSILON {
            *self = target;
            return true;
        }
        let k = step / dist;
        self.x += (target.x - self.x) * k;
        self.y += (target.y - self.y) * k;
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

// ── Economy enums ──────────────────────────────────────────────────

/// The four compounding multipliers held by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateKind {
    Corn,
    Egg,
    Price,
    Speed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpgradeKind {
    CornYield,
    EggYield,
    SellPrice,
    Speed,
    Capacity,
}

impl UpgradeKind {
    pub const ALL: [UpgradeKind; 5] = [
        UpgradeKind::CornYield,
        UpgradeKind::EggYield,
        UpgradeKind::SellPrice,
        UpgradeKind::Speed,
        UpgradeKind::Capacity,
    ];

    /// Ledger rate this upgrade compounds, if any.
    pub fn rate(self) -> Option<RateKind> {
        match self {
            UpgradeKind::CornYield => Some(RateKind::Corn),
            UpgradeKind::EggYield => Some(RateKind::Egg),
            UpgradeKind::SellPrice => Some(RateKind::Price),
            UpgradeKind::Speed => Some(RateKind::Speed),
            UpgradeKind::Capacity => None,
        }
    }

    /// Node whose per-cycle output grows with this upgrade's flat bonus.
    pub fn bonus_node(self) -> Option<NodeKind> {
        match self {
            UpgradeKind::CornYield => Some(NodeKind::Field),
            UpgradeKind::EggYield => Some(NodeKind::Producer),
            UpgradeKind::Capacity => Some(NodeKind::Market),
            UpgradeKind::SellPrice | UpgradeKind::Speed => None,
        }
    }
}

// ── Production nodes ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Field,
    Producer,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStateKind {
    Ready,
    Busy,
    Cooldown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeView {
    pub id: NodeId,
    pub kind: NodeKind,
    pub state: NodeStateKind,
    pub position: Vec2,
    pub busy_remaining: f32,
    pub cooldown_remaining: f32,
    pub output_amount: u64,
    pub uncollected: u64,
    pub can_interact: bool,
}

// ── Workers ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerTaskKind {
    Idle,
    MovingToField,
    Harvesting,
    MovingToProducer,
    Feeding,
    Collecting,
    MovingToMarket,
    Selling,
    Waiting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerView {
    pub id: EntityId,
    pub task: WorkerTaskKind,
    pub position: Vec2,
    pub cycles_completed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerView {
    pub position: Vec2,
    pub destination: Option<Vec2>,
    pub pending_target: Option<NodeId>,
}

// ── Outbound events ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    CornChanged(u64),
    EggsChanged(u64),
    CoinsChanged(u64),
    AgentCountChanged(u64),
    /// Presentation hint only ("+1 corn" floating over the field).
    ResourceGained {
        label: String,
        location: Vec2,
        color: Color,
    },
}

// ── Queries ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub corn: u64,
    pub eggs: u64,
    pub coins: u64,
    pub agent_count: u64,
    pub corn_rate: f64,
    pub egg_rate: f64,
    pub price_rate: f64,
    pub speed_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeView {
    pub kind: UpgradeKind,
    pub level: u32,
    pub max_level: u32,
    pub cost: u64,
    pub affordable: bool,
    pub maxed: bool,
}

// ── Main game state update (Server → Client) ──────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateUpdate {
    pub tick: Tick,
    pub ledger: LedgerSnapshot,
    pub sell_price: u64,
    pub hire_cost: u64,
    pub nodes: Vec<NodeView>,
    pub upgrades: Vec<UpgradeView>,
    pub workers: Vec<WorkerView>,
    pub player: PlayerView,
    pub events: Vec<GameEvent>,
}

// ── Client → Server messages ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlayerAction {
    /// Tap/click in world space. Targets the nearest node under the point.
    Tap { x: f32, y: f32 },
    HireAgent,
    PurchaseUpgrade { kind: UpgradeKind },
    ResetProgress,
    Save,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInput {
    pub tick: Tick,
    pub action: Option<PlayerAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Normal game state update (20Hz).
    GameState(GameStateUpdate),
    /// A player action was refused (insufficient coins, level cap, ...).
    ActionRefused { action: PlayerAction },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_toward_never_overshoots() {
        let mut p = Vec2::new(0.0, 0.0);
        let target = Vec2::new(3.0, 4.0);
        assert!(!p.step_toward(target, 2.5));
        assert!((p.distance(target) - 2.5).abs() < 1e-5);
        assert!(p.step_toward(target, 10.0));
        assert_eq!(p, target);
    }

    #[test]
    fn capacity_has_no_rate() {
        assert_eq!(UpgradeKind::Capacity.rate(), None);
        assert_eq!(UpgradeKind::Capacity.bonus_node(), Some(NodeKind::Market));
        assert_eq!(UpgradeKind::SellPrice.rate(), Some(RateKind::Price));
        assert_eq!(UpgradeKind::SellPrice.bonus_node(), None);
    }
}
