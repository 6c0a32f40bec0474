use rand::rngs::StdRng;

use crate::config::GameConfig;
use crate::game::ledger::ResourceLedger;
use crate::game::nodes::NodeRegistry;
use crate::game::upgrades::UpgradeRegistry;
use crate::protocol::{EntityId, NodeId, Tick, Vec2, WorkerTaskKind};

// ── Marker Components ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Player;

// ── Spatial ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct Position(pub Vec2);

// ── Player Components ────────────────────────────────────────────────

/// The single pending move/interaction of the player avatar.
#[derive(Debug, Clone, Default)]
pub struct PlayerIntent {
    pub destination: Option<Vec2>,
    pub target: Option<NodeId>,
}

// ── Worker Components ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Worker {
    pub id: EntityId,
    pub cycles_completed: u64,
}

/// Current step of a worker's production cycle. `timer` is the game time
/// left in a timed step (start delay, work, wait) and is ignored while
/// moving.
#[derive(Debug, Clone)]
pub struct WorkerTask {
    pub kind: WorkerTaskKind,
    pub timer: f32,
}

// ── World State (plain structs, not ECS entities) ────────────────────

/// Everything the tick loop shares: one instance per session, passed by
/// reference to every system.
pub struct GameState {
    pub tick: Tick,
    pub config: GameConfig,
    pub ledger: ResourceLedger,
    pub nodes: NodeRegistry,
    pub upgrades: UpgradeRegistry,
    pub rng: StdRng,
    pub next_worker_id: EntityId,
}
