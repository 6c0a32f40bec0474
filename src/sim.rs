//! The simulation context: one hecs world plus the shared [`GameState`],
//! advanced by a single [`Simulation::tick`] call per frame.

use hecs::World;
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::ecs::components::GameState;
use crate::ecs::systems::dispatcher::{dispatcher_system, handle_tap, player_view};
use crate::ecs::systems::node_timers::node_timer_system;
use crate::ecs::systems::worker_cycle::worker_cycle_system;
use crate::ecs::world::create_world;
use crate::game::agents;
use crate::game::events::SubscriptionId;
use crate::game::nodes::{InteractOutcome, ProductionNode};
use crate::persistence::{self, KeyValueStore, SavedGame, SnapshotError};
use crate::protocol::{
    GameEvent, GameStateUpdate, LedgerSnapshot, NodeId, NodeView, PlayerAction, PlayerView,
    Tick, UpgradeKind, UpgradeView, Vec2, WorkerView,
};

pub struct Simulation {
    pub world: World,
    pub state: GameState,
}

impl Simulation {
    pub fn new(config: GameConfig) -> Self {
        let (world, state) = create_world(config);
        Self { world, state }
    }

    /// Advance every node timer, the player dispatcher and all workers by
    /// `dt` seconds. Systems run one after another, so every ledger and node
    /// mutation inside a tick is serialized.
    ///
    /// Events emitted here are queued for [`Simulation::state_update`] or
    /// [`Simulation::drain_events`]. Callers that only subscribe can ignore
    /// the queue; it is capped at
    /// [`MAX_PENDING_EVENTS`](crate::game::events::MAX_PENDING_EVENTS).
    pub fn tick(&mut self, dt: f32) {
        self.state.tick += 1;
        node_timer_system(&mut self.state, dt);
        dispatcher_system(&mut self.world, &mut self.state, dt);
        worker_cycle_system(&mut self.world, &mut self.state, dt);
    }

    pub fn current_tick(&self) -> Tick {
        self.state.tick
    }

    // ── Player actions ───────────────────────────────────────────────

    /// Tap in world space; see [`handle_tap`].
    pub fn tap(&mut self, point: Vec2) -> Option<NodeId> {
        handle_tap(&mut self.world, &self.state, point)
    }

    /// Interact with a node directly, bypassing the avatar.
    pub fn interact(&mut self, node: NodeId) -> InteractOutcome {
        self.state.nodes.interact(node, &mut self.state.ledger)
    }

    pub fn hire_agent(&mut self) -> bool {
        match agents::hire_agent(&mut self.world, &mut self.state) {
            Ok(_) => true,
            Err(reason) => {
                debug!("Hire refused: {}", reason);
                false
            }
        }
    }

    /// Add a worker without paying for it.
    pub fn spawn_worker(&mut self) -> hecs::Entity {
        agents::spawn_worker(&mut self.world, &mut self.state)
    }

    pub fn purchase_upgrade(&mut self, kind: UpgradeKind) -> bool {
        let state = &mut self.state;
        state
            .upgrades
            .purchase(kind, &mut state.ledger, &mut state.nodes)
    }

    /// Wipe the session back to the starting configuration: balances, rates,
    /// upgrade levels, node outputs and workers.
    pub fn reset_progress(&mut self) {
        let removed = agents::despawn_all_workers(&mut self.world);
        let state = &mut self.state;
        state.ledger.reset(&state.config);
        state.upgrades.reset();
        state.nodes.reset();
        info!("Progress reset ({} workers removed)", removed);
    }

    /// Apply one decoded client action. Returns `false` if it was refused.
    pub fn apply_action(&mut self, action: &PlayerAction) -> bool {
        match action {
            PlayerAction::Tap { x, y } => {
                self.tap(Vec2::new(*x, *y));
                true
            }
            PlayerAction::HireAgent => self.hire_agent(),
            PlayerAction::PurchaseUpgrade { kind } => self.purchase_upgrade(*kind),
            PlayerAction::ResetProgress => {
                self.reset_progress();
                true
            }
            // Saving needs the store, which the caller owns.
            PlayerAction::Save => true,
        }
    }

    // ── Events ───────────────────────────────────────────────────────

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) + Send + 'static,
    {
        self.state.ledger.events_mut().subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.state.ledger.events_mut().unsubscribe(id)
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.state.ledger.events_mut().drain()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn ledger(&self) -> LedgerSnapshot {
        self.state.ledger.snapshot()
    }

    pub fn sell_price(&self) -> u64 {
        self.state.ledger.sell_price()
    }

    pub fn hire_cost(&self) -> u64 {
        agents::hire_cost(&self.state)
    }

    pub fn node(&self, id: NodeId) -> Option<&ProductionNode> {
        self.state.nodes.get(id)
    }

    pub fn nodes(&self) -> Vec<NodeView> {
        self.state.nodes.views(&self.state.ledger)
    }

    pub fn upgrades(&self) -> Vec<UpgradeView> {
        self.state.upgrades.views(&self.state.ledger)
    }

    pub fn upgrade_cost(&self, kind: UpgradeKind) -> Option<u64> {
        self.state.upgrades.cost(kind)
    }

    pub fn can_purchase(&self, kind: UpgradeKind) -> bool {
        self.state.upgrades.can_purchase(kind, &self.state.ledger)
    }

    pub fn workers(&self) -> Vec<WorkerView> {
        agents::worker_views(&self.world)
    }

    pub fn player(&self) -> Option<PlayerView> {
        player_view(&self.world)
    }

    /// Full per-tick frame for clients. Drains pending events.
    pub fn state_update(&mut self) -> GameStateUpdate {
        let events = self.drain_events();
        GameStateUpdate {
            tick: self.state.tick,
            ledger: self.ledger(),
            sell_price: self.sell_price(),
            hire_cost: self.hire_cost(),
            nodes: self.nodes(),
            upgrades: self.upgrades(),
            workers: self.workers(),
            player: self.player().unwrap_or(PlayerView {
                position: self.state.config.player_start,
                destination: None,
                pending_target: None,
            }),
            events,
        }
    }

    // ── Persistence ──────────────────────────────────────────────────

    pub fn saved_game(&self) -> SavedGame {
        SavedGame {
            ledger: self.state.ledger.snapshot(),
            upgrade_levels: self
                .state
                .upgrades
                .iter()
                .map(|d| (d.kind, d.current_level))
                .collect(),
        }
    }

    pub fn save<S: KeyValueStore>(&self, store: &mut S) -> Result<(), SnapshotError> {
        persistence::save_game(store, &self.saved_game())
    }

    /// Restore from `store` if it holds a save. Returns `false` (and keeps
    /// the starting configuration) when there is none.
    ///
    /// The saved agent count respawns that many workers.
    pub fn restore<S: KeyValueStore>(&mut self, store: &S) -> bool {
        let Some(saved) = persistence::load_game(store) else {
            info!("No saved game; starting fresh");
            return false;
        };

        self.reset_progress();
        let state = &mut self.state;
        state.ledger.restore(&saved.ledger);
        for (kind, level) in &saved.upgrade_levels {
            state.upgrades.restore_level(*kind, *level, &mut state.nodes);
        }
        for _ in 0..saved.ledger.agent_count {
            agents::spawn_worker(&mut self.world, &mut self.state);
        }
        info!(
            "Restored save: {} coins, {} workers",
            saved.ledger.coins, saved.ledger.agent_count
        );
        true
    }
}
