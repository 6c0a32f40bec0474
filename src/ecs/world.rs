use hecs::World;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::GameConfig;
use crate::game::ledger::ResourceLedger;
use crate::game::nodes::NodeRegistry;
use crate::game::upgrades::UpgradeRegistry;

use super::components::{GameState, Player, PlayerIntent, Position};

/// Creates a new ECS world pre-populated with the player avatar, along with
/// the initial `GameState` built from `config`.
pub fn create_world(config: GameConfig) -> (World, GameState) {
    let mut world = World::new();

    // ── Spawn the Player entity ──────────────────────────────────────
    world.spawn((
        Player,
        Position(config.player_start),
        PlayerIntent::default(),
    ));

    // ── Initial GameState ────────────────────────────────────────────
    let rng = match config.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let game_state = GameState {
        tick: 0,
        ledger: ResourceLedger::new(&config),
        nodes: NodeRegistry::from_config(&config),
        upgrades: UpgradeRegistry::new(&config.upgrades),
        rng,
        next_worker_id: 0,
        config,
    };

    (world, game_state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_starts_with_one_player_and_three_nodes() {
        let (world, state) = create_world(GameConfig::default());
        assert_eq!(world.query::<&Player>().iter().count(), 1);
        assert_eq!(state.nodes.len(), 3);
        assert_eq!(state.ledger.coins(), 50);
        assert_eq!(state.tick, 0);
    }
}
