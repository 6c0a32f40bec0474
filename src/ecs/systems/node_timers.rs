use crate::ecs::components::GameState;

/// Advances every production node's Busy/Cooldown timer for a single tick.
///
/// Runs before any actor acts, so a node whose cooldown expires this tick is
/// Ready for the player and workers in the same tick.
pub fn node_timer_system(state: &mut GameState, dt: f32) {
    state.nodes.advance_all(dt, &mut state.ledger);
}
