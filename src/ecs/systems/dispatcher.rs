use hecs::World;
use tracing::debug;

use crate::ecs::components::{GameState, Player, PlayerIntent, Position};
use crate::game::nodes::InteractOutcome;
use crate::protocol::{NodeId, NodeKind, PlayerView, Vec2};

/// Handles a tap at `point` for the player avatar.
///
/// The nearest node within the pick radius becomes the pending target and
/// the avatar heads for it. Any earlier pending move and interaction is
/// dropped outright. A tap on empty ground only moves the avatar. Returns the
/// targeted node, if any.
pub fn handle_tap(world: &mut World, state: &GameState, point: Vec2) -> Option<NodeId> {
    let target = state.nodes.nearest(point, state.config.pick_radius);
    let destination = target
        .and_then(|id| state.nodes.get(id))
        .map(|n| n.position())
        .unwrap_or(point);

    for (_entity, intent) in world.query_mut::<hecs::With<&mut PlayerIntent, &Player>>() {
        if let Some(previous) = intent.target {
            if intent.target != target {
                debug!(previous, ?target, "pending interaction cancelled");
            }
        }
        intent.target = target;
        intent.destination = Some(destination);
    }
    target
}

/// Moves the player avatar for a single tick and fires its pending
/// interaction on arrival.
///
/// Arriving at a producer first collects any laid eggs. The interaction
/// runs exactly once, then the target is cleared.
pub fn dispatcher_system(
    world: &mut World,
    state: &mut GameState,
    dt: f32,
) -> Option<InteractOutcome> {
    let step = state.config.player_speed * dt * state.ledger.speed_rate() as f32;
    let mut outcome = None;

    for (_entity, (pos, intent)) in
        world.query_mut::<hecs::With<(&mut Position, &mut PlayerIntent), &Player>>()
    {
        let Some(destination) = intent.destination else {
            continue;
        };
        if !pos.0.step_toward(destination, step) {
            continue;
        }
        intent.destination = None;

        let Some(target) = intent.target.take() else {
            continue;
        };
        if let Some(node) = state.nodes.get_mut(target) {
            if node.kind() == NodeKind::Producer {
                node.collect(&mut state.ledger);
            }
        }
        let result = state.nodes.interact(target, &mut state.ledger);
        debug!(node = target, ?result, "player interaction");
        outcome = Some(result);
    }

    outcome
}

pub fn player_view(world: &World) -> Option<PlayerView> {
    world
        .query::<hecs::With<(&Position, &PlayerIntent), &Player>>()
        .iter()
        .next()
        .map(|(_, (pos, intent))| PlayerView {
            position: pos.0,
            destination: intent.destination,
            pending_target: intent.target,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::ecs::world::create_world;

    const DT: f32 = 0.05;

    fn run_until_idle(world: &mut World, state: &mut GameState) -> Option<InteractOutcome> {
        for _ in 0..400 {
            if let Some(outcome) = dispatcher_system(world, state, DT) {
                return Some(outcome);
            }
            if player_view(world).unwrap().destination.is_none() {
                return None;
            }
        }
        None
    }

    #[test]
    fn tap_on_field_walks_there_and_harvests_once() {
        let (mut world, mut state) = create_world(GameConfig::default());
        let field = state.nodes.first_of_kind(NodeKind::Field).unwrap();
        let field_pos = state.nodes.get(field).unwrap().position();

        assert_eq!(handle_tap(&mut world, &state, field_pos), Some(field));
        let outcome = run_until_idle(&mut world, &mut state);
        assert_eq!(outcome, Some(InteractOutcome::Accepted));
        assert_eq!(state.ledger.corn(), 1);

        let view = player_view(&world).unwrap();
        assert_eq!(view.position, field_pos);
        assert_eq!(view.pending_target, None);

        // Nothing left pending: more ticks do nothing.
        for _ in 0..10 {
            assert!(dispatcher_system(&mut world, &mut state, DT).is_none());
        }
        assert_eq!(state.ledger.corn(), 1);
    }

    #[test]
    fn new_tap_cancels_pending_interaction() {
        let (mut world, mut state) = create_world(GameConfig {
            starting_eggs: 1,
            ..GameConfig::default()
        });
        let field = state.nodes.first_of_kind(NodeKind::Field).unwrap();
        let market = state.nodes.first_of_kind(NodeKind::Market).unwrap();
        let field_pos = state.nodes.get(field).unwrap().position();
        let market_pos = state.nodes.get(market).unwrap().position();

        handle_tap(&mut world, &state, field_pos);
        dispatcher_system(&mut world, &mut state, DT);
        handle_tap(&mut world, &state, market_pos);

        let outcome = run_until_idle(&mut world, &mut state);
        assert_eq!(outcome, Some(InteractOutcome::Accepted));
        // The field was never harvested; the egg was sold.
        assert_eq!(state.ledger.corn(), 0);
        assert_eq!(state.ledger.eggs(), 0);
        assert_eq!(state.ledger.coins(), 60);
    }

    #[test]
    fn tap_on_empty_ground_drops_target() {
        let (mut world, mut state) = create_world(GameConfig::default());
        let field = state.nodes.first_of_kind(NodeKind::Field).unwrap();
        let field_pos = state.nodes.get(field).unwrap().position();

        handle_tap(&mut world, &state, field_pos);
        assert_eq!(handle_tap(&mut world, &state, Vec2::new(0.0, -10.0)), None);
        assert_eq!(run_until_idle(&mut world, &mut state), None);
        assert_eq!(state.ledger.corn(), 0);
        assert_eq!(player_view(&world).unwrap().position, Vec2::new(0.0, -10.0));
    }

    #[test]
    fn arriving_at_producer_collects_laid_eggs() {
        let (mut world, mut state) = create_world(GameConfig {
            starting_corn: 2,
            ..GameConfig::default()
        });
        let producer = state.nodes.first_of_kind(NodeKind::Producer).unwrap();
        let producer_pos = state.nodes.get(producer).unwrap().position();
        assert!(state.nodes.interact(producer, &mut state.ledger).is_accepted());
        state.nodes.advance_all(5.0, &mut state.ledger);
        state.nodes.advance_all(5.0, &mut state.ledger);

        handle_tap(&mut world, &state, producer_pos);
        let outcome = run_until_idle(&mut world, &mut state);
        assert_eq!(outcome, Some(InteractOutcome::Accepted));
        assert_eq!(state.ledger.eggs(), 1);
        assert_eq!(state.ledger.corn(), 0);
    }
}
