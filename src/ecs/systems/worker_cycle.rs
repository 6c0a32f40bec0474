use hecs::World;
use tracing::debug;

use crate::ecs::components::{GameState, Position, Worker, WorkerTask};
use crate::protocol::{NodeId, NodeKind, NodeStateKind, Vec2, WorkerTaskKind};

/// Runs the worker agent cycle for a single tick.
///
/// Each worker walks field → producer → market and back, doing one step of
/// its cycle per tick. Timed steps count down in game time scaled by the
/// ledger's speed rate. A step whose node refuses the interaction stays put
/// and retries next tick; workers never skip or abandon a step.
pub fn worker_cycle_system(world: &mut World, state: &mut GameState, dt: f32) {
    let speed_rate = state.ledger.speed_rate() as f32;
    let step_dt = dt * speed_rate;
    let move_step = state.config.agent_speed * step_dt;

    let (Some(field), Some(producer), Some(market)) = (
        state.nodes.first_of_kind(NodeKind::Field),
        state.nodes.first_of_kind(NodeKind::Producer),
        state.nodes.first_of_kind(NodeKind::Market),
    ) else {
        return;
    };
    let position_of = |id| {
        state
            .nodes
            .get(id)
            .map(|n| n.position())
            .unwrap_or_default()
    };
    let (field_pos, producer_pos, market_pos): (Vec2, Vec2, Vec2) =
        (position_of(field), position_of(producer), position_of(market));

    let timings = state.config.worker_timings.clone();
    let wait_time = state.config.agent_wait_time;

    for (_entity, (worker, task, pos)) in
        world.query_mut::<(&mut Worker, &mut WorkerTask, &mut Position)>()
    {
        let next = match task.kind {
            WorkerTaskKind::Idle => countdown(task, step_dt).then_some((
                WorkerTaskKind::MovingToField,
                0.0,
            )),

            WorkerTaskKind::MovingToField => pos
                .0
                .step_toward(field_pos, move_step)
                .then_some((WorkerTaskKind::Harvesting, timings.harvest)),

            WorkerTaskKind::Harvesting => {
                if countdown(task, step_dt)
                    && state.nodes.interact(field, &mut state.ledger).is_accepted()
                {
                    Some((WorkerTaskKind::MovingToProducer, 0.0))
                } else {
                    None
                }
            }

            WorkerTaskKind::MovingToProducer => pos
                .0
                .step_toward(producer_pos, move_step)
                .then_some((WorkerTaskKind::Feeding, timings.feed)),

            WorkerTaskKind::Feeding => {
                if countdown(task, step_dt)
                    && state
                        .nodes
                        .interact(producer, &mut state.ledger)
                        .is_accepted()
                {
                    Some((WorkerTaskKind::Collecting, timings.collect))
                } else {
                    None
                }
            }

            WorkerTaskKind::Collecting => {
                if countdown(task, step_dt) {
                    collect_or_wait(state, producer)
                } else {
                    None
                }
            }

            WorkerTaskKind::MovingToMarket => pos
                .0
                .step_toward(market_pos, move_step)
                .then_some((WorkerTaskKind::Selling, timings.sell)),

            WorkerTaskKind::Selling => {
                if countdown(task, step_dt)
                    && state.nodes.interact(market, &mut state.ledger).is_accepted()
                {
                    worker.cycles_completed += 1;
                    Some((WorkerTaskKind::Waiting, wait_time))
                } else {
                    None
                }
            }

            WorkerTaskKind::Waiting => countdown(task, step_dt)
                .then_some((WorkerTaskKind::MovingToField, 0.0)),
        };

        if let Some((kind, timer)) = next {
            debug!(worker = worker.id, from = ?task.kind, to = ?kind, "worker step");
            task.kind = kind;
            task.timer = timer;
        }
    }
}

/// Counts a timed step down. Returns `true` once the step's time is used up.
fn countdown(task: &mut WorkerTask, step_dt: f32) -> bool {
    if task.timer > 0.0 {
        task.timer -= step_dt;
    }
    task.timer <= 0.0
}

/// Takes the producer's laid eggs if there are any. While the producer is
/// still Busy an egg is on its way, so the worker keeps waiting; otherwise
/// it moves on empty-handed.
fn collect_or_wait(state: &mut GameState, producer: NodeId) -> Option<(WorkerTaskKind, f32)> {
    let node = state.nodes.get_mut(producer)?;
    if node.uncollected() > 0 {
        node.collect(&mut state.ledger);
        return Some((WorkerTaskKind::MovingToMarket, 0.0));
    }
    if node.state() == NodeStateKind::Busy {
        return None;
    }
    Some((WorkerTaskKind::MovingToMarket, 0.0))
}
