use hecs::World;
use rand::Rng;
use tracing::info;

use crate::ecs::components::{GameState, Position, Worker, WorkerTask};
use crate::protocol::{WorkerTaskKind, WorkerView};

/// Returns the coin cost of the next hire.
pub fn hire_cost(state: &GameState) -> u64 {
    state
        .ledger
        .hire_cost(state.config.helper_base_cost, state.config.helper_cost_increment)
}

/// Hire a new worker agent.
///
/// Pays `helperBaseCost + agentCount * helperCostIncrement` from the ledger,
/// then spawns the worker at the configured spawn point.
///
/// # Errors
///
/// Returns an error string if the ledger cannot cover the hire cost.
pub fn hire_agent(world: &mut World, state: &mut GameState) -> Result<hecs::Entity, String> {
    let cost = hire_cost(state);
    let base = state.config.helper_base_cost;
    let increment = state.config.helper_cost_increment;

    if !state.ledger.hire_agent(base, increment) {
        return Err(format!(
            "Insufficient coins: need {} but only have {}",
            cost,
            state.ledger.coins()
        ));
    }

    let entity = spawn_worker(world, state);
    info!(
        "Hired worker for {} coins ({} total)",
        cost,
        state.ledger.agent_count()
    );
    Ok(entity)
}

/// Spawn a worker without charging for it (restoring a saved agent count).
///
/// Each worker waits a random start delay before its first cycle so a batch
/// of hires does not move in lockstep.
pub fn spawn_worker(world: &mut World, state: &mut GameState) -> hecs::Entity {
    let timings = &state.config.worker_timings;
    let min = timings.initial_delay_min.max(0.0);
    let max = timings.initial_delay_max.max(min);
    let delay = if max > min {
        state.rng.gen_range(min..=max)
    } else {
        min
    };

    let id = state.next_worker_id;
    state.next_worker_id += 1;

    world.spawn((
        Worker {
            id,
            cycles_completed: 0,
        },
        WorkerTask {
            kind: WorkerTaskKind::Idle,
            timer: delay,
        },
        Position(state.config.agent_spawn),
    ))
}

/// Remove every worker entity. Used only by reset-progress.
pub fn despawn_all_workers(world: &mut World) -> usize {
    let workers: Vec<hecs::Entity> = world
        .query::<&Worker>()
        .iter()
        .map(|(entity, _)| entity)
        .collect();
    let count = workers.len();
    for entity in workers {
        let _ = world.despawn(entity);
    }
    count
}

pub fn worker_views(world: &World) -> Vec<WorkerView> {
    let mut views: Vec<WorkerView> = world
        .query::<(&Worker, &WorkerTask, &Position)>()
        .iter()
        .map(|(_, (worker, task, pos))| WorkerView {
            id: worker.id,
            task: task.kind,
            position: pos.0,
            cycles_completed: worker.cycles_completed,
        })
        .collect();
    views.sort_by_key(|v| v.id);
    views
}
