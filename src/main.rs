use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tokio::signal;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use coop_server::network::server::GameServer;
use coop_server::persistence::{JsonFileStore, KeyValueStore};
use coop_server::protocol::{PlayerAction, ServerMessage};
use coop_server::{GameConfig, Simulation};

fn config_path() -> Option<PathBuf> {
    std::env::var_os("COOP_CONFIG").map(PathBuf::from)
}

fn save_path() -> PathBuf {
    std::env::var_os("COOP_SAVE")
        .map(PathBuf::from)
        .or_else(|| dirs::data_dir().map(|d| d.join("coop-server").join("save.json")))
        .unwrap_or_else(|| PathBuf::from("save.json"))
}

fn save<S: KeyValueStore>(sim: &Simulation, store: &mut S) {
    if let Err(e) = sim.save(store) {
        warn!("Failed to save game: {}", e);
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let mut config = match config_path() {
        Some(path) => GameConfig::load_from_file(&path),
        None => GameConfig::default(),
    };
    if let Ok(bind) = std::env::var("COOP_BIND") {
        config.bind_addr = bind;
    }
    let tick_rate = config.tick_rate_hz.max(1);
    let bind_addr = config.bind_addr.clone();

    let mut store = JsonFileStore::open_or_empty(save_path());
    let mut sim = Simulation::new(config);
    sim.restore(&store);

    let mut server = match GameServer::start(&bind_addr).await {
        Ok(server) => Some(server),
        Err(e) => {
            warn!("Failed to bind {}: {}. Running headless.", bind_addr, e);
            None
        }
    };

    let dt = 1.0 / tick_rate as f32;
    info!("Simulation running at {} Hz", tick_rate);

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutting down...");
    };
    run_game_loop(&mut sim, server.as_mut(), &mut store, dt, shutdown).await;

    save(&sim, &mut store);
}

/// Ticks the simulation every `dt` seconds until `shutdown` completes.
/// Returns the number of ticks run.
///
/// `shutdown` is created once and polled across every iteration, so a signal
/// that lands while a tick is being processed still ends the loop.
async fn run_game_loop<S, F>(
    sim: &mut Simulation,
    mut server: Option<&mut GameServer>,
    store: &mut S,
    dt: f32,
    shutdown: F,
) -> u64
where
    S: KeyValueStore,
    F: Future<Output = ()>,
{
    let mut ticker = interval(Duration::from_secs_f32(dt));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);
    let mut ticks = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => break,
        }

        let mut refused = Vec::new();
        if let Some(server) = server.as_deref_mut() {
            while let Ok(input) = server.input_rx.try_recv() {
                let Some(action) = input.action else {
                    continue;
                };
                if !sim.apply_action(&action) {
                    refused.push(action);
                } else if matches!(action, PlayerAction::Save) {
                    save(sim, store);
                }
            }
        }

        sim.tick(dt);
        ticks += 1;
        let update = sim.state_update();

        if let Some(server) = server.as_deref_mut() {
            for action in refused {
                server.send_message(&ServerMessage::ActionRefused { action });
            }
            server.send_state(&update);
        }
    }

    ticks
}
