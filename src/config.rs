use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::protocol::{Color, UpgradeKind, Vec2};

/// Timing and placement for one production node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub position: Vec2,
    /// Seconds spent Busy after an accepted interaction.
    pub busy: f32,
    /// Seconds spent in Cooldown after Busy ends.
    pub cooldown: f32,
}

/// Static definition of one purchasable upgrade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeConfig {
    pub kind: UpgradeKind,
    pub name: String,
    pub base_cost: u64,
    pub cost_growth: f64,
    /// 0 = unlimited.
    pub max_level: u32,
    pub effect_multiplier: f64,
    pub flat_bonus: u64,
}

/// Per-step work times for worker agents, in seconds at speed rate 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerTimings {
    pub harvest: f32,
    pub feed: f32,
    pub collect: f32,
    pub sell: f32,
    pub initial_delay_min: f32,
    pub initial_delay_max: f32,
}

impl Default for WorkerTimings {
    fn default() -> Self {
        Self {
            harvest: 0.5,
            feed: 0.5,
            collect: 0.3,
            sell: 0.3,
            initial_delay_min: 0.5,
            initial_delay_max: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub corn: Color,
    pub egg: Color,
    pub coin: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            corn: Color::rgb(1.0, 0.9, 0.3),
            egg: Color::rgb(1.0, 0.98, 0.9),
            coin: Color::rgb(1.0, 0.85, 0.2),
        }
    }
}

/// Startup configuration. Every field has a default, so a partial JSON file
/// only overrides what it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    // Starting resources
    pub starting_corn: u64,
    pub starting_eggs: u64,
    pub starting_coins: u64,

    // Production
    pub corn_per_harvest: u64,
    pub feed_cost: u64,
    pub yield_per_feed: u64,
    pub eggs_per_sale: u64,
    pub field: NodeConfig,
    pub producer: NodeConfig,
    pub market: NodeConfig,

    // Economy
    pub base_sell_price: u64,
    pub helper_base_cost: u64,
    pub helper_cost_increment: u64,

    // Workers
    pub agent_speed: f32,
    pub agent_wait_time: f32,
    pub agent_spawn: Vec2,
    pub worker_timings: WorkerTimings,

    // Player
    pub player_start: Vec2,
    pub player_speed: f32,
    /// Max distance between a tap and a node for the node to be targeted.
    pub pick_radius: f32,

    pub upgrades: Vec<UpgradeConfig>,
    pub palette: Palette,

    /// Fixed seed for worker start delays. `None` seeds from entropy.
    pub rng_seed: Option<u64>,
    pub tick_rate_hz: u32,
    pub bind_addr: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            starting_corn: 0,
            starting_eggs: 0,
            starting_coins: 50,
            corn_per_harvest: 1,
            feed_cost: 1,
            yield_per_feed: 1,
            eggs_per_sale: 1,
            field: NodeConfig {
                position: Vec2::new(-4.0, 0.0),
                busy: 0.0,
                cooldown: 2.0,
            },
            producer: NodeConfig {
                position: Vec2::new(0.0, 2.0),
                busy: 1.5,
                cooldown: 0.5,
            },
            market: NodeConfig {
                position: Vec2::new(4.0, 0.0),
                busy: 0.0,
                cooldown: 0.5,
            },
            base_sell_price: 10,
            helper_base_cost: 100,
            helper_cost_increment: 50,
            agent_speed: 3.0,
            agent_wait_time: 0.5,
            agent_spawn: Vec2::new(0.0, -3.0),
            worker_timings: WorkerTimings::default(),
            player_start: Vec2::new(0.0, 0.0),
            player_speed: 5.0,
            pick_radius: 1.5,
            upgrades: default_upgrades(),
            palette: Palette::default(),
            rng_seed: None,
            tick_rate_hz: 20,
            bind_addr: "127.0.0.1:9001".to_string(),
        }
    }
}

/// The stock upgrade catalogue, one entry per [`UpgradeKind`].
pub fn default_upgrades() -> Vec<UpgradeConfig> {
    let upgrade = |kind, name: &str, base_cost, max_level, effect_multiplier, flat_bonus| {
        UpgradeConfig {
            kind,
            name: name.to_string(),
            base_cost,
            cost_growth: 1.5,
            max_level,
            effect_multiplier,
            flat_bonus,
        }
    };

    vec![
        upgrade(UpgradeKind::CornYield, "Better Seeds", 50, 5, 1.2, 0),
        upgrade(UpgradeKind::EggYield, "Happy Hens", 75, 5, 1.2, 0),
        upgrade(UpgradeKind::SellPrice, "Market Stall", 100, 5, 1.2, 0),
        upgrade(UpgradeKind::Speed, "Quick Boots", 120, 5, 1.15, 0),
        upgrade(UpgradeKind::Capacity, "Bigger Baskets", 150, 3, 1.0, 1),
    ]
}

impl GameConfig {
    /// Load the config from a JSON file on disk.
    /// Falls back to the default balance if the file is missing or malformed.
    pub fn load_from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<GameConfig>(&contents) {
                Ok(config) => {
                    info!(
                        "Loaded game config from {} ({} upgrades)",
                        path.display(),
                        config.upgrades.len()
                    );
                    config
                }
                Err(e) => {
                    warn!(
                        "Failed to parse game config at {}: {}. Using defaults.",
                        path.display(),
                        e
                    );
                    GameConfig::default()
                }
            },
            Err(e) => {
                warn!(
                    "Failed to read game config at {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                GameConfig::default()
            }
        }
    }
}
