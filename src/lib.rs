pub mod config;
pub mod ecs;
pub mod game;
pub mod network;
pub mod persistence;
pub mod protocol;
pub mod sim;

pub use config::GameConfig;
pub use sim::Simulation;
