pub mod dispatcher;
pub mod node_timers;
pub mod worker_cycle;
