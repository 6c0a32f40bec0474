pub mod agents;
pub mod events;
pub mod ledger;
pub mod nodes;
pub mod upgrades;
