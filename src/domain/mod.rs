pub mod container_store;
pub mod error;
pub mod host_probe;
pub mod inventory;
pub mod snapshot;
pub mod snapshot_builder;
pub mod sources;
pub mod tally;
pub mod versions;
