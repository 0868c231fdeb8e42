//! Shared configuration types for shovel services.

mod base;
mod replicator;
mod worker;

pub use base::ValidationError;
pub use replicator::{JobConfig, ReplicatorConfig, SyncConfig};
pub use worker::{TrackerConfig, WorkerConfig};
