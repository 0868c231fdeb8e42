//! Replication worker moving protocol messages from a source connector to a destination
//! connector.
//!
//! A [`workers::ReplicationWorker`] starts both connectors and runs two concurrent pumps: one
//! reads the source, validates and maps every record and forwards it to the destination, the
//! other reads the states and configuration updates the destination emits back. Whatever happens,
//! the attempt ends with a single [`types::ReplicationOutput`] carrying statistics, failures and
//! the checkpoint the next attempt resumes from.

pub mod concurrency;
pub mod config_updater;
pub mod destination;
pub mod error;
#[cfg(feature = "failpoints")]
pub mod failpoints;
mod macros;
pub mod mapper;
pub mod metrics;
pub mod schema;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod tracker;
pub mod types;
pub mod workers;
