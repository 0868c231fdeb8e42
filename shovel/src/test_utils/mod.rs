//! Utilities for testing replication workers without real connectors.
//!
//! Builders for messages, catalogs and inputs live in [`messages`] and [`catalog`]. The wrappers in
//! [`source`] and [`destination`] inject faults into any adapter and let tests wait for the
//! destination to reach a given state. [`config_updater`] records persisted configurations and [`worker`] assembles workers from
//! all of the above.

pub mod catalog;
pub mod config_updater;
pub mod destination;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod messages;
pub mod notify;
pub mod source;
pub mod worker;

/// How an injected fault manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultType {
    /// The operation returns an error.
    Error,
    /// The operation panics.
    Panic,
    /// The operation never completes.
    Hang,
}
