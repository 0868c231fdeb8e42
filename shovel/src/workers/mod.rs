//! The replication worker and the two pumps it runs.
//!
//! The source pump reads the source, validates, maps and forwards what it reads to the
//! destination. The destination pump reads what the destination emits back. Both share the
//! [`crate::tracker::MessageTracker`] and a stop signal, and the worker turns whatever they
//! observed into a single [`crate::types::ReplicationOutput`].

mod destination_pump;
mod failure;
mod output;
pub mod replication;
mod source_pump;

use tracing::{debug, error, info, trace, warn};

use crate::types::{LogLevel, LogMessage};

pub use replication::{ReplicationWorker, WorkerPhase};

/// Relays a connector log line through `tracing` at the matching level.
fn relay_connector_log(side: &'static str, log: &LogMessage) {
    let text = log.message.as_str();
    match log.level {
        LogLevel::Fatal | LogLevel::Error => error!(side, text, "connector log"),
        LogLevel::Warn => warn!(side, text, "connector log"),
        LogLevel::Info => info!(side, text, "connector log"),
        LogLevel::Debug => debug!(side, text, "connector log"),
        LogLevel::Trace => trace!(side, text, "connector log"),
    }
}
