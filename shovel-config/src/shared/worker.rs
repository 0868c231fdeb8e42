use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

const fn default_idle_poll_interval_ms() -> u64 {
    10
}

const fn default_records_log_interval() -> u64 {
    1000
}

const fn default_max_validation_errors_per_stream() -> u32 {
    10
}

const fn default_state_delta_memory_limit_bytes() -> usize {
    10 * 1024 * 1024
}

// Roughly 20 MiB worth of pending (hash, timestamp) entries.
const fn default_state_metrics_message_limit() -> usize {
    873_813
}

/// Bounds for the bookkeeping structures of the message tracker.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TrackerConfig {
    /// Memory budget for per-state record count snapshots used to compute committed counts.
    #[serde(default = "default_state_delta_memory_limit_bytes")]
    pub state_delta_memory_limit_bytes: usize,
    /// Maximum number of source states waiting for a destination acknowledgment.
    #[serde(default = "default_state_metrics_message_limit")]
    pub state_metrics_message_limit: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            state_delta_memory_limit_bytes: default_state_delta_memory_limit_bytes(),
            state_metrics_message_limit: default_state_metrics_message_limit(),
        }
    }
}

/// Tuning knobs of a replication worker.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Milliseconds a pump sleeps when an adapter had no message ready.
    #[serde(default = "default_idle_poll_interval_ms")]
    pub idle_poll_interval_ms: u64,
    /// Number of records between two progress log lines.
    #[serde(default = "default_records_log_interval")]
    pub records_log_interval: u64,
    /// Number of invalid records per stream after which validation of that stream stops.
    #[serde(default = "default_max_validation_errors_per_stream")]
    pub max_validation_errors_per_stream: u32,
    /// Logs every connector message at debug level.
    #[serde(default)]
    pub log_connector_messages: bool,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.idle_poll_interval_ms == 0 {
            return Err(ValidationError::IdlePollIntervalZero);
        }

        if self.records_log_interval == 0 {
            return Err(ValidationError::RecordsLogIntervalZero);
        }

        if self.tracker.state_delta_memory_limit_bytes == 0 {
            return Err(ValidationError::StateDeltaMemoryLimitZero);
        }

        if self.tracker.state_metrics_message_limit == 0 {
            return Err(ValidationError::StateMetricsMessageLimitZero);
        }

        Ok(())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_poll_interval_ms: default_idle_poll_interval_ms(),
            records_log_interval: default_records_log_interval(),
            max_validation_errors_per_stream: default_max_validation_errors_per_stream(),
            log_connector_messages: false,
            tracker: TrackerConfig::default(),
        }
    }
}
