//! Metric names emitted by replication workers and the reporter emitting them.

use metrics::{counter, histogram};
use uuid::Uuid;

use crate::types::{ReplicationStatus, StreamDescriptor};

/// Label for the connection id in metrics.
pub const CONNECTION_ID_LABEL: &str = "connection_id";

/// Label for the stream name in metrics.
pub const STREAM_LABEL: &str = "stream";

/// Label for the terminal status of a sync attempt.
pub const STATUS_LABEL: &str = "status";

/// Counter of streams whose records failed schema validation.
pub const SHOVEL_SCHEMA_VALIDATION_ERRORS_TOTAL: &str = "shovel_schema_validation_errors_total";

/// Counter of sync attempts whose state timing metrics became unreliable.
pub const SHOVEL_STATE_METRIC_TRACKER_ERRORS_TOTAL: &str =
    "shovel_state_metric_tracker_errors_total";

/// Counter of records read from sources.
pub const SHOVEL_RECORDS_EMITTED_TOTAL: &str = "shovel_records_emitted_total";

/// Counter of payload bytes read from sources.
pub const SHOVEL_BYTES_EMITTED_TOTAL: &str = "shovel_bytes_emitted_total";

/// Histogram of sync attempt durations.
pub const SHOVEL_REPLICATION_DURATION_SECONDS: &str = "shovel_replication_duration_seconds";

/// Counter of finished sync attempts by status.
pub const SHOVEL_REPLICATION_ATTEMPTS_TOTAL: &str = "shovel_replication_attempts_total";

/// Emits the metrics of one connection through the global `metrics` recorder.
///
/// Without an installed recorder every call is a no-op.
#[derive(Debug, Clone)]
pub struct WorkerMetricReporter {
    connection_id: String,
}

impl WorkerMetricReporter {
    pub fn new(connection_id: Uuid) -> Self {
        Self {
            connection_id: connection_id.to_string(),
        }
    }

    pub fn track_schema_validation_error(&self, stream: &StreamDescriptor) {
        counter!(
            SHOVEL_SCHEMA_VALIDATION_ERRORS_TOTAL,
            CONNECTION_ID_LABEL => self.connection_id.clone(),
            STREAM_LABEL => stream.to_string(),
        )
        .increment(1);
    }

    pub fn track_state_metric_tracker_error(&self) {
        counter!(
            SHOVEL_STATE_METRIC_TRACKER_ERRORS_TOTAL,
            CONNECTION_ID_LABEL => self.connection_id.clone(),
        )
        .increment(1);
    }

    /// Records the outcome of a finished sync attempt.
    pub fn track_replication_finished(
        &self,
        status: ReplicationStatus,
        records: u64,
        bytes: u64,
        duration_seconds: f64,
    ) {
        let status = match status {
            ReplicationStatus::Running => "running",
            ReplicationStatus::Completed => "completed",
            ReplicationStatus::Failed => "failed",
            ReplicationStatus::Cancelled => "cancelled",
        };

        counter!(
            SHOVEL_RECORDS_EMITTED_TOTAL,
            CONNECTION_ID_LABEL => self.connection_id.clone(),
        )
        .increment(records);
        counter!(
            SHOVEL_BYTES_EMITTED_TOTAL,
            CONNECTION_ID_LABEL => self.connection_id.clone(),
        )
        .increment(bytes);
        histogram!(
            SHOVEL_REPLICATION_DURATION_SECONDS,
            CONNECTION_ID_LABEL => self.connection_id.clone(),
            STATUS_LABEL => status,
        )
        .record(duration_seconds);
        counter!(
            SHOVEL_REPLICATION_ATTEMPTS_TOTAL,
            CONNECTION_ID_LABEL => self.connection_id.clone(),
            STATUS_LABEL => status,
        )
        .increment(1);
    }
}
