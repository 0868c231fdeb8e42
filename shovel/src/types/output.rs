use serde::{Deserialize, Serialize};

use crate::types::{ConfiguredCatalog, FailureType, JobId, State};

/// Counters and timings of a sync attempt, or of a single stream within it.
///
/// Timing fields are only set on the aggregate statistics. Timestamps are milliseconds since the
/// Unix epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStats {
    pub records_emitted: u64,
    pub bytes_emitted: u64,
    /// Unknown unless the sync completed or the destination reported its progress.
    pub records_committed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_records: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_bytes: Option<u64>,
    pub source_state_messages_emitted: u64,
    pub destination_state_messages_emitted: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_seconds_before_source_state_message_emitted: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_seconds_before_source_state_message_emitted: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_seconds_between_state_message_emitted_and_committed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_seconds_between_state_message_emitted_and_committed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_start_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_end_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_read_start_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_read_end_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_write_start_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_write_end_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSyncStats {
    pub stream_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_namespace: Option<String>,
    pub stats: SyncStats,
}

/// Component a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureOrigin {
    Source,
    Destination,
    Replication,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureMetadata {
    pub job_id: JobId,
    pub attempt_number: u32,
    /// Set when the failure was reported by a connector rather than observed by the worker.
    pub from_trace_message: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReason {
    pub failure_origin: FailureOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_type: Option<FailureType>,
    pub internal_message: Option<String>,
    pub external_message: Option<String>,
    pub stacktrace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub metadata: FailureMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationAttemptSummary {
    pub status: ReplicationStatus,
    pub records_synced: u64,
    pub bytes_synced: u64,
    /// Milliseconds since the Unix epoch.
    pub start_time: i64,
    pub end_time: i64,
    pub total_stats: SyncStats,
    pub stream_stats: Vec<StreamSyncStats>,
}

/// The single result of a sync attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationOutput {
    pub replication_attempt_summary: ReplicationAttemptSummary,
    /// Catalog as seen by the destination.
    pub output_catalog: ConfiguredCatalog,
    /// Checkpoint the next attempt resumes from.
    pub state: Option<State>,
    pub failures: Vec<FailureReason>,
}
