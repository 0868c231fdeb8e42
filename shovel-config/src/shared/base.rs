use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("`idle_poll_interval_ms` cannot be zero")]
    IdlePollIntervalZero,
    #[error("`records_log_interval` cannot be zero")]
    RecordsLogIntervalZero,
    #[error("`state_delta_memory_limit_bytes` cannot be zero")]
    StateDeltaMemoryLimitZero,
    #[error("`state_metrics_message_limit` cannot be zero")]
    StateMetricsMessageLimitZero,
    /// A path in the sync configuration is empty.
    #[error("Invalid sync config: `{0}` cannot be empty")]
    EmptyPath(&'static str),
}
