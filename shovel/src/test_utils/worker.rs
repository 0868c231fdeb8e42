use std::sync::Arc;

use shovel_config::shared::WorkerConfig;

use crate::config_updater::ConnectorConfigUpdater;
use crate::mapper::MessageMapper;
use crate::metrics::WorkerMetricReporter;
use crate::types::{JobId, ReplicationInput};
use crate::workers::ReplicationWorker;

pub const TEST_JOB_ID: JobId = 42;

/// Worker configuration polling idle connectors every millisecond.
pub fn test_worker_config() -> WorkerConfig {
    WorkerConfig {
        idle_poll_interval_ms: 1,
        ..WorkerConfig::default()
    }
}

/// Builds a worker for the first attempt of [`TEST_JOB_ID`].
pub fn create_worker<S, D, M, U>(
    input: &ReplicationInput,
    source: S,
    destination: D,
    mapper: M,
    config_updater: U,
) -> ReplicationWorker<S, D, M, U>
where
    M: MessageMapper,
    U: ConnectorConfigUpdater,
{
    create_worker_with_config(
        input,
        source,
        destination,
        mapper,
        config_updater,
        test_worker_config(),
    )
}

pub fn create_worker_with_config<S, D, M, U>(
    input: &ReplicationInput,
    source: S,
    destination: D,
    mapper: M,
    config_updater: U,
    config: WorkerConfig,
) -> ReplicationWorker<S, D, M, U>
where
    M: MessageMapper,
    U: ConnectorConfigUpdater,
{
    ReplicationWorker::new(
        TEST_JOB_ID,
        0,
        source,
        destination,
        mapper,
        config_updater,
        WorkerMetricReporter::new(input.connection_id),
        Arc::new(config),
    )
}
