use std::sync::Arc;

use shovel::config_updater::file::FileConfigUpdater;
use shovel::mapper::NamespacingMapper;
use shovel::metrics::WorkerMetricReporter;
use shovel::types::ReplicationInput;
use shovel::workers::ReplicationWorker;
use shovel_config::shared::ReplicatorConfig;
use tracing::{info, warn};

use crate::connectors::{FileDestination, FileSource};
use crate::error::ReplicatorResult;

type FileReplicationWorker =
    ReplicationWorker<FileSource, FileDestination, NamespacingMapper, FileConfigUpdater>;

/// Runs one sync attempt described by `replicator_config` and writes its output.
pub async fn start_replicator_with_config(
    replicator_config: ReplicatorConfig,
) -> ReplicatorResult<()> {
    let sync = &replicator_config.sync;

    let input = tokio::fs::read(&sync.input_path).await?;
    let input: ReplicationInput = serde_json::from_slice(&input)?;
    tokio::fs::create_dir_all(&sync.work_dir).await?;

    info!(
        job_id = replicator_config.job.id,
        attempt = replicator_config.job.attempt,
        connection_id = %input.connection_id,
        streams = input.catalog.streams.len(),
        "starting replicator"
    );

    let worker: Arc<FileReplicationWorker> = Arc::new(ReplicationWorker::new(
        replicator_config.job.id,
        replicator_config.job.attempt,
        FileSource::new(&sync.source_messages_path),
        FileDestination::new(&sync.destination_messages_path),
        NamespacingMapper::new(input.namespace_definition.clone(), input.prefix.clone()),
        FileConfigUpdater::new(&sync.config_updates_dir),
        WorkerMetricReporter::new(input.connection_id),
        Arc::new(replicator_config.worker.clone()),
    ));

    let signal_handle = tokio::spawn(cancel_on_signal(worker.clone()));
    let result = worker.run(input, &sync.work_dir).await;
    signal_handle.abort();
    let output = result?;

    let serialized = serde_json::to_vec_pretty(&output)?;
    tokio::fs::write(&sync.output_path, serialized).await?;

    info!(
        status = ?output.replication_attempt_summary.status,
        records_synced = output.replication_attempt_summary.records_synced,
        failures = output.failures.len(),
        output_path = %sync.output_path.display(),
        "replicator finished"
    );

    Ok(())
}

/// Cancels the attempt on the first SIGINT or SIGTERM.
async fn cancel_on_signal(worker: Arc<FileReplicationWorker>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                warn!(error = %err, "failed to install the SIGTERM handler");
                return;
            }
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    warn!(error = %err, "failed to listen for SIGINT");
                    return;
                }
                info!("SIGINT received, cancelling the replication");
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, cancelling the replication");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            return;
        }
        info!("ctrl-c received, cancelling the replication");
    }

    worker.cancel().await;
}
