use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use shovel_config::shared::WorkerConfig;
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{Instrument, error, info, info_span, warn};

use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::config_updater::ConnectorConfigUpdater;
use crate::destination::Destination;
use crate::error::{ErrorKind, ShovelResult};
#[cfg(feature = "failpoints")]
use crate::failpoints::{BUILD_REPLICATION_OUTPUT, shovel_fail_point};
use crate::mapper::MessageMapper;
use crate::metrics::WorkerMetricReporter;
use crate::shovel_error;
use crate::source::Source;
use crate::tracker::MessageTracker;
use crate::types::{
    ConfiguredCatalog, JobId, ReplicationInput, ReplicationOutput, ReplicationStatus, State,
};
use crate::workers::destination_pump::DestinationPump;
use crate::workers::failure::AttemptRef;
use crate::workers::output::{PumpOutcome, build_replication_output};
use crate::workers::source_pump::SourcePump;

/// Lifecycle of a [`ReplicationWorker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    NotStarted,
    /// Both connectors were started and the pumps are running.
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl From<ReplicationStatus> for WorkerPhase {
    fn from(status: ReplicationStatus) -> Self {
        match status {
            ReplicationStatus::Running => WorkerPhase::Running,
            ReplicationStatus::Completed => WorkerPhase::Completed,
            ReplicationStatus::Failed => WorkerPhase::Failed,
            ReplicationStatus::Cancelled => WorkerPhase::Cancelled,
        }
    }
}

/// Runs one sync attempt between a source and a destination.
///
/// [`ReplicationWorker::run`] starts both connectors, moves messages with two concurrent pumps
/// and always turns what was observed into a [`ReplicationOutput`], even when a connector failed.
/// [`ReplicationWorker::cancel`] may be called from another task while `run` is executing, which
/// is why the worker is usually shared behind an [`Arc`].
#[derive(Debug)]
pub struct ReplicationWorker<S, D, M, U> {
    job_id: JobId,
    attempt: u32,
    source: S,
    destination: D,
    mapper: M,
    config_updater: U,
    metric_reporter: WorkerMetricReporter,
    config: Arc<WorkerConfig>,
    shutdown_tx: ShutdownTx,
    cancelled: Arc<AtomicBool>,
    phase: watch::Sender<WorkerPhase>,
}

impl<S, D, M, U> ReplicationWorker<S, D, M, U> {
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        job_id: JobId,
        attempt: u32,
        source: S,
        destination: D,
        mapper: M,
        config_updater: U,
        metric_reporter: WorkerMetricReporter,
        config: Arc<WorkerConfig>,
    ) -> Self {
        let (shutdown_tx, _) = create_shutdown_channel();
        let (phase, _) = watch::channel(WorkerPhase::NotStarted);

        Self {
            job_id,
            attempt,
            source,
            destination,
            mapper,
            config_updater,
            metric_reporter,
            config,
            shutdown_tx,
            cancelled: Arc::new(AtomicBool::new(false)),
            phase,
        }
    }

    /// Subscribes to the lifecycle of the worker.
    pub fn phase(&self) -> watch::Receiver<WorkerPhase> {
        self.phase.subscribe()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn attempt_ref(&self) -> AttemptRef {
        AttemptRef {
            job_id: self.job_id,
            attempt: self.attempt,
        }
    }

    fn assemble_output(
        &self,
        tracker: &MessageTracker,
        outcome: PumpOutcome,
        input_state: Option<State>,
        output_catalog: ConfiguredCatalog,
    ) -> ShovelResult<ReplicationOutput> {
        #[cfg(feature = "failpoints")]
        shovel_fail_point(BUILD_REPLICATION_OUTPUT)?;

        build_replication_output(
            tracker,
            outcome,
            self.attempt_ref(),
            input_state,
            output_catalog,
            &self.metric_reporter,
        )
    }

    fn stop_pumps(&self) {
        if self.shutdown_tx.shutdown() {
            info!("stopping both pumps");
        }
    }
}

impl<S, D, M, U> ReplicationWorker<S, D, M, U>
where
    S: Source + Clone + Send + Sync + 'static,
    D: Destination + Clone + Send + Sync + 'static,
    M: MessageMapper + Clone + Send + Sync + 'static,
    U: ConnectorConfigUpdater + Clone + Send + Sync + 'static,
{
    /// Runs the attempt until both pumps returned.
    ///
    /// Fails only if a connector could not be started or if the output could not be assembled,
    /// the latter as [`ErrorKind::WorkerInternal`].
    /// Every other failure ends up in [`ReplicationOutput::failures`].
    pub async fn run(
        &self,
        input: ReplicationInput,
        work_dir: &Path,
    ) -> ShovelResult<ReplicationOutput> {
        let span = info_span!("replication_worker", job_id = self.job_id, attempt = self.attempt);

        let result = self.run_attempt(input, work_dir).instrument(span).await;
        if result.is_err() {
            self.phase.send_replace(WorkerPhase::Failed);
        }

        result
    }

    async fn run_attempt(
        &self,
        input: ReplicationInput,
        work_dir: &Path,
    ) -> ShovelResult<ReplicationOutput> {
        info!(
            connection_id = %input.connection_id,
            source = S::name(),
            destination = D::name(),
            work_dir = %work_dir.display(),
            "starting replication attempt"
        );

        let tracker = Arc::new(MessageTracker::new(
            &self.config.tracker,
            self.config.log_connector_messages,
        ));
        tracker.times().track_replication_start();

        let destination_catalog = self.mapper.map_catalog(input.catalog.clone());

        self.source
            .start(&input.source_config(), work_dir)
            .await
            .map_err(|err| {
                shovel_error!(ErrorKind::SourceStartFailed, "Failed to start the source", source: err)
            })?;

        let destination_config = input.destination_config(destination_catalog.clone());
        if let Err(err) = self.destination.start(&destination_config, work_dir).await {
            if let Err(close_err) = self.source.close().await {
                warn!(error = %close_err.chain_message(), "failed to close the source after the destination failed to start");
            }

            return Err(shovel_error!(
                ErrorKind::DestinationStartFailed,
                "Failed to start the destination",
                source: err
            ));
        }

        self.phase.send_replace(WorkerPhase::Running);

        let source_pump = SourcePump {
            source: self.source.clone(),
            destination: self.destination.clone(),
            mapper: self.mapper.clone(),
            config_updater: self.config_updater.clone(),
            tracker: tracker.clone(),
            metric_reporter: self.metric_reporter.clone(),
            config: self.config.clone(),
            catalog: input.catalog.clone(),
            field_selection_enabled: input.field_selection_enabled,
            source_id: input.source_id,
            shutdown_rx: self.shutdown_tx.subscribe(),
            cancelled: self.cancelled.clone(),
        };
        let destination_pump = DestinationPump {
            destination: self.destination.clone(),
            config_updater: self.config_updater.clone(),
            tracker: tracker.clone(),
            config: self.config.clone(),
            destination_id: input.destination_id,
            shutdown_rx: self.shutdown_tx.subscribe(),
            cancelled: self.cancelled.clone(),
        };

        let mut source_handle = tokio::spawn(
            source_pump
                .run()
                .instrument(info_span!("source_pump", connector = S::name()).or_current()),
        );
        let mut destination_handle = tokio::spawn(
            destination_pump
                .run()
                .instrument(info_span!("destination_pump", connector = D::name()).or_current()),
        );

        // The first pump to fail stops its sibling, which might otherwise wait forever on a
        // connector that is not going to make progress anymore.
        let (source_result, destination_result) = tokio::select! {
            result = &mut source_handle => {
                let source_result = join_result(result, "source");
                if source_result.is_err() {
                    self.stop_pumps();
                }
                (source_result, join_result(destination_handle.await, "destination"))
            }
            result = &mut destination_handle => {
                let destination_result = join_result(result, "destination");
                if destination_result.is_err() {
                    self.stop_pumps();
                }
                (join_result(source_handle.await, "source"), destination_result)
            }
        };

        // A cancellation arriving from here on no longer changes the status.
        let cancelled = self.is_cancelled();
        tracker.times().track_replication_end();

        let outcome = PumpOutcome {
            cancelled,
            source_error: source_result.err(),
            destination_error: destination_result.err(),
        };
        let output = self
            .assemble_output(&tracker, outcome, input.state, destination_catalog)
            .map_err(|err| {
                shovel_error!(
                    ErrorKind::WorkerInternal,
                    "Failed to assemble the replication output",
                    source: err
                )
            })?;

        let status = output.replication_attempt_summary.status;
        self.phase.send_replace(status.into());
        info!(?status, "replication attempt finished");

        Ok(output)
    }

    /// Asks the running attempt to stop.
    ///
    /// Both pumps are signalled and both connectors are cancelled. Calling it more than once has
    /// no further effect. The attempt ends as cancelled only if the flag was set before both pumps
    /// returned; a later call leaves the status of the attempt untouched.
    pub async fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        info!(job_id = self.job_id, attempt = self.attempt, "cancelling replication attempt");
        self.stop_pumps();

        if let Err(err) = self.destination.cancel().await {
            warn!(error = %err.chain_message(), "failed to cancel the destination");
        }
        if let Err(err) = self.source.cancel().await {
            warn!(error = %err.chain_message(), "failed to cancel the source");
        }
    }
}

/// Turns a panicked or aborted pump into an error attributed to the worker itself.
fn join_result(result: Result<ShovelResult<()>, JoinError>, pump: &'static str) -> ShovelResult<()> {
    match result {
        Ok(result) => result,
        Err(err) => {
            error!(pump, error = %err, "pump did not run to completion");
            Err(shovel_error!(
                ErrorKind::PumpPanicked,
                "A pump did not run to completion",
                format!("{pump} pump: {err}")
            ))
        }
    }
}
