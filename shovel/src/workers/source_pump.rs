use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::Value;
use shovel_config::shared::WorkerConfig;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::bail;
use crate::concurrency::shutdown::ShutdownRx;
use crate::config_updater::ConnectorConfigUpdater;
use crate::destination::Destination;
use crate::error::{ErrorKind, ShovelResult};
use crate::mapper::MessageMapper;
use crate::metrics::WorkerMetricReporter;
use crate::schema::{FieldSelector, RecordSchemaValidator, ValidationSession};
use crate::shovel_error;
use crate::source::Source;
use crate::tracker::MessageTracker;
use crate::types::{ConfiguredCatalog, Message};
use crate::workers::relay_connector_log;

/// Reads the source and forwards records and states to the destination.
///
/// The destination's `accept` is awaited for every forwarded message, so the source is never read
/// faster than the destination consumes.
pub(crate) struct SourcePump<S, D, M, U> {
    pub(crate) source: S,
    pub(crate) destination: D,
    pub(crate) mapper: M,
    pub(crate) config_updater: U,
    pub(crate) tracker: Arc<MessageTracker>,
    pub(crate) metric_reporter: WorkerMetricReporter,
    pub(crate) config: Arc<WorkerConfig>,
    /// Catalog as configured on the source side.
    pub(crate) catalog: ConfiguredCatalog,
    pub(crate) field_selection_enabled: bool,
    pub(crate) source_id: Uuid,
    pub(crate) shutdown_rx: ShutdownRx,
    pub(crate) cancelled: Arc<AtomicBool>,
}

impl<S, D, M, U> SourcePump<S, D, M, U>
where
    S: Source + Send + Sync,
    D: Destination + Send + Sync,
    M: MessageMapper + Send + Sync,
    U: ConnectorConfigUpdater + Send + Sync,
{
    pub(crate) async fn run(self) -> ShovelResult<()> {
        info!("starting source pump");

        let mut validation = ValidationSession::new(
            RecordSchemaValidator::new(&self.catalog),
            self.config.max_validation_errors_per_stream,
        );

        let result = self.pump(&mut validation).await;

        self.tracker.times().track_source_read_end();
        validation.report(&self.metric_reporter);

        let result = self.finish(result).await;

        match result {
            Ok(()) => {
                info!(
                    records_read = self.tracker.total_records_emitted(),
                    "source pump finished"
                );
                Ok(())
            }
            Err(err) if self.cancelled.load(Ordering::SeqCst) => {
                info!(error = %err.chain_message(), "ignoring source pump failure after cancellation");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "source pump failed");
                Err(err)
            }
        }
    }

    async fn pump(&self, validation: &mut ValidationSession) -> ShovelResult<()> {
        let field_selector = if self.field_selection_enabled {
            Some(FieldSelector::new(&self.catalog)?)
        } else {
            None
        };

        self.tracker.times().track_source_read_start();

        let mut shutdown_rx = self.shutdown_rx.clone();
        let idle_poll_interval = Duration::from_millis(self.config.idle_poll_interval_ms);
        let mut records_read: u64 = 0;

        while !shutdown_rx.is_shutdown() && !self.source.is_finished() {
            let message = tokio::select! {
                biased;

                _ = shutdown_rx.wait() => break,

                message = self.source.attempt_read() => message.map_err(|err| {
                    shovel_error!(
                        ErrorKind::SourceReadFailed,
                        "Failed to read a message from the source",
                        source: err
                    )
                })?,
            };

            let Some(message) = message else {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.wait() => break,

                    _ = tokio::time::sleep(idle_poll_interval) => {}
                }
                continue;
            };

            match message {
                Message::Record(mut record) => {
                    validation.check(&record);
                    if let Some(field_selector) = &field_selector {
                        field_selector.select(&mut record);
                    }

                    let message = self.mapper.map_message(Message::Record(record));
                    self.tracker.accept_from_source(&message)?;
                    if !self.forward(message, &mut shutdown_rx).await? {
                        break;
                    }

                    records_read += 1;
                    if self.config.records_log_interval > 0
                        && records_read % self.config.records_log_interval == 0
                    {
                        info!(records_read, "records read from the source");
                    }
                }
                Message::State(state) => {
                    let message = Message::State(state);
                    self.tracker.accept_from_source(&message)?;
                    if !self.forward(message, &mut shutdown_rx).await? {
                        break;
                    }
                }
                Message::Control(control) => {
                    let message = self.mapper.map_message(Message::Control(control));
                    self.tracker.accept_from_source(&message)?;
                    if let Message::Control(control) = &message {
                        self.persist_config(&control.connector_config).await;
                    }
                }
                Message::Log(log) => {
                    relay_connector_log("source", &log);
                    self.tracker.accept_from_source(&Message::Log(log))?;
                }
                message @ Message::Trace(_) => self.tracker.accept_from_source(&message)?,
            }
        }

        Ok(())
    }

    /// Hands a message to the destination. Returns `false` if the pump was stopped first.
    async fn forward(&self, message: Message, shutdown_rx: &mut ShutdownRx) -> ShovelResult<bool> {
        tokio::select! {
            biased;

            _ = shutdown_rx.wait() => Ok(false),

            result = self.destination.accept(message) => {
                result.map_err(|err| {
                    shovel_error!(
                        ErrorKind::DestinationWriteFailed,
                        "Failed to write a message to the destination",
                        source: err
                    )
                })?;

                Ok(true)
            }
        }
    }

    async fn persist_config(&self, config: &Value) {
        info!(source_id = %self.source_id, "source emitted an updated configuration");

        if let Err(err) = self.config_updater.update_source(self.source_id, config).await {
            warn!(
                source_id = %self.source_id,
                error = %err.chain_message(),
                "failed to persist the updated source configuration, continuing"
            );
        }
    }

    /// Signals the end of input, closes the source and checks how it exited.
    async fn finish(&self, result: ShovelResult<()>) -> ShovelResult<()> {
        let stopped = self.shutdown_rx.is_shutdown();
        let mut result = result;

        if result.is_ok() {
            if let Err(err) = self.destination.notify_end_of_input().await {
                let err = shovel_error!(
                    ErrorKind::DestinationWriteFailed,
                    "Failed to signal the end of input to the destination",
                    source: err
                );
                if stopped {
                    warn!(error = %err.chain_message(), "ignoring end of input failure of a stopped pump");
                } else {
                    result = Err(err);
                }
            }
        }

        if let Err(err) = self.source.close().await {
            let err = shovel_error!(ErrorKind::SourceCloseFailed, "Failed to close the source", source: err);
            warn!(error = %err.chain_message(), "source did not close cleanly");
        }

        if result.is_ok() && !stopped {
            check_source_exit_value(&self.source)?;
        }

        result
    }
}

fn check_source_exit_value<S: Source>(source: &S) -> ShovelResult<()> {
    let exit_value = source.exit_value().map_err(|err| {
        shovel_error!(
            ErrorKind::SourceProcessFailed,
            "Failed to get the exit value of the source",
            source: err
        )
    })?;

    if exit_value != 0 {
        bail!(
            ErrorKind::SourceProcessFailed,
            "Source process exited with a non-zero exit value",
            format!("exit value {exit_value}")
        );
    }

    Ok(())
}
