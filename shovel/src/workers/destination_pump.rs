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
use crate::shovel_error;
use crate::tracker::MessageTracker;
use crate::types::Message;
use crate::workers::relay_connector_log;

/// Upper bound on reading the output a destination still holds after the pump loop ended.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Reads what the destination emits back: acknowledged states, reported errors and
/// configuration updates.
pub(crate) struct DestinationPump<D, U> {
    pub(crate) destination: D,
    pub(crate) config_updater: U,
    pub(crate) tracker: Arc<MessageTracker>,
    pub(crate) config: Arc<WorkerConfig>,
    pub(crate) destination_id: Uuid,
    pub(crate) shutdown_rx: ShutdownRx,
    pub(crate) cancelled: Arc<AtomicBool>,
}

impl<D, U> DestinationPump<D, U>
where
    D: Destination + Send + Sync,
    U: ConnectorConfigUpdater + Send + Sync,
{
    pub(crate) async fn run(self) -> ShovelResult<()> {
        info!("starting destination pump");

        let result = self.pump().await;

        self.tracker.times().track_destination_write_end();

        let result = self.finish(result).await;

        match result {
            Ok(()) => {
                info!(
                    states_acknowledged = self.tracker.total_destination_states_emitted(),
                    "destination pump finished"
                );
                Ok(())
            }
            Err(err) if self.cancelled.load(Ordering::SeqCst) => {
                info!(error = %err.chain_message(), "ignoring destination pump failure after cancellation");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "destination pump failed");
                Err(err)
            }
        }
    }

    async fn pump(&self) -> ShovelResult<()> {
        self.tracker.times().track_destination_write_start();

        let mut shutdown_rx = self.shutdown_rx.clone();
        let idle_poll_interval = Duration::from_millis(self.config.idle_poll_interval_ms);

        while !shutdown_rx.is_shutdown() && !self.destination.is_finished() {
            let message = tokio::select! {
                biased;

                _ = shutdown_rx.wait() => break,

                message = self.destination.attempt_read() => message.map_err(|err| {
                    shovel_error!(
                        ErrorKind::DestinationReadFailed,
                        "Failed to read a message from the destination",
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

            self.handle(message).await?;
        }

        self.drain().await
    }

    async fn handle(&self, message: Message) -> ShovelResult<()> {
        self.tracker.accept_from_destination(&message)?;

        match &message {
            Message::Control(control) => self.persist_config(&control.connector_config).await,
            Message::Log(log) => relay_connector_log("destination", log),
            Message::State(_) | Message::Trace(_) | Message::Record(_) => {}
        }

        Ok(())
    }

    /// Reads whatever the destination already has ready once the loop is over.
    ///
    /// A stopped or cancelled destination may still hold acknowledged states, which must reach
    /// the tracker for the output state to reflect them.
    async fn drain(&self) -> ShovelResult<()> {
        match tokio::time::timeout(DRAIN_TIMEOUT, self.drain_ready()).await {
            Ok(Ok(0)) => {}
            Ok(Ok(drained)) => info!(drained, "drained pending destination output"),
            Ok(Err(err)) => return Err(err),
            Err(_) => warn!(
                timeout_ms = DRAIN_TIMEOUT.as_millis() as u64,
                "timed out draining the destination output"
            ),
        }

        Ok(())
    }

    async fn drain_ready(&self) -> ShovelResult<u64> {
        let mut drained = 0;
        loop {
            match self.destination.attempt_read().await {
                Ok(Some(message)) => {
                    self.handle(message).await?;
                    drained += 1;
                }
                Ok(None) => return Ok(drained),
                Err(err) => {
                    warn!(error = %err.chain_message(), "failed to drain the destination output");
                    return Ok(drained);
                }
            }
        }
    }

    async fn persist_config(&self, config: &Value) {
        info!(destination_id = %self.destination_id, "destination emitted an updated configuration");

        if let Err(err) = self
            .config_updater
            .update_destination(self.destination_id, config)
            .await
        {
            warn!(
                destination_id = %self.destination_id,
                error = %err.chain_message(),
                "failed to persist the updated destination configuration, continuing"
            );
        }
    }

    /// Closes the destination and checks how it exited.
    async fn finish(&self, result: ShovelResult<()>) -> ShovelResult<()> {
        let stopped = self.shutdown_rx.is_shutdown();

        if let Err(err) = self.destination.close().await {
            let err = shovel_error!(
                ErrorKind::DestinationCloseFailed,
                "Failed to close the destination",
                source: err
            );
            warn!(error = %err.chain_message(), "destination did not close cleanly");
        }

        if result.is_ok() && !stopped {
            let exit_value = self.destination.exit_value().map_err(|err| {
                shovel_error!(
                    ErrorKind::DestinationProcessFailed,
                    "Failed to get the exit value of the destination",
                    source: err
                )
            })?;

            if exit_value != 0 {
                bail!(
                    ErrorKind::DestinationProcessFailed,
                    "Destination process exited with a non-zero exit value",
                    format!("exit value {exit_value}")
                );
            }
        }

        result
    }
}
