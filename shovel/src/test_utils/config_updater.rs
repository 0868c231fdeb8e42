use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use uuid::Uuid;

use crate::config_updater::ConnectorConfigUpdater;
use crate::error::{ErrorKind, ShovelResult};
use crate::shovel_error;

/// Connector whose configuration was updated.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigUpdate {
    Source(Uuid, Value),
    Destination(Uuid, Value),
}

#[derive(Debug, Default)]
struct Inner {
    updates: Vec<ConfigUpdate>,
}

/// Keeps every update it is asked to persist, optionally failing each of them afterwards.
#[derive(Debug, Clone, Default)]
pub struct RecordingConfigUpdater {
    inner: Arc<Mutex<Inner>>,
    fail: bool,
}

impl RecordingConfigUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records updates and then fails them with [`ErrorKind::ConfigPersistFailed`].
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn updates(&self) -> Vec<ConfigUpdate> {
        self.lock_inner().updates.clone()
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, update: ConfigUpdate) -> ShovelResult<()> {
        self.lock_inner().updates.push(update);

        if self.fail {
            return Err(shovel_error!(
                ErrorKind::ConfigPersistFailed,
                "Injected configuration persistence failure"
            ));
        }

        Ok(())
    }
}

impl ConnectorConfigUpdater for RecordingConfigUpdater {
    async fn update_source(&self, source_id: Uuid, config: &Value) -> ShovelResult<()> {
        self.record(ConfigUpdate::Source(source_id, config.clone()))
    }

    async fn update_destination(&self, destination_id: Uuid, config: &Value) -> ShovelResult<()> {
        self.record(ConfigUpdate::Destination(destination_id, config.clone()))
    }
}
