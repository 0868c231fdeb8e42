use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config_updater::ConnectorConfigUpdater;
use crate::error::{ErrorKind, ShovelResult, serialization_error};
use crate::shovel_error;

/// Writes connector configurations as JSON files in a directory.
///
/// Each connector gets one file, `source-<id>.json` or `destination-<id>.json`. A file is only
/// rewritten when the configuration actually changed.
#[derive(Debug, Clone)]
pub struct FileConfigUpdater {
    dir: PathBuf,
}

impl FileConfigUpdater {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn source_config_path(&self, source_id: Uuid) -> PathBuf {
        self.dir.join(format!("source-{source_id}.json"))
    }

    pub fn destination_config_path(&self, destination_id: Uuid) -> PathBuf {
        self.dir.join(format!("destination-{destination_id}.json"))
    }

    async fn persist(&self, path: &Path, config: &Value) -> ShovelResult<()> {
        if let Ok(existing) = fs::read(path).await {
            if serde_json::from_slice::<Value>(&existing).is_ok_and(|existing| existing == *config) {
                debug!(path = %path.display(), "connector configuration unchanged, skipping update");
                return Ok(());
            }
        }

        let serialized = serde_json::to_vec_pretty(config).map_err(serialization_error)?;

        fs::create_dir_all(&self.dir).await.map_err(|err| {
            shovel_error!(
                ErrorKind::ConfigPersistFailed,
                "Could not create the connector configuration directory",
                self.dir.display(),
                source: err
            )
        })?;
        fs::write(path, serialized).await.map_err(|err| {
            shovel_error!(
                ErrorKind::ConfigPersistFailed,
                "Could not write the connector configuration",
                path.display(),
                source: err
            )
        })?;

        info!(path = %path.display(), "persisted updated connector configuration");

        Ok(())
    }
}

impl ConnectorConfigUpdater for FileConfigUpdater {
    async fn update_source(&self, source_id: Uuid, config: &Value) -> ShovelResult<()> {
        self.persist(&self.source_config_path(source_id), config).await
    }

    async fn update_destination(&self, destination_id: Uuid, config: &Value) -> ShovelResult<()> {
        self.persist(&self.destination_config_path(destination_id), config)
            .await
    }
}
