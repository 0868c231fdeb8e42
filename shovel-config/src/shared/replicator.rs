use std::path::PathBuf;

use serde::Deserialize;

use crate::load::Config;
use crate::shared::{ValidationError, WorkerConfig};

/// Identity of the sync attempt run by the replicator.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JobConfig {
    pub id: u64,
    #[serde(default)]
    pub attempt: u32,
}

/// Files the replicator reads from and writes to.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    /// JSON document describing the replication input.
    pub input_path: PathBuf,
    /// JSON-lines file with the messages emitted by the source connector.
    pub source_messages_path: PathBuf,
    /// JSON-lines file receiving every message accepted by the destination.
    pub destination_messages_path: PathBuf,
    /// Working directory handed to both connectors.
    pub work_dir: PathBuf,
    /// File receiving the replication output as JSON.
    pub output_path: PathBuf,
    /// Directory where connector configuration updates are persisted.
    pub config_updates_dir: PathBuf,
}

/// Configuration of the replicator binary.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReplicatorConfig {
    pub job: JobConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    pub sync: SyncConfig,
    /// Port of the Prometheus endpoint. Metrics are not exported when unset.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl ReplicatorConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.worker.validate()?;

        let paths = [
            ("input_path", &self.sync.input_path),
            ("source_messages_path", &self.sync.source_messages_path),
            ("destination_messages_path", &self.sync.destination_messages_path),
            ("work_dir", &self.sync.work_dir),
            ("output_path", &self.sync.output_path),
            ("config_updates_dir", &self.sync.config_updates_dir),
        ];
        for (name, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(ValidationError::EmptyPath(name));
            }
        }

        Ok(())
    }
}

impl Config for ReplicatorConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_json(input_path: &str) -> String {
        format!(
            r#"{{
                "job": {{"id": 42}},
                "sync": {{
                    "input_path": "{input_path}",
                    "source_messages_path": "source.jsonl",
                    "destination_messages_path": "destination.jsonl",
                    "work_dir": "work",
                    "output_path": "output.json",
                    "config_updates_dir": "updates"
                }}
            }}"#
        )
    }

    #[test]
    fn replicator_config_defaults_worker_section() {
        let config: ReplicatorConfig = serde_json::from_str(&config_json("input.json")).unwrap();

        assert_eq!(config.job.attempt, 0);
        assert_eq!(config.worker, WorkerConfig::default());
        assert!(config.metrics_port.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_paths_are_rejected() {
        let config: ReplicatorConfig = serde_json::from_str(&config_json("")).unwrap();

        assert!(matches!(
            config.validate(),
            Err(ValidationError::EmptyPath("input_path"))
        ));
    }
}
