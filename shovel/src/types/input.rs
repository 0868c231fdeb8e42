use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::ConfiguredCatalog;

/// Identifier of the job a sync attempt belongs to.
pub type JobId = u64;

/// Opaque checkpoint a sync resumes from and hands back when it ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub state: Value,
}

/// Where the destination namespace of a stream comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceDefinition {
    /// Keep the namespace emitted by the source.
    #[default]
    Source,
    /// Let the destination use its default namespace.
    Destination,
    /// Format where `${SOURCE_NAMESPACE}` is replaced by the source namespace.
    CustomFormat(String),
}

/// Everything a worker needs to run one sync attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationInput {
    pub workspace_id: Uuid,
    pub connection_id: Uuid,
    pub source_id: Uuid,
    pub destination_id: Uuid,
    pub source_configuration: Value,
    pub destination_configuration: Value,
    pub catalog: ConfiguredCatalog,
    /// Checkpoint of the previous attempt, if any.
    #[serde(default)]
    pub state: Option<State>,
    #[serde(default)]
    pub namespace_definition: NamespaceDefinition,
    #[serde(default)]
    pub prefix: Option<String>,
    /// Forwards only fields declared in the stream schema when set.
    #[serde(default)]
    pub field_selection_enabled: bool,
}

impl ReplicationInput {
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            source_id: self.source_id,
            connection_configuration: self.source_configuration.clone(),
            catalog: self.catalog.clone(),
            state: self.state.clone(),
        }
    }

    /// Builds the destination configuration for the catalog as the destination will see it.
    pub fn destination_config(&self, catalog: ConfiguredCatalog) -> DestinationConfig {
        DestinationConfig {
            destination_id: self.destination_id,
            connection_id: self.connection_id,
            connection_configuration: self.destination_configuration.clone(),
            catalog,
        }
    }
}

/// Configuration a source adapter is started with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub source_id: Uuid,
    pub connection_configuration: Value,
    pub catalog: ConfiguredCatalog,
    pub state: Option<State>,
}

/// Configuration a destination adapter is started with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub destination_id: Uuid,
    pub connection_id: Uuid,
    pub connection_configuration: Value,
    pub catalog: ConfiguredCatalog,
}
