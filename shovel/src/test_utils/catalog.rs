use serde_json::{Value, json};
use uuid::Uuid;

use crate::types::{
    ConfiguredCatalog, ConfiguredStream, DestinationSyncMode, NamespaceDefinition,
    ReplicationInput, State, StreamDefinition, SyncMode,
};

pub fn create_stream(name: &str, namespace: Option<&str>, json_schema: Value) -> ConfiguredStream {
    ConfiguredStream {
        stream: StreamDefinition {
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            json_schema,
        },
        sync_mode: SyncMode::Incremental,
        destination_sync_mode: DestinationSyncMode::Append,
        cursor_field: Vec::new(),
        primary_key: Vec::new(),
    }
}

pub fn create_catalog(streams: Vec<ConfiguredStream>) -> ConfiguredCatalog {
    ConfiguredCatalog { streams }
}

/// Catalog with a single `users` stream declaring an integer `id` and a string `name`.
pub fn users_catalog() -> ConfiguredCatalog {
    create_catalog(vec![create_stream(
        "users",
        None,
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "integer"},
                "name": {"type": "string"}
            }
        }),
    )])
}

/// Builds an input with fresh ids, empty connector configurations and no prior state.
pub fn create_input(catalog: ConfiguredCatalog) -> ReplicationInput {
    ReplicationInput {
        workspace_id: Uuid::new_v4(),
        connection_id: Uuid::new_v4(),
        source_id: Uuid::new_v4(),
        destination_id: Uuid::new_v4(),
        source_configuration: json!({}),
        destination_configuration: json!({}),
        catalog,
        state: None,
        namespace_definition: NamespaceDefinition::Source,
        prefix: None,
        field_selection_enabled: false,
    }
}

pub fn create_input_with_state(catalog: ConfiguredCatalog, state: Value) -> ReplicationInput {
    ReplicationInput {
        state: Some(State { state }),
        ..create_input(catalog)
    }
}
