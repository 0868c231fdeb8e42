use crate::mapper::MessageMapper;
use crate::types::{ConfiguredCatalog, Message, NamespaceDefinition};

/// Placeholder of a custom namespace format replaced by the source namespace.
pub const SOURCE_NAMESPACE_PLACEHOLDER: &str = "${SOURCE_NAMESPACE}";

/// Renames streams and their namespaces as configured on the connection.
#[derive(Debug, Clone)]
pub struct NamespacingMapper {
    namespace_definition: NamespaceDefinition,
    stream_prefix: Option<String>,
}

impl NamespacingMapper {
    pub fn new(namespace_definition: NamespaceDefinition, stream_prefix: Option<String>) -> Self {
        Self {
            namespace_definition,
            stream_prefix: stream_prefix.filter(|prefix| !prefix.trim().is_empty()),
        }
    }

    fn map_namespace(&self, source_namespace: Option<String>) -> Option<String> {
        match &self.namespace_definition {
            NamespaceDefinition::Source => source_namespace,
            NamespaceDefinition::Destination => None,
            NamespaceDefinition::CustomFormat(format) => {
                let namespace = format.replace(
                    SOURCE_NAMESPACE_PLACEHOLDER,
                    source_namespace.as_deref().unwrap_or_default(),
                );
                (!namespace.trim().is_empty()).then_some(namespace)
            }
        }
    }

    fn map_stream_name(&self, name: String) -> String {
        match &self.stream_prefix {
            Some(prefix) => format!("{prefix}{name}"),
            None => name,
        }
    }
}

impl MessageMapper for NamespacingMapper {
    fn map_catalog(&self, mut catalog: ConfiguredCatalog) -> ConfiguredCatalog {
        for configured in &mut catalog.streams {
            let stream = &mut configured.stream;
            stream.namespace = self.map_namespace(stream.namespace.take());
            stream.name = self.map_stream_name(std::mem::take(&mut stream.name));
        }

        catalog
    }

    fn map_message(&self, message: Message) -> Message {
        match message {
            Message::Record(mut record) => {
                record.namespace = self.map_namespace(record.namespace.take());
                record.stream = self.map_stream_name(record.stream);
                Message::Record(record)
            }
            other => other,
        }
    }
}
