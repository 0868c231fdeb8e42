use std::collections::{HashMap, HashSet};

use crate::bail;
use crate::error::{ErrorKind, ShovelResult};
use crate::schema::declared_fields;
use crate::types::{ConfiguredCatalog, RecordMessage, StreamDescriptor};

/// Narrows record payloads to the fields declared by their stream schema.
#[derive(Debug, Clone)]
pub struct FieldSelector {
    selected_fields: HashMap<StreamDescriptor, HashSet<String>>,
}

impl FieldSelector {
    /// Collects the declared fields of every stream in the catalog.
    ///
    /// Fails if a stream schema has no `properties` object, since no field could be selected.
    pub fn new(catalog: &ConfiguredCatalog) -> ShovelResult<Self> {
        let mut selected_fields = HashMap::with_capacity(catalog.streams.len());

        for configured in &catalog.streams {
            let descriptor = configured.descriptor();
            let Some(fields) = declared_fields(&configured.stream.json_schema) else {
                bail!(
                    ErrorKind::InvalidSchema,
                    "Stream schema declares no properties",
                    format!("Field selection requires a `properties` object in the schema of stream {descriptor}")
                );
            };
            selected_fields.insert(descriptor, fields);
        }

        Ok(Self { selected_fields })
    }

    /// Removes every top-level field the record's stream does not declare.
    ///
    /// Records of streams missing from the catalog lose all their fields. Payloads which are not
    /// objects are left untouched.
    pub fn select(&self, record: &mut RecordMessage) {
        let descriptor = record.descriptor();
        let Some(data) = record.data.as_object_mut() else {
            return;
        };

        match self.selected_fields.get(&descriptor) {
            Some(fields) => data.retain(|field, _| fields.contains(field)),
            None => data.clear(),
        }
    }
}
