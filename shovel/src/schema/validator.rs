use std::collections::{BTreeSet, HashMap, HashSet};

use serde_json::Value;
use tracing::{info, warn};

use crate::metrics::WorkerMetricReporter;
use crate::types::{ConfiguredCatalog, RecordMessage, StreamDescriptor};

/// Path reported for violations of the payload as a whole.
const ROOT_PATH: &str = "/";

/// Returns the top-level fields declared in the `properties` of a stream schema.
///
/// Returns `None` if the schema has no `properties` object.
pub fn declared_fields(json_schema: &Value) -> Option<HashSet<String>> {
    json_schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|properties| properties.keys().cloned().collect())
}

/// Validates record payloads against the schemas of a configured catalog.
///
/// Schemas are compiled once. Streams whose schema does not compile, and streams absent from the
/// catalog, accept every record.
pub struct RecordSchemaValidator {
    validators: HashMap<StreamDescriptor, jsonschema::Validator>,
    declared_fields: HashMap<StreamDescriptor, HashSet<String>>,
}

impl RecordSchemaValidator {
    pub fn new(catalog: &ConfiguredCatalog) -> Self {
        let mut validators = HashMap::with_capacity(catalog.streams.len());
        let mut fields = HashMap::with_capacity(catalog.streams.len());

        for configured in &catalog.streams {
            let descriptor = configured.descriptor();

            if let Some(declared) = declared_fields(&configured.stream.json_schema) {
                fields.insert(descriptor.clone(), declared);
            }

            match jsonschema::validator_for(&configured.stream.json_schema) {
                Ok(validator) => {
                    validators.insert(descriptor, validator);
                }
                Err(err) => {
                    warn!(stream = %descriptor, error = %err, "stream schema is invalid, records of this stream will not be validated");
                }
            }
        }

        Self {
            validators,
            declared_fields: fields,
        }
    }

    /// Returns the paths of the payload fields violating the stream schema.
    ///
    /// An empty set means the record is valid.
    pub fn validate(&self, record: &RecordMessage) -> BTreeSet<String> {
        let Some(validator) = self.validators.get(&record.descriptor()) else {
            return BTreeSet::new();
        };

        validator
            .iter_errors(&record.data)
            .map(|error| {
                let path = error.instance_path.to_string();
                if path.is_empty() {
                    ROOT_PATH.to_string()
                } else {
                    path
                }
            })
            .collect()
    }

    /// Returns top-level payload fields the stream schema does not declare.
    ///
    /// Streams without declared fields never report unexpected fields.
    pub fn unexpected_fields(&self, record: &RecordMessage) -> BTreeSet<String> {
        let (Some(declared), Some(data)) = (
            self.declared_fields.get(&record.descriptor()),
            record.data.as_object(),
        ) else {
            return BTreeSet::new();
        };

        data.keys()
            .filter(|field| !declared.contains(*field))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default)]
struct StreamValidationErrors {
    invalid_records: u32,
    paths: BTreeSet<String>,
}

/// Accumulates validation outcomes of the records read during one sync.
///
/// A stream stops being validated once `max_errors_per_stream` of its records were invalid.
pub struct ValidationSession {
    validator: RecordSchemaValidator,
    max_errors_per_stream: u32,
    errors: HashMap<StreamDescriptor, StreamValidationErrors>,
    unexpected_fields: HashMap<StreamDescriptor, BTreeSet<String>>,
}

impl ValidationSession {
    pub fn new(validator: RecordSchemaValidator, max_errors_per_stream: u32) -> Self {
        Self {
            validator,
            max_errors_per_stream,
            errors: HashMap::new(),
            unexpected_fields: HashMap::new(),
        }
    }

    /// Validates a record and remembers any violation. Never fails.
    pub fn check(&mut self, record: &RecordMessage) {
        let descriptor = record.descriptor();

        let unexpected = self.validator.unexpected_fields(record);
        if !unexpected.is_empty() {
            self.unexpected_fields
                .entry(descriptor.clone())
                .or_default()
                .extend(unexpected);
        }

        let stream_errors = self.errors.get(&descriptor);
        if stream_errors.is_some_and(|errors| errors.invalid_records >= self.max_errors_per_stream)
        {
            return;
        }

        let violations = self.validator.validate(record);
        if violations.is_empty() {
            return;
        }

        let stream_errors = self.errors.entry(descriptor).or_default();
        stream_errors.invalid_records += 1;
        stream_errors.paths.extend(violations);
    }

    /// Number of invalid records seen on a stream, capped at the per stream limit.
    pub fn invalid_records(&self, descriptor: &StreamDescriptor) -> u32 {
        self.errors
            .get(descriptor)
            .map(|errors| errors.invalid_records)
            .unwrap_or_default()
    }

    pub fn unexpected_fields(&self, descriptor: &StreamDescriptor) -> Option<&BTreeSet<String>> {
        self.unexpected_fields.get(descriptor)
    }

    /// Logs everything collected and reports invalid streams to the metric reporter.
    pub fn report(&self, metric_reporter: &WorkerMetricReporter) {
        for (descriptor, errors) in &self.errors {
            warn!(
                stream = %descriptor,
                invalid_records = errors.invalid_records,
                paths = ?errors.paths,
                "records did not conform to the stream schema"
            );
            metric_reporter.track_schema_validation_error(descriptor);
        }

        for (descriptor, fields) in &self.unexpected_fields {
            info!(stream = %descriptor, fields = ?fields, "records contained fields not declared in the stream schema");
        }
    }
}
