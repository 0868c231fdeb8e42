use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::StreamDescriptor;

/// A single protocol message emitted or consumed by a connector.
///
/// On the wire every message is one JSON object whose `type` field names the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    Record(RecordMessage),
    State(StateMessage),
    Log(LogMessage),
    Trace(TraceMessage),
    Control(ControlMessage),
}

impl Message {
    /// Name of the variant, used in logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Record(_) => "RECORD",
            Message::State(_) => "STATE",
            Message::Log(_) => "LOG",
            Message::Trace(_) => "TRACE",
            Message::Control(_) => "CONTROL",
        }
    }
}

/// A row of data belonging to one stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMessage {
    pub stream: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub data: Value,
    /// Milliseconds since the Unix epoch.
    pub emitted_at: i64,
}

impl RecordMessage {
    pub fn descriptor(&self) -> StreamDescriptor {
        StreamDescriptor::new(self.stream.clone(), self.namespace.clone())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateType {
    /// A single opaque blob covering the whole connection.
    #[default]
    Legacy,
    /// Checkpoint of one stream.
    Stream,
    /// Checkpoint shared by all streams.
    Global,
}

/// A checkpoint emitted by the source and acknowledged by the destination once everything before
/// it has been committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMessage {
    #[serde(default)]
    pub state_type: StateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamDescriptor>,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub level: LogLevel,
    pub message: String,
}

/// Category of a failure reported by a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    ConfigError,
    SystemError,
    TransientError,
}

/// A failure the connector reported on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorTrace {
    /// User facing message.
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_type: Option<FailureType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstimateType {
    Stream,
    Sync,
}

/// The connector's guess of how much data the sync is going to move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateTrace {
    #[serde(rename = "type")]
    pub estimate_type: EstimateType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub row_estimate: u64,
    #[serde(default)]
    pub byte_estimate: u64,
}

impl EstimateTrace {
    pub fn descriptor(&self) -> StreamDescriptor {
        StreamDescriptor::new(self.name.clone(), self.namespace.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trace_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trace {
    Error(ErrorTrace),
    Estimate(EstimateTrace),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceMessage {
    /// Seconds since the Unix epoch.
    pub emitted_at: f64,
    pub trace: Trace,
}

impl TraceMessage {
    pub fn error(&self) -> Option<&ErrorTrace> {
        match &self.trace {
            Trace::Error(error) => Some(error),
            Trace::Estimate(_) => None,
        }
    }
}

/// A connector asking the platform to persist a new version of its configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Seconds since the Unix epoch.
    pub emitted_at: f64,
    pub connector_config: Value,
}
