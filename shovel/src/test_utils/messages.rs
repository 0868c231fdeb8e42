use serde_json::Value;

use crate::types::{
    ControlMessage, ErrorTrace, EstimateTrace, EstimateType, FailureType, LogLevel, LogMessage,
    Message, RecordMessage, StateMessage, StateType, StreamDescriptor, Trace, TraceMessage,
};

/// Timestamp used for every record built here, in milliseconds.
pub const RECORD_EMITTED_AT: i64 = 1_700_000_000_000;

pub fn create_record(stream: &str, data: Value) -> RecordMessage {
    RecordMessage {
        stream: stream.to_string(),
        namespace: None,
        data,
        emitted_at: RECORD_EMITTED_AT,
    }
}

pub fn create_record_in(stream: &str, namespace: Option<&str>, data: Value) -> Message {
    Message::Record(RecordMessage {
        namespace: namespace.map(str::to_string),
        ..create_record(stream, data)
    })
}

/// Legacy state covering the whole connection.
pub fn create_state(data: Value) -> Message {
    Message::State(StateMessage {
        state_type: StateType::Legacy,
        stream: None,
        data,
    })
}

pub fn create_stream_state(stream: &str, data: Value) -> Message {
    Message::State(StateMessage {
        state_type: StateType::Stream,
        stream: Some(StreamDescriptor::new(stream, None)),
        data,
    })
}

pub fn create_global_state(data: Value) -> Message {
    Message::State(StateMessage {
        state_type: StateType::Global,
        stream: None,
        data,
    })
}

pub fn create_log(level: LogLevel, message: &str) -> Message {
    Message::Log(LogMessage {
        level,
        message: message.to_string(),
    })
}

/// Error trace emitted at `emitted_at` seconds since the epoch.
pub fn create_error_trace(message: &str, emitted_at: f64) -> Message {
    Message::Trace(TraceMessage {
        emitted_at,
        trace: Trace::Error(ErrorTrace {
            message: message.to_string(),
            internal_message: Some(format!("internal: {message}")),
            stack_trace: Some(format!("stack trace of {message}")),
            failure_type: Some(FailureType::SystemError),
        }),
    })
}

pub fn create_estimate_trace(
    estimate_type: EstimateType,
    name: &str,
    row_estimate: u64,
    byte_estimate: u64,
) -> Message {
    Message::Trace(TraceMessage {
        emitted_at: 0.0,
        trace: Trace::Estimate(EstimateTrace {
            estimate_type,
            name: name.to_string(),
            namespace: None,
            row_estimate,
            byte_estimate,
        }),
    })
}

pub fn create_control(connector_config: Value) -> Message {
    Message::Control(ControlMessage {
        emitted_at: 0.0,
        connector_config,
    })
}

/// Builds `count` records on `stream` with increasing ids starting at 1.
pub fn create_records(stream: &str, count: u64) -> Vec<Message> {
    (1..=count)
        .map(|id| create_record_in(stream, None, serde_json::json!({"id": id})))
        .collect()
}
