use chrono::Utc;

use crate::error::ShovelError;
use crate::types::{
    FailureMetadata, FailureOrigin, FailureReason, FailureType, JobId, TraceMessage,
};

const SOURCE_EXTERNAL_MESSAGE: &str = "Something went wrong within the source connector";
const DESTINATION_EXTERNAL_MESSAGE: &str = "Something went wrong within the destination connector";
const REPLICATION_EXTERNAL_MESSAGE: &str = "Something went wrong during replication";

/// Identifies the attempt failures are reported for.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AttemptRef {
    pub(crate) job_id: JobId,
    pub(crate) attempt: u32,
}

impl AttemptRef {
    fn metadata(&self, from_trace_message: bool) -> FailureMetadata {
        FailureMetadata {
            job_id: self.job_id,
            attempt_number: self.attempt,
            from_trace_message,
        }
    }
}

/// Component an error is attributed to, derived from its kind.
pub(crate) fn failure_origin(err: &ShovelError) -> FailureOrigin {
    let kind = err.kind();
    if kind.is_source() {
        FailureOrigin::Source
    } else if kind.is_destination() {
        FailureOrigin::Destination
    } else {
        FailureOrigin::Replication
    }
}

/// Failure reason of an error a pump stopped with.
pub(crate) fn failure_from_error(err: &ShovelError, attempt: AttemptRef) -> FailureReason {
    let origin = failure_origin(err);
    let external_message = match origin {
        FailureOrigin::Source => SOURCE_EXTERNAL_MESSAGE,
        FailureOrigin::Destination => DESTINATION_EXTERNAL_MESSAGE,
        FailureOrigin::Replication => REPLICATION_EXTERNAL_MESSAGE,
    };

    FailureReason {
        failure_origin: origin,
        failure_type: None,
        internal_message: Some(err.chain_message()),
        external_message: Some(external_message.to_string()),
        stacktrace: Some(err.to_string()),
        retryable: None,
        timestamp: Utc::now().timestamp_millis(),
        metadata: attempt.metadata(false),
    }
}

/// Failure reason of an error trace a connector reported on its own.
///
/// Reported failures are attributed to the destination whichever side emitted them. Returns
/// `None` for traces that are not errors.
pub(crate) fn failure_from_trace(
    trace: &TraceMessage,
    attempt: AttemptRef,
) -> Option<FailureReason> {
    let error = trace.error()?;

    Some(FailureReason {
        failure_origin: FailureOrigin::Destination,
        failure_type: error.failure_type,
        internal_message: error.internal_message.clone(),
        external_message: Some(error.message.clone()),
        stacktrace: error.stack_trace.clone(),
        retryable: error
            .failure_type
            .map(|failure_type| failure_type != FailureType::ConfigError),
        timestamp: (trace.emitted_at * 1000.0) as i64,
        metadata: attempt.metadata(true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::shovel_error;
    use crate::test_utils::messages::{create_error_trace, create_estimate_trace};
    use crate::types::{EstimateType, Message};

    const ATTEMPT: AttemptRef = AttemptRef {
        job_id: 7,
        attempt: 2,
    };

    fn trace(message: Message) -> TraceMessage {
        match message {
            Message::Trace(trace) => trace,
            other => panic!("expected a trace, got {other:?}"),
        }
    }

    #[test]
    fn origin_follows_error_kind() {
        let source = shovel_error!(ErrorKind::SourceReadFailed, "read failed");
        let destination = shovel_error!(ErrorKind::DestinationWriteFailed, "write failed");
        let replication = shovel_error!(ErrorKind::SerializationError, "bad payload");

        assert_eq!(failure_origin(&source), FailureOrigin::Source);
        assert_eq!(failure_origin(&destination), FailureOrigin::Destination);
        assert_eq!(failure_origin(&replication), FailureOrigin::Replication);
    }

    #[test]
    fn error_failure_keeps_the_whole_chain() {
        let cause = shovel_error!(ErrorKind::IoError, "Broken pipe", "connector stdin closed");
        let err = shovel_error!(
            ErrorKind::DestinationWriteFailed,
            "Failed to write a message to the destination",
            source: cause
        );

        let failure = failure_from_error(&err, ATTEMPT);

        assert_eq!(failure.failure_origin, FailureOrigin::Destination);
        assert_eq!(
            failure.external_message.as_deref(),
            Some(DESTINATION_EXTERNAL_MESSAGE)
        );
        assert!(
            failure
                .internal_message
                .unwrap()
                .contains("connector stdin closed")
        );
        assert!(!failure.metadata.from_trace_message);
        assert_eq!(failure.metadata.job_id, 7);
    }

    #[test]
    fn trace_failure_uses_reported_messages() {
        let failure = failure_from_trace(&trace(create_error_trace("boom", 12.5)), ATTEMPT).unwrap();

        assert_eq!(failure.failure_origin, FailureOrigin::Destination);
        assert_eq!(failure.external_message.as_deref(), Some("boom"));
        assert_eq!(failure.internal_message.as_deref(), Some("internal: boom"));
        assert_eq!(failure.timestamp, 12_500);
        assert_eq!(failure.retryable, Some(true));
        assert!(failure.metadata.from_trace_message);
    }

    #[test]
    fn estimate_traces_are_not_failures() {
        let estimate = trace(create_estimate_trace(EstimateType::Sync, "all", 1, 1));

        assert!(failure_from_trace(&estimate, ATTEMPT).is_none());
    }
}
