use chrono::Utc;
use tracing::info;

use crate::error::{ShovelError, ShovelResult};
use crate::metrics::WorkerMetricReporter;
use crate::tracker::MessageTracker;
use crate::types::{
    ConfiguredCatalog, FailureReason, ReplicationAttemptSummary, ReplicationOutput,
    ReplicationStatus, State, StreamSyncStats, SyncStats,
};
use crate::workers::failure::{AttemptRef, failure_from_error, failure_from_trace};

/// Everything the pumps left behind once they both returned.
pub(crate) struct PumpOutcome {
    pub(crate) cancelled: bool,
    pub(crate) source_error: Option<ShovelError>,
    pub(crate) destination_error: Option<ShovelError>,
}

/// Failures of an attempt, the connector reported one first.
fn collect_failures(
    tracker: &MessageTracker,
    outcome: &PumpOutcome,
    attempt: AttemptRef,
) -> ShovelResult<Vec<FailureReason>> {
    let mut failures = Vec::new();

    if let Some(reported) = tracker.first_reported_error()? {
        failures.extend(failure_from_trace(&reported.trace, attempt));
    }
    if let Some(err) = &outcome.source_error {
        failures.push(failure_from_error(err, attempt));
    }
    if let Some(err) = &outcome.destination_error {
        failures.push(failure_from_error(err, attempt));
    }

    Ok(failures)
}

fn total_stats(tracker: &MessageTracker, status: ReplicationStatus) -> ShovelResult<SyncStats> {
    let records_emitted = tracker.total_records_emitted();
    // Everything accepted by a destination that exited cleanly is committed.
    let records_committed = match status {
        ReplicationStatus::Completed => Some(records_emitted),
        _ => tracker.total_records_committed()?,
    };
    let times = tracker.times();

    Ok(SyncStats {
        records_emitted,
        bytes_emitted: tracker.total_bytes_emitted(),
        records_committed,
        estimated_records: tracker.total_estimated_records()?,
        estimated_bytes: tracker.total_estimated_bytes()?,
        source_state_messages_emitted: tracker.total_source_states_emitted(),
        destination_state_messages_emitted: tracker.total_destination_states_emitted(),
        max_seconds_before_source_state_message_emitted: tracker
            .with_state_metrics(|metrics| metrics.max_seconds_before_source_state())?
            .flatten(),
        mean_seconds_before_source_state_message_emitted: tracker
            .with_state_metrics(|metrics| metrics.mean_seconds_before_source_state())?
            .flatten(),
        max_seconds_between_state_message_emitted_and_committed: tracker
            .with_state_metrics(|metrics| metrics.max_seconds_between_emitted_and_committed())?
            .flatten(),
        mean_seconds_between_state_message_emitted_and_committed: tracker
            .with_state_metrics(|metrics| metrics.mean_seconds_between_emitted_and_committed())?
            .flatten(),
        replication_start_time: times.replication_start(),
        replication_end_time: times.replication_end(),
        source_read_start_time: times.source_read_start(),
        source_read_end_time: times.source_read_end(),
        destination_write_start_time: times.destination_write_start(),
        destination_write_end_time: times.destination_write_end(),
    })
}

fn stream_stats(
    tracker: &MessageTracker,
    status: ReplicationStatus,
) -> ShovelResult<Vec<StreamSyncStats>> {
    let committed = match status {
        ReplicationStatus::Completed => None,
        _ => tracker.committed_records_by_stream()?,
    };

    let stats = tracker
        .stream_counters()?
        .into_iter()
        .map(|(descriptor, counters)| {
            let records_committed = match status {
                ReplicationStatus::Completed => Some(counters.records_emitted),
                _ => committed
                    .as_ref()
                    .map(|committed| committed.get(&descriptor).copied().unwrap_or_default()),
            };

            StreamSyncStats {
                stream_name: descriptor.name,
                stream_namespace: descriptor.namespace,
                stats: SyncStats {
                    records_emitted: counters.records_emitted,
                    bytes_emitted: counters.bytes_emitted,
                    records_committed,
                    estimated_records: counters.estimated_records,
                    estimated_bytes: counters.estimated_bytes,
                    ..SyncStats::default()
                },
            }
        })
        .collect();

    Ok(stats)
}

/// Assembles the output of an attempt from what the tracker observed.
///
/// The state acknowledged by the destination wins over the input state, which is carried over
/// untouched when the destination never acknowledged anything.
pub(crate) fn build_replication_output(
    tracker: &MessageTracker,
    outcome: PumpOutcome,
    attempt: AttemptRef,
    input_state: Option<State>,
    output_catalog: ConfiguredCatalog,
    metric_reporter: &WorkerMetricReporter,
) -> ShovelResult<ReplicationOutput> {
    let failures = collect_failures(tracker, &outcome, attempt)?;

    let status = if outcome.cancelled {
        ReplicationStatus::Cancelled
    } else if !failures.is_empty() {
        ReplicationStatus::Failed
    } else {
        ReplicationStatus::Completed
    };

    let total_stats = total_stats(tracker, status)?;
    let stream_stats = stream_stats(tracker, status)?;

    let start_time = total_stats.replication_start_time.unwrap_or_default();
    let end_time = total_stats
        .replication_end_time
        .unwrap_or_else(|| Utc::now().timestamp_millis());

    let summary = ReplicationAttemptSummary {
        status,
        records_synced: total_stats.records_emitted,
        bytes_synced: total_stats.bytes_emitted,
        start_time,
        end_time,
        total_stats,
        stream_stats,
    };

    match serde_json::to_string(&summary) {
        Ok(summary) => info!(%summary, "replication attempt summary"),
        Err(err) => info!(?summary, error = %err, "replication attempt summary"),
    }

    if tracker.state_metrics_unreliable() {
        metric_reporter.track_state_metric_tracker_error();
    }
    metric_reporter.track_replication_finished(
        status,
        summary.records_synced,
        summary.bytes_synced,
        (end_time - start_time).max(0) as f64 / 1000.0,
    );

    let state = match tracker.destination_output_state()? {
        Some(state) => Some(state),
        None => input_state,
    };

    Ok(ReplicationOutput {
        replication_attempt_summary: summary,
        output_catalog,
        state,
        failures,
    })
}
