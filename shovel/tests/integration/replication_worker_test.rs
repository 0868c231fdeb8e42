use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use shovel::destination::memory::MemoryDestination;
use shovel::error::ErrorKind;
use shovel::mapper::{IdentityMapper, NamespacingMapper};
use shovel::source::memory::MemorySource;
use shovel::test_utils::FaultType;
use shovel::test_utils::catalog::{
    create_catalog, create_input, create_input_with_state, create_stream, users_catalog,
};
use shovel::test_utils::config_updater::{ConfigUpdate, RecordingConfigUpdater};
use shovel::test_utils::destination::{DestinationFaults, TestDestinationWrapper};
use shovel::test_utils::messages::{
    create_control, create_error_trace, create_estimate_trace, create_log, create_record_in,
    create_records, create_state,
};
use shovel::test_utils::notify::wait_until;
use shovel::test_utils::source::{SourceFaults, TestSourceWrapper};
use shovel::test_utils::worker::{
    TEST_JOB_ID, create_worker, create_worker_with_config, test_worker_config,
};
use shovel::types::{
    EstimateType, FailureOrigin, LogLevel, Message, NamespaceDefinition, ReplicationStatus, State,
};
use shovel::workers::WorkerPhase;
use shovel_config::shared::WorkerConfig;
use shovel_telemetry::init_test_tracing;

fn record_ids(destination: &MemoryDestination) -> Vec<u64> {
    destination
        .records()
        .iter()
        .filter_map(|record| record.data["id"].as_u64())
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn records_reach_the_destination_in_source_order() {
    init_test_tracing();

    let input = create_input(users_catalog());
    let source = MemorySource::new(create_records("users", 250));
    let destination = MemoryDestination::new();
    let worker = create_worker(
        &input,
        source,
        destination.clone(),
        IdentityMapper,
        RecordingConfigUpdater::new(),
    );
    let work_dir = tempfile::tempdir().unwrap();

    let output = worker.run(input, work_dir.path()).await.unwrap();

    assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Completed);
    assert_eq!(record_ids(&destination), (1..=250).collect::<Vec<_>>());
    assert!(destination.received_end_of_input());
}

#[tokio::test(flavor = "multi_thread")]
async fn completed_sync_accounts_for_every_record() {
    init_test_tracing();

    let input = create_input(users_catalog());
    let source = MemorySource::new(vec![
        create_record_in("users", None, json!({"id": 1, "name": "ada"})),
        create_record_in("users", None, json!({"id": 2, "name": "grace"})),
        create_state(json!({"cursor": 2})),
    ]);
    let destination = MemoryDestination::new();
    let worker = create_worker(
        &input,
        source.clone(),
        destination.clone(),
        IdentityMapper,
        RecordingConfigUpdater::new(),
    );
    let phase = worker.phase();
    let work_dir = tempfile::tempdir().unwrap();

    let output = worker.run(input.clone(), work_dir.path()).await.unwrap();
    let summary = &output.replication_attempt_summary;

    assert_eq!(summary.status, ReplicationStatus::Completed);
    assert_eq!(summary.records_synced, 2);
    assert_eq!(summary.total_stats.records_committed, Some(2));
    assert_eq!(summary.total_stats.source_state_messages_emitted, 1);
    assert_eq!(summary.total_stats.destination_state_messages_emitted, 1);
    assert!(summary.start_time <= summary.end_time);
    assert!(summary.total_stats.source_read_end_time.is_some());
    assert!(summary.total_stats.destination_write_end_time.is_some());
    assert_eq!(summary.stream_stats.len(), 1);
    assert_eq!(summary.stream_stats[0].stream_name, "users");
    assert_eq!(summary.stream_stats[0].stats.records_emitted, 2);
    assert_eq!(summary.stream_stats[0].stats.records_committed, Some(2));
    assert!(output.failures.is_empty());
    assert_eq!(
        output.state,
        Some(State {
            state: json!({"cursor": 2})
        })
    );
    assert_eq!(output.output_catalog, input.catalog);
    assert_eq!(*phase.borrow(), WorkerPhase::Completed);
    assert!(source.is_closed());
    assert!(destination.is_closed());
}

#[tokio::test(flavor = "multi_thread")]
async fn nonzero_source_exit_value_fails_with_source_origin() {
    init_test_tracing();

    let input = create_input(users_catalog());
    let source = MemorySource::new(create_records("users", 3)).with_exit_value(1);
    let destination = MemoryDestination::new();
    let worker = create_worker(
        &input,
        source,
        destination,
        IdentityMapper,
        RecordingConfigUpdater::new(),
    );
    let work_dir = tempfile::tempdir().unwrap();

    let output = worker.run(input, work_dir.path()).await.unwrap();

    assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Failed);
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].failure_origin, FailureOrigin::Source);
    assert_eq!(output.failures[0].metadata.job_id, TEST_JOB_ID);
    assert!(
        output.failures[0]
            .internal_message
            .as_deref()
            .unwrap()
            .contains("exit value 1")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn source_read_failure_fails_with_source_origin() {
    init_test_tracing();

    let input = create_input(users_catalog());
    let source = TestSourceWrapper::wrap(
        MemorySource::new(create_records("users", 5)),
        SourceFaults {
            read: Some(FaultType::Error),
            read_after: 2,
            ..Default::default()
        },
    );
    let destination = MemoryDestination::new();
    let worker = create_worker(
        &input,
        source.clone(),
        destination.clone(),
        IdentityMapper,
        RecordingConfigUpdater::new(),
    );
    let work_dir = tempfile::tempdir().unwrap();

    let output = worker.run(input, work_dir.path()).await.unwrap();

    assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Failed);
    assert_eq!(output.replication_attempt_summary.records_synced, 2);
    assert!(
        output
            .failures
            .iter()
            .any(|failure| failure.failure_origin == FailureOrigin::Source)
    );
    assert_eq!(record_ids(&destination), vec![1, 2]);
    assert!(source.wrapped().is_closed());
}

#[tokio::test(flavor = "multi_thread")]
async fn destination_accept_failure_carries_the_original_error() {
    init_test_tracing();

    let input = create_input(users_catalog());
    let source = MemorySource::new(create_records("users", 5));
    let destination = TestDestinationWrapper::wrap(
        MemoryDestination::new(),
        DestinationFaults {
            accept: Some(FaultType::Error),
            accept_after: 1,
            ..Default::default()
        },
    );
    let worker = create_worker(
        &input,
        source,
        destination.clone(),
        IdentityMapper,
        RecordingConfigUpdater::new(),
    );
    let work_dir = tempfile::tempdir().unwrap();

    let output = worker.run(input, work_dir.path()).await.unwrap();

    assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Failed);
    assert_eq!(output.replication_attempt_summary.total_stats.records_committed, None);
    let failure = output
        .failures
        .iter()
        .find(|failure| failure.failure_origin == FailureOrigin::Destination)
        .expect("a destination failure");
    assert!(
        failure
            .internal_message
            .as_deref()
            .unwrap()
            .contains("injected destination accept failure")
    );
    assert_eq!(destination.accepted_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn end_of_input_failure_fails_with_destination_origin() {
    init_test_tracing();

    let input = create_input(users_catalog());
    let source = MemorySource::new(create_records("users", 2));
    let destination = TestDestinationWrapper::wrap(
        MemoryDestination::new(),
        DestinationFaults {
            notify_end_of_input: Some(FaultType::Error),
            ..Default::default()
        },
    );
    let worker = create_worker(
        &input,
        source,
        destination.clone(),
        IdentityMapper,
        RecordingConfigUpdater::new(),
    );
    let work_dir = tempfile::tempdir().unwrap();

    let output = worker.run(input, work_dir.path()).await.unwrap();

    assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Failed);
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].failure_origin, FailureOrigin::Destination);
    // The destination never got the end of input, the stop signal ended its pump.
    assert!(!destination.wrapped().received_end_of_input());
}

#[tokio::test(flavor = "multi_thread")]
async fn nonzero_destination_exit_value_fails_with_destination_origin() {
    init_test_tracing();

    let input = create_input(users_catalog());
    let source = MemorySource::new(create_records("users", 2));
    let destination = MemoryDestination::new().with_exit_value(3);
    let worker = create_worker(
        &input,
        source,
        destination,
        IdentityMapper,
        RecordingConfigUpdater::new(),
    );
    let work_dir = tempfile::tempdir().unwrap();

    let output = worker.run(input, work_dir.path()).await.unwrap();

    assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Failed);
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].failure_origin, FailureOrigin::Destination);
}

#[tokio::test(flavor = "multi_thread")]
async fn acknowledged_state_survives_a_source_failure() {
    init_test_tracing();

    let input = create_input_with_state(users_catalog(), json!({"cursor": 0}));
    let (source, gate) = TestSourceWrapper::wrap(
        MemorySource::new(vec![
            create_record_in("users", None, json!({"id": 1})),
            create_state(json!({"cursor": 1})),
            create_record_in("users", None, json!({"id": 2})),
        ]),
        SourceFaults {
            read: Some(FaultType::Error),
            read_after: 2,
            ..Default::default()
        },
    )
    .with_gate(2);
    let destination = MemoryDestination::new();
    let worker = Arc::new(create_worker(
        &input,
        source,
        destination.clone(),
        IdentityMapper,
        RecordingConfigUpdater::new(),
    ));
    let work_dir = tempfile::tempdir().unwrap();

    let run = tokio::spawn({
        let worker = worker.clone();
        let work_dir = work_dir.path().to_path_buf();
        async move { worker.run(input, &work_dir).await }
    });

    // Let the destination pump read the acknowledgment before the source fails.
    wait_until(|| destination.accepted_messages().len() == 2 && destination.pending_output() == 0)
        .await;
    gate.notify_one();

    let output = run.await.unwrap().unwrap();

    assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Failed);
    assert_eq!(
        output.state,
        Some(State {
            state: json!({"cursor": 1})
        })
    );
    assert_eq!(
        output.replication_attempt_summary.total_stats.records_committed,
        Some(1)
    );
    assert_eq!(output.failures[0].failure_origin, FailureOrigin::Source);
}

/// Worker configuration where the destination pump sleeps long enough to be idle when the
/// attempt is stopped.
fn slow_destination_polling_config() -> WorkerConfig {
    WorkerConfig {
        idle_poll_interval_ms: 2_000,
        ..test_worker_config()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn state_acknowledged_while_the_destination_pump_idles_survives_a_source_failure() {
    init_test_tracing();

    let input = create_input_with_state(users_catalog(), json!({"cursor": 0}));
    let source = TestSourceWrapper::wrap(
        MemorySource::new(vec![
            create_record_in("users", None, json!({"id": 1})),
            create_state(json!({"cursor": 1})),
            create_record_in("users", None, json!({"id": 2})),
        ]),
        SourceFaults {
            read: Some(FaultType::Error),
            read_after: 2,
            ..Default::default()
        },
    );
    let destination = MemoryDestination::new();
    let worker = create_worker_with_config(
        &input,
        source,
        destination.clone(),
        IdentityMapper,
        RecordingConfigUpdater::new(),
        slow_destination_polling_config(),
    );
    let work_dir = tempfile::tempdir().unwrap();

    let output = tokio::time::timeout(Duration::from_secs(5), worker.run(input, work_dir.path()))
        .await
        .expect("a stopped destination pump does not wait for its next poll")
        .unwrap();

    assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Failed);
    assert_eq!(
        output.state,
        Some(State {
            state: json!({"cursor": 1})
        })
    );
    assert_eq!(destination.pending_output(), 0);
    assert_eq!(output.failures[0].failure_origin, FailureOrigin::Source);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_keeps_a_state_acknowledged_while_the_destination_pump_idles() {
    init_test_tracing();

    let input = create_input(users_catalog());
    let source = MemorySource::never_finishing(vec![
        create_record_in("users", None, json!({"id": 1})),
        create_state(json!({"cursor": 1})),
    ]);
    let destination = MemoryDestination::new();
    let worker = Arc::new(create_worker_with_config(
        &input,
        source,
        destination.clone(),
        IdentityMapper,
        RecordingConfigUpdater::new(),
        slow_destination_polling_config(),
    ));
    let work_dir = tempfile::tempdir().unwrap();

    let run = tokio::spawn({
        let worker = worker.clone();
        let work_dir = work_dir.path().to_path_buf();
        async move { worker.run(input, &work_dir).await }
    });

    wait_until(|| destination.accepted_messages().len() == 2).await;
    worker.cancel().await;

    let output = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run returns shortly after cancel")
        .unwrap()
        .unwrap();

    assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Cancelled);
    assert_eq!(
        output.state,
        Some(State {
            state: json!({"cursor": 1})
        })
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn input_state_is_kept_when_nothing_was_acknowledged() {
    init_test_tracing();

    let input = create_input_with_state(users_catalog(), json!({"cursor": 41}));
    let source = TestSourceWrapper::wrap(
        MemorySource::new(create_records("users", 2)),
        SourceFaults {
            read: Some(FaultType::Error),
            ..Default::default()
        },
    );
    let destination = MemoryDestination::new();
    let worker = create_worker(
        &input,
        source,
        destination,
        IdentityMapper,
        RecordingConfigUpdater::new(),
    );
    let work_dir = tempfile::tempdir().unwrap();

    let output = worker.run(input, work_dir.path()).await.unwrap();

    assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Failed);
    assert_eq!(
        output.state,
        Some(State {
            state: json!({"cursor": 41})
        })
    );
    assert_eq!(output.replication_attempt_summary.records_synced, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn field_selection_strips_undeclared_fields() {
    init_test_tracing();

    for (field_selection_enabled, expected) in [
        (true, json!({"id": 1, "name": "ada"})),
        (false, json!({"id": 1, "name": "ada", "password": "secret"})),
    ] {
        let mut input = create_input(users_catalog());
        input.field_selection_enabled = field_selection_enabled;
        let source = MemorySource::new(vec![create_record_in(
            "users",
            None,
            json!({"id": 1, "name": "ada", "password": "secret"}),
        )]);
        let destination = MemoryDestination::new();
        let worker = create_worker(
            &input,
            source,
            destination.clone(),
            IdentityMapper,
            RecordingConfigUpdater::new(),
        );
        let work_dir = tempfile::tempdir().unwrap();

        let output = worker.run(input, work_dir.path()).await.unwrap();

        assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Completed);
        assert_eq!(destination.records()[0].data, expected);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn field_selection_without_declared_properties_fails_the_sync() {
    init_test_tracing();

    let mut input = create_input(create_catalog(vec![create_stream(
        "users",
        None,
        json!({"type": "object"}),
    )]));
    input.field_selection_enabled = true;
    let source = MemorySource::new(create_records("users", 1));
    let destination = MemoryDestination::new();
    let worker = create_worker(
        &input,
        source,
        destination.clone(),
        IdentityMapper,
        RecordingConfigUpdater::new(),
    );
    let work_dir = tempfile::tempdir().unwrap();

    let output = worker.run(input, work_dir.path()).await.unwrap();

    assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Failed);
    assert_eq!(output.failures[0].failure_origin, FailureOrigin::Replication);
    assert!(destination.records().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_stops_a_source_that_never_finishes() {
    init_test_tracing();

    let input = create_input(users_catalog());
    let source = MemorySource::never_finishing(vec![
        create_record_in("users", None, json!({"id": 1})),
        create_state(json!({"cursor": 1})),
    ]);
    let destination = MemoryDestination::new();
    let worker = Arc::new(create_worker(
        &input,
        source.clone(),
        destination.clone(),
        IdentityMapper,
        RecordingConfigUpdater::new(),
    ));
    let phase = worker.phase();
    let work_dir = tempfile::tempdir().unwrap();

    let run = tokio::spawn({
        let worker = worker.clone();
        let work_dir = work_dir.path().to_path_buf();
        async move { worker.run(input, &work_dir).await }
    });

    wait_until(|| destination.accepted_messages().len() == 2 && destination.pending_output() == 0)
        .await;
    worker.cancel().await;
    // A second cancellation is a no-op.
    worker.cancel().await;

    let output = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run returns shortly after cancel")
        .unwrap()
        .unwrap();

    assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Cancelled);
    assert_eq!(
        output.state,
        Some(State {
            state: json!({"cursor": 1})
        })
    );
    assert!(output.failures.is_empty());
    assert!(source.is_cancelled());
    assert!(destination.is_cancelled());
    assert_eq!(*phase.borrow(), WorkerPhase::Cancelled);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_interrupts_a_blocked_destination() {
    init_test_tracing();

    let input = create_input(users_catalog());
    let source = MemorySource::new(create_records("users", 10));
    let destination = TestDestinationWrapper::wrap(
        MemoryDestination::new(),
        DestinationFaults {
            accept: Some(FaultType::Hang),
            accept_after: 3,
            ..Default::default()
        },
    );
    let worker = Arc::new(create_worker(
        &input,
        source,
        destination.clone(),
        IdentityMapper,
        RecordingConfigUpdater::new(),
    ));
    let work_dir = tempfile::tempdir().unwrap();

    let run = tokio::spawn({
        let worker = worker.clone();
        let work_dir = work_dir.path().to_path_buf();
        async move { worker.run(input, &work_dir).await }
    });

    destination.wait_for_accepted(3).notified().await;
    worker.cancel().await;

    let output = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run returns shortly after cancel")
        .unwrap()
        .unwrap();

    assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Cancelled);
    assert_eq!(output.replication_attempt_summary.total_stats.records_committed, None);
    assert_eq!(destination.accepted_count(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn logs_and_estimates_are_not_forwarded() {
    init_test_tracing();

    let input = create_input(users_catalog());
    let source = MemorySource::new(vec![
        create_log(LogLevel::Info, "starting read"),
        create_estimate_trace(EstimateType::Stream, "users", 100, 2_000),
        create_record_in("users", None, json!({"id": 1})),
        create_log(LogLevel::Warn, "slow upstream"),
    ]);
    let destination = MemoryDestination::new();
    let worker = create_worker(
        &input,
        source,
        destination.clone(),
        IdentityMapper,
        RecordingConfigUpdater::new(),
    );
    let work_dir = tempfile::tempdir().unwrap();

    let output = worker.run(input, work_dir.path()).await.unwrap();
    let summary = &output.replication_attempt_summary;

    assert_eq!(summary.status, ReplicationStatus::Completed);
    assert!(
        destination
            .accepted_messages()
            .iter()
            .all(|message| matches!(message, Message::Record(_)))
    );
    assert_eq!(destination.accepted_messages().len(), 1);
    assert_eq!(summary.total_stats.estimated_records, Some(100));
    assert_eq!(summary.stream_stats[0].stats.estimated_bytes, Some(2_000));
}

#[tokio::test(flavor = "multi_thread")]
async fn source_control_message_is_persisted_once_even_when_persistence_fails() {
    init_test_tracing();

    let input = create_input(users_catalog());
    let source = MemorySource::new(vec![
        create_record_in("users", None, json!({"id": 1})),
        create_control(json!({"api_key": "rotated"})),
        create_record_in("users", None, json!({"id": 2})),
    ]);
    let destination = MemoryDestination::new();
    let config_updater = RecordingConfigUpdater::failing();
    let worker = create_worker(
        &input,
        source,
        destination.clone(),
        IdentityMapper,
        config_updater.clone(),
    );
    let work_dir = tempfile::tempdir().unwrap();

    let output = worker.run(input.clone(), work_dir.path()).await.unwrap();

    assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Completed);
    assert_eq!(
        config_updater.updates(),
        vec![ConfigUpdate::Source(
            input.source_id,
            json!({"api_key": "rotated"})
        )]
    );
    assert_eq!(record_ids(&destination), vec![1, 2]);
}

#[tokio::test(flavor = "multi_thread")]
async fn destination_control_message_updates_the_destination() {
    init_test_tracing();

    let input = create_input(users_catalog());
    let source = MemorySource::new(create_records("users", 1));
    let destination = MemoryDestination::new();
    destination.emit(create_control(json!({"token": "refreshed"})));
    let config_updater = RecordingConfigUpdater::new();
    let worker = create_worker(
        &input,
        source,
        destination,
        IdentityMapper,
        config_updater.clone(),
    );
    let work_dir = tempfile::tempdir().unwrap();

    let output = worker.run(input.clone(), work_dir.path()).await.unwrap();

    assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Completed);
    assert_eq!(
        config_updater.updates(),
        vec![ConfigUpdate::Destination(
            input.destination_id,
            json!({"token": "refreshed"})
        )]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn reported_error_trace_fails_the_sync() {
    init_test_tracing();

    let input = create_input(users_catalog());
    let source = MemorySource::new(vec![
        create_record_in("users", None, json!({"id": 1})),
        create_error_trace("quota exceeded", 1_700_000_000.0),
    ]);
    let destination = MemoryDestination::new();
    let worker = create_worker(
        &input,
        source,
        destination,
        IdentityMapper,
        RecordingConfigUpdater::new(),
    );
    let work_dir = tempfile::tempdir().unwrap();

    let output = worker.run(input, work_dir.path()).await.unwrap();

    assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Failed);
    assert_eq!(output.failures.len(), 1);
    let failure = &output.failures[0];
    assert_eq!(failure.failure_origin, FailureOrigin::Destination);
    assert_eq!(failure.external_message.as_deref(), Some("quota exceeded"));
    assert_eq!(failure.timestamp, 1_700_000_000_000);
    assert!(failure.metadata.from_trace_message);
}

#[tokio::test(flavor = "multi_thread")]
async fn destination_start_failure_is_returned_and_closes_the_source() {
    init_test_tracing();

    let input = create_input(users_catalog());
    let source = MemorySource::new(create_records("users", 1));
    let destination = TestDestinationWrapper::wrap(
        MemoryDestination::new(),
        DestinationFaults {
            start: Some(FaultType::Error),
            ..Default::default()
        },
    );
    let worker = create_worker(
        &input,
        source.clone(),
        destination,
        IdentityMapper,
        RecordingConfigUpdater::new(),
    );
    let phase = worker.phase();
    let work_dir = tempfile::tempdir().unwrap();

    let err = worker.run(input, work_dir.path()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DestinationStartFailed);
    assert!(source.is_closed());
    assert_eq!(*phase.borrow(), WorkerPhase::Failed);
}

#[tokio::test(flavor = "multi_thread")]
async fn source_start_failure_is_returned() {
    init_test_tracing();

    let input = create_input(users_catalog());
    let source = TestSourceWrapper::wrap(
        MemorySource::new(create_records("users", 1)),
        SourceFaults {
            start: Some(FaultType::Error),
            ..Default::default()
        },
    );
    let destination = MemoryDestination::new();
    let worker = create_worker(
        &input,
        source,
        destination.clone(),
        IdentityMapper,
        RecordingConfigUpdater::new(),
    );
    let work_dir = tempfile::tempdir().unwrap();

    let err = worker.run(input, work_dir.path()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceStartFailed);
    assert!(destination.started_with().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn panicking_destination_read_is_a_replication_failure() {
    init_test_tracing();

    let input = create_input(users_catalog());
    let source = MemorySource::never_finishing(create_records("users", 1));
    let destination = TestDestinationWrapper::wrap(
        MemoryDestination::new(),
        DestinationFaults {
            read: Some(FaultType::Panic),
            ..Default::default()
        },
    );
    let worker = create_worker(
        &input,
        source,
        destination,
        IdentityMapper,
        RecordingConfigUpdater::new(),
    );
    let work_dir = tempfile::tempdir().unwrap();

    let output = tokio::time::timeout(Duration::from_secs(5), worker.run(input, work_dir.path()))
        .await
        .expect("the panic stops the source pump")
        .unwrap();

    assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Failed);
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].failure_origin, FailureOrigin::Replication);
}

#[tokio::test(flavor = "multi_thread")]
async fn namespacing_mapper_renames_streams_for_the_destination() {
    init_test_tracing();

    let mut input = create_input(create_catalog(vec![create_stream(
        "users",
        Some("public"),
        json!({"type": "object", "properties": {"id": {"type": "integer"}}}),
    )]));
    input.namespace_definition = NamespaceDefinition::CustomFormat("${SOURCE_NAMESPACE}_raw".to_string());
    input.prefix = Some("app_".to_string());
    let source = MemorySource::new(vec![create_record_in(
        "users",
        Some("public"),
        json!({"id": 1}),
    )]);
    let destination = MemoryDestination::new();
    let mapper = NamespacingMapper::new(input.namespace_definition.clone(), input.prefix.clone());
    let worker = create_worker(
        &input,
        source,
        destination.clone(),
        mapper,
        RecordingConfigUpdater::new(),
    );
    let work_dir = tempfile::tempdir().unwrap();

    let output = worker.run(input, work_dir.path()).await.unwrap();

    let records = destination.records();
    assert_eq!(records[0].stream, "app_users");
    assert_eq!(records[0].namespace.as_deref(), Some("public_raw"));
    assert_eq!(output.output_catalog.streams[0].stream.name, "app_users");
    assert_eq!(
        destination.started_with().unwrap().catalog,
        output.output_catalog
    );
    assert_eq!(
        output.replication_attempt_summary.stream_stats[0].stream_name,
        "app_users"
    );
}
