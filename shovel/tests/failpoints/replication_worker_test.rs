use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use serde_json::json;
use shovel::destination::memory::MemoryDestination;
use shovel::error::{ErrorKind, ShovelError};
use shovel::failpoints::BUILD_REPLICATION_OUTPUT;
use shovel::mapper::IdentityMapper;
use shovel::source::memory::MemorySource;
use shovel::test_utils::catalog::{create_input, users_catalog};
use shovel::test_utils::config_updater::RecordingConfigUpdater;
use shovel::test_utils::failpoints::CustomFailScenario;
use shovel::test_utils::messages::{create_record_in, create_state};
use shovel::test_utils::notify::wait_until;
use shovel::test_utils::worker::create_worker;
use shovel::types::{ReplicationStatus, State};
use shovel::workers::WorkerPhase;
use shovel_telemetry::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn failing_to_build_the_output_fails_the_run() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(BUILD_REPLICATION_OUTPUT, "return")]);

    let input = create_input(users_catalog());
    let source = MemorySource::new(vec![
        create_record_in("users", None, json!({"id": 1})),
        create_state(json!({"cursor": 1})),
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

    let err = worker.run(input, work_dir.path()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WorkerInternal);
    let cause = err
        .source()
        .and_then(|source| source.downcast_ref::<ShovelError>())
        .unwrap();
    assert_eq!(cause.kind(), ErrorKind::FailpointTriggered);
    assert_eq!(*phase.borrow(), WorkerPhase::Failed);
    // The pumps ran to completion before the output was assembled.
    assert_eq!(destination.records().len(), 1);
    assert!(source.is_closed());
    assert!(destination.is_closed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_after_both_pumps_returned_keeps_the_sync_completed() {
    init_test_tracing();
    let scenario = CustomFailScenario::setup(&[]);

    // Holds the worker right before the output is assembled until released.
    let reached = Arc::new(AtomicBool::new(false));
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    fail::cfg_callback(BUILD_REPLICATION_OUTPUT, {
        let reached = reached.clone();
        move || {
            reached.store(true, Ordering::SeqCst);
            let _ = release_rx.lock().unwrap().recv();
        }
    })
    .unwrap();

    let input = create_input(users_catalog());
    let source = MemorySource::new(vec![
        create_record_in("users", None, json!({"id": 1})),
        create_state(json!({"cursor": 1})),
    ]);
    let destination = MemoryDestination::new();
    let worker = Arc::new(create_worker(
        &input,
        source,
        destination,
        IdentityMapper,
        RecordingConfigUpdater::new(),
    ));
    let work_dir = tempfile::tempdir().unwrap();

    let run = tokio::spawn({
        let worker = worker.clone();
        let work_dir = work_dir.path().to_path_buf();
        async move { worker.run(input, &work_dir).await }
    });

    wait_until(|| reached.load(Ordering::SeqCst)).await;
    worker.cancel().await;
    release_tx.send(()).unwrap();

    let output = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(output.replication_attempt_summary.status, ReplicationStatus::Completed);
    assert_eq!(
        output.state,
        Some(State {
            state: json!({"cursor": 1})
        })
    );
    assert!(output.failures.is_empty());
    assert_eq!(*worker.phase().borrow(), WorkerPhase::Completed);

    fail::remove(BUILD_REPLICATION_OUTPUT);
    scenario.teardown();
}
