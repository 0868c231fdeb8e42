//! Bookkeeping of everything observed while a sync runs.
//!
//! The [`MessageTracker`] is fed by both pumps concurrently. Totals are atomics, everything keyed
//! by stream or by state lives behind its own lock so that the source side and the destination
//! side rarely contend. Read accessors are meant for finalization, once both pumps have joined.

mod state_aggregator;
mod state_delta;
mod state_metrics;
mod times;

use std::collections::{BTreeMap, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde_json::Value;
use shovel_config::shared::TrackerConfig;
use tracing::{debug, warn};

pub use state_aggregator::StateAggregator;
pub use state_delta::{StateDeltaError, StateDeltaTracker};
pub use state_metrics::{StateMetricsError, StateMetricsTracker};
pub use times::TimeTracker;

use crate::error::{ErrorKind, ShovelResult, serialization_error};
use crate::shovel_error;
use crate::types::{
    EstimateTrace, EstimateType, Message, RecordMessage, State, StateMessage, StreamDescriptor,
    Trace, TraceMessage,
};

/// Connector side a message was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorSide {
    Source,
    Destination,
}

/// Counters of a single stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamCounters {
    pub records_emitted: u64,
    pub bytes_emitted: u64,
    pub estimated_records: Option<u64>,
    pub estimated_bytes: Option<u64>,
}

#[derive(Debug, Default)]
struct Estimates {
    kind: Option<EstimateType>,
    records: Option<u64>,
    bytes: Option<u64>,
}

#[derive(Debug, Default)]
struct SourceLedger {
    streams: HashMap<StreamDescriptor, StreamCounters>,
    /// Records per stream emitted since the last source state.
    since_last_state: HashMap<StreamDescriptor, u64>,
    estimates: Estimates,
}

/// Error trace reported by a connector.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportedError {
    pub side: ConnectorSide,
    pub trace: TraceMessage,
}

/// Counts bytes written without keeping them.
struct ByteCounter(u64);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Size of a payload once serialized as compact JSON.
pub fn estimated_byte_size(value: &Value) -> ShovelResult<u64> {
    let mut counter = ByteCounter(0);
    serde_json::to_writer(&mut counter, value).map_err(serialization_error)?;

    Ok(counter.0)
}

/// Stable identifier of a state message within one sync.
pub fn state_hash(state: &StateMessage) -> ShovelResult<u64> {
    let serialized = serde_json::to_string(state).map_err(serialization_error)?;
    let mut hasher = DefaultHasher::new();
    serialized.hash(&mut hasher);

    Ok(hasher.finish())
}

fn log_message(side: ConnectorSide, message: &Message) {
    match serde_json::to_string(message) {
        Ok(message) => debug!(?side, %message, "connector message"),
        Err(err) => debug!(?side, ?message, error = %err, "connector message"),
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &'static str) -> ShovelResult<MutexGuard<'a, T>> {
    mutex.lock().map_err(|_| {
        shovel_error!(
            ErrorKind::InvalidState,
            "Message tracker lock poisoned",
            format!("The lock guarding the {name} was poisoned by a panicking pump")
        )
    })
}

/// Accumulates counts, timings, states and errors of one sync attempt.
#[derive(Debug)]
pub struct MessageTracker {
    log_connector_messages: bool,
    records_emitted: AtomicU64,
    bytes_emitted: AtomicU64,
    source_states_emitted: AtomicU64,
    destination_states_emitted: AtomicU64,
    first_record_seen: AtomicBool,
    source_ledger: Mutex<SourceLedger>,
    state_deltas: Mutex<StateDeltaTracker>,
    committed_counts_unreliable: AtomicBool,
    state_metrics: Mutex<StateMetricsTracker>,
    state_metrics_unreliable: AtomicBool,
    destination_states: Mutex<StateAggregator>,
    reported_errors: Mutex<Vec<ReportedError>>,
    times: TimeTracker,
}

impl MessageTracker {
    pub fn new(config: &TrackerConfig, log_connector_messages: bool) -> Self {
        Self {
            log_connector_messages,
            records_emitted: AtomicU64::new(0),
            bytes_emitted: AtomicU64::new(0),
            source_states_emitted: AtomicU64::new(0),
            destination_states_emitted: AtomicU64::new(0),
            first_record_seen: AtomicBool::new(false),
            source_ledger: Mutex::new(SourceLedger::default()),
            state_deltas: Mutex::new(StateDeltaTracker::new(
                config.state_delta_memory_limit_bytes,
            )),
            committed_counts_unreliable: AtomicBool::new(false),
            state_metrics: Mutex::new(StateMetricsTracker::new(
                config.state_metrics_message_limit,
            )),
            state_metrics_unreliable: AtomicBool::new(false),
            destination_states: Mutex::new(StateAggregator::default()),
            reported_errors: Mutex::new(Vec::new()),
            times: TimeTracker::default(),
        }
    }

    pub fn times(&self) -> &TimeTracker {
        &self.times
    }

    /// Accounts for a message read from the source, after it was mapped.
    pub fn accept_from_source(&self, message: &Message) -> ShovelResult<()> {
        if self.log_connector_messages {
            log_message(ConnectorSide::Source, message);
        }

        match message {
            Message::Record(record) => self.handle_source_record(record),
            Message::State(state) => self.handle_source_state(state),
            Message::Trace(trace) => self.handle_trace(ConnectorSide::Source, trace),
            Message::Log(_) | Message::Control(_) => Ok(()),
        }
    }

    /// Accounts for a message read from the destination.
    pub fn accept_from_destination(&self, message: &Message) -> ShovelResult<()> {
        if self.log_connector_messages {
            log_message(ConnectorSide::Destination, message);
        }

        match message {
            Message::State(state) => self.handle_destination_state(state),
            Message::Trace(trace) => self.handle_trace(ConnectorSide::Destination, trace),
            Message::Record(_) | Message::Log(_) | Message::Control(_) => Ok(()),
        }
    }

    fn handle_source_record(&self, record: &RecordMessage) -> ShovelResult<()> {
        let bytes = estimated_byte_size(&record.data)?;
        let descriptor = record.descriptor();

        {
            let mut ledger = lock(&self.source_ledger, "source ledger")?;
            let counters = ledger.streams.entry(descriptor.clone()).or_default();
            counters.records_emitted += 1;
            counters.bytes_emitted += bytes;
            *ledger.since_last_state.entry(descriptor).or_default() += 1;
        }

        self.records_emitted.fetch_add(1, Ordering::Relaxed);
        self.bytes_emitted.fetch_add(bytes, Ordering::Relaxed);

        if !self.first_record_seen.swap(true, Ordering::Relaxed) {
            lock(&self.state_metrics, "state metrics")?.record_first_record(Utc::now());
        }

        Ok(())
    }

    fn handle_source_state(&self, state: &StateMessage) -> ShovelResult<()> {
        self.source_states_emitted.fetch_add(1, Ordering::Relaxed);
        let hash = state_hash(state)?;

        let counts = std::mem::take(&mut lock(&self.source_ledger, "source ledger")?.since_last_state);
        if !self.committed_counts_unreliable.load(Ordering::Relaxed) {
            if let Err(err) = lock(&self.state_deltas, "state deltas")?.add_state(hash, &counts) {
                warn!(error = %err, "committed record counts are unreliable for the rest of the sync");
                self.committed_counts_unreliable.store(true, Ordering::Relaxed);
            }
        }

        if !self.state_metrics_unreliable.load(Ordering::Relaxed) {
            if let Err(err) =
                lock(&self.state_metrics, "state metrics")?.add_source_state(hash, Utc::now())
            {
                warn!(error = %err, "state timing metrics are unreliable for the rest of the sync");
                self.state_metrics_unreliable.store(true, Ordering::Relaxed);
            }
        }

        Ok(())
    }

    fn handle_destination_state(&self, state: &StateMessage) -> ShovelResult<()> {
        self.destination_states_emitted
            .fetch_add(1, Ordering::Relaxed);
        let hash = state_hash(state)?;

        lock(&self.destination_states, "destination states")?.ingest(state.clone())?;

        if !self.committed_counts_unreliable.load(Ordering::Relaxed) {
            if let Err(err) = lock(&self.state_deltas, "state deltas")?.commit_state_hash(hash) {
                warn!(error = %err, "committed record counts are unreliable for the rest of the sync");
                self.committed_counts_unreliable.store(true, Ordering::Relaxed);
            }
        }

        if !self.state_metrics_unreliable.load(Ordering::Relaxed) {
            if let Err(err) =
                lock(&self.state_metrics, "state metrics")?.commit_state(hash, Utc::now())
            {
                warn!(error = %err, "state timing metrics are unreliable for the rest of the sync");
                self.state_metrics_unreliable.store(true, Ordering::Relaxed);
            }
        }

        Ok(())
    }

    fn handle_trace(&self, side: ConnectorSide, trace: &TraceMessage) -> ShovelResult<()> {
        match &trace.trace {
            Trace::Error(_) => {
                lock(&self.reported_errors, "reported errors")?.push(ReportedError {
                    side,
                    trace: trace.clone(),
                });
                Ok(())
            }
            Trace::Estimate(estimate) => self.handle_estimate(estimate),
        }
    }

    fn handle_estimate(&self, estimate: &EstimateTrace) -> ShovelResult<()> {
        let mut ledger = lock(&self.source_ledger, "source ledger")?;

        match ledger.estimates.kind {
            Some(kind) if kind != estimate.estimate_type => {
                warn!(
                    estimate_type = ?estimate.estimate_type,
                    tracked_type = ?kind,
                    "stream and sync estimates cannot be mixed, ignoring estimate"
                );
                return Ok(());
            }
            _ => ledger.estimates.kind = Some(estimate.estimate_type),
        }

        match estimate.estimate_type {
            EstimateType::Sync => {
                ledger.estimates.records = Some(estimate.row_estimate);
                ledger.estimates.bytes = Some(estimate.byte_estimate);
            }
            EstimateType::Stream => {
                let counters = ledger.streams.entry(estimate.descriptor()).or_default();
                counters.estimated_records = Some(estimate.row_estimate);
                counters.estimated_bytes = Some(estimate.byte_estimate);

                let (records, bytes) = ledger.streams.values().fold((0, 0), |(records, bytes), counters| {
                    (
                        records + counters.estimated_records.unwrap_or_default(),
                        bytes + counters.estimated_bytes.unwrap_or_default(),
                    )
                });
                ledger.estimates.records = Some(records);
                ledger.estimates.bytes = Some(bytes);
            }
        }

        Ok(())
    }

    pub fn total_records_emitted(&self) -> u64 {
        self.records_emitted.load(Ordering::Relaxed)
    }

    pub fn total_bytes_emitted(&self) -> u64 {
        self.bytes_emitted.load(Ordering::Relaxed)
    }

    pub fn total_source_states_emitted(&self) -> u64 {
        self.source_states_emitted.load(Ordering::Relaxed)
    }

    pub fn total_destination_states_emitted(&self) -> u64 {
        self.destination_states_emitted.load(Ordering::Relaxed)
    }

    pub fn stream_counters(&self) -> ShovelResult<BTreeMap<StreamDescriptor, StreamCounters>> {
        let ledger = lock(&self.source_ledger, "source ledger")?;

        Ok(ledger
            .streams
            .iter()
            .map(|(descriptor, counters)| (descriptor.clone(), counters.clone()))
            .collect())
    }

    pub fn total_estimated_records(&self) -> ShovelResult<Option<u64>> {
        Ok(lock(&self.source_ledger, "source ledger")?.estimates.records)
    }

    pub fn total_estimated_bytes(&self) -> ShovelResult<Option<u64>> {
        Ok(lock(&self.source_ledger, "source ledger")?.estimates.bytes)
    }

    /// Records committed per stream as reported through destination states.
    ///
    /// Unknown if the destination never acknowledged a state or the counts became unreliable.
    pub fn committed_records_by_stream(
        &self,
    ) -> ShovelResult<Option<HashMap<StreamDescriptor, u64>>> {
        if self.committed_counts_unreliable.load(Ordering::Relaxed)
            || self.total_destination_states_emitted() == 0
        {
            return Ok(None);
        }

        Ok(Some(lock(&self.state_deltas, "state deltas")?.committed_records()))
    }

    pub fn total_records_committed(&self) -> ShovelResult<Option<u64>> {
        Ok(self
            .committed_records_by_stream()?
            .map(|committed| committed.values().sum()))
    }

    /// Returns `true` once state timing metrics could not be tracked anymore.
    pub fn state_metrics_unreliable(&self) -> bool {
        self.state_metrics_unreliable.load(Ordering::Relaxed)
    }

    /// Runs `f` against the state timing metrics, unless they became unreliable.
    pub fn with_state_metrics<T>(
        &self,
        f: impl FnOnce(&StateMetricsTracker) -> T,
    ) -> ShovelResult<Option<T>> {
        if self.state_metrics_unreliable() {
            return Ok(None);
        }

        let metrics = lock(&self.state_metrics, "state metrics")?;

        Ok(Some(f(&metrics)))
    }

    /// Checkpoint built from the states the destination acknowledged.
    pub fn destination_output_state(&self) -> ShovelResult<Option<State>> {
        lock(&self.destination_states, "destination states")?.state()
    }

    /// The earliest error trace reported by either connector.
    pub fn first_reported_error(&self) -> ShovelResult<Option<ReportedError>> {
        let errors = lock(&self.reported_errors, "reported errors")?;

        Ok(errors
            .iter()
            .min_by(|a, b| a.trace.emitted_at.total_cmp(&b.trace.emitted_at))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_utils::messages::{
        create_error_trace, create_estimate_trace, create_record_in, create_state,
        create_stream_state,
    };

    fn tracker() -> MessageTracker {
        MessageTracker::new(&TrackerConfig::default(), false)
    }

    #[test]
    fn records_are_counted_per_stream() {
        let tracker = tracker();
        tracker
            .accept_from_source(&create_record_in("users", None, json!({"id": 1})))
            .unwrap();
        tracker
            .accept_from_source(&create_record_in("users", None, json!({"id": 22})))
            .unwrap();
        tracker
            .accept_from_source(&create_record_in("orders", Some("shop"), json!("x")))
            .unwrap();

        let counters = tracker.stream_counters().unwrap();

        assert_eq!(tracker.total_records_emitted(), 3);
        assert_eq!(tracker.total_bytes_emitted(), 8 + 9 + 3);
        assert_eq!(
            counters[&StreamDescriptor::new("users", None)].records_emitted,
            2
        );
        assert_eq!(
            counters[&StreamDescriptor::new("orders", Some("shop".to_string()))].bytes_emitted,
            3
        );
    }

    #[test]
    fn committed_counts_follow_destination_acknowledgments() {
        let tracker = tracker();
        let first_state = create_state(json!({"cursor": 1}));
        let second_state = create_state(json!({"cursor": 2}));

        tracker
            .accept_from_source(&create_record_in("users", None, json!({"id": 1})))
            .unwrap();
        tracker.accept_from_source(&first_state).unwrap();
        tracker
            .accept_from_source(&create_record_in("users", None, json!({"id": 2})))
            .unwrap();
        tracker.accept_from_source(&second_state).unwrap();

        assert_eq!(tracker.total_records_committed().unwrap(), None);

        tracker.accept_from_destination(&first_state).unwrap();

        assert_eq!(tracker.total_records_committed().unwrap(), Some(1));
        assert_eq!(tracker.total_source_states_emitted(), 2);
        assert_eq!(tracker.total_destination_states_emitted(), 1);
        assert_eq!(
            tracker.destination_output_state().unwrap(),
            Some(State {
                state: json!({"cursor": 1})
            })
        );
    }

    #[test]
    fn unknown_acknowledgment_makes_committed_counts_unknown() {
        let tracker = tracker();
        tracker
            .accept_from_source(&create_record_in("users", None, json!({"id": 1})))
            .unwrap();
        tracker
            .accept_from_destination(&create_state(json!({"never": "emitted"})))
            .unwrap();

        assert_eq!(tracker.total_records_committed().unwrap(), None);
        assert!(tracker.state_metrics_unreliable());
        assert_eq!(
            tracker
                .with_state_metrics(|metrics| metrics.max_seconds_between_emitted_and_committed())
                .unwrap(),
            None
        );
    }

    #[test]
    fn earliest_error_trace_wins() {
        let tracker = tracker();
        tracker
            .accept_from_destination(&create_error_trace("late", 20.0))
            .unwrap();
        tracker
            .accept_from_source(&create_error_trace("early", 10.0))
            .unwrap();

        let reported = tracker.first_reported_error().unwrap().unwrap();

        assert_eq!(reported.side, ConnectorSide::Source);
        assert_eq!(reported.trace.error().unwrap().message, "early");
    }

    #[test]
    fn stream_estimates_are_summed_and_sync_estimates_ignored_afterwards() {
        let tracker = tracker();
        tracker
            .accept_from_source(&create_estimate_trace(EstimateType::Stream, "users", 10, 100))
            .unwrap();
        tracker
            .accept_from_source(&create_estimate_trace(EstimateType::Stream, "orders", 5, 50))
            .unwrap();
        tracker
            .accept_from_source(&create_estimate_trace(EstimateType::Sync, "all", 99, 999))
            .unwrap();

        assert_eq!(tracker.total_estimated_records().unwrap(), Some(15));
        assert_eq!(tracker.total_estimated_bytes().unwrap(), Some(150));
        assert_eq!(
            tracker.stream_counters().unwrap()[&StreamDescriptor::new("users", None)]
                .estimated_records,
            Some(10)
        );
    }

    #[test]
    fn stream_states_are_aggregated_per_stream() {
        let tracker = tracker();
        let users = create_stream_state("users", json!({"cursor": 1}));
        let orders = create_stream_state("orders", json!({"cursor": 2}));
        for state in [&users, &orders] {
            tracker.accept_from_source(state).unwrap();
            tracker.accept_from_destination(state).unwrap();
        }

        let state = tracker.destination_output_state().unwrap().unwrap();

        assert_eq!(state.state.as_array().map(Vec::len), Some(2));
    }
}
