use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateMetricsError {
    #[error("more than {limit} source states are waiting for an acknowledgment")]
    CapacityExceeded { limit: usize },
    #[error("state hash {0} was acknowledged but never emitted by the source")]
    StateNotFound(u64),
}

/// Running maximum and mean of a series of durations in seconds.
#[derive(Debug, Default, Clone, Copy)]
struct DurationStats {
    samples: u64,
    max_seconds: u64,
    mean_seconds: f64,
}

impl DurationStats {
    fn add(&mut self, seconds: u64) {
        self.samples += 1;
        self.max_seconds = self.max_seconds.max(seconds);
        self.mean_seconds += (seconds as f64 - self.mean_seconds) / self.samples as f64;
    }

    fn max(&self) -> Option<u64> {
        (self.samples > 0).then_some(self.max_seconds)
    }

    fn mean(&self) -> Option<u64> {
        (self.samples > 0).then_some(self.mean_seconds.round() as u64)
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    u64::try_from((to - from).num_seconds()).unwrap_or_default()
}

/// Measures how often the source checkpoints and how long the destination takes to commit.
#[derive(Debug)]
pub struct StateMetricsTracker {
    message_limit: usize,
    pending: VecDeque<(u64, DateTime<Utc>)>,
    first_record_received_at: Option<DateTime<Utc>>,
    last_state_received_at: Option<DateTime<Utc>>,
    before_source_state: DurationStats,
    emitted_to_committed: DurationStats,
}

impl StateMetricsTracker {
    pub fn new(message_limit: usize) -> Self {
        Self {
            message_limit,
            pending: VecDeque::new(),
            first_record_received_at: None,
            last_state_received_at: None,
            before_source_state: DurationStats::default(),
            emitted_to_committed: DurationStats::default(),
        }
    }

    pub fn record_first_record(&mut self, received_at: DateTime<Utc>) {
        self.first_record_received_at.get_or_insert(received_at);
    }

    /// Tracks a source state, measured from the previous state or else from the first record.
    pub fn add_source_state(
        &mut self,
        hash: u64,
        received_at: DateTime<Utc>,
    ) -> Result<(), StateMetricsError> {
        if self.pending.len() >= self.message_limit {
            return Err(StateMetricsError::CapacityExceeded {
                limit: self.message_limit,
            });
        }

        if let Some(since) = self.last_state_received_at.or(self.first_record_received_at) {
            self.before_source_state
                .add(seconds_between(since, received_at));
        }
        self.last_state_received_at = Some(received_at);
        self.pending.push_back((hash, received_at));

        Ok(())
    }

    /// Matches a destination acknowledgment with the source state it commits.
    ///
    /// Earlier pending states are implicitly committed and dropped.
    pub fn commit_state(
        &mut self,
        hash: u64,
        committed_at: DateTime<Utc>,
    ) -> Result<(), StateMetricsError> {
        let Some(position) = self.pending.iter().position(|(pending, _)| *pending == hash) else {
            return Err(StateMetricsError::StateNotFound(hash));
        };

        let mut emitted_at = None;
        for _ in 0..=position {
            emitted_at = self.pending.pop_front().map(|(_, emitted_at)| emitted_at);
        }
        if let Some(emitted_at) = emitted_at {
            self.emitted_to_committed
                .add(seconds_between(emitted_at, committed_at));
        }

        Ok(())
    }

    pub fn max_seconds_before_source_state(&self) -> Option<u64> {
        self.before_source_state.max()
    }

    pub fn mean_seconds_before_source_state(&self) -> Option<u64> {
        self.before_source_state.mean()
    }

    pub fn max_seconds_between_emitted_and_committed(&self) -> Option<u64> {
        self.emitted_to_committed.max()
    }

    pub fn mean_seconds_between_emitted_and_committed(&self) -> Option<u64> {
        self.emitted_to_committed.mean()
    }
}
