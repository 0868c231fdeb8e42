use std::collections::{HashMap, VecDeque};

use thiserror::Error;

use crate::types::StreamDescriptor;

const HASH_BYTES: usize = size_of::<u64>();
const STREAM_INDEX_BYTES: usize = size_of::<u16>();
const COUNT_BYTES: usize = size_of::<u64>();

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateDeltaError {
    #[error("state deltas exceeded the memory limit of {limit_bytes} bytes")]
    CapacityExceeded { limit_bytes: usize },
    #[error("too many streams to track state deltas")]
    TooManyStreams,
    #[error("state hash {0} was never emitted by the source")]
    StateNotFound(u64),
}

#[derive(Debug)]
struct StateDelta {
    hash: u64,
    counts: Vec<(u16, u64)>,
}

impl StateDelta {
    fn size(&self) -> usize {
        HASH_BYTES + self.counts.len() * (STREAM_INDEX_BYTES + COUNT_BYTES)
    }
}

/// Derives committed record counts from destination state acknowledgments.
///
/// Each source state snapshots the per-stream record counts emitted since the previous source
/// state. A destination acknowledging a state commits every snapshot up to and including it.
#[derive(Debug)]
pub struct StateDeltaTracker {
    memory_limit_bytes: usize,
    remaining_capacity: usize,
    stream_index: HashMap<StreamDescriptor, u16>,
    streams: Vec<StreamDescriptor>,
    pending: VecDeque<StateDelta>,
    committed: HashMap<u16, u64>,
}

impl StateDeltaTracker {
    pub fn new(memory_limit_bytes: usize) -> Self {
        Self {
            memory_limit_bytes,
            remaining_capacity: memory_limit_bytes,
            stream_index: HashMap::new(),
            streams: Vec::new(),
            pending: VecDeque::new(),
            committed: HashMap::new(),
        }
    }

    /// Snapshots the record counts emitted since the previous source state.
    pub fn add_state(
        &mut self,
        hash: u64,
        counts: &HashMap<StreamDescriptor, u64>,
    ) -> Result<(), StateDeltaError> {
        let mut indexed_counts = Vec::with_capacity(counts.len());
        for (stream, count) in counts {
            indexed_counts.push((self.index_of(stream)?, *count));
        }

        let delta = StateDelta {
            hash,
            counts: indexed_counts,
        };
        let size = delta.size();
        if size > self.remaining_capacity {
            return Err(StateDeltaError::CapacityExceeded {
                limit_bytes: self.memory_limit_bytes,
            });
        }

        self.remaining_capacity -= size;
        self.pending.push_back(delta);

        Ok(())
    }

    /// Commits every snapshot up to and including the one of `hash`.
    ///
    /// Nothing is committed if the hash is unknown.
    pub fn commit_state_hash(&mut self, hash: u64) -> Result<(), StateDeltaError> {
        if !self.pending.iter().any(|delta| delta.hash == hash) {
            return Err(StateDeltaError::StateNotFound(hash));
        }

        while let Some(delta) = self.pending.pop_front() {
            self.remaining_capacity += delta.size();
            for (index, count) in &delta.counts {
                *self.committed.entry(*index).or_default() += count;
            }

            if delta.hash == hash {
                break;
            }
        }

        Ok(())
    }

    pub fn committed_records(&self) -> HashMap<StreamDescriptor, u64> {
        self.committed
            .iter()
            .filter_map(|(index, count)| {
                self.streams
                    .get(usize::from(*index))
                    .map(|stream| (stream.clone(), *count))
            })
            .collect()
    }

    fn index_of(&mut self, stream: &StreamDescriptor) -> Result<u16, StateDeltaError> {
        if let Some(index) = self.stream_index.get(stream) {
            return Ok(*index);
        }

        let index =
            u16::try_from(self.streams.len()).map_err(|_| StateDeltaError::TooManyStreams)?;
        self.stream_index.insert(stream.clone(), index);
        self.streams.push(stream.clone());

        Ok(index)
    }
}
