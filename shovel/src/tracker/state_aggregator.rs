use std::collections::BTreeMap;

use serde_json::Value;

use crate::bail;
use crate::error::{ErrorKind, ShovelResult, serialization_error};
use crate::types::{State, StateMessage, StateType, StreamDescriptor};

#[derive(Debug, Default)]
enum Aggregate {
    #[default]
    Empty,
    /// Latest legacy or global state, each one replaces the previous.
    Single(StateMessage),
    Streams(BTreeMap<StreamDescriptor, StateMessage>),
}

/// Folds the states acknowledged by the destination into the checkpoint of the sync.
#[derive(Debug, Default)]
pub struct StateAggregator {
    aggregate: Aggregate,
}

impl StateAggregator {
    pub fn ingest(&mut self, state: StateMessage) -> ShovelResult<()> {
        match (state.state_type, &mut self.aggregate) {
            (StateType::Stream, Aggregate::Single(_))
            | (StateType::Legacy | StateType::Global, Aggregate::Streams(_)) => {
                bail!(
                    ErrorKind::InvalidState,
                    "Stream states cannot be mixed with global or legacy states"
                );
            }
            (StateType::Stream, Aggregate::Streams(streams)) => {
                streams.insert(stream_descriptor(&state)?, state);
            }
            (StateType::Stream, aggregate) => {
                *aggregate = Aggregate::Streams(BTreeMap::from([(stream_descriptor(&state)?, state)]));
            }
            (StateType::Legacy | StateType::Global, aggregate) => {
                *aggregate = Aggregate::Single(state);
            }
        }

        Ok(())
    }

    /// Returns the checkpoint covering everything ingested so far.
    ///
    /// Legacy states are handed back as their raw data, stream and global states as a list of
    /// state messages.
    pub fn state(&self) -> ShovelResult<Option<State>> {
        let state = match &self.aggregate {
            Aggregate::Empty => return Ok(None),
            Aggregate::Single(message) if message.state_type == StateType::Legacy => {
                message.data.clone()
            }
            Aggregate::Single(message) => {
                Value::Array(vec![serde_json::to_value(message).map_err(serialization_error)?])
            }
            Aggregate::Streams(streams) => {
                serde_json::to_value(streams.values().collect::<Vec<_>>())
                    .map_err(serialization_error)?
            }
        };

        Ok(Some(State { state }))
    }
}

fn stream_descriptor(state: &StateMessage) -> ShovelResult<StreamDescriptor> {
    match &state.stream {
        Some(descriptor) => Ok(descriptor.clone()),
        None => bail!(ErrorKind::InvalidData, "Stream state without stream descriptor"),
    }
}
