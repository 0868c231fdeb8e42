use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::bail;
use crate::destination::Destination;
use crate::error::{ErrorKind, ShovelResult};
use crate::types::{DestinationConfig, Message, RecordMessage};

#[derive(Debug, Default)]
struct Inner {
    accepted: Vec<Message>,
    output: VecDeque<Message>,
    started_with: Option<DestinationConfig>,
    end_of_input: bool,
    exit_value: i32,
    closed: bool,
    cancelled: bool,
}

/// In-memory destination keeping every accepted message.
///
/// Every accepted state is acknowledged right away by emitting it back, as a destination that
/// commits synchronously would.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the destination report `exit_value` once it exits.
    pub fn with_exit_value(self, exit_value: i32) -> Self {
        self.lock_inner().exit_value = exit_value;
        self
    }

    /// Queues a message the destination emits on its own, e.g. a control message.
    pub fn emit(&self, message: Message) {
        self.lock_inner().output.push_back(message);
    }

    /// Returns a copy of every accepted message, in acceptance order.
    pub fn accepted_messages(&self) -> Vec<Message> {
        self.lock_inner().accepted.clone()
    }

    /// Returns the accepted records, in acceptance order.
    pub fn records(&self) -> Vec<RecordMessage> {
        self.lock_inner()
            .accepted
            .iter()
            .filter_map(|message| match message {
                Message::Record(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of emitted messages not read yet.
    pub fn pending_output(&self) -> usize {
        self.lock_inner().output.len()
    }

    pub fn started_with(&self) -> Option<DestinationConfig> {
        self.lock_inner().started_with.clone()
    }

    pub fn received_end_of_input(&self) -> bool {
        self.lock_inner().end_of_input
    }

    pub fn is_closed(&self) -> bool {
        self.lock_inner().closed
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock_inner().cancelled
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Destination for MemoryDestination {
    fn name() -> &'static str {
        "memory"
    }

    async fn start(&self, config: &DestinationConfig, work_dir: &Path) -> ShovelResult<()> {
        let mut inner = self.lock_inner();
        if inner.started_with.is_some() {
            bail!(ErrorKind::InvalidState, "Memory destination was already started");
        }

        info!(destination_id = %config.destination_id, work_dir = %work_dir.display(), "starting memory destination");
        inner.started_with = Some(config.clone());

        Ok(())
    }

    async fn accept(&self, message: Message) -> ShovelResult<()> {
        let mut inner = self.lock_inner();
        if inner.end_of_input {
            bail!(
                ErrorKind::InvalidState,
                "Memory destination received a message after the end of input"
            );
        }

        if let Message::State(_) = &message {
            inner.output.push_back(message.clone());
        }
        inner.accepted.push(message);

        Ok(())
    }

    async fn notify_end_of_input(&self) -> ShovelResult<()> {
        self.lock_inner().end_of_input = true;

        Ok(())
    }

    fn is_finished(&self) -> bool {
        let inner = self.lock_inner();

        inner.cancelled || inner.closed || (inner.end_of_input && inner.output.is_empty())
    }

    async fn attempt_read(&self) -> ShovelResult<Option<Message>> {
        Ok(self.lock_inner().output.pop_front())
    }

    fn exit_value(&self) -> ShovelResult<i32> {
        Ok(self.lock_inner().exit_value)
    }

    async fn close(&self) -> ShovelResult<()> {
        self.lock_inner().closed = true;

        Ok(())
    }

    async fn cancel(&self) -> ShovelResult<()> {
        self.lock_inner().cancelled = true;

        Ok(())
    }
}
