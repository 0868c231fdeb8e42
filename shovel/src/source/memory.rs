use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, ShovelResult};
use crate::source::Source;
use crate::types::{Message, SourceConfig};

#[derive(Debug, Default)]
struct Inner {
    messages: VecDeque<Message>,
    started_with: Option<SourceConfig>,
    keep_open: bool,
    exit_value: i32,
    closed: bool,
    cancelled: bool,
}

/// In-memory source replaying a fixed list of messages.
///
/// Useful for tests and for replaying captured connector output. A source created with
/// [`MemorySource::never_finishing`] keeps running after its messages are drained, like a
/// connector waiting on a slow upstream, until it is cancelled or closed.
#[derive(Debug, Clone)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    pub fn new(messages: Vec<Message>) -> Self {
        Self::from_inner(Inner {
            messages: messages.into(),
            ..Default::default()
        })
    }

    pub fn never_finishing(messages: Vec<Message>) -> Self {
        Self::from_inner(Inner {
            messages: messages.into(),
            keep_open: true,
            ..Default::default()
        })
    }

    /// Makes the source report `exit_value` once it exits.
    pub fn with_exit_value(self, exit_value: i32) -> Self {
        self.lock_inner().exit_value = exit_value;
        self
    }

    /// Configuration the source was started with.
    pub fn started_with(&self) -> Option<SourceConfig> {
        self.lock_inner().started_with.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock_inner().closed
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock_inner().cancelled
    }

    /// Number of messages not read yet.
    pub fn remaining(&self) -> usize {
        self.lock_inner().messages.len()
    }

    fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Source for MemorySource {
    fn name() -> &'static str {
        "memory"
    }

    async fn start(&self, config: &SourceConfig, work_dir: &Path) -> ShovelResult<()> {
        let mut inner = self.lock_inner();
        if inner.started_with.is_some() {
            bail!(ErrorKind::InvalidState, "Memory source was already started");
        }

        info!(source_id = %config.source_id, work_dir = %work_dir.display(), "starting memory source");
        inner.started_with = Some(config.clone());

        Ok(())
    }

    fn is_finished(&self) -> bool {
        let inner = self.lock_inner();

        inner.cancelled || inner.closed || (!inner.keep_open && inner.messages.is_empty())
    }

    async fn attempt_read(&self) -> ShovelResult<Option<Message>> {
        let mut inner = self.lock_inner();
        if inner.started_with.is_none() {
            bail!(ErrorKind::InvalidState, "Memory source was not started");
        }

        Ok(inner.messages.pop_front())
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
