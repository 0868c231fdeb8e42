use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::destination::Destination;
use crate::error::ShovelResult;
use crate::test_utils::FaultType;
use crate::test_utils::notify::TimedNotify;
use crate::test_utils::source::inject;
use crate::types::{DestinationConfig, Message};

/// Faults injected into a wrapped destination. Unset operations are forwarded untouched.
#[derive(Debug, Clone, Default)]
pub struct DestinationFaults {
    pub start: Option<FaultType>,
    /// Fault of the first accept attempted after `accept_after` messages were accepted.
    pub accept: Option<FaultType>,
    pub accept_after: usize,
    pub notify_end_of_input: Option<FaultType>,
    pub read: Option<FaultType>,
    pub close: Option<FaultType>,
}

#[derive(Debug, Default)]
struct Inner {
    accepted: usize,
    accepted_conditions: Vec<(usize, Arc<Notify>)>,
}

/// Wraps a [`Destination`], injects the configured faults and lets tests wait for progress.
#[derive(Debug, Clone)]
pub struct TestDestinationWrapper<D> {
    wrapped: D,
    faults: DestinationFaults,
    inner: Arc<Mutex<Inner>>,
}

impl<D> TestDestinationWrapper<D> {
    pub fn wrap(destination: D, faults: DestinationFaults) -> Self {
        Self {
            wrapped: destination,
            faults,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn wrapped(&self) -> &D {
        &self.wrapped
    }

    pub fn accepted_count(&self) -> usize {
        self.lock_inner().accepted
    }

    /// Returns a notification fired once `count` messages were accepted.
    pub fn wait_for_accepted(&self, count: usize) -> TimedNotify {
        let notify = Arc::new(Notify::new());

        let mut inner = self.lock_inner();
        if inner.accepted >= count {
            notify.notify_one();
        } else {
            inner.accepted_conditions.push((count, notify.clone()));
        }

        TimedNotify::new(notify)
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D> Destination for TestDestinationWrapper<D>
where
    D: Destination + Send + Sync,
{
    fn name() -> &'static str {
        D::name()
    }

    async fn start(&self, config: &DestinationConfig, work_dir: &Path) -> ShovelResult<()> {
        inject(self.faults.start, "destination start").await?;
        self.wrapped.start(config, work_dir).await
    }

    async fn accept(&self, message: Message) -> ShovelResult<()> {
        if self.accepted_count() >= self.faults.accept_after {
            inject(self.faults.accept, "destination accept").await?;
        }

        self.wrapped.accept(message).await?;

        let mut inner = self.lock_inner();
        inner.accepted += 1;
        let accepted = inner.accepted;
        inner.accepted_conditions.retain(|(count, notify)| {
            let reached = accepted >= *count;
            if reached {
                notify.notify_one();
            }
            !reached
        });

        Ok(())
    }

    async fn notify_end_of_input(&self) -> ShovelResult<()> {
        inject(self.faults.notify_end_of_input, "destination end of input").await?;
        self.wrapped.notify_end_of_input().await
    }

    fn is_finished(&self) -> bool {
        self.wrapped.is_finished()
    }

    async fn attempt_read(&self) -> ShovelResult<Option<Message>> {
        inject(self.faults.read, "destination read").await?;
        self.wrapped.attempt_read().await
    }

    fn exit_value(&self) -> ShovelResult<i32> {
        self.wrapped.exit_value()
    }

    async fn close(&self) -> ShovelResult<()> {
        inject(self.faults.close, "destination close").await?;
        self.wrapped.close().await
    }

    async fn cancel(&self) -> ShovelResult<()> {
        self.wrapped.cancel().await
    }
}
