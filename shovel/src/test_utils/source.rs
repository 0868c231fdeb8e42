use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Notify;

use crate::error::{ErrorKind, ShovelResult};
use crate::shovel_error;
use crate::source::Source;
use crate::test_utils::FaultType;
use crate::types::{Message, SourceConfig};

/// Faults injected into a wrapped source. Unset operations are forwarded untouched.
#[derive(Debug, Clone, Default)]
pub struct SourceFaults {
    pub start: Option<FaultType>,
    /// Fault of the first read attempted after `read_after` messages were returned.
    pub read: Option<FaultType>,
    pub read_after: usize,
    pub close: Option<FaultType>,
    pub cancel: Option<FaultType>,
}

/// Wraps a [`Source`] and injects the configured faults.
#[derive(Debug, Clone)]
pub struct TestSourceWrapper<S> {
    wrapped: S,
    faults: SourceFaults,
    messages_read: Arc<AtomicUsize>,
    gate: Option<ReadGate>,
}

#[derive(Debug, Clone)]
struct ReadGate {
    after: usize,
    notify: Arc<Notify>,
    passed: Arc<AtomicBool>,
}

impl<S> TestSourceWrapper<S> {
    pub fn wrap(source: S, faults: SourceFaults) -> Self {
        Self {
            wrapped: source,
            faults,
            messages_read: Arc::new(AtomicUsize::new(0)),
            gate: None,
        }
    }

    /// Holds the read following `after` returned messages until the returned [`Notify`] fires.
    pub fn with_gate(mut self, after: usize) -> (Self, Arc<Notify>) {
        let notify = Arc::new(Notify::new());
        self.gate = Some(ReadGate {
            after,
            notify: notify.clone(),
            passed: Arc::new(AtomicBool::new(false)),
        });

        (self, notify)
    }

    pub fn wrapped(&self) -> &S {
        &self.wrapped
    }

    pub fn messages_read(&self) -> usize {
        self.messages_read.load(Ordering::SeqCst)
    }
}

pub(crate) async fn inject(fault: Option<FaultType>, operation: &str) -> ShovelResult<()> {
    match fault {
        None => Ok(()),
        Some(FaultType::Error) => Err(shovel_error!(
            ErrorKind::IoError,
            "Injected fault",
            format!("injected {operation} failure")
        )),
        Some(FaultType::Panic) => panic!("injected {operation} panic"),
        Some(FaultType::Hang) => std::future::pending().await,
    }
}

impl<S> Source for TestSourceWrapper<S>
where
    S: Source + Send + Sync,
{
    fn name() -> &'static str {
        S::name()
    }

    async fn start(&self, config: &SourceConfig, work_dir: &Path) -> ShovelResult<()> {
        inject(self.faults.start, "source start").await?;
        self.wrapped.start(config, work_dir).await
    }

    fn is_finished(&self) -> bool {
        self.wrapped.is_finished()
    }

    async fn attempt_read(&self) -> ShovelResult<Option<Message>> {
        if let Some(gate) = &self.gate {
            if self.messages_read() == gate.after && !gate.passed.swap(true, Ordering::SeqCst) {
                gate.notify.notified().await;
            }
        }

        if self.messages_read() >= self.faults.read_after {
            inject(self.faults.read, "source read").await?;
        }

        let message = self.wrapped.attempt_read().await?;
        if message.is_some() {
            self.messages_read.fetch_add(1, Ordering::SeqCst);
        }

        Ok(message)
    }

    fn exit_value(&self) -> ShovelResult<i32> {
        self.wrapped.exit_value()
    }

    async fn close(&self) -> ShovelResult<()> {
        inject(self.faults.close, "source close").await?;
        self.wrapped.close().await
    }

    async fn cancel(&self) -> ShovelResult<()> {
        inject(self.faults.cancel, "source cancel").await?;
        self.wrapped.cancel().await
    }
}
