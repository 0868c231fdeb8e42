use std::future::Future;
use std::path::Path;

use crate::error::ShovelResult;
use crate::types::{Message, SourceConfig};

/// A running source connector emitting protocol messages.
///
/// A source is driven by a single pump: it is started once, read until it reports being finished,
/// then closed. [`Source::cancel`] may be called from another task at any time and must make the
/// source finish promptly.
pub trait Source {
    /// Returns the name of the source.
    fn name() -> &'static str;

    fn start(
        &self,
        config: &SourceConfig,
        work_dir: &Path,
    ) -> impl Future<Output = ShovelResult<()>> + Send;

    /// Returns `true` once the connector exited and every message it emitted was read.
    fn is_finished(&self) -> bool;

    /// Returns the next message if one is available.
    ///
    /// `None` is not an error, it only means that nothing was ready.
    fn attempt_read(&self) -> impl Future<Output = ShovelResult<Option<Message>>> + Send;

    /// Returns the exit code of the connector, zero meaning success.
    fn exit_value(&self) -> ShovelResult<i32>;

    /// Waits for the connector to exit and releases its resources.
    fn close(&self) -> impl Future<Output = ShovelResult<()>> + Send;

    /// Stops the connector without waiting for it to finish its work.
    fn cancel(&self) -> impl Future<Output = ShovelResult<()>> + Send;
}
