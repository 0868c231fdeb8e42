use std::future::Future;
use std::path::Path;

use crate::error::ShovelResult;
use crate::types::{DestinationConfig, Message};

/// A running destination connector consuming protocol messages.
///
/// Messages are written through [`Destination::accept`] by one task while another task reads what
/// the destination emits back (acknowledged states, control messages) through
/// [`Destination::attempt_read`]. No method is called concurrently with itself.
pub trait Destination {
    /// Returns the name of the destination.
    fn name() -> &'static str;

    fn start(
        &self,
        config: &DestinationConfig,
        work_dir: &Path,
    ) -> impl Future<Output = ShovelResult<()>> + Send;

    /// Hands a message to the destination.
    ///
    /// May wait until the destination is ready to take more input.
    fn accept(&self, message: Message) -> impl Future<Output = ShovelResult<()>> + Send;

    /// Signals that no more messages are going to be accepted.
    fn notify_end_of_input(&self) -> impl Future<Output = ShovelResult<()>> + Send;

    /// Returns `true` once the connector exited and every message it emitted was read.
    fn is_finished(&self) -> bool;

    /// Returns the next message emitted by the destination if one is available.
    fn attempt_read(&self) -> impl Future<Output = ShovelResult<Option<Message>>> + Send;

    /// Returns the exit code of the connector, zero meaning success.
    fn exit_value(&self) -> ShovelResult<i32>;

    fn close(&self) -> impl Future<Output = ShovelResult<()>> + Send;

    fn cancel(&self) -> impl Future<Output = ShovelResult<()>> + Send;
}
