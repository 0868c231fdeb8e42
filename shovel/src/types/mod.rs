//! Data types exchanged with connectors and produced by a sync attempt.

mod catalog;
mod input;
mod message;
mod output;

pub use catalog::*;
pub use input::*;
pub use message::*;
pub use output::*;
