//! Source connector abstractions.

mod base;
pub mod memory;

pub use base::Source;
