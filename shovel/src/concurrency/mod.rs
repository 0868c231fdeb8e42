//! Concurrency primitives coordinating the pumps of a replication worker.
//!
//! The [`shutdown`] module provides the stop signal both pumps select on. It is raised when the
//! worker is cancelled and when one pump fails, so a sibling blocked on an adapter call never
//! holds back finalization.

pub mod shutdown;
