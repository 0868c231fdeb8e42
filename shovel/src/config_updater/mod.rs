//! Persistence of configuration updates requested by connectors.

mod base;
pub mod file;

pub use base::ConnectorConfigUpdater;
