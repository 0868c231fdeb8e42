use std::future::Future;

use serde_json::Value;
use uuid::Uuid;

use crate::error::ShovelResult;

/// Persists new connector configurations emitted through control messages.
///
/// A failing update must never fail a sync, callers log the error and carry on.
pub trait ConnectorConfigUpdater {
    fn update_source(
        &self,
        source_id: Uuid,
        config: &Value,
    ) -> impl Future<Output = ShovelResult<()>> + Send;

    fn update_destination(
        &self,
        destination_id: Uuid,
        config: &Value,
    ) -> impl Future<Output = ShovelResult<()>> + Send;
}
