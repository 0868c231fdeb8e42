//! Replicator binary running a single sync attempt.
//!
//! Loads its configuration, initializes telemetry, runs the attempt with file-backed connectors
//! and writes the replication output next to them. SIGINT and SIGTERM cancel the attempt, which
//! still produces an output.

use shovel_config::shared::ReplicatorConfig;
use shovel_telemetry::metrics::init_metrics;
use shovel_telemetry::tracing::init_tracing;
use tracing::{error, info};

use crate::config::load_replicator_config;
use crate::core::start_replicator_with_config;
use crate::error::{ReplicatorError, ReplicatorResult};

mod config;
mod connectors;
mod core;
mod error;

fn main() -> ReplicatorResult<()> {
    let replicator_config = load_replicator_config()?;

    init_tracing(env!("CARGO_BIN_NAME")).map_err(ReplicatorError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(replicator_config))?;

    Ok(())
}

async fn async_main(replicator_config: ReplicatorConfig) -> ReplicatorResult<()> {
    // The exporter is spawned on the current runtime.
    if let Some(port) = replicator_config.metrics_port {
        init_metrics(port, Some(replicator_config.job.id)).map_err(ReplicatorError::config)?;
        info!(port, "prometheus metrics endpoint listening");
    }

    if let Err(err) = start_replicator_with_config(replicator_config).await {
        error!("{err}");
        eprint!("{}", err.render_report());
        return Err(err);
    }

    Ok(())
}
