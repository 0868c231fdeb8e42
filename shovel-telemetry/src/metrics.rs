use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Installs a Prometheus recorder with an HTTP listener on `[::]:{port}/metrics`.
///
/// Must be called from within a tokio runtime, the exporter is spawned on it. The optional
/// `job_id` is attached to every metric as a global label.
pub fn init_metrics(port: u16, job_id: Option<u64>) -> Result<(), BuildError> {
    let mut builder = PrometheusBuilder::new()
        .with_http_listener(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port));

    if let Some(job_id) = job_id {
        builder = builder.add_global_label("job_id", job_id.to_string());
    }

    builder.install()?;

    Ok(())
}
