use std::sync::Once;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT_TEST_TRACING: Once = Once::new();

/// Installs the global tracing subscriber for a binary.
///
/// The filter is read from `RUST_LOG` and falls back to info level for the binary and the
/// `shovel` crate.
pub fn init_tracing(app_name: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let default_filter = format!("{}=info,shovel=info", app_name.replace('-', "_"));

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

/// Installs a subscriber writing to the test harness output.
///
/// Safe to call from every test, only the first call has an effect. Nothing is logged unless
/// `RUST_LOG` is set.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "off".into());

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}
