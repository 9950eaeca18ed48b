use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber once per process.
///
/// `RUST_LOG` overrides `default_level`. JSON output is for log
/// shippers; the plain layer carries targets and thread ids for
/// interactive runs.
pub fn init(default_level: &str, json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}
