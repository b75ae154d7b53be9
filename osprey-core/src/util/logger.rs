use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default directive set for simulator runs: engine, risk and ledger at
/// the caller's level, the fabric capped at `warn`. The fabric fast
/// paths emit nothing, so anything below `warn` from that module is
/// construction noise that would drown the matching and risk events.
fn default_filter(log_level: &str) -> EnvFilter {
    EnvFilter::new(format!("{log_level},osprey_core::fabric=warn"))
}

/// Initialize tracing for simulator binaries and harnesses
///
/// `RUST_LOG` wins when set; otherwise `log_level` applies with the
/// fabric quieted (see [`default_filter`]). JSON output is for log
/// shippers. The plain layer keeps thread ids because the engine,
/// ledger and risk gate each log from their owning thread, and the
/// interleaving is the first thing worth seeing in a stuck simulation.
pub fn init_logger(log_level: &str, json_logs: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(log_level));

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}
