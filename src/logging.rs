use tracing_subscriber::EnvFilter;

/// Install the tracing subscriber. Safe to call more than once; later calls
/// are no-ops. `TRIPWRIGHT_LOG` overrides the default filter.
pub fn init() {
    let filter = EnvFilter::try_from_env("TRIPWRIGHT_LOG")
        .unwrap_or_else(|_| EnvFilter::new("tripwright=info,sqlx=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .try_init();
}
