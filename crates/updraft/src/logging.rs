use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, defaulting to
/// `updraft=info`. Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("updraft=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
