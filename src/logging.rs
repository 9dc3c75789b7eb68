use tracing_subscriber::EnvFilter;

/// Sets up logging of events reported by numlib.
///
/// Use the RUST_LOG environment variable to override the defaults.
///
/// E.g. To enable debug level logging:
///   RUST_LOG=DEBUG
///
/// Or to only log the steps of the resolver:
///   RUST_LOG=numlib::resolver=INFO
///
/// Calling this more than once has no effect.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_thread_ids(true)
        .without_time()
        .try_init()
        .ok();
}
