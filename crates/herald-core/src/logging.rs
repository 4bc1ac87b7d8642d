use crate::Result;

/// Initialize tracing for a herald process.
///
/// Diagnostics always go to stderr: the worker's stdout is reserved for the
/// control channel, and the supervisor keeps the same convention so both
/// processes log alike.
///
/// Default: info for our crates, warn for everything else. Can be overridden
/// with `RUST_LOG`.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let service = service_name.replace('-', "_");
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,herald_core=info,{service}=info")));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
