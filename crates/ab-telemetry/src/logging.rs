use tracing_subscriber::{fmt, EnvFilter};

/// Output format for the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Human,
    Json,
}

/// Initialize the global subscriber in the given format.
///
/// `RUST_LOG` wins over `default_level` when set. Calling this more than
/// once is a no-op, which keeps tests that share a process happy.
pub fn init(service_name: &str, default_level: &str, format: Format) {
    match format {
        Format::Human => init_logging(service_name, default_level),
        Format::Json => init_logging_json(service_name, default_level),
    }
}

/// Human-readable output on stderr.
pub fn init_logging(service_name: &str, default_level: &str) {
    fmt()
        .with_env_filter(filter(default_level))
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    tracing::info!(service = service_name, "logging initialised (human-readable)");
}

/// One JSON object per line, for log shippers.
pub fn init_logging_json(service_name: &str, default_level: &str) {
    fmt()
        .json()
        .with_env_filter(filter(default_level))
        .with_target(true)
        .with_current_span(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    tracing::info!(service = service_name, "logging initialised (json)");
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(default_level).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}
