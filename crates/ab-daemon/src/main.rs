//! agentboard daemon: polls agent insights into the inbox until ctrl-c.

use ab_core::config::{Config, LogFormat};
use ab_daemon::daemon::Daemon;
use ab_telemetry::logging::{self, Format};
use anyhow::Result;
use tracing::{error, info, warn};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let loaded = Config::load();
    let config = loaded.as_ref().cloned().unwrap_or_default();

    let format = match config.general.log_format {
        LogFormat::Human => Format::Human,
        LogFormat::Json => Format::Json,
    };
    logging::init("ab-daemon", &config.general.log_level, format);

    if let Err(e) = &loaded {
        warn!(
            error = %e,
            path = %Config::default_path().display(),
            "failed to load config, using defaults"
        );
    }
    info!(version = env!("CARGO_PKG_VERSION"), "agentboard daemon starting");

    let daemon = Daemon::new(config)?;
    let shutdown = daemon.shutdown_handle();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("ctrl-c received, initiating shutdown");
        shutdown.trigger();
    });

    daemon.run().await
}
