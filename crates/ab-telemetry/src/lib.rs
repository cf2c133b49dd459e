//! Logging and metrics for agentboard processes.
//!
//! - **Logging**: human-readable or JSON output through `tracing-subscriber`,
//!   filtered by `RUST_LOG` or a configured default level.
//! - **Metrics**: in-process counters, gauges and histograms with Prometheus
//!   text and JSON export.

pub mod logging;
pub mod metrics;

pub use metrics::{names, Labels, MetricsCollector};
