use ab_telemetry::logging::{self, Format};

#[test]
fn init_is_idempotent() {
    logging::init("ab-telemetry-test", "debug", Format::Human);
    logging::init("ab-telemetry-test", "info", Format::Human);
    tracing::info!(key = "value", "human-readable log line");
}

#[test]
fn json_init_after_global_set_is_noop() {
    logging::init("ab-telemetry-test", "info", Format::Json);
    tracing::info!(key = "value", "json log line");
}

#[test]
fn bad_default_level_does_not_panic() {
    logging::init_logging("fallback-test", "not a [valid filter");
}
