use ab_core::catalog::CFO_CASH_OPTIMIZER;
use ab_core::config::{Config, ConfigError, LogFormat, QualifierKind, StorageBackend};
use ab_core::types::{Insight, Severity};

#[test]
fn default_config() {
    let cfg = Config::default();
    assert_eq!(cfg.general.log_level, "info");
    assert_eq!(cfg.general.log_format, LogFormat::Human);
    assert!(cfg.polling.enabled);
    assert_eq!(cfg.polling.interval_secs, 10);
    assert_eq!(cfg.storage.backend, StorageBackend::File);
    assert_eq!(cfg.storage.messages_key, "agent_inbox_messages");
    assert_eq!(cfg.storage.counter_key, "agent_inbox_id_counter");
    assert_eq!(cfg.notifications.banner_dismiss_secs, 4);
    assert_eq!(cfg.notifications.badge_refresh_secs, 2);
    assert_eq!(cfg.evaluation.qualifier, QualifierKind::Agent);
    assert!(cfg.evaluation.agents.is_empty());
}

#[test]
fn config_roundtrip() {
    let cfg = Config::default();
    let toml_str = cfg.to_toml().expect("serialize to toml");
    assert!(toml_str.contains("agent_inbox_messages"));

    let parsed = Config::from_toml(&toml_str).expect("parse toml back");
    assert_eq!(parsed.polling.interval_secs, cfg.polling.interval_secs);
    assert_eq!(parsed.storage.dir, cfg.storage.dir);
    assert_eq!(
        parsed.evaluation.default_thresholds,
        cfg.evaluation.default_thresholds
    );
}

#[test]
fn config_partial_toml() {
    let partial = r#"
[general]
log_format = "json"

[polling]
interval_secs = 3

[storage]
backend = "memory"
"#;
    let cfg = Config::from_toml(partial).expect("parse partial");
    assert_eq!(cfg.general.log_format, LogFormat::Json);
    assert_eq!(cfg.polling.interval_secs, 3);
    assert_eq!(cfg.storage.backend, StorageBackend::Memory);
    // defaults should fill in the rest
    assert_eq!(cfg.general.log_level, "info");
    assert!(cfg.polling.enabled);
}

#[test]
fn zero_interval_is_rejected() {
    let err = Config::from_toml("[polling]\ninterval_secs = 0\n").unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn identical_storage_keys_are_rejected() {
    let text = r#"
[storage]
messages_key = "inbox"
counter_key = "inbox"
"#;
    assert!(matches!(
        Config::from_toml(text),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn file_backend_rejects_keys_that_are_not_file_names() {
    let text = r#"
[storage]
messages_key = "agent inbox"
"#;
    assert!(matches!(
        Config::from_toml(text),
        Err(ConfigError::Validation(_))
    ));

    let dotted = r#"
[storage]
counter_key = ".counter"
"#;
    assert!(Config::from_toml(dotted).is_err());
}

#[test]
fn memory_backend_accepts_any_distinct_keys() {
    let text = r#"
[storage]
backend = "memory"
messages_key = "agent inbox"
"#;
    let cfg = Config::from_toml(text).unwrap();
    assert_eq!(cfg.storage.messages_key, "agent inbox");
}

#[test]
fn inverted_agent_bounds_are_rejected() {
    let text = r#"
[evaluation.agents.ops]
above = 10.0
below = 50.0
"#;
    assert!(matches!(
        Config::from_toml(text),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    assert!(matches!(
        Config::from_toml("[polling\n"),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn load_from_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load_from(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[notifications]\nbanner_dismiss_secs = 0\n").unwrap();
    let cfg = Config::load_from(&path).unwrap();
    assert_eq!(cfg.notifications.banner_dismiss_secs, 0);
}

#[test]
fn agent_overrides_merge_over_builtin_table() {
    let text = r#"
[evaluation]
qualifier = "agent"

[evaluation.agents.cfo-cash-optimizer]
above = 50.0
below = 10.0
severities = ["medium"]
min_score = 99
"#;
    let cfg = Config::from_toml(text).unwrap();
    let evaluator = cfg.evaluation.build_evaluator();

    let t = evaluator.thresholds_for(Some(CFO_CASH_OPTIMIZER));
    assert_eq!(t.above, Some(50.0));
    assert_eq!(t.severities, vec![Severity::Medium]);
    assert!(!t.require_time_sensitive);

    // other built-in agents survive the merge
    assert!(evaluator.thresholds_for(Some("inventory-planner")).above.is_some());

    let insight = Insight::new("x", "t", "treasury", 60.0).with_agent(CFO_CASH_OPTIMIZER);
    assert!(evaluator.evaluate(&insight, None));
}
