use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::types::AgentThresholds;

/// Top-level configuration loaded from `~/.agentboard/config.toml`.
///
/// Every section is optional; missing keys take the compiled-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

impl Config {
    /// Load config from `~/.agentboard/config.toml`, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic validation for settings that are not fully expressible via type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.general.validate()?;
        self.polling.validate()?;
        self.storage.validate()?;
        self.notifications.validate()?;
        self.evaluation.validate()?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        base_dir().join("config.toml")
    }
}

fn base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agentboard")
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl GeneralConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Validation("general.log_level must not be empty".into()));
        }
        Ok(())
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_poll_interval_secs(),
        }
    }
}

impl PollingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::Validation("polling.interval_secs must be > 0".into()));
        }
        Ok(())
    }
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_storage_dir")]
    pub dir: String,
    #[serde(default = "default_messages_key")]
    pub messages_key: String,
    #[serde(default = "default_counter_key")]
    pub counter_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            dir: default_storage_dir(),
            messages_key: default_messages_key(),
            counter_key: default_counter_key(),
        }
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.messages_key.is_empty() || self.counter_key.is_empty() {
            return Err(ConfigError::Validation("storage keys must not be empty".into()));
        }
        if self.messages_key == self.counter_key {
            return Err(ConfigError::Validation(format!(
                "storage.messages_key and storage.counter_key must differ (both '{}')",
                self.messages_key
            )));
        }
        if self.backend == StorageBackend::File {
            if self.dir.trim().is_empty() {
                return Err(ConfigError::Validation("storage.dir is required for the file backend".into()));
            }
            for key in [&self.messages_key, &self.counter_key] {
                if !is_valid_storage_key(key) {
                    return Err(ConfigError::Validation(format!(
                        "storage key '{key}' is not a valid file name (use [A-Za-z0-9._-], no leading '.')"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Storage directory with a leading `~/` expanded to the home directory.
    pub fn resolved_dir(&self) -> PathBuf {
        match self.dir.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(rest),
            None => PathBuf::from(&self.dir),
        }
    }
}

/// Keys the file backend can map to a file name: non-empty ASCII
/// `[A-Za-z0-9._-]` without a leading `.`.
pub fn is_valid_storage_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn default_storage_dir() -> String {
    "~/.agentboard/storage".into()
}
fn default_messages_key() -> String {
    "agent_inbox_messages".into()
}
fn default_counter_key() -> String {
    "agent_inbox_id_counter".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Seconds a banner stays up before it is dismissed; 0 keeps it until replaced.
    #[serde(default = "default_banner_dismiss_secs")]
    pub banner_dismiss_secs: u64,
    #[serde(default = "default_badge_refresh_secs")]
    pub badge_refresh_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            banner_dismiss_secs: default_banner_dismiss_secs(),
            badge_refresh_secs: default_badge_refresh_secs(),
        }
    }
}

impl NotificationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.badge_refresh_secs == 0 {
            return Err(ConfigError::Validation(
                "notifications.badge_refresh_secs must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_banner_dismiss_secs() -> u64 {
    4
}
fn default_badge_refresh_secs() -> u64 {
    2
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualifierKind {
    /// Per-agent bounds, severity, time sensitivity and composite score.
    #[default]
    Agent,
    /// Source threshold table keyed by `(source, source_id, category)`.
    Source,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvaluationConfig {
    #[serde(default)]
    pub qualifier: QualifierKind,
    #[serde(default)]
    pub default_thresholds: AgentThresholds,
    /// Merged over the built-in agent table.
    #[serde(default)]
    pub agents: HashMap<String, AgentThresholds>,
}

impl EvaluationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let all = std::iter::once(("default", &self.default_thresholds))
            .chain(self.agents.iter().map(|(k, v)| (k.as_str(), v)));
        for (agent, t) in all {
            if t.min_score > 100 {
                return Err(ConfigError::Validation(format!(
                    "evaluation thresholds for '{agent}': min_score {} exceeds 100",
                    t.min_score
                )));
            }
            if let (Some(above), Some(below)) = (t.above, t.below) {
                if below > above {
                    return Err(ConfigError::Validation(format!(
                        "evaluation thresholds for '{agent}': below ({below}) is greater than above ({above})"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Build the evaluator: built-in agent table with configured overrides.
    pub fn build_evaluator(&self) -> crate::evaluator::InsightEvaluator {
        let mut agents = crate::catalog::agent_thresholds();
        for (id, t) in &self.agents {
            agents.insert(id.clone(), t.clone());
        }
        crate::evaluator::InsightEvaluator::new(self.default_thresholds.clone(), agents)
    }
}
