use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category applied when an insight does not declare one.
pub const DEFAULT_CATEGORY: &str = ".pro";
/// Message type applied when an insight does not declare one.
pub const DEFAULT_TYPE: &str = "insight";
/// Status given to freshly converted messages.
pub const DEFAULT_STATUS: &str = "new-insight";
/// Agent id used when neither the caller nor the insight names one.
pub const DEFAULT_AGENT_ID: &str = "default";

/// Numeric message id minted by the inbox counter.
pub type MessageId = u64;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

// ---------------------------------------------------------------------------
// Insight
// ---------------------------------------------------------------------------

/// Bounds an upstream producer attached to the insight itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightThreshold {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightMetadata {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub expired: bool,
    /// Days until the insight stops being actionable.
    #[serde(default)]
    pub countdown: Option<i64>,
}

/// A candidate data point produced by an upstream agent feed.
///
/// Every field except `id` and `title` is optional on the wire; consumers
/// apply permissive defaults instead of rejecting partial records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub time_sensitive: bool,
    #[serde(default)]
    pub threshold: Option<InsightThreshold>,
    #[serde(default)]
    pub metadata: InsightMetadata,
}

impl Insight {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        source: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            category: None,
            kind: None,
            source: source.into(),
            source_id: None,
            agent_id: None,
            value,
            severity: None,
            time_sensitive: false,
            threshold: None,
            metadata: InsightMetadata::default(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_time_sensitive(mut self, time_sensitive: bool) -> Self {
        self.time_sensitive = time_sensitive;
        self
    }

    pub fn with_metadata(mut self, metadata: InsightMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Category, or [`DEFAULT_CATEGORY`] when the producer left it out.
    pub fn category_or_default(&self) -> &str {
        self.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
    }

    pub fn kind_or_default(&self) -> &str {
        self.kind.as_deref().unwrap_or(DEFAULT_TYPE)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A persisted inbox entry derived from a qualifying insight.
///
/// Only `read` changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub title: String,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub icon: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insight_data: Option<Insight>,
    pub agent_id: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Threshold configuration
// ---------------------------------------------------------------------------

/// Static bounds keyed by `(source, source_id, category)`.
///
/// `source_id = None` is the source-wide entry for that category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    pub id: String,
    pub source: String,
    #[serde(default)]
    pub source_id: Option<String>,
    pub category: String,
    #[serde(default)]
    pub min_threshold: Option<f64>,
    #[serde(default)]
    pub max_threshold: Option<f64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Per-agent qualification rules used by the insight evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentThresholds {
    /// Values strictly above this qualify.
    #[serde(default)]
    pub above: Option<f64>,
    /// Values strictly below this qualify.
    #[serde(default)]
    pub below: Option<f64>,
    #[serde(default)]
    pub severities: Vec<Severity>,
    #[serde(default)]
    pub require_time_sensitive: bool,
    #[serde(default = "default_min_score")]
    pub min_score: u8,
}

fn default_min_score() -> u8 {
    75
}

impl Default for AgentThresholds {
    fn default() -> Self {
        Self {
            above: Some(80.0),
            below: Some(20.0),
            severities: vec![Severity::High],
            require_time_sensitive: true,
            min_score: default_min_score(),
        }
    }
}
