use tracing::debug;

use crate::evaluator::Qualifier;
use crate::types::{Insight, ThresholdConfig};

/// Returns `true` when `value` falls outside the configured bounds.
///
/// An absent bound never trips.
pub fn check_threshold(value: f64, min: Option<f64>, max: Option<f64>) -> bool {
    min.is_some_and(|lo| value < lo) || max.is_some_and(|hi| value > hi)
}

/// Lookup table of [`ThresholdConfig`] entries keyed by
/// `(source, source_id, category)`.
#[derive(Debug, Clone, Default)]
pub struct ThresholdStore {
    configs: Vec<ThresholdConfig>,
}

impl ThresholdStore {
    pub fn new(configs: Vec<ThresholdConfig>) -> Self {
        Self { configs }
    }

    /// Store pre-loaded with the built-in source threshold table.
    pub fn builtin() -> Self {
        Self::new(crate::catalog::threshold_configs())
    }

    pub fn configs(&self) -> &[ThresholdConfig] {
        &self.configs
    }

    /// First enabled config whose key matches exactly.
    ///
    /// A stored `source_id = None` only matches lookups without a source id;
    /// a lookup with a source id never falls back to the source-wide entry.
    pub fn thresholds_for(
        &self,
        source: &str,
        source_id: Option<&str>,
        category: &str,
    ) -> Option<&ThresholdConfig> {
        self.configs.iter().find(|c| {
            c.enabled
                && c.source == source
                && c.source_id.as_deref() == source_id
                && c.category == category
        })
    }

    /// Whether the insight's value trips its source thresholds.
    ///
    /// Insights without a matching config never qualify.
    pub fn should_notify(&self, insight: &Insight) -> bool {
        let category = insight.category_or_default();
        match self.thresholds_for(&insight.source, insight.source_id.as_deref(), category) {
            Some(cfg) => {
                let tripped = check_threshold(insight.value, cfg.min_threshold, cfg.max_threshold);
                debug!(
                    insight_id = %insight.id,
                    config_id = %cfg.id,
                    value = insight.value,
                    tripped,
                    "source threshold checked"
                );
                tripped
            }
            None => {
                debug!(
                    insight_id = %insight.id,
                    source = %insight.source,
                    category,
                    "no threshold config, insight skipped"
                );
                false
            }
        }
    }
}

impl Qualifier for ThresholdStore {
    fn qualifies(&self, insight: &Insight) -> bool {
        self.should_notify(insight)
    }
}
