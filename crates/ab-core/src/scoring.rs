//! Composite relevance score for insights.
//!
//! The score blends the insight value, its severity, time sensitivity and
//! category into a single integer in `0..=100`.

use crate::types::{Insight, Severity};

const BASE_SCORE: f64 = 50.0;
const VALUE_WEIGHT: f64 = 0.3;
const TIME_SENSITIVE_BONUS: f64 = 10.0;

fn severity_weight(severity: Option<Severity>) -> f64 {
    match severity {
        Some(Severity::High) => 30.0,
        Some(Severity::Medium) => 15.0,
        Some(Severity::Low) => 5.0,
        None => 0.0,
    }
}

fn category_weight(category: &str) -> f64 {
    match category {
        ".pro" => 5.0,
        ".fin" => 8.0,
        ".r&d" => 6.0,
        _ => 0.0,
    }
}

/// Compute the composite score of an insight.
pub fn score(insight: &Insight) -> u8 {
    let value = if insight.value.is_nan() {
        0.0
    } else {
        insight.value.clamp(0.0, 100.0)
    };

    let mut total = BASE_SCORE + (value - BASE_SCORE) * VALUE_WEIGHT;
    total += severity_weight(insight.severity);
    if insight.time_sensitive {
        total += TIME_SENSITIVE_BONUS;
    }
    total += category_weight(insight.category_or_default());

    total.round().clamp(0.0, 100.0) as u8
}
