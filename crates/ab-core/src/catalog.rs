//! Built-in catalogs: mock insight feed, per-agent thresholds and source
//! threshold configs used by the dashboard scenarios.

use std::collections::HashMap;

use crate::types::{AgentThresholds, Insight, InsightMetadata, InsightThreshold, Severity, ThresholdConfig};

pub const CFO_CASH_OPTIMIZER: &str = "cfo-cash-optimizer";
pub const INVENTORY_PLANNER: &str = "inventory-planner";
pub const SHOPFLOOR_OPTIMIZER: &str = "shopfloor-optimizer";
pub const RND_PORTFOLIO_SCOUT: &str = "rnd-portfolio-scout";

pub fn agent_thresholds() -> HashMap<String, AgentThresholds> {
    let mut table = HashMap::new();
    table.insert(
        CFO_CASH_OPTIMIZER.to_string(),
        AgentThresholds {
            above: Some(90.0),
            below: Some(70.0),
            severities: vec![Severity::High],
            require_time_sensitive: true,
            min_score: 70,
        },
    );
    table.insert(
        INVENTORY_PLANNER.to_string(),
        AgentThresholds {
            above: Some(85.0),
            below: Some(25.0),
            severities: vec![Severity::High, Severity::Medium],
            require_time_sensitive: true,
            min_score: 75,
        },
    );
    table.insert(
        SHOPFLOOR_OPTIMIZER.to_string(),
        AgentThresholds {
            above: Some(95.0),
            below: Some(60.0),
            severities: vec![Severity::High],
            require_time_sensitive: false,
            min_score: 80,
        },
    );
    table.insert(
        RND_PORTFOLIO_SCOUT.to_string(),
        AgentThresholds {
            above: None,
            below: None,
            severities: vec![Severity::High],
            require_time_sensitive: false,
            min_score: 72,
        },
    );
    table
}

fn source_config(
    id: &str,
    source: &str,
    source_id: Option<&str>,
    category: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> ThresholdConfig {
    ThresholdConfig {
        id: id.to_string(),
        source: source.to_string(),
        source_id: source_id.map(str::to_string),
        category: category.to_string(),
        min_threshold: min,
        max_threshold: max,
        enabled: true,
    }
}

pub fn threshold_configs() -> Vec<ThresholdConfig> {
    vec![
        source_config("inv-default", "inventory", None, ".pro", Some(20.0), Some(90.0)),
        source_config("inv-wh-east", "inventory", Some("wh-east"), ".pro", Some(30.0), Some(85.0)),
        source_config("treasury-default", "treasury", None, ".fin", Some(70.0), Some(90.0)),
        source_config("mes-line-2", "mes", Some("line-2"), ".pro", Some(60.0), Some(95.0)),
        source_config("lab-default", "lab", None, ".r&d", None, Some(80.0)),
    ]
}

fn meta(author: &str, date: &str, countdown: Option<i64>) -> InsightMetadata {
    InsightMetadata {
        status: Some("new-insight".to_string()),
        author: Some(author.to_string()),
        date: Some(date.to_string()),
        expired: false,
        countdown,
    }
}

/// The fixed insight set the polling driver evaluates.
pub fn mock_insights() -> Vec<Insight> {
    vec![
        Insight::new("ins-001", "Idle cash above target in operating account", "treasury", 92.0)
            .with_category(".fin")
            .with_kind("opportunity")
            .with_agent(CFO_CASH_OPTIMIZER)
            .with_severity(Severity::Medium)
            .with_metadata(meta("Cash Optimizer", "2024-05-02", Some(5))),
        Insight::new("ins-002", "Receivables collection pace on plan", "treasury", 88.0)
            .with_category(".pro")
            .with_agent(CFO_CASH_OPTIMIZER)
            .with_metadata(meta("Cash Optimizer", "2024-05-02", None)),
        Insight {
            threshold: Some(InsightThreshold {
                min: Some(30.0),
                max: Some(85.0),
                source: Some("inventory".to_string()),
            }),
            ..Insight::new("ins-003", "Safety stock breach for SKU-1142", "inventory", 18.0)
                .with_category(".pro")
                .with_kind("alert")
                .with_source_id("wh-east")
                .with_agent(INVENTORY_PLANNER)
                .with_severity(Severity::High)
                .with_time_sensitive(true)
                .with_metadata(meta("Inventory Planner", "2024-05-03", Some(2)))
        },
        Insight::new("ins-004", "Slow-moving stock in regional warehouse", "inventory", 55.0)
            .with_category(".pro")
            .with_agent(INVENTORY_PLANNER)
            .with_severity(Severity::Low)
            .with_metadata(meta("Inventory Planner", "2024-05-03", None)),
        Insight::new("ins-005", "Line 2 OEE dropped below target", "mes", 58.0)
            .with_category(".pro")
            .with_kind("alert")
            .with_source_id("line-2")
            .with_agent(SHOPFLOOR_OPTIMIZER)
            .with_severity(Severity::Medium)
            .with_metadata(meta("Shopfloor Optimizer", "2024-05-04", Some(1))),
        Insight::new("ins-006", "Changeover sequence can save 40 minutes per shift", "mes", 78.0)
            .with_category(".pro")
            .with_kind("opportunity")
            .with_agent(SHOPFLOOR_OPTIMIZER)
            .with_metadata(meta("Shopfloor Optimizer", "2024-05-04", None)),
        Insight::new("ins-007", "Prototype yield exceeds pilot criteria", "lab", 84.0)
            .with_category(".r&d")
            .with_kind("opportunity")
            .with_agent(RND_PORTFOLIO_SCOUT)
            .with_time_sensitive(true)
            .with_metadata(meta("Portfolio Scout", "2024-05-05", Some(10))),
    ]
}
