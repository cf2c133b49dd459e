use std::collections::HashMap;

use tracing::debug;

use crate::scoring::score;
use crate::types::{AgentThresholds, Insight};

/// Decides whether an insight is worth delivering to the inbox.
pub trait Qualifier: Send + Sync {
    fn qualifies(&self, insight: &Insight) -> bool;
}

/// Why an insight qualified. Rules are checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualifyReason {
    AboveBound,
    BelowBound,
    Severity,
    TimeSensitive,
    Score,
}

/// Per-agent insight evaluator.
///
/// Thresholds are resolved from the agent table, falling back to the global
/// default when the insight names no agent or an unknown one.
#[derive(Debug, Clone, Default)]
pub struct InsightEvaluator {
    default: AgentThresholds,
    agents: HashMap<String, AgentThresholds>,
}

impl InsightEvaluator {
    pub fn new(default: AgentThresholds, agents: HashMap<String, AgentThresholds>) -> Self {
        Self { default, agents }
    }

    /// Evaluator loaded with the built-in agent table.
    pub fn builtin() -> Self {
        Self::new(AgentThresholds::default(), crate::catalog::agent_thresholds())
    }

    /// Register or replace thresholds for one agent.
    pub fn set_agent_thresholds(&mut self, agent_id: impl Into<String>, thresholds: AgentThresholds) {
        self.agents.insert(agent_id.into(), thresholds);
    }

    pub fn thresholds_for(&self, agent_id: Option<&str>) -> &AgentThresholds {
        agent_id
            .and_then(|id| self.agents.get(id))
            .unwrap_or(&self.default)
    }

    /// Returns the first rule the insight satisfies, if any.
    pub fn qualify_reason(
        &self,
        insight: &Insight,
        thresholds: Option<&AgentThresholds>,
    ) -> Option<QualifyReason> {
        let t = thresholds.unwrap_or_else(|| self.thresholds_for(insight.agent_id.as_deref()));

        if t.above.is_some_and(|above| insight.value > above) {
            return Some(QualifyReason::AboveBound);
        }
        if t.below.is_some_and(|below| insight.value < below) {
            return Some(QualifyReason::BelowBound);
        }
        if insight.severity.is_some_and(|s| t.severities.contains(&s)) {
            return Some(QualifyReason::Severity);
        }
        if insight.time_sensitive && t.require_time_sensitive {
            return Some(QualifyReason::TimeSensitive);
        }
        if score(insight) >= t.min_score {
            return Some(QualifyReason::Score);
        }
        None
    }

    /// Whether the insight qualifies under the resolved (or given) thresholds.
    pub fn evaluate(&self, insight: &Insight, thresholds: Option<&AgentThresholds>) -> bool {
        let reason = self.qualify_reason(insight, thresholds);
        debug!(
            insight_id = %insight.id,
            agent_id = insight.agent_id.as_deref().unwrap_or("-"),
            value = insight.value,
            ?reason,
            "insight evaluated"
        );
        reason.is_some()
    }

    /// Qualifying insights, in input order.
    pub fn evaluate_all<'a>(&self, insights: &'a [Insight]) -> Vec<&'a Insight> {
        insights.iter().filter(|i| self.evaluate(i, None)).collect()
    }
}

impl Qualifier for InsightEvaluator {
    fn qualifies(&self, insight: &Insight) -> bool {
        self.evaluate(insight, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    fn cfo() -> AgentThresholds {
        AgentThresholds {
            above: Some(90.0),
            below: Some(70.0),
            severities: vec![Severity::High],
            require_time_sensitive: true,
            min_score: 70,
        }
    }

    fn evaluator() -> InsightEvaluator {
        let mut agents = HashMap::new();
        agents.insert("cfo-cash-optimizer".to_string(), cfo());
        InsightEvaluator::new(AgentThresholds::default(), agents)
    }

    fn cash(value: f64) -> Insight {
        Insight::new("cash-1", "Idle cash", "treasury", value)
            .with_category(".pro")
            .with_agent("cfo-cash-optimizer")
    }

    #[test]
    fn in_band_value_below_min_score_does_not_qualify() {
        assert!(!evaluator().evaluate(&cash(88.0), None));
    }

    #[test]
    fn value_above_bound_qualifies_regardless_of_score() {
        let ev = evaluator();
        assert!(ev.evaluate(&cash(92.0), None));
        assert_eq!(ev.qualify_reason(&cash(92.0), None), Some(QualifyReason::AboveBound));
    }

    #[test]
    fn value_below_bound_qualifies() {
        assert_eq!(
            evaluator().qualify_reason(&cash(40.0), None),
            Some(QualifyReason::BelowBound)
        );
    }

    #[test]
    fn accepted_severity_qualifies() {
        let insight = cash(80.0).with_severity(Severity::High);
        assert_eq!(evaluator().qualify_reason(&insight, None), Some(QualifyReason::Severity));
    }

    #[test]
    fn unaccepted_severity_falls_through_to_score() {
        // 50 + 9 + 5 (low) + 5 (.pro) = 69 < 70
        let insight = cash(80.0).with_severity(Severity::Low);
        assert!(!evaluator().evaluate(&insight, None));
    }

    #[test]
    fn time_sensitive_needs_config_flag() {
        let insight = cash(80.0).with_time_sensitive(true);
        assert_eq!(
            evaluator().qualify_reason(&insight, None),
            Some(QualifyReason::TimeSensitive)
        );

        let mut relaxed = cfo();
        relaxed.require_time_sensitive = false;
        relaxed.min_score = 90;
        assert!(!evaluator().evaluate(&insight, Some(&relaxed)));
    }

    #[test]
    fn score_rule_uses_min_score() {
        let mut strict = cfo();
        strict.min_score = 66;
        assert_eq!(
            evaluator().qualify_reason(&cash(88.0), Some(&strict)),
            Some(QualifyReason::Score)
        );
    }

    #[test]
    fn unknown_agent_uses_default_thresholds() {
        let ev = evaluator();
        let insight = Insight::new("x", "t", "s", 85.0).with_agent("nobody");
        assert_eq!(ev.thresholds_for(Some("nobody")), &AgentThresholds::default());
        // default `above` is 80
        assert!(ev.evaluate(&insight, None));
    }

    #[test]
    fn explicit_thresholds_override_agent_table() {
        let loose = AgentThresholds {
            above: Some(50.0),
            ..cfo()
        };
        assert!(evaluator().evaluate(&cash(88.0), Some(&loose)));
    }

    #[test]
    fn evaluate_all_keeps_input_order() {
        let insights = vec![cash(92.0), cash(88.0), cash(10.0)];
        let picked = evaluator().evaluate_all(&insights);
        let values: Vec<f64> = picked.iter().map(|i| i.value).collect();
        assert_eq!(values, vec![92.0, 10.0]);
    }
}
