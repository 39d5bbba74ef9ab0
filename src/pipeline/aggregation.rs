use std::sync::Arc;

use crate::errors::WafsmithError;
use crate::harness::{EvaluationHarness, RuleVerdict};
use crate::synthesis::RuleSynthesizer;
use tracing::{debug, info};

/// Fewer validated rules than this are carried forward as they are.
pub const MIN_RULES_TO_AGGREGATE: usize = 2;

/// A consolidated rule and the payloads it was shown to block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidatedRule {
    pub rule: String,
    pub blocked: Vec<String>,
}

/// Merges individually validated rules and re-validates what comes back.
pub struct AggregationEngine {
    synthesizer: Arc<dyn RuleSynthesizer>,
}

impl AggregationEngine {
    pub fn new(synthesizer: Arc<dyn RuleSynthesizer>) -> Self {
        Self { synthesizer }
    }

    pub fn should_aggregate(rule_count: usize) -> bool {
        rule_count >= MIN_RULES_TO_AGGREGATE
    }

    /// Ask the synthesizer for consolidated rules. Blank and repeated lines
    /// are dropped; an empty result means aggregation was skipped.
    pub async fn consolidate(&self, rules: &[String], traffic: &[String]) -> Vec<String> {
        let mut consolidated: Vec<String> = Vec::new();
        for rule in self.synthesizer.aggregate_rules(rules, traffic).await {
            let rule = rule.trim();
            if !rule.is_empty() && !consolidated.iter().any(|r| r == rule) {
                consolidated.push(rule.to_string());
            }
        }
        info!(input = rules.len(), output = consolidated.len(), "Rules consolidated");
        consolidated
    }

    /// Evaluate each consolidated rule against every payload that fed the
    /// aggregation. Rules that block nothing are discarded.
    pub async fn validate(
        &self,
        harness: &EvaluationHarness,
        consolidated: &[String],
        payloads: &[String],
        mut on_verdict: impl FnMut(&RuleVerdict),
    ) -> Result<Vec<ConsolidatedRule>, WafsmithError> {
        let mut surviving = Vec::new();
        for rule in consolidated {
            let verdict = harness.evaluate_rule_against_many(rule, payloads).await?;
            on_verdict(&verdict);
            if verdict.blocked.is_empty() {
                debug!(rule = %rule, "Consolidated rule blocks nothing, discarding");
                continue;
            }
            surviving.push(ConsolidatedRule {
                rule: rule.clone(),
                blocked: verdict.blocked,
            });
        }
        Ok(surviving)
    }
}
