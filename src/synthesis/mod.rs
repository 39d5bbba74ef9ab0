pub mod classification;
pub mod llm;

use async_trait::async_trait;
use regex::Regex;
use crate::payload::{HttpMethod, Position};

pub use classification::{join_code_fences, parse_classification, strip_code_fences, Classification, ThreatCategory};
pub use llm::LlmRuleSynthesizer;

/// Produces candidate WAF rules, consolidated rulesets and log verdicts.
///
/// Implementations absorb their own failures: a missing rule is `None`, a
/// failed aggregation is an empty list, an unreadable verdict is `None`.
#[async_trait]
pub trait RuleSynthesizer: Send + Sync {
    /// Candidate rule for `payload`, or `None` once the synthesizer gives up.
    async fn synthesize_rule(&self, payload: &str, method: HttpMethod, position: &Position) -> Option<String>;

    /// Whether a detection expression catches the payload it was written for.
    fn validate_candidate(&self, expression: &str, payload: &str) -> bool {
        Regex::new(expression)
            .map(|re| re.is_match(payload))
            .unwrap_or(false)
    }

    /// Merge `rules` into fewer rules that leave `traffic` alone.
    async fn aggregate_rules(&self, rules: &[String], traffic: &[String]) -> Vec<String>;

    async fn classify_log(&self, line: &str) -> Option<Classification>;
}
