use std::ops::Range;
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use crate::errors::{with_retry, RetryConfig, WafsmithError};
use crate::llm::{Conversation, LLMProvider};
use crate::payload::{HttpMethod, Position};
use crate::prompts::{PromptLoader, PromptVariables};
use super::classification::{join_code_fences, parse_classification, strip_code_fences, Classification};
use super::RuleSynthesizer;
use tracing::{debug, error, warn};

/// ModSecurity rule ids handed out to generated rules.
pub const DEFAULT_RULE_ID_RANGE: Range<u64> = 1_000_000_000_000..9_999_999_999_999;
pub const DEFAULT_REGEX_ATTEMPTS: u32 = 3;

/// [`RuleSynthesizer`] that drives a chat model through a short conversation
/// per payload: first a regular expression, then the rule built from it.
pub struct LlmRuleSynthesizer {
    provider: Arc<dyn LLMProvider>,
    prompts: PromptLoader,
    retry: RetryConfig,
    regex_attempts: u32,
    rule_ids: Range<u64>,
}

impl LlmRuleSynthesizer {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            prompts: PromptLoader::default(),
            retry: RetryConfig::default(),
            regex_attempts: DEFAULT_REGEX_ATTEMPTS,
            rule_ids: DEFAULT_RULE_ID_RANGE,
        }
    }

    pub fn with_prompts(mut self, prompts: PromptLoader) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Attempts at a matching regular expression before giving up on a payload.
    pub fn with_regex_attempts(mut self, attempts: u32) -> Self {
        self.regex_attempts = attempts.max(1);
        self
    }

    pub fn with_rule_ids(mut self, range: Range<u64>) -> Self {
        self.rule_ids = range;
        self
    }

    fn next_rule_id(&self) -> u64 {
        if self.rule_ids.is_empty() {
            return self.rule_ids.start;
        }
        rand::thread_rng().gen_range(self.rule_ids.clone())
    }

    /// Send one user turn and record the answer in the conversation.
    async fn ask(&self, conversation: &mut Conversation, prompt: &str) -> Result<String, WafsmithError> {
        conversation.push_user(prompt);
        let messages = conversation.messages();
        let provider = self.provider.as_ref();
        let response = with_retry("llm_chat", &self.retry, || provider.chat(messages)).await?;
        conversation.push_assistant(&response.content);
        Ok(response.content)
    }

    async fn try_synthesize(
        &self,
        payload: &str,
        method: HttpMethod,
        position: &Position,
    ) -> Result<Option<String>, WafsmithError> {
        let mut conversation = Conversation::with_system(&self.prompts.load("create-system")?);

        let vars = PromptVariables { payload: Some(payload.to_string()), ..Default::default() };
        let mut prompt = self.prompts.render("create-regex", &vars)?;
        let mut matched = false;
        for attempt in 1..=self.regex_attempts {
            let expression = strip_code_fences(&self.ask(&mut conversation, &prompt).await?);
            if self.validate_candidate(&expression, payload) {
                debug!(payload, expression = %expression, attempt, "Regular expression validated");
                matched = true;
                break;
            }
            debug!(payload, expression = %expression, attempt, "Regular expression does not match payload");
            prompt = self.prompts.load("create-regex-retry")?;
        }
        if !matched {
            warn!(payload, attempts = self.regex_attempts, "No matching regular expression, skipping payload");
            return Ok(None);
        }

        let vars = PromptVariables {
            method: Some(method.to_string()),
            position: Some(position.label().to_string()),
            rule_id: Some(self.next_rule_id().to_string()),
            ..Default::default()
        };
        let rule = strip_code_fences(&self.ask(&mut conversation, &self.prompts.render("create-rule", &vars)?).await?);
        Ok(if rule.is_empty() { None } else { Some(rule) })
    }

    async fn try_aggregate(&self, rules: &[String], traffic: &[String]) -> Result<Vec<String>, WafsmithError> {
        let mut conversation = Conversation::with_system(&self.prompts.load("aggregate-system")?);
        let vars = PromptVariables {
            rules: Some(rules.join("\n")),
            traffic: Some(traffic.join("\n")),
            ..Default::default()
        };
        let answer = self.ask(&mut conversation, &self.prompts.render("aggregate", &vars)?).await?;
        // Models often put each consolidated rule in its own fenced block.
        Ok(join_code_fences(&answer)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn try_classify(&self, line: &str) -> Result<Option<Classification>, WafsmithError> {
        let mut conversation = Conversation::with_system(&self.prompts.load("classify-system")?);
        let vars = PromptVariables { log: Some(line.to_string()), ..Default::default() };
        let answer = self.ask(&mut conversation, &self.prompts.render("classify", &vars)?).await?;
        Ok(parse_classification(&answer))
    }
}

#[async_trait]
impl RuleSynthesizer for LlmRuleSynthesizer {
    async fn synthesize_rule(&self, payload: &str, method: HttpMethod, position: &Position) -> Option<String> {
        match self.try_synthesize(payload, method, position).await {
            Ok(rule) => rule,
            Err(e) => {
                error!(payload, error = %e, "Rule synthesis failed");
                None
            }
        }
    }

    async fn aggregate_rules(&self, rules: &[String], traffic: &[String]) -> Vec<String> {
        match self.try_aggregate(rules, traffic).await {
            Ok(aggregated) => aggregated,
            Err(e) => {
                error!(rules = rules.len(), error = %e, "Rule aggregation failed");
                Vec::new()
            }
        }
    }

    async fn classify_log(&self, line: &str) -> Option<Classification> {
        match self.try_classify(line).await {
            Ok(verdict) => verdict,
            Err(e) => {
                error!(error = %e, "Log classification failed");
                None
            }
        }
    }
}
