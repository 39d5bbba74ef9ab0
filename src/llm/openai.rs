use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use crate::errors::WafsmithError;
use crate::utils::truncation::truncate_for_log;
use super::provider::LLMProvider;
use super::types::{LLMResponse, Message};
use tracing::debug;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat completions client for OpenAI and any server exposing the same API.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: &str, model: Option<&str>) -> Result<Self, WafsmithError> {
        Self::with_base_url(api_key, model, DEFAULT_OPENAI_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, model: Option<&str>, base_url: &str) -> Result<Self, WafsmithError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| WafsmithError::Network(format!("Failed to build LLM client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat(&self, messages: &[Message]) -> Result<LLMResponse, WafsmithError> {
        let body = json!({
            "model": self.model,
            "messages": messages,
        });

        let mut request = self.client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                WafsmithError::Timeout(format!("LLM request timed out: {}", e))
            } else {
                WafsmithError::Network(format!("LLM request failed: {}", e))
            }
        })?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(WafsmithError::RateLimit(format!("{} rate limit", self.provider_name())));
        }
        if status.as_u16() == 401 {
            return Err(WafsmithError::Authentication(format!("Invalid {} API key", self.provider_name())));
        }

        let data: Value = resp.json().await
            .map_err(|e| WafsmithError::LLMApi(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(error) = data.get("error") {
            return Err(WafsmithError::LLMApi(error["message"].as_str().unwrap_or("Unknown").to_string()));
        }
        if !status.is_success() {
            return Err(WafsmithError::LLMApi(format!("LLM endpoint returned HTTP {}", status)));
        }

        let content = data["choices"][0]["message"]["content"].as_str()
            .ok_or_else(|| WafsmithError::LLMApi("No content in LLM response".into()))?
            .to_string();
        debug!(model = %self.model, response = %truncate_for_log(&content, 500), "LLM response");

        Ok(LLMResponse {
            content,
            input_tokens: data["usage"]["prompt_tokens"].as_u64(),
            output_tokens: data["usage"]["completion_tokens"].as_u64(),
            model: self.model.clone(),
        })
    }

    fn provider_name(&self) -> &str {
        if self.base_url == DEFAULT_OPENAI_BASE_URL { "openai" } else { "openai_compatible" }
    }

    fn model_name(&self) -> &str { &self.model }
}
