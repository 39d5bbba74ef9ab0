use async_trait::async_trait;
use crate::errors::WafsmithError;
use super::types::{LLMResponse, Message};

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Chat completion over the full message history
    async fn chat(&self, messages: &[Message]) -> Result<LLMResponse, WafsmithError>;

    /// Single-turn completion
    async fn complete(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<LLMResponse, WafsmithError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system {
            messages.push(Message::system(sys));
        }
        messages.push(Message::user(prompt));
        self.chat(&messages).await
    }

    /// Provider name for logging
    fn provider_name(&self) -> &str;

    /// Model identifier
    fn model_name(&self) -> &str;
}
