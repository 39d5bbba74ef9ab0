use crate::errors::WafsmithError;
use super::provider::LLMProvider;
use super::openai::{OpenAIProvider, DEFAULT_OPENAI_BASE_URL};

const DEFAULT_LOCAL_BASE_URL: &str = "http://localhost:11434/v1";

pub fn create_provider(
    provider_name: &str,
    api_key: &str,
    model: Option<&str>,
    base_url: Option<&str>,
) -> Result<Box<dyn LLMProvider>, WafsmithError> {
    match provider_name {
        "openai" => {
            if api_key.is_empty() {
                return Err(WafsmithError::Authentication(
                    "No API key configured. Pass --api-key, set llm.api_key or OPENAI_API_KEY".into(),
                ));
            }
            let url = base_url.unwrap_or(DEFAULT_OPENAI_BASE_URL);
            Ok(Box::new(OpenAIProvider::with_base_url(api_key, model, url)?))
        }
        // Ollama, vLLM and friends speak the same chat completions protocol.
        "local" | "openai_compatible" => {
            let url = base_url.unwrap_or(DEFAULT_LOCAL_BASE_URL);
            Ok(Box::new(OpenAIProvider::with_base_url(api_key, model, url)?))
        }
        _ => Err(WafsmithError::Config(format!("Unknown LLM provider: {}", provider_name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_requires_key() {
        let err = create_provider("openai", "", None, None).err().unwrap();
        assert!(matches!(err, WafsmithError::Authentication(_)));
    }

    #[test]
    fn test_local_allows_empty_key() {
        let provider = create_provider("local", "", Some("llama3"), None).unwrap();
        assert_eq!(provider.provider_name(), "openai_compatible");
        assert_eq!(provider.model_name(), "llama3");
    }

    #[test]
    fn test_unknown_provider() {
        let err = create_provider("carrier-pigeon", "k", None, None).err().unwrap();
        assert!(matches!(err, WafsmithError::Config(_)));
    }
}
