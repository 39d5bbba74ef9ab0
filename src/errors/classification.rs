use super::types::WafsmithError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl WafsmithError {
    /// Classify this error to determine its type and whether it can be retried.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Transient: the LLM endpoint or the network may recover
            WafsmithError::RateLimit(_) => ErrorClassification {
                error_type: "RateLimitError",
                retryable: true,
            },
            WafsmithError::Network(_) => ErrorClassification {
                error_type: "NetworkError",
                retryable: true,
            },
            WafsmithError::Timeout(_) => ErrorClassification {
                error_type: "TimeoutError",
                retryable: true,
            },
            WafsmithError::LLMApi(_) => ErrorClassification {
                error_type: "LLMApiError",
                retryable: true,
            },

            // Operator has to fix something first
            WafsmithError::Authentication(_) => ErrorClassification {
                error_type: "AuthenticationError",
                retryable: false,
            },
            WafsmithError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                retryable: false,
            },
            WafsmithError::Corpus(_) => ErrorClassification {
                error_type: "CorpusError",
                retryable: false,
            },
            WafsmithError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                retryable: false,
            },
            WafsmithError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                retryable: false,
            },

            // The shared test stack is not retried behind the pipeline's back
            WafsmithError::Environment(_) => ErrorClassification {
                error_type: "EnvironmentError",
                retryable: false,
            },
            WafsmithError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: true,
            },
            WafsmithError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: false,
            },
        }
    }
}
