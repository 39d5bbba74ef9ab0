use std::path::Path;
use crate::errors::WafsmithError;
use super::types::WafsmithConfig;
use super::schema::CONFIG_SCHEMA;
use tracing::{debug, warn};

const MAX_CONFIG_BYTES: u64 = 1_048_576;

pub async fn parse_config(path: &Path) -> Result<WafsmithConfig, WafsmithError> {
    if !path.exists() {
        return Err(WafsmithError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(WafsmithError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config = parse_config_str(&content)?;
    debug!(path = %path.display(), "Config loaded");
    Ok(config)
}

/// Parse an in-memory YAML document. An empty document is the default config.
pub fn parse_config_str(content: &str) -> Result<WafsmithConfig, WafsmithError> {
    if content.trim().is_empty() {
        return Ok(WafsmithConfig::default());
    }
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
    validate_schema(&yaml)?;
    let config: WafsmithConfig = serde_yaml::from_value(yaml)?;
    validate_conflicts(&config)?;
    Ok(config)
}

/// Check structure against the JSON schema. Violations are logged, not fatal.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<Vec<String>, WafsmithError> {
    let json_value = serde_json::to_value(yaml)
        .map_err(|e| WafsmithError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| WafsmithError::Config(format!("Schema compilation error: {}", e)))?;

    let mut messages = Vec::new();
    if let Err(errors) = compiled.validate(&json_value) {
        messages = errors
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        for msg in &messages {
            warn!(validation_error = %msg, "Config schema warning");
        }
    }
    Ok(messages)
}

/// Detect settings that parse but cannot produce a meaningful run.
pub fn validate_conflicts(config: &WafsmithConfig) -> Result<(), WafsmithError> {
    let harness = config.harness_settings();
    if harness.blocked_status == harness.allowed_status {
        return Err(WafsmithError::Config(format!(
            "Blocked and allowed status are both {}",
            harness.blocked_status
        )));
    }

    if config.threads() == 0 {
        return Err(WafsmithError::Config("Thread count must be at least 1".into()));
    }

    // Rejects unknown positions.
    config.probe_target()?;

    if let Some(env) = &config.environment {
        if env.artifact_prefix.as_deref().is_some_and(str::is_empty) {
            return Err(WafsmithError::Config("Artifact prefix must not be empty".into()));
        }
    }

    if let Some(llm) = &config.llm {
        if llm.provider.as_deref() == Some("openai") && llm.base_url.is_some() {
            warn!("base_url is set for the openai provider; requests go to that URL");
        }
    }

    Ok(())
}
