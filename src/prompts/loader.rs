use std::path::PathBuf;

use crate::errors::WafsmithError;
use super::templates;
use tracing::debug;

/// Values substituted into `{{NAME}}` placeholders. Unset values become empty.
#[derive(Debug, Clone, Default)]
pub struct PromptVariables {
    pub payload: Option<String>,
    pub method: Option<String>,
    pub position: Option<String>,
    pub rule_id: Option<String>,
    pub rules: Option<String>,
    pub traffic: Option<String>,
    pub log: Option<String>,
}

/// Resolves prompt templates by name. Files named `<name>.txt` in the
/// override directory replace the built-in text.
#[derive(Debug, Clone, Default)]
pub struct PromptLoader {
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = &override_dir {
            debug!(dir = %dir.display(), "Prompt overrides enabled");
        }
        Self { override_dir }
    }

    pub fn load(&self, name: &str) -> Result<String, WafsmithError> {
        if let Some(dir) = &self.override_dir {
            let path = dir.join(format!("{}.txt", name));
            if path.is_file() {
                return std::fs::read_to_string(&path).map_err(|e| {
                    WafsmithError::Config(format!("Failed to read prompt {}: {}", path.display(), e))
                });
            }
        }
        builtin(name)
            .map(str::to_string)
            .ok_or_else(|| WafsmithError::Config(format!("Unknown prompt: {}", name)))
    }

    pub fn render(&self, name: &str, vars: &PromptVariables) -> Result<String, WafsmithError> {
        Ok(Self::interpolate(&self.load(name)?, vars))
    }

    pub fn interpolate(template: &str, vars: &PromptVariables) -> String {
        let replacements: &[(&str, &Option<String>)] = &[
            ("{{PAYLOAD}}", &vars.payload),
            ("{{METHOD}}", &vars.method),
            ("{{POSITION}}", &vars.position),
            ("{{ID}}", &vars.rule_id),
            ("{{RULES}}", &vars.rules),
            ("{{TRAFFIC}}", &vars.traffic),
            ("{{LOG}}", &vars.log),
        ];
        let mut result = template.to_string();
        for (placeholder, value) in replacements {
            result = result.replace(placeholder, value.as_deref().unwrap_or(""));
        }
        result
    }
}

fn builtin(name: &str) -> Option<&'static str> {
    Some(match name {
        "create-system" => templates::CREATE_SYSTEM,
        "create-regex" => templates::CREATE_REGEX,
        "create-regex-retry" => templates::CREATE_REGEX_RETRY,
        "create-rule" => templates::CREATE_RULE,
        "aggregate-system" => templates::AGGREGATE_SYSTEM,
        "aggregate" => templates::AGGREGATE,
        "classify-system" => templates::CLASSIFY_SYSTEM,
        "classify" => templates::CLASSIFY,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_prompt_renders() {
        let loader = PromptLoader::default();
        let vars = PromptVariables {
            method: Some("POST".into()),
            position: Some("HTTP_BODY".into()),
            rule_id: Some("1234567890123".into()),
            ..Default::default()
        };
        let prompt = loader.render("create-rule", &vars).unwrap();
        assert!(prompt.contains("HTTP_BODY of a POST request"));
        assert!(prompt.contains("1234567890123"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_override_dir_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("classify.txt"), "LOG={{LOG}}").unwrap();
        let loader = PromptLoader::new(Some(dir.path().to_path_buf()));

        let vars = PromptVariables { log: Some("GET /?id=1".into()), ..Default::default() };
        assert_eq!(loader.render("classify", &vars).unwrap(), "LOG=GET /?id=1");
        // Names without an override file fall back to the built-in text.
        assert!(loader.load("aggregate").unwrap().contains("{{RULES}}"));
    }

    #[test]
    fn test_unknown_prompt() {
        assert!(PromptLoader::default().load("nope").is_err());
    }

    #[test]
    fn test_unset_variables_become_empty() {
        let out = PromptLoader::interpolate("[{{RULES}}]", &PromptVariables::default());
        assert_eq!(out, "[]");
    }
}
