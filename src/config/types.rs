use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use crate::environment::ComposeSettings;
use crate::errors::WafsmithError;
use crate::harness::HarnessSettings;
use crate::payload::{BodyEncoding, HttpMethod, Position, ProbeTarget};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000";
pub const DEFAULT_POSITION: &str = "url_parameters";
pub const DEFAULT_THREADS: usize = 10;
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_BLOCKED_STATUS: u16 = 403;
pub const DEFAULT_ALLOWED_STATUS: u16 = 200;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1500;
pub const DEFAULT_STARTUP_DELAY_MS: u64 = 2000;
pub const DEFAULT_LLM_RETRIES: u32 = 3;
pub const DEFAULT_PROVIDER: &str = "openai";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Everything a config file may set. Unset values fall back to the
/// defaults above; CLI flags are written over the file values before use.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct WafsmithConfig {
    pub llm: Option<LLMConfig>,
    pub environment: Option<EnvironmentConfig>,
    pub target: Option<TargetConfig>,
    pub probe: Option<ProbeConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LLMConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_retries: Option<u32>,
    /// Times the synthesizer re-asks for a regex that does not match its payload.
    pub regex_attempts: Option<u32>,
    /// Directory of `<name>.txt` files replacing built-in prompts.
    pub prompts_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct EnvironmentConfig {
    pub setup_dir: Option<PathBuf>,
    pub compose_file: Option<String>,
    pub waf_service: Option<String>,
    pub waf_identity: Option<String>,
    pub rules_dir: Option<String>,
    pub artifact_prefix: Option<String>,
    pub artifact_extension: Option<String>,
    pub docker_bin: Option<PathBuf>,
    pub settle_delay_ms: Option<u64>,
    pub startup_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TargetConfig {
    pub endpoint: Option<String>,
    pub method: Option<HttpMethod>,
    pub position: Option<String>,
    pub body_encoding: Option<BodyEncoding>,
    pub header_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProbeConfig {
    pub threads: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub blocked_status: Option<u16>,
    pub allowed_status: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct OutputConfig {
    pub rules_file: Option<PathBuf>,
    pub evaded_file: Option<PathBuf>,
    pub payloads_file: Option<PathBuf>,
}

impl WafsmithConfig {
    pub fn llm_mut(&mut self) -> &mut LLMConfig {
        self.llm.get_or_insert_with(Default::default)
    }

    pub fn environment_mut(&mut self) -> &mut EnvironmentConfig {
        self.environment.get_or_insert_with(Default::default)
    }

    pub fn target_mut(&mut self) -> &mut TargetConfig {
        self.target.get_or_insert_with(Default::default)
    }

    pub fn probe_mut(&mut self) -> &mut ProbeConfig {
        self.probe.get_or_insert_with(Default::default)
    }

    pub fn output_mut(&mut self) -> &mut OutputConfig {
        self.output.get_or_insert_with(Default::default)
    }

    pub fn probe_target(&self) -> Result<ProbeTarget, WafsmithError> {
        let target = self.target.clone().unwrap_or_default();
        let position = Position::parse(
            target.position.as_deref().unwrap_or(DEFAULT_POSITION),
            target.body_encoding.unwrap_or_default(),
            target.header_name.as_deref().unwrap_or(crate::payload::types::DEFAULT_HEADER_NAME),
        )?;
        Ok(ProbeTarget::new(
            target.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT),
            target.method.unwrap_or_default(),
            position,
        ))
    }

    pub fn threads(&self) -> usize {
        self.probe.as_ref().and_then(|p| p.threads).unwrap_or(DEFAULT_THREADS)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(
            self.probe
                .as_ref()
                .and_then(|p| p.timeout_secs)
                .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS),
        )
    }

    pub fn allowed_status(&self) -> u16 {
        self.probe.as_ref().and_then(|p| p.allowed_status).unwrap_or(DEFAULT_ALLOWED_STATUS)
    }

    pub fn harness_settings(&self) -> HarnessSettings {
        let probe = self.probe.clone().unwrap_or_default();
        HarnessSettings {
            blocked_status: probe.blocked_status.unwrap_or(DEFAULT_BLOCKED_STATUS),
            allowed_status: probe.allowed_status.unwrap_or(DEFAULT_ALLOWED_STATUS),
            settle_delay: self.settle_delay(),
        }
    }

    fn settle_delay(&self) -> Duration {
        Duration::from_millis(
            self.environment
                .as_ref()
                .and_then(|e| e.settle_delay_ms)
                .unwrap_or(DEFAULT_SETTLE_DELAY_MS),
        )
    }

    pub fn compose_settings(&self) -> ComposeSettings {
        let env = self.environment.clone().unwrap_or_default();
        let defaults = ComposeSettings::default();
        ComposeSettings {
            setup_dir: env.setup_dir.unwrap_or(defaults.setup_dir),
            compose_file: env.compose_file.unwrap_or(defaults.compose_file),
            waf_service: env.waf_service.unwrap_or(defaults.waf_service),
            waf_identity: env.waf_identity.unwrap_or(defaults.waf_identity),
            rules_subdir: env.rules_dir.unwrap_or(defaults.rules_subdir),
            artifact_prefix: env.artifact_prefix.unwrap_or(defaults.artifact_prefix),
            artifact_extension: env.artifact_extension.unwrap_or(defaults.artifact_extension),
            docker_bin: env.docker_bin.unwrap_or(defaults.docker_bin),
            settle_delay: self.settle_delay(),
            startup_delay: Duration::from_millis(env.startup_delay_ms.unwrap_or(DEFAULT_STARTUP_DELAY_MS)),
        }
    }

    pub fn llm_retries(&self) -> u32 {
        self.llm.as_ref().and_then(|l| l.max_retries).unwrap_or(DEFAULT_LLM_RETRIES)
    }

    /// Key from the config (or a flag written into it), then the environment.
    pub fn api_key(&self) -> String {
        self.llm
            .as_ref()
            .and_then(|l| l.api_key.clone())
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve() {
        let config = WafsmithConfig::default();
        let target = config.probe_target().unwrap();
        assert_eq!(target.endpoint, "http://localhost:3000");
        assert_eq!(target.method, HttpMethod::Get);
        assert_eq!(target.position, Position::UrlParameters);
        assert_eq!(config.threads(), 10);
        assert_eq!(config.probe_timeout(), Duration::from_secs(10));

        let harness = config.harness_settings();
        assert_eq!(harness.blocked_status, 403);
        assert_eq!(harness.allowed_status, 200);
        assert_eq!(harness.settle_delay, Duration::from_millis(1500));

        let compose = config.compose_settings();
        assert_eq!(compose.compose_file, "docker-compose.yml");
        assert_eq!(compose.waf_service, "crs-nginx");
        assert_eq!(compose.artifact_prefix, "lwrc");
        assert_eq!(compose.startup_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_header_position_uses_configured_name() {
        let mut config = WafsmithConfig::default();
        config.target_mut().position = Some("http_header".into());
        config.target_mut().header_name = Some("x-attack".into());
        assert_eq!(
            config.probe_target().unwrap().position,
            Position::Header { name: "x-attack".into() }
        );
    }

    #[test]
    fn test_body_position_uses_encoding() {
        let yaml = "target:\n  method: POST\n  position: http_body\n  body_encoding: xml\n";
        let config: WafsmithConfig = serde_yaml::from_str(yaml).unwrap();
        let target = config.probe_target().unwrap();
        assert_eq!(target.method, HttpMethod::Post);
        assert_eq!(target.position, Position::Body(BodyEncoding::Xml));
    }

    #[test]
    fn test_unknown_position_is_rejected() {
        let mut config = WafsmithConfig::default();
        config.target_mut().position = Some("cookies".into());
        assert!(config.probe_target().is_err());
    }

    #[test]
    fn test_config_api_key_wins() {
        let mut config = WafsmithConfig::default();
        config.llm_mut().api_key = Some("from-config".into());
        assert_eq!(config.api_key(), "from-config");
    }
}
