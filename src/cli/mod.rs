pub mod commands;
pub mod create;
pub mod evaluate;
pub mod extract;
pub mod validate;

pub use commands::{Cli, Commands};

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use crate::config::{self, WafsmithConfig, DEFAULT_PROVIDER};
use crate::errors::{RetryConfig, WafsmithError};
use crate::llm::create_provider;
use crate::pipeline::PipelineEvent;
use crate::prompts::PromptLoader;
use crate::synthesis::{LlmRuleSynthesizer, RuleSynthesizer};
use crate::utils::progress::{spawn_renderer, RunProgress};
use commands::{EnvironmentArgs, LlmArgs, TargetArgs};
use tracing::info;

/// Options shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct GlobalOptions<'a> {
    pub config: Option<&'a Path>,
    pub quiet: bool,
}

/// Load the config file when one was given; defaults otherwise.
pub async fn load_config(path: Option<&Path>) -> Result<WafsmithConfig, WafsmithError> {
    match path {
        Some(path) => config::parse_config(path).await,
        None => Ok(WafsmithConfig::default()),
    }
}

impl TargetArgs {
    /// Write the flags that were given over the file values.
    pub fn apply(&self, config: &mut WafsmithConfig) {
        let target = config.target_mut();
        if let Some(endpoint) = &self.target {
            target.endpoint = Some(endpoint.clone());
        }
        if let Some(method) = self.method {
            target.method = Some(method);
        }
        if let Some(position) = &self.position {
            target.position = Some(position.clone());
        }
        if let Some(encoding) = self.body_encoding {
            target.body_encoding = Some(encoding);
        }
        if let Some(name) = &self.header_name {
            target.header_name = Some(name.clone());
        }

        let probe = config.probe_mut();
        if let Some(threads) = self.threads {
            probe.threads = Some(threads);
        }
        if let Some(timeout) = self.timeout {
            probe.timeout_secs = Some(timeout);
        }
    }
}

impl EnvironmentArgs {
    pub fn apply(&self, config: &mut WafsmithConfig) {
        let env = config.environment_mut();
        if let Some(dir) = &self.setup_dir {
            env.setup_dir = Some(dir.clone());
        }
        if let Some(file) = &self.compose_file {
            env.compose_file = Some(file.clone());
        }
        if let Some(service) = &self.waf_service {
            env.waf_service = Some(service.clone());
        }
    }
}

impl LlmArgs {
    pub fn apply(&self, config: &mut WafsmithConfig) {
        let llm = config.llm_mut();
        if let Some(provider) = &self.provider {
            llm.provider = Some(provider.clone());
        }
        if let Some(model) = &self.model {
            llm.model = Some(model.clone());
        }
        if let Some(key) = &self.api_key {
            llm.api_key = Some(key.clone());
        }
        if let Some(url) = &self.base_url {
            llm.base_url = Some(url.clone());
        }
        if let Some(dir) = &self.prompts_dir {
            llm.prompts_dir = Some(dir.clone());
        }
    }

    /// Build the LLM-backed synthesizer the resolved config describes.
    pub fn build_synthesizer(
        &self,
        config: &WafsmithConfig,
    ) -> Result<Arc<dyn RuleSynthesizer>, WafsmithError> {
        let llm = config.llm.clone().unwrap_or_default();
        let provider_name = llm.provider.as_deref().unwrap_or(DEFAULT_PROVIDER);
        let provider = create_provider(
            provider_name,
            &config.api_key(),
            llm.model.as_deref(),
            llm.base_url.as_deref(),
        )?;
        info!(provider = provider.provider_name(), model = provider.model_name(), "LLM provider ready");

        let retry = RetryConfig {
            max_retries: config.llm_retries(),
            pipeline_testing: self.pipeline_testing,
        };
        let mut synthesizer = LlmRuleSynthesizer::new(Arc::from(provider))
            .with_prompts(PromptLoader::new(llm.prompts_dir))
            .with_retry(retry);
        if let Some(attempts) = llm.regex_attempts {
            synthesizer = synthesizer.with_regex_attempts(attempts);
        }
        Ok(Arc::new(synthesizer))
    }
}

/// Event channel plus the task rendering it. Quiet runs get a hidden renderer
/// so the sender side never has to care.
pub fn progress_channel(
    quiet: bool,
) -> (mpsc::UnboundedSender<PipelineEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let progress = if quiet { RunProgress::hidden() } else { RunProgress::new() };
    (tx, spawn_renderer(rx, progress))
}
