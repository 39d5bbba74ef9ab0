pub mod artifact;
pub mod compose;

use async_trait::async_trait;
use crate::errors::WafsmithError;

pub use artifact::{artifact_name, is_generated_artifact, RuleHandle};
pub use compose::{ComposeEnvironment, ComposeSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvState {
    Down,
    Up,
}

/// Result of writing a rule into the WAF and bouncing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployment {
    /// The WAF came back healthy with the rule loaded.
    Healthy(RuleHandle),
    /// The WAF rejected the rule. The artifact has already been removed and
    /// the WAF restarted on its baseline configuration.
    Unhealthy,
}

/// The shared test stack: one WAF in front of the target application, with a
/// single slot for the rule under test.
#[async_trait]
pub trait TestEnvironment: Send {
    /// Bring the stack up (DOWN → UP).
    async fn setup(&mut self) -> Result<(), WafsmithError>;

    /// Bring the stack down. Calling it while already down is a no-op.
    async fn teardown(&mut self) -> Result<(), WafsmithError>;

    async fn deploy_rule(&mut self, rule: &str) -> Result<Deployment, WafsmithError>;

    /// Best effort; `false` when the artifact could not be deleted.
    async fn remove_rule(&mut self, handle: &RuleHandle) -> bool;

    /// Restart only the WAF and report whether it came back healthy.
    async fn restart_waf(&mut self) -> bool;

    async fn health_check(&mut self) -> bool;

    fn state(&self) -> EnvState;
}
