use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use crate::environment::{Deployment, TestEnvironment};
use crate::errors::WafsmithError;
use crate::payload::{calculate_results, ParallelProbeRunner, ProbeTarget};
use tracing::{debug, info, warn};

/// The test stack, shared between the orchestrator (setup/teardown) and the
/// harness (rule evaluation). Holding the lock means owning the rule slot.
pub type SharedEnvironment = Arc<Mutex<Box<dyn TestEnvironment>>>;

pub fn share_environment(environment: Box<dyn TestEnvironment>) -> SharedEnvironment {
    Arc::new(Mutex::new(environment))
}

#[derive(Debug, Clone)]
pub struct HarnessSettings {
    /// Status the WAF answers with when a rule fires.
    pub blocked_status: u16,
    /// Status business traffic must keep receiving.
    pub allowed_status: u16,
    /// Pause after the WAF is restored to its baseline.
    pub settle_delay: Duration,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            blocked_status: 403,
            allowed_status: 200,
            settle_delay: Duration::from_millis(1500),
        }
    }
}

/// Which of the evaluated payloads a rule stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleVerdict {
    pub blocked: Vec<String>,
    pub evaded: Vec<String>,
    /// The rule blocked attacks but also blocked business traffic.
    pub regressed: bool,
}

impl RuleVerdict {
    fn all_evaded(payloads: &[String]) -> Self {
        Self {
            blocked: Vec::new(),
            evaded: payloads.to_vec(),
            regressed: false,
        }
    }
}

/// Answers "does this rule stop these payloads without breaking business
/// traffic", one rule at a time.
pub struct EvaluationHarness {
    environment: SharedEnvironment,
    runner: ParallelProbeRunner,
    target: ProbeTarget,
    traffic: Vec<String>,
    settings: HarnessSettings,
}

impl EvaluationHarness {
    pub fn new(
        environment: SharedEnvironment,
        runner: ParallelProbeRunner,
        target: ProbeTarget,
        traffic: Vec<String>,
        settings: HarnessSettings,
    ) -> Self {
        Self {
            environment,
            runner,
            target,
            traffic,
            settings,
        }
    }

    pub fn traffic(&self) -> &[String] {
        &self.traffic
    }

    /// `true` when `payload` got through, either because the rule missed it,
    /// the WAF rejected the rule, or the rule broke business traffic.
    pub async fn evaluate_rule(&self, rule: &str, payload: &str) -> Result<bool, WafsmithError> {
        let verdict = self.evaluate_rule_against_many(rule, &[payload.to_string()]).await?;
        Ok(!verdict.evaded.is_empty())
    }

    /// Deploy `rule`, probe `payloads`, then restore the baseline. The
    /// environment lock is held for the whole sequence.
    pub async fn evaluate_rule_against_many(
        &self,
        rule: &str,
        payloads: &[String],
    ) -> Result<RuleVerdict, WafsmithError> {
        let mut env = self.environment.lock().await;

        let handle = match env.deploy_rule(rule).await? {
            Deployment::Healthy(handle) => handle,
            Deployment::Unhealthy => {
                info!(rule = %rule, "WAF rejected rule, counting payloads as evaded");
                return Ok(RuleVerdict::all_evaded(payloads));
            }
        };

        let verdict = self.probe_with_rule(payloads).await;

        if !env.remove_rule(&handle).await {
            return Err(WafsmithError::Environment(format!(
                "Could not remove rule file {}",
                handle.path.display()
            )));
        }
        if !env.restart_waf().await {
            return Err(WafsmithError::Environment("WAF did not return to its baseline".into()));
        }
        if !self.settings.settle_delay.is_zero() {
            tokio::time::sleep(self.settings.settle_delay).await;
        }

        debug!(blocked = verdict.blocked.len(), evaded = verdict.evaded.len(), "Rule evaluated");
        Ok(verdict)
    }

    async fn probe_with_rule(&self, payloads: &[String]) -> RuleVerdict {
        let results = self.runner.run_all(payloads, &self.target).await;
        let hits: HashSet<&str> = results
            .with_status(self.settings.blocked_status)
            .iter()
            .map(String::as_str)
            .collect();

        // Report in submission order, not completion order.
        let (blocked, evaded): (Vec<String>, Vec<String>) = payloads
            .iter()
            .cloned()
            .partition(|p| hits.contains(p.as_str()));

        if blocked.is_empty() || self.traffic.is_empty() {
            return RuleVerdict { blocked, evaded, regressed: false };
        }

        let traffic = self.runner.run_all(&self.traffic, &self.target).await;
        let stats = calculate_results(&traffic, self.settings.allowed_status);
        if stats.all_passed {
            return RuleVerdict { blocked, evaded, regressed: false };
        }

        warn!(
            passed = stats.matched,
            total = stats.total,
            "Rule blocks business traffic, discarding it"
        );
        RuleVerdict {
            blocked: Vec::new(),
            evaded: payloads.to_vec(),
            regressed: true,
        }
    }
}
