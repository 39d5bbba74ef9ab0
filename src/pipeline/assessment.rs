use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use crate::environment::TestEnvironment;
use crate::errors::WafsmithError;
use crate::payload::{
    calculate_results, write_lines, ParallelProbeRunner, PayloadProbe, ProbeResults, ProbeTarget,
    ResultStats,
};
use crate::utils::formatting::format_ratio;
use super::events::PipelineEvent;
use tracing::{error, info, warn};

/// Business traffic outcome of an `evaluate` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrafficStatus {
    Passed,
    Failed,
    /// No business traffic was supplied.
    YetToTest,
}

impl fmt::Display for TrafficStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::YetToTest => write!(f, "yet-to-test"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssessmentConfig {
    pub target: ProbeTarget,
    pub threads: usize,
    pub probe_timeout: Duration,
    /// Status a request gets when the WAF lets it through.
    pub allowed_status: u16,
    pub evaded_output: Option<PathBuf>,
}

/// Result of probing the currently deployed WAF configuration.
#[derive(Debug, Clone)]
pub struct AssessmentReport {
    /// Attacks that came back with the allowed status.
    pub evaded: Vec<String>,
    pub attack_stats: ResultStats,
    pub traffic_status: TrafficStatus,
    pub duration_ms: u64,
}

/// Bring the stack up, probe the attack corpus and the business traffic
/// against it, and tear it down again on every path.
pub async fn run_assessment(
    config: &AssessmentConfig,
    mut environment: Box<dyn TestEnvironment>,
    attacks: &[String],
    traffic: &[String],
    event_tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
) -> Result<AssessmentReport, WafsmithError> {
    let started = Instant::now();
    let emit = |message: String| {
        if let Some(ref tx) = event_tx {
            let _ = tx.send(PipelineEvent::Log { message });
        }
    };

    let outcome = async {
        let runner = ParallelProbeRunner::new(PayloadProbe::new(config.probe_timeout)?, config.threads);

        emit("Deploying testing environment".to_string());
        environment.setup().await?;

        emit(format!("Testing {} attack payloads", attacks.len()));
        let attack_results = runner.run_all(attacks, &config.target).await;

        let traffic_status = if traffic.is_empty() {
            TrafficStatus::YetToTest
        } else {
            emit(format!("Testing {} business traffic payloads", traffic.len()));
            let results = runner.run_all(traffic, &config.target).await;
            if calculate_results(&results, config.allowed_status).all_passed {
                TrafficStatus::Passed
            } else {
                TrafficStatus::Failed
            }
        };
        Ok::<_, WafsmithError>((attack_results, traffic_status))
    }
    .await;

    emit("Decommissioning testing environment".to_string());
    if let Err(e) = environment.teardown().await {
        warn!(error = %e, "Failed to tear down test environment");
    }

    let (attack_results, traffic_status) = outcome?;
    let report = build_report(config, attacks, &attack_results, traffic_status, started);

    if let Some(path) = &config.evaded_output {
        if !report.evaded.is_empty() {
            write_lines(path, &report.evaded).await?;
            info!(path = %path.display(), entries = report.evaded.len(), "Evaded payloads written");
        }
    }
    Ok(report)
}

fn build_report(
    config: &AssessmentConfig,
    attacks: &[String],
    results: &ProbeResults,
    traffic_status: TrafficStatus,
    started: Instant,
) -> AssessmentReport {
    let stats = calculate_results(results, config.allowed_status);
    let through: HashSet<&str> = results
        .with_status(config.allowed_status)
        .iter()
        .map(String::as_str)
        .collect();
    let evaded: Vec<String> = attacks.iter().filter(|a| through.contains(a.as_str())).cloned().collect();

    match traffic_status {
        TrafficStatus::Failed => error!("Business traffic simulation status: {}", traffic_status),
        _ => info!("Business traffic simulation status: {}", traffic_status),
    }
    let ratio = format_ratio(stats.matched, stats.total, stats.percentage);
    if stats.total > 0 && stats.all_passed {
        error!("Evaded payload(s): {}", ratio);
    } else if stats.matched > 0 {
        warn!("Evaded payload(s): {}", ratio);
    } else {
        info!("Evaded payload(s): {}", ratio);
    }

    AssessmentReport {
        evaded,
        attack_stats: stats,
        traffic_status,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}
