use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::harness::HarnessSettings;
use crate::payload::{ProbeTarget, DEFAULT_PROBE_TIMEOUT};
use super::tracker::Coverage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub status: PipelineStatus,
    pub current_stage: PipelineStage,
    pub error: Option<String>,
    pub start_time: DateTime<Utc>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self {
            status: PipelineStatus::Queued,
            current_stage: PipelineStage::Init,
            error: None,
            start_time: Utc::now(),
        }
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

/// INIT → SYNTHESIZE → EVALUATE_INDIVIDUAL → AGGREGATE → EVALUATE_AGGREGATED
/// → PATCH → FINALIZE → TEARDOWN → DONE | FAILED
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    Init,
    Synthesize,
    EvaluateIndividual,
    Aggregate,
    EvaluateAggregated,
    Patch,
    Finalize,
    Teardown,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Synthesize => write!(f, "synthesize"),
            Self::EvaluateIndividual => write!(f, "evaluate-individual"),
            Self::Aggregate => write!(f, "aggregate"),
            Self::EvaluateAggregated => write!(f, "evaluate-aggregated"),
            Self::Patch => write!(f, "patch"),
            Self::Finalize => write!(f, "finalize"),
            Self::Teardown => write!(f, "teardown"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub run_id: String,
    pub target: ProbeTarget,
    /// Upper bound on concurrent synthesis requests and probes.
    pub threads: usize,
    pub probe_timeout: Duration,
    pub rules_output: PathBuf,
    pub evaded_output: PathBuf,
    pub harness: HarnessSettings,
}

impl PipelineConfig {
    pub fn new(target: ProbeTarget, rules_output: PathBuf, evaded_output: PathBuf) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            target,
            threads: 10,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            rules_output,
            evaded_output,
            harness: HarnessSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadCoverage {
    pub payload: String,
    pub coverage: Coverage,
}

/// What a `create` run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    /// Consolidated rules first, then individually patched rules.
    pub rules: Vec<String>,
    pub evaded: Vec<String>,
    pub coverage: Vec<PayloadCoverage>,
    pub total_payloads: usize,
    pub synthesized_rules: usize,
    pub passed_individually: usize,
    pub consolidated_rules: usize,
    pub patched_rules: usize,
    pub stage: PipelineStage,
    pub duration_ms: u64,
}

impl PipelineReport {
    pub fn count(&self, coverage: Coverage) -> usize {
        self.coverage.iter().filter(|c| c.coverage == coverage).count()
    }
}
