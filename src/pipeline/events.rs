use super::state::PipelineStage;

/// Progress messages streamed from a running workflow to the CLI.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    PipelineStarted {
        run_id: String,
        attack_payloads: usize,
        traffic_payloads: usize,
    },
    StageStarted {
        stage: PipelineStage,
        display_name: String,
    },
    StageCompleted {
        stage: PipelineStage,
        display_name: String,
    },
    StageSkipped {
        stage: PipelineStage,
        reason: String,
    },
    /// A synthesis request finished
    RuleSynthesized {
        payload: String,
        created: bool,
    },
    /// A rule went through the harness
    RuleEvaluated {
        blocked: usize,
        evaded: usize,
    },
    ArtifactWritten {
        path: String,
        entries: usize,
    },
    PipelineCompleted {
        rules: usize,
        evaded: usize,
        duration_ms: u64,
    },
    PipelineFailed {
        error: String,
    },
    Log {
        message: String,
    },
}
