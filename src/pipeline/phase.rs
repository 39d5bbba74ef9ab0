use super::state::PipelineStage;

pub struct StageDefinition {
    pub stage: PipelineStage,
    pub display_name: &'static str,
    pub description: &'static str,
}

pub static STAGES: &[StageDefinition] = &[
    StageDefinition {
        stage: PipelineStage::Init,
        display_name: "Deploy Testing Environment",
        description: "Bring up the WAF and target application",
    },
    StageDefinition {
        stage: PipelineStage::Synthesize,
        display_name: "Create Rules",
        description: "Ask the rule synthesizer for one candidate rule per attack payload",
    },
    StageDefinition {
        stage: PipelineStage::EvaluateIndividual,
        display_name: "Validate Rules",
        description: "Deploy each candidate and check it blocks its payload without breaking traffic",
    },
    StageDefinition {
        stage: PipelineStage::Aggregate,
        display_name: "Aggregate Rules",
        description: "Merge validated rules into fewer consolidated rules",
    },
    StageDefinition {
        stage: PipelineStage::EvaluateAggregated,
        display_name: "Validate Aggregated Rules",
        description: "Check which payloads each consolidated rule still blocks",
    },
    StageDefinition {
        stage: PipelineStage::Patch,
        display_name: "Patch Coverage Gaps",
        description: "Fall back to individual rules for payloads the consolidated rules miss",
    },
    StageDefinition {
        stage: PipelineStage::Finalize,
        display_name: "Write Results",
        description: "Write the final ruleset and the evaded payloads",
    },
    StageDefinition {
        stage: PipelineStage::Teardown,
        display_name: "Decommission Testing Environment",
        description: "Bring the test stack down",
    },
];

pub fn display_name(stage: PipelineStage) -> &'static str {
    STAGES
        .iter()
        .find(|s| s.stage == stage)
        .map(|s| s.display_name)
        .unwrap_or("Unknown")
}

/// 1-based position among the working stages, for `[n/total]` progress lines.
pub fn step_number(stage: PipelineStage) -> Option<usize> {
    STAGES.iter().position(|s| s.stage == stage).map(|i| i + 1)
}
