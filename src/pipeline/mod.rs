pub mod aggregation;
pub mod assessment;
pub mod events;
pub mod extraction;
pub mod orchestrator;
pub mod phase;
pub mod state;
pub mod tracker;

pub use aggregation::{AggregationEngine, ConsolidatedRule};
pub use assessment::{run_assessment, AssessmentConfig, AssessmentReport, TrafficStatus};
pub use events::PipelineEvent;
pub use extraction::{run_extraction, ExtractionReport};
pub use orchestrator::PipelineOrchestrator;
pub use state::{PayloadCoverage, PipelineConfig, PipelineReport, PipelineStage, PipelineState, PipelineStatus};
pub use tracker::{AggregationTracker, Coverage};
