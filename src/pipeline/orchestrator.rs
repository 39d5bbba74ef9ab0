use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tokio::sync::{mpsc, RwLock};
use crate::environment::TestEnvironment;
use crate::errors::WafsmithError;
use crate::harness::{share_environment, EvaluationHarness, SharedEnvironment};
use crate::payload::{worker_count, write_lines, ParallelProbeRunner, PayloadProbe};
use crate::synthesis::RuleSynthesizer;
use super::aggregation::AggregationEngine;
use super::events::PipelineEvent;
use super::phase::display_name;
use super::state::*;
use super::tracker::AggregationTracker;
use tracing::{error, info, warn};

/// Drives a `create` run from attack corpus to validated ruleset.
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    state: Arc<RwLock<PipelineState>>,
    synthesizer: Arc<dyn RuleSynthesizer>,
    environment: SharedEnvironment,
    harness: EvaluationHarness,
    aggregation: AggregationEngine,
    attacks: Vec<String>,
    event_tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl PipelineOrchestrator {
    pub fn new(
        config: PipelineConfig,
        synthesizer: Arc<dyn RuleSynthesizer>,
        environment: Box<dyn TestEnvironment>,
        attacks: Vec<String>,
        traffic: Vec<String>,
    ) -> Result<Self, WafsmithError> {
        let probe = PayloadProbe::new(config.probe_timeout)?;
        let runner = ParallelProbeRunner::new(probe, config.threads);
        let environment = share_environment(environment);

        // Payload strings identify payloads, so duplicates would be counted twice.
        let mut seen = HashSet::new();
        let attacks: Vec<String> = attacks.into_iter().filter(|p| seen.insert(p.clone())).collect();

        let harness = EvaluationHarness::new(
            environment.clone(),
            runner,
            config.target.clone(),
            traffic,
            config.harness.clone(),
        );

        Ok(Self {
            aggregation: AggregationEngine::new(synthesizer.clone()),
            config,
            state: Arc::new(RwLock::new(PipelineState::new())),
            synthesizer,
            environment,
            harness,
            attacks,
            event_tx: None,
        })
    }

    /// Attach an event channel for streaming progress to the CLI.
    pub fn with_event_channel(mut self, tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event);
        }
    }

    async fn enter(&self, stage: PipelineStage) {
        self.state.write().await.current_stage = stage;
        info!(stage = %stage, "{}", display_name(stage));
        self.emit(PipelineEvent::StageStarted {
            stage,
            display_name: display_name(stage).to_string(),
        });
    }

    fn complete(&self, stage: PipelineStage) {
        self.emit(PipelineEvent::StageCompleted {
            stage,
            display_name: display_name(stage).to_string(),
        });
    }

    fn skip(&self, stage: PipelineStage, reason: &str) {
        info!(stage = %stage, reason, "Stage skipped");
        self.emit(PipelineEvent::StageSkipped {
            stage,
            reason: reason.to_string(),
        });
    }

    /// Run every stage. The environment is torn down exactly once before this
    /// returns, whether the stages succeeded or not.
    pub async fn run(&self) -> Result<PipelineReport, WafsmithError> {
        let started = Instant::now();
        self.state.write().await.status = PipelineStatus::Running;
        info!(
            run_id = %self.config.run_id,
            endpoint = %self.config.target.endpoint,
            attacks = self.attacks.len(),
            traffic = self.harness.traffic().len(),
            "Pipeline started"
        );
        self.emit(PipelineEvent::PipelineStarted {
            run_id: self.config.run_id.clone(),
            attack_payloads: self.attacks.len(),
            traffic_payloads: self.harness.traffic().len(),
        });

        let outcome = self.run_stages().await;

        self.enter(PipelineStage::Teardown).await;
        self.teardown_quietly().await;
        self.complete(PipelineStage::Teardown);

        let duration_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok((tracker, synthesized)) => {
                {
                    let mut state = self.state.write().await;
                    state.status = PipelineStatus::Completed;
                    state.current_stage = PipelineStage::Done;
                }
                let report = self.build_report(&tracker, synthesized, PipelineStage::Done, duration_ms);
                self.emit(PipelineEvent::PipelineCompleted {
                    rules: report.rules.len(),
                    evaded: report.evaded.len(),
                    duration_ms,
                });
                info!(run_id = %self.config.run_id, rules = report.rules.len(), evaded = report.evaded.len(), "Pipeline completed");
                Ok(report)
            }
            Err(e) => {
                {
                    let mut state = self.state.write().await;
                    state.status = PipelineStatus::Failed;
                    state.current_stage = PipelineStage::Failed;
                    state.error = Some(e.to_string());
                }
                error!(run_id = %self.config.run_id, error = %e, "Pipeline failed");
                self.emit(PipelineEvent::PipelineFailed { error: e.to_string() });
                Err(e)
            }
        }
    }

    async fn run_stages(&self) -> Result<(AggregationTracker, usize), WafsmithError> {
        self.enter(PipelineStage::Init).await;
        self.environment.lock().await.setup().await?;
        self.complete(PipelineStage::Init);

        self.enter(PipelineStage::Synthesize).await;
        let candidates = self.synthesize_all().await;
        let synthesized = candidates.iter().filter(|(_, rule)| rule.is_some()).count();
        info!(created = synthesized, total = candidates.len(), "Candidate rules created");
        self.complete(PipelineStage::Synthesize);

        let mut tracker = AggregationTracker::new();

        self.enter(PipelineStage::EvaluateIndividual).await;
        for (payload, rule) in &candidates {
            let Some(rule) = rule else {
                tracker.record_evaded(payload)?;
                continue;
            };
            let evaded = self.harness.evaluate_rule(rule, payload).await?;
            self.emit(PipelineEvent::RuleEvaluated {
                blocked: usize::from(!evaded),
                evaded: usize::from(evaded),
            });
            if evaded {
                tracker.record_evaded(payload)?;
            } else {
                tracker.record_passed(payload, rule)?;
            }
        }
        info!(passed = tracker.pending_rules().len(), evaded = tracker.evaded().len(), "Individual evaluation complete");
        self.complete(PipelineStage::EvaluateIndividual);

        let mut consolidated = Vec::new();
        if AggregationEngine::should_aggregate(tracker.pending_rules().len()) {
            self.enter(PipelineStage::Aggregate).await;
            consolidated = self
                .aggregation
                .consolidate(tracker.pending_rules(), self.harness.traffic())
                .await;
            self.complete(PipelineStage::Aggregate);
        } else {
            self.skip(PipelineStage::Aggregate, "fewer than two validated rules");
        }

        if consolidated.is_empty() {
            self.skip(PipelineStage::EvaluateAggregated, "no consolidated rules");
        } else {
            self.enter(PipelineStage::EvaluateAggregated).await;
            let pending = tracker.pending_payloads().to_vec();
            let surviving = self
                .aggregation
                .validate(&self.harness, &consolidated, &pending, |verdict| {
                    self.emit(PipelineEvent::RuleEvaluated {
                        blocked: verdict.blocked.len(),
                        evaded: verdict.evaded.len(),
                    });
                })
                .await?;
            for rule in &surviving {
                tracker.record_consolidated(&rule.rule, &rule.blocked)?;
            }
            info!(kept = surviving.len(), proposed = consolidated.len(), "Consolidated rules validated");
            self.complete(PipelineStage::EvaluateAggregated);
        }

        self.enter(PipelineStage::Patch).await;
        let patched = tracker.patch()?;
        info!(patched, "Coverage gaps patched with individual rules");
        self.complete(PipelineStage::Patch);

        self.enter(PipelineStage::Finalize).await;
        self.write_artifact(&self.config.rules_output, &tracker.final_ruleset()).await?;
        self.write_artifact(&self.config.evaded_output, tracker.evaded()).await?;
        self.complete(PipelineStage::Finalize);

        Ok((tracker, synthesized))
    }

    /// One synthesis request per payload, bounded by the worker pool, results
    /// in corpus order.
    async fn synthesize_all(&self) -> Vec<(String, Option<String>)> {
        let target = &self.config.target;
        stream::iter(self.attacks.iter())
            .map(|payload| {
                let synthesizer = self.synthesizer.clone();
                async move {
                    let rule = synthesizer
                        .synthesize_rule(payload, target.method, &target.position)
                        .await;
                    (payload.clone(), rule)
                }
            })
            .buffered(worker_count(self.config.threads))
            .inspect(|(payload, rule)| {
                self.emit(PipelineEvent::RuleSynthesized {
                    payload: payload.clone(),
                    created: rule.is_some(),
                });
            })
            .collect()
            .await
    }

    /// Write `items` one per line, or leave the file alone when there is nothing to write.
    async fn write_artifact(&self, path: &Path, items: &[String]) -> Result<(), WafsmithError> {
        if items.is_empty() {
            info!(path = %path.display(), "Nothing to write");
            return Ok(());
        }
        write_lines(path, items).await?;
        info!(path = %path.display(), entries = items.len(), "Results written");
        self.emit(PipelineEvent::ArtifactWritten {
            path: path.display().to_string(),
            entries: items.len(),
        });
        Ok(())
    }

    /// Teardown failures are logged, never propagated.
    async fn teardown_quietly(&self) {
        if let Err(e) = self.environment.lock().await.teardown().await {
            warn!(error = %e, "Failed to tear down test environment");
            self.emit(PipelineEvent::Log {
                message: format!("Teardown failed: {}", e),
            });
        }
    }

    fn build_report(
        &self,
        tracker: &AggregationTracker,
        synthesized: usize,
        stage: PipelineStage,
        duration_ms: u64,
    ) -> PipelineReport {
        PipelineReport {
            run_id: self.config.run_id.clone(),
            rules: tracker.final_ruleset(),
            evaded: tracker.evaded().to_vec(),
            coverage: tracker
                .coverage()
                .into_iter()
                .map(|(payload, coverage)| PayloadCoverage { payload, coverage })
                .collect(),
            total_payloads: self.attacks.len(),
            synthesized_rules: synthesized,
            passed_individually: tracker.pending_rules().len(),
            consolidated_rules: tracker.consolidated_rules().len(),
            patched_rules: tracker.patched_rules().len(),
            stage,
            duration_ms,
        }
    }

    pub fn state(&self) -> Arc<RwLock<PipelineState>> {
        self.state.clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}
