use std::time::{Duration, Instant};

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use crate::pipeline::phase::{step_number, STAGES};
use crate::pipeline::PipelineEvent;
use super::formatting::format_duration;

/// Renders pipeline events as a stage bar over a running status spinner.
pub struct RunProgress {
    multi: MultiProgress,
    stage_bar: Option<ProgressBar>,
    status_bar: ProgressBar,
    synthesized: usize,
    synthesis_failures: usize,
    blocked: usize,
    evaded: usize,
    start_time: Instant,
}

impl RunProgress {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// A renderer that draws nothing, for `--quiet` and non-terminal output.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);

        let status_bar = multi.add(ProgressBar::new_spinner());
        status_bar.set_style(spinner_style("  {spinner:.cyan} {msg}"));
        status_bar.set_message("Preparing...");
        status_bar.enable_steady_tick(Duration::from_millis(120));

        Self {
            multi,
            stage_bar: None,
            status_bar,
            synthesized: 0,
            synthesis_failures: 0,
            blocked: 0,
            evaded: 0,
            start_time: Instant::now(),
        }
    }

    pub fn handle_event(&mut self, event: &PipelineEvent) {
        match event {
            PipelineEvent::PipelineStarted { attack_payloads, traffic_payloads, .. } => {
                let bar = self
                    .multi
                    .insert_before(&self.status_bar, ProgressBar::new(STAGES.len() as u64));
                let bar_style = ProgressStyle::default_bar()
                    .template("  {bar:30.cyan/dark_gray} {pos}/{len} stages | {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▓░");
                bar.set_style(bar_style);
                bar.set_message(format!(
                    "{} attack payloads, {} traffic payloads",
                    attack_payloads, traffic_payloads
                ));
                self.stage_bar = Some(bar);
                self.update_status();
            }
            PipelineEvent::StageStarted { stage, display_name } => {
                let step = step_number(*stage).unwrap_or(0);
                self.println(&format!(
                    "{} {}",
                    style(format!("[{}/{}]", step, STAGES.len())).dim(),
                    style(display_name).bold()
                ));
                if let Some(bar) = &self.stage_bar {
                    bar.set_message(display_name.clone());
                }
                self.update_status();
            }
            PipelineEvent::StageCompleted { .. } => {
                if let Some(bar) = &self.stage_bar {
                    bar.inc(1);
                }
            }
            PipelineEvent::StageSkipped { stage, reason } => {
                self.println(&format!(
                    "  {} {} skipped: {}",
                    style("-").dim(),
                    stage,
                    reason
                ));
                if let Some(bar) = &self.stage_bar {
                    bar.inc(1);
                }
            }
            PipelineEvent::RuleSynthesized { created, .. } => {
                if *created {
                    self.synthesized += 1;
                } else {
                    self.synthesis_failures += 1;
                }
                self.update_status();
            }
            PipelineEvent::RuleEvaluated { blocked, evaded } => {
                self.blocked += blocked;
                self.evaded += evaded;
                self.update_status();
            }
            PipelineEvent::ArtifactWritten { path, entries } => {
                self.println(&format!(
                    "  {} {} ({} entries)",
                    style("✓").green(),
                    path,
                    entries
                ));
            }
            PipelineEvent::PipelineCompleted { rules, evaded, duration_ms } => {
                if let Some(bar) = self.stage_bar.take() {
                    bar.finish_with_message("All stages complete");
                }
                self.status_bar.finish_with_message(format!(
                    "Done: {} rules | {} evaded | {}",
                    rules,
                    evaded,
                    format_duration(*duration_ms),
                ));
            }
            PipelineEvent::PipelineFailed { error } => {
                if let Some(bar) = self.stage_bar.take() {
                    bar.abandon_with_message("Failed");
                }
                self.status_bar
                    .abandon_with_message(format!("{} {}", style("Failed:").red(), error));
            }
            PipelineEvent::Log { message } => {
                self.println(&format!("  {}", message));
            }
        }
    }

    fn update_status(&self) {
        let elapsed = format_duration(self.start_time.elapsed().as_millis() as u64);
        self.status_bar.set_message(format!(
            "{} | {} rules created, {} failed | {} blocked, {} evaded",
            elapsed, self.synthesized, self.synthesis_failures, self.blocked, self.evaded,
        ));
    }

    /// Print above the bars without tearing them.
    pub fn println(&self, msg: &str) {
        let _ = self.multi.println(msg);
    }

    /// Stop the spinner if no terminal event arrived.
    pub fn finish(&self) {
        if !self.status_bar.is_finished() {
            self.status_bar.finish_and_clear();
        }
    }
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::new()
    }
}

fn spinner_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Render events until every sender is dropped.
pub fn spawn_renderer(
    mut rx: mpsc::UnboundedReceiver<PipelineEvent>,
    mut progress: RunProgress,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            progress.handle_event(&event);
        }
        progress.finish();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineStage;

    #[test]
    fn test_counters_follow_events() {
        let mut progress = RunProgress::hidden();
        progress.handle_event(&PipelineEvent::RuleSynthesized { payload: "a".into(), created: true });
        progress.handle_event(&PipelineEvent::RuleSynthesized { payload: "b".into(), created: false });
        progress.handle_event(&PipelineEvent::RuleEvaluated { blocked: 2, evaded: 1 });
        assert_eq!(progress.synthesized, 1);
        assert_eq!(progress.synthesis_failures, 1);
        assert_eq!(progress.blocked, 2);
        assert_eq!(progress.evaded, 1);
    }

    #[tokio::test]
    async fn test_renderer_stops_when_senders_drop() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_renderer(rx, RunProgress::hidden());
        tx.send(PipelineEvent::PipelineStarted {
            run_id: "r".into(),
            attack_payloads: 1,
            traffic_payloads: 0,
        })
        .unwrap();
        tx.send(PipelineEvent::StageStarted {
            stage: PipelineStage::Init,
            display_name: "Deploy Testing Environment".into(),
        })
        .unwrap();
        drop(tx);
        handle.await.unwrap();
    }
}
