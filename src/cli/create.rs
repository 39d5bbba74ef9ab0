use std::path::{Path, PathBuf};

use crate::cli::commands::CreateArgs;
use crate::cli::{load_config, progress_channel, GlobalOptions};
use crate::config::{preflight, PreflightPaths, WafsmithConfig};
use crate::environment::ComposeEnvironment;
use crate::errors::WafsmithError;
use crate::payload::load_corpus;
use crate::pipeline::{Coverage, PipelineConfig, PipelineOrchestrator, PipelineReport};
use crate::utils::formatting::format_duration;
use tracing::info;

pub async fn handle_create(args: CreateArgs, global: GlobalOptions<'_>) -> Result<(), WafsmithError> {
    let mut config = load_config(global.config).await?;
    args.target.apply(&mut config);
    args.environment.apply(&mut config);
    args.llm.apply(&mut config);

    let rules_output = required_output(args.output.clone(), &config, |c| c.rules_file.clone(), "rules")?;
    let evaded_output = required_output(args.evaded.clone(), &config, |c| c.evaded_file.clone(), "evaded")?;

    let compose = config.compose_settings();
    let mut outputs = vec![rules_output.as_path(), evaded_output.as_path()];
    if let Some(report) = &args.report {
        outputs.push(report.as_path());
    }
    let checked = preflight(
        Some(&compose),
        &PreflightPaths {
            attacks: Some(args.attacks.as_path()),
            traffic: args.traffic.as_deref(),
            outputs,
        },
    )
    .await?;

    let attacks = load_corpus(&args.attacks).await?;
    let traffic = match &checked.traffic {
        Some(path) => load_corpus(path).await?,
        None => Vec::new(),
    };
    info!(attacks = attacks.len(), traffic = traffic.len(), "Corpora loaded");

    let synthesizer = args.llm.build_synthesizer(&config)?;
    let environment = ComposeEnvironment::new(compose)?;

    let mut pipeline_config = PipelineConfig::new(config.probe_target()?, rules_output, evaded_output);
    pipeline_config.threads = config.threads();
    pipeline_config.probe_timeout = config.probe_timeout();
    pipeline_config.harness = config.harness_settings();

    let (tx, renderer) = progress_channel(global.quiet);
    let orchestrator = PipelineOrchestrator::new(
        pipeline_config,
        synthesizer,
        Box::new(environment),
        attacks,
        traffic,
    )?
    .with_event_channel(tx);

    let result = orchestrator.run().await;
    drop(orchestrator);
    let _ = renderer.await;
    let report = result?;

    log_summary(&report);
    if let Some(path) = &args.report {
        write_report(path, &report).await?;
    }
    Ok(())
}

/// Flag first, then the config file; one of them must name the file.
fn required_output(
    flag: Option<PathBuf>,
    config: &WafsmithConfig,
    from_config: impl Fn(&crate::config::OutputConfig) -> Option<PathBuf>,
    what: &str,
) -> Result<PathBuf, WafsmithError> {
    flag.or_else(|| config.output.as_ref().and_then(from_config))
        .ok_or_else(|| {
            WafsmithError::Config(format!("No output file for {} given; pass a flag or set it under output", what))
        })
}

fn log_summary(report: &PipelineReport) {
    info!(
        run_id = %report.run_id,
        payloads = report.total_payloads,
        synthesized = report.synthesized_rules,
        passed = report.passed_individually,
        consolidated = report.consolidated_rules,
        patched = report.patched_rules,
        "Ruleset created"
    );
    info!(
        individual = report.count(Coverage::Individual),
        aggregated = report.count(Coverage::Aggregated),
        evaded = report.count(Coverage::Evaded),
        rules = report.rules.len(),
        duration = %format_duration(report.duration_ms),
        "Coverage"
    );
}

async fn write_report(path: &Path, report: &PipelineReport) -> Result<(), WafsmithError> {
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, json).await?;
    info!(path = %path.display(), "Report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config_str;

    #[test]
    fn test_output_flag_wins_over_config() {
        let config = parse_config_str("output:\n  rules_file: from-config.conf\n").unwrap();
        let path = required_output(Some("flag.conf".into()), &config, |c| c.rules_file.clone(), "rules").unwrap();
        assert_eq!(path, PathBuf::from("flag.conf"));
        let path = required_output(None, &config, |c| c.rules_file.clone(), "rules").unwrap();
        assert_eq!(path, PathBuf::from("from-config.conf"));
    }

    #[test]
    fn test_missing_output_is_config_error() {
        let config = WafsmithConfig::default();
        let err = required_output(None, &config, |c| c.evaded_file.clone(), "evaded").unwrap_err();
        assert!(matches!(err, WafsmithError::Config(_)));
    }
}
