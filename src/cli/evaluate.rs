use crate::cli::commands::EvaluateArgs;
use crate::cli::{load_config, progress_channel, GlobalOptions};
use crate::config::{preflight, PreflightPaths};
use crate::environment::ComposeEnvironment;
use crate::errors::WafsmithError;
use crate::payload::load_corpus;
use crate::pipeline::{run_assessment, AssessmentConfig, TrafficStatus};
use crate::utils::formatting::format_duration;
use tracing::info;

pub async fn handle_evaluate(args: EvaluateArgs, global: GlobalOptions<'_>) -> Result<(), WafsmithError> {
    let mut config = load_config(global.config).await?;
    args.target.apply(&mut config);
    args.environment.apply(&mut config);

    let evaded_output = args
        .evaded
        .clone()
        .or_else(|| config.output.as_ref().and_then(|o| o.evaded_file.clone()));

    let compose = config.compose_settings();
    let checked = preflight(
        Some(&compose),
        &PreflightPaths {
            attacks: Some(args.attacks.as_path()),
            traffic: args.traffic.as_deref(),
            outputs: evaded_output.iter().map(|p| p.as_path()).collect(),
        },
    )
    .await?;

    let attacks = load_corpus(&args.attacks).await?;
    let traffic = match &checked.traffic {
        Some(path) => load_corpus(path).await?,
        None => Vec::new(),
    };

    let assessment = AssessmentConfig {
        target: config.probe_target()?,
        threads: config.threads(),
        probe_timeout: config.probe_timeout(),
        allowed_status: config.allowed_status(),
        evaded_output,
    };
    let environment = ComposeEnvironment::new(compose)?;

    let (tx, renderer) = progress_channel(global.quiet);
    let result = run_assessment(&assessment, Box::new(environment), &attacks, &traffic, Some(tx)).await;
    let _ = renderer.await;
    let report = result?;

    info!(
        evaded = report.evaded.len(),
        total = report.attack_stats.total,
        traffic = %report.traffic_status,
        duration = %format_duration(report.duration_ms),
        "Evaluation complete"
    );
    if report.traffic_status == TrafficStatus::Failed {
        info!("Some business traffic was blocked; the deployed rules have false positives");
    }
    Ok(())
}
