use crate::cli::commands::ExtractArgs;
use crate::cli::{load_config, GlobalOptions};
use crate::config::{preflight, PreflightPaths};
use crate::errors::WafsmithError;
use crate::payload::load_corpus;
use crate::pipeline::run_extraction;
use tracing::info;

pub async fn handle_extract(args: ExtractArgs, global: GlobalOptions<'_>) -> Result<(), WafsmithError> {
    let mut config = load_config(global.config).await?;
    args.llm.apply(&mut config);
    if let Some(threads) = args.threads {
        config.probe_mut().threads = Some(threads);
    }

    let output = args
        .output
        .clone()
        .or_else(|| config.output.as_ref().and_then(|o| o.payloads_file.clone()))
        .ok_or_else(|| {
            WafsmithError::Config("No output file for extracted payloads; pass --output or set output.payloads_file".into())
        })?;

    preflight(
        None,
        &PreflightPaths {
            attacks: Some(args.logs.as_path()),
            traffic: None,
            outputs: vec![output.as_path()],
        },
    )
    .await?;

    // Identical log lines classify identically, so the corpus de-duplication is kept.
    let lines = load_corpus(&args.logs).await?;
    info!(lines = lines.len(), "Log lines loaded");

    let synthesizer = args.llm.build_synthesizer(&config)?;
    let report = run_extraction(synthesizer, &lines, config.threads(), Some(&output)).await?;

    for (category, count) in &report.per_category {
        info!(category = %category, count, "Classified");
    }
    if report.payloads.is_empty() {
        info!("No malicious payloads found in the logs");
    }
    Ok(())
}
