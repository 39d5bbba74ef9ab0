use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use crate::errors::WafsmithError;
use crate::payload::{worker_count, write_lines};
use crate::synthesis::{Classification, RuleSynthesizer};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    pub log_lines: usize,
    /// Lines that produced a usable verdict.
    pub classified: usize,
    /// Unique malicious payloads, in log order.
    pub payloads: Vec<String>,
    pub per_category: BTreeMap<String, usize>,
}

/// Classify every log line and collect the attack strings found in them.
/// Non-malicious and unknown verdicts are ignored.
pub async fn run_extraction(
    synthesizer: Arc<dyn RuleSynthesizer>,
    lines: &[String],
    threads: usize,
    output: Option<&Path>,
) -> Result<ExtractionReport, WafsmithError> {
    let verdicts: Vec<Option<Classification>> = stream::iter(lines.iter())
        .map(|line| {
            let synthesizer = synthesizer.clone();
            async move { synthesizer.classify_log(line).await }
        })
        .buffered(worker_count(threads))
        .collect()
        .await;

    let mut report = ExtractionReport {
        log_lines: lines.len(),
        ..Default::default()
    };
    let mut seen = HashSet::new();
    for verdict in verdicts.into_iter().flatten() {
        report.classified += 1;
        *report.per_category.entry(verdict.category.to_string()).or_insert(0) += 1;
        let payload = verdict.extracted_payload.trim();
        if !verdict.category.is_malicious() || payload.is_empty() {
            continue;
        }
        // The output file holds one payload per line.
        if payload.contains(['\n', '\r']) {
            warn!(category = %verdict.category, "Extracted payload spans several lines, skipping it");
            continue;
        }
        if seen.insert(payload.to_string()) {
            report.payloads.push(payload.to_string());
        }
    }
    info!(
        classified = report.classified,
        lines = report.log_lines,
        payloads = report.payloads.len(),
        "Log classification complete"
    );

    if let Some(path) = output {
        if !report.payloads.is_empty() {
            write_lines(path, &report.payloads).await?;
            info!(path = %path.display(), entries = report.payloads.len(), "Extracted payloads written");
        }
    }
    Ok(report)
}
