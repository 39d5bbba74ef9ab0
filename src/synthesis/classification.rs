use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*(.*?)\s*```").expect("code fence pattern is valid")
});

/// Closed set of verdicts a log line can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThreatCategory {
    CommandInjection,
    FileInclusion,
    Sqli,
    Xss,
    DirectoryTraversal,
    Recon,
    NonMalicious,
    Unknown,
}

impl ThreatCategory {
    /// Labels outside the vocabulary map to `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "command-injection" => Self::CommandInjection,
            "file-inclusion" => Self::FileInclusion,
            "sqli" => Self::Sqli,
            "xss" => Self::Xss,
            "directory-traversal" => Self::DirectoryTraversal,
            "recon" => Self::Recon,
            "non-malicious" => Self::NonMalicious,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CommandInjection => "command-injection",
            Self::FileInclusion => "file-inclusion",
            Self::Sqli => "sqli",
            Self::Xss => "xss",
            Self::DirectoryTraversal => "directory-traversal",
            Self::Recon => "recon",
            Self::NonMalicious => "non-malicious",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_malicious(&self) -> bool {
        !matches!(self, Self::NonMalicious | Self::Unknown)
    }
}

impl fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category: ThreatCategory,
    pub extracted_payload: String,
    pub reason: String,
}

/// Return the body of the first fenced code block, or the trimmed input when
/// there is none.
pub fn strip_code_fences(text: &str) -> String {
    match CODE_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().to_string(),
        None => text.trim().to_string(),
    }
}

/// Join the bodies of every fenced code block, one per line, or return the
/// trimmed input when there is none.
pub fn join_code_fences(text: &str) -> String {
    let bodies: Vec<&str> = CODE_FENCE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect();
    if bodies.is_empty() {
        text.trim().to_string()
    } else {
        bodies.join("\n")
    }
}

/// Parse a `{classification, extracted_payload, reason}` answer. Anything
/// that is not such an object yields `None`.
pub fn parse_classification(raw: &str) -> Option<Classification> {
    let value: Value = serde_json::from_str(&strip_code_fences(raw)).ok()?;
    let label = value.get("classification")?.as_str()?;
    let extracted_payload = value.get("extracted_payload")?.as_str()?.to_string();
    let reason = value.get("reason")?.as_str()?.to_string();
    Some(Classification {
        category: ThreatCategory::from_label(label),
        extracted_payload,
        reason,
    })
}
