use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// `<prefix>-<sha256(rule)><extension>`, so identical rules share a file name
/// and distinct rules never collide.
pub fn artifact_name(prefix: &str, rule: &str, extension: &str) -> String {
    let digest = Sha256::digest(rule.as_bytes());
    format!("{}-{}{}", prefix, hex::encode(digest), extension)
}

/// Whether `path` names a rule file this tool generated.
pub fn is_generated_artifact(path: &Path, prefix: &str, extension: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(&format!("{}-", prefix)) && n.ends_with(extension))
        .unwrap_or(false)
}

/// A rule file currently written into the WAF's rules directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleHandle {
    pub path: PathBuf,
    pub rule: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_name_is_content_hash() {
        let name = artifact_name("lwrc", "abc", ".conf");
        assert_eq!(
            name,
            "lwrc-ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad.conf"
        );
        assert_eq!(artifact_name("lwrc", "abc", ".conf"), name);
        assert_ne!(artifact_name("lwrc", "abd", ".conf"), name);
    }

    #[test]
    fn test_is_generated_artifact() {
        assert!(is_generated_artifact(Path::new("/x/rules/lwrc-00ff.conf"), "lwrc", ".conf"));
        assert!(!is_generated_artifact(Path::new("/x/rules/REQUEST-901.conf"), "lwrc", ".conf"));
        assert!(!is_generated_artifact(Path::new("/x/rules/lwrc-00ff.conf.bak"), "lwrc", ".conf"));
    }
}
