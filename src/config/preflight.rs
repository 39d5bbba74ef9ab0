use std::path::{Path, PathBuf};

use crate::environment::ComposeSettings;
use crate::errors::WafsmithError;
use tracing::info;

/// Paths a run touches, checked before any environment action.
#[derive(Debug, Clone, Default)]
pub struct PreflightPaths<'a> {
    pub attacks: Option<&'a Path>,
    pub traffic: Option<&'a Path>,
    pub outputs: Vec<&'a Path>,
}

/// What pre-flight found. `traffic` is `None` when no traffic corpus will be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightOutcome {
    pub compose_file: Option<PathBuf>,
    pub traffic: Option<PathBuf>,
}

/// Fail early on a missing compose file or attack corpus, and create the
/// parent directories of every output file.
pub async fn preflight(
    compose: Option<&ComposeSettings>,
    paths: &PreflightPaths<'_>,
) -> Result<PreflightOutcome, WafsmithError> {
    let compose_file = match compose {
        Some(settings) => {
            let file = settings.setup_dir.join(&settings.compose_file);
            if !file.is_file() {
                return Err(WafsmithError::Config(format!(
                    "Compose file {} not found in setup directory {}",
                    settings.compose_file,
                    settings.setup_dir.display()
                )));
            }
            Some(file)
        }
        None => None,
    };

    if let Some(attacks) = paths.attacks {
        if !attacks.exists() {
            return Err(WafsmithError::Config(format!(
                "Attack payload path does not exist: {}",
                attacks.display()
            )));
        }
    }

    let traffic = match paths.traffic {
        Some(path) if path.exists() => Some(path.to_path_buf()),
        Some(path) => {
            info!(path = %path.display(), "Traffic payload path not found, traffic simulation skipped");
            None
        }
        None => None,
    };

    for output in &paths.outputs {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    Ok(PreflightOutcome { compose_file, traffic })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(dir: &Path) -> ComposeSettings {
        ComposeSettings {
            setup_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_compose_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = preflight(Some(&settings(dir.path())), &PreflightPaths::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WafsmithError::Config(_)));
    }

    #[tokio::test]
    async fn test_missing_attack_corpus_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("docker-compose.yml"), "services: {}\n").unwrap();
        let missing = dir.path().join("attacks.txt");
        let paths = PreflightPaths {
            attacks: Some(missing.as_path()),
            ..Default::default()
        };
        assert!(preflight(Some(&settings(dir.path())), &paths).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_traffic_is_skipped_and_outputs_prepared() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("docker-compose.yml"), "services: {}\n").unwrap();
        let attacks = dir.path().join("attacks.txt");
        std::fs::write(&attacks, "<script>\n").unwrap();
        let traffic = dir.path().join("traffic.txt");
        let rules_out = dir.path().join("out/nested/rules.conf");

        let paths = PreflightPaths {
            attacks: Some(attacks.as_path()),
            traffic: Some(traffic.as_path()),
            outputs: vec![rules_out.as_path()],
        };
        let outcome = preflight(Some(&settings(dir.path())), &paths).await.unwrap();

        assert_eq!(outcome.traffic, None);
        assert_eq!(outcome.compose_file, Some(dir.path().join("docker-compose.yml")));
        assert!(dir.path().join("out/nested").is_dir());
    }
}
