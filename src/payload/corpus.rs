use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::errors::WafsmithError;
use tracing::debug;

/// Load a payload corpus from a file, or from every file under a directory.
///
/// Each trimmed, non-empty line is one payload. Duplicates are dropped,
/// keeping the first occurrence.
pub async fn load_corpus(path: &Path) -> Result<Vec<String>, WafsmithError> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        WafsmithError::Corpus(format!("Cannot read corpus {}: {}", path.display(), e))
    })?;

    let files = if metadata.is_dir() {
        corpus_files(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut seen = HashSet::new();
    let mut payloads = Vec::new();
    for file in &files {
        let content = tokio::fs::read_to_string(file).await.map_err(|e| {
            WafsmithError::Corpus(format!("Cannot read corpus file {}: {}", file.display(), e))
        })?;
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if seen.insert(line.to_string()) {
                payloads.push(line.to_string());
            }
        }
    }

    debug!(path = %path.display(), files = files.len(), payloads = payloads.len(), "Corpus loaded");
    Ok(payloads)
}

fn corpus_files(dir: &Path) -> Result<Vec<PathBuf>, WafsmithError> {
    let pattern = dir.join("**").join("*");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| WafsmithError::Corpus(format!("Non UTF-8 corpus path: {}", dir.display())))?;

    let entries = glob::glob(pattern)
        .map_err(|e| WafsmithError::Corpus(format!("Invalid corpus pattern: {}", e)))?;

    // glob yields entries in alphabetical order, which keeps loading deterministic.
    let files = entries
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    Ok(files)
}

/// Write one item per line, replacing whatever the file held before.
pub async fn write_lines(path: &Path, items: &[String]) -> Result<(), WafsmithError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut content = String::new();
    for item in items {
        content.push_str(item);
        content.push('\n');
    }
    tokio::fs::write(path, content).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_file_trims_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("attacks.txt");
        std::fs::write(&file, "  ' OR 1=1 --\n\n<script>\n' OR 1=1 --\n   \n../etc/passwd\n").unwrap();

        let payloads = load_corpus(&file).await.unwrap();
        assert_eq!(payloads, vec!["' OR 1=1 --", "<script>", "../etc/passwd"]);
    }

    #[tokio::test]
    async fn test_load_directory_walks_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("a.txt"), "p1\np2\n").unwrap();
        std::fs::write(dir.path().join("nested").join("b.txt"), "p2\np3\n").unwrap();

        let payloads = load_corpus(dir.path()).await.unwrap();
        assert_eq!(payloads, vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn test_missing_corpus_is_corpus_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_corpus(&dir.path().join("absent.txt")).await.unwrap_err();
        assert!(matches!(err, WafsmithError::Corpus(_)));
    }

    #[tokio::test]
    async fn test_write_lines_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out").join("rules.txt");
        write_lines(&out, &["old".to_string(), "older".to_string()]).await.unwrap();
        write_lines(&out, &["new".to_string()]).await.unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "new\n");
    }
}
