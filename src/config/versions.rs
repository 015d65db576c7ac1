//! Version list loading.

use std::path::Path;

use crate::error::ConfigError;

/// Read the versions file: one version per line, blank lines and `#`
/// comments skipped. Order and duplicates are preserved.
pub async fn load_versions(path: &Path) -> Result<Vec<String>, ConfigError> {
    let contents =
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::VersionsFile {
                path: path.to_path_buf(),
                source,
            })?;
    Ok(parse_versions(&contents))
}

pub fn parse_versions(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Whether `version` is usable both as a Docker tag and as a single path
/// component under the output root.
pub fn is_valid_version(version: &str) -> bool {
    let mut chars = version.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    version.len() <= 128
        && (first.is_ascii_alphanumeric() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_order_and_duplicates() {
        let versions = parse_versions("8.9.0\n7.17.12\n\n8.9.0\n");
        assert_eq!(versions, vec!["8.9.0", "7.17.12", "8.9.0"]);
    }

    #[test]
    fn test_parse_skips_comments_and_trims() {
        let versions = parse_versions("# pinned\r\n  8.10.1  \r\n# 6.8.0\r\n");
        assert_eq!(versions, vec!["8.10.1"]);
    }

    #[test]
    fn test_parse_empty_file() {
        assert!(parse_versions("\n\n").is_empty());
    }

    #[test]
    fn test_valid_versions() {
        assert!(is_valid_version("8.9.0"));
        assert!(is_valid_version("8.10.0-SNAPSHOT"));
        assert!(is_valid_version("latest"));
    }

    #[test]
    fn test_invalid_versions() {
        assert!(!is_valid_version(""));
        assert!(!is_valid_version("../etc"));
        assert!(!is_valid_version(".hidden"));
        assert!(!is_valid_version("8.9.0/extra"));
        assert!(!is_valid_version("8.9 .0"));
        assert!(!is_valid_version(&"1".repeat(129)));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_versions(&dir.path().join("versions.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::VersionsFile { .. }));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("versions.txt");
        std::fs::write(&path, "8.9.0\n7.17.12\n").unwrap();

        let versions = load_versions(&path).await.unwrap();
        assert_eq!(versions, vec!["8.9.0", "7.17.12"]);
    }
}
