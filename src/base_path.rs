use crate::error::{FilterError, FilterResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

const REMOTE_SCHEMES: &[&str] = &["gs://", "s3://", "az://", "abfs://", "http://", "https://"];

/// Root location where stages write their artifacts
///
/// Local paths are bind-mounted into the stage containers; remote paths are
/// handed to the components unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum BasePath {
    Local(PathBuf),
    Remote(String),
}

impl BasePath {
    pub fn parse(value: &str) -> FilterResult<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(FilterError::InvalidPath("base path is empty".to_string()));
        }

        if REMOTE_SCHEMES.iter().any(|scheme| trimmed.starts_with(scheme)) {
            Ok(BasePath::Remote(trimmed.trim_end_matches('/').to_string()))
        } else {
            Ok(BasePath::Local(PathBuf::from(trimmed)))
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, BasePath::Local(_))
    }

    pub fn local_path(&self) -> Option<&Path> {
        match self {
            BasePath::Local(path) => Some(path),
            BasePath::Remote(_) => None,
        }
    }

    /// Create the directory if it is local and missing
    pub fn ensure_exists(&self) -> FilterResult<()> {
        if let BasePath::Local(path) = self {
            if !path.is_dir() {
                std::fs::create_dir_all(path).map_err(|e| {
                    FilterError::DirectoryCreationFailed(format!("{}: {}", path.display(), e))
                })?;
                tracing::info!(target: "pipeline", "Created base path {}", path.display());
            }
        }
        Ok(())
    }

    /// Join path segments using `/`, the separator used inside containers and
    /// object stores alike
    pub fn join(&self, segments: &[&str]) -> String {
        let mut joined = self.to_string().trim_end_matches('/').to_string();
        for segment in segments {
            joined.push('/');
            joined.push_str(segment.trim_matches('/'));
        }
        joined
    }
}

impl fmt::Display for BasePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BasePath::Local(path) => write!(f, "{}", path.display()),
            BasePath::Remote(uri) => write!(f, "{}", uri),
        }
    }
}

impl From<BasePath> for String {
    fn from(value: BasePath) -> Self {
        value.to_string()
    }
}

impl From<String> for BasePath {
    fn from(value: String) -> Self {
        BasePath::parse(&value).unwrap_or(BasePath::Local(PathBuf::from(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_local_and_remote() {
        assert_eq!(
            BasePath::parse("./fondant-artifacts").unwrap(),
            BasePath::Local(PathBuf::from("./fondant-artifacts"))
        );
        assert_eq!(
            BasePath::parse("gs://bucket/artifacts/").unwrap(),
            BasePath::Remote("gs://bucket/artifacts".to_string())
        );
        assert!(BasePath::parse("   ").is_err());
    }

    #[test]
    fn test_ensure_exists_creates_nested_directory() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("a").join("b");
        let base = BasePath::Local(target.clone());

        base.ensure_exists().unwrap();
        assert!(target.is_dir());

        // Second call is a no-op
        base.ensure_exists().unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn test_ensure_exists_remote_is_noop() {
        let base = BasePath::parse("s3://bucket/prefix").unwrap();
        assert!(base.ensure_exists().is_ok());
        assert!(base.local_path().is_none());
    }

    #[test]
    fn test_join() {
        let base = BasePath::parse("gs://bucket/root").unwrap();
        assert_eq!(
            base.join(&["pipeline", "run", "stage/"]),
            "gs://bucket/root/pipeline/run/stage"
        );
    }
}
