//! Configuration for the harvester.
//!
//! Settings are loaded with priority: CLI flag > env var > default.
//! `./.env` is loaded via dotenvy before env vars are read, and never
//! overwrites variables that are already set.

pub(crate) mod helpers;
mod harvest;
mod sandbox;
mod versions;

use std::path::PathBuf;

use crate::error::ConfigError;

pub use self::harvest::HarvestConfig;
pub use self::sandbox::SandboxConfig;
pub use self::versions::{is_valid_version, load_versions, parse_versions};

/// Main configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub sandbox: SandboxConfig,
    pub harvest: HarvestConfig,
}

impl Config {
    /// Load configuration from `.env` and environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Ok(Self {
            sandbox: SandboxConfig::resolve()?,
            harvest: HarvestConfig::resolve()?,
        })
    }

    /// Apply command-line overrides on top of the resolved config.
    pub fn with_overrides(
        mut self,
        versions_file: Option<PathBuf>,
        output_dir: Option<PathBuf>,
    ) -> Self {
        if let Some(path) = versions_file {
            self.harvest.versions_file = path;
        }
        if let Some(path) = output_dir {
            self.harvest.output_dir = path;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sandbox.validate()?;
        self.harvest.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_paths() {
        let config = Config::default().with_overrides(
            Some(PathBuf::from("/tmp/versions.txt")),
            Some(PathBuf::from("/tmp/out")),
        );
        assert_eq!(
            config.harvest.versions_file,
            PathBuf::from("/tmp/versions.txt")
        );
        assert_eq!(config.harvest.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_no_overrides_keeps_defaults() {
        let config = Config::default().with_overrides(None, None);
        assert_eq!(config.harvest.versions_file, PathBuf::from("versions.txt"));
        assert!(config.validate().is_ok());
    }
}
