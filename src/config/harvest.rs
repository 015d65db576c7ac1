use std::path::PathBuf;
use std::time::Duration;

use crate::config::helpers::{parse_optional_env, parse_string_env};
use crate::error::ConfigError;

/// Where to find versions, where to put telemetry, and how long to wait.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// File listing one version per line.
    pub versions_file: PathBuf,
    /// Root directory for `<version>/node-*.json`.
    pub output_dir: PathBuf,
    /// Host the published API port is reachable on.
    pub api_host: String,
    pub stats_path: String,
    pub info_path: String,
    /// Ceiling for pull + start + readiness + harvest of one version.
    pub lifecycle_timeout: Duration,
    /// Ceiling for stop + remove. Must be shorter than `lifecycle_timeout`.
    pub teardown_timeout: Duration,
    /// Sleep between readiness probes.
    pub poll_interval: Duration,
    /// Per-request HTTP timeout.
    pub fetch_timeout: Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            versions_file: PathBuf::from("versions.txt"),
            output_dir: PathBuf::from("output"),
            api_host: "localhost".to_string(),
            stats_path: "/_node/stats".to_string(),
            info_path: "/_node/".to_string(),
            lifecycle_timeout: Duration::from_secs(25 * 60),
            teardown_timeout: Duration::from_secs(2 * 60),
            poll_interval: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl HarvestConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            versions_file: PathBuf::from(parse_string_env(
                "HARVEST_VERSIONS_FILE",
                defaults.versions_file.to_string_lossy(),
            )?),
            output_dir: PathBuf::from(parse_string_env(
                "HARVEST_OUTPUT_DIR",
                defaults.output_dir.to_string_lossy(),
            )?),
            api_host: parse_string_env("HARVEST_API_HOST", defaults.api_host)?,
            stats_path: parse_string_env("HARVEST_STATS_PATH", defaults.stats_path)?,
            info_path: parse_string_env("HARVEST_INFO_PATH", defaults.info_path)?,
            lifecycle_timeout: Duration::from_secs(parse_optional_env(
                "HARVEST_LIFECYCLE_TIMEOUT_SECS",
                defaults.lifecycle_timeout.as_secs(),
            )?),
            teardown_timeout: Duration::from_secs(parse_optional_env(
                "HARVEST_TEARDOWN_TIMEOUT_SECS",
                defaults.teardown_timeout.as_secs(),
            )?),
            poll_interval: Duration::from_millis(parse_optional_env(
                "HARVEST_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )?),
            fetch_timeout: Duration::from_secs(parse_optional_env(
                "HARVEST_FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout.as_secs(),
            )?),
        };
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "HARVEST_POLL_INTERVAL_MS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.teardown_timeout >= self.lifecycle_timeout {
            return Err(ConfigError::InvalidValue {
                key: "HARVEST_TEARDOWN_TIMEOUT_SECS".to_string(),
                message: format!(
                    "teardown timeout {:?} must be shorter than lifecycle timeout {:?}",
                    self.teardown_timeout, self.lifecycle_timeout
                ),
            });
        }
        Ok(())
    }

    /// Base URL of the node API published on `port`.
    pub fn api_base(&self, port: u16) -> String {
        format!("http://{}:{}", self.api_host, port)
    }

    pub fn stats_url(&self, port: u16) -> String {
        format!("{}{}", self.api_base(port), self.stats_path)
    }

    pub fn info_url(&self, port: u16) -> String {
        format!("{}{}", self.api_base(port), self.info_path)
    }

    /// Directory holding one version's telemetry files.
    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.output_dir.join(version)
    }
}
