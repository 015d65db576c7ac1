use std::ops::Range;

use crate::config::helpers::{parse_optional_env, parse_string_env};
use crate::error::ConfigError;

/// Docker sandbox configuration.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Image repository; the version is appended as the tag.
    pub image_registry: String,
    /// Container names are `<prefix>-<version>`.
    pub container_prefix: String,
    /// Port the node API listens on inside the container.
    pub api_port: u16,
    /// First host port handed out (inclusive).
    pub port_range_start: u16,
    /// End of the host port range (exclusive).
    pub port_range_end: u16,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image_registry: "docker.elastic.co/logstash/logstash".to_string(),
            container_prefix: "logstash".to_string(),
            api_port: 9600,
            port_range_start: 5000,
            port_range_end: 6000,
        }
    }
}

impl SandboxConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            image_registry: parse_string_env("HARVEST_IMAGE_REGISTRY", defaults.image_registry)?,
            container_prefix: parse_string_env(
                "HARVEST_CONTAINER_PREFIX",
                defaults.container_prefix,
            )?,
            api_port: parse_optional_env("HARVEST_API_PORT", defaults.api_port)?,
            port_range_start: parse_optional_env(
                "HARVEST_PORT_RANGE_START",
                defaults.port_range_start,
            )?,
            port_range_end: parse_optional_env("HARVEST_PORT_RANGE_END", defaults.port_range_end)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.port_range_start >= self.port_range_end {
            return Err(ConfigError::InvalidValue {
                key: "HARVEST_PORT_RANGE_END".to_string(),
                message: format!(
                    "port range {}-{} is empty",
                    self.port_range_start, self.port_range_end
                ),
            });
        }
        if self.image_registry.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "HARVEST_IMAGE_REGISTRY".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Host ports available to sandboxes, `[start, end)`.
    pub fn port_range(&self) -> Range<u16> {
        self.port_range_start..self.port_range_end
    }

    /// Full image reference for a version.
    pub fn image_for(&self, version: &str) -> String {
        format!("{}:{}", self.image_registry, version)
    }

    pub fn container_name_for(&self, version: &str) -> String {
        format!("{}-{}", self.container_prefix, version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::helpers::ENV_MUTEX;

    fn clear_sandbox_env() {
        // SAFETY: Only called under ENV_MUTEX in tests.
        unsafe {
            std::env::remove_var("HARVEST_IMAGE_REGISTRY");
            std::env::remove_var("HARVEST_CONTAINER_PREFIX");
            std::env::remove_var("HARVEST_API_PORT");
            std::env::remove_var("HARVEST_PORT_RANGE_START");
            std::env::remove_var("HARVEST_PORT_RANGE_END");
        }
    }

    #[test]
    fn test_defaults() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_sandbox_env();

        let config = SandboxConfig::resolve().expect("defaults should resolve");
        assert_eq!(config.port_range(), 5000..6000);
        assert_eq!(config.api_port, 9600);
        assert_eq!(
            config.image_for("8.9.0"),
            "docker.elastic.co/logstash/logstash:8.9.0"
        );
        assert_eq!(config.container_name_for("8.9.0"), "logstash-8.9.0");
    }

    #[test]
    fn test_env_overrides_port_range() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_sandbox_env();
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("HARVEST_PORT_RANGE_START", "7000");
            std::env::set_var("HARVEST_PORT_RANGE_END", "7010");
        }

        let config = SandboxConfig::resolve().expect("resolve should succeed");
        clear_sandbox_env();

        assert_eq!(config.port_range(), 7000..7010);
    }

    #[test]
    fn test_empty_port_range_rejected() {
        let config = SandboxConfig {
            port_range_start: 6000,
            port_range_end: 6000,
            ..Default::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("is empty"), "got: {}", err);
    }
}
