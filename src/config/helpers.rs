//! Env-var parsing shared by the config sections.

use std::str::FromStr;

use crate::error::ConfigError;

/// Serializes tests that mutate process environment variables.
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Read an env var, treating unset and empty as `None`.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.trim().is_empty() => Ok(None),
        Ok(val) => Ok(Some(val.trim().to_string())),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "value is not valid UTF-8".to_string(),
        }),
    }
}

/// Parse an env var into `T`, falling back to `default` when unset.
pub(crate) fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key)? {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{}': {}", raw, e),
        }),
        None => Ok(default),
    }
}

/// Read a string env var with a default.
pub(crate) fn parse_string_env(
    key: &str,
    default: impl Into<String>,
) -> Result<String, ConfigError> {
    Ok(optional_env(key)?.unwrap_or_else(|| default.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_optional_env_default_when_unset() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::remove_var("HARVEST_TEST_NUMBER");
        }
        let value: u16 = parse_optional_env("HARVEST_TEST_NUMBER", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_optional_env_rejects_garbage() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("HARVEST_TEST_NUMBER", "not-a-number");
        }
        let result: Result<u16, _> = parse_optional_env("HARVEST_TEST_NUMBER", 42);
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::remove_var("HARVEST_TEST_NUMBER");
        }
        let err = result.unwrap_err().to_string();
        assert!(err.contains("HARVEST_TEST_NUMBER"), "got: {}", err);
    }

    #[test]
    fn test_blank_env_is_unset() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("HARVEST_TEST_STRING", "   ");
        }
        let value = parse_string_env("HARVEST_TEST_STRING", "fallback").unwrap();
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::remove_var("HARVEST_TEST_STRING");
        }
        assert_eq!(value, "fallback");
    }
}
