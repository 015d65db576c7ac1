//! Error types for the harvester.
//!
//! Setup errors abort the whole run. Everything raised inside a lifecycle is
//! folded into a [`LifecycleError`] and stays with its version.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to read versions file {path}: {source}")]
    VersionsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that abort the run before any lifecycle is dispatched.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Docker is not reachable: {reason}")]
    DockerUnavailable { reason: String },

    #[error("Failed to build HTTP client: {reason}")]
    HttpClient { reason: String },
}

/// Errors from the container runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Image pull failed for {image}: {reason}")]
    PullFailed { image: String, reason: String },

    #[error("Container creation failed for {name}: {reason}")]
    CreateFailed { name: String, reason: String },

    #[error("Container {container_id} failed to start: {reason}")]
    StartFailed {
        container_id: String,
        reason: String,
    },

    #[error("Container {container_id} failed to stop: {reason}")]
    StopFailed {
        container_id: String,
        reason: String,
    },

    #[error("Container {container_id} could not be removed: {reason}")]
    RemoveFailed {
        container_id: String,
        reason: String,
    },
}

/// Errors from fetching a JSON document over HTTP.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} returned a body that is not JSON: {reason}")]
    Decode { url: String, reason: String },
}

/// Errors from writing telemetry to disk.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize document for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Port allocation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("No free port in range {start}-{end}")]
    Exhausted { start: u16, end: u16 },
}

/// Why a lifecycle stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CancelReason {
    #[error("lifecycle deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("shutdown requested")]
    Shutdown,
}

/// Why one version's lifecycle failed.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("'{version}' is not a valid image tag")]
    InvalidVersion { version: String },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("Lifecycle cancelled: {0}")]
    Cancelled(#[from] CancelReason),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}
