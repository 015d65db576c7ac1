//! One version's sandbox lifecycle.
//!
//! ```text
//! Pending -> Pulled -> Created -> Started -> Ready -> Harvested -> TornDown
//!    \_________\__________\_________\_________\______> Failed
//! ```
//!
//! Every run that gets a container id from the runtime is torn down exactly
//! once, whatever happens after creation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::{Config, is_valid_version};
use crate::error::{CancelReason, LifecycleError};
use crate::orchestrator::cancel::Cancellation;
use crate::orchestrator::ports::PortAllocator;
use crate::orchestrator::runtime::{ContainerRuntime, InstanceSpec};
use crate::telemetry::{
    JsonFetcher, NODE_INFO_FILE, NODE_STATS_FILE, TelemetryWriter, is_ready_document,
};

/// States of a lifecycle run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Pending,
    Pulled,
    Created,
    Started,
    Ready,
    Harvested,
    TornDown,
    Failed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Pulled => "pulled",
            Self::Created => "created",
            Self::Started => "started",
            Self::Ready => "ready",
            Self::Harvested => "harvested",
            Self::TornDown => "torn_down",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TornDown | Self::Failed)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happened when the container was stopped and removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// No container was created, so there was nothing to remove.
    NotNeeded,
    Completed,
    /// Stop or remove failed; the container may still exist.
    Incomplete {
        container_id: String,
        errors: Vec<String>,
        /// Command that removes the container by hand.
        remediation: String,
    },
}

/// Files written by a successful harvest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestedFiles {
    pub node_stats: PathBuf,
    pub node_info: PathBuf,
}

/// Result of one lifecycle run.
#[derive(Debug)]
pub struct LifecycleReport {
    pub version: String,
    pub port: Option<u16>,
    pub container_id: Option<String>,
    /// States in the order they were entered, ending in a terminal state.
    pub history: Vec<LifecycleState>,
    /// Readiness probes sent before the node answered.
    pub ready_after_attempts: Option<u32>,
    pub outcome: Result<HarvestedFiles, LifecycleError>,
    pub teardown: TeardownOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl LifecycleReport {
    pub fn final_state(&self) -> LifecycleState {
        self.history
            .last()
            .copied()
            .unwrap_or(LifecycleState::Pending)
    }

    /// Whether the run got as far as `state`.
    pub fn reached(&self, state: LifecycleState) -> bool {
        self.history.contains(&state)
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Last non-terminal state entered before the run failed.
    pub fn failed_stage(&self) -> Option<LifecycleState> {
        if self.outcome.is_ok() {
            return None;
        }
        self.history
            .iter()
            .rev()
            .find(|state| !state.is_terminal())
            .copied()
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// A created container owned by one lifecycle.
///
/// [`SandboxInstance::teardown`] consumes the instance, so it can run at most
/// once. Dropping an instance without tearing it down logs how to remove the
/// container by hand.
#[derive(Debug)]
pub struct SandboxInstance {
    version: String,
    container_id: String,
    port: u16,
    /// Manual removal command, taken from the runtime that created it.
    remediation: String,
    armed: bool,
}

impl SandboxInstance {
    fn new(
        version: &str,
        container_id: String,
        port: u16,
        runtime: &dyn ContainerRuntime,
    ) -> Self {
        Self {
            version: version.to_string(),
            remediation: runtime.remediation_hint(&container_id),
            container_id,
            port,
            armed: true,
        }
    }

    pub fn remediation(&self) -> &str {
        &self.remediation
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stop then remove the container within `timeout`. Failures are logged
    /// and returned as advisory, never as an error.
    pub async fn teardown(
        mut self,
        runtime: &dyn ContainerRuntime,
        timeout: Duration,
    ) -> TeardownOutcome {
        self.armed = false;
        let container_id = self.container_id.as_str();

        tracing::info!(
            version = %self.version,
            container_id = %container_id,
            "Removing container"
        );

        let attempt = tokio::time::timeout(timeout, async {
            let mut errors = Vec::new();
            if let Err(e) = runtime.stop_instance(container_id).await {
                tracing::warn!(
                    version = %self.version,
                    container_id = %container_id,
                    error = %e,
                    "Failed to stop container (may already be stopped)"
                );
                errors.push(e.to_string());
            }
            if let Err(e) = runtime.remove_instance(container_id).await {
                tracing::warn!(
                    version = %self.version,
                    container_id = %container_id,
                    error = %e,
                    "Failed to remove container"
                );
                errors.push(e.to_string());
            }
            errors
        })
        .await;

        let errors = match attempt {
            Ok(errors) => errors,
            Err(_) => vec![format!("teardown timed out after {:?}", timeout)],
        };

        if errors.is_empty() {
            return TeardownOutcome::Completed;
        }

        let remediation = self.remediation.clone();
        tracing::error!(
            version = %self.version,
            container_id = %container_id,
            remediation = %remediation,
            "Container may still exist; remove it manually"
        );
        TeardownOutcome::Incomplete {
            container_id: container_id.to_string(),
            errors,
            remediation,
        }
    }
}

impl Drop for SandboxInstance {
    fn drop(&mut self) {
        if self.armed {
            tracing::error!(
                version = %self.version,
                container_id = %self.container_id,
                remediation = %self.remediation,
                "Container dropped without teardown"
            );
        }
    }
}

/// Poll `url` until it returns a ready document or `cancel` fires.
///
/// Fetch errors count as "not ready yet" and are never returned. The
/// cancellation signal is checked before every probe and raced against every
/// sleep. Returns the number of probes sent.
pub async fn poll_until_ready(
    fetcher: &dyn JsonFetcher,
    url: &str,
    interval: Duration,
    cancel: &mut Cancellation,
) -> Result<u32, CancelReason> {
    let mut attempts = 0u32;
    loop {
        cancel.check()?;
        attempts += 1;

        match fetcher.fetch_json(url).await {
            Ok(doc) if is_ready_document(&doc) => return Ok(attempts),
            Ok(_) => tracing::debug!(url = %url, attempts, "Empty document, not ready yet"),
            Err(e) => tracing::debug!(url = %url, attempts, error = %e, "Not ready yet"),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            reason = cancel.cancelled() => return Err(reason),
        }
    }
}

/// Per-run bookkeeping shared by the stages.
struct RunState {
    version: String,
    history: Vec<LifecycleState>,
    port: Option<u16>,
    container_id: Option<String>,
    ready_after_attempts: Option<u32>,
    teardown: TeardownOutcome,
}

impl RunState {
    fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            history: vec![LifecycleState::Pending],
            port: None,
            container_id: None,
            ready_after_attempts: None,
            teardown: TeardownOutcome::NotNeeded,
        }
    }

    fn advance(&mut self, state: LifecycleState) {
        tracing::debug!(version = %self.version, state = %state, "Lifecycle transition");
        self.history.push(state);
    }
}

/// Drives one version through pull, start, readiness, harvest and teardown.
#[derive(Clone)]
pub struct LifecycleController {
    runtime: Arc<dyn ContainerRuntime>,
    fetcher: Arc<dyn JsonFetcher>,
    writer: TelemetryWriter,
    ports: Arc<PortAllocator>,
    config: Arc<Config>,
}

impl LifecycleController {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        fetcher: Arc<dyn JsonFetcher>,
        ports: Arc<PortAllocator>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            runtime,
            fetcher,
            writer: TelemetryWriter::new(),
            ports,
            config,
        }
    }

    /// Run the full lifecycle for `version`. Never fails: the outcome and the
    /// teardown result are both in the report.
    pub async fn run(&self, version: &str, mut cancel: Cancellation) -> LifecycleReport {
        let started_at = Utc::now();
        let mut run = RunState::new(version);

        let outcome = self.drive(&mut run, &mut cancel).await;
        match &outcome {
            Ok(_) => run.advance(LifecycleState::TornDown),
            Err(e) => {
                tracing::error!(
                    version = %version,
                    stage = %run.history.last().copied().unwrap_or(LifecycleState::Pending),
                    error = %e,
                    "Lifecycle failed"
                );
                run.advance(LifecycleState::Failed);
            }
        }

        LifecycleReport {
            version: run.version,
            port: run.port,
            container_id: run.container_id,
            history: run.history,
            ready_after_attempts: run.ready_after_attempts,
            outcome,
            teardown: run.teardown,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Pull, claim a port and create the container; hand the created instance
    /// to [`Self::drive_instance`] and tear it down whatever that returns.
    async fn drive(
        &self,
        run: &mut RunState,
        cancel: &mut Cancellation,
    ) -> Result<HarvestedFiles, LifecycleError> {
        let version = run.version.clone();
        if !is_valid_version(&version) {
            return Err(LifecycleError::InvalidVersion { version });
        }

        cancel.check()?;
        let image = self.config.sandbox.image_for(&version);
        self.runtime.pull_image(&image).await?;
        run.advance(LifecycleState::Pulled);

        cancel.check()?;
        let port = self.ports.assign_free_port()?;
        run.port = Some(port);

        let spec = InstanceSpec {
            name: self.config.sandbox.container_name_for(&version),
            image,
            container_port: self.config.sandbox.api_port,
            host_port: port,
            host_ip: "0.0.0.0".to_string(),
        };
        tracing::info!(version = %version, container = %spec.name, port, "Creating container");
        let container_id = self.runtime.create_instance(&spec).await?;
        run.container_id = Some(container_id.clone());
        run.advance(LifecycleState::Created);

        let instance =
            SandboxInstance::new(&version, container_id, port, self.runtime.as_ref());
        let result = self.drive_instance(&instance, run, cancel).await;
        run.teardown = instance
            .teardown(
                self.runtime.as_ref(),
                self.config.harvest.teardown_timeout,
            )
            .await;
        result
    }

    async fn drive_instance(
        &self,
        instance: &SandboxInstance,
        run: &mut RunState,
        cancel: &mut Cancellation,
    ) -> Result<HarvestedFiles, LifecycleError> {
        cancel.check()?;
        self.runtime.start_instance(instance.container_id()).await?;
        run.advance(LifecycleState::Started);

        let stats_url = self.config.harvest.stats_url(instance.port());
        tracing::info!(version = %run.version, url = %stats_url, "Waiting for node API");
        let attempts = poll_until_ready(
            self.fetcher.as_ref(),
            &stats_url,
            self.config.harvest.poll_interval,
            cancel,
        )
        .await?;
        run.ready_after_attempts = Some(attempts);
        run.advance(LifecycleState::Ready);

        cancel.check()?;
        let files = self.harvest(&run.version, instance.port()).await?;
        run.advance(LifecycleState::Harvested);
        Ok(files)
    }

    /// Fetch both documents, then write them under the version directory.
    async fn harvest(&self, version: &str, port: u16) -> Result<HarvestedFiles, LifecycleError> {
        let harvest = &self.config.harvest;

        let stats_url = harvest.stats_url(port);
        tracing::info!(version = %version, url = %stats_url, "Getting node stats");
        let stats = self.fetcher.fetch_json(&stats_url).await?;

        let info_url = harvest.info_url(port);
        tracing::info!(version = %version, url = %info_url, "Getting node info");
        let info = self.fetcher.fetch_json(&info_url).await?;

        let dir = harvest.version_dir(version);
        self.writer.ensure_dir(&dir).await?;

        let files = HarvestedFiles {
            node_stats: dir.join(NODE_STATS_FILE),
            node_info: dir.join(NODE_INFO_FILE),
        };
        tracing::info!(version = %version, path = %files.node_stats.display(), "Writing node stats");
        self.writer.write_json(&stats, &files.node_stats).await?;
        tracing::info!(version = %version, path = %files.node_info.display(), "Writing node info");
        self.writer.write_json(&info, &files.node_info).await?;

        Ok(files)
    }
}
