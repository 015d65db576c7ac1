//! Fan-out/fan-in over versions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::config::Config;
use crate::orchestrator::cancel::ShutdownSignal;
use crate::orchestrator::lifecycle::{
    LifecycleController, LifecycleReport, LifecycleState, TeardownOutcome,
};
use crate::orchestrator::ports::PortAllocator;
use crate::orchestrator::runtime::ContainerRuntime;
use crate::telemetry::JsonFetcher;

/// Runs one lifecycle per version concurrently and waits for all of them.
pub struct Harness {
    controller: LifecycleController,
    config: Arc<Config>,
    shutdown: Arc<ShutdownSignal>,
}

impl Harness {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        fetcher: Arc<dyn JsonFetcher>,
        config: Config,
    ) -> Self {
        let config = Arc::new(config);
        let ports = Arc::new(PortAllocator::new(config.sandbox.port_range()));
        Self {
            controller: LifecycleController::new(runtime, fetcher, ports, Arc::clone(&config)),
            config,
            shutdown: Arc::new(ShutdownSignal::new()),
        }
    }

    /// Handle for asking in-flight lifecycles to stop waiting and tear down.
    pub fn shutdown_signal(&self) -> Arc<ShutdownSignal> {
        Arc::clone(&self.shutdown)
    }

    /// Run every version to a terminal state.
    ///
    /// One failing version never cancels the others. Reports come back in
    /// input order.
    pub async fn run(&self, versions: &[String]) -> Vec<LifecycleReport> {
        if versions.is_empty() {
            tracing::warn!("No versions to harvest");
            return Vec::new();
        }

        tracing::info!(count = versions.len(), "Dispatching lifecycles");

        let mut join_set = JoinSet::new();
        let mut task_versions = HashMap::new();
        for (index, version) in versions.iter().enumerate() {
            let controller = self.controller.clone();
            let cancel = self.shutdown.token(self.config.harvest.lifecycle_timeout);
            let task_version = version.clone();
            let handle = join_set
                .spawn(async move { (index, controller.run(&task_version, cancel).await) });
            task_versions.insert(handle.id(), version.as_str());
        }

        let mut slots: Vec<Option<LifecycleReport>> = versions.iter().map(|_| None).collect();
        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((_, (index, report))) => {
                    log_report(&report);
                    slots[index] = Some(report);
                }
                // A panicked task's instance Drop has already logged how to
                // remove any container it left behind.
                Err(e) => tracing::error!(
                    version = task_versions.get(&e.id()).copied().unwrap_or("unknown"),
                    error = %e,
                    "Lifecycle task aborted"
                ),
            }
        }

        let reports: Vec<LifecycleReport> = slots.into_iter().flatten().collect();
        let succeeded = reports.iter().filter(|r| r.succeeded()).count();
        tracing::info!(
            succeeded,
            failed = versions.len() - succeeded,
            "All lifecycles finished"
        );
        reports
    }
}

fn log_report(report: &LifecycleReport) {
    let elapsed_secs = report.elapsed().num_seconds();
    match &report.outcome {
        Ok(files) => tracing::info!(
            version = %report.version,
            port = ?report.port,
            elapsed_secs,
            stats = %files.node_stats.display(),
            info = %files.node_info.display(),
            "Harvested version"
        ),
        Err(e) => tracing::error!(
            version = %report.version,
            stage = %report.failed_stage().unwrap_or(LifecycleState::Pending),
            elapsed_secs,
            error = %e,
            "Error harvesting version"
        ),
    }

    if let TeardownOutcome::Incomplete { remediation, .. } = &report.teardown {
        tracing::warn!(
            version = %report.version,
            remediation = %remediation,
            "To remove the container manually, run the remediation command"
        );
    }
}

/// A one-line human summary of a report, for the end-of-run listing.
pub fn summarize(report: &LifecycleReport) -> String {
    let status = match &report.outcome {
        Ok(_) => "ok".to_string(),
        Err(e) => format!(
            "failed at {}: {}",
            report.failed_stage().unwrap_or(LifecycleState::Pending),
            e
        ),
    };
    let teardown = match &report.teardown {
        TeardownOutcome::NotNeeded => String::new(),
        TeardownOutcome::Completed => " (container removed)".to_string(),
        TeardownOutcome::Incomplete { remediation, .. } => {
            format!(" (container left behind, run: {})", remediation)
        }
    };
    format!(
        "{} {}{} [{}]",
        report.version,
        status,
        teardown,
        report.finished_at.format("%H:%M:%S")
    )
}
