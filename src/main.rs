//! Logstash samples harvester - main entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use logstash_samples::{
    config::{Config, load_versions},
    error::SetupError,
    orchestrator::{DockerRuntime, Harness, TeardownOutcome, summarize},
    telemetry::HttpJsonFetcher,
};

#[derive(Parser, Debug)]
#[command(name = "logstash-samples")]
#[command(about = "Run each Logstash version in Docker and save its node stats and info")]
#[command(version)]
struct Args {
    /// File listing one version per line
    #[arg(short = 'f', long)]
    versions_file: Option<PathBuf>,

    /// Directory to write `<version>/node-*.json` into
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("logstash_samples=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    // Setup failures abort before anything is started.
    let config = Config::from_env()
        .map_err(SetupError::from)?
        .with_overrides(args.versions_file, args.output_dir);
    config.validate().map_err(SetupError::from)?;

    let versions = load_versions(&config.harvest.versions_file)
        .await
        .map_err(SetupError::from)?;
    tracing::info!(
        count = versions.len(),
        file = %config.harvest.versions_file.display(),
        "Loaded versions"
    );

    let runtime = DockerRuntime::connect().await?;
    tracing::info!("Connected to Docker");

    let fetcher = HttpJsonFetcher::new(config.harvest.fetch_timeout)?;
    let harness = Harness::new(Arc::new(runtime), Arc::new(fetcher), config);

    // Ctrl-C stops every lifecycle from waiting; teardown still runs.
    let shutdown = harness.shutdown_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, tearing down running containers");
            shutdown.trigger();
        }
    });

    let reports = harness.run(&versions).await;

    for report in &reports {
        println!("{}", summarize(report));
    }
    for report in &reports {
        if let TeardownOutcome::Incomplete { remediation, .. } = &report.teardown {
            println!("To remove container manually, run: {}", remediation);
        }
    }

    tracing::info!("Done");
    Ok(())
}
