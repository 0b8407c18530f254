use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gvm_scan_rs::config::Settings;
use gvm_scan_rs::{gmp, report, workflow};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_filter())),
        )
        .init();

    let transport = settings.transport();
    let plan = settings.plan();
    info!(
        targets = %plan.hosts,
        report_dir = %plan.report_dir.display(),
        poll_interval_s = plan.poll_interval.as_secs(),
        "starting scan"
    );

    let mut client = gmp::connect(&transport)
        .await
        .with_context(|| format!("failed to connect to management daemon via {transport:?}"))?;
    let summary = workflow::run_scan(&mut client, &plan).await?;
    client.disconnect().await?;

    if let Some(path) = settings.summary.as_deref() {
        report::write_summary_json(path, &summary)?;
        info!(path = %path.display(), "wrote run summary");
    }
    Ok(())
}
