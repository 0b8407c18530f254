use std::path::PathBuf;
use std::time::Duration;

use ::time::{format_description::well_known, OffsetDateTime};
use anyhow::{bail, Context, Result};
use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::gmp::{GmpClient, GmpStream, NewTarget, NewTask, ResourceKind};
use crate::report;
use crate::resolve::{self, LookupMode};
use crate::types::{ScanSummary, TaskProgress};

/// Everything one scan run needs besides the connection itself.
#[derive(Debug, Clone)]
pub struct ScanPlan {
    pub username: String,
    pub password: String,
    pub hosts: String,
    pub target_name: String,
    pub task_name: String,
    pub port_list_name: String,
    pub scan_config_name: String,
    pub scanner_id: Option<String>,
    pub alive_test: String,
    pub report_format_id: String,
    pub report_dir: PathBuf,
    pub poll_interval: Duration,
    pub max_wait: Option<Duration>,
    pub lookup: LookupMode,
}

/// Authenticate, prepare target and task, start the scan, wait for it and save the report.
///
/// A new task is created on every call, even when the target already exists.
pub async fn run_scan<S: GmpStream>(
    client: &mut GmpClient<S>,
    plan: &ScanPlan,
) -> Result<ScanSummary> {
    let started_at = now_rfc3339();

    let version = client.get_version().await.context("get_version failed")?;
    info!(%version, "management daemon protocol version");
    client
        .authenticate(&plan.username, &plan.password)
        .await
        .context("authentication failed")?;

    let port_list = resolve::resolve_named(
        client,
        ResourceKind::PortList,
        &plan.port_list_name,
        plan.lookup,
    )
    .await
    .context("failed to resolve port list")?;

    let target = resolve::resolve_or_create_target(
        client,
        &NewTarget {
            name: &plan.target_name,
            hosts: &plan.hosts,
            port_list_id: &port_list.id,
            alive_test: &plan.alive_test,
        },
    )
    .await
    .context("failed to resolve target")?;

    let config = resolve::resolve_named(
        client,
        ResourceKind::ScanConfig,
        &plan.scan_config_name,
        plan.lookup,
    )
    .await
    .context("failed to resolve scan config")?;

    let task_id = client
        .create_task(&NewTask {
            name: &plan.task_name,
            config_id: &config.id,
            target_id: &target.id,
            scanner_id: plan.scanner_id.as_deref(),
        })
        .await
        .context("failed to create task")?;
    info!(%task_id, task_name = %plan.task_name, "created task");

    let report_id = client
        .start_task(&task_id)
        .await
        .context("failed to start task")?;
    info!(%task_id, %report_id, "task started");

    let (last, polls) =
        poll_until_terminal(client, &task_id, plan.poll_interval, plan.max_wait).await?;

    let body = client
        .get_report(&report_id, &plan.report_format_id)
        .await
        .context("failed to fetch report")?;
    let report_path = report::save_report(&plan.report_dir, &report_id, &body)?;
    println!("Saved: {}", report_path.display());

    Ok(ScanSummary {
        target_id: target.id,
        target_created: target.created,
        port_list_id: port_list.id,
        config_id: config.id,
        task_id,
        report_id,
        final_status: last.status.to_string(),
        polls,
        report_path,
        started_at,
        finished_at: now_rfc3339(),
    })
}

/// Poll a task until its status is first terminal.
///
/// Returns the terminal observation and the number of status calls made. There
/// is no sleep after the terminal poll. Without `max_wait` this never gives up.
pub async fn poll_until_terminal<S: GmpStream>(
    client: &mut GmpClient<S>,
    task_id: &str,
    interval: Duration,
    max_wait: Option<Duration>,
) -> Result<(TaskProgress, u32)> {
    let start = Instant::now();
    let mut polls = 0u32;
    loop {
        let p = client
            .get_task(task_id)
            .await
            .with_context(|| format!("failed to poll task {task_id}"))?;
        polls += 1;
        println!("Status: {}, progress: {}%", p.status, p.progress);
        if p.status.is_terminal() {
            info!(%task_id, status = %p.status, polls, "task finished");
            return Ok((p, polls));
        }
        if let Some(limit) = max_wait {
            if start.elapsed() >= limit {
                bail!(
                    "task {task_id} still {} after {}s",
                    p.status,
                    limit.as_secs()
                );
            }
        }
        debug!(?interval, "waiting before next poll");
        time::sleep(interval).await;
    }
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
