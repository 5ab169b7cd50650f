use crate::analytics::StatsPeriod;
use crate::service::TranslationService;
use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info};

/// What one maintenance pass removed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaintenanceReport {
    pub cache_entries_purged: usize,
    pub jobs_purged: usize,
    pub events_pruned: usize,
}

/// Start the maintenance job on `cron_expr` (6 fields, seconds first)
pub async fn start_scheduler(
    cron_expr: &str,
    service: Arc<TranslationService>,
    job_retention: Duration,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    info!("Scheduling maintenance (cron: {})", cron_expr);
    let job = Job::new_async(cron_expr, move |_uuid, _l| {
        let service = Arc::clone(&service);
        Box::pin(async move {
            debug!("⏰ Maintenance triggered");
            run_maintenance(&service, job_retention).await;
        })
    })
    .with_context(|| format!("Invalid MAINTENANCE_CRON '{}'", cron_expr))?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    info!("✓ Scheduler started");

    Ok(scheduler)
}

/// Purge expired cache entries, finished jobs past retention and analytics
/// events outside the longest reporting window.
pub async fn run_maintenance(
    service: &TranslationService,
    job_retention: Duration,
) -> MaintenanceReport {
    let retention =
        ChronoDuration::from_std(job_retention).unwrap_or_else(|_| ChronoDuration::hours(24));

    let report = MaintenanceReport {
        cache_entries_purged: service.cache().purge_expired().await,
        jobs_purged: service.queue().purge_finished(retention).await,
        events_pruned: service
            .analytics()
            .prune_older_than(StatsPeriod::longest().duration())
            .await,
    };

    if report != MaintenanceReport::default() {
        info!(
            "✓ Maintenance: purged {} cache entries, {} jobs, {} analytics events",
            report.cache_entries_purged, report.jobs_purged, report.events_pruned
        );
    }
    report
}
