use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::{MonitorConfig, SchedulerConfig};
use crate::monitor::InventoryMonitor;
use crate::{AppError, Result};

/// Drives periodic monitoring batches on a cron schedule. One job, one
/// sequential batch per tick; the batch deadline keeps a slow tick from
/// overlapping the next one.
pub struct MonitorScheduler {
    scheduler: JobScheduler,
}

impl MonitorScheduler {
    pub async fn new(
        monitor: Arc<InventoryMonitor>,
        scheduler_config: &SchedulerConfig,
        monitor_config: &MonitorConfig,
    ) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Scheduler(e.to_string()))?;

        let batch_limit = monitor_config.batch_limit;
        let deadline_secs = monitor_config.batch_deadline_secs;

        let job = Job::new_async(scheduler_config.cron.as_str(), move |_uuid, _lock| {
            let monitor = Arc::clone(&monitor);
            Box::pin(async move {
                let deadline = (deadline_secs > 0)
                    .then(|| Instant::now() + Duration::from_secs(deadline_secs));
                match monitor.check_batch(batch_limit, deadline).await {
                    Ok(result) => info!(
                        checked = result.checked,
                        failed = result.failed,
                        alerts_fired = result.alerts_fired,
                        cancelled = result.cancelled,
                        "scheduled batch finished"
                    ),
                    Err(e) => error!(error = %e, "scheduled batch failed"),
                }
            })
        })
        .map_err(|e| AppError::Scheduler(e.to_string()))?;

        scheduler
            .add(job)
            .await
            .map_err(|e| AppError::Scheduler(e.to_string()))?;

        Ok(Self { scheduler })
    }

    pub async fn start(&mut self) -> Result<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::Scheduler(e.to_string()))?;
        info!("monitor scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Scheduler(e.to_string()))?;
        info!("monitor scheduler shut down");
        Ok(())
    }
}
