use crate::config::ReconciliationConfig;
use crate::errors::AppError;
use crate::jobs::price_reconciliation_job::{self, PriceReconciliationJob};
use tokio_cron_scheduler::{JobScheduler, Job};
use tracing::{info, error};
use chrono::Utc;
use std::sync::Arc;

// Context passed to job functions
#[derive(Clone)]
pub struct JobContext {
    pub reconciliation: Arc<PriceReconciliationJob>,
}

pub struct JobSchedulerService {
    scheduler: JobScheduler,
    context: JobContext,
}

impl JobSchedulerService {
    pub async fn new(reconciliation: Arc<PriceReconciliationJob>) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::External(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            context: JobContext { reconciliation },
        })
    }

    /// Start all scheduled jobs
    pub async fn start(&mut self, config: &ReconciliationConfig) -> Result<(), AppError> {
        info!("🚀 Starting job scheduler...");

        if config.test_mode {
            info!("⚠️  JOB SCHEDULER IN TEST MODE - reconciliation runs on {}", config.schedule);
        }

        let description = schedule_description(config);

        self.schedule_job(
            &config.schedule,
            "reconcile_prices",
            &description,
            price_reconciliation_job::reconcile_all_prices,
        ).await?;

        self.scheduler.start()
            .await
            .map_err(|e| AppError::External(format!("Failed to start scheduler: {}", e)))?;

        info!("✅ Job scheduler started successfully");
        Ok(())
    }

    /// Stop the scheduler gracefully
    pub async fn stop(&mut self) -> Result<(), AppError> {
        info!("🛑 Stopping job scheduler...");
        self.scheduler.shutdown()
            .await
            .map_err(|e| AppError::External(format!("Failed to stop scheduler: {}", e)))?;
        info!("✅ Job scheduler stopped");
        Ok(())
    }

    /// Runs a job once, outside its schedule.
    pub async fn trigger<F, Fut>(&self, job_name: &str, job_fn: F)
    where
        F: Fn(JobContext) -> Fut,
        Fut: std::future::Future<Output = Result<JobResult, AppError>>,
    {
        execute_job_with_tracking(job_name, self.context.clone(), Arc::new(job_fn)).await;
    }

    /// Helper to schedule a job with tracking
    async fn schedule_job<F, Fut>(
        &mut self,
        schedule: &str,
        job_name: &'static str,
        description: &str,
        job_fn: F,
    ) -> Result<(), AppError>
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<JobResult, AppError>> + Send + 'static,
    {
        let context = self.context.clone();
        let job_fn = Arc::new(job_fn);

        let job = Job::new_async(schedule, move |_uuid, _l| {
            let context = context.clone();
            let job_fn = job_fn.clone();
            Box::pin(async move {
                execute_job_with_tracking(job_name, context, job_fn).await;
            })
        })
        .map_err(|e| AppError::External(format!("Failed to create job {}: {}", job_name, e)))?;

        self.scheduler.add(job)
            .await
            .map_err(|e| AppError::External(format!("Failed to add job {}: {}", job_name, e)))?;

        info!("📅 Scheduled: {} - {} [cron: {}]", job_name, description, schedule);
        Ok(())
    }
}

// The test-mode default is resolved by ReconciliationConfig::from_env
fn schedule_description(config: &ReconciliationConfig) -> String {
    if config.test_mode {
        format!("Cron {} (TEST MODE)", config.schedule)
    } else {
        format!("Cron {}", config.schedule)
    }
}

// Job tracking wrapper
async fn execute_job_with_tracking<F, Fut>(
    job_name: &str,
    context: JobContext,
    job_fn: Arc<F>,
) where
    F: Fn(JobContext) -> Fut,
    Fut: std::future::Future<Output = Result<JobResult, AppError>>,
{
    info!("🏃 Starting job: {}", job_name);
    let started_at = Utc::now();

    let result = job_fn(context).await;

    let duration_ms = (Utc::now() - started_at).num_milliseconds();

    match result {
        Ok(job_result) => {
            info!(
                "✅ Job completed: {} (processed: {}, failed: {}, duration: {}ms)",
                job_name, job_result.items_processed, job_result.items_failed, duration_ms
            );
        }
        Err(e) => {
            error!("❌ Job failed: {} - {} (duration: {}ms)", job_name, e, duration_ms);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub items_processed: i32,
    pub items_failed: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_names_configured_schedule_in_test_mode() {
        let config = ReconciliationConfig {
            schedule: "0 */5 * * * *".to_string(),
            test_mode: true,
            ..ReconciliationConfig::default()
        };

        assert_eq!(schedule_description(&config), "Cron 0 */5 * * * * (TEST MODE)");
    }
}
