use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use cardfolio::config::ReconciliationConfig;
use cardfolio::db::PgRepository;
use cardfolio::external::ygoprodeck::YgoProDeckProvider;
use cardfolio::jobs::price_reconciliation_job::{self, PriceReconciliationJob};
use cardfolio::logging::{init_logging, LoggingConfig};
use cardfolio::services::change_log::FileChangeLog;
use cardfolio::services::job_scheduler_service::JobSchedulerService;
use cardfolio::services::rate_limiter::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    let logging_config = LoggingConfig::from_env();
    logging_config.validate()?;
    init_logging(logging_config).map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let config = ReconciliationConfig::from_env();
    config.validate()?;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    let repository = PgRepository::new(pool);
    repository.migrate().await?;

    let rate_limiter = Arc::new(RateLimiter::new(
        config.fetch_concurrency,
        config.requests_per_minute,
    ));
    let price_source = YgoProDeckProvider::new(&config.price_api_base_url, rate_limiter);
    tracing::info!("📊 Using price source: {}", config.price_api_base_url);

    let change_log = FileChangeLog::new(&config.change_log_path, config.change_log_max_bytes);

    let job = Arc::new(PriceReconciliationJob::new(
        Arc::new(repository),
        Arc::new(price_source),
        Arc::new(change_log),
        &config,
    ));

    let mut scheduler = JobSchedulerService::new(job).await?;
    scheduler.start(&config).await?;

    if config.run_on_startup {
        scheduler
            .trigger("reconcile_prices", price_reconciliation_job::reconcile_all_prices)
            .await;
    }

    tracing::info!("🚀 Cardfolio reconciliation service running, press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    scheduler.stop().await?;
    Ok(())
}
