use std::time::Duration;

use crate::errors::AppError;

const DEFAULT_PRICE_API_BASE_URL: &str = "https://db.ygoprodeck.com/api/v7";
const DEFAULT_RECONCILE_SCHEDULE: &str = "0 0 * * * *";
const TEST_MODE_RECONCILE_SCHEDULE: &str = "0 */1 * * * *";
const DEFAULT_CHANGE_LOG_PATH: &str = "logs/price_changes.log";
const DEFAULT_CHANGE_LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;

/// Runtime settings for the reconciliation job, read from the environment.
#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    pub price_api_base_url: String,
    pub fetch_timeout: Duration,
    pub fetch_concurrency: usize,
    pub requests_per_minute: u32,
    pub schedule: String,
    pub test_mode: bool,
    pub run_on_startup: bool,
    pub change_log_path: String,
    pub change_log_max_bytes: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            price_api_base_url: DEFAULT_PRICE_API_BASE_URL.to_string(),
            fetch_timeout: Duration::from_secs(10),
            fetch_concurrency: 4,
            requests_per_minute: 600,
            schedule: DEFAULT_RECONCILE_SCHEDULE.to_string(),
            test_mode: false,
            run_on_startup: false,
            change_log_path: DEFAULT_CHANGE_LOG_PATH.to_string(),
            change_log_max_bytes: DEFAULT_CHANGE_LOG_MAX_BYTES,
        }
    }
}

impl ReconciliationConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let test_mode = env_parse("JOB_SCHEDULER_TEST_MODE", false);

        let schedule = resolve_schedule(std::env::var("RECONCILE_SCHEDULE").ok(), test_mode);

        Self {
            price_api_base_url: std::env::var("PRICE_API_BASE_URL")
                .unwrap_or(defaults.price_api_base_url),
            fetch_timeout: Duration::from_secs(env_parse("PRICE_FETCH_TIMEOUT_SECS", 10)),
            fetch_concurrency: env_parse("PRICE_FETCH_CONCURRENCY", defaults.fetch_concurrency),
            requests_per_minute: env_parse("PRICE_REQUESTS_PER_MINUTE", defaults.requests_per_minute),
            schedule,
            test_mode,
            run_on_startup: env_parse("RECONCILE_ON_STARTUP", false),
            change_log_path: std::env::var("CHANGE_LOG_PATH")
                .unwrap_or(defaults.change_log_path),
            change_log_max_bytes: env_parse("CHANGE_LOG_MAX_BYTES", defaults.change_log_max_bytes),
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.fetch_concurrency == 0 {
            return Err(AppError::Config("PRICE_FETCH_CONCURRENCY must be at least 1".into()));
        }
        if self.fetch_timeout.is_zero() {
            return Err(AppError::Config("PRICE_FETCH_TIMEOUT_SECS must be at least 1".into()));
        }
        if self.requests_per_minute == 0 {
            return Err(AppError::Config("PRICE_REQUESTS_PER_MINUTE must be at least 1".into()));
        }
        url::Url::parse(&self.price_api_base_url)
            .map_err(|e| AppError::Config(format!("PRICE_API_BASE_URL is invalid: {}", e)))?;
        Ok(())
    }
}

/// Test mode runs the job every minute unless a schedule is given explicitly.
fn resolve_schedule(explicit: Option<String>, test_mode: bool) -> String {
    match explicit {
        Some(schedule) => schedule,
        None if test_mode => TEST_MODE_RECONCILE_SCHEDULE.to_string(),
        None => DEFAULT_RECONCILE_SCHEDULE.to_string(),
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
