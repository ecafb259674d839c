pub mod bucketing_service;
pub mod change_log;
pub mod chart_service;
pub mod continuity_service;
pub mod failure_cache;
pub mod history_service;
pub mod job_scheduler_service;
pub mod price_event_service;
pub mod rate_limiter;
pub mod reconciliation_service;
