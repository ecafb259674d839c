use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, Duration, Instant};
use parking_lot::Mutex;

/// Paces outgoing catalog requests.
///
/// Caps in-flight requests and enforces a minimum gap between request starts.
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    last_request: Mutex<Option<Instant>>,
    min_delay: Duration,
}

impl RateLimiter {
    /// # Arguments
    /// * `max_concurrent` - Maximum number of in-flight requests
    /// * `requests_per_minute` - Maximum request starts per minute
    pub fn new(max_concurrent: usize, requests_per_minute: u32) -> Self {
        let min_delay_ms = 60_000 / requests_per_minute.max(1) as u64;
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            last_request: Mutex::new(None),
            min_delay: Duration::from_millis(min_delay_ms),
        }
    }

    /// Waits for a free slot and for the minimum gap since the previous request.
    ///
    /// The slot is released when the returned guard is dropped.
    pub async fn acquire(&self) -> RateLimitGuard {
        let permit = self.semaphore.clone().acquire_owned().await.ok();

        // Reserve the next start time under the lock, sleep outside it
        let wait_time = {
            let mut last = self.last_request.lock();
            let now = Instant::now();
            let next_start = match *last {
                Some(previous) if previous + self.min_delay > now => previous + self.min_delay,
                _ => now,
            };
            *last = Some(next_start);
            next_start.saturating_duration_since(now)
        };

        if !wait_time.is_zero() {
            sleep(wait_time).await;
        }

        RateLimitGuard { _permit: permit }
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Holds a request slot until dropped.
pub struct RateLimitGuard {
    _permit: Option<OwnedSemaphorePermit>,
}
