use std::sync::Arc;
use chrono::{DateTime, Utc, Duration};
use dashmap::DashMap;

/// Information about a failed price lookup for a card name
#[derive(Debug, Clone)]
pub struct FailureInfo {
    pub failed_at: DateTime<Utc>,
    pub error_type: FailureType,
    pub ttl_hours: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureType {
    NotFound,       // Catalog has no price for this name
    RateLimited,    // Temporary rate limit
    ApiError,       // Network, timeout and parse errors
}

impl FailureType {
    fn ttl_hours(&self) -> i64 {
        match self {
            FailureType::NotFound => 24,
            FailureType::RateLimited => 1,
            FailureType::ApiError => 6,
        }
    }
}

/// Thread-safe cache of card names whose lookups recently failed,
/// so a reconciliation pass does not hammer the catalog with known misses.
#[derive(Clone, Default)]
pub struct FailureCache {
    cache: Arc<DashMap<String, FailureInfo>>,
}

impl FailureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the failure if the name is cached and still within its TTL at `now`
    pub fn is_failed_at(&self, card_name: &str, now: DateTime<Utc>) -> Option<FailureInfo> {
        let key = normalize(card_name);
        if let Some(entry) = self.cache.get(&key) {
            let info = entry.value().clone();
            let expiry = info.failed_at + Duration::hours(info.ttl_hours);

            if now < expiry {
                return Some(info);
            }
            drop(entry); // Release the read lock before removing
            self.cache.remove(&key);
        }
        None
    }

    pub fn record_failure_at(&self, card_name: &str, error_type: FailureType, now: DateTime<Utc>) {
        let info = FailureInfo {
            failed_at: now,
            ttl_hours: error_type.ttl_hours(),
            error_type,
        };
        self.cache.insert(normalize(card_name), info);
    }

    /// Clear a name after a successful lookup
    pub fn clear(&self, card_name: &str) {
        self.cache.remove(&normalize(card_name));
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

fn normalize(card_name: &str) -> String {
    card_name.trim().to_lowercase()
}
