//! Price Reconciliation Background Job
//!
//! Walks every user's collections, looks up the current market price of each
//! card, records drift of at least one cent, and regenerates each collection's
//! chart windows from its cards.
//!
//! # Job Schedule
//!
//! - **Production**: Hourly at :00 (0 0 * * * *), overridable with `RECONCILE_SCHEDULE`
//! - **Test Mode**: Every minute (0 */1 * * * *)
//!
//! # Processing Strategy
//!
//! 1. Load all users
//! 2. For each user, for each collection:
//!    - Load its cards and fetch their prices through a bounded, order-preserving
//!      fan-out, each fetch capped by a timeout
//!    - Apply each fetched price to its card in card order
//!    - Recompute totals, statistics and chart windows
//!    - Persist changed cards, then the collection
//! 3. Append all change records of the run to the change log
//!
//! # Error Handling
//!
//! - A card whose price cannot be fetched is skipped with a warning
//! - A failed save is logged and counted; the run moves on
//! - Collections are persisted one by one, so a crash mid-run keeps earlier
//!   collections' updates
//! - Only one run executes at a time; an overlapping trigger is logged and dropped

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::config::ReconciliationConfig;
use crate::errors::AppError;
use crate::external::price_source::{CardPriceSource, PriceSourceError};
use crate::models::{Card, Collection, PriceChangeRecord, User};
use crate::services::change_log::ChangeLogSink;
use crate::services::failure_cache::{FailureCache, FailureType};
use crate::services::job_scheduler_service::{JobContext, JobResult};
use crate::services::reconciliation_service;
use crate::store::repository::CollectionRepository;

/// Minimum gap between two "no changes" lines for the same collection.
const NO_CHANGE_LOG_INTERVAL_MINUTES: i64 = 60;

/// Single-flight guard shared by every trigger of the job.
#[derive(Debug, Default)]
pub struct JobState {
    running: AtomicBool,
}

impl JobState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the job as running. Returns `None` if a run is already in progress.
    pub fn try_acquire(self: &Arc<Self>) -> Option<RunPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit {
                state: Arc::clone(self),
            })
    }

    pub fn release(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Held for the duration of a run; releases the guard when dropped, including on
/// early returns and panics.
#[derive(Debug)]
pub struct RunPermit {
    state: Arc<JobState>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.state.release();
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Skipped,
    Completed(RunSummary),
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub users_processed: usize,
    pub collections_processed: usize,
    pub collections_failed: usize,
    pub cards_checked: usize,
    pub cards_updated: usize,
    pub cards_skipped: usize,
    pub save_failures: usize,
    pub change_records: Vec<PriceChangeRecord>,
}

impl From<&RunSummary> for JobResult {
    fn from(summary: &RunSummary) -> Self {
        JobResult {
            items_processed: summary.cards_checked as i32,
            items_failed: (summary.cards_skipped + summary.save_failures + summary.collections_failed)
                as i32,
        }
    }
}

pub struct PriceReconciliationJob {
    repository: Arc<dyn CollectionRepository>,
    price_source: Arc<dyn CardPriceSource>,
    change_log: Arc<dyn ChangeLogSink>,
    failure_cache: FailureCache,
    state: Arc<JobState>,
    fetch_timeout: Duration,
    fetch_concurrency: usize,
}

impl PriceReconciliationJob {
    pub fn new(
        repository: Arc<dyn CollectionRepository>,
        price_source: Arc<dyn CardPriceSource>,
        change_log: Arc<dyn ChangeLogSink>,
        config: &ReconciliationConfig,
    ) -> Self {
        Self {
            repository,
            price_source,
            change_log,
            failure_cache: FailureCache::new(),
            state: Arc::new(JobState::new()),
            fetch_timeout: config.fetch_timeout,
            fetch_concurrency: config.fetch_concurrency.max(1),
        }
    }

    pub fn state(&self) -> Arc<JobState> {
        Arc::clone(&self.state)
    }

    pub async fn run(&self) -> Result<RunOutcome, AppError> {
        self.run_at(Utc::now()).await
    }

    /// Runs one pass as of `now`. Overlapping calls return `RunOutcome::Skipped`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunOutcome, AppError> {
        let Some(_permit) = self.state.try_acquire() else {
            info!("⏭️ Price reconciliation skipped, already running");
            return Ok(RunOutcome::Skipped);
        };

        info!("💰 Starting price reconciliation");
        let started = Instant::now();
        let mut summary = RunSummary::default();

        let users = self.repository.list_users().await?;
        info!("Found {} users to reconcile", users.len());

        for user in &users {
            self.reconcile_user(user, now, &mut summary).await;
            summary.users_processed += 1;
        }

        if summary.change_records.is_empty() {
            debug!("No price changes in this run");
        } else if let Err(e) = self.change_log.append(&summary.change_records).await {
            error!(
                "❌ Failed to write {} change records to the change log: {}",
                summary.change_records.len(),
                e
            );
        }

        info!(
            "✅ Price reconciliation completed in {}ms: {} users, {} collections ({} failed), {} cards checked, {} updated, {} skipped, {} save failures",
            started.elapsed().as_millis(),
            summary.users_processed,
            summary.collections_processed,
            summary.collections_failed,
            summary.cards_checked,
            summary.cards_updated,
            summary.cards_skipped,
            summary.save_failures
        );

        Ok(RunOutcome::Completed(summary))
    }

    async fn reconcile_user(&self, user: &User, now: DateTime<Utc>, summary: &mut RunSummary) {
        let collections = match self.repository.list_collections_for(user).await {
            Ok(collections) => collections,
            Err(e) => {
                error!("❌ Failed to load collections for user {}: {}", user.username, e);
                return;
            }
        };

        for mut collection in collections {
            match self.reconcile_collection(&mut collection, now, summary).await {
                Ok(()) => summary.collections_processed += 1,
                Err(e) => {
                    error!(
                        "❌ Failed to reconcile collection {} of {}: {}",
                        collection.name, user.username, e
                    );
                    summary.collections_failed += 1;
                }
            }
        }
    }

    async fn reconcile_collection(
        &self,
        collection: &mut Collection,
        now: DateTime<Utc>,
        summary: &mut RunSummary,
    ) -> Result<(), AppError> {
        let mut cards = self.repository.list_cards_for(collection).await?;
        let prices = self.fetch_prices(&cards, now).await;

        let mut changes = Vec::new();
        let mut changed_cards = Vec::new();

        for (index, (card, fetched)) in cards.iter_mut().zip(prices).enumerate() {
            summary.cards_checked += 1;

            let Some(price) = fetched else {
                summary.cards_skipped += 1;
                continue;
            };

            if let Some(record) =
                reconciliation_service::apply_price_update(card, &collection.name, &price, now)
            {
                info!("📈 {}", record.message);
                changes.push(record);
                changed_cards.push(index);
            }
        }

        reconciliation_service::refresh_collection(collection, &cards, &changes, now);

        if changes.is_empty() {
            let due = collection.last_no_change_log_at.map_or(true, |last| {
                now - last > ChronoDuration::minutes(NO_CHANGE_LOG_INTERVAL_MINUTES)
            });
            if due {
                info!("No price changes for collection {}", collection.name);
                collection.last_no_change_log_at = Some(now);
            }
        }

        for index in changed_cards {
            let card = &cards[index];
            if let Err(e) = self.repository.save_card(card).await {
                error!("❌ Failed to save card {} ({}): {}", card.name, card.id, e);
                summary.save_failures += 1;
            }
        }

        if let Err(e) = self.repository.save_collection(collection).await {
            error!("❌ Failed to save collection {}: {}", collection.name, e);
            summary.save_failures += 1;
        }

        summary.cards_updated += changes.len();
        summary.change_records.extend(changes);
        Ok(())
    }

    /// Fetches prices for `cards`, at most `fetch_concurrency` at a time.
    /// The result is index-aligned with `cards`.
    async fn fetch_prices(&self, cards: &[Card], now: DateTime<Utc>) -> Vec<Option<BigDecimal>> {
        let lookups: Vec<_> = cards
            .iter()
            .map(|card| self.fetch_price(&card.name, now))
            .collect();

        stream::iter(lookups)
            .buffered(self.fetch_concurrency)
            .collect()
            .await
    }

    /// Failure cache TTLs are checked and recorded against the run clock.
    async fn fetch_price(&self, card_name: &str, now: DateTime<Utc>) -> Option<BigDecimal> {
        if let Some(failure) = self.failure_cache.is_failed_at(card_name, now) {
            debug!(
                "Skipping {} - recent lookup failure ({:?}) at {}",
                card_name, failure.error_type, failure.failed_at
            );
            return None;
        }

        let result = match tokio::time::timeout(self.fetch_timeout, self.price_source.fetch_price(card_name)).await {
            Ok(result) => result,
            Err(_) => Err(PriceSourceError::Timeout(self.fetch_timeout.as_secs())),
        };

        match result {
            Ok(Some(price)) => {
                self.failure_cache.clear(card_name);
                Some(price)
            }
            Ok(None) => {
                warn!("⚠️ No market price found for {}, skipping", card_name);
                self.failure_cache.record_failure_at(card_name, FailureType::NotFound, now);
                None
            }
            Err(e) => {
                warn!("⚠️ Price lookup failed for {}: {}, skipping", card_name, e);
                let failure_type = match e {
                    PriceSourceError::RateLimited => FailureType::RateLimited,
                    _ => FailureType::ApiError,
                };
                self.failure_cache.record_failure_at(card_name, failure_type, now);
                None
            }
        }
    }
}

/// Scheduler entry point.
pub async fn reconcile_all_prices(ctx: JobContext) -> Result<JobResult, AppError> {
    match ctx.reconciliation.run().await? {
        RunOutcome::Skipped => Ok(JobResult {
            items_processed: 0,
            items_failed: 0,
        }),
        RunOutcome::Completed(summary) => Ok(JobResult::from(&summary)),
    }
}
