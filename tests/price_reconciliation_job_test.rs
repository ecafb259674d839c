/// Price Reconciliation Job Tests
///
/// End-to-end passes of the reconciliation job over an in-memory repository
/// with a scripted price source: change detection, skipped lookups, save
/// failures, single-flight runs and chart regeneration.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use parking_lot::Mutex;

use cardfolio::config::ReconciliationConfig;
use cardfolio::errors::AppError;
use cardfolio::external::price_source::{CardPriceSource, PriceSourceError};
use cardfolio::jobs::price_reconciliation_job::{PriceReconciliationJob, RunOutcome, RunSummary};
use cardfolio::models::{definitions, Card, Collection, CreateCard, User};
use cardfolio::services::change_log::MemoryChangeLog;
use cardfolio::store::{CollectionRepository, InMemoryRepository};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Script {
    Price(BigDecimal),
    NotFound,
    Fail,
    Hang,
}

#[derive(Default)]
struct ScriptedSource {
    scripts: Mutex<HashMap<String, Script>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn set(&self, card_name: &str, script: Script) {
        self.scripts.lock().insert(card_name.to_string(), script);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CardPriceSource for ScriptedSource {
    async fn fetch_price(&self, card_name: &str) -> Result<Option<BigDecimal>, PriceSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().get(card_name).cloned().unwrap_or(Script::NotFound);
        match script {
            Script::Price(price) => Ok(Some(price)),
            Script::NotFound => Ok(None),
            Script::Fail => Err(PriceSourceError::BadResponse("HTTP 500".to_string())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(None)
            }
        }
    }
}

/// Repository whose card saves fail for selected card names.
struct FlakyRepository {
    inner: Arc<InMemoryRepository>,
    failing_cards: HashSet<String>,
}

#[async_trait]
impl CollectionRepository for FlakyRepository {
    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.inner.list_users().await
    }

    async fn list_collections_for(&self, user: &User) -> Result<Vec<Collection>, AppError> {
        self.inner.list_collections_for(user).await
    }

    async fn list_cards_for(&self, collection: &Collection) -> Result<Vec<Card>, AppError> {
        self.inner.list_cards_for(collection).await
    }

    async fn save_card(&self, card: &Card) -> Result<(), AppError> {
        if self.failing_cards.contains(&card.name) {
            return Err(AppError::External("connection reset".to_string()));
        }
        self.inner.save_card(card).await
    }

    async fn save_collection(&self, collection: &Collection) -> Result<(), AppError> {
        self.inner.save_collection(collection).await
    }
}

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

struct Fixture {
    repo: Arc<InMemoryRepository>,
    source: Arc<ScriptedSource>,
    change_log: Arc<MemoryChangeLog>,
    collection_id: uuid::Uuid,
    card_ids: Vec<uuid::Uuid>,
}

/// One user with one collection holding the given (name, price, quantity) cards.
fn fixture(cards: &[(&str, &str, i32)]) -> Fixture {
    let repo = Arc::new(InMemoryRepository::new());
    let user = User::new("yugi".to_string());
    repo.insert_user(user.clone());

    let collection = Collection::new(user.id, "Binder".to_string()).unwrap();
    let collection_id = collection.id;
    repo.insert_collection(collection).unwrap();

    let mut card_ids = Vec::new();
    for (offset, (name, price, quantity)) in cards.iter().enumerate() {
        let card = Card::new(
            collection_id,
            CreateCard {
                name: name.to_string(),
                price: dec(price),
                quantity: *quantity,
                acquired_at: now() - ChronoDuration::days(3) + ChronoDuration::minutes(offset as i64),
            },
        )
        .unwrap();
        card_ids.push(card.id);
        repo.insert_card(card).unwrap();
    }

    Fixture {
        repo,
        source: Arc::new(ScriptedSource::default()),
        change_log: Arc::new(MemoryChangeLog::new()),
        collection_id,
        card_ids,
    }
}

fn config() -> ReconciliationConfig {
    ReconciliationConfig {
        fetch_timeout: Duration::from_millis(100),
        fetch_concurrency: 2,
        ..ReconciliationConfig::default()
    }
}

fn job_for(fx: &Fixture) -> PriceReconciliationJob {
    PriceReconciliationJob::new(fx.repo.clone(), fx.source.clone(), fx.change_log.clone(), &config())
}

async fn run_completed(job: &PriceReconciliationJob, at: DateTime<Utc>) -> RunSummary {
    match job.run_at(at).await.unwrap() {
        RunOutcome::Completed(summary) => summary,
        RunOutcome::Skipped => panic!("run was skipped"),
    }
}

// ---------------------------------------------------------------------------
// Change detection
// ---------------------------------------------------------------------------

#[cfg(test)]
mod change_detection {
    use super::*;

    #[tokio::test]
    async fn test_price_increase_produces_one_record() {
        let fx = fixture(&[("Dark Magician", "10.00", 2)]);
        fx.source.set("Dark Magician", Script::Price(dec("12.00")));
        let job = job_for(&fx);

        let summary = run_completed(&job, now()).await;

        assert_eq!(summary.cards_updated, 1);
        assert_eq!(summary.change_records.len(), 1);
        let record = &summary.change_records[0];
        assert_eq!(record.old_price, dec("10.00"));
        assert_eq!(record.new_price, dec("12.00"));
        assert_eq!(record.difference, dec("2.00"));
        assert_eq!(record.collection_name, "Binder");

        let card = fx.repo.card(fx.card_ids[0]).unwrap();
        assert_eq!(card.price, dec("12.00"));
        assert_eq!(card.updated_at, now());
        assert_eq!(card.latest_price.as_ref().unwrap().value, dec("12.00"));
        assert_eq!(card.last_saved_price.as_ref().unwrap().value, dec("10.00"));
        assert_eq!(card.price_change_history.len(), 1);
        assert_eq!(card.value_history.last().unwrap().value, dec("24.00"));

        let collection = fx.repo.collection(fx.collection_id).unwrap();
        assert_eq!(collection.total_price, dec("24.00"));
        assert_eq!(collection.collection_price_change_history.len(), 1);

        assert_eq!(fx.change_log.records().len(), 1);
    }

    #[tokio::test]
    async fn test_sub_cent_drift_is_ignored() {
        let fx = fixture(&[("Dark Magician", "10.00", 1)]);
        fx.source.set("Dark Magician", Script::Price(dec("10.001")));
        let job = job_for(&fx);

        let summary = run_completed(&job, now()).await;

        assert_eq!(summary.cards_checked, 1);
        assert!(summary.change_records.is_empty());
        assert_eq!(fx.repo.card(fx.card_ids[0]).unwrap().price, dec("10.00"));
        assert!(fx.change_log.records().is_empty());
    }

    #[tokio::test]
    async fn test_second_run_with_same_prices_records_nothing() {
        let fx = fixture(&[("Dark Magician", "10.00", 1), ("Kuriboh", "1.50", 3)]);
        fx.source.set("Dark Magician", Script::Price(dec("11.25")));
        fx.source.set("Kuriboh", Script::Price(dec("1.20")));
        let job = job_for(&fx);

        let first = run_completed(&job, now()).await;
        assert_eq!(first.change_records.len(), 2);

        let card_after_first = fx.repo.card(fx.card_ids[0]).unwrap();

        let second = run_completed(&job, now() + ChronoDuration::hours(1)).await;
        assert!(second.change_records.is_empty());
        assert_eq!(second.cards_updated, 0);

        let card_after_second = fx.repo.card(fx.card_ids[0]).unwrap();
        assert_eq!(card_after_first.price_history, card_after_second.price_history);
        assert_eq!(fx.change_log.records().len(), 2);
    }

    #[tokio::test]
    async fn test_price_decrease_message() {
        let fx = fixture(&[("Kuriboh", "1.50", 1)]);
        fx.source.set("Kuriboh", Script::Price(dec("1.20")));
        let job = job_for(&fx);

        let summary = run_completed(&job, now()).await;

        assert_eq!(summary.change_records[0].difference, dec("-0.30"));
        assert!(summary.change_records[0].message.contains("decreased"));
    }
}

// ---------------------------------------------------------------------------
// Unavailable prices
// ---------------------------------------------------------------------------

#[cfg(test)]
mod unavailable_prices {
    use super::*;

    #[tokio::test]
    async fn test_not_found_card_is_skipped() {
        let fx = fixture(&[("Unknown Promo", "5.00", 1), ("Kuriboh", "1.50", 1)]);
        fx.source.set("Unknown Promo", Script::NotFound);
        fx.source.set("Kuriboh", Script::Price(dec("2.00")));
        let job = job_for(&fx);

        let summary = run_completed(&job, now()).await;

        assert_eq!(summary.cards_checked, 2);
        assert_eq!(summary.cards_skipped, 1);
        assert_eq!(summary.cards_updated, 1);
        assert_eq!(fx.repo.card(fx.card_ids[0]).unwrap().price, dec("5.00"));
        assert_eq!(fx.repo.card(fx.card_ids[1]).unwrap().price, dec("2.00"));
    }

    #[tokio::test]
    async fn test_timed_out_lookup_is_skipped() {
        let fx = fixture(&[("Slow Card", "5.00", 1), ("Kuriboh", "1.50", 1)]);
        fx.source.set("Slow Card", Script::Hang);
        fx.source.set("Kuriboh", Script::Price(dec("2.00")));
        let job = job_for(&fx);

        let summary = run_completed(&job, now()).await;

        assert_eq!(summary.cards_skipped, 1);
        assert_eq!(summary.cards_updated, 1);
        assert_eq!(fx.repo.card(fx.card_ids[0]).unwrap().price, dec("5.00"));
    }

    #[tokio::test]
    async fn test_failed_lookup_is_not_retried_within_ttl() {
        let fx = fixture(&[("Flaky Card", "5.00", 1)]);
        fx.source.set("Flaky Card", Script::Fail);
        let job = job_for(&fx);

        let first = run_completed(&job, now()).await;
        assert_eq!(first.cards_skipped, 1);
        assert_eq!(fx.source.calls(), 1);

        fx.source.set("Flaky Card", Script::Price(dec("6.00")));
        let second = run_completed(&job, now()).await;

        assert_eq!(second.cards_skipped, 1);
        assert!(second.change_records.is_empty());
        assert_eq!(fx.source.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_is_retried_once_ttl_passes_on_run_clock() {
        let fx = fixture(&[("Flaky Card", "5.00", 1)]);
        fx.source.set("Flaky Card", Script::Fail);
        let job = job_for(&fx);

        run_completed(&job, now()).await;
        assert_eq!(fx.source.calls(), 1);

        fx.source.set("Flaky Card", Script::Price(dec("6.00")));
        let later = run_completed(&job, now() + ChronoDuration::hours(7)).await;

        assert_eq!(later.cards_skipped, 0);
        assert_eq!(later.cards_updated, 1);
        assert_eq!(fx.source.calls(), 2);
        assert_eq!(fx.repo.card(fx.card_ids[0]).unwrap().price, dec("6.00"));
    }
}

// ---------------------------------------------------------------------------
// Persistence and concurrency
// ---------------------------------------------------------------------------

#[cfg(test)]
mod persistence {
    use super::*;

    #[tokio::test]
    async fn test_save_failure_does_not_stop_the_run() {
        let fx = fixture(&[("Dark Magician", "10.00", 1), ("Kuriboh", "1.50", 1)]);
        fx.source.set("Dark Magician", Script::Price(dec("12.00")));
        fx.source.set("Kuriboh", Script::Price(dec("2.00")));

        let repository = Arc::new(FlakyRepository {
            inner: fx.repo.clone(),
            failing_cards: HashSet::from(["Dark Magician".to_string()]),
        });
        let job = PriceReconciliationJob::new(
            repository,
            fx.source.clone(),
            fx.change_log.clone(),
            &config(),
        );

        let summary = run_completed(&job, now()).await;

        assert_eq!(summary.save_failures, 1);
        assert_eq!(summary.collections_processed, 1);
        assert_eq!(fx.repo.card(fx.card_ids[0]).unwrap().price, dec("10.00"));
        assert_eq!(fx.repo.card(fx.card_ids[1]).unwrap().price, dec("2.00"));

        let collection = fx.repo.collection(fx.collection_id).unwrap();
        assert_eq!(collection.updated_at, now());
    }

    #[tokio::test]
    async fn test_overlapping_run_is_skipped() {
        let fx = fixture(&[("Kuriboh", "1.50", 1)]);
        fx.source.set("Kuriboh", Script::Price(dec("2.00")));
        let job = job_for(&fx);

        let permit = job.state().try_acquire().unwrap();
        assert!(matches!(job.run_at(now()).await.unwrap(), RunOutcome::Skipped));
        assert_eq!(fx.source.calls(), 0);

        drop(permit);
        assert!(matches!(job.run_at(now()).await.unwrap(), RunOutcome::Completed(_)));
        assert!(!job.state().is_running());
    }

    #[tokio::test]
    async fn test_collection_without_changes_logs_once_per_hour() {
        let fx = fixture(&[("Kuriboh", "1.50", 1)]);
        fx.source.set("Kuriboh", Script::Price(dec("1.50")));
        let job = job_for(&fx);

        run_completed(&job, now()).await;
        let first = fx.repo.collection(fx.collection_id).unwrap();
        assert_eq!(first.last_no_change_log_at, Some(now()));

        run_completed(&job, now() + ChronoDuration::minutes(30)).await;
        let second = fx.repo.collection(fx.collection_id).unwrap();
        assert_eq!(second.last_no_change_log_at, Some(now()));

        let later = now() + ChronoDuration::minutes(61);
        run_completed(&job, later).await;
        let third = fx.repo.collection(fx.collection_id).unwrap();
        assert_eq!(third.last_no_change_log_at, Some(later));
    }
}

// ---------------------------------------------------------------------------
// Chart regeneration
// ---------------------------------------------------------------------------

#[cfg(test)]
mod charts {
    use super::*;

    #[tokio::test]
    async fn test_every_window_has_its_required_points() {
        let fx = fixture(&[("Dark Magician", "10.00", 3), ("Kuriboh", "1.50", 2)]);
        fx.source.set("Dark Magician", Script::Price(dec("12.00")));
        fx.source.set("Kuriboh", Script::Price(dec("1.50")));
        let job = job_for(&fx);

        run_completed(&job, now()).await;

        let collection = fx.repo.collection(fx.collection_id).unwrap();
        assert_eq!(collection.window_series.len(), definitions().len());
        assert_eq!(collection.chart_data.len(), definitions().len());

        for def in definitions() {
            let series = &collection.window_series[&def.label];
            assert_eq!(series.points.len(), def.required_points, "window {}", def.label);

            let chart = &collection.chart_data[&def.label];
            assert_eq!(chart.id, def.label.as_str());
            assert_eq!(chart.points.len(), def.required_points);
        }
    }

    #[tokio::test]
    async fn test_empty_collection_still_gets_seeded_charts() {
        let fx = fixture(&[]);
        let job = job_for(&fx);

        let summary = run_completed(&job, now()).await;
        assert_eq!(summary.cards_checked, 0);

        let collection = fx.repo.collection(fx.collection_id).unwrap();
        assert_eq!(collection.total_price, BigDecimal::from(0));
        for def in definitions() {
            assert!(collection.window_series[&def.label].is_complete());
        }
    }
}
