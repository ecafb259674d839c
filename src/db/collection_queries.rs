use std::collections::BTreeMap;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{error, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    window_map_from_labels, Card, ChartMap, Collection, CollectionStatistics, PriceChangeRecord,
    PriceEntry, User, WindowMap,
};
use crate::services::history_service::{decode_history, encode_history, RawPriceEntry};
use crate::store::repository::CollectionRepository;

/// PostgreSQL-backed repository. Histories live in JSONB columns.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct CardRow {
    id: Uuid,
    collection_id: Uuid,
    name: String,
    price: BigDecimal,
    quantity: i32,
    acquired_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    latest_price: Option<Json<RawPriceEntry>>,
    last_saved_price: Option<Json<RawPriceEntry>>,
    price_history: Json<Vec<RawPriceEntry>>,
    value_history: Json<Vec<RawPriceEntry>>,
    daily_price_history: Json<Vec<RawPriceEntry>>,
    price_change_history: Json<Vec<PriceChangeRecord>>,
}

impl CardRow {
    fn into_card(self) -> Option<Card> {
        if self.quantity < 0 {
            warn!("Skipping card {} ({}): negative quantity {}", self.id, self.name, self.quantity);
            return None;
        }

        let owner = format!("card {}", self.id);
        let single = |raw: Option<Json<RawPriceEntry>>| -> Option<PriceEntry> {
            raw.and_then(|Json(entry)| decode_history(&owner, &[entry]).pop())
        };

        Some(Card {
            latest_price: single(self.latest_price),
            last_saved_price: single(self.last_saved_price),
            price_history: decode_history(&owner, &self.price_history.0),
            value_history: decode_history(&owner, &self.value_history.0),
            daily_price_history: decode_history(&owner, &self.daily_price_history.0),
            price_change_history: self.price_change_history.0,
            id: self.id,
            collection_id: self.collection_id,
            name: self.name,
            price: self.price,
            quantity: self.quantity,
            acquired_at: self.acquired_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CollectionRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    total_price: BigDecimal,
    total_quantity: i32,
    statistics: Json<serde_json::Value>,
    window_series: Json<BTreeMap<String, Vec<RawPriceEntry>>>,
    chart_data: Json<serde_json::Value>,
    collection_price_change_history: Json<Vec<PriceChangeRecord>>,
    collection_value_history: Json<Vec<RawPriceEntry>>,
    last_no_change_log_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl CollectionRow {
    fn into_collection(self) -> Collection {
        let owner = format!("collection {}", self.id);

        // Derived data is regenerated on the next pass, so bad stored copies are only logged
        let window_series = self
            .window_series
            .0
            .into_iter()
            .map(|(label, raw)| {
                let points = decode_history(&owner, &raw);
                (label, points)
            });
        let window_series = window_map_from_labels(window_series).unwrap_or_else(|e| {
            warn!("Discarding stored window series of {}: {}", owner, e);
            WindowMap::new()
        });

        let chart_data = serde_json::from_value::<ChartMap>(self.chart_data.0).unwrap_or_else(|e| {
            warn!("Discarding stored chart data of {}: {}", owner, e);
            ChartMap::new()
        });

        let statistics = serde_json::from_value::<CollectionStatistics>(self.statistics.0)
            .unwrap_or_default();

        Collection {
            collection_value_history: decode_history(&owner, &self.collection_value_history.0),
            collection_price_change_history: self.collection_price_change_history.0,
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            total_price: self.total_price,
            total_quantity: self.total_quantity,
            statistics,
            window_series,
            chart_data,
            last_no_change_log_at: self.last_no_change_log_at,
            updated_at: self.updated_at,
        }
    }
}

fn encode_window_series(map: &WindowMap) -> BTreeMap<String, Vec<RawPriceEntry>> {
    map.iter()
        .map(|(range, series)| (range.as_str().to_string(), encode_history(&series.points)))
        .collect()
}

#[async_trait]
impl CollectionRepository for PgRepository {
    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>("SELECT id, username FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn list_collections_for(&self, user: &User) -> Result<Vec<Collection>, AppError> {
        let rows = sqlx::query_as::<_, CollectionRow>(
            r#"
            SELECT id, user_id, name, total_price, total_quantity, statistics,
                   window_series, chart_data, collection_price_change_history,
                   collection_value_history, last_no_change_log_at, updated_at
            FROM collections
            WHERE user_id = $1
            ORDER BY name
            "#,
        )
        .bind(user.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CollectionRow::into_collection).collect())
    }

    async fn list_cards_for(&self, collection: &Collection) -> Result<Vec<Card>, AppError> {
        let rows = sqlx::query_as::<_, CardRow>(
            r#"
            SELECT id, collection_id, name, price, quantity, acquired_at, updated_at,
                   latest_price, last_saved_price, price_history, value_history,
                   daily_price_history, price_change_history
            FROM cards
            WHERE collection_id = $1
            ORDER BY acquired_at, id
            "#,
        )
        .bind(collection.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(CardRow::into_card).collect())
    }

    async fn save_card(&self, card: &Card) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE cards
            SET price = $2,
                quantity = $3,
                updated_at = $4,
                latest_price = $5,
                last_saved_price = $6,
                price_history = $7,
                value_history = $8,
                daily_price_history = $9,
                price_change_history = $10
            WHERE id = $1
            "#,
        )
        .bind(card.id)
        .bind(&card.price)
        .bind(card.quantity)
        .bind(card.updated_at)
        .bind(card.latest_price.as_ref().map(|p| Json(RawPriceEntry::from(p))))
        .bind(card.last_saved_price.as_ref().map(|p| Json(RawPriceEntry::from(p))))
        .bind(Json(encode_history(&card.price_history)))
        .bind(Json(encode_history(&card.value_history)))
        .bind(Json(encode_history(&card.daily_price_history)))
        .bind(Json(&card.price_change_history))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to save card {}: {}", card.id, e);
            AppError::Db(e)
        })
        .and_then(|result| {
            if result.rows_affected() == 0 {
                Err(AppError::NotFound(format!("Card {} not found", card.id)))
            } else {
                Ok(())
            }
        })
    }

    async fn save_collection(&self, collection: &Collection) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE collections
            SET total_price = $2,
                total_quantity = $3,
                statistics = $4,
                window_series = $5,
                chart_data = $6,
                collection_price_change_history = $7,
                collection_value_history = $8,
                last_no_change_log_at = $9,
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(collection.id)
        .bind(&collection.total_price)
        .bind(collection.total_quantity)
        .bind(Json(&collection.statistics))
        .bind(Json(encode_window_series(&collection.window_series)))
        .bind(Json(&collection.chart_data))
        .bind(Json(&collection.collection_price_change_history))
        .bind(Json(encode_history(&collection.collection_value_history)))
        .bind(collection.last_no_change_log_at)
        .bind(collection.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to save collection {}: {}", collection.id, e);
            AppError::Db(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Collection {} not found", collection.id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeRange;
    use crate::services::chart_service;
    use serde_json::json;

    fn card_row(quantity: i32) -> CardRow {
        CardRow {
            id: Uuid::new_v4(),
            collection_id: Uuid::new_v4(),
            name: "Dark Magician".to_string(),
            price: BigDecimal::from(10),
            quantity,
            acquired_at: Utc::now(),
            updated_at: Utc::now(),
            latest_price: Some(Json(RawPriceEntry {
                value: Some(json!("10.00")),
                timestamp: Some("2024-05-01T10:00:00Z".to_string()),
            })),
            last_saved_price: Some(Json(RawPriceEntry { value: None, timestamp: None })),
            price_history: Json(vec![
                RawPriceEntry {
                    value: Some(json!(9.5)),
                    timestamp: Some("2024-04-01T10:00:00Z".to_string()),
                },
                RawPriceEntry {
                    value: Some(json!("oops")),
                    timestamp: Some("2024-04-02T10:00:00Z".to_string()),
                },
            ]),
            value_history: Json(Vec::new()),
            daily_price_history: Json(Vec::new()),
            price_change_history: Json(Vec::new()),
        }
    }

    #[test]
    fn test_card_row_drops_corrupt_history_entries() {
        let card = card_row(2).into_card().unwrap();
        assert_eq!(card.price_history.len(), 1);
        assert!(card.latest_price.is_some());
        assert!(card.last_saved_price.is_none());
    }

    #[test]
    fn test_card_row_with_negative_quantity_is_skipped() {
        assert!(card_row(-1).into_card().is_none());
    }

    #[test]
    fn test_collection_row_restores_window_series() {
        let map = chart_service::build_window_map(&[], Utc::now());
        let row = CollectionRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Binder".to_string(),
            total_price: BigDecimal::from(0),
            total_quantity: 0,
            statistics: Json(json!({})),
            window_series: Json(encode_window_series(&map)),
            chart_data: Json(serde_json::to_value(chart_service::assemble(&map)).unwrap()),
            collection_price_change_history: Json(Vec::new()),
            collection_value_history: Json(Vec::new()),
            last_no_change_log_at: None,
            updated_at: Utc::now(),
        };

        let collection = row.into_collection();
        assert_eq!(collection.window_series, map);
        assert_eq!(collection.chart_data.len(), 7);
        assert!(collection.window_series[&TimeRange::Year].is_complete());
    }

    #[test]
    fn test_collection_row_with_unknown_label_resets_series() {
        let mut stored = BTreeMap::new();
        stored.insert("2w".to_string(), Vec::new());

        let row = CollectionRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Binder".to_string(),
            total_price: BigDecimal::from(0),
            total_quantity: 0,
            statistics: Json(json!({"unexpected": true})),
            window_series: Json(stored),
            chart_data: Json(json!([])),
            collection_price_change_history: Json(Vec::new()),
            collection_value_history: Json(Vec::new()),
            last_no_change_log_at: None,
            updated_at: Utc::now(),
        };

        let collection = row.into_collection();
        assert!(collection.window_series.is_empty());
        assert!(collection.chart_data.is_empty());
        assert_eq!(collection.statistics, CollectionStatistics::default());
    }
}
