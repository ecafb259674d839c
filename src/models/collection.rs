use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::chart::{ChartMap, WindowMap};
use crate::models::price_change::PriceChangeRecord;
use crate::models::price_entry::PriceEntry;

// A user's named group of cards plus its derived chart data and change log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub total_price: BigDecimal,
    pub total_quantity: i32,
    pub statistics: CollectionStatistics,
    pub window_series: WindowMap,
    pub chart_data: ChartMap,
    pub collection_price_change_history: Vec<PriceChangeRecord>,
    pub collection_value_history: Vec<PriceEntry>,
    pub last_no_change_log_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStatistics {
    pub high_point: BigDecimal,
    pub low_point: BigDecimal,
    pub average_price: BigDecimal,
    pub percentage_change: BigDecimal,
}

impl Collection {
    pub fn new(user_id: Uuid, name: String) -> Result<Self, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("Collection name cannot be empty".into()));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            name,
            total_price: BigDecimal::zero(),
            total_quantity: 0,
            statistics: CollectionStatistics::default(),
            window_series: WindowMap::new(),
            chart_data: ChartMap::new(),
            collection_price_change_history: Vec::new(),
            collection_value_history: Vec::new(),
            last_no_change_log_at: None,
            updated_at: Utc::now(),
        })
    }
}
