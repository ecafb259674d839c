use bigdecimal::{BigDecimal, Signed};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::price_change::PriceChangeRecord;
use crate::models::price_entry::{round_cents, PriceEntry};

// A card held in a collection, together with its append-only price histories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    pub quantity: i32,
    pub acquired_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub latest_price: Option<PriceEntry>,
    pub last_saved_price: Option<PriceEntry>,
    pub price_history: Vec<PriceEntry>,
    pub value_history: Vec<PriceEntry>,
    pub daily_price_history: Vec<PriceEntry>,
    pub price_change_history: Vec<PriceChangeRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCard {
    pub name: String,
    pub price: BigDecimal,
    pub quantity: i32,
    pub acquired_at: DateTime<Utc>,
}

impl Card {
    pub fn new(collection_id: Uuid, data: CreateCard) -> Result<Self, AppError> {
        if data.name.trim().is_empty() {
            return Err(AppError::Validation("Card name cannot be empty".into()));
        }
        if data.quantity < 0 {
            return Err(AppError::Validation(format!(
                "Card quantity cannot be negative: {}",
                data.quantity
            )));
        }
        if data.price.is_negative() {
            return Err(AppError::Validation(format!(
                "Card price cannot be negative: {}",
                data.price
            )));
        }

        let price = round_cents(&data.price);
        let first_observation = PriceEntry::derived(price.clone(), data.acquired_at);

        Ok(Self {
            id: Uuid::new_v4(),
            collection_id,
            name: data.name,
            price,
            quantity: data.quantity,
            acquired_at: data.acquired_at,
            updated_at: data.acquired_at,
            latest_price: Some(first_observation.clone()),
            last_saved_price: None,
            price_history: vec![first_observation],
            value_history: Vec::new(),
            daily_price_history: Vec::new(),
            price_change_history: Vec::new(),
        })
    }

    /// Price the reconciliation job compares against.
    pub fn reference_price(&self) -> &BigDecimal {
        self.latest_price
            .as_ref()
            .map(|entry| &entry.value)
            .unwrap_or(&self.price)
    }

    pub fn held_value(&self) -> BigDecimal {
        if self.quantity <= 0 {
            return BigDecimal::from(0);
        }
        round_cents(&(&self.price * BigDecimal::from(self.quantity)))
    }
}
