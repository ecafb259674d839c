use bigdecimal::{BigDecimal, Signed};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::price_entry::round_cents;

/// Detected price drift for one card within one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChangeRecord {
    pub timestamp: DateTime<Utc>,
    pub collection_name: String,
    pub card_name: String,
    pub old_price: BigDecimal,
    pub new_price: BigDecimal,
    pub difference: BigDecimal,
    pub message: String,
}

impl PriceChangeRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        collection_name: &str,
        card_name: &str,
        old_price: BigDecimal,
        new_price: BigDecimal,
    ) -> Self {
        let difference = round_cents(&(&new_price - &old_price));
        let direction = if difference.is_negative() { "decreased" } else { "increased" };
        let message = format!(
            "Price of {} in {} {} from {} to {} ({})",
            card_name,
            collection_name,
            direction,
            round_cents(&old_price),
            round_cents(&new_price),
            difference
        );

        Self {
            timestamp,
            collection_name: collection_name.to_string(),
            card_name: card_name.to_string(),
            old_price,
            new_price,
            difference,
            message,
        }
    }

    /// One line for the append-only change log file.
    pub fn to_log_line(&self) -> String {
        format!(
            "[{}] {} / {}: {} -> {} (diff {}) {}",
            self.timestamp.to_rfc3339(),
            self.collection_name,
            self.card_name,
            round_cents(&self.old_price),
            round_cents(&self.new_price),
            self.difference,
            self.message
        )
    }
}
