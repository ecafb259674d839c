use bigdecimal::{BigDecimal, Signed};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// A single price or value observation. Entries are immutable once appended to a history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub value: BigDecimal,
    pub timestamp: DateTime<Utc>,
}

impl PriceEntry {
    pub fn new(value: BigDecimal, timestamp: DateTime<Utc>) -> Result<Self, AppError> {
        if value.is_negative() {
            return Err(AppError::Validation(format!(
                "Price entry value cannot be negative: {}",
                value
            )));
        }
        Ok(Self { value, timestamp })
    }

    /// Builds an entry from values already known to be valid (derived sums, seeds).
    pub(crate) fn derived(value: BigDecimal, timestamp: DateTime<Utc>) -> Self {
        Self { value, timestamp }
    }
}

/// Rounds a decimal to the nearest hundredth.
pub fn round_cents(value: &BigDecimal) -> BigDecimal {
    value.round(2)
}
