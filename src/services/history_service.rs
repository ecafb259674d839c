use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::PriceEntry;

/// History entry as stored, before validation. Values may be JSON numbers or strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPriceEntry {
    pub value: Option<serde_json::Value>,
    pub timestamp: Option<String>,
}

impl From<&PriceEntry> for RawPriceEntry {
    fn from(entry: &PriceEntry) -> Self {
        Self {
            value: Some(serde_json::Value::String(entry.value.to_string())),
            timestamp: Some(entry.timestamp.to_rfc3339()),
        }
    }
}

/// Decodes a stored history, dropping (and logging) entries that cannot be trusted.
pub fn decode_history(owner: &str, raw: &[RawPriceEntry]) -> Vec<PriceEntry> {
    raw.iter()
        .enumerate()
        .filter_map(|(index, entry)| match decode_entry(entry) {
            Ok(decoded) => Some(decoded),
            Err(reason) => {
                warn!("Dropping history entry {} of {}: {}", index, owner, reason);
                None
            }
        })
        .collect()
}

pub fn encode_history(entries: &[PriceEntry]) -> Vec<RawPriceEntry> {
    entries.iter().map(RawPriceEntry::from).collect()
}

fn decode_entry(entry: &RawPriceEntry) -> Result<PriceEntry, String> {
    let value = match &entry.value {
        Some(serde_json::Value::String(s)) => BigDecimal::from_str(s.trim())
            .map_err(|e| format!("bad value {:?}: {}", s, e))?,
        Some(serde_json::Value::Number(n)) => BigDecimal::from_str(&n.to_string())
            .map_err(|e| format!("bad value {}: {}", n, e))?,
        Some(other) => return Err(format!("unexpected value {}", other)),
        None => return Err("missing value".to_string()),
    };

    let timestamp = entry
        .timestamp
        .as_deref()
        .ok_or_else(|| "missing timestamp".to_string())?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| format!("bad timestamp {:?}: {}", timestamp, e))?
        .with_timezone(&Utc);

    PriceEntry::new(value, timestamp).map_err(|e| e.to_string())
}

/// A daily entry is due when none exists or the last one is more than 24 hours old.
pub fn daily_entry_due(daily: &[PriceEntry], now: DateTime<Utc>) -> bool {
    match daily.last() {
        Some(last) => now - last.timestamp > Duration::hours(24),
        None => true,
    }
}
