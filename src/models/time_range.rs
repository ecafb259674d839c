use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// The closed set of chart look-back windows, ordered shortest to longest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "180d")]
    HalfYear,
    #[serde(rename = "270d")]
    ThreeQuarters,
    #[serde(rename = "365d")]
    Year,
}

impl TimeRange {
    pub const ALL: [TimeRange; 7] = [
        TimeRange::Day,
        TimeRange::Week,
        TimeRange::Month,
        TimeRange::Quarter,
        TimeRange::HalfYear,
        TimeRange::ThreeQuarters,
        TimeRange::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Day => "24h",
            TimeRange::Week => "7d",
            TimeRange::Month => "30d",
            TimeRange::Quarter => "90d",
            TimeRange::HalfYear => "180d",
            TimeRange::ThreeQuarters => "270d",
            TimeRange::Year => "365d",
        }
    }

    pub fn definition(&self) -> &'static TimeWindowDefinition {
        // Catalog order matches variant order
        &CATALOG[*self as usize]
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::ALL
            .iter()
            .copied()
            .find(|range| range.as_str() == s)
            .ok_or_else(|| AppError::Validation(format!("Unknown time range label: {}", s)))
    }
}

/// One row of the window catalog. Seed values are stored in cents so the table can be const.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindowDefinition {
    pub label: TimeRange,
    pub age_threshold_days: i64,
    pub required_points: usize,
    seed_first_cents: i64,
    seed_last_cents: i64,
    seed_previous_cents: i64,
}

impl TimeWindowDefinition {
    pub fn seed_first(&self) -> BigDecimal {
        from_cents(self.seed_first_cents)
    }

    pub fn seed_last(&self) -> BigDecimal {
        from_cents(self.seed_last_cents)
    }

    pub fn seed_previous(&self) -> BigDecimal {
        from_cents(self.seed_previous_cents)
    }

    pub fn age_threshold(&self) -> Duration {
        Duration::days(self.age_threshold_days)
    }

    /// Value of the cold-start curve at `index` of `required_points`.
    pub fn seed_value_at(&self, index: usize) -> BigDecimal {
        let first = self.seed_first();
        let last = self.seed_last();
        if self.required_points < 2 {
            return last;
        }
        let span = BigDecimal::from((self.required_points - 1) as i64);
        let step = BigDecimal::from(index as i64);
        let delta = &last - &first;
        (first + delta * step / span).round(2)
    }
}

fn from_cents(cents: i64) -> BigDecimal {
    BigDecimal::new(cents.into(), 2)
}

const CATALOG: [TimeWindowDefinition; 7] = [
    TimeWindowDefinition {
        label: TimeRange::Day,
        age_threshold_days: 1,
        required_points: 24,
        seed_first_cents: 9_800,
        seed_last_cents: 10_000,
        seed_previous_cents: 10_000,
    },
    TimeWindowDefinition {
        label: TimeRange::Week,
        age_threshold_days: 7,
        required_points: 28,
        seed_first_cents: 9_200,
        seed_last_cents: 10_000,
        seed_previous_cents: 9_800,
    },
    TimeWindowDefinition {
        label: TimeRange::Month,
        age_threshold_days: 30,
        required_points: 30,
        seed_first_cents: 8_000,
        seed_last_cents: 10_000,
        seed_previous_cents: 9_200,
    },
    TimeWindowDefinition {
        label: TimeRange::Quarter,
        age_threshold_days: 90,
        required_points: 45,
        seed_first_cents: 6_500,
        seed_last_cents: 10_000,
        seed_previous_cents: 8_000,
    },
    TimeWindowDefinition {
        label: TimeRange::HalfYear,
        age_threshold_days: 180,
        required_points: 60,
        seed_first_cents: 5_000,
        seed_last_cents: 10_000,
        seed_previous_cents: 6_500,
    },
    TimeWindowDefinition {
        label: TimeRange::ThreeQuarters,
        age_threshold_days: 270,
        required_points: 90,
        seed_first_cents: 4_000,
        seed_last_cents: 10_000,
        seed_previous_cents: 5_000,
    },
    TimeWindowDefinition {
        label: TimeRange::Year,
        age_threshold_days: 365,
        required_points: 120,
        seed_first_cents: 3_000,
        seed_last_cents: 10_000,
        seed_previous_cents: 4_000,
    },
];

/// All window definitions, shortest threshold first.
pub fn definitions() -> &'static [TimeWindowDefinition] {
    &CATALOG
}
