use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::price_entry::PriceEntry;
use crate::models::time_range::TimeRange;

/// Normalized points for one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSeries {
    pub label: TimeRange,
    pub points: Vec<PriceEntry>,
}

impl WindowSeries {
    pub fn new(label: TimeRange, points: Vec<PriceEntry>) -> Self {
        Self { label, points }
    }

    pub fn is_complete(&self) -> bool {
        self.points.len() == self.label.definition().required_points
    }
}

/// Window label to series. Keys are limited to the catalog by construction.
pub type WindowMap = BTreeMap<TimeRange, WindowSeries>;

/// Builds a window map from free-form labels, rejecting anything outside the catalog.
pub fn window_map_from_labels<I>(entries: I) -> Result<WindowMap, AppError>
where
    I: IntoIterator<Item = (String, Vec<PriceEntry>)>,
{
    entries
        .into_iter()
        .map(|(label, points)| {
            let range = label.parse::<TimeRange>()?;
            Ok((range, WindowSeries::new(range, points)))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub x: DateTime<Utc>,
    pub y: BigDecimal,
}

/// Series object handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub id: String,
    pub color: String,
    pub points: Vec<ChartPoint>,
}

pub type ChartMap = BTreeMap<TimeRange, ChartSeries>;
