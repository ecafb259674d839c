use chrono::{DateTime, Utc};

use crate::models::{
    definitions, Card, ChartMap, ChartPoint, ChartSeries, TimeRange, WindowMap,
};
use crate::services::{bucketing_service, continuity_service, price_event_service};

fn color_for(range: TimeRange) -> &'static str {
    match range {
        TimeRange::Day => "#2e7c67",
        TimeRange::Week => "#4cceac",
        TimeRange::Month => "#6870fa",
        TimeRange::Quarter => "#a4a9fc",
        TimeRange::HalfYear => "#db4f4a",
        TimeRange::ThreeQuarters => "#f2b705",
        TimeRange::Year => "#e2726e",
    }
}

/// Formats every window as a chart series. No numeric policy is applied here.
pub fn assemble(map: &WindowMap) -> ChartMap {
    map.iter()
        .map(|(range, series)| {
            let points = series
                .points
                .iter()
                .map(|p| ChartPoint {
                    x: p.timestamp,
                    y: p.value.clone(),
                })
                .collect();

            (
                *range,
                ChartSeries {
                    id: range.as_str().to_string(),
                    color: color_for(*range).to_string(),
                    points,
                },
            )
        })
        .collect()
}

/// Same series as a list, shortest window first.
pub fn to_flat_array(map: &ChartMap) -> Vec<ChartSeries> {
    definitions()
        .iter()
        .filter_map(|def| map.get(&def.label).cloned())
        .collect()
}

/// Full pipeline for a set of cards: expand, accumulate, bucket, normalize, stitch.
pub fn build_window_map(cards: &[Card], now: DateTime<Utc>) -> WindowMap {
    let events = price_event_service::expand_all(cards);
    let values = price_event_service::accumulate(&events);
    let buckets = bucketing_service::assign(&values, now);
    let normalized = bucketing_service::normalize_all(buckets, now);
    continuity_service::stitch(normalized)
}
