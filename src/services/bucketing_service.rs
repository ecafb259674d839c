//! Window bucketing and normalization.
//!
//! Every value point is copied into each window whose age threshold covers it,
//! so a point from two days ago lands in 7d, 30d and everything longer but not
//! in 24h. Each bucket is then normalized to exactly the window's required
//! point count:
//!
//! - too many points: even-stride downsample, first and last kept verbatim
//! - too few points: a synthetic axis over the whole window, valued along the
//!   window's cold-start seed curve
//! - exactly enough: passed through

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::models::{
    definitions, PriceEntry, TimeRange, TimeWindowDefinition, WindowMap, WindowSeries,
};

/// Raw, unnormalized buckets keyed by window.
pub type RawBuckets = BTreeMap<TimeRange, Vec<PriceEntry>>;

/// Copies each point into every window whose threshold covers its age.
pub fn assign(series: &[PriceEntry], now: DateTime<Utc>) -> RawBuckets {
    let mut buckets: RawBuckets = definitions()
        .iter()
        .map(|def| (def.label, Vec::new()))
        .collect();

    for point in series {
        let age = now - point.timestamp;
        for def in definitions() {
            if age <= def.age_threshold() {
                if let Some(bucket) = buckets.get_mut(&def.label) {
                    bucket.push(point.clone());
                }
            }
        }
    }

    buckets
}

/// Normalizes one bucket to exactly `definition.required_points` points.
pub fn seed(
    mut bucket: Vec<PriceEntry>,
    definition: &TimeWindowDefinition,
    now: DateTime<Utc>,
) -> Vec<PriceEntry> {
    let required = definition.required_points;
    bucket.sort_by_key(|point| point.timestamp);

    if bucket.len() > required {
        downsample(bucket, required)
    } else if bucket.len() < required {
        debug!(
            "Window {} has {} of {} points, using seed curve",
            definition.label,
            bucket.len(),
            required
        );
        // An empty bucket anchors its axis so that it ends now
        let start = bucket
            .first()
            .map(|point| point.timestamp)
            .unwrap_or_else(|| now - definition.age_threshold());
        seed_axis(definition, start)
    } else {
        bucket
    }
}

/// Runs `seed` for every catalog window.
pub fn normalize_all(mut buckets: RawBuckets, now: DateTime<Utc>) -> WindowMap {
    definitions()
        .iter()
        .map(|def| {
            let bucket = buckets.remove(&def.label).unwrap_or_default();
            (def.label, WindowSeries::new(def.label, seed(bucket, def, now)))
        })
        .collect()
}

fn downsample(bucket: Vec<PriceEntry>, required: usize) -> Vec<PriceEntry> {
    if required == 0 {
        return Vec::new();
    }
    if required == 1 {
        return bucket.into_iter().last().into_iter().collect();
    }

    let stride = bucket.len() / (required - 1);
    let last = bucket[bucket.len() - 1].clone();

    // (required - 2) * stride stays below the last index whenever len > required
    let mut sampled: Vec<PriceEntry> = (0..required - 1)
        .map(|i| bucket[i * stride].clone())
        .collect();
    sampled.push(last);
    sampled
}

fn seed_axis(definition: &TimeWindowDefinition, start: DateTime<Utc>) -> Vec<PriceEntry> {
    let required = definition.required_points;
    if required == 0 {
        return Vec::new();
    }

    let span_ms = definition.age_threshold().num_milliseconds();
    let intervals = (required as i64 - 1).max(1);

    (0..required)
        .map(|i| {
            // Proportional offsets so the final point lands exactly on the window end
            let offset_ms = span_ms * i as i64 / intervals;
            let timestamp = start + Duration::milliseconds(offset_ms);
            PriceEntry::derived(definition.seed_value_at(i), timestamp)
        })
        .collect()
}
