//! Cross-window display continuity.
//!
//! Two fixed passes over a normalized window map:
//!
//! 1. A window with fewer than 75% non-zero points gets its zero points
//!    replaced by the seed-curve value at the same index. Non-zero points are
//!    left alone.
//! 2. Walking shortest to longest, the last point of each window is set to the
//!    next window's `seed_previous` so adjacent charts meet at the boundary.
//!    The longest window keeps its last point.
//!
//! Pass 2 overwrites the boundary point even when it was observed data. That
//! makes window edges snap to the seed value; it is kept as-is for chart
//! compatibility.

use bigdecimal::Zero;
use tracing::debug;

use crate::models::{definitions, WindowMap};

const MIN_POPULATED_NUMERATOR: usize = 3;
const MIN_POPULATED_DENOMINATOR: usize = 4;

pub fn stitch(mut map: WindowMap) -> WindowMap {
    for series in map.values_mut() {
        let definition = series.label.definition();
        let total = series.points.len();
        let populated = series.points.iter().filter(|p| !p.value.is_zero()).count();

        if populated * MIN_POPULATED_DENOMINATOR < total * MIN_POPULATED_NUMERATOR {
            debug!(
                "Window {} only has {}/{} populated points, filling from seed curve",
                series.label, populated, total
            );
            for (index, point) in series.points.iter_mut().enumerate() {
                if point.value.is_zero() {
                    point.value = definition.seed_value_at(index);
                }
            }
        }
    }

    for pair in definitions().windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        if let Some(last) = map
            .get_mut(&current.label)
            .and_then(|series| series.points.last_mut())
        {
            last.value = next.seed_previous();
        }
    }

    map
}
