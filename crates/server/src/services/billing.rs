// Time-based parking charges

use chrono::{DateTime, Utc};

const SECONDS_PER_HOUR: i64 = 3600;

/// Whole hours elapsed, rounded down, with a one-hour minimum.
pub fn billable_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let elapsed = (end - start).num_seconds();
    (elapsed / SECONDS_PER_HOUR).max(1)
}

pub fn parking_cost(price_per_hour: f64, start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    price_per_hour * billable_hours(start, end) as f64
}
