//! Numeric and time helpers shared by the scheduler and the mastery engine.

use chrono::{DateTime, Duration, Utc};

use crate::models::Concept;

/// One scheduling day. No calendar or timezone adjustment is applied.
pub const DAY_MS: i64 = 86_400_000;

pub fn interval_to_duration(interval_days: u32) -> Duration {
    Duration::milliseconds(interval_days as i64 * DAY_MS)
}

/// `now` plus the interval, saturating at the latest representable instant.
pub fn next_review_at(now: DateTime<Utc>, interval_days: u32) -> DateTime<Utc> {
    now.checked_add_signed(interval_to_duration(interval_days))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Apply a signed step to a mastery value and clamp into [0, 100].
pub fn clamp_mastery(current: u8, delta: i32) -> u8 {
    (current as i32 + delta).clamp(0, 100) as u8
}

/// Mean mastery across concepts, rounded to the nearest integer.
/// An empty set averages to 0.
pub fn average_mastery(concepts: &[Concept]) -> u8 {
    if concepts.is_empty() {
        return 0;
    }
    let total: u32 = concepts.iter().map(|c| c.mastery_level as u32).sum();
    (total as f64 / concepts.len() as f64).round() as u8
}

/// True when `part / whole` reaches `threshold_percent`. Integer-exact.
pub fn meets_percent(part: u32, whole: u32, threshold_percent: u8) -> bool {
    whole > 0 && part as u64 * 100 >= threshold_percent as u64 * whole as u64
}
