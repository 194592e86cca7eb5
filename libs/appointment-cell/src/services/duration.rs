// libs/appointment-cell/src/services/duration.rs
use chrono::{DateTime, Utc};

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Whole minutes waited between `arrival` and `now`, both UTC.
///
/// Rounds to the nearest minute, except that any positive wait shorter than
/// half a minute still counts as one. Negative spans from clock skew clamp
/// to zero.
pub fn compute(now: DateTime<Utc>, arrival: DateTime<Utc>) -> i32 {
    let elapsed_ms = now.signed_duration_since(arrival).num_milliseconds();
    if elapsed_ms <= 0 {
        return 0;
    }

    let rounded = (elapsed_ms + MILLIS_PER_MINUTE / 2) / MILLIS_PER_MINUTE;
    rounded.clamp(1, i32::MAX as i64) as i32
}
