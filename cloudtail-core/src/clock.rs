//! Time conversion and horizon predicates.
//!
//! CloudWatch timestamps are milliseconds since the Unix epoch. A horizon is
//! an age cut-off: timestamps older than `now - horizon` are expired.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

/// Converts a millisecond epoch timestamp to wall-clock time.
pub fn to_time(timestamp: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(timestamp / 1000, ((timestamp % 1000) * 1_000_000) as u32)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// True if `timestamp` falls before `now - horizon`.
///
/// A zero horizon classifies every past timestamp as before the cut-off.
pub fn is_before(horizon: Duration, timestamp: i64) -> bool {
    let cutoff = Utc::now() - chrono::Duration::milliseconds(horizon.as_millis() as i64);
    to_time(timestamp) < cutoff
}

/// True if `timestamp` is within `hot_horizon` of now. With a zero horizon
/// no past timestamp is hot.
pub fn is_hot(hot_horizon: Duration, timestamp: i64) -> bool {
    !is_before(hot_horizon, timestamp)
}

/// Millisecond epoch timestamp for `now - duration`.
pub fn millis_ago(duration: Duration) -> i64 {
    (Utc::now() - chrono::Duration::milliseconds(duration.as_millis() as i64)).timestamp_millis()
}
