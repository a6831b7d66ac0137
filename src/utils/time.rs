use std::time::Instant;

use chrono::Utc;

/// Wall-clock milliseconds since the unix epoch.
pub fn time_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Milliseconds elapsed since `started`, saturating at `u64::MAX`.
pub fn elapsed_millis(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
