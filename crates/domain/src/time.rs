//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for `started_at`, `next_run`, lease expiry, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Whole milliseconds elapsed between `start` and `end`, clamped at zero.
#[must_use]
pub fn elapsed_ms(start: Timestamp, end: Timestamp) -> u64 {
    u64::try_from((end - start).num_milliseconds()).unwrap_or(0)
}
