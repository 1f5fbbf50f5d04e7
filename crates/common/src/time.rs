//! Epoch-time helpers. Stored records carry epoch milliseconds so the
//! state store stays portable across processes and restarts.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as epoch milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Current time as epoch seconds.
#[must_use]
pub fn now_secs() -> i64 {
    now_ms() / 1000
}
