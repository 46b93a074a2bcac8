use chrono::{DateTime, Utc};

/// Milliseconds since the Unix epoch, the timestamp format clients expect on
/// realtime payloads.
pub fn unix_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// Current time as Unix milliseconds.
pub fn now_millis() -> i64 {
    unix_millis(Utc::now())
}
