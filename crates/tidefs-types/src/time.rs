use chrono::Utc;

/// Seconds since the Unix epoch.
///
/// Task send/created timestamps are stored at this resolution; a value
/// of zero is reserved to mean "never".
pub fn unix_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Milliseconds since the Unix epoch, for log fields that want finer
/// resolution than the task timestamps.
pub fn unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}
