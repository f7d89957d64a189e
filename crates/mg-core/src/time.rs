//! Time utilities for Mango
//!
//! Subscription timestamps are stored as Unix milliseconds.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch.
///
/// # Examples
/// ```
/// use mg_core::time::current_time_millis;
///
/// let now = current_time_millis();
/// assert!(now > 0);
/// ```
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Calculate elapsed time in milliseconds since a given timestamp.
///
/// Returns 0 if the given time is in the future.
pub fn elapsed_millis(since: u64) -> u64 {
    current_time_millis().saturating_sub(since)
}

/// Render how long ago a millisecond timestamp was, e.g. `5 minutes ago`.
pub fn format_relative(since_millis: u64) -> String {
    let elapsed = Duration::from_millis(elapsed_millis(since_millis));
    let secs = elapsed.as_secs();

    let (value, unit) = match secs {
        0..=59 => return "just now".to_string(),
        60..=3_599 => (secs / 60, "minute"),
        3_600..=86_399 => (secs / 3_600, "hour"),
        _ => (secs / 86_400, "day"),
    };

    if value == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", value, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_time_millis_is_positive() {
        assert!(current_time_millis() > 0);
    }

    #[test]
    fn test_elapsed_millis_future_time() {
        let future = current_time_millis() + 1_000_000;
        assert_eq!(elapsed_millis(future), 0);
    }

    #[test]
    fn test_format_relative() {
        let now = current_time_millis();
        assert_eq!(format_relative(now), "just now");
        assert_eq!(format_relative(now - 60_000), "1 minute ago");
        assert_eq!(format_relative(now - 3 * 3_600_000), "3 hours ago");
        assert_eq!(format_relative(now - 2 * 86_400_000), "2 days ago");
    }
}
