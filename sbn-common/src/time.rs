//! Timestamp utilities

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Get current wall-clock time in the store's local timezone
///
/// Active windows are expressed in local time of day, so scheduling
/// decisions use this rather than UTC.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Today's date in the store's local timezone
pub fn today() -> NaiveDate {
    local_now().date()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_today_matches_local_now() {
        let before = local_now().date();
        let day = today();
        let after = local_now().date();
        assert!(day >= before && day <= after);
    }
}
