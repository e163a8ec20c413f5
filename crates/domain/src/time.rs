//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for `createdTime`, `checkInTime`, etc.
pub type Timestamp = DateTime<Utc>;

/// Format used for timestamps stored in record fields.
pub const FIELD_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Render a timestamp the way record fields store it.
#[must_use]
pub fn to_field(ts: Timestamp) -> String {
    ts.format(FIELD_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_format_field_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        assert_eq!(to_field(ts), "2024-03-09 14:05:00");
    }
}
