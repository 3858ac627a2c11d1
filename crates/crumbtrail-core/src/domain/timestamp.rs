//! Human-readable timestamps for breadcrumbs and error records
//!
//! The engine treats timestamps as opaque strings once produced; nothing
//! parses them back.

use chrono::{DateTime, Local};

/// Pattern used for every timestamp the engine emits (`YYYY-MM-DD HH:mm:ss`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats a local date-time using [`TIMESTAMP_FORMAT`].
pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Current local time formatted with [`TIMESTAMP_FORMAT`].
pub fn timestamp_now() -> String {
    format_timestamp(Local::now())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_format_timestamp_pattern() {
        let at = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        assert_eq!(format_timestamp(at), "2024-03-07 09:05:02");
    }

    #[test]
    fn test_timestamp_now_shape() {
        let now = timestamp_now();
        assert_eq!(now.len(), 19);
        assert_eq!(&now[4..5], "-");
        assert_eq!(&now[10..11], " ");
        assert_eq!(&now[13..14], ":");
    }
}
