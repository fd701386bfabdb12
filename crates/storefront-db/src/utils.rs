//! Shared utility functions

use chrono::{DateTime, Utc};

/// Parse a datetime string (RFC3339 format) or return current time
///
/// Timestamps are stored as RFC3339 text. A value that fails to parse falls
/// back to the current time rather than failing the whole row.
pub fn parse_datetime_or_now(s: &str) -> DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a nullable timestamp column
pub fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|value| parse_datetime_or_now(&value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_or_now() {
        let valid_time = "2024-01-01T12:00:00Z";
        let parsed = parse_datetime_or_now(valid_time);
        assert_eq!(parsed.to_rfc3339(), "2024-01-01T12:00:00+00:00");

        // Invalid time should return current time (just check it doesn't panic)
        let now_before = Utc::now();
        let parsed = parse_datetime_or_now("invalid");
        let now_after = Utc::now();
        assert!(parsed >= now_before && parsed <= now_after);
    }

    #[test]
    fn test_parse_optional_datetime() {
        assert!(parse_optional_datetime(None).is_none());

        let parsed = parse_optional_datetime(Some("2024-01-01T12:00:00Z".to_string()));
        assert_eq!(
            parsed.map(|dt| dt.to_rfc3339()),
            Some("2024-01-01T12:00:00+00:00".to_string())
        );
    }
}
