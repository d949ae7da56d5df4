//! Repository utilities.

use chrono::{DateTime, Utc};
use diesel::result::DatabaseErrorKind;

use super::pool::DbError;

/// Report a failure to open the database as a diesel error.
pub fn connection_error(e: impl std::fmt::Display) -> DbError {
    DbError::DatabaseError(
        DatabaseErrorKind::ClosedConnection,
        Box::new(format!("cannot open database: {}", e)),
    )
}

/// Parse a stored timestamp, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional stored timestamp.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// Current time in the stored timestamp format.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_falls_back_to_epoch() {
        assert_eq!(parse_datetime("not a date"), DateTime::UNIX_EPOCH);
        let parsed = parse_datetime("2024-03-01T12:00:00+00:00");
        assert_eq!(parsed.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn test_connection_error_keeps_message() {
        let err = connection_error("disk I/O error");
        assert!(err.to_string().contains("disk I/O error"));
    }

    #[test]
    fn test_parse_datetime_opt() {
        assert!(parse_datetime_opt(None).is_none());
        assert!(parse_datetime_opt(Some("garbage".into())).is_none());
        assert!(parse_datetime_opt(Some(now_timestamp())).is_some());
    }
}
