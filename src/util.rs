use chrono::{DateTime, Utc};

/// Datetimes land in typed rows as RFC 3339 text, sometimes wrapped in
/// the d'...' literal form. Accept both.
pub(crate) fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw
        .trim_start_matches('d')
        .trim_matches('\'')
        .trim_matches('"');
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
