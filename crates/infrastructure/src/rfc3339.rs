//! RFC 3339 timestamp parsing helpers shared by the SQLite-backed repositories.
//!
//! Every table stores `DateTime<Utc>` columns as `to_rfc3339()` text; these
//! helpers parse them back, falling back to the Unix epoch on a malformed
//! value rather than panicking — the column is `NOT NULL TEXT` and only ever
//! written by this crate, so a parse failure indicates corruption, not a
//! legitimate absent value.

use chrono::{DateTime, Utc};

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::UNIX_EPOCH)
}

pub(crate) fn parse_timestamp_opt(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.map(parse_timestamp)
}
