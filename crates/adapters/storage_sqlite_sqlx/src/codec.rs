//! Column encodings shared by the repositories.

use std::error::Error;

use chrono::DateTime;
use taskflow_domain::time::Timestamp;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Fixed-width, microsecond precision, always UTC.
pub(crate) fn timestamp(value: Timestamp) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(value: &str) -> Result<Timestamp, sqlx::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.to_utc())
        .map_err(decode_error)
}

pub(crate) fn parse_optional_timestamp(
    value: Option<String>,
) -> Result<Option<Timestamp>, sqlx::Error> {
    value.as_deref().map(parse_timestamp).transpose()
}

pub(crate) fn decode_error(err: impl Into<Box<dyn Error + Send + Sync>>) -> sqlx::Error {
    sqlx::Error::Decode(err.into())
}

pub(crate) fn count(value: i64) -> Result<u64, sqlx::Error> {
    u64::try_from(value).map_err(decode_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn should_encode_timestamps_with_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let fractional = whole + chrono::Duration::microseconds(1_500);
        assert_eq!(timestamp(whole), "2024-01-01T00:00:00.000000Z");
        assert_eq!(timestamp(fractional), "2024-01-01T00:00:00.001500Z");
        assert!(timestamp(whole) < timestamp(fractional));
    }

    #[test]
    fn should_parse_encoded_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap();
        assert_eq!(parse_timestamp(&timestamp(ts)).unwrap(), ts);
    }

    #[test]
    fn should_reject_negative_counter() {
        assert!(count(-1).is_err());
        assert_eq!(count(7).unwrap(), 7);
    }
}
