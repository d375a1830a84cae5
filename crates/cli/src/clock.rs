#![forbid(unsafe_code)]

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const EPOCH_RFC3339: &str = "1970-01-01T00:00:00Z";

/// Wall clock in unix milliseconds, clamped to `0..=i64::MAX`.
pub(crate) fn now_ms_i64() -> i64 {
    let ms = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    i64::try_from(ms.max(0)).unwrap_or(i64::MAX)
}

/// Unrepresentable instants render as the epoch.
pub(crate) fn ts_ms_to_rfc3339(ts_ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ts_ms) * 1_000_000)
        .ok()
        .and_then(|instant| instant.format(&Rfc3339).ok())
        .unwrap_or_else(|| EPOCH_RFC3339.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_millisecond_timestamps() {
        assert_eq!(ts_ms_to_rfc3339(0), EPOCH_RFC3339);
        assert_eq!(ts_ms_to_rfc3339(1_500), "1970-01-01T00:00:01.5Z");
        assert_eq!(ts_ms_to_rfc3339(i64::MAX), EPOCH_RFC3339);
    }

    #[test]
    fn now_is_after_2020() {
        assert!(now_ms_i64() > 1_577_836_800_000);
    }
}
