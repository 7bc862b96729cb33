use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::Serializer;

/// Current time at the store's precision (microseconds).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// The canonical wire form of a concurrency token: RFC 3339, UTC, microseconds.
pub fn to_canonical(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn serialize_canonical<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_canonical(*dt))
}

/// Parses a client supplied timestamp. Accepts RFC 3339, a date-time without
/// offset (read as UTC) or a bare `YYYY-MM-DD` (UTC midnight).
pub fn parse_client_timestamp(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc).trunc_subsecs(6));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc().trunc_subsecs(6));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| anyhow::anyhow!("invalid date {}", s))
}

/// Next `last_updated` value for a row: the current time, but always strictly
/// after the previous value.
pub fn next_version(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = previous + Duration::microseconds(1);
    if now > floor {
        now
    } else {
        floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn canonical_form_round_trips_through_parse() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(to_canonical(t), "2024-01-01T00:00:00.000000Z");
        assert_eq!(parse_client_timestamp("2024-01-01T00:00:00Z").unwrap(), t);
        assert_eq!(parse_client_timestamp("2024-01-01T01:00:00+01:00").unwrap(), t);
        assert_eq!(parse_client_timestamp("2024-01-01").unwrap(), t);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_client_timestamp("yesterday").is_err());
        assert!(parse_client_timestamp("").is_err());
    }

    #[test]
    fn next_version_is_strictly_increasing() {
        let t = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let earlier = t - Duration::seconds(5);
        assert_eq!(next_version(t, earlier), t + Duration::microseconds(1));
        assert_eq!(next_version(earlier, t), t);
    }
}
