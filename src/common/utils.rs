//! Utility functions for kvlock

use chrono::{DateTime, SecondsFormat, Utc};

/// Maximum lock key length accepted by [`validate_key`]
pub const MAX_KEY_LEN: usize = 1024;

/// Parse duration string (e.g., "500ms", "30s", "5m", "1h")
pub fn parse_duration(s: &str) -> crate::Result<std::time::Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::Error::InvalidConfig("empty duration".into()));
    }

    let (num_str, unit) = if let Some(num) = s.strip_suffix("ms") {
        (num, "ms")
    } else {
        let split = s.len() - s.chars().last().map_or(0, char::len_utf8);
        (&s[..split], &s[split..])
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| crate::Error::InvalidConfig(format!("invalid duration: {}", s)))?;

    let duration = match unit {
        "ms" => std::time::Duration::from_millis(num),
        "s" => std::time::Duration::from_secs(num),
        "m" => std::time::Duration::from_secs(scale(num, 60, s)?),
        "h" => std::time::Duration::from_secs(scale(num, 3600, s)?),
        _ => {
            return Err(crate::Error::InvalidConfig(format!(
                "unknown duration unit: {}",
                unit
            )))
        }
    };

    Ok(duration)
}

fn scale(num: u64, factor: u64, s: &str) -> crate::Result<u64> {
    num.checked_mul(factor)
        .ok_or_else(|| crate::Error::InvalidConfig(format!("duration out of range: {}", s)))
}

/// Validate an operator-supplied lock key (non-empty, reasonable length, no
/// control chars). The lock protocol itself accepts any non-empty key.
pub fn validate_key(key: &str) -> crate::Result<()> {
    if key.is_empty() {
        return Err(crate::Error::InvalidKey("key cannot be empty".into()));
    }

    if key.len() > MAX_KEY_LEN {
        return Err(crate::Error::InvalidKey(format!(
            "key too long (max {} bytes)",
            MAX_KEY_LEN
        )));
    }

    if key.chars().any(|c| c.is_control()) {
        return Err(crate::Error::InvalidKey(
            "key contains invalid characters".into(),
        ));
    }

    Ok(())
}

/// Render an epoch-nanosecond timestamp as RFC 3339 (UTC)
pub fn format_nanos(nanos: i64) -> String {
    DateTime::<Utc>::from_timestamp_nanos(nanos).to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(
            parse_duration("500ms").unwrap(),
            std::time::Duration::from_millis(500)
        );
        assert_eq!(
            parse_duration("30s").unwrap(),
            std::time::Duration::from_secs(30)
        );
        assert_eq!(
            parse_duration("5m").unwrap(),
            std::time::Duration::from_secs(300)
        );
        assert_eq!(
            parse_duration("1h").unwrap(),
            std::time::Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("ms").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        let err = parse_duration("400000000000000000m").unwrap_err();
        assert!(matches!(err, crate::Error::InvalidConfig(_)));
        assert!(parse_duration("18446744073709551615h").is_err());
        assert_eq!(
            parse_duration("18446744073709551615s").unwrap(),
            std::time::Duration::from_secs(u64::MAX)
        );
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("orders:nightly-export").is_ok());
        assert!(validate_key("path/to/resource").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("bad\nkey").is_err());
        assert!(validate_key(&"x".repeat(2000)).is_err());
    }

    #[test]
    fn test_format_nanos() {
        assert_eq!(format_nanos(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(
            format_nanos(1_500_000_000_123_000_000),
            "2017-07-14T02:40:00.123Z"
        );
    }
}
