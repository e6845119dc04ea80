//! Human-readable durations for command-line values.

use std::time::Duration;

/// Parse a scan session duration such as `5s`, `500ms`, `1m` or `2h`.
///
/// A bare number is interpreted as seconds. Zero-length durations are rejected
/// because a session that ends immediately would spin the scan loop.
///
/// # Examples
/// ```
/// use blueblue::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
/// assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
/// assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
/// ```
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    let src = src.trim();
    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    let split = src
        .find(|c: char| !c.is_ascii_digit() && !c.is_whitespace())
        .unwrap_or(src.len());
    let (number, unit) = src.split_at(split);
    let number = number.trim();

    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {src}"))?;

    let duration = match unit {
        "" | "s" => Duration::from_secs(value),
        "ms" => Duration::from_millis(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        "h" => Duration::from_secs(value.saturating_mul(3600)),
        other => return Err(format!("unknown duration unit '{other}' in {src}")),
    };

    if duration.is_zero() {
        return Err(format!("duration must be positive: {src}"));
    }

    Ok(duration)
}
