use chrono::Duration;

use super::ApiError;

/// Parse a lookback window written as `<N>mins` or `<N>min`, N >= 1.
pub fn parse_time_interval(value: &str) -> Result<Duration, ApiError> {
    let invalid = || ApiError::InvalidInterval {
        value: value.to_string(),
    };

    let trimmed = value.trim();
    let digits = trimmed
        .strip_suffix("mins")
        .or_else(|| trimmed.strip_suffix("min"))
        .ok_or_else(invalid)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let minutes: i64 = digits.parse().map_err(|_| invalid())?;
    if minutes == 0 {
        return Err(invalid());
    }
    Duration::try_minutes(minutes).ok_or_else(invalid)
}
