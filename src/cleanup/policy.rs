//! Age thresholds for registry cleanup.

use chrono::Duration;

use crate::error::{Error, Result};

/// Parse an age such as `26w`, `30d`, `12h`, `90m` or `45s`.
///
/// Accepted units: s, m, h, d, w (and their long forms). Fractions are
/// allowed and rounded down to whole seconds.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let value = input.trim().to_lowercase();
    if value.is_empty() {
        return Err(invalid(input, "duration cannot be empty"));
    }

    let split_idx = value
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    if split_idx == 0 {
        return Err(invalid(input, "duration must start with a number"));
    }

    let (number_str, unit_str) = value.split_at(split_idx);
    let number: f64 = number_str
        .parse()
        .map_err(|_| invalid(input, &format!("invalid number '{}'", number_str)))?;

    let seconds = match unit_str.trim() {
        "s" | "sec" | "second" | "seconds" => number,
        "m" | "min" | "minute" | "minutes" => number * 60.0,
        "h" | "hr" | "hour" | "hours" => number * 3600.0,
        "d" | "day" | "days" => number * 86400.0,
        "w" | "week" | "weeks" => number * 604800.0,
        "" => return Err(invalid(input, "missing unit (s, m, h, d, w)")),
        other => {
            return Err(invalid(
                input,
                &format!("invalid unit '{}'; valid units: s, m, h, d, w", other),
            ))
        }
    };

    // f64 to i64 casts saturate, so compare before converting
    if !seconds.is_finite() || seconds >= i64::MAX as f64 {
        return Err(invalid(input, "duration is too large"));
    }
    Duration::try_seconds(seconds as i64).ok_or_else(|| invalid(input, "duration is too large"))
}

fn invalid(input: &str, message: &str) -> Error {
    Error::Config {
        message: format!("invalid duration '{}': {}", input, message),
    }
}
