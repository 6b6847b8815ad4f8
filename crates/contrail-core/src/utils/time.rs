//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Time utilities for the contrail contract testing engine
//!
//! Wall time is read through an injected [`Clock`] so that test runs are
//! reproducible; the engine itself never calls `Utc::now` directly
//! outside of [`SystemClock`]. Duration strings in contract documents
//! (`"100ms"`, `"1m30s"`) are parsed here.

use chrono::{DateTime, Duration, Utc};

use crate::error::{ContrailError, ContrailResult};

/// Source of wall-clock time
pub trait Clock: Send + Sync {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a fixed instant
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: DateTime<Utc>,
}

impl FixedClock {
    /// Create a clock that always reports the given instant
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }
}

/// Parse a compound duration string such as `"100ms"`, `"5s"`, or `"1m30s"`
///
/// Recognized units: `ns`, `us`, `ms`, `s`, `m`, `h`. Fractional values
/// are accepted per segment (`"1.5s"`).
pub fn parse_duration(input: &str) -> ContrailResult<Duration> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ContrailError::validation("duration string is empty"));
    }

    let mut total_ns: f64 = 0.0;
    let mut chars = trimmed.chars().peekable();
    let mut matched_any = false;

    while chars.peek().is_some() {
        let mut number = String::new();
        while let Some(c) = chars.peek() {
            if c.is_ascii_digit() || *c == '.' || (number.is_empty() && *c == '-') {
                number.push(*c);
                chars.next();
            } else {
                break;
            }
        }

        let mut unit = String::new();
        while let Some(c) = chars.peek() {
            if c.is_alphabetic() {
                unit.push(*c);
                chars.next();
            } else {
                break;
            }
        }

        let value: f64 = number.parse().map_err(|_| {
            ContrailError::validation(format!("invalid duration: {input}"))
        })?;

        let unit_ns = match unit.as_str() {
            "ns" => 1.0,
            "us" | "µs" => 1_000.0,
            "ms" => 1_000_000.0,
            "s" => 1_000_000_000.0,
            "m" => 60.0 * 1_000_000_000.0,
            "h" => 3_600.0 * 1_000_000_000.0,
            _ => {
                return Err(ContrailError::validation(format!(
                    "invalid duration unit in: {input}"
                )))
            }
        };

        total_ns += value * unit_ns;
        matched_any = true;
    }

    if !matched_any {
        return Err(ContrailError::validation(format!(
            "invalid duration: {input}"
        )));
    }

    Ok(Duration::nanoseconds(total_ns as i64))
}

/// Render a duration in the compact form used by the extractor
///
/// Sub-second durations render in milliseconds (`"150ms"`), longer ones
/// in seconds with up to three fractional digits (`"1.5s"`).
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.num_milliseconds();
    if total_ms.abs() < 1_000 {
        format!("{}ms", total_ms)
    } else {
        let secs = total_ms as f64 / 1_000.0;
        if (secs - secs.trunc()).abs() < f64::EPSILON {
            format!("{}s", secs.trunc() as i64)
        } else {
            format!("{}s", (secs * 1_000.0).round() / 1_000.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_durations() {
        assert_eq!(parse_duration("100ms").unwrap(), Duration::milliseconds(100));
        assert_eq!(parse_duration("5s").unwrap(), Duration::seconds(5));
        assert_eq!(parse_duration("2m").unwrap(), Duration::minutes(2));
        assert_eq!(parse_duration("1h").unwrap(), Duration::hours(1));
    }

    #[test]
    fn test_parse_compound_durations() {
        assert_eq!(
            parse_duration("1m30s").unwrap(),
            Duration::seconds(90)
        );
        assert_eq!(
            parse_duration("1.5s").unwrap(),
            Duration::milliseconds(1_500)
        );
    }

    #[test]
    fn test_parse_invalid_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("10parsecs").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::milliseconds(100)), "100ms");
        assert_eq!(format_duration(Duration::milliseconds(1_500)), "1.5s");
        assert_eq!(format_duration(Duration::seconds(5)), "5s");
        assert_eq!(format_duration(Duration::zero()), "0ms");
    }

    #[test]
    fn test_fixed_clock() {
        let instant = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let clock = FixedClock::new(instant);
        assert_eq!(clock.now(), instant);
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_round_trip_parse_format() {
        let parsed = parse_duration("150ms").unwrap();
        assert_eq!(format_duration(parsed), "150ms");
    }
}
