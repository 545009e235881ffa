//! Time types for wardend
//!
//! Policy windows are wall-clock, time-of-day ranges ("09:00-17:00") that
//! repeat daily; durations in config and on the wire use the compact
//! "2h", "90m", "1h30m" form. All arithmetic is whole-second.

use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A time of day with minute resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    pub hour: u8,
    pub minute: u8,
}

impl WallClock {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// Seconds since midnight
    pub fn as_seconds_from_midnight(&self) -> u32 {
        (self.hour as u32) * 3600 + (self.minute as u32) * 60
    }
}

impl PartialOrd for WallClock {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WallClock {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_seconds_from_midnight()
            .cmp(&other.as_seconds_from_midnight())
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for WallClock {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| TimeParseError::new(s, "expected HH:MM"))?;
        let hour: u8 = h
            .parse()
            .map_err(|_| TimeParseError::new(s, "invalid hour"))?;
        let minute: u8 = m
            .parse()
            .map_err(|_| TimeParseError::new(s, "invalid minute"))?;
        WallClock::new(hour, minute).ok_or_else(|| TimeParseError::new(s, "out of range"))
    }
}

/// Error from parsing a wall-clock time, range, or duration string
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid time value {input:?}: {reason}")]
pub struct TimeParseError {
    pub input: String,
    pub reason: &'static str,
}

impl TimeParseError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// A daily time-of-day window during which login is permitted.
///
/// Parsed from "HH:MM-HH:MM"; the start must precede the end, so windows
/// never cross midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: WallClock,
    pub end: WallClock,
}

impl TimeRange {
    pub fn new(start: WallClock, end: WallClock) -> Option<Self> {
        if start < end { Some(Self { start, end }) } else { None }
    }

    /// Whether the given instant's time of day falls inside the window
    pub fn contains(&self, at: &DateTime<Local>) -> bool {
        let secs = seconds_of_day(at);
        secs >= self.start.as_seconds_from_midnight() && secs < self.end.as_seconds_from_midnight()
    }

    /// Whole seconds from `at` until the window's end today, zero if the
    /// end has already passed
    pub fn seconds_until_end(&self, at: &DateTime<Local>) -> i64 {
        let end = self.end.as_seconds_from_midnight() as i64;
        let now = seconds_of_day(at) as i64;
        (end - now).max(0)
    }
}

fn seconds_of_day(at: &DateTime<Local>) -> u32 {
    at.hour() * 3600 + at.minute() * 60 + at.second()
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for TimeRange {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| TimeParseError::new(s, "expected HH:MM-HH:MM"))?;
        let start: WallClock = start.trim().parse()?;
        let end: WallClock = end.trim().parse()?;
        TimeRange::new(start, end)
            .ok_or_else(|| TimeParseError::new(s, "start must be before end"))
    }
}

impl Serialize for TimeRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse a compact duration string: a sequence of `<number><unit>` terms
/// with units `h`, `m`, `s` (e.g. "2h", "90m", "1h30m", "45s").
pub fn parse_duration(s: &str) -> Result<Duration, TimeParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(TimeParseError::new(s, "empty duration"));
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    let mut saw_term = false;

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let value: u64 = digits
            .parse()
            .map_err(|_| TimeParseError::new(s, "expected a number before the unit"))?;
        digits.clear();
        let scale = match ch {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(TimeParseError::new(s, "unknown unit (expected h, m, or s)")),
        };
        total += value * scale;
        saw_term = true;
    }

    if !digits.is_empty() || !saw_term {
        return Err(TimeParseError::new(s, "trailing number without a unit"));
    }

    Ok(Duration::from_secs(total))
}

/// The last representable second of `at`'s local calendar day; the default
/// expiry for overrides added without one.
pub fn end_of_day(at: &DateTime<Local>) -> DateTime<Local> {
    at.date_naive()
        .and_hms_opt(23, 59, 59)
        .and_then(|naive| naive.and_local_timezone(Local).earliest())
        .unwrap_or(*at)
}

/// Format a duration in the human-readable form used by notifications
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", seconds)
    }
}
