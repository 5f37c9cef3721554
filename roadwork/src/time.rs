//! Time-of-day spans used by scoped property values.

use std::fmt;

use thiserror::Error;

const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Error, Debug, PartialEq)]
pub enum TimeError {
    #[error("invalid time string: {0:?} (expected HH:MM)")]
    Format(String),
    #[error("timespan start {0} is not before end {1}")]
    Order(String, String),
}

/// A half-open `[start, end)` window of the day in minutes since midnight.
///
/// Parsed from `"HH:MM"` pairs; `"24:00"` is a valid end marking the end of
/// the day. The all-day span is the default value used when a scoped entry
/// carries no timespan of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timespan {
    start: u16,
    end: u16,
}

impl Timespan {
    pub const ALL_DAY: Timespan = Timespan { start: 0, end: MINUTES_PER_DAY };

    pub fn new(start: u16, end: u16) -> Result<Self, TimeError> {
        if start >= end || end > MINUTES_PER_DAY {
            return Err(TimeError::Order(
                format_minutes(start),
                format_minutes(end),
            ));
        }
        Ok(Timespan { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, TimeError> {
        Timespan::new(parse_hhmm(start)?, parse_hhmm(end)?)
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn is_all_day(&self) -> bool {
        *self == Timespan::ALL_DAY
    }

    /// True if the two spans share at least one minute.
    pub fn overlaps(&self, other: &Timespan) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True if `other` lies entirely within this span.
    pub fn contains(&self, other: &Timespan) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl Default for Timespan {
    fn default() -> Self {
        Timespan::ALL_DAY
    }
}

impl fmt::Display for Timespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_minutes(self.start), format_minutes(self.end))
    }
}

fn parse_hhmm(s: &str) -> Result<u16, TimeError> {
    let mut parts = s.split(':');
    let (h, m) = match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), None) => (h, m),
        _ => return Err(TimeError::Format(s.to_string())),
    };
    let h: u16 = h.parse().map_err(|_| TimeError::Format(s.to_string()))?;
    let m: u16 = m.parse().map_err(|_| TimeError::Format(s.to_string()))?;
    if m > 59 || h > 24 || (h == 24 && m != 0) {
        return Err(TimeError::Format(s.to_string()));
    }
    Ok(h * 60 + m)
}

fn format_minutes(minutes: u16) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
