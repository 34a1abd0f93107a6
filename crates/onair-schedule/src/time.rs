use std::fmt;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Parse a wall-clock time written as `HH:MM`.
pub fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| ScheduleError::InvalidTime(format!("{s}: {e}")))
}

pub fn format_hhmm(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

fn minute_of_day(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

/// Half-open time-of-day range `[start, end)`.
///
/// `end < start` means the range runs past midnight into the next day;
/// `end == start` is rejected as an empty range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start == end {
            return Err(ScheduleError::InvalidTimeRange {
                start: format_hhmm(start),
                end: format_hhmm(end),
            });
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_hhmm(start)?, parse_hhmm(end)?)
    }

    pub fn wraps_midnight(&self) -> bool {
        self.end < self.start
    }

    /// Start and end as minutes from the start of the slot's day, with a
    /// wrapping end pushed past 1440.
    pub fn span(&self) -> (u32, u32) {
        let start = minute_of_day(self.start);
        let mut end = minute_of_day(self.end);
        if end < start {
            end += MINUTES_PER_DAY;
        }
        (start, end)
    }

    pub fn duration_minutes(&self) -> u32 {
        let (start, end) = self.span();
        end - start
    }

    /// `startA < endB && startB < endA` on the normalised spans. Touching
    /// ranges (`09:00-10:00`, `10:00-11:00`) do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        let (a_start, a_end) = self.span();
        let (b_start, b_end) = other.span();
        a_start < b_end && b_start < a_end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_hhmm(self.start), format_hhmm(self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: &str, end: &str) -> TimeRange {
        TimeRange::parse(start, end).unwrap()
    }

    #[test]
    fn touching_ranges_do_not_overlap() {
        assert!(!range("09:00", "10:00").overlaps(&range("10:00", "11:00")));
        assert!(!range("10:00", "11:00").overlaps(&range("09:00", "10:00")));
    }

    #[test]
    fn one_minute_overlap_is_detected() {
        assert!(range("09:00", "10:01").overlaps(&range("10:00", "11:00")));
        assert!(range("10:00", "11:00").overlaps(&range("09:00", "10:01")));
    }

    #[test]
    fn containment_overlaps() {
        assert!(range("08:00", "12:00").overlaps(&range("09:00", "10:00")));
    }

    #[test]
    fn midnight_wrap_is_normalised() {
        let late = range("23:00", "01:00");
        assert!(late.wraps_midnight());
        assert_eq!(late.span(), (1380, 1500));
        assert_eq!(late.duration_minutes(), 120);
        assert!(late.overlaps(&range("23:30", "23:45")));
        assert!(!late.overlaps(&range("22:00", "23:00")));
        // Midnight as an end time closes the day rather than wrapping back.
        assert_eq!(range("22:00", "00:00").span(), (1320, 1440));
    }

    #[test]
    fn empty_range_is_rejected() {
        assert!(TimeRange::parse("09:00", "09:00").is_err());
        assert!(parse_hhmm("25:00").is_err());
    }

    #[test]
    fn displays_as_hhmm() {
        assert_eq!(range("09:05", "10:30").to_string(), "09:05-10:30");
    }
}
