use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};

/// Day of the broadcast grid, 0 = Sunday … 6 = Saturday.
///
/// Independent of the configured week start: Sunday is always 0, only the
/// position of the day inside a [`WeekAnchor`] week changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DayOfWeek(u8);

impl DayOfWeek {
    pub const SUNDAY: DayOfWeek = DayOfWeek(0);
    pub const MONDAY: DayOfWeek = DayOfWeek(1);
    pub const TUESDAY: DayOfWeek = DayOfWeek(2);
    pub const WEDNESDAY: DayOfWeek = DayOfWeek(3);
    pub const THURSDAY: DayOfWeek = DayOfWeek(4);
    pub const FRIDAY: DayOfWeek = DayOfWeek(5);
    pub const SATURDAY: DayOfWeek = DayOfWeek(6);

    pub fn new(index: u8) -> Result<Self> {
        if index <= 6 {
            Ok(Self(index))
        } else {
            Err(ScheduleError::InvalidDay(index))
        }
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn from_weekday(day: Weekday) -> Self {
        Self(day.num_days_from_sunday() as u8)
    }

    pub fn weekday(self) -> Weekday {
        match self.0 {
            0 => Weekday::Sun,
            1 => Weekday::Mon,
            2 => Weekday::Tue,
            3 => Weekday::Wed,
            4 => Weekday::Thu,
            5 => Weekday::Fri,
            _ => Weekday::Sat,
        }
    }

    pub fn short_name(self) -> &'static str {
        ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"][self.0 as usize]
    }

    /// Position of this day inside a week that begins on `week_start`.
    pub fn offset_from(self, week_start: Weekday) -> i64 {
        (self.0 as i64 - week_start.num_days_from_sunday() as i64).rem_euclid(7)
    }
}

impl TryFrom<u8> for DayOfWeek {
    type Error = ScheduleError;

    fn try_from(index: u8) -> Result<Self> {
        Self::new(index)
    }
}

impl From<DayOfWeek> for u8 {
    fn from(day: DayOfWeek) -> Self {
        day.0
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl std::str::FromStr for DayOfWeek {
    type Err = ScheduleError;

    /// Accepts a digit (`"0"`) or an English day name (`"sun"`, `"Sunday"`).
    fn from_str(s: &str) -> Result<Self> {
        if let Ok(index) = s.parse::<u8>() {
            return Self::new(index);
        }
        s.parse::<Weekday>()
            .map(Self::from_weekday)
            .map_err(|_| ScheduleError::InvalidDay(u8::MAX))
    }
}

/// First calendar day of a broadcast week.
///
/// Always normalised: constructing through [`WeekAnchor::containing`] snaps
/// any date back to the configured week start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekAnchor(NaiveDate);

impl WeekAnchor {
    /// The week that contains `date`, for weeks beginning on `week_start`.
    pub fn containing(date: NaiveDate, week_start: Weekday) -> Self {
        let back = (date.weekday().num_days_from_sunday() as i64
            - week_start.num_days_from_sunday() as i64)
            .rem_euclid(7);
        Self(date - Duration::days(back))
    }

    /// Wrap a date already known to be a week start (e.g. read back from storage).
    pub fn from_start_date(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + Duration::days(7))
    }

    pub fn prev(self) -> Self {
        Self(self.0 - Duration::days(7))
    }

    pub fn offset_weeks(self, weeks: i64) -> Self {
        Self(self.0 + Duration::weeks(weeks))
    }

    /// Calendar date on which `day` falls in this week.
    pub fn date_of(self, day: DayOfWeek) -> NaiveDate {
        self.0 + Duration::days(day.offset_from(self.0.weekday()))
    }

    /// Days of the week in broadcast order, starting at the anchor's weekday.
    pub fn days(self) -> impl Iterator<Item = DayOfWeek> {
        let first = self.0.weekday().num_days_from_sunday() as u8;
        (0..7u8).map(move |i| DayOfWeek((first + i) % 7))
    }

    /// Parse `YYYY-MM-DD` and normalise to the week containing it.
    pub fn parse(s: &str, week_start: Weekday) -> Result<Self> {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| ScheduleError::InvalidDate(format!("{s}: {e}")))?;
        Ok(Self::containing(date, week_start))
    }
}

impl fmt::Display for WeekAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn anchor_snaps_back_to_sunday() {
        // 2026-10-16 is a Friday.
        let week = WeekAnchor::containing(date(2026, 10, 16), Weekday::Sun);
        assert_eq!(week.date(), date(2026, 10, 11));
        assert_eq!(WeekAnchor::containing(date(2026, 10, 11), Weekday::Sun), week);
    }

    #[test]
    fn anchor_honours_monday_start() {
        let week = WeekAnchor::containing(date(2026, 10, 11), Weekday::Mon);
        assert_eq!(week.date(), date(2026, 10, 5));
    }

    #[test]
    fn date_of_respects_week_start() {
        let sunday_week = WeekAnchor::containing(date(2026, 10, 14), Weekday::Sun);
        assert_eq!(sunday_week.date_of(DayOfWeek::SUNDAY), date(2026, 10, 11));
        assert_eq!(sunday_week.date_of(DayOfWeek::SATURDAY), date(2026, 10, 17));

        let monday_week = WeekAnchor::containing(date(2026, 10, 14), Weekday::Mon);
        assert_eq!(monday_week.date_of(DayOfWeek::MONDAY), date(2026, 10, 12));
        assert_eq!(monday_week.date_of(DayOfWeek::SUNDAY), date(2026, 10, 18));
    }

    #[test]
    fn days_start_at_anchor_weekday() {
        let week = WeekAnchor::containing(date(2026, 10, 14), Weekday::Mon);
        let days: Vec<u8> = week.days().map(DayOfWeek::index).collect();
        assert_eq!(days, vec![1, 2, 3, 4, 5, 6, 0]);
    }

    #[test]
    fn day_parsing() {
        assert_eq!("0".parse::<DayOfWeek>().unwrap(), DayOfWeek::SUNDAY);
        assert_eq!("tue".parse::<DayOfWeek>().unwrap(), DayOfWeek::TUESDAY);
        assert_eq!("Saturday".parse::<DayOfWeek>().unwrap(), DayOfWeek::SATURDAY);
        assert!("7".parse::<DayOfWeek>().is_err());
        assert!(DayOfWeek::new(9).is_err());
    }

    #[test]
    fn next_and_prev_are_inverse() {
        let week = WeekAnchor::containing(date(2026, 12, 30), Weekday::Sun);
        assert_eq!(week.next().prev(), week);
        assert_eq!(week.offset_weeks(2), week.next().next());
        assert_eq!(week.next().to_string(), "2027-01-03");
    }
}
