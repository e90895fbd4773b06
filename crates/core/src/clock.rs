//! 12-hour clock parsing and conversion to a 24-hour start timestamp.

use crate::constants::CLOCK_TIME_PATTERN;
use crate::{VisitError, VisitResult};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use visit_types::TimeFormat;

fn clock_time_regex() -> &'static Regex {
    static CLOCK_TIME: OnceLock<Regex> = OnceLock::new();
    CLOCK_TIME.get_or_init(|| Regex::new(CLOCK_TIME_PATTERN).expect("clock pattern compiles"))
}

/// A wall-clock time on the 12-hour dial (hour in `1..=12`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime {
    hour: u32,
    minute: u32,
}

impl ClockTime {
    /// Parse user input such as `2:30` or `02:30`.
    ///
    /// # Errors
    ///
    /// Returns [`VisitError::InvalidClockTime`] if the input does not match
    /// [`CLOCK_TIME_PATTERN`].
    pub fn parse(input: &str) -> VisitResult<Self> {
        let captures = clock_time_regex()
            .captures(input.trim())
            .ok_or_else(|| VisitError::InvalidClockTime(input.to_owned()))?;

        // Both groups are digit-only and bounded by the pattern.
        let hour = captures[1]
            .parse()
            .map_err(|_| VisitError::InvalidClockTime(input.to_owned()))?;
        let minute = captures[2]
            .parse()
            .map_err(|_| VisitError::InvalidClockTime(input.to_owned()))?;

        Ok(Self { hour, minute })
    }

    /// Split a 24-hour time into its 12-hour reading and AM/PM selector.
    pub fn from_time(time: NaiveTime) -> (Self, TimeFormat) {
        let format = TimeFormat::for_hour(time.hour());
        let hour = match time.hour() % 12 {
            0 => 12,
            h => h,
        };
        (
            Self {
                hour,
                minute: time.minute(),
            },
            format,
        )
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    /// Resolve to `(hours, minutes)` on the 24-hour clock.
    ///
    /// `12 AM` is midnight (hour 0) and `12 PM` is noon (hour 12).
    pub fn to_24_hour(self, format: TimeFormat) -> (u32, u32) {
        let hours = match (format, self.hour) {
            (TimeFormat::Am, 12) => 0,
            (TimeFormat::Am, h) => h,
            (TimeFormat::Pm, 12) => 12,
            (TimeFormat::Pm, h) => h + 12,
        };
        (hours, self.minute)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Combine a calendar date with a 12-hour clock time into a start timestamp.
pub fn combine_start_datetime(
    date: NaiveDate,
    time: ClockTime,
    format: TimeFormat,
) -> VisitResult<NaiveDateTime> {
    let (hours, minutes) = time.to_24_hour(format);
    date.and_hms_opt(hours, minutes, 0)
        .ok_or(VisitError::InvalidStartDatetime {
            date,
            hours,
            minutes,
        })
}
