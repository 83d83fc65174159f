//! Observation time encoded in map names.
//!
//! Chart archives name maps like `0000_UTC_Wed_03_JAN`, optionally followed by
//! further `_`-separated suffixes.

use chrono::{Month, Weekday};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MapTimestamp {
    /// UTC hour and minute
    pub hour: u8,
    pub minute: u8,
    pub weekday: Weekday,
    pub day: u8,
    pub month: Month,
}

impl MapTimestamp {
    /// Parses a map name (file stem); `None` when it does not follow the scheme.
    pub fn parse(name: &str) -> Option<Self> {
        let parts: Vec<&str> = name.split('_').collect();
        if parts.len() < 5 || !parts[1].eq_ignore_ascii_case("UTC") {
            return None;
        }

        let time = parts[0];
        if time.len() != 4 || !time.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let hour: u8 = time[..2].parse().ok()?;
        let minute: u8 = time[2..].parse().ok()?;
        if hour > 23 || minute > 59 {
            return None;
        }

        let weekday: Weekday = parts[2].parse().ok()?;
        let day: u8 = parts[3].parse().ok()?;
        if !(1..=31).contains(&day) {
            return None;
        }
        let month: Month = parts[4].parse().ok()?;

        Some(Self {
            hour,
            minute,
            weekday,
            day,
            month,
        })
    }

    /// `HHMM`, as printed in the map name.
    pub fn time_label(&self) -> String {
        format!("{:02}{:02}", self.hour, self.minute)
    }

    /// Two-digit day of month.
    pub fn day_label(&self) -> String {
        format!("{:02}", self.day)
    }

    /// Two-digit month number (`01` for January).
    pub fn month_label(&self) -> String {
        format!("{:02}", self.month.number_from_month())
    }
}
