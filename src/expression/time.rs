//! Date and time part extraction.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde_json::Value;

use crate::catalog::{to_date, to_timestamp};
use crate::error::Result;

/// A part of a date or timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatePart {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    DayOfYear,
}

impl DatePart {
    pub const ALL: [DatePart; 7] = [
        DatePart::Year,
        DatePart::Month,
        DatePart::Day,
        DatePart::Hour,
        DatePart::Minute,
        DatePart::Second,
        DatePart::DayOfYear,
    ];

    /// SQL function name.
    pub fn name(&self) -> &'static str {
        match self {
            DatePart::Year => "year",
            DatePart::Month => "month",
            DatePart::Day => "day",
            DatePart::Hour => "hour",
            DatePart::Minute => "minute",
            DatePart::Second => "second",
            DatePart::DayOfYear => "dayofyear",
        }
    }

    /// Extract this part from a non-null value.
    ///
    /// The value is read as a timestamp first and as a date (at midnight)
    /// otherwise; when both fail the timestamp conversion error is returned.
    pub fn extract(&self, value: &Value) -> Result<i32> {
        let ts = match to_timestamp(value) {
            Ok(ts) => ts,
            Err(err) => match to_date(value) {
                Ok(date) => date.and_time(Default::default()),
                Err(_) => return Err(err),
            },
        };
        Ok(self.of(&ts))
    }

    fn of(&self, ts: &NaiveDateTime) -> i32 {
        match self {
            DatePart::Year => ts.year(),
            DatePart::Month => ts.month() as i32,
            DatePart::Day => ts.day() as i32,
            DatePart::Hour => ts.hour() as i32,
            DatePart::Minute => ts.minute() as i32,
            DatePart::Second => ts.second() as i32,
            DatePart::DayOfYear => ts.ordinal() as i32,
        }
    }
}
