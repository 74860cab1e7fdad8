use crate::models::tesy::{ClockFields, VacationFields};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike};
use core::fmt;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Bounds accepted for the after-vacation temperature, regardless of model.
pub const VACATION_MIN_TEMP: f64 = 8.0;
pub const VACATION_MAX_TEMP: f64 = 75.0;

const VACATION_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Errors that can occur while turning vacation input into device fields.
#[derive(Debug, Clone, PartialEq)]
pub enum VacationError {
    /// The end timestamp is not `YYYY-MM-DDTHH:MM:SS`
    InvalidTimestamp(String),
    /// The temperature after the vacation is outside 8..=75 °C
    TemperatureOutOfRange(f64),
}

impl Display for VacationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            VacationError::InvalidTimestamp(s) => {
                write!(f, "vacation end {:?} is not in YYYY-MM-DDTHH:MM:SS format", s)
            }
            VacationError::TemperatureOutOfRange(t) => write!(
                f,
                "vacation temperature {} outside {}..={}",
                t, VACATION_MIN_TEMP, VACATION_MAX_TEMP
            ),
        }
    }
}

impl Error for VacationError {}

/// Weekday index as the device counts it: 0 = Sunday .. 6 = Saturday.
pub fn weekday_from_sunday(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_sunday()
}

/// Parse a strict `YYYY-MM-DDTHH:MM:SS` timestamp (no zone, no fraction).
pub fn parse_vacation_end(raw: &str) -> Result<NaiveDateTime, VacationError> {
    let invalid = || VacationError::InvalidTimestamp(raw.to_string());
    let bytes = raw.as_bytes();
    let shape_ok = bytes.len() == 19
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            10 => *b == b'T',
            13 | 16 => *b == b':',
            _ => b.is_ascii_digit(),
        });
    if !shape_ok {
        return Err(invalid());
    }
    NaiveDateTime::parse_from_str(raw, VACATION_FORMAT).map_err(|_| invalid())
}

/// Build `/setVacation` fields from an ISO end timestamp and the temperature to resume at.
pub fn vacation_fields(vacation_end: &str, temperature: f64) -> Result<VacationFields, VacationError> {
    if !(VACATION_MIN_TEMP..=VACATION_MAX_TEMP).contains(&temperature) {
        return Err(VacationError::TemperatureOutOfRange(temperature));
    }
    let end = parse_vacation_end(vacation_end)?;
    Ok(VacationFields {
        year: end.year().rem_euclid(100) as u32,
        month: end.month(),
        day: end.day(),
        weekday: weekday_from_sunday(end.date()),
        hour: end.hour(),
        temperature,
    })
}

/// The device identifies its zone by the IANA name with separators removed.
pub fn time_zone_tag(name: &str) -> String {
    name.chars().filter(|c| *c != '/' && *c != ':').collect()
}

/// `/setdate` fields for a local time in the named zone.
pub fn clock_fields<Tz: TimeZone>(zone_name: &str, local: &DateTime<Tz>) -> ClockFields {
    ClockFields {
        offset: time_zone_tag(zone_name),
        day: local.day(),
        month: local.month(),
        year: local.year(),
        hour: local.hour(),
        minute: local.minute(),
        second: local.second(),
    }
}
