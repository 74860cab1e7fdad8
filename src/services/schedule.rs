use crate::models::tesy::{DeviceSnapshot, ScheduleKind, SensorValue};
use chrono::{DateTime, TimeZone, Timelike};
use std::fmt;

/// Result of asking a schedule table for the current hour.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleValue {
    Target(SensorValue),
    /// The day exists but has no usable entry for this hour.
    Unknown,
    NoSchedule,
}

impl fmt::Display for ScheduleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleValue::Target(v) => write!(f, "{}", v),
            ScheduleValue::Unknown => f.write_str("Unknown"),
            ScheduleValue::NoSchedule => f.write_str("No schedule available"),
        }
    }
}

/// Field holding the vacation target in the flat `/getVacation` object.
pub const VACATION_TARGET_KEY: &str = "vTemp";

/// Look up `kind` for `hour` (0-23) on `weekday` (`Mon`, `Tue`, ...).
///
/// Program tables are an ordered list of `{ "<Ddd>": { "h00": .., "h23": .. } }`; the first
/// entry holding the weekday wins. The vacation table is a flat object.
pub fn lookup(snapshot: &DeviceSnapshot, kind: ScheduleKind, hour: u32, weekday: &str) -> ScheduleValue {
    let Some(table) = snapshot.get(kind.endpoint()) else {
        return ScheduleValue::NoSchedule;
    };

    if kind == ScheduleKind::Vacation {
        return match table.as_object() {
            Some(obj) if !obj.is_empty() => obj
                .get(VACATION_TARGET_KEY)
                .and_then(SensorValue::from_json)
                .map(ScheduleValue::Target)
                .unwrap_or(ScheduleValue::Unknown),
            _ => ScheduleValue::NoSchedule,
        };
    }

    let Some(days) = table.as_array() else {
        return ScheduleValue::NoSchedule;
    };
    let hour_key = format!("h{:02}", hour);
    days.iter()
        .find_map(|entry| entry.get(weekday))
        .map(|day| {
            day.get(&hour_key)
                .and_then(SensorValue::from_json)
                .map(ScheduleValue::Target)
                .unwrap_or(ScheduleValue::Unknown)
        })
        .unwrap_or(ScheduleValue::NoSchedule)
}

/// Same as [`lookup`] using the hour and abbreviated weekday of `now`.
pub fn lookup_at<Tz: TimeZone>(snapshot: &DeviceSnapshot, kind: ScheduleKind, now: &DateTime<Tz>) -> ScheduleValue
where
    Tz::Offset: fmt::Display,
{
    let weekday = now.format("%a").to_string();
    lookup(snapshot, kind, now.hour(), &weekday)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tesy::Endpoint;
    use chrono::Utc;
    use serde_json::json;

    fn program_snapshot() -> DeviceSnapshot {
        let mut s = DeviceSnapshot::new();
        s.insert(
            Endpoint::P1,
            json!([
                {"Sun": {"h09": "40"}},
                {"Mon": {"h08": "40", "h09": 45}},
                {"Mon": {"h09": "99"}}
            ]),
        );
        s.insert(Endpoint::Vacation, json!({"vYear": "25", "vTemp": "30"}));
        s
    }

    #[test]
    fn finds_hour_on_matching_day() {
        let s = program_snapshot();
        assert_eq!(
            lookup(&s, ScheduleKind::Program1, 9, "Mon"),
            ScheduleValue::Target(SensorValue::Number(45.0))
        );
        assert_eq!(lookup(&s, ScheduleKind::Program1, 9, "Mon").to_string(), "45");
    }

    #[test]
    fn missing_day_or_table_has_no_schedule() {
        let s = program_snapshot();
        assert_eq!(lookup(&s, ScheduleKind::Program1, 9, "Tue"), ScheduleValue::NoSchedule);
        assert_eq!(lookup(&s, ScheduleKind::Program2, 9, "Mon"), ScheduleValue::NoSchedule);
        assert_eq!(
            ScheduleValue::NoSchedule.to_string(),
            "No schedule available"
        );

        let mut empty = DeviceSnapshot::new();
        empty.insert(Endpoint::P3, json!([]));
        assert_eq!(lookup(&empty, ScheduleKind::Program3, 0, "Mon"), ScheduleValue::NoSchedule);
    }

    #[test]
    fn missing_hour_is_unknown() {
        let s = program_snapshot();
        assert_eq!(lookup(&s, ScheduleKind::Program1, 23, "Mon"), ScheduleValue::Unknown);
    }

    #[test]
    fn vacation_reads_flat_target() {
        let s = program_snapshot();
        assert_eq!(
            lookup(&s, ScheduleKind::Vacation, 3, "Fri"),
            ScheduleValue::Target(SensorValue::Text("30".into()))
        );
    }

    #[test]
    fn weekly_fixture() {
        let json = std::fs::read_to_string("tests/data/p1.json").expect("fixture present");
        let mut s = DeviceSnapshot::new();
        s.insert(Endpoint::P1, serde_json::from_str(&json).expect("parse schedule"));

        assert_eq!(lookup(&s, ScheduleKind::Program1, 6, "Mon").to_string(), "60");
        assert_eq!(lookup(&s, ScheduleKind::Program1, 9, "Sun").to_string(), "60");
        assert_eq!(lookup(&s, ScheduleKind::Program1, 12, "Sat"), ScheduleValue::Unknown);
        assert_eq!(lookup(&s, ScheduleKind::Program1, 12, "Wed"), ScheduleValue::NoSchedule);
    }

    #[test]
    fn lookup_at_uses_weekday_and_hour() {
        let s = program_snapshot();
        // 2025-03-10 is a Monday
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 9, 30, 0).unwrap();
        assert_eq!(
            lookup_at(&s, ScheduleKind::Program1, &now),
            ScheduleValue::Target(SensorValue::Number(45.0))
        );
    }
}
