//! Models for the Tesy local HTTP API.
//!
//! Types only, no HTTP code.
//!
//! Notes
//! - The device answers with loosely typed JSON: numbers frequently arrive as strings
//!   (`"gradus": "54"`). Snapshots therefore keep the raw `serde_json::Value` and the
//!   typed views coerce on read.
//! - Device type tables are static and keyed by the first four digits of `devid`.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// =====================
// Endpoints
// =====================

/// Logical snapshot key together with the device path it is fetched from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Endpoint {
    Status,
    CalcRes,
    DevStat,
    P1,
    P2,
    P3,
    Vacation,
}

impl Endpoint {
    /// Fetch order of a single poll tick: state endpoints first, then schedules.
    pub const POLLED: [Endpoint; 7] = [
        Endpoint::Status,
        Endpoint::CalcRes,
        Endpoint::DevStat,
        Endpoint::P1,
        Endpoint::P2,
        Endpoint::P3,
        Endpoint::Vacation,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Endpoint::Status => "status",
            Endpoint::CalcRes => "calcRes",
            Endpoint::DevStat => "devstat",
            Endpoint::P1 => "p1",
            Endpoint::P2 => "p2",
            Endpoint::P3 => "p3",
            Endpoint::Vacation => "vacation",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Status => "/status",
            Endpoint::CalcRes => "/calcRes",
            Endpoint::DevStat => "/devstat",
            Endpoint::P1 => "/getP1",
            Endpoint::P2 => "/getP2",
            Endpoint::P3 => "/getP3",
            Endpoint::Vacation => "/getVacation",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Schedule tables exposed by the device.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScheduleKind {
    Program1,
    Program2,
    Program3,
    Vacation,
}

impl ScheduleKind {
    pub const ALL: [ScheduleKind; 4] = [
        ScheduleKind::Program1,
        ScheduleKind::Program2,
        ScheduleKind::Program3,
        ScheduleKind::Vacation,
    ];

    pub fn endpoint(self) -> Endpoint {
        match self {
            ScheduleKind::Program1 => Endpoint::P1,
            ScheduleKind::Program2 => Endpoint::P2,
            ScheduleKind::Program3 => Endpoint::P3,
            ScheduleKind::Vacation => Endpoint::Vacation,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ScheduleKind::Program1 => "Program 1",
            ScheduleKind::Program2 => "Program 2",
            ScheduleKind::Program3 => "Program 3",
            ScheduleKind::Vacation => "Vacation",
        }
    }
}

// =====================
// Snapshot
// =====================

/// Raw JSON per endpoint, as last seen on the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceSnapshot {
    entries: BTreeMap<Endpoint, Value>,
}

impl DeviceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, endpoint: Endpoint) -> Option<&Value> {
        self.entries.get(&endpoint)
    }

    pub fn insert(&mut self, endpoint: Endpoint, value: Value) {
        self.entries.insert(endpoint, value);
    }

    pub fn contains(&self, endpoint: Endpoint) -> bool {
        self.entries.contains_key(&endpoint)
    }

    /// Field `key` of the object stored under `endpoint`.
    pub fn field(&self, endpoint: Endpoint, key: &str) -> Option<&Value> {
        self.get(endpoint).and_then(|v| v.get(key))
    }

    /// Replace every key present in `tick`; keys missing from it keep their previous value.
    pub fn merge(&mut self, tick: DeviceSnapshot) {
        self.entries.extend(tick.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =====================
// Sensor values
// =====================

/// A passthrough reading. The device mixes strings and numbers freely.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorValue {
    Text(String),
    Number(f64),
    Flag(bool),
}

impl SensorValue {
    /// Coerce a raw JSON scalar. Objects, arrays and null are not readings.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(SensorValue::Text(s.clone())),
            Value::Number(n) => n.as_f64().map(SensorValue::Number),
            Value::Bool(b) => Some(SensorValue::Flag(*b)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Numeric view; numeric strings like `"54"` or `" 7200.5 "` are accepted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SensorValue::Number(n) => Some(*n),
            SensorValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            SensorValue::Flag(_) => None,
        }
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorValue::Text(s) => f.write_str(s),
            SensorValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            SensorValue::Number(n) => write!(f, "{}", n),
            SensorValue::Flag(b) => write!(f, "{}", b),
        }
    }
}

// =====================
// Operation modes
// =====================

/// Device operation modes and their `modeSW` codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OperationMode {
    Manual,
    Program1,
    Program2,
    Program3,
    EcoSmart,
    EcoComfort,
    EcoNight,
    Performance,
}

impl OperationMode {
    pub const ALL: [OperationMode; 8] = [
        OperationMode::Manual,
        OperationMode::Program1,
        OperationMode::Program2,
        OperationMode::Program3,
        OperationMode::EcoSmart,
        OperationMode::EcoComfort,
        OperationMode::EcoNight,
        OperationMode::Performance,
    ];

    pub fn code(self) -> &'static str {
        match self {
            OperationMode::Manual => "1",
            OperationMode::Program1 => "2",
            OperationMode::Program2 => "3",
            OperationMode::Program3 => "4",
            OperationMode::EcoSmart => "5",
            OperationMode::EcoComfort => "6",
            OperationMode::EcoNight => "7",
            OperationMode::Performance => "10",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OperationMode::Manual => "Manual",
            OperationMode::Program1 => "Program 1",
            OperationMode::Program2 => "Program 2",
            OperationMode::Program3 => "Program 3",
            OperationMode::EcoSmart => "Eco Smart",
            OperationMode::EcoComfort => "Eco Comfort",
            OperationMode::EcoNight => "Eco Night",
            OperationMode::Performance => "Performance",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.code() == code.trim())
    }

    /// Case-insensitive lookup by display name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|m| m.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl<'de> serde::Deserialize<'de> for OperationMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;
        impl<'de> serde::de::Visitor<'de> for V {
            type Value = OperationMode;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "an operation mode code such as \"1\" or 10")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                OperationMode::from_code(value)
                    .ok_or_else(|| E::invalid_value(serde::de::Unexpected::Str(value), &self))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                OperationMode::from_code(&value.to_string())
                    .ok_or_else(|| E::invalid_value(serde::de::Unexpected::Unsigned(value), &self))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                OperationMode::from_code(&value.to_string())
                    .ok_or_else(|| E::invalid_value(serde::de::Unexpected::Signed(value), &self))
            }
        }

        deserializer.deserialize_any(V)
    }
}

/// On/off switch values as sent on the wire (`power`, `lockKey`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn as_str(self) -> &'static str {
        match self {
            Switch::On => "on",
            Switch::Off => "off",
        }
    }

    pub fn is_on(self) -> bool {
        matches!(self, Switch::On)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" | "1" | "true" => Some(Switch::On),
            "off" | "0" | "false" => Some(Switch::Off),
            _ => None,
        }
    }
}

// =====================
// Device identity
// =====================

/// `/devstat` payload. Only identity fields are modelled; the rest is kept as-is.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct DevStat {
    pub devid: Option<String>,
    pub macaddr: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Static per-model data; every field is empty for unknown device types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct DeviceProfile {
    pub name: Option<&'static str>,
    pub min_setpoint: Option<u8>,
    pub max_setpoint: Option<u8>,
    pub use_showers: bool,
}

pub const DEFAULT_MIN_SETPOINT: u8 = 8;
pub const DEFAULT_MAX_SETPOINT: u8 = 75;

const fn profile(name: &'static str, min: u8, max: u8, use_showers: bool) -> DeviceProfile {
    DeviceProfile {
        name: Some(name),
        min_setpoint: Some(min),
        max_setpoint: Some(max),
        use_showers,
    }
}

pub const DEVICE_PROFILES: [(&str, DeviceProfile); 5] = [
    ("2000", profile("ModEco", 8, 75, false)),
    ("2002", profile("BeliSlimo", 15, 75, true)),
    ("2003", profile("BiLight Smart", 15, 75, false)),
    ("2004", profile("ModEco 2", 15, 75, false)),
    ("2005", profile("BelliSlimo Lite", 15, 75, true)),
];

impl DeviceProfile {
    /// Look up by the 4-digit type prefix of a device id.
    pub fn lookup(device_id: &str) -> DeviceProfile {
        let prefix = device_id.trim().get(..4).unwrap_or_default();
        DEVICE_PROFILES
            .iter()
            .find(|(p, _)| *p == prefix)
            .map(|(_, profile)| *profile)
            .unwrap_or_default()
    }

    pub fn is_known(&self) -> bool {
        self.name.is_some()
    }

    pub fn display_name(&self) -> String {
        format!("Tesy {}", self.name.unwrap_or("Device"))
    }

    pub fn min_setpoint_or_default(&self) -> u8 {
        self.min_setpoint.unwrap_or(DEFAULT_MIN_SETPOINT)
    }

    pub fn max_setpoint_or_default(&self) -> u8 {
        self.max_setpoint.unwrap_or(DEFAULT_MAX_SETPOINT)
    }
}

// =====================
// Command payloads
// =====================

/// Device-native vacation end fields (`/setVacation`).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VacationFields {
    /// Two-digit year.
    pub year: u32,
    pub month: u32,
    pub day: u32,
    /// 0 = Sunday .. 6 = Saturday.
    pub weekday: u32,
    pub hour: u32,
    /// Target temperature once the vacation ends.
    pub temperature: f64,
}

/// Device clock fields (`/setdate`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockFields {
    /// Time zone name with `/` and `:` stripped, e.g. `EuropeSofia`.
    pub offset: String,
    pub day: u32,
    pub month: u32,
    pub year: i32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}
