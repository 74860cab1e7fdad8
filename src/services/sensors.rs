//! Read-side mapping from the raw snapshot to sensor readings and the water-heater view.

use crate::models::tesy::{DeviceSnapshot, Endpoint, OperationMode, SensorValue};
use log::{error, warn};

/// A passthrough sensor: one field of one endpoint.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SensorSpec {
    pub endpoint: Endpoint,
    pub key: &'static str,
    pub name: &'static str,
    pub unit: Option<&'static str>,
}

const fn sensor(endpoint: Endpoint, key: &'static str, name: &'static str, unit: Option<&'static str>) -> SensorSpec {
    SensorSpec {
        endpoint,
        key,
        name,
        unit,
    }
}

pub const SENSORS: [SensorSpec; 15] = [
    sensor(Endpoint::Status, "heater_state", "Heater State", None),
    sensor(Endpoint::Status, "mode", "Mode", None),
    sensor(Endpoint::Status, "err_flag", "Error Flag", None),
    sensor(Endpoint::Status, "lockB", "Child Lock Status", None),
    sensor(Endpoint::Status, "boost", "Boost Mode", None),
    sensor(Endpoint::Status, "watts", "Power Consumption", Some("W")),
    sensor(Endpoint::Status, "gradus", "Current Temperature", Some("°C")),
    sensor(Endpoint::Status, "ref_gradus", "Target Temperature", Some("°C")),
    sensor(Endpoint::Status, "mix40", "Mix 40L", Some("L")),
    sensor(Endpoint::Status, "date", "Date/Time", None),
    sensor(Endpoint::Status, "tz", "Time Zone", None),
    sensor(Endpoint::CalcRes, "sum", "Total Energy", Some("Wh")),
    sensor(Endpoint::CalcRes, "resetDate", "Reset Date", None),
    sensor(Endpoint::CalcRes, "volume", "Water Volume", Some("L")),
    sensor(Endpoint::CalcRes, "watt", "Current Power", Some("W")),
];

pub const STATE_OFF: &str = "off";
pub const STATE_PERFORMANCE: &str = "performance";
pub const UNKNOWN: &str = "Unknown";

/// Borrowed read accessors over a snapshot.
#[derive(Debug, Copy, Clone)]
pub struct DeviceView<'a> {
    snapshot: &'a DeviceSnapshot,
}

impl<'a> DeviceView<'a> {
    pub fn new(snapshot: &'a DeviceSnapshot) -> Self {
        DeviceView { snapshot }
    }

    pub fn reading(&self, endpoint: Endpoint, key: &str) -> Option<SensorValue> {
        self.snapshot.field(endpoint, key).and_then(SensorValue::from_json)
    }

    pub fn sensor(&self, spec: &SensorSpec) -> Option<SensorValue> {
        self.reading(spec.endpoint, spec.key)
    }

    /// Every catalogue sensor with its current value (None = unavailable).
    pub fn readings(&self) -> Vec<(SensorSpec, Option<SensorValue>)> {
        SENSORS.iter().map(|s| (*s, self.sensor(s))).collect()
    }

    fn number(&self, endpoint: Endpoint, key: &str) -> Option<f64> {
        self.reading(endpoint, key).and_then(|v| v.as_f64())
    }

    fn text(&self, endpoint: Endpoint, key: &str) -> Option<String> {
        self.reading(endpoint, key).map(|v| v.to_string())
    }

    /// Watt-hours estimated from the raw `sum` counter and current `watt`, truncated.
    pub fn energy_estimate(&self) -> Option<i64> {
        let estimate = self.estimate_energy();
        if estimate.is_none() {
            warn!("Energy consumption data not available");
        }
        estimate
    }

    fn estimate_energy(&self) -> Option<i64> {
        let sum = self.number(Endpoint::CalcRes, "sum")?;
        let watt = self.number(Endpoint::CalcRes, "watt")?;
        Some(((sum / 3600.0) * watt).trunc() as i64)
    }

    pub fn mac_address(&self) -> String {
        self.text(Endpoint::DevStat, "macaddr")
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn is_on(&self) -> bool {
        self.text(Endpoint::Status, "power_sw").as_deref() == Some("on")
    }

    pub fn boost_active(&self) -> bool {
        self.text(Endpoint::Status, "boost").as_deref() == Some("1")
    }

    pub fn child_lock(&self) -> bool {
        self.text(Endpoint::Status, "lockB").as_deref() == Some("on")
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.temperature("gradus", "current")
    }

    pub fn target_temperature(&self) -> Option<f64> {
        self.temperature("ref_gradus", "target")
    }

    fn temperature(&self, key: &str, what: &str) -> Option<f64> {
        let value = self.number(Endpoint::Status, key);
        if value.is_none() {
            error!("Invalid {} temperature value", what);
        }
        value
    }

    /// Raw mode code as last reported, e.g. `"1"`.
    pub fn mode_code(&self) -> Option<String> {
        self.text(Endpoint::Status, "mode")
    }

    pub fn current_operation(&self) -> Option<OperationMode> {
        self.mode_code().and_then(|c| OperationMode::from_code(&c))
    }

    pub fn current_operation_name(&self) -> &'static str {
        self.current_operation().map(OperationMode::name).unwrap_or(UNKNOWN)
    }

    /// Boost wins over everything, then power, then the operation mode.
    pub fn state(&self) -> &'static str {
        if self.boost_active() {
            STATE_PERFORMANCE
        } else if !self.is_on() {
            STATE_OFF
        } else {
            self.current_operation_name()
        }
    }

    /// Selectable operations: every mode plus On/Off while powered, only On otherwise.
    pub fn operation_list(&self) -> Vec<&'static str> {
        if self.is_on() {
            let mut ops = vec!["Off", "On"];
            ops.extend(OperationMode::ALL.iter().map(|m| m.name()));
            ops
        } else {
            vec!["On"]
        }
    }

    pub fn summary(&self) -> String {
        let fmt_temp = |t: Option<f64>| t.map(|v| format!("{v}°C")).unwrap_or_else(|| "-".to_string());
        format!(
            "state={}, temp={}, target={}, energy={}",
            self.state(),
            fmt_temp(self.number(Endpoint::Status, "gradus")),
            fmt_temp(self.number(Endpoint::Status, "ref_gradus")),
            self.estimate_energy()
                .map(|wh| format!("{wh}Wh"))
                .unwrap_or_else(|| "-".to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot_with(endpoint: Endpoint, value: serde_json::Value) -> DeviceSnapshot {
        let mut s = DeviceSnapshot::new();
        s.insert(endpoint, value);
        s
    }

    #[test]
    fn energy_estimate_from_sum_and_watt() {
        let s = snapshot_with(Endpoint::CalcRes, json!({"sum": 7200, "watt": 100}));
        assert_eq!(DeviceView::new(&s).energy_estimate(), Some(200));

        let s = snapshot_with(Endpoint::CalcRes, json!({"sum": "7201", "watt": "100"}));
        assert_eq!(DeviceView::new(&s).energy_estimate(), Some(200));
    }

    #[test]
    fn energy_estimate_unavailable_without_inputs() {
        let s = snapshot_with(Endpoint::CalcRes, json!({"sum": 7200}));
        assert_eq!(DeviceView::new(&s).energy_estimate(), None);

        let s = snapshot_with(Endpoint::CalcRes, json!({"sum": "n/a", "watt": 100}));
        assert_eq!(DeviceView::new(&s).energy_estimate(), None);

        assert_eq!(DeviceView::new(&DeviceSnapshot::new()).energy_estimate(), None);
    }

    #[test]
    fn passthrough_sensors() {
        let s = snapshot_with(
            Endpoint::Status,
            json!({"gradus": "52", "ref_gradus": 60, "watts": "2400", "tz": "EuropeSofia"}),
        );
        let view = DeviceView::new(&s);
        assert_eq!(view.current_temperature(), Some(52.0));
        assert_eq!(view.target_temperature(), Some(60.0));
        assert_eq!(
            view.reading(Endpoint::Status, "tz"),
            Some(SensorValue::Text("EuropeSofia".into()))
        );
        let readings = view.readings();
        assert_eq!(readings.len(), SENSORS.len());
        let watts = readings.iter().find(|(spec, _)| spec.key == "watts").unwrap();
        assert_eq!(watts.1.as_ref().and_then(|v| v.as_f64()), Some(2400.0));
        assert_eq!(view.mac_address(), UNKNOWN);
    }

    #[test]
    fn water_heater_state() {
        let s = snapshot_with(Endpoint::Status, json!({"power_sw": "on", "mode": "5", "boost": "0"}));
        let view = DeviceView::new(&s);
        assert!(view.is_on());
        assert_eq!(view.current_operation(), Some(OperationMode::EcoSmart));
        assert_eq!(view.state(), "Eco Smart");
        assert!(view.operation_list().contains(&"Manual"));

        let s = snapshot_with(Endpoint::Status, json!({"power_sw": "on", "mode": "1", "boost": "1"}));
        assert_eq!(DeviceView::new(&s).state(), STATE_PERFORMANCE);

        let s = snapshot_with(Endpoint::Status, json!({"power_sw": "off", "mode": "1"}));
        let view = DeviceView::new(&s);
        assert_eq!(view.state(), STATE_OFF);
        assert_eq!(view.operation_list(), vec!["On"]);

        let s = snapshot_with(Endpoint::Status, json!({"power_sw": "on", "mode": "42"}));
        assert_eq!(DeviceView::new(&s).state(), UNKNOWN);
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        let json = std::fs::read_to_string(format!("tests/data/{name}")).expect("fixture present");
        serde_json::from_str(&json).expect("parse fixture")
    }

    #[test]
    fn reads_device_fixture() {
        let mut s = DeviceSnapshot::new();
        s.insert(Endpoint::Status, load_fixture("status.json"));
        s.insert(Endpoint::CalcRes, load_fixture("calc-res.json"));
        let view = DeviceView::new(&s);

        assert_eq!(view.state(), "Manual");
        assert!(!view.child_lock());
        assert_eq!(view.energy_estimate(), Some(864_000));
        assert_eq!(view.summary(), "state=Manual, temp=58°C, target=60°C, energy=864000Wh");
        assert!(view.readings().iter().all(|(_, v)| v.is_some()));
    }

    #[test]
    fn invalid_temperature_is_unavailable() {
        let s = snapshot_with(Endpoint::Status, json!({"gradus": "--"}));
        assert_eq!(DeviceView::new(&s).current_temperature(), None);
    }
}
