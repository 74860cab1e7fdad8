//! Minimal runtime configuration helpers.
//! Everything comes from the process environment (optionally seeded from a `.env` file).

use chrono_tz::Tz;
use std::time::Duration;

pub const DEFAULT_POLL_SECS: u64 = 60;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_TIME_ZONE: &str = "UTC";

#[derive(Debug, Clone)]
pub struct Config {
    /// Device address: IP, host name or full `http://` base URL.
    pub host: String,
    /// Device id (`devid`). When absent it is read from `/devstat` at startup.
    pub device_id: Option<String>,
    /// MAC address as reported by `/devstat`; informational only.
    pub mac_address: Option<String>,
    /// Polling cadence.
    pub poll_interval: Duration,
    /// Per-request timeout.
    pub http_timeout: Duration,
    /// IANA zone the device clock follows.
    pub time_zone: Tz,
    /// Push the current local time to the device before polling starts.
    pub sync_time_on_start: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let host = match std::env::var("TESY_HOST") {
            Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => return Err("Missing device address: set TESY_HOST (e.g. 192.168.1.50)".to_string()),
        };

        let device_id = non_empty_var("TESY_DEVICE_ID");
        let mac_address = non_empty_var("TESY_MAC");

        let poll_secs = parse_secs("POLL_INTERVAL_SECS", DEFAULT_POLL_SECS)?;
        let timeout_secs = parse_secs("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;

        let zone_name = non_empty_var("TESY_TIME_ZONE").unwrap_or_else(|| DEFAULT_TIME_ZONE.to_string());
        let time_zone = zone_name
            .parse::<Tz>()
            .map_err(|_| format!("TESY_TIME_ZONE must be an IANA zone name (got {:?})", zone_name))?;

        let sync_time_on_start = std::env::var("SYNC_TIME_ON_START")
            .ok()
            .map(|s| matches!(s.as_str(), "1" | "true" | "TRUE"))
            .unwrap_or(false);

        Ok(Config {
            host,
            device_id,
            mac_address,
            poll_interval: Duration::from_secs(poll_secs),
            http_timeout: Duration::from_secs(timeout_secs),
            time_zone,
            sync_time_on_start,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_secs(name: &str, default: u64) -> Result<u64, String> {
    match non_empty_var(name) {
        None => Ok(default),
        Some(s) => match s.parse::<u64>() {
            Ok(0) => Err(format!("{} must be greater than zero", name)),
            Ok(v) => Ok(v),
            Err(_) => Err(format!("{} must be a whole number of seconds (got {:?})", name, s)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_fall_back_to_default() {
        assert_eq!(
            parse_secs("TESY_BRIDGE_CONFIG_UNSET_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
            Ok(15)
        );
    }

    #[test]
    fn seconds_must_be_positive_whole_numbers() {
        unsafe {
            std::env::set_var("TESY_BRIDGE_CONFIG_ZERO_SECS", "0");
            std::env::set_var("TESY_BRIDGE_CONFIG_TEXT_SECS", "soon");
            std::env::set_var("TESY_BRIDGE_CONFIG_GOOD_SECS", " 30 ");
        }
        assert!(parse_secs("TESY_BRIDGE_CONFIG_ZERO_SECS", 60).is_err());
        assert!(parse_secs("TESY_BRIDGE_CONFIG_TEXT_SECS", 60).is_err());
        assert_eq!(parse_secs("TESY_BRIDGE_CONFIG_GOOD_SECS", 60), Ok(30));
    }
}
