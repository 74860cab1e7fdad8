//! Write commands. Each maps to one GET; failures are logged and reported as `false`.
//! A successful command refreshes the coordinator so the next read reflects it.

use crate::client::TesyClientError;
use crate::models::tesy::{DeviceProfile, OperationMode, Switch};
use crate::services::poller::Coordinator;
use crate::utils::{clock_fields, vacation_fields};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::{debug, error, info, warn};
use std::thread;
use std::time::Duration;

pub const SET_TEMPERATURE_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct Dispatcher {
    profile: DeviceProfile,
    retry_delay: Duration,
}

impl Dispatcher {
    pub fn new(profile: DeviceProfile) -> Self {
        Dispatcher {
            profile,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Pause between set-temperature attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn finish(coordinator: &mut Coordinator, what: &str, result: Result<(), TesyClientError>) -> bool {
        match result {
            Ok(()) => {
                info!("Successfully set {}", what);
                coordinator.refresh();
                true
            }
            Err(e) => {
                error!("Failed to set {}: {}", what, e);
                false
            }
        }
    }

    pub fn set_power(&self, coordinator: &mut Coordinator, state: Switch) -> bool {
        let result = coordinator.client().set_power(state);
        Self::finish(coordinator, &format!("power {}", state.as_str()), result)
    }

    /// Power on, then restore the mode the device reported before (Manual if unknown).
    pub fn turn_on(&self, coordinator: &mut Coordinator) -> bool {
        let last_mode = coordinator.view().mode_code();
        if !self.set_power(coordinator, Switch::On) {
            return false;
        }
        match last_mode {
            Some(code) => {
                let mode = OperationMode::from_code(&code).unwrap_or(OperationMode::Manual);
                self.apply_mode(coordinator, mode)
            }
            None => true,
        }
    }

    pub fn turn_off(&self, coordinator: &mut Coordinator) -> bool {
        self.set_power(coordinator, Switch::Off)
    }

    pub fn apply_mode(&self, coordinator: &mut Coordinator, mode: OperationMode) -> bool {
        let result = coordinator.client().set_operation_mode(mode);
        Self::finish(coordinator, &format!("operation mode {}", mode), result)
    }

    /// Select an operation by display name. `On`/`Off` go through the power command.
    pub fn set_operation_mode(&self, coordinator: &mut Coordinator, name: &str) -> bool {
        let name = name.trim();
        if name.eq_ignore_ascii_case("on") {
            return self.turn_on(coordinator);
        }
        if name.eq_ignore_ascii_case("off") {
            return self.turn_off(coordinator);
        }

        let valid = coordinator.view().operation_list();
        if !valid.iter().any(|v| v.eq_ignore_ascii_case(name)) {
            error!("Invalid operation mode: {}. Valid modes are: {}", name, valid.join(", "));
            return false;
        }
        match OperationMode::from_name(name) {
            Some(mode) => self.apply_mode(coordinator, mode),
            None => {
                error!("Invalid operation mode mapping: {}", name);
                false
            }
        }
    }

    /// Switch to Manual when needed, then set the target with bounded retries.
    pub fn set_temperature(&self, coordinator: &mut Coordinator, celsius: f64) -> bool {
        let min = f64::from(self.profile.min_setpoint_or_default());
        let max = f64::from(self.profile.max_setpoint_or_default());
        if !celsius.is_finite() || celsius < min || celsius > max {
            error!("Temperature {} outside supported range {}..={}", celsius, min, max);
            return false;
        }

        let manual = OperationMode::Manual;
        if coordinator.view().mode_code().as_deref() != Some(manual.code()) {
            debug!("Switching to manual mode before setting temperature");
            if let Err(e) = coordinator.client().set_operation_mode(manual) {
                error!("Failed to switch to manual mode: {}", e);
                return false;
            }
        }

        let client = coordinator.client();
        let mut attempt = 0;
        let succeeded = loop {
            attempt += 1;
            match client.set_temperature(celsius) {
                Ok(()) => break true,
                Err(e) if e.is_retryable() && attempt < SET_TEMPERATURE_ATTEMPTS => {
                    warn!(
                        "Failed to set temperature, retrying... (Attempt {}/{}): {}",
                        attempt, SET_TEMPERATURE_ATTEMPTS, e
                    );
                    thread::sleep(self.retry_delay);
                }
                Err(e) => {
                    error!("Failed to set temperature to {} after {} attempt(s): {}", celsius, attempt, e);
                    break false;
                }
            }
        };

        if succeeded {
            info!("Successfully set temperature to {}", celsius);
        }
        // The mode switch may have gone through even if the temperature did not.
        coordinator.refresh();
        succeeded
    }

    pub fn set_child_lock(&self, coordinator: &mut Coordinator, state: Switch) -> bool {
        let result = coordinator.client().set_child_lock(state);
        Self::finish(coordinator, &format!("child lock {}", state.as_str()), result)
    }

    pub fn set_boost(&self, coordinator: &mut Coordinator, enabled: bool) -> bool {
        let result = coordinator.client().set_boost(enabled);
        Self::finish(coordinator, &format!("boost mode to {}", enabled), result)
    }

    /// Schedule vacation until `vacation_end` (`YYYY-MM-DDTHH:MM:SS`), resuming at `temperature`.
    pub fn set_vacation(&self, coordinator: &mut Coordinator, vacation_end: &str, temperature: f64) -> bool {
        let fields = match vacation_fields(vacation_end, temperature) {
            Ok(f) => f,
            Err(e) => {
                error!("Invalid vacation request: {}", e);
                return false;
            }
        };
        debug!("Vacation fields: {:?}", fields);
        let result = coordinator.client().set_vacation(&fields);
        Self::finish(
            coordinator,
            &format!("vacation mode until {} (temp={})", vacation_end, temperature),
            result,
        )
    }

    /// Push `now`, as local time in `zone`, to the device clock.
    pub fn sync_time(&self, coordinator: &mut Coordinator, zone: Tz, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&zone);
        let fields = clock_fields(zone.name(), &local);
        let result = coordinator.client().set_date(&fields);
        Self::finish(coordinator, &format!("device time to {}", local), result)
    }
}
