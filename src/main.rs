pub mod models {
    pub mod tesy;
}

pub mod client;
pub mod config;
pub mod env_file;
pub mod utils;
pub mod services {
    pub mod commands;
    pub mod poller;
    pub mod schedule;
    pub mod sensors;
}

use crate::client::TesyClient;
use crate::config::Config;
use crate::env_file::{EnvFile, EnvFileError};
use crate::models::tesy::{DeviceProfile, ScheduleKind, Switch};
use crate::services::commands::Dispatcher;
use crate::services::poller::{self, Coordinator};
use crate::services::schedule;
use chrono::Utc;
use log::{error, info, warn};
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

#[derive(Debug, Clone, PartialEq)]
enum CliCommand {
    Run,
    Status,
    Schedule,
    Power(Switch),
    Mode(String),
    Temperature(f64),
    Lock(Switch),
    Boost(bool),
    Vacation { end: String, temperature: f64 },
    SyncTime,
}

#[derive(Debug)]
struct CliArgs {
    env_file: Option<PathBuf>,
    command: CliCommand,
}

const USAGE: &str = "usage: tesy-bridge [--env-file PATH] \
[run | status | schedule | power on|off | mode NAME | temp C | lock on|off | boost on|off | vacation YYYY-MM-DDTHH:MM:SS C | sync-time]";

/// Resolve the device id (configured or read from `/devstat`) and its static profile.
fn identify_device(cfg: &Config, client: &TesyClient) -> Result<(String, DeviceProfile), String> {
    let device_id = match cfg.device_id.clone() {
        Some(id) => id,
        None => {
            let devstat = client
                .get_devstat()
                .map_err(|e| format!("Failed to fetch device info from {}: {}", client.base_url(), e))?;
            if let Some(mac) = devstat.macaddr.as_deref() {
                info!("Device MAC address: {}", mac);
            }
            devstat
                .devid
                .filter(|id| !id.trim().is_empty())
                .ok_or_else(|| "Device ID is missing in /devstat response".to_string())?
        }
    };

    let profile = DeviceProfile::lookup(&device_id);
    if !profile.is_known() {
        warn!("Unknown device type for id {}; using default setpoint limits", device_id);
    }
    Ok((device_id, profile))
}

fn run(cli: CliArgs) -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (host={}, poll_interval={}s, http_timeout={}s, time_zone={}, sync_time_on_start={})",
        cfg.host,
        cfg.poll_interval.as_secs(),
        cfg.http_timeout.as_secs(),
        cfg.time_zone.name(),
        cfg.sync_time_on_start
    );

    // 2) Init client and identify the device
    let client = TesyClient::new(&cfg.host, cfg.http_timeout);
    let (device_id, profile) = identify_device(&cfg, &client)?;
    info!(
        "Device {} ({}) setpoint range {}..={}°C{}",
        device_id,
        profile.display_name(),
        profile.min_setpoint_or_default(),
        profile.max_setpoint_or_default(),
        cfg.mac_address
            .as_deref()
            .map(|m| format!(", mac {}", m))
            .unwrap_or_default()
    );

    // 3) First refresh
    let mut coordinator = Coordinator::new(&client);
    if coordinator.refresh() == 0 {
        warn!("Initial refresh returned no data; is {} reachable?", client.base_url());
    }
    let dispatcher = Dispatcher::new(profile);

    // 4) Dispatch
    let ok = match cli.command {
        CliCommand::Run => {
            if cfg.sync_time_on_start && !dispatcher.sync_time(&mut coordinator, cfg.time_zone, Utc::now()) {
                warn!("Device time sync failed; continuing");
            }
            info!("Starting poll loop: interval={}s", cfg.poll_interval.as_secs());
            // Never raised here; the process runs until it is terminated.
            let stop = AtomicBool::new(false);
            poller::run_loop(&mut coordinator, cfg.poll_interval, &stop);
            true
        }
        CliCommand::Status => {
            print_status(&coordinator, &profile);
            true
        }
        CliCommand::Schedule => {
            let now = Utc::now().with_timezone(&cfg.time_zone);
            for kind in ScheduleKind::ALL {
                println!(
                    "{} Schedule {}: {}",
                    profile.display_name(),
                    kind.display_name().to_uppercase(),
                    schedule::lookup_at(coordinator.snapshot(), kind, &now)
                );
            }
            true
        }
        CliCommand::Power(Switch::On) => dispatcher.turn_on(&mut coordinator),
        CliCommand::Power(Switch::Off) => dispatcher.turn_off(&mut coordinator),
        CliCommand::Mode(name) => dispatcher.set_operation_mode(&mut coordinator, &name),
        CliCommand::Temperature(t) => dispatcher.set_temperature(&mut coordinator, t),
        CliCommand::Lock(state) => dispatcher.set_child_lock(&mut coordinator, state),
        CliCommand::Boost(enabled) => dispatcher.set_boost(&mut coordinator, enabled),
        CliCommand::Vacation { end, temperature } => dispatcher.set_vacation(&mut coordinator, &end, temperature),
        CliCommand::SyncTime => dispatcher.sync_time(&mut coordinator, cfg.time_zone, Utc::now()),
    };

    if ok {
        info!("{}", coordinator.view().summary());
        Ok(())
    } else {
        Err("command failed".to_string())
    }
}

fn print_status(coordinator: &Coordinator, profile: &DeviceProfile) {
    let view = coordinator.view();
    let name = profile.display_name();
    for (spec, value) in view.readings() {
        let shown = value.map(|v| v.to_string()).unwrap_or_else(|| "unavailable".to_string());
        match spec.unit {
            Some(unit) => println!("{} {}: {} {}", name, spec.name, shown, unit),
            None => println!("{} {}: {}", name, spec.name, shown),
        }
    }
    println!(
        "{} Energy Consumption: {}",
        name,
        view.energy_estimate()
            .map(|wh| format!("{} Wh", wh))
            .unwrap_or_else(|| "unavailable".to_string())
    );
    println!("{} State: {}", name, view.state());
    println!("{} Operation list: {}", name, view.operation_list().join(", "));
    println!("{} Child Lock: {}", name, if view.child_lock() { "on" } else { "off" });
    println!("{} MAC: {}", name, view.mac_address());
    if let Some(ts) = coordinator.last_success() {
        println!("{} Last update: {}", name, ts.to_rfc3339());
    }
}

fn parse_cli<I: IntoIterator<Item = OsString>>(args: I) -> Result<CliArgs, String> {
    let mut args = args.into_iter();
    let mut env_file: Option<PathBuf> = None;
    let mut words: Vec<String> = Vec::new();

    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("--env-file") => {
                if env_file.is_some() {
                    return Err("`--env-file` provided more than once".to_string());
                }
                let value = args
                    .next()
                    .ok_or_else(|| "`--env-file` requires a path argument".to_string())?;
                env_file = Some(PathBuf::from(value));
            }
            Some(s) if s.starts_with("--env-file=") => {
                if env_file.is_some() {
                    return Err("`--env-file` provided more than once".to_string());
                }
                let path_str = &s["--env-file=".len()..];
                if path_str.is_empty() {
                    return Err("`--env-file` requires a path argument".to_string());
                }
                env_file = Some(PathBuf::from(path_str));
            }
            Some("-h") | Some("--help") => return Err(USAGE.to_string()),
            Some(s) if s.starts_with("--") => return Err(format!("unrecognised argument: {}", s)),
            Some(s) => words.push(s.to_string()),
            None => return Err("argument contains invalid UTF-8".to_string()),
        }
    }

    Ok(CliArgs {
        env_file,
        command: parse_command(&words)?,
    })
}

fn parse_command(words: &[String]) -> Result<CliCommand, String> {
    let words: Vec<&str> = words.iter().map(String::as_str).collect();
    let switch = |s: &str| Switch::parse(s).ok_or_else(|| format!("expected on|off, got {:?}", s));
    let celsius = |s: &str| {
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("expected a temperature in °C, got {:?}", s))
    };

    match words.as_slice() {
        [] | ["run"] => Ok(CliCommand::Run),
        ["status"] => Ok(CliCommand::Status),
        ["schedule"] => Ok(CliCommand::Schedule),
        ["power", s] => Ok(CliCommand::Power(switch(*s)?)),
        ["mode", rest @ ..] if !rest.is_empty() => Ok(CliCommand::Mode(rest.join(" "))),
        ["temp", t] => Ok(CliCommand::Temperature(celsius(*t)?)),
        ["lock", s] => Ok(CliCommand::Lock(switch(*s)?)),
        ["boost", s] => Ok(CliCommand::Boost(switch(*s)?.is_on())),
        ["vacation", end, t] => Ok(CliCommand::Vacation {
            end: end.to_string(),
            temperature: celsius(*t)?,
        }),
        ["sync-time"] => Ok(CliCommand::SyncTime),
        _ => Err(format!("unrecognised command: {}\n{}", words.join(" "), USAGE)),
    }
}

/// Load the env file the user named, or `./.env` when present.
fn load_env(explicit: Option<PathBuf>) -> Result<Option<(EnvFile, usize)>, EnvFileError> {
    let Some(file) = EnvFile::locate(explicit)? else {
        return Ok(None);
    };
    let applied = file.apply()?;
    Ok(Some((file, applied)))
}

fn main() {
    let cli = match parse_cli(std::env::args_os().skip(1)) {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(2);
        }
    };
    let loaded_env = match load_env(cli.env_file.clone()) {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some((file, applied)) = loaded_env.as_ref() {
        let origin = if file.explicit { "CLI-specified" } else { "default" };
        info!(
            "Environment loaded from {} .env file {}: {} variable(s) applied",
            origin,
            file.path.display(),
            applied
        );
    }

    info!(
        "tesy-bridge {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(cli) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Result<CliArgs, String> {
        parse_cli(args.iter().map(OsString::from))
    }

    #[test]
    fn parses_commands() {
        assert_eq!(cli(&[]).unwrap().command, CliCommand::Run);
        assert_eq!(cli(&["power", "off"]).unwrap().command, CliCommand::Power(Switch::Off));
        assert_eq!(cli(&["boost", "on"]).unwrap().command, CliCommand::Boost(true));
        assert_eq!(
            cli(&["mode", "Eco", "Comfort"]).unwrap().command,
            CliCommand::Mode("Eco Comfort".into())
        );
        assert_eq!(
            cli(&["--env-file=prod.env", "vacation", "2025-03-10T14:00:00", "45"])
                .unwrap()
                .command,
            CliCommand::Vacation {
                end: "2025-03-10T14:00:00".into(),
                temperature: 45.0
            }
        );
        assert!(cli(&["temp", "hot"]).is_err());
        assert!(cli(&["lock"]).is_err());
        assert!(cli(&["--verbose"]).is_err());
    }

    #[test]
    fn env_file_flag_only_once() {
        let parsed = cli(&["--env-file", "a.env", "status"]).unwrap();
        assert_eq!(parsed.env_file, Some(PathBuf::from("a.env")));
        assert!(cli(&["--env-file", "a.env", "--env-file=b.env"]).is_err());
        assert!(cli(&["--env-file"]).is_err());
    }
}
