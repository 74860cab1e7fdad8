use crate::client::{TesyClient, TesyClientError};
use crate::models::tesy::{DeviceSnapshot, Endpoint};
use crate::services::sensors::DeviceView;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Fetch every polled endpoint once. Failed or empty endpoints are logged and left out.
pub fn poll_once(client: &TesyClient) -> DeviceSnapshot {
    let mut tick = DeviceSnapshot::new();
    for endpoint in Endpoint::POLLED {
        match client.fetch(endpoint) {
            Ok(value) => tick.insert(endpoint, value),
            Err(TesyClientError::EmptyBody) => warn!("Empty {} data received", endpoint),
            Err(TesyClientError::Http { status, .. }) => {
                error!("Failed to fetch {}: HTTP {}", endpoint, status)
            }
            Err(e) => error!("Failed to fetch {}: {}", endpoint, e),
        }
    }
    debug!(
        "Poll: {}/{} endpoint(s) answered",
        tick.len(),
        Endpoint::POLLED.len()
    );
    tick
}

/// Owns the last-known-good snapshot. Polls and commands go through it one at a time.
pub struct Coordinator<'a> {
    client: &'a TesyClient,
    snapshot: DeviceSnapshot,
    last_success: Option<DateTime<Utc>>,
}

impl<'a> Coordinator<'a> {
    pub fn new(client: &'a TesyClient) -> Self {
        Coordinator {
            client,
            snapshot: DeviceSnapshot::new(),
            last_success: None,
        }
    }

    pub fn client(&self) -> &'a TesyClient {
        self.client
    }

    pub fn snapshot(&self) -> &DeviceSnapshot {
        &self.snapshot
    }

    pub fn view(&self) -> DeviceView<'_> {
        DeviceView::new(&self.snapshot)
    }

    /// Time of the last tick in which at least one endpoint answered.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    /// Poll now and merge the result. Returns how many endpoints were refreshed.
    pub fn refresh(&mut self) -> usize {
        let tick = poll_once(self.client);
        if tick.is_empty() {
            warn!("Poll: no endpoint answered; serving last known state");
            return 0;
        }
        self.last_success = Some(Utc::now());
        let refreshed = tick.len();
        self.snapshot.merge(tick);
        refreshed
    }
}

/// Longest stretch the loop sleeps without looking at the stop flag.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Poll on a steady cadence until `stop` is raised.
///
/// The flag is checked after every tick and throughout the wait, so raising it never
/// costs another poll.
pub fn run_loop(coordinator: &mut Coordinator, interval: Duration, stop: &AtomicBool) {
    loop {
        let next_tick = Instant::now() + interval;

        let refreshed = coordinator.refresh();
        info!("Poll: {} endpoint(s) refreshed; {}", refreshed, coordinator.view().summary());

        if wait_until(next_tick, stop) {
            info!("Poll loop stopped");
            return;
        }
    }
}

/// Sleep until `deadline` in short slices. Returns true as soon as `stop` is seen raised.
fn wait_until(deadline: Instant, stop: &AtomicBool) -> bool {
    loop {
        if stop.load(Ordering::Relaxed) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep((deadline - now).min(STOP_CHECK_INTERVAL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Mock, Server};
    use serde_json::json;

    fn mock_ok(server: &mut Server, path: &str, body: &str) -> Mock {
        server.mock("GET", path).with_status(200).with_body(body).create()
    }

    fn client_for(server: &Server) -> TesyClient {
        TesyClient::new(server.url(), Duration::from_secs(5))
    }

    #[test]
    fn collects_successful_endpoints_and_skips_failures() {
        let mut server = Server::new();
        let status = mock_ok(&mut server, "/status", r#"{"gradus":"48","power_sw":"on"}"#);
        let calc = server.mock("GET", "/calcRes").with_status(503).create();
        let devstat = mock_ok(&mut server, "/devstat", "");
        let p1 = mock_ok(&mut server, "/getP1", r#"[{"Mon":{"h09":"45"}}]"#);
        let p2 = mock_ok(&mut server, "/getP2", "[]");
        let p3 = server.mock("GET", "/getP3").with_status(404).create();
        let vac = mock_ok(&mut server, "/getVacation", r#"{"vTemp":"30"}"#);

        let tick = poll_once(&client_for(&server));

        assert!(tick.contains(Endpoint::Status));
        assert!(!tick.contains(Endpoint::CalcRes));
        assert!(!tick.contains(Endpoint::DevStat));
        assert!(tick.contains(Endpoint::P1));
        assert!(!tick.contains(Endpoint::P2));
        assert!(!tick.contains(Endpoint::P3));
        assert_eq!(tick.field(Endpoint::Vacation, "vTemp"), Some(&json!("30")));

        for m in [status, calc, devstat, p1, p2, p3, vac] {
            m.assert();
        }
    }

    #[test]
    fn refresh_keeps_last_known_good_values() {
        let mut server = Server::new();
        let first = server
            .mock("GET", "/calcRes")
            .with_status(200)
            .with_body(r#"{"sum":"7200","watt":"100"}"#)
            .expect(1)
            .create();
        let client = client_for(&server);
        let mut coordinator = Coordinator::new(&client);

        assert_eq!(coordinator.refresh(), 1);
        assert!(coordinator.last_success().is_some());
        first.assert();

        first.remove();
        server.mock("GET", "/calcRes").with_status(500).create();

        assert_eq!(coordinator.refresh(), 0);
        assert_eq!(
            coordinator.snapshot().field(Endpoint::CalcRes, "sum"),
            Some(&json!("7200"))
        );
    }

    #[test]
    fn run_loop_honours_stop_flag() {
        let mut server = Server::new();
        let status = server
            .mock("GET", "/status")
            .with_status(200)
            .with_body(r#"{"gradus":"50"}"#)
            .expect(1)
            .create();
        let client = client_for(&server);
        let mut coordinator = Coordinator::new(&client);
        let stop = AtomicBool::new(true);

        run_loop(&mut coordinator, Duration::from_secs(60), &stop);

        status.assert();
        assert!(coordinator.snapshot().contains(Endpoint::Status));
    }

    #[test]
    fn stop_raised_while_waiting_skips_next_poll() {
        let mut server = Server::new();
        let status = server
            .mock("GET", "/status")
            .with_status(200)
            .with_body(r#"{"gradus":"50"}"#)
            .expect(1)
            .create();
        let client = client_for(&server);
        let mut coordinator = Coordinator::new(&client);
        let stop = AtomicBool::new(false);

        let start = Instant::now();
        thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(200));
                stop.store(true, Ordering::Relaxed);
            });
            run_loop(&mut coordinator, Duration::from_secs(1), &stop);
        });
        let elapsed = start.elapsed();

        status.assert();
        assert!(elapsed < Duration::from_millis(800), "elapsed={:?}", elapsed);
    }

    #[test]
    fn wait_until_runs_to_deadline_without_stop() {
        let stop = AtomicBool::new(false);
        let start = Instant::now();
        assert!(!wait_until(start + Duration::from_millis(250), &stop));
        assert!(start.elapsed() >= Duration::from_millis(250));
    }
}
