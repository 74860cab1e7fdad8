//! Blocking HTTP client for the Tesy local device API.
//!
//! - Blocking client using `ureq` (no async).
//! - Every endpoint is a GET; writes carry their arguments in the query string.
//! - Bodies are parsed as JSON whatever content type the device declares (it often declares none).
//! - Non-200 responses are surfaced as `TesyClientError::Http`; callers decide whether to retry.

use http::StatusCode;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::models::tesy::*;

#[derive(Debug)]
pub enum TesyClientError {
    Transport(String),
    Http { status: u16, message: String },
    EmptyBody,
    Json(serde_json::Error),
    Decode(String),
}

impl core::fmt::Display for TesyClientError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TesyClientError::Transport(s) => write!(f, "transport error: {}", s),
            TesyClientError::Http { status, message } => write!(f, "http {}: {}", status, message),
            TesyClientError::EmptyBody => write!(f, "empty response body"),
            TesyClientError::Json(e) => write!(f, "json error: {}", e),
            TesyClientError::Decode(e) => write!(f, "decode error: {}", e),
        }
    }
}

impl std::error::Error for TesyClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TesyClientError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TesyClientError {
    fn from(value: serde_json::Error) -> Self {
        TesyClientError::Json(value)
    }
}

impl From<ureq::Error> for TesyClientError {
    fn from(value: ureq::Error) -> Self {
        TesyClientError::Transport(value.to_string())
    }
}

impl TesyClientError {
    /// Failures worth another attempt: the request never completed or the device refused it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TesyClientError::Transport(_) | TesyClientError::Http { .. })
    }
}

pub struct TesyClient {
    agent: ureq::Agent,
    base_url: String,
}

impl TesyClient {
    /// `base_url` is either `http://host[:port]` or a bare host/IP.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();

        TesyClient {
            agent: ureq::Agent::new_with_config(config),
            base_url: normalize_base_url(base_url.into()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Issue a GET and return the body of a 200 response.
    fn call(&self, path: &str, query: &[(&str, String)]) -> Result<String, TesyClientError> {
        let url = self.url(path);
        let mut req = self.agent.get(url.as_str()).header("Accept", "application/json");
        for (k, v) in query {
            req = req.query(*k, v);
        }
        debug!("GET {} {:?}", url, query);

        let mut res = req.call()?;
        let status = res.status();
        let body = res.body_mut().read_to_string().unwrap_or_default();
        if status == StatusCode::OK {
            Ok(body)
        } else {
            let message = if body.trim().is_empty() {
                String::from("<no body>")
            } else {
                body
            };
            Err(TesyClientError::Http {
                status: status.as_u16(),
                message,
            })
        }
    }

    /// GET `path` and parse the body as JSON. Falsy payloads (`""`, `null`, `{}`, `[]`, `0`, `false`) are errors.
    pub fn get_json(&self, path: &str) -> Result<Value, TesyClientError> {
        let body = self.call(path, &[])?;
        parse_payload(&body)
    }

    fn get_typed<T: DeserializeOwned>(&self, path: &str) -> Result<T, TesyClientError> {
        let value = self.get_json(path)?;
        serde_path_to_error::deserialize(value).map_err(|e| TesyClientError::Decode(e.to_string()))
    }

    pub fn fetch(&self, endpoint: Endpoint) -> Result<Value, TesyClientError> {
        self.get_json(endpoint.path())
    }

    pub fn get_devstat(&self) -> Result<DevStat, TesyClientError> {
        self.get_typed(Endpoint::DevStat.path())
    }

    /// Fire a write command. Success is any 200; the body is ignored.
    pub fn command(&self, path: &str, query: &[(&str, String)]) -> Result<(), TesyClientError> {
        self.call(path, query).map(|_| ())
    }

    pub fn set_power(&self, state: Switch) -> Result<(), TesyClientError> {
        self.command("/power", &[("val", state.as_str().to_string())])
    }

    pub fn set_temperature(&self, celsius: f64) -> Result<(), TesyClientError> {
        self.command("/setTemp", &[("val", format_temperature(celsius))])
    }

    pub fn set_operation_mode(&self, mode: OperationMode) -> Result<(), TesyClientError> {
        self.command("/modeSW", &[("mode", mode.code().to_string())])
    }

    pub fn set_child_lock(&self, state: Switch) -> Result<(), TesyClientError> {
        self.command("/lockKey", &[("val", state.as_str().to_string())])
    }

    pub fn set_boost(&self, enabled: bool) -> Result<(), TesyClientError> {
        let mode = if enabled { "1" } else { "0" };
        self.command("/boostSW", &[("mode", mode.to_string())])
    }

    pub fn set_vacation(&self, fields: &VacationFields) -> Result<(), TesyClientError> {
        self.command(
            "/setVacation",
            &[
                ("vYear", fields.year.to_string()),
                ("vMonth", format!("{:02}", fields.month)),
                ("vMDay", format!("{:02}", fields.day)),
                ("vWDay", fields.weekday.to_string()),
                ("vHour", format!("{:02}", fields.hour)),
                ("vTemp", format_temperature(fields.temperature)),
            ],
        )
    }

    pub fn set_date(&self, clock: &ClockFields) -> Result<(), TesyClientError> {
        self.command(
            "/setdate",
            &[
                ("tOffset", clock.offset.clone()),
                ("tDay", clock.day.to_string()),
                ("tMonth", clock.month.to_string()),
                ("tYear", clock.year.to_string()),
                ("tHour", clock.hour.to_string()),
                ("tMin", clock.minute.to_string()),
                ("tSec", clock.second.to_string()),
            ],
        )
    }
}

fn normalize_base_url(raw: String) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

fn parse_payload(body: &str) -> Result<Value, TesyClientError> {
    if body.trim().is_empty() {
        return Err(TesyClientError::EmptyBody);
    }
    let value: Value = serde_json::from_str(body)?;
    let empty = match &value {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
    };
    if empty { Err(TesyClientError::EmptyBody) } else { Ok(value) }
}

/// Whole degrees go out without a fraction (`55`), anything else as-is (`55.5`).
pub fn format_temperature(celsius: f64) -> String {
    if celsius.fract() == 0.0 {
        format!("{:.0}", celsius)
    } else {
        celsius.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client_for(server: &Server) -> TesyClient {
        TesyClient::new(server.url(), Duration::from_secs(5))
    }

    #[test]
    fn base_url_gets_scheme_and_loses_trailing_slash() {
        assert_eq!(normalize_base_url("192.168.1.20".into()), "http://192.168.1.20");
        assert_eq!(normalize_base_url("http://heater.lan/".into()), "http://heater.lan");
    }

    #[test]
    fn parses_json_without_content_type() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/status")
            .with_status(200)
            .with_body(r#"{"gradus":"52","power_sw":"on"}"#)
            .create();

        let value = client_for(&server).fetch(Endpoint::Status).unwrap();
        assert_eq!(value, json!({"gradus": "52", "power_sw": "on"}));
        mock.assert();
    }

    #[test]
    fn non_200_is_http_error() {
        let mut server = Server::new();
        server.mock("GET", "/calcRes").with_status(500).create();

        let err = client_for(&server).fetch(Endpoint::CalcRes).unwrap_err();
        assert!(matches!(err, TesyClientError::Http { status: 500, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn empty_payloads_are_rejected() {
        assert!(matches!(parse_payload(""), Err(TesyClientError::EmptyBody)));
        assert!(matches!(parse_payload("{}"), Err(TesyClientError::EmptyBody)));
        assert!(matches!(parse_payload("[]"), Err(TesyClientError::EmptyBody)));
        assert!(matches!(parse_payload("null"), Err(TesyClientError::EmptyBody)));
        assert!(matches!(parse_payload("{oops"), Err(TesyClientError::Json(_))));
        assert!(!TesyClientError::EmptyBody.is_retryable());
    }

    #[test]
    fn falsy_scalars_are_empty() {
        assert!(matches!(parse_payload("0"), Err(TesyClientError::EmptyBody)));
        assert!(matches!(parse_payload("0.0"), Err(TesyClientError::EmptyBody)));
        assert!(matches!(parse_payload("false"), Err(TesyClientError::EmptyBody)));
        assert_eq!(parse_payload("1").ok(), Some(json!(1)));
        assert_eq!(parse_payload("true").ok(), Some(json!(true)));
    }

    #[test]
    fn vacation_query_is_zero_padded() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/setVacation")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("vYear".into(), "25".into()),
                Matcher::UrlEncoded("vMonth".into(), "03".into()),
                Matcher::UrlEncoded("vMDay".into(), "10".into()),
                Matcher::UrlEncoded("vWDay".into(), "1".into()),
                Matcher::UrlEncoded("vHour".into(), "07".into()),
                Matcher::UrlEncoded("vTemp".into(), "55".into()),
            ]))
            .with_status(200)
            .create();

        let fields = VacationFields {
            year: 25,
            month: 3,
            day: 10,
            weekday: 1,
            hour: 7,
            temperature: 55.0,
        };
        client_for(&server).set_vacation(&fields).unwrap();
        mock.assert();
    }

    #[test]
    fn devstat_is_typed() {
        let mut server = Server::new();
        server
            .mock("GET", "/devstat")
            .with_status(200)
            .with_body(r#"{"devid":"2002-00A1","macaddr":"AA:BB:CC:DD:EE:FF"}"#)
            .create();

        let d = client_for(&server).get_devstat().unwrap();
        assert_eq!(d.devid.as_deref(), Some("2002-00A1"));
        assert_eq!(d.macaddr.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
    }

    #[test]
    fn temperature_formatting() {
        assert_eq!(format_temperature(55.0), "55");
        assert_eq!(format_temperature(55.5), "55.5");
    }
}
