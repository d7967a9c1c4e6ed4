//! gpsd client (C4): a reconnecting TCP session that speaks gpsd's
//! NDJSON protocol and reports fixes over an mpsc channel. Ported from
//! `gpsd.c`.
//!
//! The reference parser drives a SAX-style `yajl` callback state machine;
//! since gpsd's wire format is one self-contained JSON object per line, this
//! port parses each line with `serde_json` into a generic [`serde_json::Value`]
//! instead and inspects the handful of fields it cares about — same
//! information, a simpler mechanism available from this crate's stack.

use std::time::Duration;

use chrono::DateTime;
use serde_json::Value;
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::GpsdConfig;

const DATA_BUFFER_LEN: usize = 4096;
const DATA_TIMEOUT: Duration = Duration::from_secs(10);
const TCP_KEEPCNT: u32 = 2;
const TCP_KEEPINTVL: Duration = Duration::from_secs(10);
const TCP_KEEPIDLE: Duration = Duration::from_secs(30);
const INIT_STRING: &str = "?WATCH={\"enable\":true,\"json\":true};";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpsdInfo {
    Resolving,
    ErrResolve,
    Connecting,
    ErrConnect,
    ErrTimeout,
    ErrMismatch,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpsdMode {
    #[default]
    Invalid,
    None,
    TwoD,
    ThreeD,
}

impl GpsdMode {
    fn from_i64(v: i64) -> GpsdMode {
        match v {
            1 => GpsdMode::None,
            2 => GpsdMode::TwoD,
            3 => GpsdMode::ThreeD,
            _ => GpsdMode::Invalid,
        }
    }
}

/// One TPV (time-position-velocity) report. Every field defaults to NaN/`-1`
/// the way `gpsd_data_new` leaves them until a key is actually seen.
#[derive(Debug, Clone)]
pub struct GpsdData {
    pub device: Option<String>,
    pub mode: GpsdMode,
    pub time: i64,
    pub ept: f64,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    pub epx: f64,
    pub epy: f64,
    pub epv: f64,
    pub track: f64,
    pub speed: f64,
    pub climb: f64,
    pub eps: f64,
    pub epc: f64,
}

impl Default for GpsdData {
    fn default() -> Self {
        GpsdData {
            device: None,
            mode: GpsdMode::Invalid,
            time: -1,
            ept: f64::NAN,
            lat: f64::NAN,
            lon: f64::NAN,
            alt: f64::NAN,
            epx: f64::NAN,
            epy: f64::NAN,
            epv: f64::NAN,
            track: f64::NAN,
            speed: f64::NAN,
            climb: f64::NAN,
            eps: f64::NAN,
            epc: f64::NAN,
        }
    }
}

#[derive(Debug, Clone)]
pub enum GpsdEvent {
    Info(GpsdInfo),
    Data(GpsdData),
}

fn parse_tpv_time(s: &str) -> i64 {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.timestamp())
        .unwrap_or(-1)
}

fn parse_line(line: &str) -> Option<(bool, Option<GpsdData>)> {
    let value: Value = serde_json::from_str(line).ok()?;
    let class = value.get("class")?.as_str()?;

    if class == "VERSION" {
        return Some((true, None));
    }
    if class != "TPV" {
        return Some((false, None));
    }

    let mut data = GpsdData::default();
    if let Some(device) = value.get("device").and_then(Value::as_str) {
        data.device = Some(device.to_string());
    }
    if let Some(mode) = value.get("mode").and_then(Value::as_i64) {
        data.mode = GpsdMode::from_i64(mode);
    }
    if let Some(t) = value.get("time").and_then(Value::as_str) {
        data.time = parse_tpv_time(t);
    }
    for (key, slot) in [
        ("ept", &mut data.ept),
        ("lat", &mut data.lat),
        ("lon", &mut data.lon),
        ("alt", &mut data.alt),
        ("epx", &mut data.epx),
        ("epy", &mut data.epy),
        ("epv", &mut data.epv),
        ("track", &mut data.track),
        ("speed", &mut data.speed),
        ("climb", &mut data.climb),
        ("eps", &mut data.eps),
        ("epc", &mut data.epc),
    ] {
        if let Some(v) = value.get(key).and_then(Value::as_f64) {
            *slot = v;
        }
    }

    Some((false, Some(data)))
}

fn apply_tcp_keepalive(stream: &TcpStream) -> std::io::Result<()> {
    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(TCP_KEEPIDLE)
        .with_interval(TCP_KEEPINTVL)
        .with_retries(TCP_KEEPCNT);
    sock.set_tcp_keepalive(&keepalive)
}

/// One connect-read-disconnect cycle. Returns normally (possibly having
/// emitted `ErrMismatch`/`ErrTimeout`) whenever the socket drops so the
/// caller's reconnect loop can retry after its configured delay.
async fn run_once(config: &GpsdConfig, tx: &mpsc::Sender<GpsdEvent>, cancel: &CancellationToken) {
    let _ = tx.send(GpsdEvent::Info(GpsdInfo::Resolving)).await;
    let _ = tx.send(GpsdEvent::Info(GpsdInfo::Connecting)).await;

    let addr = format!("{}:{}", config.host, config.port);
    let mut stream = match TcpStream::connect(&addr).await {
        Ok(s) => s,
        Err(e) => {
            debug!(error = %e, "gpsd connect failed");
            let _ = tx.send(GpsdEvent::Info(GpsdInfo::ErrConnect)).await;
            return;
        }
    };

    if let Err(e) = apply_tcp_keepalive(&stream) {
        debug!(error = %e, "failed to set gpsd TCP keepalive options");
    }

    let connected_at = Instant::now();
    let mut ready = false;
    let mut buf = vec![0u8; DATA_BUFFER_LEN];
    let mut carry = String::new();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        if !ready && connected_at.elapsed() > DATA_TIMEOUT {
            let _ = tx.send(GpsdEvent::Info(GpsdInfo::ErrTimeout)).await;
            break;
        }

        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            r = timeout(Duration::from_secs(1), stream.read(&mut buf)) => r,
        };

        let n = match read {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => n,
            Ok(Err(_)) => break,
            Err(_) => continue, // 1s poll tick, matches the reference select() timeout
        };

        carry.push_str(&String::from_utf8_lossy(&buf[..n]));

        while let Some(pos) = carry.find('\n') {
            let line = carry[..pos].to_string();
            carry.drain(..=pos);
            if !handle_line(&line, &mut ready, config, &mut stream, tx).await {
                return;
            }
        }

        if carry.len() >= DATA_BUFFER_LEN {
            let line = std::mem::take(&mut carry);
            if !handle_line(&line, &mut ready, config, &mut stream, tx).await {
                return;
            }
        }
    }

    let _ = tx.send(GpsdEvent::Info(GpsdInfo::Disconnected)).await;
}

async fn handle_line(
    line: &str,
    ready: &mut bool,
    _config: &GpsdConfig,
    stream: &mut TcpStream,
    tx: &mpsc::Sender<GpsdEvent>,
) -> bool {
    let Some((is_version, data)) = parse_line(line) else {
        if !*ready {
            let _ = tx.send(GpsdEvent::Info(GpsdInfo::ErrMismatch)).await;
            return false;
        }
        return true;
    };

    if is_version && !*ready {
        *ready = true;
        let _ = tx.send(GpsdEvent::Info(GpsdInfo::Connected)).await;
        if stream.write_all(INIT_STRING.as_bytes()).await.is_err() {
            return false;
        }
        return true;
    }

    if !*ready {
        let _ = tx.send(GpsdEvent::Info(GpsdInfo::ErrMismatch)).await;
        return false;
    }

    if let Some(data) = data {
        let _ = tx.send(GpsdEvent::Data(data)).await;
    }
    true
}

/// Runs the gpsd client until `cancel` fires, reconnecting every
/// `reconnect_delay` after a dropped session (`None` disables reconnect —
/// one attempt and done, matching a `reconnect=0` config in the reference).
pub async fn run_client(
    config: GpsdConfig,
    reconnect_delay: Option<Duration>,
    tx: mpsc::Sender<GpsdEvent>,
    cancel: CancellationToken,
) {
    loop {
        run_once(&config, &tx, &cancel).await;
        if cancel.is_cancelled() {
            break;
        }
        match reconnect_delay {
            Some(delay) => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_class_marks_handshake_ready() {
        let (is_version, data) = parse_line(r#"{"class":"VERSION","release":"3.22"}"#).unwrap();
        assert!(is_version);
        assert!(data.is_none());
    }

    #[test]
    fn tpv_class_extracts_known_fields() {
        let line = r#"{"class":"TPV","device":"/dev/ttyUSB0","mode":3,"lat":52.1,"lon":21.0,"time":"2023-05-01T12:00:00.000Z"}"#;
        let (is_version, data) = parse_line(line).unwrap();
        assert!(!is_version);
        let data = data.unwrap();
        assert_eq!(data.device.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(data.mode, GpsdMode::ThreeD);
        assert!((data.lat - 52.1).abs() < 1e-9);
        assert!(data.time > 0);
    }

    #[test]
    fn unrecognised_class_is_not_an_error() {
        let (is_version, data) = parse_line(r#"{"class":"DEVICES"}"#).unwrap();
        assert!(!is_version);
        assert!(data.is_none());
    }

    #[test]
    fn malformed_json_returns_none() {
        assert!(parse_line("not json").is_none());
    }

    #[test]
    fn missing_tpv_fields_stay_at_sentinel_defaults() {
        let (_, data) = parse_line(r#"{"class":"TPV"}"#).unwrap();
        let data = data.unwrap();
        assert_eq!(data.time, -1);
        assert!(data.lat.is_nan());
        assert_eq!(data.mode, GpsdMode::Invalid);
    }
}
