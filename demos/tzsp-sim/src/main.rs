//! tzsp-sim — sends synthetic TZSP-encapsulated beacon frames at a fixed
//! rate, standing in for a real RouterOS sensor while exercising the
//! wscan-core TZSP receiver end to end.

use std::net::UdpSocket;
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "tzsp-sim", about = "Synthetic TZSP beacon sender")]
struct Args {
    /// Target address for the TZSP receiver
    #[arg(long, default_value = "127.0.0.1:37008")]
    target: String,
    /// Number of distinct simulated BSSIDs
    #[arg(long, default_value_t = 4)]
    count: u32,
    /// Beacon send interval in milliseconds
    #[arg(long, default_value_t = 200)]
    interval_ms: u64,
    /// TZSP sensor MAC tag to attach (omit to send no sensor tag, as
    /// pre-6.41 RouterOS firmware does)
    #[arg(long)]
    sensor_mac: Option<String>,
}

const TZSP_VERSION: u8 = 0x01;
const TZSP_TYPE: u8 = 0x00;
const TZSP_PROTO: u16 = 0x12;
const TAG_SIGNAL: u8 = 0x0A;
const TAG_CHANNEL: u8 = 0x12;
const TAG_SENSOR_MAC: u8 = 0x3C;
const TAG_END: u8 = 0x01;

fn parse_mac(s: &str) -> Option<[u8; 6]> {
    let mut out = [0u8; 6];
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 6 {
        return None;
    }
    for (i, part) in parts.iter().enumerate() {
        out[i] = u8::from_str_radix(part, 16).ok()?;
    }
    Some(out)
}

fn fake_bssid(index: u32) -> [u8; 6] {
    [0x02, 0x00, 0x00, 0x00, 0x00, index as u8]
}

/// Builds a minimal beacon frame: 24-byte management header plus a 12-byte
/// fixed body (timestamp/interval/capability) and two information elements
/// (SSID, DS Parameter Set) — just enough for `ie::mac80211::parse` to
/// recognise it.
fn build_beacon(bssid: [u8; 6], ssid: &str, channel: u8) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend_from_slice(&[0x80, 0x00]); // frame control: beacon
    frame.extend_from_slice(&[0x00, 0x00]); // duration
    frame.extend_from_slice(&[0xFF; 6]); // destination: broadcast
    frame.extend_from_slice(&bssid); // source
    frame.extend_from_slice(&bssid); // bssid
    frame.extend_from_slice(&[0x00, 0x00]); // sequence control

    frame.extend_from_slice(&[0u8; 8]); // timestamp
    frame.extend_from_slice(&[0x64, 0x00]); // beacon interval
    frame.extend_from_slice(&[0x31, 0x04]); // capability: ESS + privacy

    frame.push(0x00); // SSID IE
    frame.push(ssid.len() as u8);
    frame.extend_from_slice(ssid.as_bytes());

    frame.push(0x03); // DS Parameter Set IE
    frame.push(1);
    frame.push(channel);

    frame
}

fn build_tzsp_packet(frame: &[u8], rssi: i8, channel: u8, sensor_mac: Option<[u8; 6]>) -> Vec<u8> {
    let mut packet = vec![TZSP_VERSION, TZSP_TYPE];
    packet.extend_from_slice(&TZSP_PROTO.to_be_bytes());

    packet.push(TAG_SIGNAL);
    packet.push(1);
    packet.push(rssi as u8);

    packet.push(TAG_CHANNEL);
    packet.push(1);
    packet.push(channel);

    if let Some(mac) = sensor_mac {
        packet.push(TAG_SENSOR_MAC);
        packet.push(6);
        packet.extend_from_slice(&mac);
    }

    packet.push(TAG_END);
    packet.extend_from_slice(frame);
    packet
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let sensor_mac = match &args.sensor_mac {
        Some(s) => match parse_mac(s) {
            Some(mac) => Some(mac),
            None => {
                warn!("ignoring unparseable --sensor-mac {s}");
                None
            }
        },
        None => None,
    };

    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect(&args.target)?;
    info!(target = %args.target, count = args.count, "tzsp-sim sending beacons");

    let mut rng = rand::thread_rng();
    loop {
        for i in 0..args.count {
            let bssid = fake_bssid(i);
            let ssid = format!("wscan-sim-{i}");
            let channel = 1 + (i % 11) as u8;
            let rssi: i8 = rng.gen_range(-90..=-30);

            let frame = build_beacon(bssid, &ssid, channel);
            let packet = build_tzsp_packet(&frame, rssi, channel, sensor_mac);
            if let Err(e) = socket.send(&packet) {
                warn!(error = %e, "send failed");
            }
        }
        tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
    }
}
