//! TZSP decapsulation (C1) and the UDP receiver task (C2). Ported from
//! `tzsp-decap.c` and `tzsp-receiver.c`: a raw UDP payload goes in, a
//! [`wscan_types::NetworkRecord`] comes out over an mpsc channel.

use std::net::SocketAddr;
use std::sync::Arc;

use socket2::{Domain, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::TzspConfig;
use crate::error::{ParseError, TzspError};
use crate::ie;
use wscan_types::{Flags, MacAddr, NetworkRecord, TriState, WpsState};

const TZSP_VERSION: u8 = 0x01;
const TZSP_TYPE: u8 = 0x00;
const TZSP_PROTO: u16 = 0x12;

const TAG_PADDING: u8 = 0x00;
const TAG_END: u8 = 0x01;
const TAG_SIGNAL: u8 = 0x0A;
const TAG_RATE: u8 = 0x0C;
const TAG_FCS: u8 = 0x11;
const TAG_CHANNEL: u8 = 0x12;
const TAG_LENGTH: u8 = 0x29;
const TAG_SENSOR_MAC: u8 = 0x3C;

/// Fields extracted from the TZSP header/tag area, before the encapsulated
/// 802.11 frame itself is touched.
#[derive(Debug, Default)]
pub struct TzspMeta<'a> {
    pub rssi: Option<i8>,
    pub channel: Option<u8>,
    pub sensor_mac: Option<&'a [u8]>,
    pub frame: &'a [u8],
}

/// Walks the TZSP header and tag area, returning the metadata plus the
/// remaining encapsulated frame. Mirrors `decap_tzsp`/`tzsp_process_tags`;
/// `allow_fcs_err` is always `false` in this crate, matching the reference
/// receiver's call site.
pub fn decap(packet: &[u8]) -> Result<TzspMeta<'_>, ParseError> {
    if packet.len() <= 4 {
        return Err(ParseError::TruncatedHeader);
    }
    if packet[0] != TZSP_VERSION {
        return Err(ParseError::UnsupportedVersion(packet[0]));
    }
    if packet[1] != TZSP_TYPE {
        return Err(ParseError::UnrecognisedFrame);
    }
    let enc_proto = u16::from(packet[2]) << 8 | u16::from(packet[3]);
    if enc_proto != TZSP_PROTO {
        return Err(ParseError::UnrecognisedFrame);
    }

    process_tags(&packet[4..])
}

fn process_tags(body: &[u8]) -> Result<TzspMeta<'_>, ParseError> {
    let mut meta = TzspMeta::default();
    let mut i = 0usize;
    while i < body.len() {
        let tag = body[i];
        i += 1;

        if tag == TAG_PADDING {
            continue;
        }
        if i >= body.len() {
            return Err(ParseError::TagOverrun);
        }
        if tag == TAG_END {
            meta.frame = &body[i..];
            return Ok(meta);
        }

        let tag_len = body[i] as usize;
        i += 1;
        if i + tag_len >= body.len() {
            return Err(ParseError::TagOverrun);
        }
        let tag_data = &body[i..i + tag_len];

        match tag {
            TAG_FCS if tag_len == 1 => {
                if tag_data[0] != 0 {
                    return Err(ParseError::FcsError);
                }
            }
            TAG_SIGNAL if tag_len == 1 => meta.rssi = Some(tag_data[0] as i8),
            TAG_CHANNEL if tag_len == 1 => meta.channel = Some(tag_data[0]),
            TAG_SENSOR_MAC if tag_len == 6 => meta.sensor_mac = Some(tag_data),
            TAG_RATE | TAG_LENGTH => {}
            _ => {}
        }

        i += tag_len;
    }
    Err(ParseError::TagOverrun)
}

/// Resolves the final frequency (in kHz) for a parsed 802.11 frame, applying
/// the reference receiver's band-reconstruction cascade (SPEC_FULL.md §4.1).
fn resolve_frequency_802211(
    net: &ie::mac80211::Mac80211Net,
    tzsp_channel: Option<u8>,
    frequency_base_khz: u32,
) -> u32 {
    let frequency_base = frequency_base_khz / 1000;

    if frequency_base == 5000 {
        if let Some(tzsp_ch) = tzsp_channel {
            if net.channel >= 160
                && net.channel <= 199
                && tzsp_ch >= 11
                && tzsp_ch <= 50
                && (net.channel - i16::from(tzsp_ch)) == (184 - 35)
            {
                return ((4920 + (net.channel - 184) * 5) as u32) * 1000;
            }
            return (frequency_base + u32::from(tzsp_ch) * 5) * 1000;
        }
    }

    let channel: Option<i16> = if net.channel >= 0 {
        Some(net.channel)
    } else {
        tzsp_channel.map(i16::from)
    };

    if let Some(channel) = channel {
        if frequency_base == 2407 && channel >= 128 {
            return (frequency_base as i64 - (256 - channel as i64) * 5) as u32 * 1000;
        }
        if frequency_base == 2407 && channel == 14 {
            return 2484 * 1000;
        }
        return (frequency_base as i64 + channel as i64 * 5) as u32 * 1000;
    }

    0
}

/// Turns one TZSP-encapsulated beacon/probe-response into a network record.
/// Returns `None` for frames none of the three parsers recognise, or whose
/// sensor MAC doesn't match `sensor_mac_filter`.
pub fn process_packet(
    packet: &[u8],
    config: &TzspConfig,
    fallback_encoding: &str,
    now: i64,
) -> Option<NetworkRecord> {
    let meta = match decap(packet) {
        Ok(meta) => meta,
        Err(e) => {
            debug!(error = %e, "dropping malformed TZSP packet");
            return None;
        }
    };

    // Pre-6.41 RouterOS sends no sensor MAC at all. The reference always
    // requires one (`hw_addr` is mandatory at construction); this receiver
    // loosens that by treating `sensor_mac: None` as "accept any sensor".
    if let Some(expected) = config.sensor_mac {
        match meta.sensor_mac {
            Some(mac) if mac == expected.0 => {}
            _ => return None,
        }
    }

    if let Some((src, nv2)) = ie::nv2::parse(meta.frame, fallback_encoding) {
        return Some(record_from_nv2(src, nv2, meta.rssi, config, now));
    }

    match ie::mac80211::parse(meta.frame, fallback_encoding) {
        Ok((bssid, mut net)) => {
            use ie::mac80211::FrameKind;
            if !matches!(net.source, Some(FrameKind::Beacon) | Some(FrameKind::ProbeResponse)) {
                return None;
            }
            let body = &meta.frame[24.min(meta.frame.len())..];
            ie::mac80211::resolve_airmax_ac(&mut net, body, &bssid);
            Some(record_from_mac80211(bssid, net, meta.rssi, meta.channel, config, now))
        }
        Err(_) => {
            if let Some((src, cambium)) = ie::cambium::parse(meta.frame, fallback_encoding) {
                Some(record_from_cambium(src, cambium, meta.rssi, meta.channel, config, now))
            } else {
                None
            }
        }
    }
}

fn record_from_mac80211(
    bssid: [u8; 6],
    net: ie::mac80211::Mac80211Net,
    rssi: Option<i8>,
    tzsp_channel: Option<u8>,
    config: &TzspConfig,
    now: i64,
) -> NetworkRecord {
    let mut record = NetworkRecord::new(MacAddr(bssid), now);
    if let Some(rssi) = rssi {
        record.rssi = rssi;
    }

    if let Some(mikrotik) = &net.mikrotik {
        record.radioname = mikrotik.radioname.clone();
        record.routeros_ver = mikrotik.version.clone();
        record.frequency = u32::from(mikrotik.frequency) * 1000;
        record.flags.routeros = TriState::True;
        record.flags.nstreme = TriState::from_bool(mikrotik.nstreme);
        record.flags.tdma = TriState::False;
        record.flags.wds = TriState::from_bool(mikrotik.wds);
        record.flags.bridge = TriState::from_bool(mikrotik.bridge);
    }

    if net.airmax.is_some() {
        record.ubnt_airmax = TriState::True;
    }

    if let Some(airmax_ac) = &net.airmax_ac {
        record.ubnt_airmax = TriState::True;
        record.ssid = airmax_ac.ssid.clone();
        record.radioname = record.radioname.or_else(|| airmax_ac.radioname.clone());
        record.ubnt_ptp = TriState::from_bool(airmax_ac.ptp);
        record.ubnt_ptmp = TriState::from_bool(airmax_ac.ptmp);
        record.ubnt_mixed = TriState::from_bool(airmax_ac.mixed);
    }

    if let Some(wps) = &net.wps {
        record.wps = WpsState::BeaconOnly;
        if matches!(net.source, Some(ie::mac80211::FrameKind::ProbeResponse)) {
            record.wps = WpsState::ProbeResponseFull;
            record.wps_manufacturer = wps.manufacturer.clone();
            record.wps_model_name = wps.model_name.clone();
            record.wps_model_number = wps.model_number.clone();
            record.wps_serial_number = wps.serial_number.clone();
            record.wps_device_name = wps.device_name.clone();
        }
    }

    if record.frequency == 0 {
        record.frequency = resolve_frequency_802211(&net, tzsp_channel, config.frequency_base_khz);
    }

    if record.ssid.is_none() {
        record.ssid = net.ssid.clone();
    }
    if record.radioname.is_none() {
        record.radioname = net.radioname.clone();
    }

    record.streams = net.chains();
    record.flags.privacy = TriState::from_bool(net.is_privacy());

    record.channel = match net.ext_channel() {
        Some(ext) => format!("{}-{}", config.channel_width_mhz, ext),
        None => config.channel_width_mhz.to_string(),
    };

    record.mode = net.mode(record.frequency);
    record
}

fn record_from_nv2(
    src: [u8; 6],
    net: ie::nv2::Nv2Net,
    rssi: Option<i8>,
    config: &TzspConfig,
    now: i64,
) -> NetworkRecord {
    let mut record = NetworkRecord::new(MacAddr(src), now);
    if let Some(rssi) = rssi {
        record.rssi = rssi;
    }

    record.ssid = net.ssid.clone();
    record.radioname = net.radioname.clone();
    record.routeros_ver = net.version.clone();

    if net.frequency != 0 {
        record.frequency = u32::from(net.frequency) * 1000;
    }

    record.flags.privacy = TriState::from_bool(net.is_privacy());
    record.flags.routeros = TriState::True;
    record.flags.nstreme = TriState::False;
    record.flags.tdma = TriState::True;
    record.flags.wds = TriState::from_bool(net.is_wds());
    record.flags.bridge = TriState::from_bool(net.is_bridge());

    record.channel = match net.ext_channel() {
        Some(ext) => format!("{}-{}", config.channel_width_mhz, ext),
        None => config.channel_width_mhz.to_string(),
    };

    record.streams = net.chains();

    let freq_mhz = net.frequency;
    record.mode = Some(if net.is_vht() {
        wscan_types::Mode::Ac
    } else if net.is_ht() {
        if freq_mhz < 3000 {
            wscan_types::Mode::Gn
        } else {
            wscan_types::Mode::An
        }
    } else if freq_mhz < 3000 {
        if net.is_ofdm() {
            wscan_types::Mode::G
        } else {
            wscan_types::Mode::B
        }
    } else {
        wscan_types::Mode::A
    });

    record
}

fn record_from_cambium(
    src: [u8; 6],
    net: ie::cambium::CambiumNet,
    rssi: Option<i8>,
    tzsp_channel: Option<u8>,
    config: &TzspConfig,
    now: i64,
) -> NetworkRecord {
    let mut record = NetworkRecord::new(MacAddr(src), now);
    if let Some(rssi) = rssi {
        record.rssi = rssi;
    }
    record.ssid = net.ssid.clone();
    if net.frequency != 0 {
        record.frequency = u32::from(net.frequency) * 1000;
    } else if let Some(ch) = tzsp_channel {
        record.frequency = (u32::from(ch) * 5 + config.frequency_base_khz / 1000) * 1000;
    }
    record
}

/// Binds a UDP socket with `SO_REUSEADDR` set, the one bit of socket tuning
/// the reference implementation relies on (several scanner instances may
/// share a sensor's broadcast port).
fn bind_reuseaddr(port: u16) -> std::io::Result<std::net::UdpSocket> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    Ok(socket.into())
}

/// Runs the TZSP receiver until `cancel` fires, emitting a `NetworkRecord`
/// over `tx` for every recognised packet. Mirrors `tzsp_receiver_thread` plus
/// its `g_idle_add`-delivered callbacks, reinterpreted as channel sends.
pub async fn run_receiver(
    config: TzspConfig,
    fallback_encoding: String,
    tx: mpsc::Sender<NetworkRecord>,
    cancel: CancellationToken,
    now_fn: Arc<dyn Fn() -> i64 + Send + Sync>,
) -> Result<(), TzspError> {
    let std_socket = bind_reuseaddr(config.port).map_err(|source| TzspError::Bind {
        port: config.port,
        source,
    })?;
    let socket = UdpSocket::from_std(std_socket)?;

    let mut buf = vec![0u8; 65535];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            recv = socket.recv_from(&mut buf) => {
                let (len, _from) = recv?;
                let now = now_fn();
                if let Some(record) = process_packet(&buf[..len], &config, &fallback_encoding, now) {
                    if tx.send(record).await.is_err() {
                        break;
                    }
                } else {
                    debug!("packet did not match any recognised beacon dialect");
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tzsp_header(tags: &[u8]) -> Vec<u8> {
        let mut v = vec![TZSP_VERSION, TZSP_TYPE, 0x00, TZSP_PROTO as u8];
        v.extend_from_slice(tags);
        v
    }

    #[test]
    fn rejects_wrong_version() {
        let packet = vec![0x02, 0, 0, 0x12, 0, 1];
        assert_eq!(decap(&packet).unwrap_err(), ParseError::UnsupportedVersion(2));
    }

    #[test]
    fn fcs_error_byte_rejects_frame() {
        let mut tags = vec![TAG_FCS, 1, 0x01];
        tags.push(TAG_END);
        let packet = tzsp_header(&tags);
        assert_eq!(decap(&packet).unwrap_err(), ParseError::FcsError);
    }

    #[test]
    fn signal_and_channel_tags_and_end_tag_expose_frame() {
        let mut tags = vec![TAG_SIGNAL, 1, (-70i8) as u8];
        tags.extend_from_slice(&[TAG_CHANNEL, 1, 40]);
        tags.extend_from_slice(&[TAG_SENSOR_MAC, 6, 1, 2, 3, 4, 5, 6]);
        tags.push(TAG_END);
        tags.extend_from_slice(b"FRAME");
        let packet = tzsp_header(&tags);
        let meta = decap(&packet).unwrap();
        assert_eq!(meta.rssi, Some(-70));
        assert_eq!(meta.channel, Some(40));
        assert_eq!(meta.sensor_mac, Some(&[1u8, 2, 3, 4, 5, 6][..]));
        assert_eq!(meta.frame, b"FRAME");
    }

    #[test]
    fn padding_tags_are_skipped() {
        let mut tags = vec![TAG_PADDING, TAG_PADDING];
        tags.push(TAG_END);
        tags.extend_from_slice(b"X");
        let packet = tzsp_header(&tags);
        let meta = decap(&packet).unwrap();
        assert_eq!(meta.frame, b"X");
    }

    #[test]
    fn sub_2_4ghz_negative_channel_reconstructs_frequency() {
        let net = ie::mac80211::Mac80211Net {
            channel: 200, // >=128 branch
            ..Default::default()
        };
        let freq = resolve_frequency_802211(&net, None, 2_407_000);
        assert_eq!(freq, (2407 - (256 - 200) * 5) as u32 * 1000);
    }

    #[test]
    fn channel_14_is_special_cased() {
        let net = ie::mac80211::Mac80211Net {
            channel: 14,
            ..Default::default()
        };
        assert_eq!(resolve_frequency_802211(&net, None, 2_407_000), 2484 * 1000);
    }
}
