//! IEEE 802.11 beacon/probe-response classification and information-element
//! walk. Ported bit-exactly from the reference `mac80211.c` tag dispatch
//! table (SPEC_FULL.md §4.1, C1).

use crate::encoding::decode_with_fallback;
use crate::error::ParseError;
use wscan_types::Mode;

const HEADER_LEN: usize = 24;
const ADDR_DST: usize = 4;
const ADDR_SRC: usize = 10;
const ADDR_BSSID: usize = 16;
const MGMT_HEADER_LEN: usize = 12;

const BROADCAST: [u8; 6] = [0xFF; 6];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Beacon,
    ProbeResponse,
}

#[derive(Debug, Clone, Default)]
pub struct MikrotikIe {
    pub nstreme: bool,
    pub wds: bool,
    pub bridge: bool,
    pub radioname: Option<String>,
    pub version: Option<String>,
    pub frequency: u16,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AirmaxIe;

#[derive(Debug, Clone, Default)]
pub struct AirmaxAcIe {
    pub ptp: bool,
    pub ptmp: bool,
    pub mixed: bool,
    pub ssid: Option<String>,
    pub radioname: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct WpsIe {
    pub manufacturer: Option<String>,
    pub model_name: Option<String>,
    pub model_number: Option<String>,
    pub serial_number: Option<String>,
    pub device_name: Option<String>,
}

/// Everything recovered from one beacon/probe-response frame's tag walk,
/// mirroring `mac80211_net_t`.
#[derive(Debug, Clone, Default)]
pub struct Mac80211Net {
    pub source: Option<FrameKind>,
    pub ssid: Option<String>,
    pub radioname: Option<String>,
    pub channel: i16,
    pub caps: u16,
    pub dsss_rates: u8,
    pub ofdm_rates: u8,
    pub ht: bool,
    pub ht_chan: u8,
    pub ht_mode: u8,
    pub ht_chains: u8,
    pub vht: bool,
    pub vht_mode: u8,
    pub vht_chan0: u8,
    pub vht_chan1: u8,
    pub vht_chains: u8,
    pub he: bool,
    pub mikrotik: Option<MikrotikIe>,
    pub airmax: Option<AirmaxIe>,
    pub airmax_ac: Option<AirmaxAcIe>,
    pub wps: Option<WpsIe>,
}

impl Mac80211Net {
    pub fn is_privacy(&self) -> bool {
        self.caps & 0x10 != 0
    }

    pub fn is_dsss(&self) -> bool {
        self.dsss_rates != 0
    }

    pub fn is_ofdm(&self) -> bool {
        self.ofdm_rates != 0
    }

    pub fn chains(&self) -> u8 {
        self.vht_chains.max(self.ht_chains)
    }

    /// `mac80211_net_get_ext_channel`: derives the secondary-channel suffix
    /// string from the VHT/HT capability fields. `None` means "no extension
    /// channel", distinct from `Some("?")` ("has one, shape unrecognised").
    pub fn ext_channel(&self) -> Option<&'static str> {
        if self.vht && self.ht && self.vht_mode != 0 {
            return Some(match self.vht_mode {
                1 => match self.vht_chan0 as i16 - self.ht_chan as i16 {
                    6 => "Ceee",
                    2 => "eCee",
                    -2 => "eeCe",
                    -6 => "eeeC",
                    _ => "?",
                },
                2 => "160",
                3 => "2x80",
                _ => "?",
            });
        }
        if self.ht && self.ht_mode & 0x04 != 0 {
            return Some(if self.ht_mode & 0x01 != 0 && self.ht_mode & 0x02 != 0 {
                "eC"
            } else if self.ht_mode & 0x01 != 0 {
                "Ce"
            } else {
                "?"
            });
        }
        None
    }

    pub fn mode(&self, frequency_hz: u32) -> Option<Mode> {
        if self.he {
            return Some(Mode::Ax);
        }
        if self.vht {
            return Some(Mode::Ac);
        }
        let below_3ghz = frequency_hz != 0 && frequency_hz < 3_000_000;
        if self.ht {
            return Some(if below_3ghz { Mode::Gn } else { Mode::An });
        }
        if self.is_ofdm() {
            return Some(if below_3ghz { Mode::G } else { Mode::A });
        }
        if self.is_dsss() {
            return Some(Mode::B);
        }
        None
    }
}

/// Classifies and parses one captured 802.11 frame. Returns the BSSID slice
/// (address 3) alongside the parsed fields, or an error if the frame isn't a
/// beacon/probe-response we care about.
pub fn parse(data: &[u8], fallback_encoding: &str) -> Result<([u8; 6], Mac80211Net), ParseError> {
    if data.len() < HEADER_LEN {
        return Err(ParseError::UnrecognisedFrame);
    }

    let source = classify(data)?;

    let mut bssid = [0u8; 6];
    bssid.copy_from_slice(&data[ADDR_BSSID..ADDR_BSSID + 6]);

    let body = &data[HEADER_LEN..];
    let mut net = Mac80211Net {
        source: Some(source),
        channel: -1,
        ..Default::default()
    };

    if body.len() >= 12 {
        net.caps = u16::from(body[11]) << 8 | u16::from(body[10]);
    }

    walk_tags(body, &mut net, fallback_encoding);
    Ok((bssid, net))
}

fn classify(data: &[u8]) -> Result<FrameKind, ParseError> {
    match data[0] {
        0x80 => {
            if data[ADDR_DST..ADDR_DST + 6] == BROADCAST {
                Ok(FrameKind::Beacon)
            } else {
                Err(ParseError::UnrecognisedFrame)
            }
        }
        0x50 => Ok(FrameKind::ProbeResponse),
        _ => Err(ParseError::UnrecognisedFrame),
    }
}

fn walk_tags(body: &[u8], net: &mut Mac80211Net, fallback_encoding: &str) {
    let mut i = MGMT_HEADER_LEN;
    while i + 2 <= body.len() {
        let tag = body[i];
        let data_len = body[i + 1] as usize;
        if i + 2 + data_len > body.len() {
            break;
        }
        let value = &body[i + 2..i + 2 + data_len];
        process_tag(net, tag, value, fallback_encoding);
        i += 2 + data_len;
    }
}

fn process_tag(net: &mut Mac80211Net, tag: u8, value: &[u8], fallback_encoding: &str) {
    match tag {
        0x00 => {
            if net.ssid.is_none() && !value.is_empty() && value[0] != 0 {
                net.ssid = Some(decode_with_fallback(value, fallback_encoding));
            }
        }
        0x01 | 0x32 => apply_rates(net, value),
        0x03 if value.len() == 1 => net.channel = value[0] as i16,
        0x2D if value.len() == 26 => {
            net.ht_chains = chains_from_ht_caps(value);
        }
        0x3D if value.len() == 22 => {
            net.ht = true;
            net.ht_chan = value[0];
            net.ht_mode = value[1];
        }
        0x85 if value.len() >= 26 => {
            net.radioname = Some(decode_with_fallback(&value[10..26], fallback_encoding));
        }
        0xBF if value.len() == 12 => {
            let tx_mcs_map = u16::from(value[9]) << 8 | u16::from(value[8]);
            net.vht_chains = chains_from_vht_mcs_map(tx_mcs_map);
        }
        0xC0 if value.len() == 5 => {
            net.vht = true;
            net.vht_mode = value[0];
            net.vht_chan0 = value[1];
            net.vht_chan1 = value[2];
        }
        0xDD if !value.is_empty() => process_vendor_tag(net, value, fallback_encoding),
        0xFF if !value.is_empty() => {
            net.he = value[0] == 0x23;
        }
        _ => {}
    }
}

fn apply_rates(net: &mut Mac80211Net, value: &[u8]) {
    for &raw in value {
        let rate = raw & !0x80;
        match rate {
            2 | 4 | 11 | 22 => net.dsss_rates |= rate,
            12 | 18 | 24 | 36 | 48 | 72 | 96 | 108 => net.ofdm_rates |= rate,
            _ => {}
        }
    }
}

fn chains_from_ht_caps(value: &[u8]) -> u8 {
    for (offset, chains) in [(6, 4), (5, 3), (4, 2), (3, 1)] {
        if value[offset] != 0 {
            return chains;
        }
    }
    0
}

fn chains_from_vht_mcs_map(tx_mcs_map: u16) -> u8 {
    for chain in 1..=8u8 {
        let shift = 16 - 2 * u16::from(chain);
        let field = (tx_mcs_map >> shift) & 0x03;
        if field != 0b11 {
            return chain;
        }
    }
    0
}

const EPIGRAM_OUI: [u8; 3] = [0x00, 0x90, 0x4C];
const MIKROTIK_MAGIC: [u8; 6] = [0x00, 0x0C, 0x42, 0x00, 0x00, 0x00];
const AIRMAX_MAGIC: [u8; 6] = [0x00, 0x15, 0x6D, 0xFF, 0xFF, 0xFF];
const AIRMAX_AC_MAGIC: [u8; 9] = [0x00, 0x27, 0x22, 0xFF, 0xFF, 0xFF, 0x02, 0x01, 0x00];
const WPS_MAGIC: [u8; 4] = [0x00, 0x50, 0xF2, 0x04];

fn process_vendor_tag(net: &mut Mac80211Net, value: &[u8], fallback_encoding: &str) {
    if !net.ht
        && value.len() == 26
        && value[0..3] == EPIGRAM_OUI
        && value[3] == 0x34
    {
        net.ht = true;
        net.ht_chan = value[4];
        net.ht_mode = value[5];
        return;
    }

    if net.mikrotik.is_none() && value.len() >= 6 && value[0..6] == MIKROTIK_MAGIC {
        net.mikrotik = super::mikrotik::parse(&value[6..], fallback_encoding);
        return;
    }
    if net.airmax.is_none() && value.len() >= 6 && value[0..6] == AIRMAX_MAGIC {
        net.airmax = super::airmax::parse(value);
        return;
    }
    // AirMax-AC requires the real BSSID for HMAC verification; deferred to
    // the caller (see `parse_airmax_ac_vendor_tag` below), since a plain
    // per-tag dispatch has no access to it.
    if net.airmax_ac.is_none() && value.len() >= 9 && value[0..9] == AIRMAX_AC_MAGIC {
        net.airmax_ac = Some(AirmaxAcIe::default());
        // marker only; real decrypt happens in `resolve_airmax_ac` below.
        return;
    }
    if net.wps.is_none() && value.len() >= 4 && value[0..4] == WPS_MAGIC {
        net.wps = super::wps::parse(&value[4..], fallback_encoding);
    }
}

/// AirMax-AC needs the frame's BSSID to derive its decrypt key, which the
/// single-pass tag walk above doesn't have in scope. Call this after
/// [`parse`] with the frame's raw body and the BSSID it returned to fill in
/// the real decrypted fields (or clear the marker if verification fails).
pub fn resolve_airmax_ac(net: &mut Mac80211Net, body: &[u8], bssid: &[u8; 6]) {
    if net.airmax_ac.is_none() {
        return;
    }
    let mut i = MGMT_HEADER_LEN;
    while i + 2 <= body.len() {
        let tag = body[i];
        let data_len = body[i + 1] as usize;
        if i + 2 + data_len > body.len() {
            break;
        }
        let value = &body[i + 2..i + 2 + data_len];
        if tag == 0xDD && value.len() >= 9 && value[0..9] == AIRMAX_AC_MAGIC {
            net.airmax_ac = super::airmax_ac::parse(value, bssid);
            return;
        }
        i += 2 + data_len;
    }
    net.airmax_ac = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beacon_header(dst_broadcast: bool) -> Vec<u8> {
        let mut h = vec![0u8; HEADER_LEN];
        h[0] = 0x80;
        if dst_broadcast {
            h[ADDR_DST..ADDR_DST + 6].copy_from_slice(&BROADCAST);
        } else {
            h[ADDR_DST..ADDR_DST + 6].copy_from_slice(&[1, 2, 3, 4, 5, 6]);
        }
        h[ADDR_SRC..ADDR_SRC + 6].copy_from_slice(&[0x11; 6]);
        h[ADDR_BSSID..ADDR_BSSID + 6].copy_from_slice(&[0x22; 6]);
        h
    }

    #[test]
    fn beacon_requires_broadcast_destination() {
        let data = beacon_header(false);
        assert_eq!(classify(&data).unwrap_err(), ParseError::UnrecognisedFrame);
        let data = beacon_header(true);
        assert_eq!(classify(&data).unwrap(), FrameKind::Beacon);
    }

    #[test]
    fn probe_response_accepted_regardless_of_destination() {
        let mut data = beacon_header(false);
        data[0] = 0x50;
        assert_eq!(classify(&data).unwrap(), FrameKind::ProbeResponse);
    }

    #[test]
    fn short_frame_is_rejected() {
        let data = vec![0x80u8; 10];
        assert!(parse(&data, "ISO-8859-2").is_err());
    }

    #[test]
    fn ssid_tag_is_skipped_when_hidden() {
        let mut data = beacon_header(true);
        data.extend_from_slice(&[0u8; 12]); // mgmt header body
        data.extend_from_slice(&[0x00, 0x01, 0x00]); // SSID tag, len 1, null byte
        let (_, net) = parse(&data, "ISO-8859-2").unwrap();
        assert!(net.ssid.is_none());
    }

    #[test]
    fn ssid_tag_is_captured_when_present() {
        let mut data = beacon_header(true);
        data.extend_from_slice(&[0u8; 12]);
        data.extend_from_slice(&[0x00, 0x04, b'T', b'e', b's', b't']);
        let (_, net) = parse(&data, "ISO-8859-2").unwrap();
        assert_eq!(net.ssid.as_deref(), Some("Test"));
    }

    #[test]
    fn ext_channel_none_without_ht_or_vht() {
        let net = Mac80211Net::default();
        assert_eq!(net.ext_channel(), None);
    }

    #[test]
    fn ext_channel_eC_from_ht_subset_bits() {
        let mut net = Mac80211Net::default();
        net.ht = true;
        net.ht_mode = 0b0111; // bits 0,1,2 set
        assert_eq!(net.ext_channel(), Some("eC"));
    }

    #[test]
    fn mode_prefers_he_over_everything() {
        let mut net = Mac80211Net::default();
        net.he = true;
        net.vht = true;
        assert_eq!(net.mode(5_000_000), Some(Mode::Ax));
    }
}
