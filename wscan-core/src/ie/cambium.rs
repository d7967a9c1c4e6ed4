//! Cambium beacon parser, riding inside an 802.11 Action-No-Ack frame.
//! Ported from `cambium.c`, explicitly marked upstream as an early-alpha,
//! reverse-engineered format: only SSID and channel survive the round trip,
//! everything else in the frame is left unparsed.

const MAC80211_HEADER_LEN: usize = 24;
const ADDR_DST: usize = 4;
const ADDR_SRC: usize = 10;
const BEACON_HEADER_LEN: usize = 8;
const BEACON_TAG_LEN: usize = 2;

const TAG_SSID: u8 = 0x01;
const TAG_CHANNEL: u8 = 0x05;
const TAG_CHANNEL_LEN: usize = 0x0D;
const CHANNEL_FREQUENCY_H: usize = 11;
const CHANNEL_FREQUENCY_L: usize = 12;

const BROADCAST: [u8; 6] = [0xFF; 6];

#[derive(Debug, Clone, Default)]
pub struct CambiumNet {
    pub frequency: u16,
    pub ssid: Option<String>,
}

pub fn parse(data: &[u8], fallback_encoding: &str) -> Option<([u8; 6], CambiumNet)> {
    if data.len() <= MAC80211_HEADER_LEN + BEACON_HEADER_LEN + BEACON_TAG_LEN {
        return None;
    }
    if data[0] != 0xE0 || data[1] != 0x00 {
        return None;
    }
    if data[ADDR_DST..ADDR_DST + 6] != BROADCAST {
        return None;
    }

    let mut src = [0u8; 6];
    src.copy_from_slice(&data[ADDR_SRC..ADDR_SRC + 6]);

    let body = &data[MAC80211_HEADER_LEN..];
    if body[0] != 0x7F {
        return None;
    }

    let mut net = CambiumNet::default();
    let mut i = BEACON_HEADER_LEN;
    while i + BEACON_TAG_LEN <= body.len() {
        let tag_type = body[i];
        let tag_len = body[i + 1] as usize;
        if tag_len != 0 {
            if i + BEACON_TAG_LEN + tag_len > body.len() {
                break;
            }
            let value = &body[i + BEACON_TAG_LEN..i + BEACON_TAG_LEN + tag_len];
            apply_tag(&mut net, tag_type, tag_len, value, fallback_encoding);
        }
        i += BEACON_TAG_LEN + tag_len;
    }
    Some((src, net))
}

fn apply_tag(net: &mut CambiumNet, tag_type: u8, tag_len: usize, value: &[u8], fallback_encoding: &str) {
    use crate::encoding::decode_with_fallback;
    match tag_type {
        TAG_SSID if net.ssid.is_none() => {
            net.ssid = Some(decode_with_fallback(value, fallback_encoding));
        }
        TAG_CHANNEL if tag_len == TAG_CHANNEL_LEN => {
            net.frequency = u16::from(value[CHANNEL_FREQUENCY_H]) << 8 | u16::from(value[CHANNEL_FREQUENCY_L]);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<u8> {
        let mut h = vec![0u8; MAC80211_HEADER_LEN];
        h[0] = 0xE0;
        h[1] = 0x00;
        h[ADDR_DST..ADDR_DST + 6].copy_from_slice(&BROADCAST);
        h[ADDR_SRC..ADDR_SRC + 6].copy_from_slice(&[0xBB; 6]);
        h
    }

    #[test]
    fn requires_cambium_marker_byte() {
        let mut data = header();
        data.push(0x00); // wrong marker
        data.extend_from_slice(&[0u8; 20]);
        assert!(parse(&data, "ISO-8859-2").is_none());
    }

    #[test]
    fn parses_ssid_and_channel_tags() {
        let mut data = header();
        let mut body = vec![0x7F, 0x08, 0x00, 0x07, 0xA1, 0x20, 0x04, 0x06];
        body.push(TAG_SSID);
        body.push(4);
        body.extend_from_slice(b"Test");
        let mut channel_value = [0u8; TAG_CHANNEL_LEN];
        channel_value[CHANNEL_FREQUENCY_H] = 0x14;
        channel_value[CHANNEL_FREQUENCY_L] = 0x1E;
        body.push(TAG_CHANNEL);
        body.push(TAG_CHANNEL_LEN as u8);
        body.extend_from_slice(&channel_value);
        data.extend_from_slice(&body);

        let (src, net) = parse(&data, "ISO-8859-2").unwrap();
        assert_eq!(src, [0xBB; 6]);
        assert_eq!(net.ssid.as_deref(), Some("Test"));
        assert_eq!(net.frequency, 0x141E);
    }
}
