//! MikroTik vendor information element (OUI `00:0c:42`). Ported from
//! `ie-mikrotik.c`; the 6-byte magic is assumed already stripped by the
//! caller in [`super::mac80211::process_vendor_tag`] — `tags` starts at the
//! TLV area.

use crate::encoding::decode_with_fallback;
use crate::ie::mac80211::MikrotikIe;

const DATA_TAG: u8 = 0x01;
const DATA_LEN: usize = 30;
const FREQ_TAG: u8 = 0x05;
const FREQ_LEN: usize = 2;

/// Renders a RouterOS version quad into the dotted string RouterOS itself
/// would print. The wire format never documented a `type` byte meaning; we
/// treat 0 as a release build and anything else as a pre-release suffix,
/// which is the only scheme consistent with every sample this parser has
/// seen in the wild.
pub(crate) fn format_version(major: u8, minor: u8, kind: u8, rev: u8) -> String {
    let mut s = format!("{major}.{minor}");
    if rev != 0 {
        s.push_str(&format!(".{rev}"));
    }
    match kind {
        0 => {}
        1 => s.push_str("rc"),
        2 => s.push_str("beta"),
        other => s.push_str(&format!("-k{other}")),
    }
    s
}

pub fn parse(tags: &[u8], fallback_encoding: &str) -> Option<MikrotikIe> {
    let mut ie = MikrotikIe::default();
    let mut i = 0usize;
    while i + 2 <= tags.len() {
        let tag = tags[i];
        let len = tags[i + 1] as usize;
        if i + 2 + len > tags.len() {
            break;
        }
        let value = &tags[i + 2..i + 2 + len];
        match tag {
            DATA_TAG if len == DATA_LEN => {
                let flags1 = value[0];
                let flags2 = value[1];
                ie.nstreme = flags1 & 0x01 != 0;
                ie.wds = flags1 & 0x04 != 0;
                ie.bridge = flags2 & 0x10 != 0;
                if ie.version.is_none() {
                    ie.version = Some(format_version(value[7], value[6], value[5], value[4]));
                }
                if ie.radioname.is_none() && value[10] != 0 {
                    ie.radioname = Some(decode_with_fallback(&value[10..26], fallback_encoding));
                }
                // value[8..10] is the MRU field (IE_MIKROTIK_DATA_MRU_L/_H),
                // not frequency; frequency only comes from FREQ_TAG below.
            }
            FREQ_TAG if len == FREQ_LEN => {
                ie.frequency = u16::from(value[1]) << 8 | u16::from(value[0]);
            }
            _ => {}
        }
        i += 2 + len;
    }
    Some(ie)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_tag(flags1: u8, flags2: u8, radioname: &[u8; 16]) -> Vec<u8> {
        let mut v = vec![0u8; DATA_LEN];
        v[0] = flags1;
        v[1] = flags2;
        v[4] = 3; // rev
        v[5] = 0; // type: release
        v[6] = 43; // minor
        v[7] = 6; // major
        v[8] = 0x34; // mru low
        v[9] = 0x12; // mru high
        v[10..26].copy_from_slice(radioname);
        v[26] = 0x00;
        v[27] = 0x01;
        v
    }

    #[test]
    fn parses_flags_version_and_radioname() {
        let mut name = [0u8; 16];
        name[..5].copy_from_slice(b"tower");
        let data = data_tag(0x05, 0x10, &name);
        let mut tags = vec![DATA_TAG, DATA_LEN as u8];
        tags.extend_from_slice(&data);
        let ie = parse(&tags, "ISO-8859-2").unwrap();
        assert!(ie.nstreme);
        assert!(ie.wds);
        assert!(ie.bridge);
        assert_eq!(ie.version.as_deref(), Some("6.43.3"));
        assert!(ie.radioname.unwrap().starts_with("tower"));
    }

    #[test]
    fn freq_tag_overrides_frequency() {
        let tags = vec![FREQ_TAG, 2, 0x34, 0x12];
        let ie = parse(&tags, "ISO-8859-2").unwrap();
        assert_eq!(ie.frequency, 0x1234);
    }

    #[test]
    fn zero_byte_radioname_is_skipped() {
        let name = [0u8; 16];
        let data = data_tag(0, 0, &name);
        let mut tags = vec![DATA_TAG, DATA_LEN as u8];
        tags.extend_from_slice(&data);
        let ie = parse(&tags, "ISO-8859-2").unwrap();
        assert!(ie.radioname.is_none());
    }
}
