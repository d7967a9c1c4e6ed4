//! Wi-Fi Protected Setup information element (OUI `00:50:f2:04`). Ported
//! from `ie-wps.c`. Unlike every other vendor IE here, WPS tags use a
//! 2-byte big-endian type and a 2-byte big-endian length.
//!
//! This parser makes no distinction between beacon and probe-response
//! frames; whether the string fields get attached to a record at all for
//! beacon-only sightings is decided by the caller (see
//! [`crate::tzsp`]), not here.

use crate::encoding::decode_with_fallback;
use crate::ie::mac80211::WpsIe;

const TAG_MANUFACTURER: u16 = 0x1021;
const TAG_MODEL_NAME: u16 = 0x1023;
const TAG_MODEL_NUMBER: u16 = 0x1024;
const TAG_SERIAL_NUMBER: u16 = 0x1042;
const TAG_DEVICE_NAME: u16 = 0x1011;

/// `tags` is the vendor-tag payload with the 4-byte magic already stripped.
pub fn parse(tags: &[u8], fallback_encoding: &str) -> Option<WpsIe> {
    let mut ie = WpsIe::default();
    let mut i = 0usize;
    while i + 4 <= tags.len() {
        let tag = u16::from(tags[i]) << 8 | u16::from(tags[i + 1]);
        let len = (u16::from(tags[i + 2]) << 8 | u16::from(tags[i + 3])) as usize;
        if i + 4 + len > tags.len() {
            break;
        }
        let value = &tags[i + 4..i + 4 + len];
        if len != 0 {
            let slot = match tag {
                TAG_MANUFACTURER => Some(&mut ie.manufacturer),
                TAG_MODEL_NAME => Some(&mut ie.model_name),
                TAG_MODEL_NUMBER => Some(&mut ie.model_number),
                TAG_SERIAL_NUMBER => Some(&mut ie.serial_number),
                TAG_DEVICE_NAME => Some(&mut ie.device_name),
                _ => None,
            };
            if let Some(slot) = slot {
                if slot.is_none() {
                    *slot = Some(decode_with_fallback(value, fallback_encoding));
                }
            }
        }
        i += 4 + len;
    }
    Some(ie)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(tag: u16, value: &[u8]) -> Vec<u8> {
        let mut v = vec![(tag >> 8) as u8, tag as u8, 0, value.len() as u8];
        v.extend_from_slice(value);
        v
    }

    #[test]
    fn parses_all_five_fields() {
        let mut tags = Vec::new();
        tags.extend(tag(TAG_MANUFACTURER, b"Acme"));
        tags.extend(tag(TAG_MODEL_NAME, b"Router"));
        tags.extend(tag(TAG_MODEL_NUMBER, b"R100"));
        tags.extend(tag(TAG_SERIAL_NUMBER, b"SN1"));
        tags.extend(tag(TAG_DEVICE_NAME, b"MyRouter"));
        let ie = parse(&tags, "ISO-8859-2").unwrap();
        assert_eq!(ie.manufacturer.as_deref(), Some("Acme"));
        assert_eq!(ie.model_name.as_deref(), Some("Router"));
        assert_eq!(ie.model_number.as_deref(), Some("R100"));
        assert_eq!(ie.serial_number.as_deref(), Some("SN1"));
        assert_eq!(ie.device_name.as_deref(), Some("MyRouter"));
    }

    #[test]
    fn zero_length_tag_is_skipped() {
        let tags = tag(TAG_MANUFACTURER, b"");
        let ie = parse(&tags, "ISO-8859-2").unwrap();
        assert!(ie.manufacturer.is_none());
    }

    #[test]
    fn first_occurrence_wins() {
        let mut tags = Vec::new();
        tags.extend(tag(TAG_MANUFACTURER, b"First"));
        tags.extend(tag(TAG_MANUFACTURER, b"Second"));
        let ie = parse(&tags, "ISO-8859-2").unwrap();
        assert_eq!(ie.manufacturer.as_deref(), Some("First"));
    }
}
