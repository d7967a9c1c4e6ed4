//! Ubiquiti AirMax-AC vendor information element (OUI `00:27:22`). Ported
//! from `ie-airmax-ac.c`: an HMAC/AES-sealed TLV blob keyed to the frame's
//! own BSSID.

use crate::crypto::decrypt_airmax_ac;
use crate::ie::mac80211::AirmaxAcIe;

const HEADER_LEN: usize = 10;
const DATA_LEN_IDX: usize = 9;
const DATA_HEADER_LEN: usize = 22;
const MODE_IDX: usize = 17;

pub fn parse(ie: &[u8], bssid: &[u8; 6]) -> Option<AirmaxAcIe> {
    if ie.len() < HEADER_LEN + DATA_HEADER_LEN {
        return None;
    }
    let data_len = ie[DATA_LEN_IDX] as usize;
    if data_len % 16 != 0 || data_len == 0 {
        return None;
    }
    // Reject when the IE is *longer* than header + declared data length.
    // This is the reference implementation's exact check, the unusual
    // direction preserved on purpose.
    if HEADER_LEN + data_len < ie.len() {
        return None;
    }
    if HEADER_LEN + data_len > ie.len() {
        return None;
    }

    let ciphertext = &ie[HEADER_LEN..HEADER_LEN + data_len];
    let data = decrypt_airmax_ac(bssid, ciphertext)?;

    if data.len() < DATA_HEADER_LEN {
        return None;
    }
    if &data[2..8] != bssid || &data[8..14] != bssid {
        return None;
    }

    let mode = data[MODE_IDX];
    let ptp = mode & 0x01 != 0;
    let ptmp = mode & 0x02 != 0;
    let mixed = mode & 0x04 != 0 && mode & 0x08 != 0 && mode & 0x10 != 0;

    let mut result = AirmaxAcIe {
        ptp,
        ptmp,
        mixed,
        ssid: None,
        radioname: None,
    };

    let mut i = DATA_HEADER_LEN;
    while i + 2 <= data.len() {
        let tag_type = data[i];
        let tag_len = data[i + 1] as usize;
        if tag_type == 0x00 {
            break;
        }
        if i + 2 + tag_len > data.len() {
            break;
        }
        let value = &data[i + 2..i + 2 + tag_len];
        match tag_type {
            0x01 if result.radioname.is_none() => {
                result.radioname = Some(String::from_utf8_lossy(value).into_owned());
            }
            0x02 if result.ssid.is_none() => {
                result.ssid = Some(String::from_utf8_lossy(value).into_owned());
            }
            _ => {}
        }
        i += 2 + tag_len;
    }

    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::{generic_array::GenericArray, BlockEncryptMut, KeyInit};
    use aes::Aes128;
    use crate::crypto::derive_airmax_ac_key;

    fn build_ie(bssid: &[u8; 6], mode: u8, tags: &[u8]) -> Vec<u8> {
        let mut plain = vec![0u8; DATA_HEADER_LEN];
        plain[2..8].copy_from_slice(bssid);
        plain[8..14].copy_from_slice(bssid);
        plain[MODE_IDX] = mode;
        plain.extend_from_slice(tags);
        while plain.len() % 16 != 0 {
            plain.push(0);
        }

        let key = derive_airmax_ac_key(bssid);
        let encryptor = ecb::Encryptor::<Aes128>::new(GenericArray::from_slice(&key));
        for chunk in plain.chunks_mut(16) {
            let block = GenericArray::from_mut_slice(chunk);
            encryptor.clone().encrypt_block_mut(block);
        }

        let mut ie = vec![0u8; HEADER_LEN];
        ie[DATA_LEN_IDX] = plain.len() as u8;
        ie.extend_from_slice(&plain);
        ie
    }

    #[test]
    fn decrypts_mode_and_verifies_bssid() {
        let bssid = [0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let ie = build_ie(&bssid, 0x01, &[]);
        let parsed = parse(&ie, &bssid).unwrap();
        assert!(parsed.ptp);
        assert!(!parsed.ptmp);
    }

    #[test]
    fn mixed_mode_requires_all_three_bits() {
        let bssid = [0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let ie = build_ie(&bssid, 0x1C, &[]);
        let parsed = parse(&ie, &bssid).unwrap();
        assert!(parsed.mixed);
        let ie = build_ie(&bssid, 0x0C, &[]);
        let parsed = parse(&ie, &bssid).unwrap();
        assert!(!parsed.mixed);
    }

    #[test]
    fn wrong_bssid_fails_verification() {
        let bssid = [0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let other = [0x09, 0x09, 0x09, 0x09, 0x09, 0x09];
        let ie = build_ie(&bssid, 0x01, &[]);
        assert!(parse(&ie, &other).is_none());
    }

    #[test]
    fn ssid_and_radioname_tags_are_captured() {
        let bssid = [0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let tags = [0x02u8, 4, b'T', b'e', b's', b't', 0x01, 3, b'r', b'a', b'd'];
        let ie = build_ie(&bssid, 0x00, &tags);
        let parsed = parse(&ie, &bssid).unwrap();
        assert_eq!(parsed.ssid.as_deref(), Some("Test"));
        assert_eq!(parsed.radioname.as_deref(), Some("rad"));
    }
}
