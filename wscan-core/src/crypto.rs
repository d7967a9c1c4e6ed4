//! AirMax-AC vendor-IE decrypt primitives.
//!
//! Per SPEC_FULL.md §4.1 / §9: the key derivation (HMAC-SHA1 keyed by a fixed
//! broadcast constant) is a bit-exact interoperability requirement with
//! Ubiquiti's firmware, not a design choice of ours. Do not "improve" it.

use aes::cipher::{generic_array::GenericArray, BlockDecryptMut, KeyInit};
use aes::Aes128;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;
type Aes128EcbDec = ecb::Decryptor<Aes128>;

/// The broadcast HMAC key every AirMax-AC beacon is derived with.
const HMAC_KEY: [u8; 6] = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// Derives the AES-128 key for one BSSID: first 16 bytes of
/// `HMAC-SHA1(key=FF:FF:FF:FF:FF:FF, message=bssid)`.
pub fn derive_airmax_ac_key(bssid: &[u8; 6]) -> [u8; 16] {
    let mut mac =
        <HmacSha1 as Mac>::new_from_slice(&HMAC_KEY).expect("HMAC accepts any key length");
    mac.update(bssid);
    let digest = mac.finalize().into_bytes();
    let mut key = [0u8; 16];
    key.copy_from_slice(&digest[..16]);
    key
}

/// Decrypts `data` (whose length must be a multiple of 16) in place using
/// AES-128-ECB with the BSSID-derived key. Returns `None` if `data`'s length
/// isn't block-aligned.
pub fn decrypt_airmax_ac(bssid: &[u8; 6], data: &[u8]) -> Option<Vec<u8>> {
    if data.is_empty() || data.len() % 16 != 0 {
        return None;
    }
    let key = derive_airmax_ac_key(bssid);
    let mut buf = data.to_vec();
    let decryptor = Aes128EcbDec::new(GenericArray::from_slice(&key));
    for chunk in buf.chunks_mut(16) {
        let block = GenericArray::from_mut_slice(chunk);
        decryptor.clone().decrypt_block_mut(block);
    }
    Some(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_derivation_is_deterministic_per_bssid() {
        let bssid = [0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let k1 = derive_airmax_ac_key(&bssid);
        let k2 = derive_airmax_ac_key(&bssid);
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 16);
    }

    #[test]
    fn different_bssids_derive_different_keys() {
        let k1 = derive_airmax_ac_key(&[0x02, 0x03, 0x04, 0x05, 0x06, 0x07]);
        let k2 = derive_airmax_ac_key(&[0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d]);
        assert_ne!(k1, k2);
    }

    #[test]
    fn decrypt_rejects_non_block_aligned_input() {
        let bssid = [0u8; 6];
        assert!(decrypt_airmax_ac(&bssid, &[0u8; 15]).is_none());
        assert!(decrypt_airmax_ac(&bssid, &[]).is_none());
    }

    #[test]
    fn decrypt_round_trips_with_matching_encrypt() {
        use aes::cipher::BlockEncryptMut;
        let bssid = [0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let key = derive_airmax_ac_key(&bssid);
        let mut plaintext = *b"0123456789ABCDEF";
        let encryptor = ecb::Encryptor::<Aes128>::new(GenericArray::from_slice(&key));
        let block = GenericArray::from_mut_slice(&mut plaintext);
        encryptor.clone().encrypt_block_mut(block);
        let decrypted = decrypt_airmax_ac(&bssid, &plaintext).unwrap();
        assert_eq!(&decrypted, b"0123456789ABCDEF");
    }
}
