//! Ubiquiti AirMax vendor information element (OUI `00:15:6d`). Ported from
//! `ie-airmax.c`, which is presence-only: no fields are decoded, only the
//! exact total length is validated.

use crate::ie::mac80211::AirmaxIe;

const TOTAL_LEN: usize = 38;

/// `ie` is the full vendor-tag payload, magic included.
pub fn parse(ie: &[u8]) -> Option<AirmaxIe> {
    if ie.len() == TOTAL_LEN {
        Some(AirmaxIe)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_exact_length() {
        assert!(parse(&[0u8; TOTAL_LEN]).is_some());
        assert!(parse(&[0u8; TOTAL_LEN - 1]).is_none());
        assert!(parse(&[0u8; TOTAL_LEN + 1]).is_none());
    }
}
