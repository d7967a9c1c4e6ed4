//! Fallback-encoding transcode for SSID/radioname bytes.
//!
//! Per SPEC_FULL.md §9: validate UTF-8 first; on failure, decode using a
//! configurable fallback label; on failure of that, lossy-replace. RouterOS
//! and various vendor IEs carry a handful of legacy single-byte encodings in
//! SSID/radio-name fields, most commonly ISO-8859-2 in the field.

/// Decodes `bytes` as UTF-8; on failure, as `fallback_encoding` (an
/// `encoding_rs` label such as `"ISO-8859-2"`); on failure of that label
/// lookup itself, lossy-replaces using UTF-8's own replacement rules.
pub fn decode_with_fallback(bytes: &[u8], fallback_encoding: &str) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    if let Some(encoding) = encoding_rs::Encoding::for_label(fallback_encoding.as_bytes()) {
        let (decoded, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return decoded.into_owned();
        }
    }
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_utf8_passes_through() {
        assert_eq!(decode_with_fallback("caf\u{e9}".as_bytes(), "ISO-8859-2"), "café");
    }

    #[test]
    fn latin2_bytes_decode_via_fallback() {
        // 0xE9 in ISO-8859-2 is LATIN SMALL LETTER E WITH ACUTE, same as Latin-1 here.
        let bytes = [0x63, 0x61, 0x66, 0xE9];
        assert_eq!(decode_with_fallback(&bytes, "ISO-8859-2"), "café");
    }

    #[test]
    fn unknown_label_falls_back_to_lossy() {
        let bytes = [0xFF, 0xFE];
        let decoded = decode_with_fallback(&bytes, "not-a-real-encoding");
        assert!(decoded.contains('\u{FFFD}'));
    }
}
