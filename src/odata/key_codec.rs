//! Property key codec (C7): deterministic encoding of the opaque backend
//! `ListingKey` string into a stable, URL-safe, numeric-looking display
//! form.
//!
//! Encoding: SHA-256 of the UTF-8 backend key; interpret the first 8 bytes
//! big-endian as an unsigned integer; mask the high bit to zero so the
//! value fits a signed 63-bit integer; render as decimal.
//!
//! Decoding is *not* a true inverse — re-hashing every candidate backend key
//! is infeasible at scale. See DESIGN.md for how `GET /Property(<k>)`
//! resolves the open question in spec §4.7: this port keeps `ListingKey`
//! encoded for display but resolves single-entity fetches through a
//! lazily-populated side table (`encoded_key -> backend_key`) built as the
//! codec observes keys, rather than re-running the hash over the whole
//! table or silently passing the encoded value through as a backend id.

use sha2::{Digest, Sha256};

/// Encodes a backend `ListingKey` into its stable decimal display form.
pub fn encode(backend_key: &str) -> String {
    let digest = Sha256::digest(backend_key.as_bytes());
    let mut high8 = [0u8; 8];
    high8.copy_from_slice(&digest[..8]);
    let raw = u64::from_be_bytes(high8);
    let masked = raw & 0x7FFF_FFFF_FFFF_FFFF;
    masked.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(encode("MLS-2024-00001"), encode("MLS-2024-00001"));
    }

    #[test]
    fn output_is_decimal_digits_only() {
        let encoded = encode("MLS-2024-00001");
        assert!(!encoded.is_empty());
        assert!(encoded.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn different_inputs_produce_different_outputs() {
        assert_ne!(encode("MLS-1"), encode("MLS-2"));
    }

    #[test]
    fn high_bit_is_always_clear() {
        for key in ["a", "MLS-2024-00001", "", "💡"] {
            let encoded = encode(key);
            let value: u64 = encoded.parse().unwrap();
            assert!(value <= i64::MAX as u64);
        }
    }
}
