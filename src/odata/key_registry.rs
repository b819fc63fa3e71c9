//! Side table resolving the key-codec open question (spec §4.7): on first
//! encounter of a backend `ListingKey` (list or get), we remember the
//! encoded↔backend pair. `GET /Property(<k>)` then accepts either form:
//! an encoded key we've seen before is resolved back to its backend id; an
//! unrecognized key is tried as a raw backend id directly (the source
//! behavior spec §4.7 describes, kept as a fallback rather than the sole
//! behavior). Only a genuinely empty path key fails to decode.
//!
//! This is the redesign spec §4.7/§9 call for: "persisted forward/reverse
//! mapping populated lazily" instead of a one-way hash with no real
//! inverse. See DESIGN.md for the full rationale.

use super::key_codec::encode;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct KeyRegistry {
    encoded_to_backend: RwLock<HashMap<String, String>>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observes a backend key, recording its encoded form for later lookup.
    /// Returns the encoded form for display.
    pub fn observe(&self, backend_key: &str) -> String {
        let encoded = encode(backend_key);
        self.encoded_to_backend
            .write()
            .entry(encoded.clone())
            .or_insert_with(|| backend_key.to_string());
        encoded
    }

    /// Resolves a path key to a candidate backend key, or `None` if the
    /// path key fails to decode outright (empty input only).
    pub fn resolve(&self, path_key: &str) -> Option<String> {
        if path_key.is_empty() {
            return None;
        }
        if let Some(backend) = self.encoded_to_backend.read().get(path_key) {
            return Some(backend.clone());
        }
        // Unseen key: fall back to treating it as a raw backend id.
        Some(path_key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_a_previously_observed_key() {
        let registry = KeyRegistry::new();
        let encoded = registry.observe("MLS-2024-00001");
        assert_eq!(registry.resolve(&encoded), Some("MLS-2024-00001".to_string()));
    }

    #[test]
    fn unseen_key_falls_back_to_raw_passthrough() {
        let registry = KeyRegistry::new();
        assert_eq!(
            registry.resolve("MLS-RAW"),
            Some("MLS-RAW".to_string())
        );
    }

    #[test]
    fn empty_key_fails_to_decode() {
        let registry = KeyRegistry::new();
        assert_eq!(registry.resolve(""), None);
    }
}
