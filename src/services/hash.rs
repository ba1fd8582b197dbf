//! Structural payload hashing for change detection.
//!
//! The hash is the big-endian first eight bytes of the MD5 digest of the
//! payload, rendered elsewhere as a decimal string in object metadata.
//! It is stable across restarts and architectures and is used only to decide
//! whether a payload changed; it makes no cryptographic claims. Changing
//! this algorithm invalidates every stored `Current-Object-Hash` value and
//! forces one spurious update per object on the next write.

/// Compute the 64-bit structural hash of a payload.
pub fn payload_hash(payload: &[u8]) -> u64 {
    let digest = md5::compute(payload);
    u64::from_be_bytes(digest.0[..8].try_into().expect("md5 digest is 16 bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_for_identical_bytes() {
        assert_eq!(payload_hash(b"PAYLOAD"), payload_hash(b"PAYLOAD"));
    }

    #[test]
    fn hash_differs_for_different_bytes() {
        assert_ne!(payload_hash(b"PAYLOAD"), payload_hash(b"payload"));
    }

    #[test]
    fn empty_payload_hashes_to_known_value() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(payload_hash(b""), 0xd41d8cd98f00b204);
    }

    #[test]
    fn decimal_rendering_round_trips() {
        let hash = payload_hash(b"hello");
        let rendered = hash.to_string();
        assert_eq!(rendered.parse::<u64>().unwrap(), hash);
    }
}
