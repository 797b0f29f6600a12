//! SHA-256 checksums over actual bytes.
//!
//! Every checksum in this crate is computed from the bytes passed in,
//! never from an identifier or a size hint — a function named
//! `checksum` that doesn't read the payload is a bug.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Verify that `data` hashes to `expected` (case-insensitive hex compare).
pub fn verify_checksum(data: &[u8], expected: &str) -> bool {
    sha256_hex(data).eq_ignore_ascii_case(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // sha256("") = e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
        let hash = sha256_hex(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn verify_rejects_tampered_bytes() {
        let original = b"the quick brown fox";
        let checksum = sha256_hex(original);
        assert!(verify_checksum(original, &checksum));

        let mut tampered = original.to_vec();
        tampered[0] ^= 0x01;
        assert!(!verify_checksum(&tampered, &checksum));
    }

    proptest::proptest! {
        #[test]
        fn checksum_is_deterministic(data: Vec<u8>) {
            proptest::prop_assert_eq!(sha256_hex(&data), sha256_hex(&data));
        }

        #[test]
        fn checksum_changes_when_bytes_flip(mut data: Vec<u8>, idx in 0usize..64) {
            if data.is_empty() {
                data.push(0);
            }
            let idx = idx % data.len();
            let original = sha256_hex(&data);
            data[idx] ^= 0xFF;
            proptest::prop_assert_ne!(original, sha256_hex(&data));
        }
    }
}
