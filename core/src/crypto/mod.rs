//! Cryptographic primitives for DataChain
//!
//! This module provides the content protection unit (wallet-keyed
//! authenticated encryption), integrity hashing, and signed access tokens.

mod protection;
pub mod token;

pub use protection::{
    ContentProtector, DerivedKey, EncryptedPayload, EncryptionEnvelope, IV_LEN, KEY_LEN, TAG_LEN,
};
pub use token::{AccessClaims, AccessTokenIssuer};

use sha2::{Digest, Sha256};

/// Length of an integrity digest in bytes
pub const DIGEST_LEN: usize = 32;

/// Compute the SHA-256 digest of arbitrary data
pub fn hash(data: &[u8]) -> [u8; DIGEST_LEN] {
    let result = Sha256::digest(data);
    let mut output = [0u8; DIGEST_LEN];
    output.copy_from_slice(&result);
    output
}

/// Compute the SHA-256 digest of arbitrary data as lowercase hex
pub fn hash_hex(data: &[u8]) -> String {
    hex::encode(hash(data))
}

/// Verify data against an expected hex digest
///
/// Accepts an optional `0x` prefix and either letter case. A malformed or
/// wrong-length digest is a mismatch, not an error. This is an integrity
/// check over public data, so the comparison is not constant-time.
pub fn verify_hash(data: &[u8], expected_digest: &str) -> bool {
    let expected = expected_digest.trim();
    let expected = expected.strip_prefix("0x").unwrap_or(expected);

    match hex::decode(expected) {
        Ok(bytes) if bytes.len() == DIGEST_LEN => bytes[..] == hash(data)[..],
        _ => false,
    }
}

/// Shorten a wallet address for log output
pub fn address_prefix(address: &str) -> String {
    let prefix: String = address.chars().take(10).collect();
    if prefix.len() < address.len() {
        format!("{}...", prefix)
    } else {
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let data = b"test data";
        assert_eq!(hash(data), hash(data));
        assert_eq!(hash_hex(data), hash_hex(data));
    }

    #[test]
    fn test_hash_distinguishes_inputs() {
        let fixtures: [&[u8]; 4] = [b"", b"a", b"b", b"covid-19 research dataset"];
        for (i, a) in fixtures.iter().enumerate() {
            for b in fixtures.iter().skip(i + 1) {
                assert_ne!(hash(a), hash(b));
            }
        }
    }

    #[test]
    fn test_hash_known_vector() {
        assert_eq!(
            hash_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_verify_hash() {
        let data = b"test data";
        let digest = hash_hex(data);

        assert!(verify_hash(data, &digest));
        assert!(verify_hash(data, &digest.to_uppercase()));
        assert!(verify_hash(data, &format!("0x{}", digest)));

        assert!(!verify_hash(b"different data", &digest));
        assert!(!verify_hash(data, "not hex at all"));
        assert!(!verify_hash(data, &digest[..62]));
        assert!(!verify_hash(data, ""));
    }

    #[test]
    fn test_address_prefix() {
        assert_eq!(address_prefix("0xA"), "0xA");
        assert_eq!(
            address_prefix("0x6069bfc76f707ec5fff32d1fbced5575"),
            "0x6069bfc7..."
        );
    }
}
