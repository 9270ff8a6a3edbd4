//! Wallet-keyed authenticated encryption for dataset payloads
//!
//! Keys are derived from the owner's wallet address with PBKDF2-HMAC-SHA256
//! and a per-payload random salt. Payloads are sealed with AES-256-GCM using
//! a fresh random IV and the owner address as associated data, so a
//! ciphertext only opens for the address it was sealed for.

use std::fmt::{Debug, Formatter, Result as FmtResult};

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use log::debug;
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::{address_prefix, hash_hex, verify_hash};
use crate::config::ProtectionConfig;
use crate::error::{CoreError, Result};

/// Symmetric key length in bytes
pub const KEY_LEN: usize = 32;

/// AES-GCM initialization vector length in bytes
pub const IV_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// Key material derived from an owner address; wiped on drop
pub struct DerivedKey {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl DerivedKey {
    /// Raw key bytes (use with care)
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

impl Debug for DerivedKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("DerivedKey(<redacted>)")
    }
}

/// Non-secret parameters stored alongside a ciphertext
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionEnvelope {
    /// KDF salt (hex)
    pub salt: String,

    /// Initialization vector (hex)
    pub iv: String,

    /// Authentication tag (hex)
    pub auth_tag: String,

    /// Wallet address whose key material sealed the payload
    pub owner_address: String,

    /// SHA-256 of the plaintext (hex)
    pub plaintext_hash: String,
}

/// Output of [`ContentProtector::encrypt`]
#[derive(Debug, Clone)]
pub struct EncryptedPayload {
    /// Ciphertext, same length as the plaintext
    pub ciphertext: Vec<u8>,

    /// Envelope needed to open it again
    pub envelope: EncryptionEnvelope,
}

/// The content protection unit
///
/// Stateless apart from its KDF parameters; safe to share across threads.
#[derive(Debug, Clone)]
pub struct ContentProtector {
    iterations: u32,
    salt_len: usize,
}

impl Default for ContentProtector {
    fn default() -> Self {
        Self::new(&ProtectionConfig::default())
    }
}

impl ContentProtector {
    /// Create a protector from configuration
    pub fn new(config: &ProtectionConfig) -> Self {
        ContentProtector {
            iterations: config.kdf_iterations.max(1),
            salt_len: config.salt_len.max(1),
        }
    }

    /// Create a protector with an explicit PBKDF2 work factor
    pub fn with_iterations(iterations: u32) -> Self {
        ContentProtector {
            iterations: iterations.max(1),
            ..Self::default()
        }
    }

    /// PBKDF2 work factor in use
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Derive a key from an owner address
    ///
    /// With `salt` omitted a fresh random salt is generated. The salt actually
    /// used is always returned and must be kept for decryption.
    pub fn derive_key(&self, owner_address: &str, salt: Option<&[u8]>) -> Result<(DerivedKey, Vec<u8>)> {
        if owner_address.is_empty() {
            return Err(CoreError::InvalidInput("owner address must not be empty".to_string()));
        }

        let salt = match salt {
            Some([]) => {
                return Err(CoreError::InvalidInput("salt must not be empty".to_string()));
            }
            Some(salt) => salt.to_vec(),
            None => random_bytes(self.salt_len),
        };

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2_hmac::<Sha256>(owner_address.as_bytes(), &salt, self.iterations, key.as_mut_slice());

        Ok((DerivedKey { key }, salt))
    }

    /// Encrypt a payload for an owner address
    pub fn encrypt(&self, plaintext: &[u8], owner_address: &str) -> Result<EncryptedPayload> {
        let (key, salt) = self.derive_key(owner_address, None)?;
        let iv = random_bytes(IV_LEN);

        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CoreError::Internal(format!("cipher init failed: {}", e)))?;

        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(&iv), owner_address.as_bytes(), &mut buffer)
            .map_err(|e| CoreError::Internal(format!("encryption failed: {}", e)))?;

        debug!(
            "Sealed {} bytes for {}",
            plaintext.len(),
            address_prefix(owner_address)
        );

        Ok(EncryptedPayload {
            ciphertext: buffer,
            envelope: EncryptionEnvelope {
                salt: hex::encode(&salt),
                iv: hex::encode(&iv),
                auth_tag: hex::encode(tag.as_slice()),
                owner_address: owner_address.to_string(),
                plaintext_hash: hash_hex(plaintext),
            },
        })
    }

    /// Decrypt a payload for an owner address
    ///
    /// The supplied address is checked against the envelope before any
    /// cryptographic work. On tag failure no plaintext is returned.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        owner_address: &str,
        envelope: &EncryptionEnvelope,
    ) -> Result<Vec<u8>> {
        if owner_address.is_empty() {
            return Err(CoreError::InvalidInput("owner address must not be empty".to_string()));
        }
        if owner_address != envelope.owner_address {
            return Err(CoreError::AccessDenied(format!(
                "{} is not the owner of this payload",
                address_prefix(owner_address)
            )));
        }

        let salt = decode_field("salt", &envelope.salt)?;
        let iv = decode_field("iv", &envelope.iv)?;
        let tag = decode_field("auth_tag", &envelope.auth_tag)?;

        if iv.len() != IV_LEN {
            return Err(CoreError::Internal(format!(
                "iv must be {} bytes, got {}",
                IV_LEN,
                iv.len()
            )));
        }
        if tag.len() != TAG_LEN {
            return Err(CoreError::Internal(format!(
                "auth_tag must be {} bytes, got {}",
                TAG_LEN,
                tag.len()
            )));
        }

        let (key, _) = self.derive_key(owner_address, Some(salt.as_slice()))?;
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CoreError::Internal(format!("cipher init failed: {}", e)))?;

        let mut buffer = ciphertext.to_vec();
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&iv),
                owner_address.as_bytes(),
                &mut buffer,
                GenericArray::from_slice(&tag),
            )
            .map_err(|_| CoreError::Integrity("authentication tag mismatch".to_string()))?;

        if !verify_hash(&buffer, &envelope.plaintext_hash) {
            return Err(CoreError::Integrity("plaintext digest mismatch".to_string()));
        }

        debug!(
            "Opened {} bytes for {}",
            buffer.len(),
            address_prefix(owner_address)
        );

        Ok(buffer)
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value).map_err(|e| CoreError::Internal(format!("malformed {}: {}", name, e)))
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
