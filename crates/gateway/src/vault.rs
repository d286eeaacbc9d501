//! Credential vault — AES-256-GCM sealing of per-account storage state.
//!
//! Blob layout: 12-byte random nonce followed by the ciphertext. The key
//! arrives base64-encoded through the environment; a missing key leaves the
//! vault unconstructed, which every dependent code path treats as a
//! precondition failure. Decrypt errors never expose ciphertext or key
//! material.

use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Bumped when the key derivation scheme changes; rows record the version
/// they were sealed with so a future rotation can re-encrypt lazily.
pub const KEY_VERSION: i64 = 1;

const NONCE_LEN: usize = 12;

#[derive(thiserror::Error, Debug)]
pub enum VaultError {
    #[error("credential encryption key is not configured")]
    KeyMissing,

    #[error("credential encryption key must be 32 bytes, base64-encoded")]
    KeyInvalid,

    #[error("failed to encrypt credential payload")]
    EncryptFailed,

    #[error("failed to decrypt credential blob")]
    DecryptFailed,
}

pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl CredentialVault {
    pub fn new(key: &[u8]) -> Result<Self, VaultError> {
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| VaultError::KeyInvalid)?;
        Ok(Self { cipher })
    }

    /// Build the vault from the env var named by `env_var`.
    ///
    /// Unset/empty → `Ok(None)` (the feature is off); present but not a
    /// base64 32-byte key → error, since a half-configured vault would
    /// silently produce unreadable credentials.
    pub fn from_env(env_var: &str) -> Result<Option<Self>, VaultError> {
        let raw = match std::env::var(env_var) {
            Ok(v) if !v.trim().is_empty() => v,
            _ => return Ok(None),
        };
        let key = BASE64
            .decode(raw.trim())
            .map_err(|_| VaultError::KeyInvalid)?;
        if key.len() != 32 {
            return Err(VaultError::KeyInvalid);
        }
        Ok(Some(Self::new(&key)?))
    }

    /// Serialize compactly, encrypt, and prepend the nonce.
    pub fn encrypt_json(&self, value: &serde_json::Value) -> Result<Vec<u8>, VaultError> {
        let payload = serde_json::to_vec(value).map_err(|_| VaultError::EncryptFailed)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, payload.as_slice())
            .map_err(|_| VaultError::EncryptFailed)?;
        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Inverse of [`encrypt_json`]. Every failure collapses to
    /// `DecryptFailed`.
    pub fn decrypt_json(&self, blob: &[u8]) -> Result<serde_json::Value, VaultError> {
        if blob.len() <= NONCE_LEN {
            return Err(VaultError::DecryptFailed);
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let payload = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::DecryptFailed)?;
        serde_json::from_slice(&payload).map_err(|_| VaultError::DecryptFailed)
    }
}
