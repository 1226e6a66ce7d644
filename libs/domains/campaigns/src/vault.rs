//! Credential vault: AES-256-GCM encryption for the provider API key.
//!
//! Stored values use the wire format `nonce:tag:ciphertext` (hex-encoded
//! parts), so [`CredentialVault::is_encrypted`] can tell an already-encrypted
//! value from a fresh plaintext key. That structural check is what makes the
//! settings save idempotent: re-saving an encrypted value stores it as-is
//! instead of encrypting it a second time and losing the key.

use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, KeyInit, Nonce};

use crate::error::{CampaignError, CampaignResult};

/// Environment variable holding the encryption secret.
pub const ENCRYPTION_SECRET_VAR: &str = "RELAY_ENCRYPTION_SECRET";

/// Minimum length of the encryption secret; the first 32 bytes form the key.
pub const MIN_SECRET_LEN: usize = 32;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encrypts and decrypts the sending-provider credential at rest.
#[derive(Clone)]
pub struct CredentialVault {
    key: Key<Aes256Gcm>,
}

impl CredentialVault {
    /// Build a vault from a secret of at least [`MIN_SECRET_LEN`] characters.
    pub fn new(secret: &str) -> CampaignResult<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(CampaignError::Credential(format!(
                "{} must be at least {} characters",
                ENCRYPTION_SECRET_VAR, MIN_SECRET_LEN
            )));
        }

        let key = Key::<Aes256Gcm>::clone_from_slice(&secret.as_bytes()[..MIN_SECRET_LEN]);
        Ok(Self { key })
    }

    /// Build a vault from the `RELAY_ENCRYPTION_SECRET` environment variable.
    pub fn from_env() -> CampaignResult<Self> {
        let secret = std::env::var(ENCRYPTION_SECRET_VAR).map_err(|_| {
            CampaignError::Credential(format!(
                "{} environment variable is not set",
                ENCRYPTION_SECRET_VAR
            ))
        })?;

        Self::new(&secret)
    }

    /// Encrypt a plaintext value into the `nonce:tag:ciphertext` wire format.
    pub fn encrypt(&self, plaintext: &str) -> CampaignResult<String> {
        let cipher = Aes256Gcm::new(&self.key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let sealed = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CampaignError::Credential("encryption failed".to_string()))?;

        // aes-gcm appends the 16-byte auth tag to the ciphertext
        let (body, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        Ok(format!(
            "{}:{}:{}",
            hex::encode(nonce),
            hex::encode(tag),
            hex::encode(body)
        ))
    }

    /// Decrypt a stored value. Fails on format errors, a wrong key, or a
    /// tampered ciphertext.
    pub fn decrypt(&self, stored: &str) -> CampaignResult<String> {
        let (nonce, tag, body) = Self::split_parts(stored)
            .ok_or_else(|| CampaignError::Credential("invalid encrypted value format".to_string()))?;

        let mut sealed = body;
        sealed.extend_from_slice(&tag);

        let cipher = Aes256Gcm::new(&self.key);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), sealed.as_ref())
            .map_err(|_| CampaignError::Credential("failed to decrypt credential".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| CampaignError::Credential("decrypted credential is not UTF-8".to_string()))
    }

    /// Whether a value is structurally an output of [`Self::encrypt`].
    pub fn is_encrypted(value: &str) -> bool {
        Self::split_parts(value).is_some()
    }

    fn split_parts(value: &str) -> Option<(Vec<u8>, Vec<u8>, Vec<u8>)> {
        let mut parts = value.split(':');
        let nonce = hex::decode(parts.next()?).ok()?;
        let tag = hex::decode(parts.next()?).ok()?;
        let body = hex::decode(parts.next()?).ok()?;

        if parts.next().is_some() || nonce.len() != NONCE_LEN || tag.len() != TAG_LEN {
            return None;
        }

        Some((nonce, tag, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let vault = CredentialVault::new(SECRET).unwrap();
        let stored = vault.encrypt("re_test_key_12345").unwrap();

        assert_ne!(stored, "re_test_key_12345");
        assert_eq!(vault.decrypt(&stored).unwrap(), "re_test_key_12345");
    }

    #[test]
    fn test_is_encrypted() {
        let vault = CredentialVault::new(SECRET).unwrap();
        let stored = vault.encrypt("re_test_key_12345").unwrap();

        assert!(CredentialVault::is_encrypted(&stored));
        assert!(!CredentialVault::is_encrypted("re_test_key_12345"));
        assert!(!CredentialVault::is_encrypted("a:b:c"));
        assert!(!CredentialVault::is_encrypted(""));
    }

    #[test]
    fn test_nonces_differ_between_encryptions() {
        let vault = CredentialVault::new(SECRET).unwrap();
        let first = vault.encrypt("re_key").unwrap();
        let second = vault.encrypt("re_key").unwrap();

        assert_ne!(first, second);
        assert_eq!(vault.decrypt(&first).unwrap(), vault.decrypt(&second).unwrap());
    }

    #[test]
    fn test_decrypt_rejects_tampered_value() {
        let vault = CredentialVault::new(SECRET).unwrap();
        let stored = vault.encrypt("re_test_key_12345").unwrap();

        let mut tampered = stored.clone();
        // Flip a hex digit in the ciphertext body
        let last = tampered.pop().unwrap();
        tampered.push(if last == '0' { '1' } else { '0' });

        assert!(vault.decrypt(&tampered).is_err());
    }

    #[test]
    fn test_decrypt_rejects_wrong_key() {
        let vault = CredentialVault::new(SECRET).unwrap();
        let other = CredentialVault::new("ffffffffffffffffffffffffffffffff").unwrap();
        let stored = vault.encrypt("re_test_key_12345").unwrap();

        assert!(other.decrypt(&stored).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(CredentialVault::new("too-short").is_err());
    }
}
