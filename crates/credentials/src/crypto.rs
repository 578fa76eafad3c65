//! At-rest cipher for credential material.
//!
//! AES-256-GCM with a fresh random 96-bit nonce per encryption; output is
//! base64(nonce ∥ ciphertext). The key is derived from a process-wide secret
//! via HMAC-SHA256 so the raw secret never acts as key material directly.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use hmac::Mac;
use sha2::Sha256;

use adjutant_domain::error::{Error, Result};

type HmacSha256 = hmac::Hmac<Sha256>;

const NONCE_LEN: usize = 12;

/// Symmetric cipher applied at the credential-store boundary. Callers of the
/// store only ever see plaintext; this type only ever persists ciphertext.
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Derive the cipher key from a process-wide secret (domain-separated).
    pub fn from_secret(secret: &str) -> Result<Self> {
        if secret.trim().is_empty() {
            return Err(Error::Config("encryption secret is empty".into()));
        }
        let mut mac = <HmacSha256 as Mac>::new_from_slice(b"adjutant-credentials-v1")
            .map_err(|e| Error::Crypto(format!("key derivation init failed: {e}")))?;
        mac.update(secret.as_bytes());
        let derived = mac.finalize().into_bytes();
        let mut key = [0u8; 32];
        key.copy_from_slice(&derived);

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| Error::Crypto(format!("derived key rejected: {e}")))?;
        Ok(Self { cipher })
    }

    /// Read the secret from the given environment variable.
    pub fn from_env(env_var: &str) -> Result<Self> {
        let secret = std::env::var(env_var).map_err(|_| {
            Error::Config(format!(
                "environment variable '{env_var}' is not set — credential \
                 encryption requires it"
            ))
        })?;
        Self::from_secret(&secret)
    }

    /// Encrypt a plaintext value. Returns base64(nonce ∥ ciphertext); the
    /// nonce is freshly random, so repeated calls on the same plaintext
    /// produce different outputs.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| Error::Crypto(format!("encryption failed: {e}")))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
    }

    /// Decrypt a base64(nonce ∥ ciphertext) value back to plaintext.
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let combined = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::Crypto(format!("base64 decode failed: {e}")))?;

        if combined.len() <= NONCE_LEN {
            return Err(Error::Crypto("encrypted value too short".into()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| Error::Crypto(format!("decryption failed: {e}")))?;

        String::from_utf8(plaintext).map_err(|e| Error::Crypto(format!("UTF-8 decode failed: {e}")))
    }
}
