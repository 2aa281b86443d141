//! AES-256-GCM encryption for team API keys at rest.
//!
//! Stored form: standard base64 of `nonce (12 bytes) || ciphertext || tag (16 bytes)`.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;

use acacia_core::config::EncryptionConfig;

const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),
    #[error("ciphertext is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("ciphertext too short")]
    TooShort,
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed (wrong key or corrupted data)")]
    Decrypt,
    #[error("decrypted value is not UTF-8")]
    Utf8,
}

/// Turns a stored credential back into the vendor API key.
pub trait Decrypter: Send + Sync {
    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError>;
}

pub struct EncryptionService {
    cipher: Aes256Gcm,
}

impl EncryptionService {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    pub fn from_config(config: &EncryptionConfig) -> Result<Self, CryptoError> {
        let key = config
            .key_bytes()
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self::new(&key))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        // AES-GCM appends the 16-byte tag to the ciphertext.
        let sealed = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;

        let mut combined = Vec::with_capacity(NONCE_LEN + sealed.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&sealed);
        Ok(STANDARD.encode(combined))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let data = STANDARD.decode(encoded.trim())?;
        if data.len() < NONCE_LEN {
            return Err(CryptoError::TooShort);
        }
        let (nonce_bytes, sealed) = data.split_at(NONCE_LEN);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| CryptoError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::Utf8)
    }
}

impl Decrypter for EncryptionService {
    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        EncryptionService::decrypt(self, ciphertext)
    }
}
