//! Reversible password codec.
//!
//! Stored passwords are AES-256-GCM ciphertexts, not hashes, so that existing records
//! keep round-tripping. Every `encode` draws a fresh nonce: compare decoded plaintexts,
//! never ciphertexts.
//
// TODO: move stored credentials to argon2 with a re-encode on next successful login.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use tracing::error;

const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("ciphertext is not valid base64")]
    Encoding,
    #[error("ciphertext too short")]
    Truncated,
    #[error("ciphertext failed authentication")]
    Decrypt,
    #[error("plaintext is not valid UTF-8")]
    Utf8,
    #[error("encryption failed")]
    Encrypt,
}

#[derive(Clone)]
pub struct CredentialCodec {
    cipher: Aes256Gcm,
}

impl CredentialCodec {
    pub fn new(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    pub fn encode(&self, plain: &str) -> Result<String, CodecError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plain.as_bytes())
            .map_err(|e| {
                error!(error = %e, "aes-gcm encrypt error");
                CodecError::Encrypt
            })?;
        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(STANDARD.encode(out))
    }

    pub fn decode(&self, encoded: &str) -> Result<String, CodecError> {
        let raw = STANDARD.decode(encoded).map_err(|_| CodecError::Encoding)?;
        if raw.len() <= NONCE_LEN {
            return Err(CodecError::Truncated);
        }
        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CodecError::Decrypt)?;
        String::from_utf8(plain).map_err(|_| CodecError::Utf8)
    }

    /// `true` only when `stored` decodes to exactly `plain`. Decode failures count as mismatch.
    pub fn matches(&self, plain: &str, stored: &str) -> bool {
        match self.decode(stored) {
            Ok(decoded) => decoded == plain,
            Err(_) => false,
        }
    }
}
