//! Encryption of subscriber secrets at rest

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};

use crate::error::CipherError;

/// Prefix marking values produced by [`AesGcmCipher`]
pub const CIPHERTEXT_PREFIX: &str = "enc:v1:";

/// Nonce size for AES-GCM (96 bits)
const NONCE_SIZE: usize = 12;

/// Encrypts and decrypts subscriber secrets.
pub trait SecretCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError>;

    fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError>;

    /// Whether a stored value was produced by this cipher. Values that are
    /// not are treated as legacy plaintext secrets.
    fn is_encrypted(&self, stored: &str) -> bool;
}

/// AES-256-GCM cipher. Output is `enc:v1:` followed by
/// base64(nonce || ciphertext || tag).
#[derive(Clone)]
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AesGcmCipher { .. }")
    }
}

impl AesGcmCipher {
    /// Create a cipher from a 32-byte key
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != 32 {
            return Err(CipherError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                key.len()
            )));
        }
        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|e| CipherError::InvalidKey(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Create a cipher from a base64-encoded 32-byte key
    pub fn from_base64(encoded: &str) -> Result<Self, CipherError> {
        let key = BASE64
            .decode(encoded.trim())
            .map_err(|e| CipherError::InvalidKey(format!("base64 decode failed: {e}")))?;
        Self::new(&key)
    }
}

impl SecretCipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CipherError::Encrypt(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        Ok(format!("{CIPHERTEXT_PREFIX}{}", BASE64.encode(&sealed)))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError> {
        let encoded = ciphertext
            .strip_prefix(CIPHERTEXT_PREFIX)
            .ok_or_else(|| CipherError::Decrypt("missing ciphertext prefix".to_string()))?;

        let sealed = BASE64
            .decode(encoded)
            .map_err(|e| CipherError::Decrypt(format!("base64 decode failed: {e}")))?;

        if sealed.len() <= NONCE_SIZE {
            return Err(CipherError::Decrypt("ciphertext too short".to_string()));
        }

        let (nonce, body) = sealed.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), body)
            .map_err(|e| CipherError::Decrypt(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| CipherError::Decrypt(e.to_string()))
    }

    fn is_encrypted(&self, stored: &str) -> bool {
        stored.starts_with(CIPHERTEXT_PREFIX)
    }
}

/// Recover the plaintext secret of a stored value, passing legacy plaintext
/// values through unchanged.
pub fn open_secret(cipher: &dyn SecretCipher, stored: &str) -> Result<String, CipherError> {
    if cipher.is_encrypted(stored) {
        cipher.decrypt(stored)
    } else {
        Ok(stored.to_string())
    }
}
