//! Caller-side authenticated encryption of stored files (XChaCha20-Poly1305).
//!
//! Payload format: nonce (24 bytes) || ciphertext || tag (16 bytes).

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    XChaCha20Poly1305, XNonce,
};

const NONCE_SIZE: usize = 24;
const TAG_SIZE: usize = 16;
pub const SECRET_SIZE: usize = 32;

#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("Secret must be exactly {SECRET_SIZE} bytes, got {0}")]
    InvalidSecret(usize),
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed, data may be corrupted or the secret is wrong")]
    DecryptionFailed,
    #[error("Invalid ciphertext format")]
    InvalidFormat,
}

/// Key used to seal files before they are handed to the ring.
pub struct Secret {
    cipher: XChaCha20Poly1305,
}

impl Secret {
    pub fn new(secret: &[u8]) -> Result<Self, CryptoError> {
        let cipher = XChaCha20Poly1305::new_from_slice(secret)
            .map_err(|_| CryptoError::InvalidSecret(secret.len()))?;

        Ok(Secret { cipher })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        Ok(sealed)
    }

    pub fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::InvalidFormat);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);

        self.cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}
