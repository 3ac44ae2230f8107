//! Symmetric encryption of stored login secrets.
//!
//! AES-256-GCM with a fresh random 96-bit nonce per call. The output is
//! `base64(nonce || ciphertext)`.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt;

use crate::error::{CryptoError, CryptoResult};
use crate::security::SecretString;

const NONCE_LEN: usize = 12;

/// Process-wide credential vault.
#[derive(Clone)]
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl CredentialVault {
    /// Create from a raw 32-byte key.
    pub fn new(key: &[u8]) -> CryptoResult<Self> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidKey(format!("expected 32 bytes, got {}", key.len())))?;
        Ok(Self { cipher })
    }

    /// Create from a base64-encoded key (the configured form).
    pub fn from_base64_key(key: &SecretString) -> CryptoResult<Self> {
        let bytes = STANDARD
            .decode(key.expose().trim())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Self::new(&bytes)
    }

    /// Encrypt bytes with a fresh nonce.
    pub fn encrypt(&self, plain: &[u8]) -> CryptoResult<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plain)
            .map_err(|_| CryptoError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    /// Decrypt the output of [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, cipher_b64: &str) -> CryptoResult<Vec<u8>> {
        let data = STANDARD.decode(cipher_b64.trim())?;
        if data.len() < NONCE_LEN {
            return Err(CryptoError::TooShort { len: data.len() });
        }

        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decrypt)
    }

    pub fn encrypt_str(&self, plain: &SecretString) -> CryptoResult<String> {
        self.encrypt(plain.expose().as_bytes())
    }

    pub fn decrypt_str(&self, cipher_b64: &str) -> CryptoResult<SecretString> {
        let bytes = self.decrypt(cipher_b64)?;
        String::from_utf8(bytes)
            .map(SecretString::from)
            .map_err(|_| CryptoError::Utf8)
    }
}

impl fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialVault([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> CredentialVault {
        CredentialVault::new(&[7u8; 32]).unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let vault = vault();
        let cases: [&[u8]; 4] = [b"", b"p", b"correct horse battery staple", &[0, 255, 10, 13]];
        for plain in cases {
            let sealed = vault.encrypt(plain).unwrap();
            assert_eq!(vault.decrypt(&sealed).unwrap(), plain);
        }
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let vault = vault();
        let a = vault.encrypt(b"same").unwrap();
        let b = vault.encrypt(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let vault = vault();
        let sealed = vault.encrypt(b"secret").unwrap();
        let mut bytes = STANDARD.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = STANDARD.encode(bytes);

        assert!(matches!(vault.decrypt(&tampered), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = vault().encrypt(b"secret").unwrap();
        let other = CredentialVault::new(&[8u8; 32]).unwrap();
        assert!(matches!(other.decrypt(&sealed), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn test_short_input_fails() {
        let short = STANDARD.encode([1u8; 5]);
        assert!(matches!(
            vault().decrypt(&short),
            Err(CryptoError::TooShort { len: 5 })
        ));
    }

    #[test]
    fn test_invalid_key_length() {
        assert!(matches!(
            CredentialVault::new(&[0u8; 16]),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_secret_string_roundtrip() {
        let vault = vault();
        let sealed = vault.encrypt_str(&SecretString::new("hunter2")).unwrap();
        assert_eq!(vault.decrypt_str(&sealed).unwrap().expose(), "hunter2");
    }
}
