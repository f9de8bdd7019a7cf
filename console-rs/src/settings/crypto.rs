//! Symmetric cipher for secret settings
//!
//! AES-256-GCM keyed from a server-held secret (SHA-256 derived). A fresh
//! random 96-bit nonce is generated per call and prefixed to the
//! ciphertext, so decryption is self-contained and two encryptions of the
//! same plaintext never produce the same blob. The GCM tag makes any
//! tampering (nonce included) fail loudly on decrypt.

use crate::error::{ConsoleError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

pub struct SettingsCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl SettingsCipher {
    /// Derive the 32-byte AES key from the configured secret.
    pub fn new(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(ConsoleError::Config(
                "settings secret must not be empty".to_string(),
            ));
        }

        let digest = Sha256::digest(secret.as_bytes());
        let unbound = UnboundKey::new(&AES_256_GCM, &digest)
            .map_err(|_| ConsoleError::Cipher("failed to build AES-256-GCM key".to_string()))?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt a setting value into `base64(nonce ‖ ciphertext ‖ tag)`.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| ConsoleError::Cipher("nonce generation failed".to_string()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut buffer = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut buffer)
            .map_err(|_| ConsoleError::Cipher("encryption failed".to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + buffer.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&buffer);
        Ok(BASE64.encode(blob))
    }

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// Any modification of the blob, including the nonce prefix, is
    /// rejected by the AEAD open and surfaces as a cipher error.
    pub fn decrypt(&self, blob: &str) -> Result<String> {
        let raw = BASE64
            .decode(blob.trim())
            .map_err(|_| ConsoleError::Cipher("ciphertext is not valid base64".to_string()))?;

        if raw.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(ConsoleError::Cipher("ciphertext too short".to_string()));
        }

        let (nonce_bytes, sealed) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| ConsoleError::Cipher("invalid nonce".to_string()))?;

        let mut buffer = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut buffer)
            .map_err(|_| ConsoleError::Cipher("ciphertext rejected".to_string()))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| ConsoleError::Cipher("decrypted value is not UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> SettingsCipher {
        SettingsCipher::new("unit-test-secret").unwrap()
    }

    #[test]
    fn test_round_trip() {
        let c = cipher();
        for plaintext in [
            "",
            "hunter2",
            "päßwörd with ünicode ✓",
            "line1\nline2\ttab\0",
            &"x".repeat(8192),
        ] {
            let blob = c.encrypt(plaintext).unwrap();
            assert_eq!(c.decrypt(&blob).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let c = cipher();
        let a = c.encrypt("same plaintext").unwrap();
        let b = c.encrypt("same plaintext").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampering_fails_loudly() {
        let c = cipher();
        let blob = c.encrypt("secret value").unwrap();
        let mut raw = BASE64.decode(&blob).unwrap();

        // Flip one byte at every position, nonce included
        for i in 0..raw.len() {
            raw[i] ^= 0x01;
            let tampered = BASE64.encode(&raw);
            assert!(c.decrypt(&tampered).is_err(), "byte {i} not detected");
            raw[i] ^= 0x01;
        }
    }

    #[test]
    fn test_garbage_input() {
        let c = cipher();
        assert!(c.decrypt("not base64 at all!!!").is_err());
        assert!(c.decrypt("AAAA").is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let blob = cipher().encrypt("secret").unwrap();
        let other = SettingsCipher::new("different-secret").unwrap();
        assert!(other.decrypt(&blob).is_err());
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(SettingsCipher::new("").is_err());
    }
}
