use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose, Engine as _};
use rand::Rng;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::ClassifiedError;

pub const NONCE_LEN: usize = 12;

/// Symmetric payload cipher: AES-256-GCM keyed by the SHA-256 digest of the
/// configured secret. Nonces are caller-supplied so one nonce can cover every
/// field of a single request and travel alongside it as metadata.
pub struct PayloadCipher {
    cipher: Aes256Gcm,
}

impl PayloadCipher {
    pub fn new(secret: &str) -> Self {
        let key = derive_key(secret);
        Self {
            cipher: Aes256Gcm::new(&key.into()),
        }
    }

    pub fn generate_nonce() -> [u8; NONCE_LEN] {
        let mut bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill(&mut bytes);
        bytes
    }

    pub fn encrypt_str(
        &self,
        plaintext: &str,
        nonce: &[u8; NONCE_LEN],
    ) -> Result<String, ClassifiedError> {
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(nonce), plaintext.as_bytes())
            .map_err(|e| ClassifiedError::encryption(format!("cipher failure: {e}")))?;
        Ok(general_purpose::STANDARD.encode(ciphertext))
    }

    /// Strings encrypt their UTF-8 bytes; any other value encrypts its JSON
    /// serialization.
    pub fn encrypt_value(
        &self,
        value: &Value,
        nonce: &[u8; NONCE_LEN],
    ) -> Result<String, ClassifiedError> {
        let plaintext = match value {
            Value::String(s) => s.clone(),
            other => serde_json::to_string(other)
                .map_err(|e| ClassifiedError::encryption(format!("serializing payload: {e}")))?,
        };
        self.encrypt_str(&plaintext, nonce)
    }

    pub fn decrypt_str(
        &self,
        ciphertext_b64: &str,
        nonce: &[u8; NONCE_LEN],
    ) -> Result<String, ClassifiedError> {
        let bytes = general_purpose::STANDARD
            .decode(ciphertext_b64)
            .map_err(|e| ClassifiedError::encryption(format!("decoding ciphertext: {e}")))?;
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), bytes.as_ref())
            .map_err(|e| ClassifiedError::encryption(format!("cipher failure: {e}")))?;
        String::from_utf8(plaintext)
            .map_err(|e| ClassifiedError::encryption(format!("non-utf8 plaintext: {e}")))
    }
}

fn derive_key(secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let cipher = PayloadCipher::new("test-secret");
        let nonce = PayloadCipher::generate_nonce();

        let sealed = cipher.encrypt_str("hunter2", &nonce).unwrap();
        assert_ne!(sealed, "hunter2");
        assert_eq!(cipher.decrypt_str(&sealed, &nonce).unwrap(), "hunter2");
    }

    #[test]
    fn test_fresh_nonce_changes_ciphertext() {
        let cipher = PayloadCipher::new("test-secret");
        let a = cipher
            .encrypt_str("same plaintext", &PayloadCipher::generate_nonce())
            .unwrap();
        let b = cipher
            .encrypt_str("same plaintext", &PayloadCipher::generate_nonce())
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_non_string_values_encrypt_their_json() {
        let cipher = PayloadCipher::new("test-secret");
        let nonce = PayloadCipher::generate_nonce();

        let sealed = cipher.encrypt_value(&json!({"pin": 1234}), &nonce).unwrap();
        let opened = cipher.decrypt_str(&sealed, &nonce).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&opened).unwrap(), json!({"pin": 1234}));
    }

    #[test]
    fn test_wrong_key_fails_to_decrypt() {
        let nonce = PayloadCipher::generate_nonce();
        let sealed = PayloadCipher::new("key-one").encrypt_str("secret", &nonce).unwrap();
        assert!(PayloadCipher::new("key-two").decrypt_str(&sealed, &nonce).is_err());
    }
}
