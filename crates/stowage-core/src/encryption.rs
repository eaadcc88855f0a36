//! Encryption of backend secrets at rest

use crate::AppError;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};

const NONCE_LEN: usize = 12;

/// AES-256-GCM authenticated encryption for secret access keys.
/// Output format is base64(nonce || ciphertext).
#[derive(Clone)]
pub struct EncryptionService {
    cipher: Aes256Gcm,
}

impl EncryptionService {
    /// Create a new encryption service from a raw 32-byte key.
    pub fn from_key_bytes(key_bytes: &[u8]) -> Result<Self, AppError> {
        if key_bytes.len() != 32 {
            return Err(AppError::Internal(
                "Encryption key must be 32 bytes (256 bits)".to_string(),
            ));
        }
        let key = Key::<Aes256Gcm>::from_slice(key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Create a new encryption service from a base64-encoded 32-byte key (ENCRYPTION_KEY).
    pub fn from_base64_key(encoded: &str) -> Result<Self, AppError> {
        let key_bytes = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| AppError::Internal(format!("Failed to decode encryption key: {}", e)))?;

        Self::from_key_bytes(&key_bytes)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, AppError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| AppError::Internal(format!("Encryption failed: {}", e)))?;

        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(general_purpose::STANDARD.encode(&combined))
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String, AppError> {
        let combined = general_purpose::STANDARD
            .decode(encrypted)
            .map_err(|e| AppError::Internal(format!("Failed to decode encrypted data: {}", e)))?;

        if combined.len() < NONCE_LEN {
            return Err(AppError::Internal("Encrypted data too short".to_string()));
        }

        let nonce = Nonce::from_slice(&combined[..NONCE_LEN]);
        let ciphertext = &combined[NONCE_LEN..];

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| AppError::Internal(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| AppError::Internal(format!("Invalid UTF-8 in decrypted data: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> EncryptionService {
        EncryptionService::from_key_bytes(b"01234567890123456789012345678901").unwrap()
    }

    #[test]
    fn test_encryption_decryption() {
        let service = test_service();
        let secret = "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY";

        let encrypted = service.encrypt(secret).unwrap();
        assert_ne!(encrypted, secret);
        assert_eq!(service.decrypt(&encrypted).unwrap(), secret);
    }

    #[test]
    fn test_nonce_differs_per_call() {
        let service = test_service();
        assert_ne!(service.encrypt("same").unwrap(), service.encrypt("same").unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = test_service().encrypt("secret").unwrap();
        let other = EncryptionService::from_key_bytes(&[7u8; 32]).unwrap();
        assert!(other.decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_base64_key_must_be_32_bytes() {
        let key = general_purpose::STANDARD.encode([1u8; 32]);
        assert!(EncryptionService::from_base64_key(&key).is_ok());
        let short = general_purpose::STANDARD.encode([1u8; 16]);
        assert!(EncryptionService::from_base64_key(&short).is_err());
        assert!(EncryptionService::from_base64_key("not base64!").is_err());
    }
}
