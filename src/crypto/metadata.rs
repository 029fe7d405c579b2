//! AES-256-GCM sealing of the encoded file record
//!
//! Output layout: `nonce (12) || ciphertext || tag (16)`.

use crate::crypto::kdf::{derive_key, METADATA_KEY_INFO};
use crate::crypto::secret::Secret;
use crate::error::{EmixError, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroize;

/// GCM nonce size in bytes
pub const NONCE_SIZE: usize = 12;

/// GCM tag size in bytes
pub const TAG_SIZE: usize = 16;

/// Bytes added to the plaintext by [`encrypt`]
pub const OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

fn cipher_for(secret: &Secret) -> Result<Aes256Gcm> {
    let mut key = derive_key::<32>(secret.as_bytes(), METADATA_KEY_INFO)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    key.zeroize();
    Ok(cipher)
}

/// Seal `plaintext` under a fresh random nonce
pub fn encrypt(plaintext: &[u8], secret: &Secret) -> Result<Vec<u8>> {
    let cipher = cipher_for(secret)?;

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| EmixError::Encryption("AES-GCM seal failed".into()))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Open a buffer produced by [`encrypt`]
pub fn decrypt(ciphertext: &[u8], secret: &Secret) -> Result<Vec<u8>> {
    if ciphertext.len() < NONCE_SIZE {
        return Err(EmixError::InvalidFormat(
            "Encrypted file info shorter than nonce".into(),
        ));
    }
    let cipher = cipher_for(secret)?;
    let (nonce, sealed) = ciphertext.split_at(NONCE_SIZE);
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| EmixError::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> Secret {
        Secret::from_bytes([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16])
    }

    #[test]
    fn test_roundtrip() {
        let plaintext = b"hello world";
        let sealed = encrypt(plaintext, &secret()).unwrap();
        assert_eq!(sealed.len(), plaintext.len() + OVERHEAD);
        assert_eq!(decrypt(&sealed, &secret()).unwrap(), plaintext);
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let a = encrypt(b"same input", &secret()).unwrap();
        let b = encrypt(b"same input", &secret()).unwrap();
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_secret() {
        let sealed = encrypt(b"hello world", &secret()).unwrap();
        let wrong = Secret::from_bytes([9u8; 16]);
        assert!(matches!(decrypt(&sealed, &wrong), Err(EmixError::Authentication)));
    }

    #[test]
    fn test_tampered_bytes() {
        let sealed = encrypt(b"hello world", &secret()).unwrap();
        for i in 0..sealed.len() {
            let mut tampered = sealed.clone();
            tampered[i] ^= 0x01;
            assert!(
                matches!(decrypt(&tampered, &secret()), Err(EmixError::Authentication)),
                "flipping byte {} must fail authentication",
                i
            );
        }
    }

    #[test]
    fn test_too_short() {
        assert!(matches!(
            decrypt(&[0u8; NONCE_SIZE - 1], &secret()),
            Err(EmixError::InvalidFormat(_))
        ));
        // A bare nonce has no tag and must not authenticate
        assert!(matches!(
            decrypt(&[0u8; NONCE_SIZE], &secret()),
            Err(EmixError::Authentication)
        ));
    }
}
