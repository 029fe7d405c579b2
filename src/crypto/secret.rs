use crate::crypto::kdf::{derive_key, CREDENTIAL_FILE_INFO};
use crate::error::{EmixError, Result};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;
use zeroize::Zeroize;

/// Secret size in bytes
pub const SECRET_SIZE: usize = 16;

/// The 16-byte secret every container key is derived from.
///
/// Zeroized on drop. An all-zero secret is what a header carries when no
/// password is embedded.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret {
    bytes: [u8; SECRET_SIZE],
}

impl Secret {
    pub fn from_bytes(bytes: [u8; SECRET_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_SIZE] {
        &self.bytes
    }

    pub fn is_zero(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }

    /// Generate a random secret from the system CSPRNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Build a secret from a typed password, zero-padded to 16 bytes
    pub fn from_password(password: &[u8]) -> Result<Self> {
        if password.is_empty() || password.len() > SECRET_SIZE {
            return Err(EmixError::InvalidPassword(format!(
                "length must be between 1 and {} bytes, got {}",
                SECRET_SIZE,
                password.len()
            )));
        }
        let mut bytes = [0u8; SECRET_SIZE];
        bytes[..password.len()].copy_from_slice(password);
        Ok(Self { bytes })
    }

    /// Derive a secret from the SHA-256 digest of a credential file
    pub fn from_credential_reader<R: io::Read>(reader: &mut R) -> Result<Self> {
        let mut hasher = Sha256::new();
        io::copy(reader, &mut hasher)?;
        let mut digest: [u8; 32] = hasher.finalize().into();
        let bytes = derive_key::<SECRET_SIZE>(&digest, CREDENTIAL_FILE_INFO);
        digest.zeroize();
        Ok(Self { bytes: bytes? })
    }

    pub fn from_credential_file(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        Self::from_credential_reader(&mut file)
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn test_password_padding() {
        let secret = Secret::from_password(b"hunter2").unwrap();
        let mut expected = [0u8; SECRET_SIZE];
        expected[..7].copy_from_slice(b"hunter2");
        assert_eq!(secret.as_bytes(), &expected);
    }

    #[test]
    fn test_password_bounds() {
        assert!(Secret::from_password(b"").is_err());
        assert!(Secret::from_password(&[b'a'; 17]).is_err());
        assert!(Secret::from_password(&[b'a'; 16]).is_ok());
        assert!(Secret::from_password(b"a").is_ok());
    }

    #[test]
    fn test_credential_file_deterministic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("key.bin");
        std::fs::write(&path, b"credential material").unwrap();

        let a = Secret::from_credential_file(&path).unwrap();
        let b = Secret::from_credential_reader(&mut Cursor::new(b"credential material")).unwrap();
        assert_eq!(a, b);

        let other = Secret::from_credential_reader(&mut Cursor::new(b"other material")).unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn test_generate_is_random() {
        let a = Secret::generate();
        let b = Secret::generate();
        assert_ne!(a, b);
        assert!(!a.is_zero());
        assert!(Secret::default().is_zero());
    }

    #[test]
    fn test_debug_redacted() {
        let secret = Secret::from_bytes([0xAB; SECRET_SIZE]);
        let out = format!("{:?}", secret);
        assert!(out.contains("REDACTED"));
        assert!(!out.contains("171"));
    }
}
