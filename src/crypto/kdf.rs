//! HKDF-SHA256 key derivation
//!
//! Every key used by a container is derived from the 16-byte secret. No salt
//! is mixed in; the info string alone separates the metadata key from the
//! content key and from credential-file secrets.

use crate::error::{EmixError, Result};
use hkdf::Hkdf;
use sha2::Sha256;

/// Info string for the AES-256-GCM key sealing the file record
pub const METADATA_KEY_INFO: &[u8] = b"aesgem key";

/// Info string for the AES-XTS content key
pub const CONTENT_KEY_INFO: &[u8] = b"aesxts key";

/// Info string turning a credential file digest into a secret
pub const CREDENTIAL_FILE_INFO: &[u8] = b"credential file";

/// Derive `output_length` bytes from `secret` under `context`
pub fn derive(secret: &[u8], context: &[u8], output_length: usize) -> Result<Vec<u8>> {
    let hkdf = Hkdf::<Sha256>::new(None, secret);
    let mut out = vec![0u8; output_length];
    hkdf.expand(context, &mut out)
        .map_err(|_| EmixError::KeyDerivation(format!("invalid output length {}", output_length)))?;
    Ok(out)
}

/// Fixed-size variant of [`derive`]
pub fn derive_key<const N: usize>(secret: &[u8], context: &[u8]) -> Result<[u8; N]> {
    let hkdf = Hkdf::<Sha256>::new(None, secret);
    let mut key = [0u8; N];
    hkdf.expand(context, &mut key)
        .map_err(|_| EmixError::KeyDerivation(format!("invalid output length {}", N)))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: [u8; 16] = [7u8; 16];

    #[test]
    fn test_derive_deterministic() {
        let a = derive(&SECRET, METADATA_KEY_INFO, 32).unwrap();
        let b = derive(&SECRET, METADATA_KEY_INFO, 32).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_contexts_separate_keys() {
        let meta: [u8; 32] = derive_key(&SECRET, METADATA_KEY_INFO).unwrap();
        let content: [u8; 32] = derive_key(&SECRET, CONTENT_KEY_INFO).unwrap();
        assert_ne!(meta, content);
    }

    #[test]
    fn test_fixed_and_dynamic_agree() {
        let fixed: [u8; 16] = derive_key(&SECRET, CREDENTIAL_FILE_INFO).unwrap();
        let dynamic = derive(&SECRET, CREDENTIAL_FILE_INFO, 16).unwrap();
        assert_eq!(fixed.as_slice(), dynamic.as_slice());
    }

    #[test]
    fn test_shorter_output_is_prefix() {
        // HKDF-Expand output blocks do not depend on the requested length
        let long = derive(&SECRET, CONTENT_KEY_INFO, 64).unwrap();
        let short = derive(&SECRET, CONTENT_KEY_INFO, 32).unwrap();
        assert_eq!(&long[..32], short.as_slice());
    }

    #[test]
    fn test_rfc5869_case_3() {
        // RFC 5869 test case 3: no salt, no info
        let ikm = [0x0bu8; 22];
        let okm = derive(&ikm, b"", 42).unwrap();
        assert_eq!(
            hex::encode(okm),
            "8da4e775a563c18f715f802a063c5a31b8a11f5c5ee1879ec3454e5f3c738d2d9d201395faa4b61a96c8"
        );
    }

    #[test]
    fn test_output_too_long() {
        assert!(matches!(
            derive(&SECRET, CONTENT_KEY_INFO, 255 * 32 + 1),
            Err(EmixError::KeyDerivation(_))
        ));
    }
}
