//! AES-XTS sector cipher for file content
//!
//! Content is processed in independent 4096-byte sectors. The first sector of
//! every file uses sector number 1024. A short final chunk is encrypted as a
//! full sector: the bytes past the real data are whatever the plaintext
//! buffer held from the previous sector (zero for the first one). Those bytes
//! reach the container padded tail, encrypted, and are dropped on decrypt
//! because the logical size is known from the header.

use crate::crypto::kdf::{derive_key, CONTENT_KEY_INFO};
use crate::crypto::secret::Secret;
use crate::error::{EmixError, Result};
use crate::stream::read_full;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::KeyInit;
use aes::Aes128;
use std::io::{Read, Write};
use tracing::debug;
use xts_mode::{get_tweak_default, Xts128};
use zeroize::Zeroize;

/// Sector size in bytes
pub const SECTOR_SIZE: usize = 4096;

/// Sector number of the first content sector
pub const FIRST_SECTOR: u64 = 1024;

/// Size of the content region for `size` logical bytes of encrypted content
pub fn encrypted_len(size: u64) -> u64 {
    size.div_ceil(SECTOR_SIZE as u64) * SECTOR_SIZE as u64
}

pub struct ContentCipher {
    xts: Xts128<Aes128>,
}

impl ContentCipher {
    /// Build the cipher from the content subkey of `secret`
    pub fn new(secret: &Secret) -> Result<Self> {
        let mut key = derive_key::<32>(secret.as_bytes(), CONTENT_KEY_INFO)?;
        let cipher = Self::from_key(&key);
        key.zeroize();
        Ok(cipher)
    }

    /// Build the cipher from a raw 32-byte XTS key (data key || tweak key)
    pub fn from_key(key: &[u8; 32]) -> Self {
        let mut data_key = [0u8; 16];
        let mut tweak_key = [0u8; 16];
        data_key.copy_from_slice(&key[..16]);
        tweak_key.copy_from_slice(&key[16..]);

        let data_cipher = Aes128::new(&GenericArray::from(data_key));
        let tweak_cipher = Aes128::new(&GenericArray::from(tweak_key));
        data_key.zeroize();
        tweak_key.zeroize();

        Self {
            xts: Xts128::new(data_cipher, tweak_cipher),
        }
    }

    pub fn encrypt_sector(&self, sector: &mut [u8; SECTOR_SIZE], number: u64) {
        self.xts
            .encrypt_sector(sector, get_tweak_default(u128::from(number)));
    }

    pub fn decrypt_sector(&self, sector: &mut [u8; SECTOR_SIZE], number: u64) {
        self.xts
            .decrypt_sector(sector, get_tweak_default(u128::from(number)));
    }

    /// Encrypt `reader` to `writer` until end of input.
    /// Returns the number of sectors written.
    pub fn encrypt_stream<R: Read, W: Write>(&self, reader: &mut R, writer: &mut W) -> Result<u64> {
        let mut plain = [0u8; SECTOR_SIZE];
        let mut sector = [0u8; SECTOR_SIZE];
        let mut number = FIRST_SECTOR;

        loop {
            let n = read_full(reader, &mut plain)?;
            if n == 0 {
                break;
            }
            // The whole buffer goes out, stale tail included
            sector.copy_from_slice(&plain);
            self.encrypt_sector(&mut sector, number);
            writer.write_all(&sector)?;
            number += 1;
            if n < SECTOR_SIZE {
                break;
            }
        }

        plain.zeroize();
        let written = number - FIRST_SECTOR;
        debug!(sectors = written, "content encrypted");
        Ok(written)
    }

    /// Decrypt exactly `size` logical bytes from `reader` to `writer`
    pub fn decrypt_stream<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        size: u64,
    ) -> Result<()> {
        let mut sector = [0u8; SECTOR_SIZE];
        let mut number = FIRST_SECTOR;
        let mut remaining = size;

        while remaining > 0 {
            let n = read_full(reader, &mut sector)?;
            if n == 0 {
                return Err(EmixError::InvalidFormat(format!(
                    "Content truncated: {} bytes missing",
                    remaining
                )));
            }
            if n < SECTOR_SIZE {
                return Err(EmixError::InvalidFormat(format!(
                    "Misaligned content sector: read {} of {} bytes",
                    n, SECTOR_SIZE
                )));
            }
            self.decrypt_sector(&mut sector, number);
            let take = remaining.min(SECTOR_SIZE as u64) as usize;
            writer.write_all(&sector[..take])?;
            number += 1;
            remaining -= take as u64;
        }

        sector.zeroize();
        debug!(sectors = number - FIRST_SECTOR, size, "content decrypted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::OsRng, RngCore};
    use std::io::Cursor;

    fn cipher() -> ContentCipher {
        ContentCipher::new(&Secret::from_bytes([0x42; 16])).unwrap()
    }

    fn random_bytes(len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        OsRng.fill_bytes(&mut data);
        data
    }

    #[test]
    fn test_roundtrip_sizes() {
        let cipher = cipher();
        for len in [0usize, 1024, 4096, 12 * 1024, 13 * 1024, 13 * 1024 * 1024] {
            let data = random_bytes(len);
            let mut encrypted = Vec::new();
            let sectors = cipher
                .encrypt_stream(&mut Cursor::new(&data), &mut encrypted)
                .unwrap();
            assert_eq!(encrypted.len() as u64, encrypted_len(len as u64), "len {}", len);
            assert_eq!(sectors, encrypted_len(len as u64) / SECTOR_SIZE as u64);

            let mut decrypted = Vec::new();
            cipher
                .decrypt_stream(&mut Cursor::new(&encrypted), &mut decrypted, len as u64)
                .unwrap();
            assert_eq!(decrypted, data, "len {}", len);
        }
    }

    #[test]
    fn test_encrypted_len() {
        assert_eq!(encrypted_len(0), 0);
        assert_eq!(encrypted_len(1), 4096);
        assert_eq!(encrypted_len(4096), 4096);
        assert_eq!(encrypted_len(4097), 8192);
    }

    #[test]
    fn test_sector_numbers_start_at_base() {
        let cipher = cipher();
        let data = vec![0x11u8; SECTOR_SIZE * 2];
        let mut encrypted = Vec::new();
        cipher
            .encrypt_stream(&mut Cursor::new(&data), &mut encrypted)
            .unwrap();

        let mut first = [0x11u8; SECTOR_SIZE];
        cipher.encrypt_sector(&mut first, FIRST_SECTOR);
        let mut second = [0x11u8; SECTOR_SIZE];
        cipher.encrypt_sector(&mut second, FIRST_SECTOR + 1);

        assert_eq!(&encrypted[..SECTOR_SIZE], first.as_slice());
        assert_eq!(&encrypted[SECTOR_SIZE..], second.as_slice());
        // Same plaintext under different sector numbers must differ
        assert_ne!(first, second);
    }

    #[test]
    fn test_partial_sector_keeps_stale_tail() {
        let cipher = cipher();
        let mut data = vec![0xAAu8; SECTOR_SIZE];
        data.extend_from_slice(&[0xBBu8; 100]);

        let mut encrypted = Vec::new();
        cipher
            .encrypt_stream(&mut Cursor::new(&data), &mut encrypted)
            .unwrap();
        assert_eq!(encrypted.len(), SECTOR_SIZE * 2);

        let mut last = [0u8; SECTOR_SIZE];
        last.copy_from_slice(&encrypted[SECTOR_SIZE..]);
        cipher.decrypt_sector(&mut last, FIRST_SECTOR + 1);
        assert!(last[..100].iter().all(|&b| b == 0xBB));
        assert!(last[100..].iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn test_first_partial_sector_is_zero_filled() {
        let cipher = cipher();
        let mut encrypted = Vec::new();
        cipher
            .encrypt_stream(&mut Cursor::new(vec![0xCCu8; 10]), &mut encrypted)
            .unwrap();

        let mut sector = [0u8; SECTOR_SIZE];
        sector.copy_from_slice(&encrypted);
        cipher.decrypt_sector(&mut sector, FIRST_SECTOR);
        assert!(sector[..10].iter().all(|&b| b == 0xCC));
        assert!(sector[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_misaligned_content() {
        let cipher = cipher();
        let data = random_bytes(5000);
        let mut encrypted = Vec::new();
        cipher
            .encrypt_stream(&mut Cursor::new(&data), &mut encrypted)
            .unwrap();
        encrypted.truncate(SECTOR_SIZE + 1000);

        let result = cipher.decrypt_stream(&mut Cursor::new(&encrypted), &mut Vec::new(), 5000);
        assert!(matches!(result, Err(EmixError::InvalidFormat(_))));
    }

    #[test]
    fn test_missing_sector() {
        let cipher = cipher();
        let data = random_bytes(5000);
        let mut encrypted = Vec::new();
        cipher
            .encrypt_stream(&mut Cursor::new(&data), &mut encrypted)
            .unwrap();
        encrypted.truncate(SECTOR_SIZE);

        let result = cipher.decrypt_stream(&mut Cursor::new(&encrypted), &mut Vec::new(), 5000);
        assert!(matches!(result, Err(EmixError::InvalidFormat(_))));
    }

    #[test]
    fn test_wrong_key_yields_garbage() {
        let data = random_bytes(3000);
        let mut encrypted = Vec::new();
        cipher()
            .encrypt_stream(&mut Cursor::new(&data), &mut encrypted)
            .unwrap();

        let wrong = ContentCipher::new(&Secret::from_bytes([0x43; 16])).unwrap();
        let mut decrypted = Vec::new();
        wrong
            .decrypt_stream(&mut Cursor::new(&encrypted), &mut decrypted, 3000)
            .unwrap();
        assert_eq!(decrypted.len(), 3000);
        assert_ne!(decrypted, data);
    }
}
