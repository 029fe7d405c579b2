use crate::crypto::metadata;
use crate::crypto::secret::{Secret, SECRET_SIZE};
use crate::error::{EmixError, Result};
use crate::record::{FileRecord, RECORD_MAX_LEN, RECORD_MIN_LEN};
use crate::stream::read_full;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Signature of a ZIP local file header
pub const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// Length of the ZIP-looking prefix in front of the header
pub const DISGUISE_LEN: usize = 64;

/// ZIP signature followed by zero padding
pub const DISGUISE_PREFIX: [u8; DISGUISE_LEN] = disguise_prefix();

const fn disguise_prefix() -> [u8; DISGUISE_LEN] {
    let mut prefix = [0u8; DISGUISE_LEN];
    prefix[0] = ZIP_MAGIC[0];
    prefix[1] = ZIP_MAGIC[1];
    prefix[2] = ZIP_MAGIC[2];
    prefix[3] = ZIP_MAGIC[3];
    prefix
}

pub const HEADER_MAGIC: [u8; 4] = *b"EMIX";

const RANDOM_LEN: usize = 16;
const FLAGS_LEN: usize = 2;
const RECORD_LEN_FIELD: usize = 2;
const HASH_LEN: usize = 32;

/// magic + random + flags + password + record length
const FIXED_LEN: usize = 4 + RANDOM_LEN + FLAGS_LEN + SECRET_SIZE + RECORD_LEN_FIELD;

/// Smallest valid header: plaintext record with a 1-byte name
pub const HEADER_MIN_LEN: usize = FIXED_LEN + RECORD_MIN_LEN + HASH_LEN;

/// Largest valid header: encrypted record with a 255-byte name
pub const HEADER_MAX_LEN: usize = FIXED_LEN + RECORD_MAX_LEN + metadata::OVERHEAD + HASH_LEN;

/// Byte 0 of the flags
const FLAG_EMBED_PASSWORD: u8 = 0x01;
/// Byte 1 of the flags
const FLAG_ENCRYPT_METADATA: u8 = 0x01;
/// Byte 1 of the flags
const FLAG_ENCRYPT_CONTENT: u8 = 0x02;

/// Container header.
///
/// Layout:
/// `[magic: 4][random: 16][flags: 2][password: 16][record_len: 2 BE][record][sha256: 32]`
///
/// The trailing hash covers every preceding header byte. When
/// `encrypt_metadata` is set the record bytes are AES-GCM sealed with
/// `password`. The password field on disk holds `password` only with
/// `embed_password`; otherwise it is zero and the caller supplies the secret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerHeader {
    pub encrypt_metadata: bool,
    pub encrypt_content: bool,
    pub embed_password: bool,
    pub password: Secret,
    pub record: FileRecord,
}

impl ContainerHeader {
    pub fn encoded_len(&self) -> usize {
        let mut len = FIXED_LEN + self.record.encoded_len() + HASH_LEN;
        if self.encrypt_metadata {
            len += metadata::OVERHEAD;
        }
        len
    }

    fn flags(&self) -> [u8; FLAGS_LEN] {
        let mut flags = [0u8; FLAGS_LEN];
        if self.embed_password {
            flags[0] |= FLAG_EMBED_PASSWORD;
        }
        if self.encrypt_metadata {
            flags[1] |= FLAG_ENCRYPT_METADATA;
        }
        if self.encrypt_content {
            flags[1] |= FLAG_ENCRYPT_CONTENT;
        }
        flags
    }

    /// Serialize the header, sealing the record if requested
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&HEADER_MAGIC);

        let mut random = [0u8; RANDOM_LEN];
        OsRng.fill_bytes(&mut random);
        buf.extend_from_slice(&random);

        buf.extend_from_slice(&self.flags());
        if self.embed_password {
            buf.extend_from_slice(self.password.as_bytes());
        } else {
            buf.extend_from_slice(&[0u8; SECRET_SIZE]);
        }

        let mut record = self.record.encode()?;
        if self.encrypt_metadata {
            record = metadata::encrypt(&record, &self.password)?;
        }
        buf.extend_from_slice(&(record.len() as u16).to_be_bytes());
        buf.extend_from_slice(&record);

        let hash = Sha256::digest(&buf);
        buf.extend_from_slice(&hash);

        debug!(
            len = buf.len(),
            encrypt_metadata = self.encrypt_metadata,
            encrypt_content = self.encrypt_content,
            embed_password = self.embed_password,
            "header encoded"
        );
        Ok(buf)
    }

    /// Parse a header from the start of `data`.
    ///
    /// `secret` is used when the password is not embedded; it is required
    /// only when the record is encrypted.
    pub fn decode(data: &[u8], secret: Option<&Secret>) -> Result<Self> {
        if data.len() < HEADER_MIN_LEN {
            return Err(EmixError::InvalidFormat("Header too short".into()));
        }
        if data[..4] != HEADER_MAGIC {
            return Err(EmixError::InvalidFormat("Invalid header magic".into()));
        }

        let record_len = Self::record_len(&data[..FIXED_LEN])?;
        let total = FIXED_LEN + record_len + HASH_LEN;
        if data.len() < total {
            return Err(EmixError::InvalidFormat("Header truncated".into()));
        }
        Self::parse(&data[..total], secret)
    }

    /// Read exactly one header from `reader`, leaving it at the first
    /// content byte
    pub fn read_from<R: Read>(reader: &mut R, secret: Option<&Secret>) -> Result<Self> {
        let mut buf = vec![0u8; FIXED_LEN];
        if read_full(reader, &mut buf)? < FIXED_LEN {
            return Err(EmixError::InvalidFormat("Header truncated".into()));
        }
        if buf[..4] != HEADER_MAGIC {
            return Err(EmixError::InvalidFormat("Invalid header magic".into()));
        }

        let record_len = Self::record_len(&buf)?;
        let rest = record_len + HASH_LEN;
        buf.resize(FIXED_LEN + rest, 0);
        if read_full(reader, &mut buf[FIXED_LEN..])? < rest {
            return Err(EmixError::InvalidFormat("Header truncated".into()));
        }
        Self::parse(&buf, secret)
    }

    /// Length of the record region, validated against the header bounds
    fn record_len(fixed: &[u8]) -> Result<usize> {
        let len = u16::from_be_bytes([fixed[FIXED_LEN - 2], fixed[FIXED_LEN - 1]]) as usize;
        if !(RECORD_MIN_LEN..=RECORD_MAX_LEN + metadata::OVERHEAD).contains(&len) {
            return Err(EmixError::InvalidFormat(format!(
                "Invalid file info length: {}",
                len
            )));
        }
        Ok(len)
    }

    /// Parse a complete header buffer
    fn parse(data: &[u8], secret: Option<&Secret>) -> Result<Self> {
        let (body, hash) = data.split_at(data.len() - HASH_LEN);
        if Sha256::digest(body).as_slice() != hash {
            return Err(EmixError::HeaderIntegrity);
        }

        let flags = &body[4 + RANDOM_LEN..4 + RANDOM_LEN + FLAGS_LEN];
        let embed_password = flags[0] & FLAG_EMBED_PASSWORD != 0;
        let encrypt_metadata = flags[1] & FLAG_ENCRYPT_METADATA != 0;
        let encrypt_content = flags[1] & FLAG_ENCRYPT_CONTENT != 0;

        let password = if embed_password {
            let start = 4 + RANDOM_LEN + FLAGS_LEN;
            let mut bytes = [0u8; SECRET_SIZE];
            bytes.copy_from_slice(&body[start..start + SECRET_SIZE]);
            Secret::from_bytes(bytes)
        } else {
            secret.cloned().unwrap_or_default()
        };

        let record_bytes = &body[FIXED_LEN..];
        let record = if encrypt_metadata {
            if !embed_password && secret.is_none() {
                return Err(EmixError::SecretRequired);
            }
            let plain = metadata::decrypt(record_bytes, &password)?;
            FileRecord::decode(&plain)?
        } else {
            FileRecord::decode(record_bytes)?
        };

        debug!(
            len = data.len(),
            encrypt_metadata,
            encrypt_content,
            embed_password,
            "header decoded"
        );
        Ok(Self {
            encrypt_metadata,
            encrypt_content,
            embed_password,
            password,
            record,
        })
    }
}

/// Cheap check whether `reader` starts with a disguise prefix and header magic
pub fn is_container<R: Read>(reader: &mut R) -> Result<bool> {
    let mut buf = [0u8; DISGUISE_LEN + HEADER_MIN_LEN];
    let n = read_full(reader, &mut buf)?;
    Ok(n == buf.len() && has_signatures(&buf))
}

/// [`is_container`] over an in-memory buffer
pub fn is_container_bytes(data: &[u8]) -> bool {
    data.len() >= DISGUISE_LEN + HEADER_MIN_LEN && has_signatures(data)
}

/// [`is_container`] for a file on disk
pub fn is_container_path(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    is_container(&mut file)
}

fn has_signatures(data: &[u8]) -> bool {
    data[..DISGUISE_LEN] == DISGUISE_PREFIX
        && data[DISGUISE_LEN..DISGUISE_LEN + HEADER_MAGIC.len()] == HEADER_MAGIC
}
