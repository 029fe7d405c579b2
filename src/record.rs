use crate::error::{EmixError, Result};
use std::borrow::Cow;
use std::path::PathBuf;

pub const NAME_MIN_LEN: usize = 1;
pub const NAME_MAX_LEN: usize = 255;

/// Fixed part of an encoded record:
/// name length (2) + size (8) + mode (4) + create time (8) + modify time (8) + hash (32)
const FIXED_LEN: usize = 2 + 8 + 4 + 8 + 8 + 32;

/// Smallest possible encoding (1-byte name)
pub const RECORD_MIN_LEN: usize = FIXED_LEN + NAME_MIN_LEN;

/// Largest possible encoding (255-byte name)
pub const RECORD_MAX_LEN: usize = FIXED_LEN + NAME_MAX_LEN;

/// Metadata of the wrapped file.
///
/// Layout (integers little-endian):
/// `[name_len: 2][name][size: 8][mode: 4][created: 8][modified: 8][content_hash: 32]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRecord {
    /// File name, raw bytes
    pub name: Vec<u8>,
    /// Plaintext size in bytes
    pub size: u64,
    /// Permission bits
    pub mode: u32,
    /// Creation time, nanoseconds since the Unix epoch
    pub created: u64,
    /// Modification time, nanoseconds since the Unix epoch
    pub modified: u64,
    /// SHA-256 of the plaintext content
    pub content_hash: [u8; 32],
}

impl FileRecord {
    pub fn encoded_len(&self) -> usize {
        FIXED_LEN + self.name.len()
    }

    /// Name for display, with invalid UTF-8 replaced
    pub fn display_name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// The name as a single path component, rejecting anything that could
    /// escape the output directory
    pub fn safe_file_name(&self) -> Result<PathBuf> {
        let invalid = || EmixError::InvalidFormat(format!("Unsafe file name: {:?}", self.display_name()));

        if self.name.is_empty()
            || self.name == b"."
            || self.name == b".."
            || self.name.iter().any(|&b| b == b'/' || b == b'\\' || b == 0)
        {
            return Err(invalid());
        }

        #[cfg(unix)]
        let name = {
            use std::os::unix::ffi::OsStrExt;
            PathBuf::from(std::ffi::OsStr::from_bytes(&self.name))
        };
        #[cfg(not(unix))]
        let name = PathBuf::from(self.display_name().into_owned());

        Ok(name)
    }

    /// Serialize the record
    pub fn encode(&self) -> Result<Vec<u8>> {
        let name_len = self.name.len();
        if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&name_len) {
            return Err(EmixError::InvalidNameLength(name_len));
        }

        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&(name_len as u16).to_le_bytes());
        buf.extend_from_slice(&self.name);
        buf.extend_from_slice(&self.size.to_le_bytes());
        buf.extend_from_slice(&self.mode.to_le_bytes());
        buf.extend_from_slice(&self.created.to_le_bytes());
        buf.extend_from_slice(&self.modified.to_le_bytes());
        buf.extend_from_slice(&self.content_hash);
        Ok(buf)
    }

    /// Deserialize a record, ignoring any trailing bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < RECORD_MIN_LEN {
            return Err(EmixError::InvalidFormat("File info too short".into()));
        }

        let name_len = u16::from_le_bytes([data[0], data[1]]) as usize;
        if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&name_len) {
            return Err(EmixError::InvalidFormat(format!(
                "Invalid file name length: {}",
                name_len
            )));
        }
        if data.len() < FIXED_LEN + name_len {
            return Err(EmixError::InvalidFormat("File info truncated".into()));
        }

        let mut cursor = Fields { data, pos: 2 };
        let name = cursor.take(name_len).to_vec();
        let size = u64::from_le_bytes(cursor.array());
        let mode = u32::from_le_bytes(cursor.array());
        let created = u64::from_le_bytes(cursor.array());
        let modified = u64::from_le_bytes(cursor.array());
        let content_hash = cursor.array();

        Ok(Self {
            name,
            size,
            mode,
            created,
            modified,
            content_hash,
        })
    }
}

/// Sequential reader over a buffer whose length was checked up front
struct Fields<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn take(&mut self, len: usize) -> &'a [u8] {
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        slice
    }

    fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N));
        out
    }
}
