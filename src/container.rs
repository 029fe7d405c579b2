//! Whole-container encode and decode
//!
//! ```text
//! [disguise prefix: 64][header][content region]
//! ```
//!
//! The header records the content hash, so on encode the header slot is
//! reserved first and filled in once the content has been streamed.

use crate::crypto::content::ContentCipher;
use crate::crypto::secret::Secret;
use crate::error::{EmixError, Result};
use crate::header::{ContainerHeader, DISGUISE_LEN, DISGUISE_PREFIX};
use crate::record::FileRecord;
use crate::stream::{read_full, HashingReader, HashingWriter};
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::debug;

/// Which parts of a container get encrypted, and where the secret lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerOptions {
    pub encrypt_metadata: bool,
    pub encrypt_content: bool,
    pub embed_password: bool,
}

impl ContainerOptions {
    pub fn is_encrypted(&self) -> bool {
        self.encrypt_metadata || self.encrypt_content
    }
}

/// Write a container for `source` into `sink`.
///
/// `record` supplies name, mode and timestamps; its size and content hash are
/// replaced with the values measured while streaming. Returns the header as
/// written.
pub fn write_container<R: Read, W: Write + Seek>(
    source: &mut R,
    sink: &mut W,
    record: FileRecord,
    options: ContainerOptions,
    secret: &Secret,
) -> Result<ContainerHeader> {
    if options.is_encrypted() && secret.is_zero() {
        return Err(EmixError::SecretRequired);
    }
    // Fail on a bad name before anything reaches the sink
    record.encode()?;

    let mut header = ContainerHeader {
        encrypt_metadata: options.encrypt_metadata,
        encrypt_content: options.encrypt_content,
        embed_password: options.embed_password,
        password: secret.clone(),
        record,
    };
    let header_len = header.encoded_len();

    let start = sink.stream_position()?;
    sink.write_all(&DISGUISE_PREFIX)?;
    sink.write_all(&vec![0u8; header_len])?;

    let mut hashing = HashingReader::new(source);
    if options.encrypt_content {
        let cipher = ContentCipher::new(secret)?;
        cipher.encrypt_stream(&mut hashing, sink)?;
    } else {
        io::copy(&mut hashing, sink)?;
    }
    let size = hashing.count();
    if header.record.size != 0 && header.record.size != size {
        debug!(expected = header.record.size, actual = size, "source size changed while reading");
    }
    header.record.size = size;
    header.record.content_hash = hashing.finalize();

    let end = sink.stream_position()?;
    let encoded = header.encode()?;
    if encoded.len() != header_len {
        return Err(EmixError::InvalidFormat(format!(
            "Header length changed: reserved {}, encoded {}",
            header_len,
            encoded.len()
        )));
    }
    sink.seek(SeekFrom::Start(start + DISGUISE_LEN as u64))?;
    sink.write_all(&encoded)?;
    sink.seek(SeekFrom::Start(end))?;
    sink.flush()?;

    debug!(size, header_len, container_len = end - start, "container written");
    Ok(header)
}

/// Read the disguise prefix and header, leaving `source` at the content region
pub fn read_header<R: Read>(source: &mut R, secret: Option<&Secret>) -> Result<ContainerHeader> {
    let mut prefix = [0u8; DISGUISE_LEN];
    if read_full(source, &mut prefix)? < DISGUISE_LEN || prefix != DISGUISE_PREFIX {
        return Err(EmixError::InvalidFormat("Missing disguise prefix".into()));
    }
    ContainerHeader::read_from(source, secret)
}

/// Decode a whole container from `source`, writing the original content to
/// `sink` and verifying it against the recorded content hash
pub fn read_container<R: Read, W: Write>(
    source: &mut R,
    sink: &mut W,
    secret: Option<&Secret>,
) -> Result<ContainerHeader> {
    let header = read_header(source, secret)?;
    read_content(source, sink, &header, secret.is_some())?;
    Ok(header)
}

/// Stream the content region following a parsed `header` into `sink`.
///
/// `have_secret` tells whether the caller supplied a secret when the header
/// was read; without one, encrypted content is only readable when the
/// password is embedded.
pub fn read_content<R: Read, W: Write>(
    source: &mut R,
    sink: &mut W,
    header: &ContainerHeader,
    have_secret: bool,
) -> Result<()> {
    let size = header.record.size;

    let mut hashing = HashingWriter::new(&mut *sink);
    if header.encrypt_content {
        if !header.embed_password && !have_secret {
            return Err(EmixError::SecretRequired);
        }
        let cipher = ContentCipher::new(&header.password)?;
        cipher.decrypt_stream(source, &mut hashing, size)?;
    } else {
        let copied = io::copy(&mut (&mut *source).take(size), &mut hashing)?;
        if copied < size {
            return Err(EmixError::InvalidFormat(format!(
                "Content truncated: expected {} bytes, found {}",
                size, copied
            )));
        }
    }
    let actual = hashing.finalize();
    sink.flush()?;

    if actual != header.record.content_hash {
        return Err(EmixError::ContentIntegrity {
            expected: hex::encode(header.record.content_hash),
            actual: hex::encode(actual),
        });
    }
    debug!(size, "container content verified");
    Ok(())
}
