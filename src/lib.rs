//! emix - ZIP-disguised single-file containers
//!
//! Wraps one file into a container whose first bytes look like a ZIP local
//! file header. The container carries the file's name, size, mode and
//! timestamps, and the content itself, each optionally encrypted under a
//! 16-byte secret.
//!
//! ## Layout
//!
//! ```text
//! [disguise prefix: 64][header: 135..=417][content region]
//! ```
//!
//! ## Keys
//!
//! Every key is derived from the secret with HKDF-SHA256:
//!
//! ```text
//! Secret ─┬─ "aesgem key" → AES-256-GCM  (file info)
//!         └─ "aesxts key" → AES-128-XTS  (content, 4096-byte sectors)
//! ```
//!
//! The secret is a zero-padded password, a key derived from a credential
//! file, or random bytes embedded in the header itself.
//!
//! ## Example
//!
//! ```no_run
//! use emix::{read_container, write_container, ContainerOptions, FileRecord, Secret};
//! use std::fs::File;
//!
//! let secret = Secret::from_password(b"hunter2").unwrap();
//! let options = ContainerOptions {
//!     encrypt_metadata: true,
//!     encrypt_content: true,
//!     embed_password: false,
//! };
//! let record = FileRecord {
//!     name: b"report.pdf".to_vec(),
//!     mode: 0o644,
//!     ..Default::default()
//! };
//!
//! let mut source = File::open("report.pdf").unwrap();
//! let mut sink = File::create("report.mixed").unwrap();
//! write_container(&mut source, &mut sink, record, options, &secret).unwrap();
//!
//! let mut source = File::open("report.mixed").unwrap();
//! let mut restored = File::create("report.pdf.out").unwrap();
//! let header = read_container(&mut source, &mut restored, Some(&secret)).unwrap();
//! assert_eq!(header.record.name, b"report.pdf");
//! ```

pub mod cli;
pub mod container;
pub mod crypto;
pub mod error;
pub mod header;
pub mod record;
pub mod stream;

pub use container::{read_container, read_content, read_header, write_container, ContainerOptions};
pub use crypto::Secret;
pub use error::{EmixError, ErrorKind, Result};
pub use header::{is_container, is_container_bytes, is_container_path, ContainerHeader};
pub use record::FileRecord;
