pub mod content;
pub mod kdf;
pub mod metadata;
pub mod secret;

pub use content::{ContentCipher, FIRST_SECTOR, SECTOR_SIZE};
pub use kdf::{derive, derive_key};
pub use secret::{Secret, SECRET_SIZE};
