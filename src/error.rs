use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmixError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Header integrity check failed: hash mismatch")]
    HeaderIntegrity,

    #[error("File content hash mismatch: expected {expected}, got {actual}")]
    ContentIntegrity { expected: String, actual: String },

    #[error("Authentication failed: wrong secret or tampered file info")]
    Authentication,

    #[error("Invalid name length: {0}. Must be between 1 and 255 bytes")]
    InvalidNameLength(usize),

    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Secret required")]
    SecretRequired,

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Invalid exclude pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),

    #[error("Not a regular file: {}", .0.display())]
    UnsupportedFileType(PathBuf),
}

/// Broad error categories, for callers that branch on the failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Integrity,
    Authentication,
    Validation,
    Io,
    Usage,
}

impl EmixError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::InvalidFormat(_) | Self::Json(_) => ErrorKind::Format,
            Self::HeaderIntegrity | Self::ContentIntegrity { .. } => ErrorKind::Integrity,
            Self::Authentication => ErrorKind::Authentication,
            Self::InvalidNameLength(_) => ErrorKind::Validation,
            Self::KeyDerivation(_)
            | Self::Encryption(_)
            | Self::SecretRequired
            | Self::InvalidPassword(_)
            | Self::InvalidOptions(_)
            | Self::InvalidPattern(_)
            | Self::UnsupportedFileType(_) => ErrorKind::Usage,
        }
    }
}

pub type Result<T> = std::result::Result<T, EmixError>;
