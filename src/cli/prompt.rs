use crate::crypto::secret::Secret;
use crate::error::{EmixError, Result};
use std::path::Path;

/// Resolve the secret given on the command line.
///
/// With `password` set the user is prompted on the terminal, twice when
/// `confirm` is set. A credential file is hashed into a secret.
pub fn resolve_secret(
    password: bool,
    credential_file: Option<&Path>,
    confirm: bool,
) -> Result<Option<Secret>> {
    if let Some(path) = credential_file {
        return Secret::from_credential_file(path).map(Some);
    }
    if !password {
        return Ok(None);
    }

    let first = rpassword::prompt_password("Enter password: ")?;
    if confirm {
        let second = rpassword::prompt_password("Enter password again: ")?;
        if first != second {
            return Err(EmixError::InvalidPassword("passwords do not match".into()));
        }
    }
    let secret = Secret::from_password(first.as_bytes())?;
    if confirm {
        eprintln!("Please keep your password safe, it cannot be recovered.");
    }
    Ok(Some(secret))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_no_key_options() {
        assert!(resolve_secret(false, None, false).unwrap().is_none());
    }

    #[test]
    fn test_credential_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("key.bin");
        fs::write(&path, b"credential material").unwrap();

        let secret = resolve_secret(false, Some(&path), true).unwrap().unwrap();
        assert_eq!(secret, Secret::from_credential_file(&path).unwrap());
        assert!(!secret.is_zero());
    }
}
