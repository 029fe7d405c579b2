use crate::cli::files::{default_output_dir, partial_path, restore_metadata, walk_files, Excludes};
use crate::container::{read_content, read_header};
use crate::crypto::secret::Secret;
use crate::error::{EmixError, Result};
use crate::header::is_container;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Options for the demix command
#[derive(Debug, Clone)]
pub struct DemixOptions {
    pub secret: Option<Secret>,
    pub output: PathBuf,
    pub excludes: Vec<String>,
    pub silence: bool,
}

impl Default for DemixOptions {
    fn default() -> Self {
        Self {
            secret: None,
            output: default_output_dir(),
            excludes: vec![".*".into()],
            silence: false,
        }
    }
}

/// A file restored by [`demix_path`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemixedFile {
    pub source: PathBuf,
    pub output: PathBuf,
    pub size: u64,
}

/// Restore every container found at `source` (a file or a directory tree)
/// into `options.output`, under its recorded name.
///
/// Inputs that are not containers, or whose header cannot be parsed, are
/// skipped with a warning. Other failures abort the run.
pub fn demix_path(source: &Path, options: &DemixOptions) -> Result<Vec<DemixedFile>> {
    let excludes = Excludes::new(options.excludes.as_slice())?;
    let files = walk_files(source, &excludes)?;

    let mut restored = Vec::new();
    for file in files {
        if !file.regular {
            warn!(path = %file.path.display(), "not a regular file, skipping");
            continue;
        }
        let out_dir = match file.relative.parent() {
            Some(parent) => options.output.join(parent),
            None => options.output.clone(),
        };
        if let Some(demixed) = demix_file(&file.path, &out_dir, options)? {
            restored.push(demixed);
        }
    }
    Ok(restored)
}

/// Restore one container into `out_dir`.
/// Returns `None` when `source` was skipped as unreadable.
pub fn demix_file(source: &Path, out_dir: &Path, options: &DemixOptions) -> Result<Option<DemixedFile>> {
    let mut reader = BufReader::new(File::open(source)?);
    if !is_container(&mut reader)? {
        warn!(path = %source.display(), "not an emix file, skipping");
        return Ok(None);
    }
    reader.seek(SeekFrom::Start(0))?;

    let header = match read_header(&mut reader, options.secret.as_ref()) {
        Ok(header) => header,
        Err(e @ (EmixError::InvalidFormat(_) | EmixError::HeaderIntegrity)) => {
            warn!(path = %source.display(), error = %e, "invalid emix header, skipping");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let name = header.record.safe_file_name()?;
    fs::create_dir_all(out_dir)?;
    let output = out_dir.join(name);
    if output.exists() && fs::canonicalize(&output)? == fs::canonicalize(source)? {
        return Err(EmixError::InvalidOptions(format!(
            "output {} would overwrite its container",
            output.display()
        )));
    }

    // Content goes to a hidden sibling first; only a verified file takes the real name
    let partial = partial_path(&output);
    let mut writer = BufWriter::new(File::create(&partial)?);
    if let Err(e) = read_content(&mut reader, &mut writer, &header, options.secret.is_some()) {
        drop(writer);
        warn!(path = %source.display(), error = %e, "removing partially restored file");
        fs::remove_file(&partial)?;
        return Err(e);
    }
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    restore_metadata(&file, &partial, &header.record)?;
    drop(file);
    fs::rename(&partial, &output)?;

    let size = header.record.size;
    info!(source = %source.display(), output = %output.display(), size, "demixed");
    if !options.silence {
        println!("{} -> {}", source.display(), output.display());
    }
    Ok(Some(DemixedFile {
        source: source.to_path_buf(),
        output,
        size,
    }))
}
