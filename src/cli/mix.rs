use crate::cli::files::{
    default_output_dir, ensure_output_dir, file_name_bytes, partial_path, record_from_metadata,
    walk_files, Excludes,
};
use crate::container::{write_container, ContainerOptions};
use crate::crypto::secret::Secret;
use crate::error::{EmixError, Result};
use crate::record::{NAME_MAX_LEN, NAME_MIN_LEN};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;

/// Which parts of each file get encrypted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MixMode {
    /// Type 0: nothing encrypted
    #[default]
    Plain,
    /// Type 1: file info only
    EncryptMetadata,
    /// Type 2: file info and content
    EncryptAll,
}

impl std::str::FromStr for MixMode {
    type Err = EmixError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "0" => Ok(Self::Plain),
            "1" => Ok(Self::EncryptMetadata),
            "2" => Ok(Self::EncryptAll),
            _ => Err(EmixError::InvalidOptions(format!(
                "mix type must be 0, 1 or 2, got {}",
                s
            ))),
        }
    }
}

impl MixMode {
    pub fn container_options(self, embed_password: bool) -> ContainerOptions {
        ContainerOptions {
            encrypt_metadata: self != Self::Plain,
            encrypt_content: self == Self::EncryptAll,
            embed_password,
        }
    }
}

/// Where the secret for a mix run comes from
#[derive(Debug, Clone, Default)]
pub enum KeySource {
    #[default]
    None,
    /// One secret for every file (password or credential file)
    Secret(Secret),
    /// A fresh random secret per file, stored in its header
    Embedded,
}

/// Options for the mix command
#[derive(Debug, Clone)]
pub struct MixOptions {
    pub mode: MixMode,
    pub key: KeySource,
    pub output: PathBuf,
    pub excludes: Vec<String>,
    pub silence: bool,
}

impl Default for MixOptions {
    fn default() -> Self {
        Self {
            mode: MixMode::default(),
            key: KeySource::default(),
            output: default_output_dir(),
            excludes: Vec::new(),
            silence: false,
        }
    }
}

impl MixOptions {
    pub fn validate(&self) -> Result<()> {
        match (self.mode, &self.key) {
            (MixMode::Plain, KeySource::None) => Ok(()),
            (MixMode::Plain, _) => Err(EmixError::InvalidOptions(
                "type 0 takes no password, credential file or embedded password".into(),
            )),
            (_, KeySource::None) => Err(EmixError::InvalidOptions(
                "type 1 and 2 need a password, a credential file or --embed-password".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// A file written by [`mix_path`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedFile {
    pub source: PathBuf,
    pub output: PathBuf,
    pub size: u64,
}

/// Mix a file, or every file under a directory, into `options.output`.
///
/// The layout below `source` is mirrored in the output directory. Any
/// non-regular file under `source` aborts the run before anything is written.
pub fn mix_path(source: &Path, options: &MixOptions) -> Result<Vec<MixedFile>> {
    options.validate()?;
    let excludes = Excludes::new(options.excludes.as_slice())?;
    let files = walk_files(source, &excludes)?;
    if let Some(file) = files.iter().find(|f| !f.regular) {
        return Err(EmixError::UnsupportedFileType(file.path.clone()));
    }

    ensure_output_dir(&options.output)?;

    let mut mixed = Vec::with_capacity(files.len());
    for file in files {
        let output = options.output.join(&file.relative);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        let size = mix_file(&file.path, &output, options)?;

        info!(source = %file.path.display(), output = %output.display(), size, "mixed");
        if !options.silence {
            println!("{} -> {}", file.path.display(), output.display());
        }
        mixed.push(MixedFile {
            source: file.path,
            output,
            size,
        });
    }
    Ok(mixed)
}

/// Mix one regular file into a container at `output`.
/// Returns the number of content bytes stored.
pub fn mix_file(source: &Path, output: &Path, options: &MixOptions) -> Result<u64> {
    let name = file_name_bytes(source)?;
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&name.len()) {
        return Err(EmixError::InvalidNameLength(name.len()));
    }
    if output.exists() && fs::canonicalize(output)? == fs::canonicalize(source)? {
        return Err(EmixError::InvalidOptions(format!(
            "output {} would overwrite its source",
            output.display()
        )));
    }

    let metadata = fs::metadata(source)?;
    let record = record_from_metadata(name, &metadata);

    let (secret, embed_password) = match &options.key {
        KeySource::None => (Secret::default(), false),
        KeySource::Secret(secret) => (secret.clone(), false),
        KeySource::Embedded => (Secret::generate(), true),
    };
    let container_options = options.mode.container_options(embed_password);

    let mut reader = BufReader::new(File::open(source)?);
    let partial = partial_path(output);
    let mut writer = BufWriter::new(File::create(&partial)?);
    let header = match write_container(&mut reader, &mut writer, record, container_options, &secret) {
        Ok(header) => header,
        Err(e) => {
            drop(writer);
            fs::remove_file(&partial)?;
            return Err(e);
        }
    };
    drop(writer);
    fs::rename(&partial, output)?;
    Ok(header.record.size)
}
