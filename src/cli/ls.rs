use crate::cli::format::{format_mode, format_size, format_time};
use crate::container::read_header;
use crate::crypto::secret::Secret;
use crate::error::Result;
use crate::header::is_container;
use std::fs::{self, File};
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// Options for the ls command
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub secret: Option<Secret>,
    /// Show mode, size and modification time next to each name
    pub long: bool,
}

/// List the containers directly inside `dir` by their recorded names
pub fn list_dir(dir: &Path, options: &ListOptions) -> Result<String> {
    let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut output = String::new();
    for entry in entries {
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let mut reader = BufReader::new(File::open(&path)?);
        if !is_container(&mut reader)? {
            debug!(path = %path.display(), "not an emix file");
            continue;
        }
        reader.seek(SeekFrom::Start(0))?;
        let record = read_header(&mut reader, options.secret.as_ref())?.record;

        if options.long {
            output.push_str(&format!(
                "{} {:>9} {} {}\n",
                format_mode(record.mode),
                format_size(record.size),
                format_time(record.modified),
                record.display_name()
            ));
        } else {
            output.push_str(&format!("{}\n", record.display_name()));
        }
    }
    Ok(output)
}
