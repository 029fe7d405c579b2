use crate::cli::format::{format_mode, format_size, format_time_precise, format_time_rfc3339};
use crate::container::read_header;
use crate::crypto::secret::Secret;
use crate::error::{EmixError, Result};
use crate::header::{is_container, ContainerHeader};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

/// Options for the stat command
#[derive(Debug, Clone, Default)]
pub struct StatOptions {
    pub secret: Option<Secret>,
    pub json: bool,
}

/// Everything a header tells about the wrapped file
#[derive(Debug, Clone, Serialize)]
pub struct StatReport {
    pub name: String,
    pub size: u64,
    pub mode: String,
    pub created: String,
    pub modified: String,
    pub sha256: String,
    pub encrypt_metadata: bool,
    pub encrypt_content: bool,
    pub embed_password: bool,
}

impl From<&ContainerHeader> for StatReport {
    fn from(header: &ContainerHeader) -> Self {
        let record = &header.record;
        Self {
            name: record.display_name().into_owned(),
            size: record.size,
            mode: format!("{:04o}", record.mode),
            created: format_time_rfc3339(record.created),
            modified: format_time_rfc3339(record.modified),
            sha256: hex::encode(record.content_hash),
            encrypt_metadata: header.encrypt_metadata,
            encrypt_content: header.encrypt_content,
            embed_password: header.embed_password,
        }
    }
}

/// Describe the file wrapped in the container at `path`
pub fn stat_file(path: &Path, options: &StatOptions) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    if !is_container(&mut reader)? {
        return Err(EmixError::InvalidFormat(format!(
            "{} is not an emix file",
            path.display()
        )));
    }
    reader.seek(SeekFrom::Start(0))?;
    let header = read_header(&mut reader, options.secret.as_ref())?;

    if options.json {
        let mut json = serde_json::to_string_pretty(&StatReport::from(&header))?;
        json.push('\n');
        return Ok(json);
    }

    let record = &header.record;
    let yes_no = |flag: bool| if flag { "yes" } else { "no" };
    let mut output = String::new();
    output.push_str(&format!("       Name: {}\n", record.display_name()));
    output.push_str(&format!(
        "       Size: {} ({} bytes)\n",
        format_size(record.size),
        record.size
    ));
    output.push_str(&format!(
        "       Mode: {} ({:04o})\n",
        format_mode(record.mode),
        record.mode
    ));
    output.push_str(&format!("Create Time: {}\n", format_time_precise(record.created)));
    output.push_str(&format!("Modify Time: {}\n", format_time_precise(record.modified)));
    output.push_str(&format!("     SHA256: {}\n", hex::encode(record.content_hash)));
    output.push_str(&format!(
        "  Encrypted: info {}, content {}\n",
        yes_no(header.encrypt_metadata),
        yes_no(header.encrypt_content)
    ));
    output.push_str(&format!("   Embedded: {}\n", yes_no(header.embed_password)));
    Ok(output)
}
