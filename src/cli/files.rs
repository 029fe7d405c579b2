use crate::error::{EmixError, Result};
use crate::record::FileRecord;
use chrono::Local;
use glob::Pattern;
use std::ffi::OsString;
use std::fs::{self, File, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

/// Output directory used when none is given: `emix_YYYY-MM-DD HH.MM.SS`
pub fn default_output_dir() -> PathBuf {
    PathBuf::from(format!("emix_{}", Local::now().format("%Y-%m-%d %H.%M.%S")))
}

/// Glob patterns for paths to leave out of a walk.
///
/// A pattern without `/` matches any single path component by name; one
/// with `/` matches the whole path relative to the walk root.
#[derive(Debug, Clone, Default)]
pub struct Excludes {
    patterns: Vec<(Pattern, bool)>,
}

impl Excludes {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                Ok((Pattern::new(p)?, p.contains('/')))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, relative: &Path) -> bool {
        let name = match relative.file_name() {
            Some(name) => name.to_string_lossy(),
            None => return false,
        };
        self.patterns.iter().any(|(pattern, anchored)| {
            if *anchored {
                pattern.matches_path(relative)
            } else {
                pattern.matches(&name)
            }
        })
    }
}

/// A file found under a walk root
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the walk root; just the file name when the root is a file
    pub relative: PathBuf,
    pub regular: bool,
}

/// Collect every non-directory entry under `root`, sorted by path.
///
/// Excluded directories are not descended into. A `root` that is itself a
/// file is returned as-is regardless of `excludes`.
pub fn walk_files(root: &Path, excludes: &Excludes) -> Result<Vec<SourceFile>> {
    let metadata = fs::metadata(root)?;
    if metadata.is_file() {
        let relative = root
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| EmixError::InvalidOptions(format!("{} has no file name", root.display())))?;
        return Ok(vec![SourceFile {
            path: root.to_path_buf(),
            relative,
            regular: true,
        }]);
    }
    if !metadata.is_dir() {
        return Err(EmixError::UnsupportedFileType(root.to_path_buf()));
    }

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || entry
                    .path()
                    .strip_prefix(root)
                    .map(|relative| !excludes.matches(relative))
                    .unwrap_or(true)
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| EmixError::InvalidOptions(format!("{} escapes {}", entry.path().display(), root.display())))?
            .to_path_buf();
        files.push(SourceFile {
            regular: entry.file_type().is_file(),
            path: entry.into_path(),
            relative,
        });
    }
    Ok(files)
}

/// Create `dir` if needed, refusing an existing non-directory
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    if dir.exists() && !dir.is_dir() {
        return Err(EmixError::InvalidOptions(format!(
            "output {} is not a directory",
            dir.display()
        )));
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Hidden sibling of `path` that output is written to before being renamed
/// into place
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".partial");
    path.with_file_name(name)
}

/// Raw bytes of the final component of `path`
pub fn file_name_bytes(path: &Path) -> Result<Vec<u8>> {
    let name = path
        .file_name()
        .ok_or_else(|| EmixError::InvalidOptions(format!("{} has no file name", path.display())))?;

    #[cfg(unix)]
    let bytes = {
        use std::os::unix::ffi::OsStrExt;
        name.as_bytes().to_vec()
    };
    #[cfg(not(unix))]
    let bytes = name.to_string_lossy().into_owned().into_bytes();

    Ok(bytes)
}

fn nanos_since_epoch(time: io::Result<SystemTime>) -> u64 {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Build a record for a file from its metadata. Size and content hash are
/// left for the container writer.
pub fn record_from_metadata(name: Vec<u8>, metadata: &Metadata) -> FileRecord {
    #[cfg(unix)]
    let mode = {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o7777
    };
    #[cfg(not(unix))]
    let mode = if metadata.permissions().readonly() { 0o444 } else { 0o644 };

    let modified = nanos_since_epoch(metadata.modified());
    let created = match metadata.created() {
        Ok(time) => nanos_since_epoch(Ok(time)),
        Err(_) => modified,
    };

    FileRecord {
        name,
        size: metadata.len(),
        mode,
        created,
        modified,
        ..Default::default()
    }
}

/// Apply the recorded modification time and permission bits to a restored file
pub fn restore_metadata(file: &File, path: &Path, record: &FileRecord) -> Result<()> {
    if record.modified != 0 {
        file.set_modified(UNIX_EPOCH + Duration::from_nanos(record.modified))?;
    }

    #[cfg(unix)]
    if record.mode & 0o7777 != 0 {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(record.mode & 0o7777))?;
    }
    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_excludes_by_name_and_path() {
        let excludes = Excludes::new(&[".*", "build/*.o"]).unwrap();
        assert!(excludes.matches(Path::new(".git")));
        assert!(excludes.matches(Path::new("src/.hidden")));
        assert!(excludes.matches(Path::new("build/main.o")));
        assert!(!excludes.matches(Path::new("src/main.o")));
        assert!(!excludes.matches(Path::new("src/main.rs")));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            Excludes::new(&["[unclosed"]),
            Err(EmixError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_walk_files_skips_excluded_directories() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/.cache")).unwrap();
        fs::write(dir.path().join("a/one.txt"), b"1").unwrap();
        fs::write(dir.path().join("a/.cache/blob"), b"2").unwrap();
        fs::write(dir.path().join("two.txt"), b"3").unwrap();

        let files = walk_files(dir.path(), &Excludes::new(&[".*"]).unwrap()).unwrap();
        let relative: Vec<_> = files.iter().map(|f| f.relative.clone()).collect();
        assert_eq!(relative, vec![PathBuf::from("a/one.txt"), PathBuf::from("two.txt")]);
        assert!(files.iter().all(|f| f.regular));

        let all = walk_files(dir.path(), &Excludes::default()).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_walk_single_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".dotfile");
        fs::write(&path, b"x").unwrap();

        let files = walk_files(&path, &Excludes::new(&[".*"]).unwrap()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, PathBuf::from(".dotfile"));
    }

    #[test]
    fn test_ensure_output_dir_rejects_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("occupied");
        fs::write(&path, b"x").unwrap();
        assert!(matches!(
            ensure_output_dir(&path),
            Err(EmixError::InvalidOptions(_))
        ));
        ensure_output_dir(&dir.path().join("new/nested")).unwrap();
        assert!(dir.path().join("new/nested").is_dir());
    }

    #[test]
    fn test_record_from_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, vec![0u8; 321]).unwrap();

        let metadata = fs::metadata(&path).unwrap();
        let record = record_from_metadata(file_name_bytes(&path).unwrap(), &metadata);
        assert_eq!(record.name, b"data.bin");
        assert_eq!(record.size, 321);
        assert!(record.modified > 0);
        assert!(record.created > 0);
        assert_eq!(record.mode & !0o7777, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_restore_metadata() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("restored");
        let file = File::create(&path).unwrap();
        let record = FileRecord {
            name: b"restored".to_vec(),
            mode: 0o640,
            modified: 1_600_000_000_000_000_000,
            ..Default::default()
        };
        restore_metadata(&file, &path, &record).unwrap();

        let metadata = fs::metadata(&path).unwrap();
        assert_eq!(metadata.permissions().mode() & 0o7777, 0o640);
        let modified = metadata.modified().unwrap().duration_since(UNIX_EPOCH).unwrap();
        assert_eq!(modified.as_secs(), 1_600_000_000);
    }

    #[test]
    fn test_partial_path_is_hidden_sibling() {
        assert_eq!(
            partial_path(Path::new("out/docs/guide.md")),
            PathBuf::from("out/docs/.guide.md.partial")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_special_mode_bits_survive() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("tool");
        fs::write(&path, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o4755)).unwrap();

        let record = record_from_metadata(b"tool".to_vec(), &fs::metadata(&path).unwrap());
        assert_eq!(record.mode, 0o4755);

        let restored = dir.path().join("restored");
        let file = File::create(&restored).unwrap();
        restore_metadata(&file, &restored, &record).unwrap();
        let mode = fs::metadata(&restored).unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o4755);
    }

    #[test]
    fn test_default_output_dir() {
        let dir = default_output_dir();
        let name = dir.to_string_lossy();
        assert!(name.starts_with("emix_"));
        assert_eq!(name.len(), "emix_2024-01-01 00.00.00".len());
    }
}
