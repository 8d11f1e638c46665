//! Per-file metadata snapshots.
//!
//! A [`FileRecord`] captures everything the placement engine needs to know
//! about a file at the moment it is inspected: its name split into base name
//! and extension, its size, and its timestamps. Records are built immediately
//! before classification and discarded once the move completes or fails; they
//! are never cached or shared across files.

use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Snapshot of a single file taken at inspection time.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Absolute (or caller-relative) location of the file when inspected.
    pub path: PathBuf,
    /// Full file name, e.g. `report.PDF`.
    pub name: String,
    /// File name without the extension, e.g. `report`.
    pub base_name: String,
    /// Lower-cased extension including the leading dot (`.pdf`), or empty
    /// if the file has none.
    pub extension: String,
    /// Size in bytes.
    pub size: u64,
    /// Creation time; falls back to the modification time on filesystems
    /// that do not record it.
    pub created: DateTime<Local>,
    /// Last modification time.
    pub modified: DateTime<Local>,
    /// Last access time; falls back to the modification time if unavailable.
    pub accessed: DateTime<Local>,
}

impl FileRecord {
    /// Builds a record for the file at `path`.
    ///
    /// # Errors
    ///
    /// Fails with the underlying I/O error if the file vanished or cannot
    /// be stat'ed, and with `InvalidInput` if the path is not a regular
    /// file or has no file name component.
    pub fn inspect(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            ));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "path has no file name component")
            })?;

        let (base_name, extension) = split_name(&name);

        let modified: DateTime<Local> = metadata.modified()?.into();
        let created: DateTime<Local> = metadata.created().map(Into::into).unwrap_or(modified);
        let accessed: DateTime<Local> = metadata.accessed().map(Into::into).unwrap_or(modified);

        Ok(Self {
            path: path.to_path_buf(),
            name,
            base_name,
            extension,
            size: metadata.len(),
            created,
            modified,
            accessed,
        })
    }
}

/// Splits a file name into (base name, lower-cased extension with dot).
///
/// Dotfiles such as `.env` are treated as having no extension, and only the
/// last component counts: `archive.tar.gz` yields (`archive.tar`, `.gz`).
fn split_name(name: &str) -> (String, String) {
    match name.rfind('.') {
        // A dot at position 0 means a hidden file, not an extension.
        Some(idx) if idx > 0 => {
            let (base, ext) = name.split_at(idx);
            (base.to_string(), ext.to_lowercase())
        }
        _ => (name.to_string(), String::new()),
    }
}
