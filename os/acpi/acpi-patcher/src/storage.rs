//! # Storage abstraction
//!
//! The engine never talks to firmware file protocols directly. It sees a
//! set of volume roots ([`Volumes`]) and directories ([`Directory`]) that
//! can be enumerated, descended into, and read from. Handles are closed
//! when dropped.

use alloc::string::String;
use alloc::vec::Vec;

/// One directory entry as reported by the file system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub size: u64,
    pub is_directory: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("not found")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("not a regular file")]
    NotAFile,
    #[error("invalid path {0:?}")]
    InvalidPath(String),
    #[error("device error: {0}")]
    Device(String),
}

/// An open directory.
pub trait Directory: Sized {
    /// Open a sub-directory by relative path. Path components are separated
    /// by `\`.
    ///
    /// # Errors
    /// [`StorageError::NotFound`] if the path does not exist and
    /// [`StorageError::NotADirectory`] if it names a file.
    fn open_dir(&mut self, path: &str) -> Result<Self, StorageError>;

    /// Read the next entry, or `None` at the end of the directory.
    ///
    /// # Errors
    /// A [`StorageError`] if the directory cannot be read.
    fn read_entry(&mut self) -> Result<Option<DirEntry>, StorageError>;

    /// Restart enumeration from the first entry.
    ///
    /// # Errors
    /// A [`StorageError`] if the position cannot be reset.
    fn rewind(&mut self) -> Result<(), StorageError>;

    /// Read the file `name` from this directory into `buf`, returning the
    /// number of bytes read (at most `buf.len()`).
    ///
    /// # Errors
    /// [`StorageError::NotFound`] if there is no such file,
    /// [`StorageError::NotAFile`] if it is a directory, or another
    /// [`StorageError`] if reading fails.
    fn read_file(&mut self, name: &str, buf: &mut [u8]) -> Result<usize, StorageError>;
}

/// The set of mounted volumes.
pub trait Volumes {
    type Dir: Directory;

    /// Open the root directory of every available volume, in a stable order.
    ///
    /// # Errors
    /// A [`StorageError`] if the volumes cannot be enumerated at all.
    fn roots(&mut self) -> Result<Vec<Self::Dir>, StorageError>;
}

/// Join a relative path onto a base path, resolving `.` and `..`.
///
/// Both `\` and `/` are accepted as separators; the result uses `\` and has
/// no leading separator. Returns `None` if the path would climb above the
/// volume root.
#[must_use]
pub fn join_path(base: &str, relative: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for component in base.split(['\\', '/']).chain(relative.split(['\\', '/'])) {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            name => parts.push(name),
        }
    }
    Some(parts.join("\\"))
}

/// The directory part of a file path (`\EFI\OC\Drivers\Patcher.efi` gives
/// `EFI\OC\Drivers`).
#[must_use]
pub fn parent_dir(path: &str) -> String {
    let normalized = join_path("", path).unwrap_or_default();
    match normalized.rfind('\\') {
        Some(idx) => String::from(&normalized[..idx]),
        None => String::new(),
    }
}
