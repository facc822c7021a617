//! # Override file classification
//!
//! Decides what a directory entry is for, purely from its name, size and
//! type. Classification is deterministic and exhaustive:
//!
//! | Name              | Classification             |
//! |-------------------|----------------------------|
//! | `DSDT.aml`        | `DsdtReplacement`          |
//! | `SSDT-3.aml`      | `NumberedSupplement(3)`    |
//! | `SSDT-gpu.aml`    | `NamedSupplement("gpu")`   |
//! | `random.aml`      | `Generic`                  |
//! | `._SSDT-1.aml`    | `Ignored`                  |
//! | `README.txt`      | `Ignored`                  |

use crate::config::PatchConfig;
use crate::storage::{DirEntry, Directory, StorageError};
use alloc::string::String;
use log::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    DsdtReplacement,
    NumberedSupplement(u32),
    NamedSupplement(String),
    Generic,
    Ignored,
}

/// A directory entry together with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideFile {
    pub name: String,
    pub size: u64,
    pub is_directory: bool,
    pub class: Classification,
}

impl OverrideFile {
    #[must_use]
    pub fn from_entry(entry: DirEntry, config: &PatchConfig) -> Self {
        let class = classify(&entry, config);
        Self {
            name: entry.name,
            size: entry.size,
            is_directory: entry.is_directory,
            class,
        }
    }
}

/// Classify a directory entry. Directories and empty files are ignored.
#[must_use]
pub fn classify(entry: &DirEntry, config: &PatchConfig) -> Classification {
    if entry.is_directory || entry.size == 0 {
        return Classification::Ignored;
    }
    classify_name(&entry.name, config)
}

/// Classify a file name.
#[must_use]
pub fn classify_name(name: &str, config: &PatchConfig) -> Classification {
    if name.starts_with(config.resource_fork_prefix) {
        return Classification::Ignored;
    }
    let Some(stem) = strip_extension(name, config) else {
        return Classification::Ignored;
    };

    if name == config.dsdt_file_name
        || (!config.extension_case_sensitive
            && name.eq_ignore_ascii_case(config.dsdt_file_name))
    {
        return Classification::DsdtReplacement;
    }

    let Some(tag) = stem.strip_prefix(config.ssdt_prefix) else {
        return Classification::Generic;
    };
    if tag.is_empty() {
        return Classification::Generic;
    }

    if tag.bytes().all(|b| b.is_ascii_digit()) {
        return match tag.parse::<u32>() {
            Ok(n) if config.numbered_range.contains(&n) => Classification::NumberedSupplement(n),
            _ => Classification::Generic,
        };
    }

    Classification::NamedSupplement(String::from(tag))
}

/// `true` for names the locator counts as override files: the configured
/// extension, and not a resource-fork artifact.
#[must_use]
pub fn is_override_name(name: &str, config: &PatchConfig) -> bool {
    !name.starts_with(config.resource_fork_prefix) && strip_extension(name, config).is_some()
}

fn strip_extension<'a>(name: &'a str, config: &PatchConfig) -> Option<&'a str> {
    let ext = config.extension;
    let split = name.len().checked_sub(ext.len())?;
    if !name.is_char_boundary(split) {
        return None;
    }
    let (stem, suffix) = name.split_at(split);
    let matches = if config.extension_case_sensitive {
        suffix == ext
    } else {
        suffix.eq_ignore_ascii_case(ext)
    };
    matches.then_some(stem)
}

/// Lazily enumerates and classifies the entries of a directory.
///
/// Every entry is yielded, including ignored ones, so that callers can
/// account for them. Enumeration stops at the first read error, which is
/// yielded once.
pub struct OverrideEntries<'d, D: Directory> {
    dir: &'d mut D,
    config: &'d PatchConfig,
    done: bool,
}

impl<'d, D: Directory> OverrideEntries<'d, D> {
    /// Start enumerating `dir` from its first entry.
    ///
    /// # Errors
    /// Propagates the [`StorageError`] of [`Directory::rewind`].
    pub fn new(dir: &'d mut D, config: &'d PatchConfig) -> Result<Self, StorageError> {
        dir.rewind()?;
        Ok(Self {
            dir,
            config,
            done: false,
        })
    }

    /// Restart from the first entry.
    ///
    /// # Errors
    /// Propagates the [`StorageError`] of [`Directory::rewind`].
    pub fn restart(&mut self) -> Result<(), StorageError> {
        self.dir.rewind()?;
        self.done = false;
        Ok(())
    }
}

impl<D: Directory> Iterator for OverrideEntries<'_, D> {
    type Item = Result<OverrideFile, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.dir.read_entry() {
            Ok(Some(entry)) => {
                trace!(
                    "Found directory entry: {} ({} bytes{})",
                    entry.name,
                    entry.size,
                    if entry.is_directory { ", directory" } else { "" }
                );
                Some(Ok(OverrideFile::from_entry(entry, self.config)))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Count the override files directly inside `dir`.
///
/// Read errors end the count early; the directory is rewound first.
pub fn count_override_files<D: Directory>(dir: &mut D, config: &PatchConfig) -> usize {
    if dir.rewind().is_err() {
        return 0;
    }
    let mut count = 0;
    while let Ok(Some(entry)) = dir.read_entry() {
        if !entry.is_directory && is_override_name(&entry.name, config) {
            count += 1;
        }
    }
    count
}
