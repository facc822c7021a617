//! # Override file loading

use crate::classify::OverrideFile;
use crate::config::PatchConfig;
use crate::dump::trace_hex_dump;
use crate::storage::{Directory, StorageError};
use acpi_tables::signature::Ascii;
use acpi_tables::{AcpiTable, TableError, ValidationMode};
use alloc::vec;
use log::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("file not found")]
    NotFound,
    #[error("read error: {0}")]
    Read(StorageError),
    #[error("file of {size} bytes exceeds the maximum table size")]
    TooLarge { size: u64 },
    #[error("invalid ACPI table: {0}")]
    Validation(#[from] TableError),
}

impl From<StorageError> for LoadError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound => Self::NotFound,
            other => Self::Read(other),
        }
    }
}

/// Read `file` from `dir` and validate it strictly.
///
/// If `dir` has no such file, the configured override sub-folder is tried
/// once. The table is validated against the number of bytes actually read,
/// so a header that claims more than the file holds is rejected.
///
/// # Errors
/// A [`LoadError`]; none of them is fatal to a patch session.
pub fn load<D: Directory>(
    dir: &mut D,
    file: &OverrideFile,
    config: &PatchConfig,
) -> Result<AcpiTable, LoadError> {
    // ACPI table lengths are 32-bit.
    let size = u32::try_from(file.size)
        .map(|s| s as usize)
        .map_err(|_| LoadError::TooLarge { size: file.size })?;

    let mut buf = vec![0u8; size];
    let read = match dir.read_file(&file.name, &mut buf) {
        Ok(read) => read,
        Err(StorageError::NotFound) => {
            trace!(
                "{} not found, trying the {} sub-folder",
                file.name, config.override_folder
            );
            let mut sub = dir.open_dir(config.override_folder)?;
            sub.read_file(&file.name, &mut buf)?
        }
        Err(e) => return Err(LoadError::Read(e)),
    };
    buf.truncate(read);
    trace!("Read {read} of {size} bytes from {}", file.name);

    let table = AcpiTable::parse(buf, ValidationMode::Strict)?;
    let header = table.header();
    debug!(
        "  Table signature: {}, length: {} bytes, revision: {}",
        header.signature, header.length, header.revision
    );
    trace!(
        "  OEM ID: {}, OEM Table ID: {}, OEM Revision: {:#x}",
        Ascii(&header.oem_id),
        Ascii(&header.oem_table_id),
        header.oem_revision
    );
    trace_hex_dump(table.as_bytes(), 0);

    Ok(table)
}
