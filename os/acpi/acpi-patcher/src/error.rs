//! # Session-fatal errors

use acpi_tables::rsdp::RsdpError;
use acpi_tables::{MemoryError, TableError};

/// Errors that abort a whole patch session.
///
/// Problems with individual override files never surface here; they are
/// logged and counted as skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("no storage with ACPI override files is available")]
    StorageUnavailable,
    #[error("ACPI root structures unusable: {0}")]
    RootStructureMissing(#[from] RootError),
    #[error("no usable FADT in the XSDT")]
    FixedTableMissing,
    #[error("memory error while installing tables: {0}")]
    Memory(#[from] MemoryError),
}

/// Why the RSDP or XSDT could not be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RootError {
    #[error("RSDP: {0}")]
    Rsdp(#[from] RsdpError),
    #[error("XSDT: {0}")]
    Xsdt(#[from] TableError),
    #[error("XSDT is not readable: {0}")]
    Memory(#[from] MemoryError),
}
