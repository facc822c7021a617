//! # ACPI Table Structures for Boot-Time Patching
//!
//! This crate provides the byte-level building blocks for inspecting and
//! rewriting the platform's ACPI tables while UEFI boot services are still
//! running. It knows how the firmware lays out the root structures, how to
//! validate an arbitrary table blob, and how to restore the additive
//! checksums after a table was modified.
//!
//! ## Overview
//!
//! ACPI describes the platform through a chain of tables rooted at a pointer
//! structure the firmware publishes in the UEFI configuration table:
//!
//! ```text
//! UEFI Configuration Table
//!     ↓
//! RSDP/XSDP (Root System Description Pointer)
//!     ↓
//! XSDT (Extended System Description Table, 64-bit entries)
//!     ↓
//! FADT ("FACP") ──→ DSDT
//! SSDT, MADT, MCFG, ...
//! ```
//!
//! Patching means producing a new XSDT (with more room), optionally
//! pointing the FADT at a different DSDT, and finally repointing the RSDP.
//! Every one of those structures must keep a zero byte sum.
//!
//! ## Key Components
//!
//! ### Checksums ([`checksum`])
//! * **Byte Sum**: Wrapping 8-bit sum over a byte range
//! * **Correction Byte**: The value that makes a region sum to zero
//!
//! ### Tables ([`table`], [`header`], [`signature`])
//! * **Owned Blobs**: Tables are owned byte buffers with typed accessors
//! * **Header View**: The 36-byte common header, decoded field by field
//! * **Signatures**: Four-character table tags (`DSDT`, `SSDT`, `FACP`, ...)
//!
//! ### Validation ([`validate`])
//! * **Strict**: Reject any structural problem and any checksum residual
//! * **Lenient**: Accept a checksum residual for tables that are rewritten
//!   and re-checksummed anyway
//!
//! ### Root Structures ([`rsdp`], [`fadt`])
//! * **RSDP**: Signature, revision and both checksum ranges
//! * **FADT**: The 32- and 64-bit DSDT pointers and the feature flags
//!
//! ## Memory Access
//!
//! Firmware tables are reached through the [`PhysMemory`] trait. The UEFI
//! implementation copies to and from identity-mapped physical memory; tests
//! provide an in-memory fake. Nothing in this crate dereferences raw
//! addresses itself.

#![cfg_attr(not(any(test, doctest)), no_std)]
extern crate alloc;

pub mod checksum;
pub mod fadt;
pub mod header;
pub mod rsdp;
pub mod signature;
pub mod table;
pub mod validate;

use alloc::vec;
use alloc::vec::Vec;

pub use crate::checksum::{checksum, correction_byte, fix_checksum};
pub use crate::header::SdtHeader;
pub use crate::signature::Signature;
pub use crate::table::AcpiTable;
pub use crate::validate::{TableError, ValidationMode, validate};

/// Copy-based access to physical memory holding ACPI structures.
///
/// Implementations own the mapping strategy (identity map during boot
/// services, a fake address space in tests, ...).
pub trait PhysMemory {
    /// Copy `buf.len()` bytes starting at `paddr` into `buf`.
    ///
    /// # Errors
    /// Returns a [`MemoryError`] if the range is not accessible.
    fn read(&self, paddr: u64, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// Copy `bytes` to physical memory starting at `paddr`.
    ///
    /// # Errors
    /// Returns a [`MemoryError`] if the range is not accessible.
    fn write(&mut self, paddr: u64, bytes: &[u8]) -> Result<(), MemoryError>;

    /// Allocate a zeroed region of `len` bytes that survives the hand-off
    /// to the operating system once it is referenced by a table.
    ///
    /// # Errors
    /// Returns [`MemoryError::OutOfMemory`] if the allocation fails.
    fn allocate(&mut self, len: usize) -> Result<u64, MemoryError>;

    /// Return a region from [`PhysMemory::allocate`] that no table refers to.
    fn release(&mut self, paddr: u64, len: usize);

    /// Read `len` bytes at `paddr` into a freshly allocated buffer.
    ///
    /// # Errors
    /// Returns a [`MemoryError`] if the range is not accessible.
    fn read_vec(&self, paddr: u64, len: usize) -> Result<Vec<u8>, MemoryError> {
        let mut buf = vec![0u8; len];
        self.read(paddr, &mut buf)?;
        Ok(buf)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("null physical address")]
    Null,
    #[error("physical range {paddr:#x}+{len:#x} is not accessible")]
    Unmapped { paddr: u64, len: usize },
    #[error("out of memory allocating {len} bytes")]
    OutOfMemory { len: usize },
    #[error("address {paddr:#x} does not fit a 32-bit table field")]
    Unaddressable { paddr: u64 },
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

pub(crate) fn write_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn write_u64(bytes: &mut [u8], offset: usize, value: u64) {
    bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}
