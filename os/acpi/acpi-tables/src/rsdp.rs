//! # RSDP/XSDP (Root/Extended System Description Pointer)
//!
//! ```text
//! offset  size  field                 covered by
//!      0     8  "RSD PTR "            legacy + extended checksum
//!      8     1  Checksum              legacy + extended checksum
//!      9     6  OEM ID                legacy + extended checksum
//!     15     1  Revision              legacy + extended checksum
//!     16     4  RSDT address          legacy + extended checksum
//!     20     4  Length                extended checksum
//!     24     8  XSDT address          extended checksum
//!     32     1  Extended checksum     extended checksum
//!     33     3  Reserved              extended checksum
//! ```
//!
//! Only ACPI 2.0+ pointers (revision 2 and later) carry an XSDT address, so
//! only those can be patched.

use crate::checksum::{checksum, fix_checksum};
use crate::{MemoryError, PhysMemory, read_u32, read_u64, write_u64};
use alloc::vec::Vec;

pub const RSDP_SIGNATURE: [u8; 8] = *b"RSD PTR ";

/// Bytes covered by the ACPI 1.0 checksum.
pub const LEGACY_LEN: usize = 20;

/// Size of the ACPI 2.0 structure.
pub const EXTENDED_LEN: usize = 36;

/// Largest `length` accepted from firmware.
pub const MAX_LEN: usize = 4096;

const CHECKSUM_OFFSET: usize = 8;
const REVISION_OFFSET: usize = 15;
const RSDT_OFFSET: usize = 16;
const LENGTH_OFFSET: usize = 20;
const XSDT_OFFSET: usize = 24;
const EXT_CHECKSUM_OFFSET: usize = 32;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RsdpError {
    #[error("RSDP address is null")]
    Null,
    #[error("invalid RSDP signature")]
    BadSignature,
    #[error("RSDP checksum over the first 20 bytes is invalid")]
    LegacyChecksum,
    #[error("RSDP extended checksum is invalid")]
    ExtendedChecksum,
    #[error("RSDP revision {revision} has no XSDT")]
    NoXsdt { revision: u8 },
    #[error("RSDP length {length} is out of range")]
    BadLength { length: u32 },
    #[error("RSDP XSDT address is null")]
    NullXsdt,
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// A copy of the firmware's root pointer plus the address it came from.
///
/// Changes are made to the copy and only become visible through
/// [`RootPointer::write_back`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootPointer {
    paddr: u64,
    raw: Vec<u8>,
}

impl RootPointer {
    /// Read and validate the ACPI 2.0+ root pointer at `paddr`.
    ///
    /// # Errors
    /// An [`RsdpError`] describing the first check that failed.
    pub fn read(map: &impl PhysMemory, paddr: u64) -> Result<Self, RsdpError> {
        if paddr == 0 {
            return Err(RsdpError::Null);
        }

        let v1 = map.read_vec(paddr, LEGACY_LEN)?;
        if v1[0..8] != RSDP_SIGNATURE {
            return Err(RsdpError::BadSignature);
        }
        if checksum(&v1) != 0 {
            return Err(RsdpError::LegacyChecksum);
        }

        let revision = v1[REVISION_OFFSET];
        if revision < 2 {
            return Err(RsdpError::NoXsdt { revision });
        }

        let head = map.read_vec(paddr, LENGTH_OFFSET + 4)?;
        let length = read_u32(&head, LENGTH_OFFSET);
        let len = length as usize;
        if !(EXTENDED_LEN..=MAX_LEN).contains(&len) {
            return Err(RsdpError::BadLength { length });
        }

        let raw = map.read_vec(paddr, len)?;
        if checksum(&raw) != 0 {
            return Err(RsdpError::ExtendedChecksum);
        }

        let rsdp = Self { paddr, raw };
        if rsdp.xsdt_address() == 0 {
            return Err(RsdpError::NullXsdt);
        }
        Ok(rsdp)
    }

    #[must_use]
    pub const fn paddr(&self) -> u64 {
        self.paddr
    }

    #[must_use]
    pub fn revision(&self) -> u8 {
        self.raw[REVISION_OFFSET]
    }

    #[must_use]
    pub fn oem_id(&self) -> &[u8] {
        &self.raw[9..15]
    }

    #[must_use]
    pub fn length(&self) -> u32 {
        read_u32(&self.raw, LENGTH_OFFSET)
    }

    #[must_use]
    pub fn rsdt_address(&self) -> u32 {
        read_u32(&self.raw, RSDT_OFFSET)
    }

    #[must_use]
    pub fn xsdt_address(&self) -> u64 {
        read_u64(&self.raw, XSDT_OFFSET)
    }

    #[must_use]
    pub fn legacy_checksum(&self) -> u8 {
        self.raw[CHECKSUM_OFFSET]
    }

    #[must_use]
    pub fn extended_checksum(&self) -> u8 {
        self.raw[EXT_CHECKSUM_OFFSET]
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Point the copy at a different XSDT. Checksums are stale afterwards.
    pub fn set_xsdt_address(&mut self, xsdt: u64) {
        write_u64(&mut self.raw, XSDT_OFFSET, xsdt);
    }

    /// Recompute both checksums: first the legacy one over the first 20
    /// bytes, then the extended one over the whole structure (which covers
    /// the freshly written legacy checksum).
    pub fn recompute_checksums(&mut self) {
        fix_checksum(&mut self.raw[..LEGACY_LEN], CHECKSUM_OFFSET);
        fix_checksum(&mut self.raw, EXT_CHECKSUM_OFFSET);
    }

    #[must_use]
    pub fn checksums_valid(&self) -> bool {
        checksum(&self.raw[..LEGACY_LEN]) == 0 && checksum(&self.raw) == 0
    }

    /// Write the copy back to where it was read from.
    ///
    /// # Errors
    /// Propagates the [`MemoryError`] of the underlying write.
    pub fn write_back(&self, map: &mut impl PhysMemory) -> Result<(), MemoryError> {
        map.write(self.paddr, &self.raw)
    }
}
