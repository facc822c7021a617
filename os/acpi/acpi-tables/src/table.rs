//! # Owned ACPI tables

use crate::checksum::{checksum, fix_checksum};
use crate::header::SdtHeader;
use crate::signature::Signature;
use crate::validate::{TableError, Validated, ValidationMode, validate};
use crate::{read_u32, read_u64, write_u32, write_u64};
use alloc::vec::Vec;

/// A validated ACPI table held in an owned buffer.
///
/// The buffer is exactly as long as the header's `length` field. Fields are
/// read and written through typed accessors; the checksum is only restored
/// by an explicit call to [`AcpiTable::recompute_checksum`].
#[derive(Clone, PartialEq, Eq)]
pub struct AcpiTable {
    bytes: Vec<u8>,
}

impl AcpiTable {
    /// Validate `bytes` and take ownership of them.
    ///
    /// Bytes beyond the header's declared length are discarded.
    ///
    /// # Errors
    /// Any [`TableError`] reported by [`validate`].
    pub fn parse(mut bytes: Vec<u8>, mode: ValidationMode) -> Result<Self, TableError> {
        let Validated { header, .. } = validate(&bytes, bytes.len(), mode)?;
        bytes.truncate(header.table_len());
        Ok(Self { bytes })
    }

    #[must_use]
    pub fn header(&self) -> SdtHeader {
        // The constructor guarantees at least a full header.
        SdtHeader::parse(&self.bytes).unwrap_or_else(|| unreachable!())
    }

    #[must_use]
    pub fn signature(&self) -> Signature {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.bytes[0..4]);
        Signature(raw)
    }

    /// Table length in bytes, header included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always `false`; a table holds at least its header.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `true` if all bytes sum to zero.
    #[must_use]
    pub fn checksum_valid(&self) -> bool {
        checksum(&self.bytes) == 0
    }

    /// Restore the zero byte sum; returns the previous checksum byte.
    pub fn recompute_checksum(&mut self) -> u8 {
        fix_checksum(&mut self.bytes, SdtHeader::CHECKSUM_OFFSET)
    }

    /// Read a little-endian `u32` field, if the table is long enough.
    #[must_use]
    pub fn field_u32(&self, offset: usize) -> Option<u32> {
        (offset + 4 <= self.bytes.len()).then(|| read_u32(&self.bytes, offset))
    }

    /// Read a little-endian `u64` field, if the table is long enough.
    #[must_use]
    pub fn field_u64(&self, offset: usize) -> Option<u64> {
        (offset + 8 <= self.bytes.len()).then(|| read_u64(&self.bytes, offset))
    }

    /// Write a little-endian `u32` field; returns `false` if out of range.
    pub fn set_field_u32(&mut self, offset: usize, value: u32) -> bool {
        if offset + 4 > self.bytes.len() {
            return false;
        }
        write_u32(&mut self.bytes, offset, value);
        true
    }

    /// Write a little-endian `u64` field; returns `false` if out of range.
    pub fn set_field_u64(&mut self, offset: usize, value: u64) -> bool {
        if offset + 8 > self.bytes.len() {
            return false;
        }
        write_u64(&mut self.bytes, offset, value);
        true
    }
}

impl core::fmt::Debug for AcpiTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AcpiTable")
            .field("signature", &self.signature())
            .field("length", &self.bytes.len())
            .finish_non_exhaustive()
    }
}
