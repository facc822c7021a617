//! # System Description Table header
//!
//! Every ACPI table except the RSDP and FACS starts with the same 36-byte
//! header. The header is decoded field by field from little-endian bytes;
//! no table memory is ever reinterpreted in place.
//!
//! ```text
//! offset  size  field
//!      0     4  Signature
//!      4     4  Length (whole table, header included)
//!      8     1  Revision
//!      9     1  Checksum
//!     10     6  OEM ID
//!     16     8  OEM Table ID
//!     24     4  OEM Revision
//!     28     4  Creator ID
//!     32     4  Creator Revision
//! ```

use crate::signature::Signature;
use crate::{read_u32, write_u32};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SdtHeader {
    pub signature: Signature,
    pub length: u32,
    pub revision: u8,
    pub checksum: u8,
    pub oem_id: [u8; 6],
    pub oem_table_id: [u8; 8],
    pub oem_revision: u32,
    pub creator_id: [u8; 4],
    pub creator_revision: u32,
}

impl SdtHeader {
    /// Size of the encoded header in bytes.
    pub const SIZE: usize = 36;
    pub const LENGTH_OFFSET: usize = 4;
    pub const CHECKSUM_OFFSET: usize = 9;

    /// A header with the given signature and length and every other field
    /// zeroed.
    #[must_use]
    pub const fn new(signature: Signature, length: u32) -> Self {
        Self {
            signature,
            length,
            revision: 0,
            checksum: 0,
            oem_id: [0; 6],
            oem_table_id: [0; 8],
            oem_revision: 0,
            creator_id: [0; 4],
            creator_revision: 0,
        }
    }

    /// Decode the header at the start of `bytes`.
    ///
    /// Returns `None` if fewer than [`SdtHeader::SIZE`] bytes are available.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }

        let mut signature = [0u8; 4];
        signature.copy_from_slice(&bytes[0..4]);
        let mut oem_id = [0u8; 6];
        oem_id.copy_from_slice(&bytes[10..16]);
        let mut oem_table_id = [0u8; 8];
        oem_table_id.copy_from_slice(&bytes[16..24]);
        let mut creator_id = [0u8; 4];
        creator_id.copy_from_slice(&bytes[28..32]);

        Some(Self {
            signature: Signature(signature),
            length: read_u32(bytes, Self::LENGTH_OFFSET),
            revision: bytes[8],
            checksum: bytes[Self::CHECKSUM_OFFSET],
            oem_id,
            oem_table_id,
            oem_revision: read_u32(bytes, 24),
            creator_id,
            creator_revision: read_u32(bytes, 32),
        })
    }

    /// Encode the header into its 36-byte wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.signature.0);
        write_u32(&mut out, Self::LENGTH_OFFSET, self.length);
        out[8] = self.revision;
        out[Self::CHECKSUM_OFFSET] = self.checksum;
        out[10..16].copy_from_slice(&self.oem_id);
        out[16..24].copy_from_slice(&self.oem_table_id);
        write_u32(&mut out, 24, self.oem_revision);
        out[28..32].copy_from_slice(&self.creator_id);
        write_u32(&mut out, 32, self.creator_revision);
        out
    }

    /// Declared table length as a `usize`.
    #[must_use]
    pub const fn table_len(&self) -> usize {
        self.length as usize
    }
}
