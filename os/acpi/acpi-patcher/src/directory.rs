//! # Extended System Description Table (XSDT)
//!
//! The XSDT is a standard header followed by 64-bit physical addresses of
//! the other tables:
//!
//! ```text
//! Offset  Size  Field
//!      0    36  SdtHeader ("XSDT")
//!     36     8  Entry[0]
//!     44     8  Entry[1]
//!    ...
//! ```
//!
//! [`TableDirectory`] keeps the entries symbolically: tables that were
//! already installed by the firmware are kept by address, tables loaded in
//! this session by arena handle. Addresses for the latter only exist once
//! [`TableDirectory::serialize`] is called at commit time.
//!
//! The directory has a fixed capacity. It starts out full and is grown
//! exactly once per session; appends beyond the capacity fail.

use crate::arena::TableHandle;
use acpi_tables::{SdtHeader, Signature, TableError, ValidationMode, fix_checksum, validate};
use alloc::vec;
use alloc::vec::Vec;
use log::{debug, trace};

/// Size of one XSDT entry.
pub const ENTRY_SIZE: usize = 8;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A table installed by the firmware, at this physical address.
    Firmware(u64),
    /// A table loaded during this session.
    Loaded(TableHandle),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutateError {
    #[error("no {0} entry in the XSDT")]
    NotFound(Signature),
    #[error("XSDT capacity of {capacity} entries exhausted")]
    CapacityExceeded { capacity: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDirectory {
    paddr: u64,
    header: SdtHeader,
    entries: Vec<Entry>,
    capacity: usize,
}

impl TableDirectory {
    /// Decode the XSDT copied from `paddr`.
    ///
    /// The checksum is not enforced; the directory is re-checksummed when
    /// it is serialized.
    ///
    /// # Errors
    /// A [`TableError`] if `bytes` is not a well-formed XSDT.
    pub fn parse(paddr: u64, bytes: &[u8]) -> Result<Self, TableError> {
        let validated = validate(bytes, bytes.len(), ValidationMode::Lenient)?;
        let header = validated.header;
        if header.signature != Signature::XSDT {
            return Err(TableError::UnexpectedSignature {
                expected: Signature::XSDT,
                found: header.signature,
            });
        }
        if validated.residual != 0 {
            debug!(
                "XSDT checksum is off by {:#04x}; it will be recomputed",
                validated.residual
            );
        }

        let entries: Vec<Entry> = bytes[SdtHeader::SIZE..header.table_len()]
            .chunks_exact(ENTRY_SIZE)
            .map(|raw| {
                let mut addr = [0u8; ENTRY_SIZE];
                addr.copy_from_slice(raw);
                Entry::Firmware(u64::from_le_bytes(addr))
            })
            .collect();
        let capacity = entries.len();

        let mut directory = Self {
            paddr,
            header,
            entries,
            capacity,
        };
        directory.sync_length();
        Ok(directory)
    }

    /// Physical address the directory was read from.
    #[must_use]
    pub const fn paddr(&self) -> u64 {
        self.paddr
    }

    #[must_use]
    pub const fn header(&self) -> &SdtHeader {
        &self.header
    }

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Reserve `additional` free slots beyond the current entry count.
    pub fn grow(&mut self, additional: usize) {
        self.capacity = self.entries.len() + additional;
        debug!(
            "XSDT grown: {} entries, capacity {} ({} free slots)",
            self.entries.len(),
            self.capacity,
            additional
        );
    }

    /// Overwrite the first entry whose table has signature `signature`.
    ///
    /// `signature_of` resolves the signature of an existing entry; entries
    /// it cannot resolve are skipped. Returns the slot index and the entry
    /// that was replaced. The entry count is unchanged.
    ///
    /// # Errors
    /// [`MutateError::NotFound`] if no entry matches.
    pub fn replace_by_signature(
        &mut self,
        signature: Signature,
        entry: Entry,
        mut signature_of: impl FnMut(&Entry) -> Option<Signature>,
    ) -> Result<(usize, Entry), MutateError> {
        let slot = self
            .entries
            .iter()
            .position(|e| signature_of(e) == Some(signature))
            .ok_or(MutateError::NotFound(signature))?;
        let previous = core::mem::replace(&mut self.entries[slot], entry);
        trace!("XSDT entry {slot}: {previous:?} replaced by {entry:?}");
        Ok((slot, previous))
    }

    /// Put `entry` back into `slot`, returning what was there.
    pub fn restore(&mut self, slot: usize, entry: Entry) -> Option<Entry> {
        self.entries
            .get_mut(slot)
            .map(|current| core::mem::replace(current, entry))
    }

    /// Add `entry` at the next free slot, returning its index.
    ///
    /// # Errors
    /// [`MutateError::CapacityExceeded`] if every slot is in use.
    pub fn append(&mut self, entry: Entry) -> Result<usize, MutateError> {
        if self.is_full() {
            return Err(MutateError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.entries.push(entry);
        self.sync_length();
        trace!(
            "XSDT entry {} appended, length now {} bytes",
            self.entries.len() - 1,
            self.header.length
        );
        Ok(self.entries.len() - 1)
    }

    /// Encode the directory into a buffer sized for its full capacity.
    ///
    /// `resolve` maps session-loaded tables to their installed addresses.
    /// Free slots are zero and lie beyond the header's `length`, so the
    /// checksum only covers the used part.
    pub fn serialize(&self, mut resolve: impl FnMut(TableHandle) -> u64) -> Vec<u8> {
        let used = self.header.table_len();
        let slots = self.capacity.max(self.entries.len());
        let mut bytes = vec![0u8; SdtHeader::SIZE + slots * ENTRY_SIZE];
        bytes[..SdtHeader::SIZE].copy_from_slice(&self.header.encode());

        for (i, entry) in self.entries.iter().enumerate() {
            let addr = match *entry {
                Entry::Firmware(addr) => addr,
                Entry::Loaded(handle) => resolve(handle),
            };
            let offset = SdtHeader::SIZE + i * ENTRY_SIZE;
            bytes[offset..offset + ENTRY_SIZE].copy_from_slice(&addr.to_le_bytes());
        }

        fix_checksum(&mut bytes[..used], SdtHeader::CHECKSUM_OFFSET);
        bytes
    }

    fn sync_length(&mut self) {
        let len = SdtHeader::SIZE + self.entries.len() * ENTRY_SIZE;
        self.header.length = u32::try_from(len).unwrap_or(u32::MAX);
    }
}
