//! # Loaded table arena
//!
//! Override tables read during a session are owned here until commit, when
//! each one referenced by the directory or the FADT is copied into
//! firmware-reserved memory. Directory entries refer to arena tables by
//! [`TableHandle`], never by address.

use acpi_tables::AcpiTable;
use alloc::vec::Vec;

/// Index of a table in a [`TableArena`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableHandle(pub(crate) usize);

impl TableHandle {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct TableArena {
    tables: Vec<AcpiTable>,
}

impl TableArena {
    #[must_use]
    pub const fn new() -> Self {
        Self { tables: Vec::new() }
    }

    pub fn insert(&mut self, table: AcpiTable) -> TableHandle {
        self.tables.push(table);
        TableHandle(self.tables.len() - 1)
    }

    #[must_use]
    pub fn get(&self, handle: TableHandle) -> Option<&AcpiTable> {
        self.tables.get(handle.0)
    }

    /// Drop the most recently inserted table.
    ///
    /// Only the last handle can be discarded, so earlier handles stay valid;
    /// returns `None` for any other handle.
    pub fn discard(&mut self, handle: TableHandle) -> Option<AcpiTable> {
        if handle.0 + 1 == self.tables.len() {
            self.tables.pop()
        } else {
            None
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TableHandle, &AcpiTable)> {
        self.tables
            .iter()
            .enumerate()
            .map(|(i, table)| (TableHandle(i), table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acpi_tables::{SdtHeader, Signature, ValidationMode, fix_checksum};

    fn table(signature: Signature) -> AcpiTable {
        let header = SdtHeader::new(signature, 40);
        let mut bytes = header.encode().to_vec();
        bytes.extend_from_slice(&[0xA5; 4]);
        fix_checksum(&mut bytes, SdtHeader::CHECKSUM_OFFSET);
        AcpiTable::parse(bytes, ValidationMode::Strict).expect("valid table")
    }

    #[test]
    fn handles_are_stable() {
        let mut arena = TableArena::new();
        let a = arena.insert(table(Signature::SSDT));
        let b = arena.insert(table(Signature::DSDT));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a).map(AcpiTable::signature), Some(Signature::SSDT));
        assert_eq!(arena.get(b).map(AcpiTable::signature), Some(Signature::DSDT));
    }

    #[test]
    fn only_the_last_table_can_be_discarded() {
        let mut arena = TableArena::new();
        let a = arena.insert(table(Signature::SSDT));
        let b = arena.insert(table(Signature::SSDT));
        assert!(arena.discard(a).is_none());
        assert!(arena.discard(b).is_some());
        assert_eq!(arena.len(), 1);
        assert!(arena.get(b).is_none());
        assert!(arena.get(a).is_some());
    }
}
