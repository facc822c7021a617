//! # Engine context
//!
//! Discovery of the three firmware structures a patch session works on:
//!
//! ```text
//! RSDP ──xsdt_address──► XSDT ──entries──► FACP (FADT) ──x_dsdt──► DSDT
//!                                  └─────► SSDT, APIC, ...
//! ```
//!
//! All three are copied into owned buffers. Nothing is written back until
//! the session commits.

use crate::directory::{Entry, TableDirectory};
use crate::error::{PatchError, RootError};
use acpi_tables::fadt::Fadt;
use acpi_tables::rsdp::RootPointer;
use acpi_tables::signature::Ascii;
use acpi_tables::{PhysMemory, SdtHeader, Signature, TableError};
use log::{debug, error, info, trace, warn};

/// The root pointer, the table directory and the FADT of one session.
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub rsdp: RootPointer,
    pub directory: TableDirectory,
    pub fadt: Fadt,
}

impl EngineContext {
    /// Read the RSDP at `rsdp_addr` and follow it to the XSDT and FADT.
    ///
    /// # Errors
    /// [`PatchError::RootStructureMissing`] if the RSDP or XSDT is unusable
    /// and [`PatchError::FixedTableMissing`] if the XSDT lists no valid FADT.
    pub fn discover(map: &impl PhysMemory, rsdp_addr: u64) -> Result<Self, PatchError> {
        let rsdp = RootPointer::read(map, rsdp_addr).map_err(|e| {
            error!("RSDP at {rsdp_addr:#x} is unusable: {e}");
            RootError::Rsdp(e)
        })?;
        info!(
            "RSDP at {:#x}: revision {}, OEM {}",
            rsdp.paddr(),
            rsdp.revision(),
            Ascii(rsdp.oem_id())
        );
        debug!(
            "  RSDT {:#x}, XSDT {:#x}, length {}",
            rsdp.rsdt_address(),
            rsdp.xsdt_address(),
            rsdp.length()
        );

        let directory = read_directory(map, rsdp.xsdt_address()).map_err(|e| {
            error!("XSDT at {:#x} is unusable: {e}", rsdp.xsdt_address());
            e
        })?;
        let header = directory.header();
        info!(
            "XSDT at {:#x}: {} entries, OEM {} / {}",
            directory.paddr(),
            directory.len(),
            Ascii(&header.oem_id),
            Ascii(&header.oem_table_id)
        );

        let fadt = find_fadt(map, &directory)?;
        log_fadt(&fadt);

        Ok(Self {
            rsdp,
            directory,
            fadt,
        })
    }
}

fn read_directory(map: &impl PhysMemory, paddr: u64) -> Result<TableDirectory, RootError> {
    let head = map.read_vec(paddr, SdtHeader::SIZE)?;
    let header = SdtHeader::parse(&head).ok_or(TableError::TooSmall {
        required: SdtHeader::SIZE,
        available: head.len(),
    })?;
    if header.table_len() < SdtHeader::SIZE {
        return Err(TableError::TooSmall {
            required: SdtHeader::SIZE,
            available: header.table_len(),
        }
        .into());
    }
    let bytes = map.read_vec(paddr, header.table_len())?;
    Ok(TableDirectory::parse(paddr, &bytes)?)
}

/// Signature of the table a firmware entry points to, if it is readable.
pub(crate) fn firmware_signature(map: &impl PhysMemory, paddr: u64) -> Option<Signature> {
    if paddr == 0 {
        return None;
    }
    let mut raw = [0u8; 4];
    map.read(paddr, &mut raw).ok()?;
    let signature = Signature(raw);
    (!signature.is_zero()).then_some(signature)
}

fn find_fadt(map: &impl PhysMemory, directory: &TableDirectory) -> Result<Fadt, PatchError> {
    for (index, entry) in directory.entries().iter().enumerate() {
        let Entry::Firmware(paddr) = *entry else {
            continue;
        };
        let signature = firmware_signature(map, paddr);
        match signature {
            Some(s) => trace!("  Entry {index}: {s} at {paddr:#x}"),
            None => trace!("  Entry {index}: unreadable or null ({paddr:#x}), skipping"),
        }
        if signature != Some(Signature::FADT) {
            continue;
        }

        return Fadt::read(map, paddr).map_err(|e| {
            error!("FADT at {paddr:#x} is unusable: {e}");
            PatchError::FixedTableMissing
        });
    }

    warn!("No FACP entry among {} XSDT entries", directory.len());
    Err(PatchError::FixedTableMissing)
}

fn log_fadt(fadt: &Fadt) {
    let header = fadt.header();
    info!(
        "FADT at {:#x}: revision {}, {} bytes",
        fadt.paddr(),
        header.revision,
        header.length
    );
    debug!("  DSDT {:#x}, X_DSDT {:x?}", fadt.dsdt32(), fadt.x_dsdt());
    debug!(
        "  FIRMWARE_CTRL {:#x}, X_FIRMWARE_CTRL {:x?}",
        fadt.firmware_ctrl(),
        fadt.x_firmware_ctrl()
    );
    if let Some(flags) = fadt.flags() {
        debug!("  Flags {:#010x}: {flags:?}", flags.into_bits());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acpi_tables::rsdp::RsdpError;
    use acpi_tables::{MemoryError, fix_checksum};
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct Regions(BTreeMap<u64, Vec<u8>>);

    impl PhysMemory for Regions {
        fn read(&self, paddr: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
            let unmapped = MemoryError::Unmapped {
                paddr,
                len: buf.len(),
            };
            let (&base, region) = self.0.range(..=paddr).next_back().ok_or(unmapped)?;
            let offset = usize::try_from(paddr - base).map_err(|_| unmapped)?;
            let bytes = region.get(offset..offset + buf.len()).ok_or(unmapped)?;
            buf.copy_from_slice(bytes);
            Ok(())
        }

        fn write(&mut self, paddr: u64, _bytes: &[u8]) -> Result<(), MemoryError> {
            Err(MemoryError::Unmapped { paddr, len: 0 })
        }

        fn allocate(&mut self, len: usize) -> Result<u64, MemoryError> {
            Err(MemoryError::OutOfMemory { len })
        }

        fn release(&mut self, _paddr: u64, _len: usize) {}
    }

    fn table(signature: Signature, len: usize) -> Vec<u8> {
        let mut bytes = SdtHeader::new(signature, len as u32).encode().to_vec();
        bytes.resize(len, 0);
        fix_checksum(&mut bytes, SdtHeader::CHECKSUM_OFFSET);
        bytes
    }

    fn xsdt(entries: &[u64]) -> Vec<u8> {
        let mut bytes = table(Signature::XSDT, SdtHeader::SIZE + entries.len() * 8);
        for (i, addr) in entries.iter().enumerate() {
            bytes[36 + i * 8..44 + i * 8].copy_from_slice(&addr.to_le_bytes());
        }
        fix_checksum(&mut bytes, SdtHeader::CHECKSUM_OFFSET);
        bytes
    }

    fn rsdp(xsdt: u64) -> Vec<u8> {
        let mut raw = vec![0u8; 36];
        raw[0..8].copy_from_slice(b"RSD PTR ");
        raw[15] = 2;
        raw[20..24].copy_from_slice(&36u32.to_le_bytes());
        raw[24..32].copy_from_slice(&xsdt.to_le_bytes());
        fix_checksum(&mut raw[..20], 8);
        fix_checksum(&mut raw, 32);
        raw
    }

    #[test]
    fn discovers_the_chain() {
        let mut mem = Regions::default();
        mem.0.insert(0xE000, rsdp(0x10_0000));
        mem.0.insert(0x10_0000, xsdt(&[0x20_0000, 0x30_0000]));
        mem.0.insert(0x20_0000, table(Signature::SSDT, 40));
        mem.0.insert(0x30_0000, table(Signature::FADT, 244));

        let ctx = EngineContext::discover(&mem, 0xE000).expect("discover");
        assert_eq!(ctx.rsdp.xsdt_address(), 0x10_0000);
        assert_eq!(ctx.directory.len(), 2);
        assert_eq!(ctx.fadt.paddr(), 0x30_0000);
    }

    #[test]
    fn missing_fadt_is_fatal() {
        let mut mem = Regions::default();
        mem.0.insert(0xE000, rsdp(0x10_0000));
        mem.0.insert(0x10_0000, xsdt(&[0, 0x20_0000]));
        mem.0.insert(0x20_0000, table(Signature::SSDT, 40));

        assert_eq!(
            EngineContext::discover(&mem, 0xE000).map(|_| ()),
            Err(PatchError::FixedTableMissing)
        );
    }

    #[test]
    fn bad_roots_are_fatal() {
        let mem = Regions::default();
        assert_eq!(
            EngineContext::discover(&mem, 0).map(|_| ()),
            Err(PatchError::RootStructureMissing(RootError::Rsdp(RsdpError::Null)))
        );

        let mut mem = Regions::default();
        mem.0.insert(0xE000, rsdp(0x10_0000));
        mem.0.insert(0x10_0000, table(Signature::RSDT, 36));
        assert!(matches!(
            EngineContext::discover(&mem, 0xE000),
            Err(PatchError::RootStructureMissing(RootError::Xsdt(
                TableError::UnexpectedSignature { .. }
            )))
        ));
    }
}
