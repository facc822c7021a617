//! # Table-set mutation
//!
//! The [`Mutator`] owns the [`EngineContext`] for the duration of a
//! session. Loaded override tables go into a [`TableArena`]; replacements
//! and appends only change the symbolic directory. [`Mutator::commit`] is
//! the single place where firmware-visible memory is written:
//!
//! 1. every referenced override table is copied into reserved memory,
//! 2. the FADT copy gets the new DSDT address,
//! 3. if the directory changed, it is written to a new, larger buffer,
//! 4. the FADT is re-checksummed and written back,
//! 5. and only then is the RSDP repointed and re-checksummed.
//!
//! Steps 1 to 3 only touch fresh memory and are undone on failure, so the
//! firmware's table set stays as it was unless every allocation succeeded.

use crate::arena::{TableArena, TableHandle};
use crate::context::{EngineContext, firmware_signature};
use crate::directory::{Entry, MutateError};
use crate::error::PatchError;
use acpi_tables::{AcpiTable, MemoryError, PhysMemory, Signature};
use alloc::vec;
use alloc::vec::Vec;
use log::{debug, info, trace, warn};

/// How a DSDT replacement was recorded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DsdtOutcome {
    /// The XSDT entry at `slot` now refers to the new DSDT.
    Replaced { slot: usize },
    /// The XSDT has no DSDT entry; only the FADT will point at it.
    FadtOnly,
}

/// What [`Mutator::commit`] did.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    /// XSDT address in the RSDP after the commit.
    pub xsdt_address: u64,
    /// Final number of XSDT entries.
    pub entries: usize,
    /// Whether the RSDP was repointed to a new XSDT.
    pub repointed: bool,
    /// Whether the FADT now points at a replacement DSDT.
    pub dsdt_installed: bool,
}

#[derive(Debug, Copy, Clone)]
struct PendingDsdt {
    handle: TableHandle,
    /// Slot and previous entry, if the XSDT had a DSDT entry.
    replaced: Option<(usize, Entry)>,
}

#[derive(Debug)]
pub struct Mutator {
    ctx: EngineContext,
    arena: TableArena,
    dsdt: Option<PendingDsdt>,
    directory_changes: usize,
}

impl Mutator {
    /// Take over `ctx` and grow its directory by `additional` slots.
    #[must_use]
    pub fn new(mut ctx: EngineContext, additional: usize) -> Self {
        ctx.directory.grow(additional);
        Self {
            ctx,
            arena: TableArena::new(),
            dsdt: None,
            directory_changes: 0,
        }
    }

    #[must_use]
    pub const fn context(&self) -> &EngineContext {
        &self.ctx
    }

    #[must_use]
    pub const fn arena(&self) -> &TableArena {
        &self.arena
    }

    /// Whether anything has been changed since the session started.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.directory_changes > 0 || self.dsdt.is_some()
    }

    /// Make `table` the system DSDT.
    ///
    /// The XSDT entry with the `DSDT` signature is replaced. If there is
    /// none, the table is installed through the FADT alone when
    /// `fadt_fallback` is set.
    ///
    /// # Errors
    /// [`MutateError::NotFound`] if the XSDT has no DSDT entry and the
    /// fallback is off. The table is dropped and nothing changes.
    pub fn replace_dsdt(
        &mut self,
        map: &impl PhysMemory,
        table: AcpiTable,
        fadt_fallback: bool,
    ) -> Result<DsdtOutcome, MutateError> {
        if let Some(earlier) = self.dsdt.take() {
            warn!("A DSDT replacement was already pending; the earlier one is dropped");
            self.undo_dsdt(earlier);
        }

        let handle = self.arena.insert(table);
        let arena = &self.arena;
        let result = self.ctx.directory.replace_by_signature(
            Signature::DSDT,
            Entry::Loaded(handle),
            |entry| signature_of(map, arena, entry),
        );

        match result {
            Ok((slot, previous)) => {
                debug!("DSDT replacement recorded in XSDT entry {slot} (was {previous:?})");
                self.dsdt = Some(PendingDsdt {
                    handle,
                    replaced: Some((slot, previous)),
                });
                self.directory_changes += 1;
                Ok(DsdtOutcome::Replaced { slot })
            }
            Err(MutateError::NotFound(_)) if fadt_fallback => {
                warn!("The XSDT has no DSDT entry; installing the DSDT through the FADT only");
                self.dsdt = Some(PendingDsdt {
                    handle,
                    replaced: None,
                });
                Ok(DsdtOutcome::FadtOnly)
            }
            Err(e) => {
                self.arena.discard(handle);
                Err(e)
            }
        }
    }

    /// Add `table` to the XSDT, returning its slot.
    ///
    /// # Errors
    /// [`MutateError::CapacityExceeded`] if the directory is full. The table
    /// is dropped and nothing changes.
    pub fn append(&mut self, table: AcpiTable) -> Result<usize, MutateError> {
        if self.ctx.directory.is_full() {
            return Err(MutateError::CapacityExceeded {
                capacity: self.ctx.directory.capacity(),
            });
        }
        let handle = self.arena.insert(table);
        match self.ctx.directory.append(Entry::Loaded(handle)) {
            Ok(slot) => {
                self.directory_changes += 1;
                Ok(slot)
            }
            Err(e) => {
                self.arena.discard(handle);
                Err(e)
            }
        }
    }

    /// Publish all changes to firmware memory.
    ///
    /// A DSDT whose address cannot be stored in an ACPI 1.0 FADT is not
    /// installed; its XSDT entry is restored and its memory released.
    ///
    /// # Errors
    /// [`PatchError::Memory`] if reserved memory cannot be allocated or a
    /// structure cannot be written. Allocation failures happen before the
    /// FADT or RSDP is touched and release everything allocated so far.
    pub fn commit(mut self, map: &mut impl PhysMemory) -> Result<CommitSummary, PatchError> {
        let mut published = self.publish_tables(map)?;
        let dsdt_installed = self.install_dsdt(map, &mut published)?;

        let staged = match self.stage_directory(map, &published) {
            Ok(staged) => staged,
            Err(e) => {
                published.release_all(map);
                return Err(e.into());
            }
        };

        // Everything below is visible to the firmware and the OS.
        let previous = self.ctx.fadt.recompute_checksum();
        self.ctx.fadt.write_back(map)?;
        trace!(
            "FADT checksum {previous:#04x} -> {:#04x}",
            self.ctx.fadt.header().checksum
        );

        let repointed = if let Some(xsdt) = staged {
            self.ctx.rsdp.set_xsdt_address(xsdt);
            self.ctx.rsdp.recompute_checksums();
            self.ctx.rsdp.write_back(map)?;
            debug!(
                "RSDP repointed; checksums {:#04x}/{:#04x}",
                self.ctx.rsdp.legacy_checksum(),
                self.ctx.rsdp.extended_checksum()
            );
            true
        } else {
            debug!("XSDT unchanged; RSDP left as is");
            false
        };

        Ok(CommitSummary {
            xsdt_address: self.ctx.rsdp.xsdt_address(),
            entries: self.ctx.directory.len(),
            repointed,
            dsdt_installed,
        })
    }

    /// Copy every referenced arena table into reserved memory.
    fn publish_tables(&self, map: &mut impl PhysMemory) -> Result<Published, MemoryError> {
        let mut referenced = vec![false; self.arena.len()];
        for entry in self.ctx.directory.entries() {
            if let Entry::Loaded(handle) = *entry {
                referenced[handle.index()] = true;
            }
        }
        if let Some(pending) = self.dsdt {
            referenced[pending.handle.index()] = true;
        }

        let mut published = Published {
            tables: vec![None; self.arena.len()],
        };
        for (handle, table) in self.arena.iter() {
            if !referenced[handle.index()] {
                continue;
            }
            let paddr = match map.allocate(table.len()) {
                Ok(paddr) => paddr,
                Err(e) => {
                    published.release_all(map);
                    return Err(e);
                }
            };
            published.tables[handle.index()] = Some((paddr, table.len()));
            if let Err(e) = map.write(paddr, table.as_bytes()) {
                published.release_all(map);
                return Err(e);
            }
            debug!(
                "Installed {} table ({} bytes) at {paddr:#x}",
                table.signature(),
                table.len()
            );
        }
        Ok(published)
    }

    /// Point the FADT copy at the pending DSDT, if any.
    fn install_dsdt(
        &mut self,
        map: &mut impl PhysMemory,
        published: &mut Published,
    ) -> Result<bool, MemoryError> {
        let Some(pending) = self.dsdt else {
            return Ok(false);
        };
        let Some(paddr) = published.address(pending.handle) else {
            published.release_all(map);
            return Err(MemoryError::Null);
        };

        let (old32, old64) = (self.ctx.fadt.dsdt32(), self.ctx.fadt.x_dsdt());
        match self.ctx.fadt.set_dsdt(paddr) {
            Ok(()) => {
                info!("FADT DSDT pointer updated to {paddr:#x}");
                debug!(
                    "  DSDT {old32:#x} -> {:#x}, X_DSDT {old64:x?} -> {:x?}",
                    self.ctx.fadt.dsdt32(),
                    self.ctx.fadt.x_dsdt()
                );
                Ok(true)
            }
            Err(e) => {
                warn!("DSDT replacement not installed: {e}");
                self.undo_dsdt(pending);
                published.release(map, pending.handle);
                Ok(false)
            }
        }
    }

    /// Write the directory to a new buffer if it changed; returns its address.
    fn stage_directory(
        &self,
        map: &mut impl PhysMemory,
        published: &Published,
    ) -> Result<Option<u64>, MemoryError> {
        if self.directory_changes == 0 {
            return Ok(None);
        }
        let bytes = self
            .ctx
            .directory
            .serialize(|handle| published.address(handle).unwrap_or_default());
        let xsdt = map.allocate(bytes.len())?;
        if let Err(e) = map.write(xsdt, &bytes) {
            map.release(xsdt, bytes.len());
            return Err(e);
        }
        info!(
            "New XSDT at {xsdt:#x}: {} of {} entries used",
            self.ctx.directory.len(),
            self.ctx.directory.capacity()
        );
        Ok(Some(xsdt))
    }

    /// Put back the XSDT entry a pending DSDT replaced.
    fn undo_dsdt(&mut self, pending: PendingDsdt) {
        let Some((slot, previous)) = pending.replaced else {
            return;
        };
        if self.ctx.directory.entries().get(slot) == Some(&Entry::Loaded(pending.handle)) {
            self.ctx.directory.restore(slot, previous);
            self.directory_changes -= 1;
        }
    }
}

/// Reserved-memory copies of arena tables, by handle index.
struct Published {
    tables: Vec<Option<(u64, usize)>>,
}

impl Published {
    fn address(&self, handle: TableHandle) -> Option<u64> {
        self.tables
            .get(handle.index())
            .copied()
            .flatten()
            .map(|(paddr, _)| paddr)
    }

    fn release(&mut self, map: &mut impl PhysMemory, handle: TableHandle) {
        if let Some((paddr, len)) = self.tables.get_mut(handle.index()).and_then(Option::take) {
            trace!("Releasing {len} bytes at {paddr:#x}");
            map.release(paddr, len);
        }
    }

    fn release_all(&mut self, map: &mut impl PhysMemory) {
        for (paddr, len) in self.tables.iter_mut().filter_map(Option::take) {
            map.release(paddr, len);
        }
    }
}

/// Signature of the table behind a directory entry.
fn signature_of(map: &impl PhysMemory, arena: &TableArena, entry: &Entry) -> Option<Signature> {
    match *entry {
        Entry::Firmware(paddr) => firmware_signature(map, paddr),
        Entry::Loaded(handle) => arena.get(handle).map(AcpiTable::signature),
    }
}
