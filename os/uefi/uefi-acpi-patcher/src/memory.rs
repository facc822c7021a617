#![allow(unsafe_code)]

use acpi_tables::{MemoryError, PhysMemory};
use core::ptr::{self, NonNull};
use log::{trace, warn};
use uefi::boot::{self, MemoryType};

/// Physical memory as seen while Boot Services run: identity mapped.
///
/// Allocations come from the `ACPI_RECLAIM` pool so the operating system
/// keeps them. Only allocations that no table refers to are freed.
pub struct BootServicesMemory;

impl BootServicesMemory {
    fn address(paddr: u64, len: usize) -> Result<usize, MemoryError> {
        if paddr == 0 {
            return Err(MemoryError::Null);
        }
        let addr = usize::try_from(paddr).map_err(|_| MemoryError::Unmapped { paddr, len })?;
        if addr.checked_add(len).is_none() {
            return Err(MemoryError::Unmapped { paddr, len });
        }
        Ok(addr)
    }
}

impl PhysMemory for BootServicesMemory {
    fn read(&self, paddr: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
        let addr = Self::address(paddr, buf.len())?;
        // SAFETY: firmware tables are identity mapped and readable while
        // Boot Services are active.
        unsafe {
            ptr::copy_nonoverlapping(
                ptr::with_exposed_provenance::<u8>(addr),
                buf.as_mut_ptr(),
                buf.len(),
            );
        }
        Ok(())
    }

    fn write(&mut self, paddr: u64, bytes: &[u8]) -> Result<(), MemoryError> {
        let addr = Self::address(paddr, bytes.len())?;
        // SAFETY: only tables discovered through the RSDP or allocated by
        // `allocate` are written, both identity mapped and writable.
        unsafe {
            ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                ptr::with_exposed_provenance_mut::<u8>(addr),
                bytes.len(),
            );
        }
        Ok(())
    }

    fn allocate(&mut self, len: usize) -> Result<u64, MemoryError> {
        let block = boot::allocate_pool(MemoryType::ACPI_RECLAIM, len.max(1))
            .map_err(|_| MemoryError::OutOfMemory { len })?;
        // SAFETY: the pool block is at least `len` bytes long.
        unsafe { ptr::write_bytes(block.as_ptr(), 0, len) };

        let paddr = block.as_ptr().expose_provenance() as u64;
        trace!("Allocated {len} bytes of ACPI reclaim memory at {paddr:#x}");
        Ok(paddr)
    }

    fn release(&mut self, paddr: u64, len: usize) {
        let Some(block) = usize::try_from(paddr)
            .ok()
            .and_then(|addr| NonNull::new(ptr::with_exposed_provenance_mut::<u8>(addr)))
        else {
            return;
        };
        // SAFETY: `paddr` was returned by `allocate_pool` in `allocate` and
        // no table refers to it.
        if let Err(e) = unsafe { boot::free_pool(block) } {
            warn!("Cannot free {len} bytes at {paddr:#x}: {e}");
        }
    }
}
