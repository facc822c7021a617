//! # FADT (Fixed ACPI Description Table, signature `FACP`)
//!
//! Only the fields involved in DSDT replacement are modelled:
//!
//! ```text
//! offset  size  field
//!     36     4  FIRMWARE_CTRL (32-bit FACS address)
//!     40     4  DSDT (32-bit)
//!    112     4  Flags
//!    132     8  X_FIRMWARE_CTRL (64-bit FACS address)
//!    140     8  X_DSDT (64-bit)
//! ```
//!
//! ACPI 1.0 FADTs are 116 bytes long and end before the 64-bit fields.

use crate::signature::Signature;
use crate::table::AcpiTable;
use crate::validate::{TableError, ValidationMode};
use crate::{MemoryError, PhysMemory, SdtHeader};
use bitfield_struct::bitfield;

const FIRMWARE_CTRL_OFFSET: usize = 36;
const DSDT_OFFSET: usize = 40;
const FLAGS_OFFSET: usize = 112;
const X_FIRMWARE_CTRL_OFFSET: usize = 132;
const X_DSDT_OFFSET: usize = 140;

/// Minimum length of a FADT that carries `X_DSDT`.
pub const X_DSDT_MIN_LEN: usize = X_DSDT_OFFSET + 8;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FadtError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Fixed feature flags (FADT offset 112).
#[bitfield(u32)]
pub struct FadtFlags {
    /// Bit 0: WBINVD is supported.
    pub wbinvd: bool,
    /// Bit 1: WBINVD flushes but does not invalidate.
    pub wbinvd_flush: bool,
    /// Bit 2: C1 is supported on all processors.
    pub proc_c1: bool,
    /// Bit 3: C2 works on multiprocessor systems.
    pub p_lvl2_up: bool,
    /// Bit 4: Power button is a control method device.
    pub pwr_button: bool,
    /// Bit 5: Sleep button is a control method device.
    pub slp_button: bool,
    /// Bit 6: RTC wake status is not in the fixed register space.
    pub fix_rtc: bool,
    /// Bit 7: RTC can wake from S4.
    pub rtc_s4: bool,
    /// Bit 8: PM timer is 32 bits wide.
    pub tmr_val_ext: bool,
    /// Bit 9: Docking is supported.
    pub dck_cap: bool,
    /// Bit 10: The reset register is supported.
    pub reset_reg_sup: bool,
    /// Bit 11: No internal expansion capabilities.
    pub sealed_case: bool,
    /// Bit 12: No local input/output devices.
    pub headless: bool,
    /// Bit 13: A native instruction follows the SLP_TYP write.
    pub cpu_sw_slp: bool,
    /// Bit 14: PCI Express wake events are supported.
    pub pci_exp_wak: bool,
    /// Bit 15: Use the platform clock instead of the PM timer.
    pub use_platform_clock: bool,
    /// Bit 16: RTC_STS is valid after S4 wake.
    pub s4_rtc_sts_valid: bool,
    /// Bit 17: Remote power-on is supported.
    pub remote_power_on_capable: bool,
    /// Bit 18: Force APIC cluster destination mode.
    pub force_apic_cluster_model: bool,
    /// Bit 19: Force APIC physical destination mode.
    pub force_apic_physical_destination_mode: bool,
    /// Bit 20: Hardware-reduced ACPI platform.
    pub hw_reduced_acpi: bool,
    /// Bit 21: Low-power S0 idle is at least as good as S3.
    pub low_power_s0_idle_capable: bool,
    /// Bits 22-23: Persistent CPU cache support (ACPI 6.4).
    #[bits(2)]
    pub persistent_cpu_caches: u8,
    /// Bits 24-31: Reserved (must be 0).
    #[bits(8, default = 0)]
    _reserved_24_31: u8,
}

/// A copy of the firmware FADT, together with its physical address.
#[derive(Debug, Clone)]
pub struct Fadt {
    paddr: u64,
    table: AcpiTable,
}

impl Fadt {
    /// Read the FADT at `paddr`.
    ///
    /// The checksum is validated leniently since the table is re-checksummed
    /// before it is written back.
    ///
    /// # Errors
    /// [`FadtError::Table`] if the table is malformed or not a FADT, and
    /// [`FadtError::Memory`] if it cannot be read.
    pub fn read(map: &impl PhysMemory, paddr: u64) -> Result<Self, FadtError> {
        if paddr == 0 {
            return Err(MemoryError::Null.into());
        }

        let head = map.read_vec(paddr, SdtHeader::SIZE)?;
        let header = SdtHeader::parse(&head).ok_or(TableError::TooSmall {
            required: SdtHeader::SIZE,
            available: head.len(),
        })?;
        if header.signature != Signature::FADT {
            return Err(TableError::UnexpectedSignature {
                expected: Signature::FADT,
                found: header.signature,
            }
            .into());
        }
        if header.table_len() < DSDT_OFFSET + 4 {
            return Err(TableError::TooSmall {
                required: DSDT_OFFSET + 4,
                available: header.table_len(),
            }
            .into());
        }

        let bytes = map.read_vec(paddr, header.table_len())?;
        let table = AcpiTable::parse(bytes, ValidationMode::Lenient)?;
        Ok(Self { paddr, table })
    }

    #[must_use]
    pub const fn paddr(&self) -> u64 {
        self.paddr
    }

    #[must_use]
    pub const fn table(&self) -> &AcpiTable {
        &self.table
    }

    #[must_use]
    pub fn header(&self) -> SdtHeader {
        self.table.header()
    }

    #[must_use]
    pub fn dsdt32(&self) -> u32 {
        self.table.field_u32(DSDT_OFFSET).unwrap_or_default()
    }

    /// `X_DSDT`, or `None` for an ACPI 1.0 FADT.
    #[must_use]
    pub fn x_dsdt(&self) -> Option<u64> {
        self.table.field_u64(X_DSDT_OFFSET)
    }

    #[must_use]
    pub fn firmware_ctrl(&self) -> u32 {
        self.table
            .field_u32(FIRMWARE_CTRL_OFFSET)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn x_firmware_ctrl(&self) -> Option<u64> {
        self.table.field_u64(X_FIRMWARE_CTRL_OFFSET)
    }

    #[must_use]
    pub fn flags(&self) -> Option<FadtFlags> {
        self.table.field_u32(FLAGS_OFFSET).map(FadtFlags::from_bits)
    }

    /// Point both DSDT fields at `paddr`.
    ///
    /// With `X_DSDT` present, the 32-bit field gets the address if it fits
    /// and zero otherwise. An ACPI 1.0 FADT requires a 32-bit address. The
    /// checksum is stale afterwards.
    ///
    /// # Errors
    /// [`MemoryError::Unaddressable`] if the address cannot be represented;
    /// the table is left unchanged in that case.
    pub fn set_dsdt(&mut self, paddr: u64) -> Result<(), MemoryError> {
        let narrow = u32::try_from(paddr).ok();
        if self.x_dsdt().is_some() {
            self.table.set_field_u64(X_DSDT_OFFSET, paddr);
            self.table
                .set_field_u32(DSDT_OFFSET, narrow.unwrap_or_default());
            return Ok(());
        }

        let narrow = narrow.ok_or(MemoryError::Unaddressable { paddr })?;
        self.table.set_field_u32(DSDT_OFFSET, narrow);
        Ok(())
    }

    /// Restore the zero byte sum; returns the previous checksum byte.
    pub fn recompute_checksum(&mut self) -> u8 {
        self.table.recompute_checksum()
    }

    /// Write the copy back to where it was read from.
    ///
    /// # Errors
    /// Propagates the [`MemoryError`] of the underlying write.
    pub fn write_back(&self, map: &mut impl PhysMemory) -> Result<(), MemoryError> {
        map.write(self.paddr, self.table.as_bytes())
    }
}
